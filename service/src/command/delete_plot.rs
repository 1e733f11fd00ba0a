//! [`Command`] for deleting a [`Plot`].

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{plot, Plot},
    infra::{database, Database},
    read, Service,
};

use super::Command;

/// [`Command`] for deleting a [`Plot`] from the inventory.
///
/// A [`Plot`] referenced by any contract or payment is a financial record
/// and cannot be deleted.
#[derive(Clone, Copy, Debug)]
pub struct DeletePlot {
    /// ID of the [`Plot`] to delete.
    pub id: plot::Id,
}

impl<Db> Command<DeletePlot> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Plot>, plot::Id>>,
            Ok = Option<Plot>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::plot::InUse, plot::Id>>,
            Ok = read::plot::InUse,
            Err = Traced<database::Error>,
        > + Database<Delete<By<Plot, plot::Id>>, Err = Traced<database::Error>>
        + Database<Lock<By<Plot, plot::Id>>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: DeletePlot) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeletePlot { id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid racing a reconciliation referencing the `Plot`.
        tx.execute(Lock(By::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Select(By::<Option<Plot>, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PlotNotExists(id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let in_use = tx
            .execute(Select(By::<read::plot::InUse, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if *in_use {
            return Err(tracerr::new!(E::PlotInUse(id)));
        }

        tx.execute(Delete(By::<Plot, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(())
    }
}

/// Error of [`DeletePlot`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Plot`] with the provided ID is referenced by a contract or payment.
    #[display("`Plot(id: {_0})` is referenced by a contract or payment")]
    PlotInUse(#[error(not(source))] plot::Id),

    /// [`Plot`] with the provided ID does not exist.
    #[display("`Plot(id: {_0})` does not exist")]
    PlotNotExists(#[error(not(source))] plot::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        money::Currency,
        operations::{By, Insert, Select},
        DateTime, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        domain::{contract, plot, user, Contract, Plot},
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, DeletePlot, ExecutionError};

    fn service() -> Service<InMemory> {
        Service::new(
            Config {
                jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                    b"secret",
                ),
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    b"secret",
                ),
                session_ttl: Duration::from_secs(30 * 60),
            },
            InMemory::new(),
        )
    }

    fn ngn(amount: i64) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: Currency::Ngn,
        }
    }

    fn available_plot() -> Plot {
        Plot {
            id: plot::Id::new(),
            number: plot::Number::new("A-1").unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: ngn(1_000_000),
            status: plot::Status::Available,
            owner_id: None,
            created_at: DateTime::now().coerce(),
        }
    }

    #[tokio::test]
    async fn deletes_unreferenced_plot() {
        let service = service();
        let plot = available_plot();
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        service.execute(DeletePlot { id: plot.id }).await.unwrap();

        let stored: Option<Plot> = service
            .database()
            .execute(Select(By::<Option<Plot>, _>::new(plot.id)))
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn refuses_plot_taken_by_a_contract() {
        let service = service();
        let plot = available_plot();
        let contract = Contract {
            id: contract::Id::new(),
            buyer_id: user::Id::new(),
            plots: vec![contract::PlotPrice {
                plot_id: plot.id,
                price: plot.price,
            }],
            initial_deposit: ngn(0),
            schedule: contract::Schedule::new("monthly").unwrap(),
            acquired_at: DateTime::now().coerce(),
            balance: plot.price,
            status: contract::Status::Active,
            created_at: DateTime::now().coerce(),
        };
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let err = service
            .execute(DeletePlot { id: plot.id })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::PlotInUse(_)));

        let stored: Option<Plot> = service
            .database()
            .execute(Select(By::<Option<Plot>, _>::new(plot.id)))
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn fails_on_unknown_plot() {
        let service = service();

        let err = service
            .execute(DeletePlot {
                id: plot::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::PlotNotExists(_)));
    }
}
