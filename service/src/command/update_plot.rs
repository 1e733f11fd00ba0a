//! [`Command`] for updating a [`Plot`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{plot, Plot},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for updating inventory fields of a [`Plot`].
///
/// [`plot::Status`] and the owner are deliberately not updatable here, as
/// they're driven by payment reconciliation only.
#[derive(Clone, Debug)]
pub struct UpdatePlot {
    /// ID of the [`Plot`] to update.
    pub id: plot::Id,

    /// New [`plot::Number`] of the [`Plot`].
    pub number: Option<plot::Number>,

    /// New [`plot::Location`] of the [`Plot`].
    pub location: Option<plot::Location>,

    /// New [`plot::Dimension`] of the [`Plot`].
    pub dimension: Option<plot::Dimension>,

    /// New price of the [`Plot`].
    pub price: Option<Money>,
}

impl<Db> Command<UpdatePlot> for Service<Db>
where
    Db: for<'n> Database<
            Select<By<Option<Plot>, &'n plot::Number>>,
            Ok = Option<Plot>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Plot>, plot::Id>>,
            Ok = Option<Plot>,
            Err = Traced<database::Error>,
        > + Database<Update<Plot>, Err = Traced<database::Error>>
        + Database<Lock<By<Plot, plot::Id>>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Plot;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UpdatePlot) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdatePlot {
            id,
            number,
            location,
            dimension,
            price,
        } = cmd;

        if let Some(price) = price {
            if !price.is_positive() {
                return Err(tracerr::new!(E::InvalidPrice(price)));
            }
        }
        if let Some(number) = &number {
            let occupied = self
                .database()
                .execute(Select(By::new(number)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if occupied.is_some_and(|p| p.id != id) {
                return Err(tracerr::new!(E::NumberOccupied(number.clone())));
            }
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid racing a reconciliation writing `status`/`owner_id`.
        tx.execute(Lock(By::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut plot = tx
            .execute(Select(By::<Option<Plot>, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PlotNotExists(id))
            .map_err(tracerr::wrap!())?;

        if let Some(number) = number {
            plot.number = number;
        }
        if let Some(location) = location {
            plot.location = location;
        }
        if let Some(dimension) = dimension {
            plot.dimension = dimension;
        }
        if let Some(price) = price {
            plot.price = price;
        }

        tx.execute(Update(plot.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(plot)
    }
}

/// Error of [`UpdatePlot`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Provided price is not positive.
    #[display("`{_0}` is not a valid price")]
    InvalidPrice(#[error(not(source))] Money),

    /// [`plot::Number`] is already occupied.
    #[display("`{_0}` plot number is occupied")]
    NumberOccupied(#[error(not(source))] plot::Number),

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
        domain::{plot, user, Plot},
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, ExecutionError, UpdatePlot};

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

    fn sold_plot(number: &str) -> Plot {
        Plot {
            id: plot::Id::new(),
            number: plot::Number::new(number).unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: ngn(1_000_000),
            status: plot::Status::Sold,
            owner_id: Some(user::Id::new()),
            created_at: DateTime::now().coerce(),
        }
    }

    #[tokio::test]
    async fn updates_fields_but_not_ownership() {
        let service = service();
        let plot = sold_plot("A-1");
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let updated = service
            .execute(UpdatePlot {
                id: plot.id,
                number: Some(plot::Number::new("B-7").unwrap()),
                location: None,
                dimension: None,
                price: Some(ngn(1_500_000)),
            })
            .await
            .unwrap();

        assert_eq!(updated.number, plot::Number::new("B-7").unwrap());
        assert_eq!(updated.price, ngn(1_500_000));
        assert_eq!(updated.status, plot::Status::Sold);
        assert_eq!(updated.owner_id, plot.owner_id);

        let stored: Option<Plot> = service
            .database()
            .execute(Select(By::<Option<Plot>, _>::new(plot.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().price, ngn(1_500_000));
    }

    #[tokio::test]
    async fn rejects_taken_number() {
        let service = service();
        let a = sold_plot("A-1");
        let b = sold_plot("B-2");
        service.database().execute(Insert(a.clone())).await.unwrap();
        service.database().execute(Insert(b.clone())).await.unwrap();

        let err = service
            .execute(UpdatePlot {
                id: b.id,
                number: Some(plot::Number::new("A-1").unwrap()),
                location: None,
                dimension: None,
                price: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NumberOccupied(_)));
    }

    #[tokio::test]
    async fn keeping_own_number_is_not_a_conflict() {
        let service = service();
        let plot = sold_plot("A-1");
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let updated = service
            .execute(UpdatePlot {
                id: plot.id,
                number: Some(plot::Number::new("A-1").unwrap()),
                location: None,
                dimension: None,
                price: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.number, plot.number);
    }
}
