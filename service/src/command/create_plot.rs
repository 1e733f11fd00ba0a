//! [`Command`] for creating a new [`Plot`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{plot, Plot},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Plot`].
///
/// New [`Plot`]s always start as [`plot::Status::Available`] with no owner.
#[derive(Clone, Debug)]
pub struct CreatePlot {
    /// Unique [`plot::Number`] of a new [`Plot`].
    pub number: plot::Number,

    /// [`plot::Location`] of a new [`Plot`].
    pub location: plot::Location,

    /// [`plot::Dimension`] of a new [`Plot`].
    pub dimension: plot::Dimension,

    /// Price of a new [`Plot`].
    pub price: Money,
}

impl<Db> Command<CreatePlot> for Service<Db>
where
    Db: for<'n> Database<
            Select<By<Option<Plot>, &'n plot::Number>>,
            Ok = Option<Plot>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Plot>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Plot;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreatePlot) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePlot {
            number,
            location,
            dimension,
            price,
        } = cmd;

        if !price.is_positive() {
            return Err(tracerr::new!(E::InvalidPrice(price)));
        }

        let occupied = self
            .database()
            .execute(Select(By::new(&number)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if occupied.is_some() {
            return Err(tracerr::new!(E::NumberOccupied(number)));
        }

        let plot = Plot {
            id: plot::Id::new(),
            number,
            location,
            dimension,
            price,
            status: plot::Status::Available,
            owner_id: None,
            created_at: DateTime::now().coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(plot.clone()))
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

/// Error of [`CreatePlot`] [`Command`] execution.
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
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{money::Currency, Money};
    use rust_decimal::Decimal;

    use crate::{
        domain::plot,
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, CreatePlot, ExecutionError};

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

    fn cmd(number: &str) -> CreatePlot {
        CreatePlot {
            number: plot::Number::new(number).unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: Money {
                amount: Decimal::from(1_000_000),
                currency: Currency::Ngn,
            },
        }
    }

    #[tokio::test]
    async fn creates_available_plot() {
        let service = service();

        let plot = service.execute(cmd("A-1")).await.unwrap();

        assert_eq!(plot.status, plot::Status::Available);
        assert_eq!(plot.owner_id, None);
    }

    #[tokio::test]
    async fn rejects_duplicate_number() {
        let service = service();
        service.execute(cmd("A-1")).await.unwrap();

        let err = service.execute(cmd("A-1")).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NumberOccupied(_)));
    }

    #[tokio::test]
    async fn rejects_non_positive_price() {
        let service = service();
        let mut command = cmd("A-1");
        command.price.amount = Decimal::ZERO;

        let err = service.execute(command).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InvalidPrice(_)));
    }
}
