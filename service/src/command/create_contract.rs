//! [`Command`] for creating a new [`Contract`].

use std::{collections::HashMap, iter};

use common::{
    money::Currency,
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{contract, plot, user, Contract, Payment, Plot, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Contract`].
///
/// Plots and their prices are provided as two parallel lists and zipped
/// here, rejecting any length mismatch.
#[derive(Clone, Debug)]
pub struct CreateContract {
    /// ID of the buyer [`User`] entering the [`Contract`].
    pub buyer_id: user::Id,

    /// IDs of the [`Plot`]s taken under the [`Contract`].
    pub plot_ids: Vec<plot::Id>,

    /// Prices of the taken [`Plot`]s, one per [`Plot`], in the same order.
    pub prices: Vec<Money>,

    /// Initial deposit paid at registration.
    pub initial_deposit: Money,

    /// Payment [`contract::Schedule`] descriptor.
    pub schedule: contract::Schedule,

    /// [`DateTime`] when the [`Plot`]s were acquired.
    pub acquired_at: contract::AcquisitionDateTime,
}

impl<Db> Command<CreateContract> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<plot::Id, Plot>, Vec<plot::Id>>>,
            Ok = HashMap<plot::Id, Plot>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<Insert<Contract>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Contract;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateContract,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateContract {
            buyer_id,
            plot_ids,
            prices,
            initial_deposit,
            schedule,
            acquired_at,
        } = cmd;

        if plot_ids.is_empty() {
            return Err(tracerr::new!(E::NoPlots));
        }
        if plot_ids.len() != prices.len() {
            return Err(tracerr::new!(E::PlotsPricesMismatch {
                plots: plot_ids.len(),
                prices: prices.len(),
            }));
        }
        if initial_deposit.amount.is_sign_negative() {
            return Err(tracerr::new!(E::InvalidDeposit(initial_deposit)));
        }
        for price in &prices {
            if !price.is_positive() {
                return Err(tracerr::new!(E::InvalidPrice(*price)));
            }
            if price.currency != initial_deposit.currency {
                return Err(tracerr::new!(E::WrongCurrency {
                    expected: initial_deposit.currency,
                    provided: price.currency,
                }));
            }
        }

        let buyer = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(buyer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(buyer_id))
            .map_err(tracerr::wrap!())?;

        let plots = self
            .database()
            .execute(Select(By::<HashMap<plot::Id, Plot>, _>::new(
                plot_ids.clone(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        for id in &plot_ids {
            if !plots.contains_key(id) {
                return Err(tracerr::new!(E::PlotNotExists(*id)));
            }
        }

        let mut contract = Contract {
            id: contract::Id::new(),
            buyer_id: buyer.id,
            plots: plot_ids
                .into_iter()
                .zip(prices)
                .map(|(plot_id, price)| contract::PlotPrice { plot_id, price })
                .collect(),
            initial_deposit,
            schedule,
            acquired_at,
            balance: Money::zero(initial_deposit.currency),
            status: contract::Status::Active,
            created_at: DateTime::now().coerce(),
        };
        let statement =
            contract::Statement::derive(&contract, iter::empty::<&Payment>());
        contract.balance = statement.balance;
        contract.status = statement.status;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(contract.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(contract)
    }
}

/// Error of [`CreateContract`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Provided initial deposit is negative.
    #[display("`{_0}` is not a valid deposit")]
    InvalidDeposit(#[error(not(source))] Money),

    /// Provided [`Plot`] price is not positive.
    #[display("`{_0}` is not a valid price")]
    InvalidPrice(#[error(not(source))] Money),

    /// No [`Plot`]s provided.
    #[display("`Contract` must take at least one `Plot`")]
    NoPlots,

    /// [`Plot`] with the provided ID does not exist.
    #[display("`Plot(id: {_0})` does not exist")]
    PlotNotExists(#[error(not(source))] plot::Id),

    /// Number of provided [`Plot`]s differs from the number of prices.
    #[display("{plots} plots cannot be priced by {prices} prices")]
    PlotsPricesMismatch {
        /// Number of provided [`Plot`]s.
        plots: usize,

        /// Number of provided prices.
        prices: usize,
    },

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// Provided prices and deposit are in different [`Currency`]s.
    #[display("`{provided}` price cannot be mixed with `{expected}` deposit")]
    WrongCurrency {
        /// [`Currency`] of the initial deposit.
        expected: Currency,

        /// Mismatched [`Currency`] of a price.
        provided: Currency,
    },
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{money::Currency, operations::Insert, DateTime, Money};
    use rust_decimal::Decimal;

    use crate::{
        domain::{contract, plot, user, Plot, User},
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, CreateContract, ExecutionError};

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

    fn buyer() -> User {
        User {
            id: user::Id::new(),
            name: user::Name::new("Ada Obi").unwrap(),
            email: user::Email::new("ada@example.com").unwrap(),
            password_hash: user::PasswordHash::new(&user::Password::from(
                "qwerty123",
            )),
            phone: None,
            role: user::Role::Buyer,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        }
    }

    fn available_plot(number: &str, price: i64) -> Plot {
        Plot {
            id: plot::Id::new(),
            number: plot::Number::new(number).unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: ngn(price),
            status: plot::Status::Available,
            owner_id: None,
            created_at: DateTime::now().coerce(),
        }
    }

    fn cmd(buyer_id: user::Id, plots: &[&Plot]) -> CreateContract {
        CreateContract {
            buyer_id,
            plot_ids: plots.iter().map(|p| p.id).collect(),
            prices: plots.iter().map(|p| p.price).collect(),
            initial_deposit: ngn(500_000),
            schedule: contract::Schedule::new("monthly").unwrap(),
            acquired_at: DateTime::now().coerce(),
        }
    }

    #[tokio::test]
    async fn creates_with_derived_balance() {
        let service = service();
        let buyer = buyer();
        let a = available_plot("A-1", 1_200_000);
        let b = available_plot("A-2", 800_000);
        service
            .database()
            .execute(Insert(buyer.clone()))
            .await
            .unwrap();
        service.database().execute(Insert(a.clone())).await.unwrap();
        service.database().execute(Insert(b.clone())).await.unwrap();

        let contract = service
            .execute(cmd(buyer.id, &[&a, &b]))
            .await
            .unwrap();

        assert_eq!(contract.plots.len(), 2);
        assert_eq!(contract.balance, ngn(1_500_000));
        assert_eq!(contract.status, contract::Status::Active);
    }

    #[tokio::test]
    async fn rejects_mismatched_price_list() {
        let service = service();
        let buyer = buyer();
        let plot = available_plot("A-1", 1_000_000);
        service
            .database()
            .execute(Insert(buyer.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let mut command = cmd(buyer.id, &[&plot]);
        command.prices.push(ngn(1));

        let err = service.execute(command).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PlotsPricesMismatch {
                plots: 1,
                prices: 2,
            },
        ));
    }

    #[tokio::test]
    async fn rejects_empty_plot_list() {
        let service = service();
        let buyer = buyer();
        service
            .database()
            .execute(Insert(buyer.clone()))
            .await
            .unwrap();

        let err = service.execute(cmd(buyer.id, &[])).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NoPlots));
    }

    #[tokio::test]
    async fn fails_on_unknown_plot() {
        let service = service();
        let buyer = buyer();
        let plot = available_plot("A-1", 1_000_000);
        service
            .database()
            .execute(Insert(buyer.clone()))
            .await
            .unwrap();

        let err = service
            .execute(cmd(buyer.id, &[&plot]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::PlotNotExists(_)));
    }

    #[tokio::test]
    async fn fully_deposited_contract_is_completed_at_once() {
        let service = service();
        let buyer = buyer();
        let plot = available_plot("A-1", 500_000);
        service
            .database()
            .execute(Insert(buyer.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let contract = service
            .execute(cmd(buyer.id, &[&plot]))
            .await
            .unwrap();
        assert_eq!(contract.balance, ngn(0));
        assert_eq!(contract.status, contract::Status::Completed);
    }
}
