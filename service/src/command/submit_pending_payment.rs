//! [`Command`] for submitting a pending [`Payment`].

use common::{
    money::Currency,
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{contract, payment, plot, user, Contract, Payment, Plot},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for submitting a [`Payment`] awaiting an admin decision.
#[derive(Clone, Debug)]
pub struct SubmitPendingPayment {
    /// ID of the [`Contract`] the [`Payment`] is claimed against.
    pub contract_id: contract::Id,

    /// ID of the [`Plot`] the [`Payment`] is made for.
    ///
    /// The [`Plot`] is reserved until the [`Payment`] is decided.
    pub plot_id: Option<plot::Id>,

    /// Claimed amount.
    pub amount: Money,

    /// [`payment::Method`] the money was sent with.
    pub method: Option<payment::Method>,

    /// Transaction [`payment::Reference`] of the money transfer.
    pub reference: Option<payment::Reference>,

    /// Supporting [`payment::Document`] reference.
    pub document: Option<payment::Document>,

    /// Free-text note accompanying the submission.
    pub note: Option<payment::Note>,

    /// ID of the [`User`] submitting the [`Payment`].
    ///
    /// [`User`]: crate::domain::User
    pub submitted_by: user::Id,

    /// [`payment::IdempotencyKey`] deduplicating client retries.
    pub idempotency_key: payment::IdempotencyKey,
}

impl<Db> Command<SubmitPendingPayment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Contract>, contract::Id>>,
            Ok = Option<Contract>,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<Option<Payment>, (contract::Id, payment::IdempotencyKey)>,
            >,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Plot>, plot::Id>>,
            Ok = Option<Plot>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Payment>, contract::Id>>,
            Ok = Vec<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Update<Plot>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Contract, contract::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Plot, plot::Id>>, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    #[expect(clippy::too_many_lines, reason = "still readable")]
    async fn execute(
        &self,
        cmd: SubmitPendingPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitPendingPayment {
            contract_id,
            plot_id,
            amount,
            method,
            reference,
            document,
            note,
            submitted_by,
            idempotency_key,
        } = cmd;

        if !amount.is_positive() {
            return Err(tracerr::new!(E::InvalidAmount(amount)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent reconciliations upon the same `Contract`.
        tx.execute(Lock(By::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let contract = tx
            .execute(Select(By::<Option<Contract>, _>::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ContractNotFound(contract_id))
            .map_err(tracerr::wrap!())?;

        if amount.currency != contract.currency() {
            return Err(tracerr::new!(E::WrongCurrency {
                expected: contract.currency(),
                provided: amount.currency,
            }));
        }

        let replayed = tx
            .execute(Select(By::<Option<Payment>, _>::new((
                contract_id,
                idempotency_key.clone(),
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(payment) = replayed {
            return Ok(payment);
        }

        if let Some(plot_id) = plot_id {
            // `Contract` lock is already held, so the `Plot` lock cannot
            // deadlock with another reconciliation.
            tx.execute(Lock(By::<Plot, _>::new(plot_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let mut plot = tx
                .execute(Select(By::<Option<Plot>, _>::new(plot_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::PlotNotFound(plot_id))
                .map_err(tracerr::wrap!())?;
            if plot.status != plot::Status::Available {
                return Err(tracerr::new!(E::PlotUnavailable(plot_id)));
            }

            plot.status = plot::Status::Reserved;
            tx.execute(Update(plot))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let history = tx
            .execute(Select(By::<Vec<Payment>, _>::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let statement = contract::Statement::derive(&contract, &history);

        let payment = Payment {
            id: payment::Id::new(),
            contract_id,
            plot_id,
            amount,
            method,
            reference,
            document,
            note,
            recorded_by: Some(submitted_by),
            idempotency_key: Some(idempotency_key),
            status: payment::Status::Pending,
            outstanding: Some(statement.balance),
            received_at: DateTime::now().coerce(),
            decided_at: None,
            created_at: DateTime::now().coerce(),
        };
        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(payment)
    }
}

/// Error of [`SubmitPendingPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Contract`] with the provided ID does not exist.
    #[display("`Contract(id: {_0})` does not exist")]
    ContractNotFound(#[error(not(source))] contract::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Provided amount is not positive.
    #[display("`{_0}` is not a positive amount")]
    InvalidAmount(#[error(not(source))] Money),

    /// [`Plot`] with the provided ID does not exist.
    #[display("`Plot(id: {_0})` does not exist")]
    PlotNotFound(#[error(not(source))] plot::Id),

    /// [`Plot`] with the provided ID is reserved or sold already.
    #[display("`Plot(id: {_0})` is not available")]
    PlotUnavailable(#[error(not(source))] plot::Id),

    /// Provided amount is in a different [`Currency`] than the [`Contract`].
    #[display(
        "`{provided}` amount cannot be applied to a `{expected}` contract"
    )]
    WrongCurrency {
        /// [`Currency`] of the [`Contract`].
        expected: Currency,

        /// [`Currency`] of the provided amount.
        provided: Currency,
    },
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
        domain::{contract, payment, plot, user, Contract, Plot},
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, ExecutionError, SubmitPendingPayment};

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

    fn contract(total_owed: i64, deposit: i64) -> Contract {
        Contract {
            id: contract::Id::new(),
            buyer_id: user::Id::new(),
            plots: vec![contract::PlotPrice {
                plot_id: plot::Id::new(),
                price: ngn(total_owed),
            }],
            initial_deposit: ngn(deposit),
            schedule: contract::Schedule::new("monthly").unwrap(),
            acquired_at: DateTime::now().coerce(),
            balance: ngn(total_owed - deposit),
            status: contract::Status::Active,
            created_at: DateTime::now().coerce(),
        }
    }

    fn available_plot(price: i64) -> Plot {
        Plot {
            id: plot::Id::new(),
            number: plot::Number::new("A-1").unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: ngn(price),
            status: plot::Status::Available,
            owner_id: None,
            created_at: DateTime::now().coerce(),
        }
    }

    fn cmd(
        contract_id: contract::Id,
        plot_id: Option<plot::Id>,
        amount: Money,
        key: &str,
    ) -> SubmitPendingPayment {
        SubmitPendingPayment {
            contract_id,
            plot_id,
            amount,
            method: None,
            reference: None,
            document: None,
            note: None,
            submitted_by: user::Id::new(),
            idempotency_key: payment::IdempotencyKey::new(key).unwrap(),
        }
    }

    #[tokio::test]
    async fn submits_pending_without_balance_effect() {
        let service = service();
        let contract = contract(2_000_000, 500_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let payment = service
            .execute(cmd(contract.id, None, ngn(300_000), "sub-1"))
            .await
            .unwrap();

        assert_eq!(payment.status, payment::Status::Pending);
        assert_eq!(payment.outstanding, Some(ngn(1_500_000)));

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().balance, ngn(1_500_000));
    }

    #[tokio::test]
    async fn reserves_linked_plot() {
        let service = service();
        let contract = contract(2_000_000, 0);
        let plot = available_plot(2_000_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let payment = service
            .execute(cmd(contract.id, Some(plot.id), ngn(300_000), "sub-1"))
            .await
            .unwrap();
        assert_eq!(payment.plot_id, Some(plot.id));

        let stored: Option<Plot> = service
            .database()
            .execute(Select(By::<Option<Plot>, _>::new(plot.id)))
            .await
            .unwrap();
        let stored = stored.unwrap();
        assert_eq!(stored.status, plot::Status::Reserved);
        assert_eq!(stored.owner_id, None);
    }

    #[tokio::test]
    async fn rejects_reserved_plot() {
        let service = service();
        let contract = contract(2_000_000, 0);
        let mut plot = available_plot(2_000_000);
        plot.status = plot::Status::Reserved;
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let err = service
            .execute(cmd(contract.id, Some(plot.id), ngn(300_000), "sub-1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::PlotUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn replays_original_row_and_keeps_plot_untouched() {
        let service = service();
        let contract = contract(2_000_000, 0);
        let plot = available_plot(2_000_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(plot.clone()))
            .await
            .unwrap();

        let command = cmd(contract.id, Some(plot.id), ngn(300_000), "sub-1");
        let first = service.execute(command.clone()).await.unwrap();
        let second = service.execute(command).await.unwrap();
        assert_eq!(first.id, second.id);

        let history = service
            .database()
            .execute(Select(By::<Vec<crate::domain::Payment>, _>::new(
                contract.id,
            )))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let service = service();
        let contract = contract(2_000_000, 0);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let err = service
            .execute(cmd(contract.id, None, ngn(0), "sub-1"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidAmount(_)));
    }
}
