//! [`Command`] for recording an approved [`Payment`].

use common::{
    money::Currency,
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted, Update},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{contract, payment, user, Contract, Payment},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for recording an approved [`Payment`] against a [`Contract`]
/// and reconciling its balance.
#[derive(Clone, Debug)]
pub struct RecordPayment {
    /// ID of the [`Contract`] the [`Payment`] is recorded against.
    pub contract_id: contract::Id,

    /// Amount of the [`Payment`].
    pub amount: Money,

    /// [`DateTime`] when the money was received.
    pub received_at: payment::ReceptionDateTime,

    /// Free-text note accompanying the [`Payment`].
    pub note: Option<payment::Note>,

    /// ID of the admin [`User`] recording the [`Payment`].
    ///
    /// [`User`]: crate::domain::User
    pub recorded_by: user::Id,

    /// [`payment::IdempotencyKey`] deduplicating client retries.
    pub idempotency_key: Option<payment::IdempotencyKey>,
}

/// Output of [`RecordPayment`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Recorded [`Payment`].
    pub payment: Payment,

    /// [`contract::Statement`] of the [`Contract`] after the [`Payment`] was
    /// applied.
    pub statement: contract::Statement,
}

impl<Db> Command<RecordPayment> for Service<Db>
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
            Select<By<Vec<Payment>, contract::Id>>,
            Ok = Vec<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Update<Contract>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
        Lock<By<Contract, contract::Id>>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RecordPayment) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordPayment {
            contract_id,
            amount,
            received_at,
            note,
            recorded_by,
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

        let mut contract = tx
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

        if let Some(key) = &idempotency_key {
            let replayed = tx
                .execute(Select(By::<Option<Payment>, _>::new((
                    contract_id,
                    key.clone(),
                ))))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if let Some(payment) = replayed {
                let history = tx
                    .execute(Select(By::<Vec<Payment>, _>::new(contract_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                return Ok(Output {
                    payment,
                    statement: contract::Statement::derive(&contract, &history),
                });
            }
        }

        let history = tx
            .execute(Select(By::<Vec<Payment>, _>::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut payment = Payment {
            id: payment::Id::new(),
            contract_id,
            plot_id: None,
            amount,
            method: None,
            reference: None,
            document: None,
            note,
            recorded_by: Some(recorded_by),
            idempotency_key,
            status: payment::Status::Approved,
            outstanding: None,
            received_at,
            decided_at: Some(DateTime::now().coerce()),
            created_at: DateTime::now().coerce(),
        };

        let statement = contract::Statement::derive(
            &contract,
            history.iter().chain([&payment]),
        );
        payment.outstanding = Some(statement.balance);

        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        contract.balance = statement.balance;
        contract.status = statement.status;
        tx.execute(Update(contract))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(Output { payment, statement })
    }
}

/// Error of [`RecordPayment`] [`Command`] execution.
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

    use common::{money::Currency, DateTime, Money};
    use rust_decimal::Decimal;

    use crate::{
        domain::{contract, payment, plot, user, Contract},
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, ExecutionError, RecordPayment};
    use common::operations::{By, Commit, Insert, Select, Transact};

    fn config() -> Config {
        Config {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                b"secret",
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"secret",
            ),
            session_ttl: Duration::from_secs(30 * 60),
        }
    }

    fn service() -> Service<InMemory> {
        Service::new(config(), InMemory::new())
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

    fn cmd(contract_id: contract::Id, amount: Money) -> RecordPayment {
        RecordPayment {
            contract_id,
            amount,
            received_at: DateTime::now().coerce(),
            note: None,
            recorded_by: user::Id::new(),
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn records_and_completes_on_exact_payoff() {
        let service = service();
        let contract = contract(2_000_000, 500_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let out = service
            .execute(cmd(contract.id, ngn(1_500_000)))
            .await
            .unwrap();

        assert_eq!(out.statement.balance, ngn(0));
        assert_eq!(out.statement.status, contract::Status::Completed);
        assert_eq!(out.payment.outstanding, Some(ngn(0)));
        assert_eq!(out.payment.status, payment::Status::Approved);

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        let stored = stored.unwrap();
        assert_eq!(stored.balance, ngn(0));
        assert_eq!(stored.status, contract::Status::Completed);
    }

    #[tokio::test]
    async fn overpayment_clamps_balance_at_zero() {
        let service = service();
        let contract = contract(1_000_000, 0);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let out = service
            .execute(cmd(contract.id, ngn(1_200_000)))
            .await
            .unwrap();

        assert_eq!(out.statement.balance, ngn(0));
        assert_eq!(out.statement.status, contract::Status::Completed);
    }

    #[tokio::test]
    async fn fails_on_unknown_contract() {
        let service = service();

        let err = service
            .execute(cmd(contract::Id::new(), ngn(100)))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::ContractNotFound(_)
        ));
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let service = service();
        let contract = contract(1_000_000, 0);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        for amount in [ngn(0), ngn(-100)] {
            let err = service
                .execute(cmd(contract.id, amount))
                .await
                .unwrap_err();
            assert!(matches!(err.as_ref(), ExecutionError::InvalidAmount(_)));
        }
    }

    #[tokio::test]
    async fn rejects_wrong_currency() {
        let service = service();
        let contract = contract(1_000_000, 0);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let err = service
            .execute(cmd(
                contract.id,
                Money {
                    amount: Decimal::from(100),
                    currency: Currency::Usd,
                },
            ))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongCurrency { .. }));
    }

    #[tokio::test]
    async fn replays_original_row_on_same_idempotency_key() {
        let service = service();
        let contract = contract(2_000_000, 0);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let key = payment::IdempotencyKey::new("retry-1").unwrap();
        let mut command = cmd(contract.id, ngn(500_000));
        command.idempotency_key = Some(key);

        let first = service.execute(command.clone()).await.unwrap();
        let second = service.execute(command).await.unwrap();

        assert_eq!(first.payment.id, second.payment.id);
        assert_eq!(first.statement, second.statement);

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
    async fn failed_transaction_leaves_no_partial_writes() {
        let db = InMemory::new();
        let contract = contract(2_000_000, 500_000);
        db.execute(Insert(contract.clone())).await.unwrap();

        // A transacted handle whose guard is already released fails every
        // `Commit`, while still staging reads and writes.
        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Commit).await.unwrap();
        let service = Service::new(config(), tx);

        let err = service
            .execute(cmd(contract.id, ngn(100_000)))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Db(_)));

        let stored: Option<Contract> = db
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().balance, ngn(1_500_000));

        let history = db
            .execute(Select(By::<Vec<crate::domain::Payment>, _>::new(
                contract.id,
            )))
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn concurrent_payments_never_lose_updates() {
        let service = service();
        let contract = contract(2_000_000, 500_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            service.execute(cmd(contract.id, ngn(100_000))),
            service.execute(cmd(contract.id, ngn(100_000))),
        );
        a.unwrap();
        b.unwrap();

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().balance, ngn(1_300_000));
    }
}
