//! [`Command`] for deciding a pending [`Payment`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{contract, payment, plot, Contract, Payment, Plot},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for deciding a [`payment::Status::Pending`] [`Payment`].
#[derive(Clone, Copy, Debug)]
pub struct DecidePendingPayment {
    /// ID of the [`Payment`] to decide.
    pub payment_id: payment::Id,

    /// [`Decision`] to apply.
    pub decision: Decision,
}

/// Decision upon a [`payment::Status::Pending`] [`Payment`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Decision {
    /// Accept the [`Payment`] and debit the [`Contract`] balance.
    Approved,

    /// Refuse the [`Payment`], leaving the [`Contract`] balance untouched.
    Rejected,
}

impl<Db> Command<DecidePendingPayment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Contract>, contract::Id>>,
            Ok = Option<Contract>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Plot>, plot::Id>>,
            Ok = Option<Plot>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Payment>, contract::Id>>,
            Ok = Vec<Payment>,
            Err = Traced<database::Error>,
        > + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Update<Contract>, Err = Traced<database::Error>>
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
        cmd: DecidePendingPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DecidePendingPayment {
            payment_id,
            decision,
        } = cmd;

        // The `Contract` to lock is only known from the `Payment` row itself,
        // so the row is read once outside the transaction and re-read under
        // the lock.
        let contract_id = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotFound(payment_id))
            .map_err(tracerr::wrap!())?
            .contract_id;

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

        let mut payment = tx
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotFound(payment_id))
            .map_err(tracerr::wrap!())?;
        if payment.status != payment::Status::Pending {
            return Err(tracerr::new!(E::AlreadyDecided(payment_id)));
        }

        let mut contract = tx
            .execute(Select(By::<Option<Contract>, _>::new(contract_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ContractNotFound(contract_id))
            .map_err(tracerr::wrap!())?;

        payment.decided_at = Some(DateTime::now().coerce());
        match decision {
            Decision::Approved => {
                payment.status = payment::Status::Approved;

                let history = tx
                    .execute(Select(By::<Vec<Payment>, _>::new(contract_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                let statement = contract::Statement::derive(
                    &contract,
                    history
                        .iter()
                        .filter(|p| p.id != payment.id)
                        .chain([&payment]),
                );
                payment.outstanding = Some(statement.balance);

                tx.execute(Update(payment.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                contract.balance = statement.balance;
                contract.status = statement.status;
                tx.execute(Update(contract.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                if let Some(plot_id) = payment.plot_id {
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

                    plot.status = plot::Status::Sold;
                    plot.owner_id = Some(contract.buyer_id);
                    tx.execute(Update(plot))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                }
            }
            Decision::Rejected => {
                payment.status = payment::Status::Rejected;
                tx.execute(Update(payment.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                if let Some(plot_id) = payment.plot_id {
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

                    plot.status = plot::Status::Available;
                    plot.owner_id = None;
                    tx.execute(Update(plot))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                }
            }
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(payment)
    }
}

/// Error of [`DecidePendingPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Payment`] with the provided ID is decided already.
    #[display("`Payment(id: {_0})` is decided already")]
    AlreadyDecided(#[error(not(source))] payment::Id),

    /// [`Contract`] the [`Payment`] belongs to does not exist.
    #[display("`Contract(id: {_0})` does not exist")]
    ContractNotFound(#[error(not(source))] contract::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Payment`] with the provided ID does not exist.
    #[display("`Payment(id: {_0})` does not exist")]
    PaymentNotFound(#[error(not(source))] payment::Id),

    /// [`Plot`] linked to the [`Payment`] does not exist.
    #[display("`Plot(id: {_0})` does not exist")]
    PlotNotFound(#[error(not(source))] plot::Id),
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
        domain::{contract, payment, plot, user, Contract, Payment, Plot},
        infra::InMemory,
        Config, Service,
    };

    use super::{
        Command as _, DecidePendingPayment, Decision, ExecutionError,
    };

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

    fn pending(
        contract: &Contract,
        plot_id: Option<plot::Id>,
        amount: i64,
    ) -> Payment {
        Payment {
            id: payment::Id::new(),
            contract_id: contract.id,
            plot_id,
            amount: ngn(amount),
            method: None,
            reference: None,
            document: None,
            note: None,
            recorded_by: None,
            idempotency_key: None,
            status: payment::Status::Pending,
            outstanding: Some(contract.balance),
            received_at: DateTime::now().coerce(),
            decided_at: None,
            created_at: DateTime::now().coerce(),
        }
    }

    fn reserved_plot() -> Plot {
        Plot {
            id: plot::Id::new(),
            number: plot::Number::new("A-1").unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: ngn(300_000),
            status: plot::Status::Reserved,
            owner_id: None,
            created_at: DateTime::now().coerce(),
        }
    }

    async fn seed(
        service: &Service<InMemory>,
        contract: &Contract,
        payment: &Payment,
        plot: Option<&Plot>,
    ) {
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(payment.clone()))
            .await
            .unwrap();
        if let Some(plot) = plot {
            service
                .database()
                .execute(Insert(plot.clone()))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn approval_debits_balance_and_sells_plot() {
        let service = service();
        let contract = contract(300_000, 0);
        let plot = reserved_plot();
        let payment = pending(&contract, Some(plot.id), 300_000);
        seed(&service, &contract, &payment, Some(&plot)).await;

        let decided = service
            .execute(DecidePendingPayment {
                payment_id: payment.id,
                decision: Decision::Approved,
            })
            .await
            .unwrap();

        assert_eq!(decided.status, payment::Status::Approved);
        assert_eq!(decided.outstanding, Some(ngn(0)));
        assert!(decided.decided_at.is_some());

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        let stored = stored.unwrap();
        assert_eq!(stored.balance, ngn(0));
        assert_eq!(stored.status, contract::Status::Completed);

        let sold: Option<Plot> = service
            .database()
            .execute(Select(By::<Option<Plot>, _>::new(plot.id)))
            .await
            .unwrap();
        let sold = sold.unwrap();
        assert_eq!(sold.status, plot::Status::Sold);
        assert_eq!(sold.owner_id, Some(contract.buyer_id));
    }

    #[tokio::test]
    async fn rejection_releases_plot_and_keeps_balance() {
        let service = service();
        let contract = contract(300_000, 0);
        let plot = reserved_plot();
        let payment = pending(&contract, Some(plot.id), 300_000);
        seed(&service, &contract, &payment, Some(&plot)).await;

        let decided = service
            .execute(DecidePendingPayment {
                payment_id: payment.id,
                decision: Decision::Rejected,
            })
            .await
            .unwrap();
        assert_eq!(decided.status, payment::Status::Rejected);

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        let stored = stored.unwrap();
        assert_eq!(stored.balance, ngn(300_000));
        assert_eq!(stored.status, contract::Status::Active);

        let released: Option<Plot> = service
            .database()
            .execute(Select(By::<Option<Plot>, _>::new(plot.id)))
            .await
            .unwrap();
        let released = released.unwrap();
        assert_eq!(released.status, plot::Status::Available);
        assert_eq!(released.owner_id, None);
    }

    #[tokio::test]
    async fn second_decision_fails_and_leaves_state_intact() {
        let service = service();
        let contract = contract(300_000, 0);
        let payment = pending(&contract, None, 300_000);
        seed(&service, &contract, &payment, None).await;

        let cmd = DecidePendingPayment {
            payment_id: payment.id,
            decision: Decision::Approved,
        };
        service.execute(cmd).await.unwrap();

        let err = service.execute(cmd).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::AlreadyDecided(_)));

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().balance, ngn(0));

        let row: Option<Payment> = service
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(payment.id)))
            .await
            .unwrap();
        assert_eq!(row.unwrap().status, payment::Status::Approved);
    }

    #[tokio::test]
    async fn fails_on_unknown_payment() {
        let service = service();

        let err = service
            .execute(DecidePendingPayment {
                payment_id: payment::Id::new(),
                decision: Decision::Rejected,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::PaymentNotFound(_)));
    }
}
