//! [`Query`] collection related to a single [`Contract`].

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{contract, Contract, Payment},
    infra::{database, Database},
    read, Service,
};
#[cfg(doc)]
use crate::{domain::contract::Statement, Query as _};

use super::{DatabaseQuery, Query};

/// Queries a [`Contract`] by its [`contract::Id`].
pub type ById = DatabaseQuery<By<Option<Contract>, contract::Id>>;

/// Queries a [`Contract`] along with its full [`Payment`] history and the
/// [`Statement`] derived over it.
///
/// The [`Statement`] is derived on the fly, so this read never writes.
#[derive(Clone, Copy, Debug)]
pub struct WithHistory(pub contract::Id);

impl<Db> Query<WithHistory> for Service<Db>
where
    Db: Database<
            Select<By<Option<Contract>, contract::Id>>,
            Ok = Option<Contract>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Payment>, contract::Id>>,
            Ok = Vec<Payment>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Option<read::contract::WithHistory>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        WithHistory(id): WithHistory,
    ) -> Result<Self::Ok, Self::Err> {
        let Some(contract) = self
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let payments = self
            .database()
            .execute(Select(By::<Vec<Payment>, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())?;

        Ok(Some(read::contract::WithHistory::new(contract, payments)))
    }
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
        command::RecordPayment,
        domain::{contract, payment, plot, user, Contract, Payment},
        infra::InMemory,
        Config, Service,
    };

    use super::{Query as _, WithHistory};

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

    fn approved(contract_id: contract::Id, amount: i64) -> Payment {
        Payment {
            id: payment::Id::new(),
            contract_id,
            plot_id: None,
            amount: ngn(amount),
            method: None,
            reference: None,
            document: None,
            note: None,
            recorded_by: Some(user::Id::new()),
            idempotency_key: None,
            status: payment::Status::Approved,
            outstanding: None,
            received_at: DateTime::now().coerce(),
            decided_at: Some(DateTime::now().coerce()),
            created_at: DateTime::now().coerce(),
        }
    }

    #[tokio::test]
    async fn derives_statement_without_persisting() {
        let service = service();
        let mut contract = contract(2_000_000, 0);
        // Stored balance is stale on purpose: the payment below is not
        // reflected in it.
        contract.balance = ngn(2_000_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(approved(contract.id, 500_000)))
            .await
            .unwrap();

        let read = service
            .execute(WithHistory(contract.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.statement.total_paid, ngn(500_000));
        assert_eq!(read.statement.balance, ngn(1_500_000));
        assert_eq!(read.statement.status, contract::Status::Active);

        let stored: Option<Contract> = service
            .database()
            .execute(Select(By::<Option<Contract>, _>::new(contract.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().balance, ngn(2_000_000));
    }

    #[tokio::test]
    async fn reflects_recorded_payments() {
        let service = service();
        let contract = contract(2_000_000, 500_000);
        service
            .database()
            .execute(Insert(contract.clone()))
            .await
            .unwrap();

        let out = service
            .execute(RecordPayment {
                contract_id: contract.id,
                amount: ngn(300_000),
                received_at: DateTime::now().coerce(),
                note: None,
                recorded_by: user::Id::new(),
                idempotency_key: None,
            })
            .await
            .unwrap();

        let read = service
            .execute(WithHistory(contract.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.payments.len(), 1);
        assert_eq!(read.payments[0].id, out.payment.id);
        assert_eq!(read.statement, out.statement);
        assert_eq!(read.contract.balance, read.statement.balance);
    }

    #[tokio::test]
    async fn absent_for_unknown_contract() {
        let service = service();

        let read = service
            .execute(WithHistory(contract::Id::new()))
            .await
            .unwrap();
        assert!(read.is_none());
    }
}
