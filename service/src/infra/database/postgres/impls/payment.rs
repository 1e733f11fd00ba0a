//! [`Payment`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{contract, payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Column list selected by every [`Payment`] query.
const COLUMNS: &str = "\
    id, contract_id, plot_id, \
    amount, amount_currency, \
    method, reference, document, note, \
    recorded_by, idempotency_key, status, \
    outstanding, outstanding_currency, \
    received_at, decided_at, created_at";

/// Decodes a [`Payment`] out of the provided [`Row`].
fn decode(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        contract_id: row.get("contract_id"),
        plot_id: row.get("plot_id"),
        amount: Money {
            amount: row.get("amount"),
            currency: row.get("amount_currency"),
        },
        method: row.get("method"),
        reference: row.get("reference"),
        document: row.get("document"),
        note: row.get("note"),
        recorded_by: row.get("recorded_by"),
        idempotency_key: row.get("idempotency_key"),
        status: row.get("status"),
        outstanding: row.get::<_, Option<_>>("outstanding").map(|amount| {
            Money {
                amount,
                currency: row.get("outstanding_currency"),
            }
        }),
        received_at: row.get("received_at"),
        decided_at: row.get("decided_at"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: payment::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(decode))
    }
}

impl<C> Database<Select<By<Vec<Payment>, contract::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Payment>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let contract_id: contract::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE contract_id = $1::UUID \
             ORDER BY received_at ASC, created_at ASC, id ASC",
        );
        self.query(&sql, &[&contract_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows.iter().map(decode).collect())
    }
}

impl<C>
    Database<
        Select<By<Option<Payment>, (contract::Id, payment::IdempotencyKey)>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<Payment>, (contract::Id, payment::IdempotencyKey)>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (contract_id, key) = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE contract_id = $1::UUID \
               AND idempotency_key = $2::VARCHAR \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&contract_id, &key])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(decode))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Payment>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(payment)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO payments (\
                id, contract_id, plot_id, \
                amount, amount_currency, \
                method, reference, document, note, \
                recorded_by, idempotency_key, status, \
                outstanding, outstanding_currency, \
                received_at, decided_at, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, \
                $4::NUMERIC, $5::INT2, \
                $6::VARCHAR, $7::VARCHAR, $8::VARCHAR, $9::VARCHAR, \
                $10::UUID, $11::VARCHAR, $12::INT2, \
                $13::NUMERIC, $14::INT2, \
                $15::TIMESTAMPTZ, $16::TIMESTAMPTZ, $17::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status, \
                outstanding = EXCLUDED.outstanding, \
                outstanding_currency = EXCLUDED.outstanding_currency, \
                decided_at = EXCLUDED.decided_at";
        self.exec(
            SQL,
            &[
                &payment.id,
                &payment.contract_id,
                &payment.plot_id,
                &payment.amount.amount,
                &payment.amount.currency,
                &payment.method,
                &payment.reference,
                &payment.document,
                &payment.note,
                &payment.recorded_by,
                &payment.idempotency_key,
                &payment.status,
                &payment.outstanding.map(|o| o.amount),
                &payment.outstanding.map(|o| o.currency),
                &payment.received_at,
                &payment.decided_at,
                &payment.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<read::payment::Queue, read::payment::QueueFilter>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::payment::Queue;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::payment::Queue, read::payment::QueueFilter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::payment::QueueFilter { contract_id } = by.into_inner();

        let limit = i32::try_from(read::payment::Queue::LIMIT).unwrap();

        let mut ps: Vec<&(dyn ToSql + Sync)> =
            vec![&payment::Status::Pending, &limit];
        let contract_idx = contract_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE true \
                   {contract_filtering} \
             ORDER BY (status = $1::INT2) DESC, \
                      received_at DESC, created_at DESC \
             LIMIT $2::INT4",
            contract_filtering =
                contract_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND contract_id = ${idx}::UUID"))
                }),
        );
        self.query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| {
                read::payment::Queue(rows.iter().map(decode).collect())
            })
    }
}
