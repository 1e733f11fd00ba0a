//! [`Plot`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Delete, Insert, Lock, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{plot, Plot},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Column list selected by every [`Plot`] query.
const COLUMNS: &str = "\
    id, number, location, dimension, \
    price, price_currency, \
    status, owner_id, created_at";

/// Decodes a [`Plot`] out of the provided [`Row`].
fn decode(row: &Row) -> Plot {
    Plot {
        id: row.get("id"),
        number: row.get("number"),
        location: row.get("location"),
        dimension: row.get("dimension"),
        price: Money {
            amount: row.get("price"),
            currency: row.get("price_currency"),
        },
        status: row.get("status"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
    }
}

impl<C, IDs> Database<Select<By<HashMap<plot::Id, Plot>, IDs>>> for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[plot::Id]>,
{
    type Ok = HashMap<plot::Id, Plot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<plot::Id, Plot>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[plot::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM plots \
             WHERE id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
             LIMIT $2::INT4",
        );
        self.query(&sql, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        let plot = decode(row);
                        (plot.id, plot)
                    })
                    .collect()
            })
    }
}

impl<C> Database<Select<By<Option<Plot>, plot::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<plot::Id, Plot>, [plot::Id; 1]>>,
        Ok = HashMap<plot::Id, Plot>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Plot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Plot>, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<'n, C> Database<Select<By<Option<Plot>, &'n plot::Number>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Plot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Plot>, &'n plot::Number>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let number: &plot::Number = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM plots \
             WHERE number = $1::VARCHAR \
             LIMIT 1",
        );
        self.query_opt(&sql, &[number])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(decode))
    }
}

impl<C> Database<Insert<Plot>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Plot>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(plot): Insert<Plot>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(plot)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Plot>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(plot): Update<Plot>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO plots (\
                id, number, location, dimension, \
                price, price_currency, \
                status, owner_id, created_at\
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::VARCHAR, $4::VARCHAR, \
                $5::NUMERIC, $6::INT2, \
                $7::INT2, $8::UUID, $9::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET number = EXCLUDED.number, \
                location = EXCLUDED.location, \
                dimension = EXCLUDED.dimension, \
                price = EXCLUDED.price, \
                price_currency = EXCLUDED.price_currency, \
                status = EXCLUDED.status, \
                owner_id = EXCLUDED.owner_id, \
                created_at = EXCLUDED.created_at";
        self.exec(
            SQL,
            &[
                &plot.id,
                &plot.number,
                &plot.location,
                &plot.dimension,
                &plot.price.amount,
                &plot.price.currency,
                &plot.status,
                &plot.owner_id,
                &plot.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<Plot, plot::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Plot, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: plot::Id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM plots \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<Plot, plot::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Plot, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: plot::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id FROM plots \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<read::plot::InUse, plot::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::plot::InUse;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::plot::InUse, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: plot::Id = by.into_inner();

        const SQL: &str = "\
            SELECT EXISTS(\
                SELECT 1 FROM contract_plots WHERE plot_id = $1::UUID\
            ) OR EXISTS(\
                SELECT 1 FROM payments WHERE plot_id = $1::UUID\
            ) AS in_use";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                read::plot::InUse(
                    row.expect("always exists").get::<_, bool>("in_use"),
                )
            })
    }
}

impl<C> Database<Select<By<read::plot::list::Page, read::plot::list::Selector>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::plot::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::plot::list::Page, read::plot::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::plot::list::Selector {
            arguments,
            filter: read::plot::list::Filter { status },
        } = by.into_inner();

        let limit = i32::try_from(arguments.limit()).unwrap() + 1;

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });
        let status_idx = status.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });

        let order = arguments.kind().order().sql();
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM plots \
             WHERE true \
                   {cursor} \
                   {status_filtering} \
             ORDER BY id {order} \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND id {op} ${idx}::UUID"))
            }),
            status_filtering =
                status_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND status = ${idx}::INT2"))
                }),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        let has_more = rows.len() > arguments.limit();
        let edges = rows
            .iter()
            .take(arguments.limit())
            .map(|row| {
                let plot = decode(row);
                (plot.id, plot)
            })
            .collect::<Vec<_>>();

        Ok(read::plot::list::Page::new(&arguments, edges, has_more))
    }
}
