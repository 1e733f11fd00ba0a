//! [`Contract`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{contract, Contract},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C, IDs> Database<Select<By<HashMap<contract::Id, Contract>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[contract::Id]>,
{
    type Ok = HashMap<contract::Id, Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<contract::Id, Contract>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[contract::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        const SQL: &str = "\
            SELECT id, buyer_id, \
                   initial_deposit, initial_deposit_currency, \
                   schedule, acquired_at, \
                   balance, balance_currency, \
                   status, created_at \
            FROM contracts \
            WHERE id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
            LIMIT $2::INT4";
        let mut contracts = self
            .query(SQL, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                let contract = Contract {
                    id,
                    buyer_id: row.get("buyer_id"),
                    plots: Vec::new(),
                    initial_deposit: Money {
                        amount: row.get("initial_deposit"),
                        currency: row.get("initial_deposit_currency"),
                    },
                    schedule: row.get("schedule"),
                    acquired_at: row.get("acquired_at"),
                    balance: Money {
                        amount: row.get("balance"),
                        currency: row.get("balance_currency"),
                    },
                    status: row.get("status"),
                    created_at: row.get("created_at"),
                };
                (id, contract)
            })
            .collect::<HashMap<_, _>>();

        const PLOTS_SQL: &str = "\
            SELECT contract_id, plot_id, price, price_currency \
            FROM contract_plots \
            WHERE contract_id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
            ORDER BY position ASC";
        for row in self
            .query(PLOTS_SQL, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
        {
            let contract_id: contract::Id = row.get("contract_id");
            if let Some(contract) = contracts.get_mut(&contract_id) {
                contract.plots.push(contract::PlotPrice {
                    plot_id: row.get("plot_id"),
                    price: Money {
                        amount: row.get("price"),
                        currency: row.get("price_currency"),
                    },
                });
            }
        }

        Ok(contracts)
    }
}

impl<C> Database<Select<By<Option<Contract>, contract::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<contract::Id, Contract>, [contract::Id; 1]>>,
        Ok = HashMap<contract::Id, Contract>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Contract>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Insert<Contract>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Contract>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(contract): Insert<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(contract))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Contract>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(contract): Update<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO contracts (\
                id, buyer_id, \
                initial_deposit, initial_deposit_currency, \
                schedule, acquired_at, \
                balance, balance_currency, \
                status, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, \
                $3::NUMERIC, $4::INT2, \
                $5::VARCHAR, $6::TIMESTAMPTZ, \
                $7::NUMERIC, $8::INT2, \
                $9::INT2, $10::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET buyer_id = EXCLUDED.buyer_id, \
                initial_deposit = EXCLUDED.initial_deposit, \
                initial_deposit_currency = \
                    EXCLUDED.initial_deposit_currency, \
                schedule = EXCLUDED.schedule, \
                acquired_at = EXCLUDED.acquired_at, \
                balance = EXCLUDED.balance, \
                balance_currency = EXCLUDED.balance_currency, \
                status = EXCLUDED.status, \
                created_at = EXCLUDED.created_at";
        self.exec(
            SQL,
            &[
                &contract.id,
                &contract.buyer_id,
                &contract.initial_deposit.amount,
                &contract.initial_deposit.currency,
                &contract.schedule,
                &contract.acquired_at,
                &contract.balance.amount,
                &contract.balance.currency,
                &contract.status,
                &contract.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)?;

        const DELETE_PLOTS_SQL: &str = "\
            DELETE FROM contract_plots \
            WHERE contract_id = $1::UUID";
        self.exec(DELETE_PLOTS_SQL, &[&contract.id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;

        const INSERT_PLOT_SQL: &str = "\
            INSERT INTO contract_plots (\
                contract_id, plot_id, position, price, price_currency\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT4, $4::NUMERIC, $5::INT2\
            )";
        for (position, plot) in contract.plots.iter().enumerate() {
            let position = i32::try_from(position).unwrap();
            self.exec(
                INSERT_PLOT_SQL,
                &[
                    &contract.id,
                    &plot.plot_id,
                    &position,
                    &plot.price.amount,
                    &plot.price.currency,
                ],
            )
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;
        }

        Ok(())
    }
}

impl<C> Database<Lock<By<Contract, contract::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Contract, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: contract::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id FROM contracts \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C>
    Database<
        Select<By<read::contract::list::Page, read::contract::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<contract::Id, Contract>, Vec<contract::Id>>>,
        Ok = HashMap<contract::Id, Contract>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::contract::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::contract::list::Page, read::contract::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::contract::list::Selector {
            arguments,
            filter: read::contract::list::Filter { status },
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
            "SELECT id \
             FROM contracts \
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
        let ids = rows
            .into_iter()
            .take(arguments.limit())
            .map(|row| row.get("id"))
            .collect::<Vec<contract::Id>>();

        let mut contracts = self
            .execute(Select(By::<HashMap<contract::Id, Contract>, _>::new(
                ids.clone(),
            )))
            .await
            .map_err(tracerr::wrap!())?;

        let edges = ids
            .into_iter()
            .filter_map(|id| contracts.remove(&id).map(|c| (id, c)))
            .collect::<Vec<_>>();

        Ok(read::contract::list::Page::new(&arguments, edges, has_more))
    }
}
