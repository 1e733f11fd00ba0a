//! In-memory [`Database`] implementation.
//!
//! Keeps the whole state behind a single [`Mutex`], so transactions are
//! globally serialized: a [`Transact`]ed handle holds the lock until it's
//! either committed or dropped.

use std::{
    cmp,
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex as SyncMutex},
};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use itertools::Itertools as _;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;
use uuid::Uuid;

use crate::{
    domain::{contract, payment, plot, user, Contract, Payment, Plot, User},
    infra::{database, Database},
    read,
};

/// Error of an [`InMemory`] database operation.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Transaction has been committed already.
    #[display("Transaction has been committed already")]
    AlreadyCommitted,
}

/// Whole state of an [`InMemory`] database.
#[derive(Clone, Debug, Default)]
struct State {
    /// Stored [`Contract`]s.
    contracts: HashMap<contract::Id, Contract>,

    /// Stored [`Payment`]s.
    payments: HashMap<payment::Id, Payment>,

    /// Stored [`Plot`]s.
    plots: HashMap<plot::Id, Plot>,

    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,
}

/// In-memory [`Database`].
#[derive(Clone, Debug)]
pub struct InMemory<C = NonTx>(C);

impl InMemory {
    /// Creates a new empty [`InMemory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self(NonTx::default())
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-transactional [`InMemory`] client.
#[derive(Clone, Debug, Default)]
pub struct NonTx(Arc<Mutex<State>>);

/// Transactional [`InMemory`] client.
///
/// Stages all the changes on a [`State`] copy, writing it back on [`Commit`]
/// only.
#[derive(Clone, Debug)]
pub struct Tx(Arc<SyncMutex<Inner>>);

/// Inner state of a [`Tx`] client.
#[derive(Debug)]
struct Inner {
    /// Guard holding the whole [`InMemory`] database locked.
    ///
    /// [`None`] once the transaction is committed.
    guard: Option<OwnedMutexGuard<State>>,

    /// [`State`] copy the transaction stages its changes on.
    staged: State,
}

/// [`State`] accessor of an [`InMemory`] client.
trait Store {
    /// Runs the provided function on the [`State`].
    fn with<R>(
        &self,
        f: impl FnOnce(&State) -> R + Send,
    ) -> impl Future<Output = R> + Send;

    /// Runs the provided function on the mutable [`State`].
    fn with_mut<R>(
        &self,
        f: impl FnOnce(&mut State) -> R + Send,
    ) -> impl Future<Output = R> + Send;
}

impl Store for NonTx {
    async fn with<R>(&self, f: impl FnOnce(&State) -> R + Send) -> R {
        f(&*self.0.lock().await)
    }

    async fn with_mut<R>(&self, f: impl FnOnce(&mut State) -> R + Send) -> R {
        f(&mut *self.0.lock().await)
    }
}

impl Store for Tx {
    async fn with<R>(&self, f: impl FnOnce(&State) -> R + Send) -> R {
        f(&self.0.lock().expect("state mutex poisoned").staged)
    }

    async fn with_mut<R>(&self, f: impl FnOnce(&mut State) -> R + Send) -> R {
        f(&mut self.0.lock().expect("state mutex poisoned").staged)
    }
}

impl Database<Transact> for InMemory<NonTx> {
    type Ok = InMemory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let guard = Arc::clone(&self.0 .0).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemory(Tx(Arc::new(SyncMutex::new(Inner {
            guard: Some(guard),
            staged,
        })))))
    }
}

impl Database<Transact> for InMemory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for InMemory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        let mut inner = self.0 .0.lock().expect("state mutex poisoned");
        let mut guard = inner
            .guard
            .take()
            .ok_or_else(|| tracerr::new!(Error::AlreadyCommitted))
            .map_err(tracerr::map_from)?;
        *guard = inner.staged.clone();
        Ok(())
    }
}

// Row locks are provided by the global `State` lock itself.

impl<C: Store> Database<Lock<By<Contract, contract::Id>>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Contract, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<C: Store> Database<Lock<By<Plot, plot::Id>>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Plot, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<C: Store> Database<Select<By<Option<Contract>, contract::Id>>>
    for InMemory<C>
{
    type Ok = Option<Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Contract>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.with(move |s| s.contracts.get(&id).cloned()).await)
    }
}

impl<C: Store, IDs> Database<Select<By<HashMap<contract::Id, Contract>, IDs>>>
    for InMemory<C>
where
    IDs: AsRef<[contract::Id]> + Send,
{
    type Ok = HashMap<contract::Id, Contract>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<contract::Id, Contract>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                ids.as_ref()
                    .iter()
                    .filter_map(|id| {
                        s.contracts.get(id).cloned().map(|c| (*id, c))
                    })
                    .collect()
            })
            .await)
    }
}

impl<C: Store> Database<Insert<Contract>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(contract): Insert<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(contract)).await
    }
}

impl<C: Store> Database<Update<Contract>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(contract): Update<Contract>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_mut(move |s| {
                _ = s.contracts.insert(contract.id, contract);
            })
            .await;
        Ok(())
    }
}

impl<C: Store>
    Database<
        Select<By<read::contract::list::Page, read::contract::list::Selector>>,
    > for InMemory<C>
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

        Ok(self
            .0
            .with(move |s| {
                let nodes = s
                    .contracts
                    .values()
                    .filter(|c| status.is_none_or(|st| c.status == st))
                    .cloned()
                    .collect::<Vec<_>>();
                page(&arguments, nodes, |c| c.id)
            })
            .await)
    }
}

impl<C: Store> Database<Select<By<Option<Payment>, payment::Id>>>
    for InMemory<C>
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.with(move |s| s.payments.get(&id).cloned()).await)
    }
}

impl<C: Store> Database<Select<By<Vec<Payment>, contract::Id>>>
    for InMemory<C>
{
    type Ok = Vec<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Payment>, contract::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let contract_id = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                s.payments
                    .values()
                    .filter(|p| p.contract_id == contract_id)
                    .cloned()
                    .sorted_by_key(|p| {
                        (p.received_at, p.created_at, Uuid::from(p.id))
                    })
                    .collect()
            })
            .await)
    }
}

impl<C: Store>
    Database<Select<By<Option<Payment>, (contract::Id, payment::IdempotencyKey)>>>
    for InMemory<C>
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
        Ok(self
            .0
            .with(move |s| {
                s.payments
                    .values()
                    .find(|p| {
                        p.contract_id == contract_id
                            && p.idempotency_key.as_ref() == Some(&key)
                    })
                    .cloned()
            })
            .await)
    }
}

impl<C: Store> Database<Insert<Payment>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(payment)).await
    }
}

impl<C: Store> Database<Update<Payment>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_mut(move |s| {
                _ = s.payments.insert(payment.id, payment);
            })
            .await;
        Ok(())
    }
}

impl<C: Store> Database<Select<By<read::payment::Queue, read::payment::QueueFilter>>>
    for InMemory<C>
{
    type Ok = read::payment::Queue;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::payment::Queue, read::payment::QueueFilter>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::payment::QueueFilter { contract_id } = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                read::payment::Queue(
                    s.payments
                        .values()
                        .filter(|p| {
                            contract_id.is_none_or(|id| p.contract_id == id)
                        })
                        .cloned()
                        .sorted_by_key(|p| {
                            (
                                p.status != payment::Status::Pending,
                                cmp::Reverse((
                                    p.received_at,
                                    p.created_at,
                                    Uuid::from(p.id),
                                )),
                            )
                        })
                        .take(read::payment::Queue::LIMIT)
                        .collect(),
                )
            })
            .await)
    }
}

impl<C: Store> Database<Select<By<Option<Plot>, plot::Id>>> for InMemory<C> {
    type Ok = Option<Plot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Plot>, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.with(move |s| s.plots.get(&id).cloned()).await)
    }
}

impl<C: Store, IDs> Database<Select<By<HashMap<plot::Id, Plot>, IDs>>>
    for InMemory<C>
where
    IDs: AsRef<[plot::Id]> + Send,
{
    type Ok = HashMap<plot::Id, Plot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<plot::Id, Plot>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                ids.as_ref()
                    .iter()
                    .filter_map(|id| s.plots.get(id).cloned().map(|p| (*id, p)))
                    .collect()
            })
            .await)
    }
}

impl<'n, C: Store> Database<Select<By<Option<Plot>, &'n plot::Number>>>
    for InMemory<C>
{
    type Ok = Option<Plot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Plot>, &'n plot::Number>>,
    ) -> Result<Self::Ok, Self::Err> {
        let number = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                s.plots.values().find(|p| p.number == *number).cloned()
            })
            .await)
    }
}

impl<C: Store> Database<Insert<Plot>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(plot): Insert<Plot>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(plot)).await
    }
}

impl<C: Store> Database<Update<Plot>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(plot): Update<Plot>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_mut(move |s| {
                _ = s.plots.insert(plot.id, plot);
            })
            .await;
        Ok(())
    }
}

impl<C: Store> Database<Delete<By<Plot, plot::Id>>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Plot, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with_mut(move |s| {
                _ = s.plots.remove(&id);
            })
            .await;
        Ok(())
    }
}

impl<C: Store> Database<Select<By<read::plot::InUse, plot::Id>>>
    for InMemory<C>
{
    type Ok = read::plot::InUse;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::plot::InUse, plot::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                read::plot::InUse(
                    s.contracts
                        .values()
                        .any(|c| c.plots.iter().any(|p| p.plot_id == id))
                        || s.payments.values().any(|p| p.plot_id == Some(id)),
                )
            })
            .await)
    }
}

impl<C: Store>
    Database<Select<By<read::plot::list::Page, read::plot::list::Selector>>>
    for InMemory<C>
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

        Ok(self
            .0
            .with(move |s| {
                let nodes = s
                    .plots
                    .values()
                    .filter(|p| status.is_none_or(|st| p.status == st))
                    .cloned()
                    .collect::<Vec<_>>();
                page(&arguments, nodes, |p| p.id)
            })
            .await)
    }
}

impl<C: Store> Database<Select<By<Option<User>, user::Id>>> for InMemory<C> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.with(move |s| s.users.get(&id).cloned()).await)
    }
}

impl<'e, C: Store> Database<Select<By<Option<User>, &'e user::Email>>>
    for InMemory<C>
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'e user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .0
            .with(move |s| {
                s.users.values().find(|u| u.email == *email).cloned()
            })
            .await)
    }
}

impl<C: Store> Database<Insert<User>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(user)).await
    }
}

impl<C: Store> Database<Update<User>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_mut(move |s| {
                _ = s.users.insert(user.id, user);
            })
            .await;
        Ok(())
    }
}

impl<C: Store> Database<Select<By<read::user::HasAdmins, ()>>>
    for InMemory<C>
{
    type Ok = read::user::HasAdmins;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<read::user::HasAdmins, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .0
            .with(|s| {
                read::user::HasAdmins(s.users.values().any(|u| {
                    u.role == user::Role::Admin && u.deleted_at.is_none()
                }))
            })
            .await)
    }
}

/// Paginates the provided nodes by their [`Uuid`] cursor.
fn page<N, C>(
    arguments: &common::pagination::Arguments<C>,
    nodes: Vec<N>,
    cursor: impl Fn(&N) -> C,
) -> common::pagination::Page<C, N>
where
    C: Copy + Into<Uuid>,
{
    let mut nodes = nodes
        .into_iter()
        .sorted_by_key(|n| cursor(n).into())
        .collect::<Vec<_>>();
    if arguments.kind().order() == common::pagination::Order::Descending {
        nodes.reverse();
    }
    let after = arguments.cursor().map(|c| {
        let op = arguments.kind().operator();
        let boundary: Uuid = (*c).into();
        move |id: Uuid| match op {
            ">" => id > boundary,
            ">=" => id >= boundary,
            "<" => id < boundary,
            _ => id <= boundary,
        }
    });
    let matching = nodes
        .into_iter()
        .filter(|n| after.as_ref().is_none_or(|keep| keep(cursor(n).into())))
        .collect::<Vec<_>>();

    let has_more = matching.len() > arguments.limit();
    let edges = matching
        .into_iter()
        .take(arguments.limit())
        .map(|n| (cursor(&n), n))
        .collect::<Vec<_>>();

    common::pagination::Page::new(arguments, edges, has_more)
}

#[cfg(test)]
mod spec {
    use common::{
        money::Currency,
        operations::{By, Commit, Insert, Select, Transact, Update},
        DateTime, Money,
    };
    use rust_decimal::Decimal;

    use crate::domain::{plot, Plot};

    use super::{Database as _, InMemory};

    fn plot() -> Plot {
        Plot {
            id: plot::Id::new(),
            number: plot::Number::new("A-01").unwrap(),
            location: plot::Location::new("Lekki Phase 1").unwrap(),
            dimension: plot::Dimension::new("600sqm").unwrap(),
            price: Money {
                amount: Decimal::from(5_000_000),
                currency: Currency::Ngn,
            },
            status: plot::Status::Available,
            owner_id: None,
            created_at: DateTime::now().coerce(),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_discards_staged_writes() {
        let db = InMemory::new();
        let existing = plot();
        db.execute(Insert(existing.clone())).await.unwrap();

        let staged = plot();
        {
            let tx = db.execute(Transact).await.unwrap();
            tx.execute(Insert(staged.clone())).await.unwrap();
            let mut updated = existing.clone();
            updated.status = plot::Status::Reserved;
            tx.execute(Update(updated)).await.unwrap();
        }

        let inserted: Option<Plot> = db
            .execute(Select(By::<Option<Plot>, _>::new(staged.id)))
            .await
            .unwrap();
        assert!(inserted.is_none());

        let stored: Option<Plot> = db
            .execute(Select(By::<Option<Plot>, _>::new(existing.id)))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().status, plot::Status::Available);
    }

    #[tokio::test]
    async fn commit_publishes_staged_writes() {
        let db = InMemory::new();
        let staged = plot();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(staged.clone())).await.unwrap();
        tx.execute(Commit).await.unwrap();

        let stored: Option<Plot> = db
            .execute(Select(By::<Option<Plot>, _>::new(staged.id)))
            .await
            .unwrap();
        assert!(stored.is_some());
    }
}
