//! [`Contract`] definitions.

pub mod balance;

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Plot;
use crate::domain::{plot, user};

pub use self::balance::Statement;

/// Agreement of a buyer [`User`] to purchase one or more [`Plot`]s under a
/// payment plan.
///
/// [`User`]: crate::domain::User
#[derive(Clone, Debug)]
pub struct Contract {
    /// ID of this [`Contract`].
    pub id: Id,

    /// ID of the [`User`] buying the [`Plot`]s.
    ///
    /// [`User`]: crate::domain::User
    pub buyer_id: user::Id,

    /// Ordered non-empty list of the [`Plot`]s taken, with their agreed
    /// prices.
    pub plots: Vec<PlotPrice>,

    /// Deposit paid when this [`Contract`] was concluded.
    pub initial_deposit: Money,

    /// Free-form descriptor of the agreed payment [`Schedule`].
    pub schedule: Schedule,

    /// [`DateTime`] when the [`Plot`]s were taken.
    ///
    /// [`DateTime`]: common::DateTime
    pub acquired_at: AcquisitionDateTime,

    /// Outstanding balance of this [`Contract`].
    ///
    /// This is a derived value, written only by reconciling commands. Use
    /// [`Statement::derive()`] to recompute it from the payment history.
    pub balance: Money,

    /// [`Status`] of this [`Contract`].
    ///
    /// Derived the same way as [`Contract::balance`].
    pub status: Status,

    /// [`DateTime`] when this [`Contract`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,
}

impl Contract {
    /// Returns the [`money::Currency`] this [`Contract`] is denominated in.
    ///
    /// All the [`Money`] amounts of a single [`Contract`] share it.
    ///
    /// [`money::Currency`]: common::money::Currency
    #[must_use]
    pub fn currency(&self) -> common::money::Currency {
        self.initial_deposit.currency
    }
}

/// Agreed price of a single [`Plot`] taken by a [`Contract`].
#[derive(Clone, Copy, Debug)]
pub struct PlotPrice {
    /// ID of the taken [`Plot`].
    pub plot_id: plot::Id,

    /// Agreed price of the [`Plot`].
    pub price: Money,
}

/// ID of a [`Contract`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Free-form payment schedule descriptor of a [`Contract`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Schedule(String);

impl Schedule {
    /// Creates a new [`Schedule`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `schedule` is valid.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(schedule: impl Into<String>) -> Self {
        Self(schedule.into())
    }

    /// Creates a new [`Schedule`] if the given `schedule` is valid.
    #[must_use]
    pub fn new(schedule: impl Into<String>) -> Option<Self> {
        let schedule = schedule.into();
        Self::check(&schedule).then_some(Self(schedule))
    }

    /// Checks whether the given `schedule` is a valid [`Schedule`].
    fn check(schedule: impl AsRef<str>) -> bool {
        let schedule = schedule.as_ref();
        schedule.trim() == schedule
            && !schedule.is_empty()
            && schedule.len() <= 512
    }
}

impl FromStr for Schedule {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Schedule`")
    }
}

define_kind! {
    #[doc = "Status of a [`Contract`]."]
    enum Status {
        #[doc = "The [`Contract`] has an outstanding balance."]
        Active = 1,

        #[doc = "The [`Contract`] is fully paid."]
        Completed = 2,
    }
}

/// [`DateTime`] when a [`Contract`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Contract, unit::Creation)>;

/// Marker type indicating [`Plot`]s acquisition.
#[derive(Clone, Copy, Debug)]
pub struct Acquisition;

/// [`DateTime`] when the [`Plot`]s of a [`Contract`] were taken.
///
/// [`DateTime`]: common::DateTime
pub type AcquisitionDateTime = DateTimeOf<(Contract, Acquisition)>;
