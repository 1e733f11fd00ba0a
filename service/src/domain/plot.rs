//! [`Plot`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user;

/// Land plot offered for sale.
#[derive(Clone, Debug)]
pub struct Plot {
    /// ID of this [`Plot`].
    pub id: Id,

    /// Unique human-readable [`Number`] of this [`Plot`].
    pub number: Number,

    /// [`Location`] of this [`Plot`].
    pub location: Location,

    /// [`Dimension`] of this [`Plot`].
    pub dimension: Dimension,

    /// Listed price of this [`Plot`].
    pub price: Money,

    /// [`Status`] of this [`Plot`].
    pub status: Status,

    /// ID of the [`User`] owning this [`Plot`].
    ///
    /// Set iff the [`Plot`] is [`Status::Sold`].
    pub owner_id: Option<user::Id>,

    /// [`DateTime`] when this [`Plot`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`Plot`].
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

/// Unique human-readable number of a [`Plot`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Number(String);

impl Number {
    /// Creates a new [`Number`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `number` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Creates a new [`Number`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given `number` is a valid [`Number`].
    fn check(number: impl AsRef<str>) -> bool {
        let number = number.as_ref();
        number.trim() == number && !number.is_empty() && number.len() <= 64
    }
}

impl FromStr for Number {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Number`")
    }
}

/// Location of a [`Plot`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Location(String);

impl Location {
    /// Creates a new [`Location`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `location` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Creates a new [`Location`] if the given `location` is valid.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Option<Self> {
        let location = location.into();
        Self::check(&location).then_some(Self(location))
    }

    /// Checks whether the given `location` is a valid [`Location`].
    fn check(location: impl AsRef<str>) -> bool {
        let location = location.as_ref();
        location.trim() == location
            && !location.is_empty()
            && location.len() <= 512
    }
}

impl FromStr for Location {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Location`")
    }
}

/// Dimension of a [`Plot`] (e.g. `30m x 40m`).
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Dimension(String);

impl Dimension {
    /// Creates a new [`Dimension`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `dimension` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(dimension: impl Into<String>) -> Self {
        Self(dimension.into())
    }

    /// Creates a new [`Dimension`] if the given `dimension` is valid.
    #[must_use]
    pub fn new(dimension: impl Into<String>) -> Option<Self> {
        let dimension = dimension.into();
        Self::check(&dimension).then_some(Self(dimension))
    }

    /// Checks whether the given `dimension` is a valid [`Dimension`].
    fn check(dimension: impl AsRef<str>) -> bool {
        let dimension = dimension.as_ref();
        dimension.trim() == dimension
            && !dimension.is_empty()
            && dimension.len() <= 128
    }
}

impl FromStr for Dimension {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Dimension`")
    }
}

define_kind! {
    #[doc = "Status of a [`Plot`]."]
    enum Status {
        #[doc = "The [`Plot`] is open for sale."]
        Available = 1,

        #[doc = "The [`Plot`] is held by a pending payment submission."]
        Reserved = 2,

        #[doc = "The [`Plot`] is sold and owned."]
        Sold = 3,
    }
}

/// [`DateTime`] when a [`Plot`] was created.
pub type CreationDateTime = DateTimeOf<(Plot, unit::Creation)>;
