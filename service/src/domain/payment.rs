//! [`Payment`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Contract, Plot, User};
use crate::domain::{contract, plot, user};

/// Payment against a [`Contract`].
///
/// Covers both directly recorded entries (inserted in [`Status::Approved`])
/// and pending submissions awaiting a decision.
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`Contract`] this [`Payment`] is made against.
    pub contract_id: contract::Id,

    /// ID of the [`Plot`] this [`Payment`] is linked to, if any.
    pub plot_id: Option<plot::Id>,

    /// Paid amount.
    ///
    /// Always positive.
    pub amount: Money,

    /// [`Method`] this [`Payment`] was made with.
    pub method: Option<Method>,

    /// Transaction [`Reference`] of this [`Payment`].
    pub reference: Option<Reference>,

    /// Supporting [`Document`] reference of this [`Payment`].
    pub document: Option<Document>,

    /// Free-form [`Note`] attached to this [`Payment`].
    pub note: Option<Note>,

    /// ID of the admin [`User`] who recorded this [`Payment`] directly, if
    /// it was.
    pub recorded_by: Option<user::Id>,

    /// [`IdempotencyKey`] deduplicating retried submissions.
    ///
    /// Unique per [`Contract`].
    pub idempotency_key: Option<IdempotencyKey>,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// Outstanding [`Contract`] balance as of the latest transition of this
    /// [`Payment`].
    ///
    /// Snapshotted on submission and overwritten when the [`Payment`]
    /// becomes [`Status::Approved`].
    pub outstanding: Option<Money>,

    /// [`DateTime`] when the money was received.
    pub received_at: ReceptionDateTime,

    /// [`DateTime`] when this [`Payment`] was approved or rejected, if it
    /// was.
    pub decided_at: Option<DecisionDateTime>,

    /// [`DateTime`] when this [`Payment`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`Payment`].
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

/// Method a [`Payment`] was made with (e.g. `bank transfer`).
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Method(String);

impl Method {
    /// Creates a new [`Method`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `method` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(method: impl Into<String>) -> Self {
        Self(method.into())
    }

    /// Creates a new [`Method`] if the given `method` is valid.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Option<Self> {
        let method = method.into();
        Self::check(&method).then_some(Self(method))
    }

    /// Checks whether the given `method` is a valid [`Method`].
    fn check(method: impl AsRef<str>) -> bool {
        let method = method.as_ref();
        method.trim() == method && !method.is_empty() && method.len() <= 128
    }
}

impl FromStr for Method {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Method`")
    }
}

/// Transaction reference of a [`Payment`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reference(String);

impl Reference {
    /// Creates a new [`Reference`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `reference` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Creates a new [`Reference`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        Self::check(&reference).then_some(Self(reference))
    }

    /// Checks whether the given `reference` is a valid [`Reference`].
    fn check(reference: impl AsRef<str>) -> bool {
        let reference = reference.as_ref();
        reference.trim() == reference
            && !reference.is_empty()
            && reference.len() <= 256
    }
}

impl FromStr for Reference {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reference`")
    }
}

/// Supporting document reference of a [`Payment`].
///
/// Only the reference is stored, the document itself lives elsewhere.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Document(String);

impl Document {
    /// Creates a new [`Document`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `document` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(document: impl Into<String>) -> Self {
        Self(document.into())
    }

    /// Creates a new [`Document`] if the given `document` is valid.
    #[must_use]
    pub fn new(document: impl Into<String>) -> Option<Self> {
        let document = document.into();
        Self::check(&document).then_some(Self(document))
    }

    /// Checks whether the given `document` is a valid [`Document`].
    fn check(document: impl AsRef<str>) -> bool {
        let document = document.as_ref();
        document.trim() == document
            && !document.is_empty()
            && document.len() <= 512
    }
}

impl FromStr for Document {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Document`")
    }
}

/// Free-form note attached to a [`Payment`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Note(String);

impl Note {
    /// Creates a new [`Note`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `note` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(note: impl Into<String>) -> Self {
        Self(note.into())
    }

    /// Creates a new [`Note`] if the given `note` is valid.
    #[must_use]
    pub fn new(note: impl Into<String>) -> Option<Self> {
        let note = note.into();
        Self::check(&note).then_some(Self(note))
    }

    /// Checks whether the given `note` is a valid [`Note`].
    fn check(note: impl AsRef<str>) -> bool {
        let note = note.as_ref();
        note.trim() == note && !note.is_empty() && note.len() <= 1024
    }
}

impl FromStr for Note {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Note`")
    }
}

/// Client-supplied key deduplicating retried [`Payment`] submissions.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a new [`IdempotencyKey`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `key` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates a new [`IdempotencyKey`] if the given `key` is valid.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        Self::check(&key).then_some(Self(key))
    }

    /// Checks whether the given `key` is a valid [`IdempotencyKey`].
    fn check(key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        key.trim() == key && !key.is_empty() && key.len() <= 128
    }
}

impl FromStr for IdempotencyKey {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `IdempotencyKey`")
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "The [`Payment`] awaits an admin decision."]
        Pending = 1,

        #[doc = "The [`Payment`] counts toward the [`Contract`] balance."]
        Approved = 2,

        #[doc = "The [`Payment`] was rejected and never counts."]
        Rejected = 3,
    }
}

/// [`DateTime`] when the money of a [`Payment`] was received.
pub type ReceptionDateTime = DateTimeOf<(Payment, unit::Reception)>;

/// [`DateTime`] when a [`Payment`] was approved or rejected.
pub type DecisionDateTime = DateTimeOf<(Payment, unit::Decision)>;

/// [`DateTime`] when a [`Payment`] was created.
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;
