//! [`Session`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::DateTimeOf;
use derive_more::{AsRef, Display, FromStr};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user;

/// User session.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Session {
    /// ID of the [`User`] this [`Session`] belongs to.
    pub user_id: user::Id,

    /// [`Role`] of the [`User`] this [`Session`] belongs to.
    ///
    /// [`Role`]: user::Role
    #[serde(with = "role")]
    pub role: user::Role,

    /// [`DateTime`] when this [`Session`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,
}

/// Access token of a [`Session`].
#[derive(AsRef, Clone, Debug, Display, FromStr)]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a valid [`Token`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }
}

mod role {
    //! Serialization of a [`user::Role`] as its numeric representation.

    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    use crate::domain::user;

    /// Serializes the [`user::Role`] as its [`u8`] representation.
    pub(super) fn serialize<S>(
        role: &user::Role,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(role.u8())
    }

    /// Deserializes a [`user::Role`] from its [`u8`] representation.
    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<user::Role, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            v if v == user::Role::Admin.u8() => Ok(user::Role::Admin),
            v if v == user::Role::Buyer.u8() => Ok(user::Role::Buyer),
            v => Err(D::Error::custom(format!("invalid `Role` value: {v}"))),
        }
    }
}

/// Marker type indicating [`Session`] expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// [`DateTime`] of a [`Session`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Session, Expiration)>;
