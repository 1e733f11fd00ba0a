//! [`User`]-related read definitions.

use derive_more::Deref;

#[cfg(doc)]
use crate::domain::{user::Role, User};

/// Indicator whether any non-deleted [`User`] with the [`Role::Admin`]
/// exists.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct HasAdmins(pub bool);

impl PartialEq<bool> for HasAdmins {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}
