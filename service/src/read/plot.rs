//! [`Plot`]-related read definitions.

use derive_more::Deref;

#[cfg(doc)]
use crate::domain::Plot;

/// Indicator whether a [`Plot`] is referenced by any contract or payment.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct InUse(pub bool);

impl PartialEq<bool> for InUse {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}

pub mod list {
    //! [`Plot`]s list definitions.

    use common::define_pagination;

    use crate::domain::{plot, Plot};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = Plot;

    /// Cursor pointing to a specific [`Plot`] in a list.
    pub type Cursor = plot::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// [`plot::Status`] to filter by.
        pub status: Option<plot::Status>,
    }
}
