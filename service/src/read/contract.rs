//! [`Contract`]-related read definitions.

use crate::domain::{contract::Statement, Contract, Payment};

/// [`Contract`] with its full [`Payment`] history and the [`Statement`]
/// derived over it.
///
/// The [`Statement`] is recomputed on every read and is never persisted by
/// the read path.
#[derive(Clone, Debug)]
pub struct WithHistory {
    /// The [`Contract`] itself.
    pub contract: Contract,

    /// Full [`Payment`] history of the [`Contract`].
    pub payments: Vec<Payment>,

    /// [`Statement`] derived over the history.
    pub statement: Statement,
}

impl WithHistory {
    /// Assembles a new [`WithHistory`] from the provided [`Contract`] and its
    /// [`Payment`] history.
    #[must_use]
    pub fn new(contract: Contract, payments: Vec<Payment>) -> Self {
        let statement = Statement::derive(&contract, &payments);
        Self {
            contract,
            payments,
            statement,
        }
    }
}

pub mod list {
    //! [`Contract`]s list definitions.

    use common::define_pagination;

    use crate::domain::{contract, Contract};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = Contract;

    /// Cursor pointing to a specific [`Contract`] in a list.
    pub type Cursor = contract::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// [`contract::Status`] to filter by.
        pub status: Option<contract::Status>,
    }
}
