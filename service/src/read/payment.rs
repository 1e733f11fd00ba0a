//! [`Payment`]-related read definitions.

use derive_more::Deref;

use crate::domain::{contract, Payment};

/// Review queue of [`Payment`]s: pending rows first, then the decided ones,
/// newest first within each group.
#[derive(Clone, Debug, Deref)]
pub struct Queue(pub Vec<Payment>);

impl Queue {
    /// Maximum number of [`Payment`]s a [`Queue`] read returns.
    pub const LIMIT: usize = 100;
}

/// Filter for selecting a [`Queue`].
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFilter {
    /// ID of the contract to narrow the [`Queue`] to.
    pub contract_id: Option<contract::Id>,
}
