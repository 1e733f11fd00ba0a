//! [`Query`] collection related to the multiple [`Payment`]s.

use common::operations::By;

use crate::read;
#[cfg(doc)]
use crate::{domain::Payment, Query};

use super::DatabaseQuery;

/// Queries the review [`Queue`] of [`Payment`]s.
///
/// [`Queue`]: read::payment::Queue
pub type Queue =
    DatabaseQuery<By<read::payment::Queue, read::payment::QueueFilter>>;
