//! [`Query`] collection related to the multiple [`Plot`]s.

use common::operations::By;

use crate::read;
#[cfg(doc)]
use crate::{domain::Plot, Query};

use super::DatabaseQuery;

/// Queries a list of [`Plot`]s.
pub type List =
    DatabaseQuery<By<read::plot::list::Page, read::plot::list::Selector>>;
