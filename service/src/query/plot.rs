//! [`Query`] collection related to a single [`Plot`].

use common::operations::By;

use crate::domain::{plot, Plot};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Plot`] by its [`plot::Id`].
pub type ById = DatabaseQuery<By<Option<Plot>, plot::Id>>;
