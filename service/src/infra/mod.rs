//! Infrastructure layer.

pub mod database;

pub use self::database::Database;
#[cfg(any(test, feature = "in-memory"))]
pub use self::database::InMemory;
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
