//! Read entities definitions.

pub mod contract;
pub mod payment;
pub mod plot;
pub mod user;
