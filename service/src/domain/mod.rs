//! Domain definitions.

pub mod contract;
pub mod payment;
pub mod plot;
pub mod user;

pub use self::{
    contract::Contract, payment::Payment, plot::Plot, user::User,
};
