//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_contract;
pub mod create_plot;
pub mod create_user;
pub mod create_user_session;
pub mod decide_pending_payment;
pub mod delete_plot;
pub mod record_payment;
pub mod submit_pending_payment;
pub mod update_plot;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession,
    create_contract::CreateContract, create_plot::CreatePlot,
    create_user::CreateUser, create_user_session::CreateUserSession,
    decide_pending_payment::DecidePendingPayment, delete_plot::DeletePlot,
    record_payment::RecordPayment,
    submit_pending_payment::SubmitPendingPayment, update_plot::UpdatePlot,
};
