//! REST API definitions.

pub mod contract;
pub mod payment;
pub mod plot;
pub mod user;

use std::{fmt, str::FromStr};

use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use common::pagination;
use serde::Serialize;

use crate::Error;

/// Builds the [`Router`] of the whole REST API.
pub fn router() -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/users", post(user::create))
        .route("/users/:id", get(user::by_id))
        .route("/sessions", post(user::create_session))
        .route("/contracts", post(contract::create).get(contract::list))
        .route("/contracts/:id", get(contract::by_id))
        .route("/payments", post(payment::record))
        .route(
            "/pending-payments",
            post(payment::submit).get(payment::queue),
        )
        .route("/pending-payments/:id/status", patch(payment::decide))
        .route("/plots", post(plot::create).get(plot::list))
        .route(
            "/plots/:id",
            get(plot::by_id).patch(plot::update).delete(plot::delete),
        )
}

/// Successful response envelope.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Success<T> {
    /// Always `true`.
    pub success: bool,

    /// Payload of the response.
    pub data: T,
}

impl<T> Success<T> {
    /// Wraps the provided payload into a [`Success`] envelope.
    pub(crate) fn of(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Page of nodes in a paginated listing.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Nodes on this [`Page`].
    pub nodes: Vec<T>,

    /// Cursor of the last node on this [`Page`].
    pub end_cursor: Option<String>,

    /// Indicator whether a next [`Page`] exists.
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Builds a [`Page`] out of the provided [`pagination::Page`].
    pub(crate) fn new<C, N>(
        page: pagination::Page<C, N>,
        node: impl Fn(N) -> T,
    ) -> Self
    where
        C: Clone + fmt::Display,
    {
        let info = page.page_info();
        Self {
            nodes: page.edges.into_iter().map(|e| node(e.node)).collect(),
            end_cursor: info.end_cursor.map(|c| c.to_string()),
            has_next_page: info.has_next_page,
        }
    }
}

/// Creates an `INVALID_INPUT` [`Error`] for the named field.
pub(crate) fn invalid_input(what: impl fmt::Display) -> Error {
    Error {
        code: "INVALID_INPUT",
        status_code: http::StatusCode::BAD_REQUEST,
        message: format!("Invalid `{what}`"),
        backtrace: None,
    }
}

/// Parses the provided input, rejecting it as `INVALID_INPUT` on failure.
pub(crate) fn parse<T: FromStr>(input: &str, what: &str) -> Result<T, Error> {
    input.parse().map_err(|_| invalid_input(what))
}

/// `GET /` handler.
pub async fn banner() -> Json<Success<&'static str>> {
    Success::of("Plot-sales administration API")
}
