//! [`Plot`]-related handlers and representations.

use axum::{extract::Path, Extension, Json};
use common::{pagination::Arguments, Money};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, plot, user},
    query, read, Query as _,
};

use crate::{
    api::{self, Page, Success},
    context::Auth,
    define_error, AsError, Error, Service,
};

/// A [`domain::Plot`] as returned by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    /// ID of this [`Plot`].
    pub id: plot::Id,

    /// Human-assigned number of this [`Plot`].
    pub number: String,

    /// Location of this [`Plot`].
    pub location: String,

    /// Dimension descriptor of this [`Plot`].
    pub dimension: String,

    /// Asking price of this [`Plot`].
    pub price: Money,

    /// Status of this [`Plot`].
    pub status: String,

    /// ID of the buyer owning this [`Plot`], if sold.
    pub owner_id: Option<user::Id>,

    /// When this [`Plot`] was created, as an RFC 3339 string.
    pub created_at: String,
}

impl From<domain::Plot> for Plot {
    fn from(plot: domain::Plot) -> Self {
        Self {
            id: plot.id,
            number: plot.number.to_string(),
            location: plot.location.to_string(),
            dimension: plot.dimension.to_string(),
            price: plot.price,
            status: plot.status.to_string(),
            owner_id: plot.owner_id,
            created_at: plot.created_at.to_rfc3339(),
        }
    }
}

/// Request body of `POST /plots`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlotRequest {
    /// Human-assigned number of the new plot, unique per estate.
    pub number: String,

    /// Location of the new plot.
    pub location: String,

    /// Dimension descriptor of the new plot.
    pub dimension: String,

    /// Asking price of the new plot.
    pub price: Money,
}

/// `POST /plots` handler.
pub async fn create(
    Extension(service): Extension<Service>,
    auth: Auth,
    Json(req): Json<CreatePlotRequest>,
) -> Result<(StatusCode, Json<Success<Plot>>), Error> {
    auth.require_admin()?;

    let number = plot::Number::new(req.number)
        .ok_or_else(|| api::invalid_input("number"))?;
    let location = plot::Location::new(req.location)
        .ok_or_else(|| api::invalid_input("location"))?;
    let dimension = plot::Dimension::new(req.dimension)
        .ok_or_else(|| api::invalid_input("dimension"))?;

    let plot = service
        .execute(command::CreatePlot {
            number,
            location,
            dimension,
            price: req.price,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, Success::of(plot.into())))
}

/// `GET /plots/:id` handler.
pub async fn by_id(
    Extension(service): Extension<Service>,
    _: Auth,
    Path(id): Path<plot::Id>,
) -> Result<Json<Success<Plot>>, Error> {
    let plot = service
        .execute(query::plot::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(PlotError::NotFound)?;

    Ok(Success::of(plot.into()))
}

/// Request body of `PATCH /plots/:id`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlotRequest {
    /// New number of the plot.
    pub number: Option<String>,

    /// New location of the plot.
    pub location: Option<String>,

    /// New dimension descriptor of the plot.
    pub dimension: Option<String>,

    /// New asking price of the plot.
    pub price: Option<Money>,
}

/// `PATCH /plots/:id` handler.
pub async fn update(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<plot::Id>,
    Json(req): Json<UpdatePlotRequest>,
) -> Result<Json<Success<Plot>>, Error> {
    auth.require_admin()?;

    let number = req
        .number
        .map(|n| {
            plot::Number::new(n).ok_or_else(|| api::invalid_input("number"))
        })
        .transpose()?;
    let location = req
        .location
        .map(|l| {
            plot::Location::new(l)
                .ok_or_else(|| api::invalid_input("location"))
        })
        .transpose()?;
    let dimension = req
        .dimension
        .map(|d| {
            plot::Dimension::new(d)
                .ok_or_else(|| api::invalid_input("dimension"))
        })
        .transpose()?;

    let plot = service
        .execute(command::UpdatePlot {
            id,
            number,
            location,
            dimension,
            price: req.price,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Success::of(plot.into()))
}

/// `DELETE /plots/:id` handler.
pub async fn delete(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<plot::Id>,
) -> Result<Json<Success<()>>, Error> {
    auth.require_admin()?;

    service
        .execute(command::DeletePlot { id })
        .await
        .map_err(AsError::into_error)?;

    Ok(Success::of(()))
}

/// Query string parameters of `GET /plots`.
#[derive(Clone, Debug, Deserialize)]
pub struct ListParams {
    /// Number of [`Plot`]s to return.
    pub first: Option<u16>,

    /// Cursor after which to return [`Plot`]s.
    pub after: Option<plot::Id>,

    /// Status to filter [`Plot`]s by.
    pub status: Option<String>,
}

/// `GET /plots` handler.
pub async fn list(
    Extension(service): Extension<Service>,
    _: Auth,
    axum::extract::Query(params): axum::extract::Query<ListParams>,
) -> Result<Json<Success<Page<Plot>>>, Error> {
    let status = params
        .status
        .map(|s| api::parse::<plot::Status>(&s.to_ascii_uppercase(), "status"))
        .transpose()?;
    let arguments =
        Arguments::new(params.first, params.after, None, None, 20_u16)
            .ok_or_else(|| api::invalid_input("pagination"))?;

    let page = service
        .execute(query::plots::List::by(read::plot::list::Selector {
            arguments,
            filter: read::plot::list::Filter { status },
        }))
        .await
        .map_err(AsError::into_error)?;

    Ok(Success::of(Page::new(page, Plot::from)))
}

impl AsError for command::create_plot::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::create_plot::ExecutionError as E;

        match self {
            E::Db(e) => e.try_as_error(),
            E::InvalidPrice(_) => Some(api::invalid_input("price")),
            E::NumberOccupied(_) => Some(PlotError::NumberOccupied.into()),
        }
    }
}

impl AsError for command::update_plot::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::update_plot::ExecutionError as E;

        match self {
            E::Db(e) => e.try_as_error(),
            E::InvalidPrice(_) => Some(api::invalid_input("price")),
            E::NumberOccupied(_) => Some(PlotError::NumberOccupied.into()),
            E::PlotNotExists(_) => Some(PlotError::NotFound.into()),
        }
    }
}

impl AsError for command::delete_plot::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::delete_plot::ExecutionError as E;

        match self {
            E::Db(e) => e.try_as_error(),
            E::PlotInUse(_) => Some(PlotError::InUse.into()),
            E::PlotNotExists(_) => Some(PlotError::NotFound.into()),
        }
    }
}

define_error! {
    enum PlotError {
        #[code = "PLOT_IN_USE"]
        #[status = CONFLICT]
        #[message = "Plot is referenced by a contract or payment"]
        InUse,

        #[code = "PLOT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Plot does not exist"]
        NotFound,

        #[code = "NUMBER_OCCUPIED"]
        #[status = CONFLICT]
        #[message = "Plot number is already occupied"]
        NumberOccupied,
    }
}
