//! [`Contract`]-related handlers and representations.

use axum::{extract::Path, Extension, Json};
use common::{pagination::Arguments, Money};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, contract, plot, user},
    query, read, Query as _,
};

use crate::{
    api::{self, Page, Success},
    context::Auth,
    define_error, AsError, Error, Service,
};

/// A [`domain::Contract`] as returned by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// ID of this [`Contract`].
    pub id: contract::Id,

    /// ID of the buyer this [`Contract`] belongs to.
    pub buyer_id: user::Id,

    /// Plots taken under this [`Contract`], with their agreed prices.
    pub plots: Vec<PlotPrice>,

    /// Initial deposit paid at registration.
    pub initial_deposit: Money,

    /// Free-form payment schedule descriptor.
    pub schedule: String,

    /// When the plots were acquired, as an RFC 3339 string.
    pub acquired_at: String,

    /// Outstanding balance of this [`Contract`].
    pub balance: Money,

    /// Status of this [`Contract`].
    pub status: String,

    /// When this [`Contract`] was created, as an RFC 3339 string.
    pub created_at: String,
}

/// A plot taken under a [`Contract`], with its agreed price.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotPrice {
    /// ID of the taken plot.
    pub plot_id: plot::Id,

    /// Agreed price of the taken plot.
    pub price: Money,
}

impl From<domain::Contract> for Contract {
    fn from(contract: domain::Contract) -> Self {
        Self {
            id: contract.id,
            buyer_id: contract.buyer_id,
            plots: contract
                .plots
                .into_iter()
                .map(|p| PlotPrice {
                    plot_id: p.plot_id,
                    price: p.price,
                })
                .collect(),
            initial_deposit: contract.initial_deposit,
            schedule: contract.schedule.to_string(),
            acquired_at: contract.acquired_at.to_rfc3339(),
            balance: contract.balance,
            status: contract.status.to_string(),
            created_at: contract.created_at.to_rfc3339(),
        }
    }
}

/// A [`Contract`] with its full payment history and the statement derived
/// over it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractWithHistory {
    /// The [`Contract`] itself.
    #[serde(flatten)]
    pub contract: Contract,

    /// Full payment history of the [`Contract`].
    pub payments: Vec<api::payment::Payment>,

    /// Total amount owed under the [`Contract`].
    pub total_owed: Money,

    /// Total amount paid toward the [`Contract`].
    pub total_paid: Money,
}

impl From<read::contract::WithHistory> for ContractWithHistory {
    fn from(read: read::contract::WithHistory) -> Self {
        let mut contract = Contract::from(read.contract);
        contract.balance = read.statement.balance;
        contract.status = read.statement.status.to_string();
        Self {
            contract,
            payments: read.payments.into_iter().map(Into::into).collect(),
            total_owed: read.statement.total_owed,
            total_paid: read.statement.total_paid,
        }
    }
}

/// Request body of `POST /contracts`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractRequest {
    /// ID of the buyer entering the contract.
    pub buyer_id: user::Id,

    /// IDs of the plots taken under the contract.
    pub plot_ids: Vec<plot::Id>,

    /// Prices of the taken plots, one per plot, in the same order.
    pub prices: Vec<Money>,

    /// Initial deposit paid at registration.
    pub initial_deposit: Money,

    /// Free-form payment schedule descriptor.
    pub schedule: String,

    /// When the plots were acquired, as an RFC 3339 string.
    pub acquired_at: String,
}

/// `POST /contracts` handler.
pub async fn create(
    Extension(service): Extension<Service>,
    auth: Auth,
    Json(req): Json<CreateContractRequest>,
) -> Result<(StatusCode, Json<Success<Contract>>), Error> {
    auth.require_admin()?;

    let schedule = contract::Schedule::new(req.schedule)
        .ok_or_else(|| api::invalid_input("schedule"))?;
    let acquired_at = contract::AcquisitionDateTime::from_rfc3339(
        &req.acquired_at,
    )
    .map_err(|_| api::invalid_input("acquiredAt"))?;

    let contract = service
        .execute(command::CreateContract {
            buyer_id: req.buyer_id,
            plot_ids: req.plot_ids,
            prices: req.prices,
            initial_deposit: req.initial_deposit,
            schedule,
            acquired_at,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, Success::of(contract.into())))
}

/// `GET /contracts/:id` handler.
///
/// Buyers may only read their own [`Contract`]s.
pub async fn by_id(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<contract::Id>,
) -> Result<Json<Success<ContractWithHistory>>, Error> {
    let read = service
        .execute(query::contract::WithHistory(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(ContractError::NotFound)?;

    if auth.user.role != user::Role::Admin
        && read.contract.buyer_id != auth.user.id
    {
        return Err(crate::context::AuthError::Forbidden.into());
    }

    Ok(Success::of(read.into()))
}

/// Query string parameters of `GET /contracts`.
#[derive(Clone, Debug, Deserialize)]
pub struct ListParams {
    /// Number of [`Contract`]s to return.
    pub first: Option<u16>,

    /// Cursor after which to return [`Contract`]s.
    pub after: Option<contract::Id>,

    /// Status to filter [`Contract`]s by.
    pub status: Option<String>,
}

/// `GET /contracts` handler.
pub async fn list(
    Extension(service): Extension<Service>,
    auth: Auth,
    axum::extract::Query(params): axum::extract::Query<ListParams>,
) -> Result<Json<Success<Page<Contract>>>, Error> {
    auth.require_admin()?;

    let status = params
        .status
        .map(|s| {
            api::parse::<contract::Status>(&s.to_ascii_uppercase(), "status")
        })
        .transpose()?;
    let arguments =
        Arguments::new(params.first, params.after, None, None, 20_u16)
            .ok_or_else(|| api::invalid_input("pagination"))?;

    let page = service
        .execute(query::contracts::List::by(
            read::contract::list::Selector {
                arguments,
                filter: read::contract::list::Filter { status },
            },
        ))
        .await
        .map_err(AsError::into_error)?;

    Ok(Success::of(Page::new(page, Contract::from)))
}

impl AsError for command::create_contract::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::create_contract::ExecutionError as E;

        match self {
            E::Db(e) => e.try_as_error(),
            E::InvalidDeposit(_) => Some(api::invalid_input("initialDeposit")),
            E::InvalidPrice(_) | E::WrongCurrency { .. } => {
                Some(api::invalid_input("prices"))
            }
            E::NoPlots | E::PlotsPricesMismatch { .. } => {
                Some(api::invalid_input("plotIds"))
            }
            E::PlotNotExists(_) => Some(ContractError::PlotNotFound.into()),
            E::UserNotExists(_) => Some(ContractError::UserNotFound.into()),
        }
    }
}

define_error! {
    enum ContractError {
        #[code = "CONTRACT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Contract does not exist"]
        NotFound,

        #[code = "PLOT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Plot does not exist"]
        PlotNotFound,

        #[code = "USER_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "User does not exist"]
        UserNotFound,
    }
}
