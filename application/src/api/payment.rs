//! [`Payment`]-related handlers and representations.

use axum::{extract::Path, Extension, Json};
use common::Money;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, decide_pending_payment::Decision, Command as _},
    domain::{self, contract, payment, plot, user},
    query, read, Query as _,
};

use crate::{
    api::{self, Success},
    context::{Auth, AuthError},
    define_error, AsError, Error, Service,
};

/// A [`domain::Payment`] as returned by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: payment::Id,

    /// ID of the contract this [`Payment`] applies to.
    pub contract_id: contract::Id,

    /// ID of the plot this [`Payment`] is tied to, if any.
    pub plot_id: Option<plot::Id>,

    /// Amount of this [`Payment`].
    pub amount: Money,

    /// Payment method descriptor, if any.
    pub method: Option<String>,

    /// External reference of this [`Payment`], if any.
    pub reference: Option<String>,

    /// Supporting document pointer, if any.
    pub document: Option<String>,

    /// Free-form note, if any.
    pub note: Option<String>,

    /// ID of the admin who recorded this [`Payment`], if recorded directly.
    pub recorded_by: Option<user::Id>,

    /// Idempotency key of this [`Payment`], if any.
    pub idempotency_key: Option<String>,

    /// Status of this [`Payment`].
    pub status: String,

    /// Contract balance right after this [`Payment`] was applied, if it has
    /// been applied.
    pub outstanding: Option<Money>,

    /// When the money was received, as an RFC 3339 string.
    pub received_at: String,

    /// When this [`Payment`] was decided, as an RFC 3339 string.
    pub decided_at: Option<String>,

    /// When this [`Payment`] was created, as an RFC 3339 string.
    pub created_at: String,
}

impl From<domain::Payment> for Payment {
    fn from(payment: domain::Payment) -> Self {
        Self {
            id: payment.id,
            contract_id: payment.contract_id,
            plot_id: payment.plot_id,
            amount: payment.amount,
            method: payment.method.map(|m| m.to_string()),
            reference: payment.reference.map(|r| r.to_string()),
            document: payment.document.map(|d| d.to_string()),
            note: payment.note.map(|n| n.to_string()),
            recorded_by: payment.recorded_by,
            idempotency_key: payment.idempotency_key.map(|k| k.to_string()),
            status: payment.status.to_string(),
            outstanding: payment.outstanding,
            received_at: payment.received_at.to_rfc3339(),
            decided_at: payment.decided_at.map(|at| at.to_rfc3339()),
            created_at: payment.created_at.to_rfc3339(),
        }
    }
}

/// Request body of `POST /payments`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    /// ID of the contract the payment applies to.
    pub contract_id: contract::Id,

    /// Amount of the payment.
    pub amount: Money,

    /// When the money was received, as an RFC 3339 string.
    pub received_at: String,

    /// Free-form note.
    pub note: Option<String>,

    /// Idempotency key deduplicating retries of the same payment.
    pub idempotency_key: Option<String>,
}

/// Response body of a [`Payment`] mutation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEnvelope {
    /// Always `true`.
    pub success: bool,

    /// The [`Payment`] itself.
    pub payment: Payment,
}

impl PaymentEnvelope {
    /// Wraps the provided [`Payment`] into a [`PaymentEnvelope`].
    fn of(payment: domain::Payment) -> Json<Self> {
        Json(Self {
            success: true,
            payment: payment.into(),
        })
    }
}

/// Response body of `POST /payments`.
///
/// Carries the resulting contract statement alongside the [`Payment`]
/// itself.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedPayment {
    /// Always `true`.
    pub success: bool,

    /// The applied [`Payment`].
    pub payment: Payment,

    /// Contract balance after the [`Payment`] was applied.
    pub balance: Money,

    /// Contract status after the [`Payment`] was applied.
    pub status: String,
}

/// `POST /payments` handler.
///
/// Records an approved [`Payment`] and debits the contract balance in the
/// same transaction.
pub async fn record(
    Extension(service): Extension<Service>,
    auth: Auth,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordedPayment>), Error> {
    auth.require_admin()?;

    let received_at =
        payment::ReceptionDateTime::from_rfc3339(&req.received_at)
            .map_err(|_| api::invalid_input("receivedAt"))?;
    let note = req
        .note
        .map(|n| {
            payment::Note::new(n).ok_or_else(|| api::invalid_input("note"))
        })
        .transpose()?;
    let idempotency_key = req
        .idempotency_key
        .map(|k| {
            payment::IdempotencyKey::new(k)
                .ok_or_else(|| api::invalid_input("idempotencyKey"))
        })
        .transpose()?;

    let out = service
        .execute(command::RecordPayment {
            contract_id: req.contract_id,
            amount: req.amount,
            received_at,
            note,
            recorded_by: auth.user.id,
            idempotency_key,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RecordedPayment {
            success: true,
            payment: out.payment.into(),
            balance: out.statement.balance,
            status: out.statement.status.to_string(),
        }),
    ))
}

/// Request body of `POST /pending-payments`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    /// ID of the contract the payment applies to.
    pub contract_id: contract::Id,

    /// ID of the plot the payment is tied to.
    pub plot_id: Option<plot::Id>,

    /// Amount of the payment.
    pub amount: Money,

    /// Payment method descriptor.
    pub method: Option<String>,

    /// External reference of the payment.
    pub reference: Option<String>,

    /// Supporting document pointer.
    pub document: Option<String>,

    /// Free-form note.
    pub note: Option<String>,

    /// Idempotency key deduplicating retries of the same submission.
    pub idempotency_key: String,
}

/// `POST /pending-payments` handler.
///
/// Buyers may only submit toward their own contracts.
pub async fn submit(
    Extension(service): Extension<Service>,
    auth: Auth,
    Json(req): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentEnvelope>), Error> {
    let contract = service
        .execute(query::contract::ById::by(req.contract_id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(PaymentError::ContractNotFound)?;
    if auth.user.role != user::Role::Admin
        && contract.buyer_id != auth.user.id
    {
        return Err(AuthError::Forbidden.into());
    }

    let method = req
        .method
        .map(|m| {
            payment::Method::new(m)
                .ok_or_else(|| api::invalid_input("method"))
        })
        .transpose()?;
    let reference = req
        .reference
        .map(|r| {
            payment::Reference::new(r)
                .ok_or_else(|| api::invalid_input("reference"))
        })
        .transpose()?;
    let document = req
        .document
        .map(|d| {
            payment::Document::new(d)
                .ok_or_else(|| api::invalid_input("document"))
        })
        .transpose()?;
    let note = req
        .note
        .map(|n| {
            payment::Note::new(n).ok_or_else(|| api::invalid_input("note"))
        })
        .transpose()?;
    let idempotency_key = payment::IdempotencyKey::new(req.idempotency_key)
        .ok_or_else(|| api::invalid_input("idempotencyKey"))?;

    let payment = service
        .execute(command::SubmitPendingPayment {
            contract_id: req.contract_id,
            plot_id: req.plot_id,
            amount: req.amount,
            method,
            reference,
            document,
            note,
            submitted_by: auth.user.id,
            idempotency_key,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, PaymentEnvelope::of(payment)))
}

/// Request body of `PATCH /pending-payments/:id/status`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecidePaymentRequest {
    /// Decision upon the payment: `approved` or `rejected`.
    pub status: String,
}

/// `PATCH /pending-payments/:id/status` handler.
pub async fn decide(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<payment::Id>,
    Json(req): Json<DecidePaymentRequest>,
) -> Result<Json<PaymentEnvelope>, Error> {
    auth.require_admin()?;

    let decision = match req.status.to_ascii_lowercase().as_str() {
        "approved" => Decision::Approved,
        "rejected" => Decision::Rejected,
        _ => return Err(PaymentError::InvalidStatus.into()),
    };

    let payment = service
        .execute(command::DecidePendingPayment {
            payment_id: id,
            decision,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(PaymentEnvelope::of(payment))
}

/// Query string parameters of `GET /pending-payments`.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct QueueParams {
    /// ID of the contract to narrow the queue to.
    pub contract: Option<contract::Id>,
}

/// `GET /pending-payments` handler.
///
/// Returns the review queue: pending rows first, then the decided ones,
/// newest first within each group.
pub async fn queue(
    Extension(service): Extension<Service>,
    auth: Auth,
    axum::extract::Query(params): axum::extract::Query<QueueParams>,
) -> Result<Json<Success<Vec<Payment>>>, Error> {
    auth.require_admin()?;

    let queue = service
        .execute(query::payments::Queue::by(read::payment::QueueFilter {
            contract_id: params.contract,
        }))
        .await
        .map_err(AsError::into_error)?;

    Ok(Success::of(queue.0.into_iter().map(Into::into).collect()))
}

impl AsError for command::record_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::record_payment::ExecutionError as E;

        match self {
            E::ContractNotFound(_) => {
                Some(PaymentError::ContractNotFound.into())
            }
            E::Db(_) => Some(PaymentError::ReconciliationFailed.into()),
            E::InvalidAmount(_) | E::WrongCurrency { .. } => {
                Some(PaymentError::InvalidAmount.into())
            }
        }
    }
}

impl AsError for command::submit_pending_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::submit_pending_payment::ExecutionError as E;

        match self {
            E::ContractNotFound(_) => {
                Some(PaymentError::ContractNotFound.into())
            }
            E::Db(_) => Some(PaymentError::ReconciliationFailed.into()),
            E::InvalidAmount(_) | E::WrongCurrency { .. } => {
                Some(PaymentError::InvalidAmount.into())
            }
            E::PlotNotFound(_) => Some(PaymentError::PlotNotFound.into()),
            E::PlotUnavailable(_) => {
                Some(PaymentError::PlotUnavailable.into())
            }
        }
    }
}

impl AsError for command::decide_pending_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::decide_pending_payment::ExecutionError as E;

        match self {
            E::AlreadyDecided(_) => Some(PaymentError::AlreadyDecided.into()),
            E::ContractNotFound(_) => {
                Some(PaymentError::ContractNotFound.into())
            }
            E::Db(_) => Some(PaymentError::ReconciliationFailed.into()),
            E::PaymentNotFound(_) => Some(PaymentError::NotFound.into()),
            E::PlotNotFound(_) => Some(PaymentError::PlotNotFound.into()),
        }
    }
}

define_error! {
    enum PaymentError {
        #[code = "ALREADY_DECIDED"]
        #[status = CONFLICT]
        #[message = "Payment is decided already"]
        AlreadyDecided,

        #[code = "CONTRACT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Contract does not exist"]
        ContractNotFound,

        #[code = "INVALID_AMOUNT"]
        #[status = BAD_REQUEST]
        #[message = "Amount is not applicable to the contract"]
        InvalidAmount,

        #[code = "INVALID_STATUS"]
        #[status = BAD_REQUEST]
        #[message = "Status must be either `approved` or `rejected`"]
        InvalidStatus,

        #[code = "PAYMENT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Payment does not exist"]
        NotFound,

        #[code = "PLOT_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Plot does not exist"]
        PlotNotFound,

        #[code = "PLOT_UNAVAILABLE"]
        #[status = CONFLICT]
        #[message = "Plot is reserved or sold already"]
        PlotUnavailable,

        #[code = "RECONCILIATION_FAILED"]
        #[status = INTERNAL_SERVER_ERROR]
        #[message = "Payment reconciliation failed"]
        ReconciliationFailed,
    }
}
