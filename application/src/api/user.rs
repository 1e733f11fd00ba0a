//! [`User`]-related handlers and representations.

use axum::{extract::Path, Extension, Json};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, user},
    query, Query as _,
};

use crate::{
    api::{self, Success},
    context::{Auth, AuthError, MaybeAuth},
    define_error, AsError, Error, Service,
};

/// A [`domain::User`] as returned by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// ID of this [`User`].
    pub id: user::Id,

    /// Name of this [`User`].
    pub name: String,

    /// Email of this [`User`].
    pub email: String,

    /// Phone of this [`User`], if any.
    pub phone: Option<String>,

    /// Role of this [`User`].
    pub role: String,

    /// When this [`User`] was created, as an RFC 3339 string.
    pub created_at: String,
}

impl From<domain::User> for User {
    fn from(user: domain::User) -> Self {
        Self {
            id: user.id,
            name: user.name.to_string(),
            email: user.email.to_string(),
            phone: user.phone.map(|p| p.to_string()),
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Request body of `POST /users`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Name of the new user.
    pub name: String,

    /// Email of the new user, used as the login identifier.
    pub email: String,

    /// Phone of the new user.
    pub phone: Option<String>,

    /// Password of the new user.
    pub password: String,

    /// Role of the new user (`ADMIN` or `BUYER`).
    pub role: String,
}

/// `POST /users` handler.
///
/// Creating an admin requires an admin bearer token, unless no admin exists
/// yet.
pub async fn create(
    Extension(service): Extension<Service>,
    MaybeAuth(auth): MaybeAuth,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Success<User>>), Error> {
    let name =
        user::Name::new(req.name).ok_or_else(|| api::invalid_input("name"))?;
    let email = user::Email::new(req.email)
        .ok_or_else(|| api::invalid_input("email"))?;
    let phone = req
        .phone
        .map(|p| {
            user::Phone::new(p).ok_or_else(|| api::invalid_input("phone"))
        })
        .transpose()?;
    let password = user::Password::new(req.password)
        .ok_or_else(|| api::invalid_input("password"))?;
    let role =
        api::parse::<user::Role>(&req.role.to_ascii_uppercase(), "role")?;

    let user = service
        .execute(command::CreateUser {
            name,
            email,
            password: secrecy::SecretBox::new(Box::new(password)),
            phone,
            role,
            authorized_as: auth.map(|a| a.user.role),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, Success::of(user.into())))
}

/// `GET /users/:id` handler.
///
/// Buyers may only read themselves.
pub async fn by_id(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<user::Id>,
) -> Result<Json<Success<User>>, Error> {
    if auth.user.role != user::Role::Admin && auth.user.id != id {
        return Err(AuthError::Forbidden.into());
    }

    let user = service
        .execute(query::user::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .filter(|u| u.deleted_at.is_none())
        .ok_or(UserError::NotFound)?;

    Ok(Success::of(user.into()))
}

/// Request body of `POST /sessions`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Email to sign in with.
    pub email: String,

    /// Password to sign in with.
    pub password: String,
}

/// A created session as returned by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token of this [`Session`].
    pub token: String,

    /// When this [`Session`] expires, as an RFC 3339 string.
    pub expires_at: String,

    /// [`User`] this [`Session`] belongs to.
    pub user: User,
}

/// `POST /sessions` handler.
pub async fn create_session(
    Extension(service): Extension<Service>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Success<Session>>), Error> {
    let email = user::Email::new(req.email)
        .ok_or_else(|| api::invalid_input("email"))?;
    let password = user::Password::new(req.password)
        .ok_or_else(|| api::invalid_input("password"))?;

    let out = service
        .execute(command::CreateUserSession {
            email,
            password: secrecy::SecretBox::new(Box::new(password)),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((
        StatusCode::CREATED,
        Success::of(Session {
            token: out.token.to_string(),
            expires_at: out.expires_at.to_rfc3339(),
            user: out.user.into(),
        }),
    ))
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::create_user::ExecutionError as E;

        match self {
            E::AdminRequired => Some(AuthError::Forbidden.into()),
            E::Db(e) => e.try_as_error(),
            E::EmailOccupied(_) => Some(UserError::EmailOccupied.into()),
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::create_user_session::ExecutionError as E;

        match self {
            E::Db(e) => e.try_as_error(),
            E::JsonWebTokenEncodeError(_) => None,
            E::WrongCredentials => Some(UserError::WrongCredentials.into()),
        }
    }
}

define_error! {
    enum UserError {
        #[code = "EMAIL_OCCUPIED"]
        #[status = CONFLICT]
        #[message = "Email is already occupied"]
        EmailOccupied,

        #[code = "USER_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "User does not exist"]
        NotFound,

        #[code = "WRONG_CREDENTIALS"]
        #[status = UNAUTHORIZED]
        #[message = "Wrong credentials"]
        WrongCredentials,
    }
}
