//! Authentication context of a request.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use service::{
    command::{self, Command as _},
    domain::{
        user::{self, session, Session},
        User,
    },
};

use crate::{define_error, AsError, Error, Service};

/// Authenticated principal of a request.
///
/// Extracting it fails with `AUTHORIZATION_REQUIRED` when the bearer token is
/// missing, expired or belongs to a deleted [`User`].
#[derive(Clone, Debug)]
pub struct Auth {
    /// Authorized [`Session`].
    pub session: Session,

    /// [`User`] the [`Session`] belongs to.
    pub user: User,
}

impl Auth {
    /// Ensures the authenticated [`User`] is an [`user::Role::Admin`].
    ///
    /// # Errors
    ///
    /// With `FORBIDDEN` otherwise.
    pub fn require_admin(&self) -> Result<(), Error> {
        (self.user.role == user::Role::Admin)
            .then_some(())
            .ok_or_else(|| AuthError::Forbidden.into())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service =
            parts.extensions.get::<Service>().cloned().ok_or_else(|| {
                Error::internal(&"missing `Service` extension")
            })?;

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e| {
                if e.is_missing() {
                    AuthError::AuthorizationRequired.into()
                } else {
                    e.into_error()
                }
            })?;

        #[expect(unsafe_code, reason = "specified in correct header")]
        let token = unsafe {
            session::Token::new_unchecked(bearer.token().to_owned())
        };

        service
            .execute(command::AuthorizeUserSession { token })
            .await
            .map(|out| Self {
                session: out.session,
                user: out.user,
            })
            .map_err(AsError::into_error)
    }
}

/// Optional [`Auth`]: absent when no bearer token was provided or the
/// provided one cannot be authorized.
#[derive(Clone, Debug)]
pub struct MaybeAuth(pub Option<Auth>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuth
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(auth) => Ok(Self(Some(auth))),
            Err(e) if e.code == "AUTHORIZATION_REQUIRED" => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}

impl AsError for command::authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenDecodeError(_) | Self::UserNotExists(_) => {
                Some(AuthError::AuthorizationRequired.into())
            }
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Insufficient permissions"]
        Forbidden,
    }
}
