//! [`Command`] for authorizing a [`User`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`User`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

/// Output of [`AuthorizeUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Authorized [`Session`].
    pub session: Session,

    /// [`User`] the [`Session`] belongs to.
    pub user: User,
}

impl<Db> Command<AuthorizeUserSession> for Service<Db>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        let user = self
            .database()
            .execute(Select(By::new(session.user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| E::UserNotExists(session.user_id))
            .map_err(tracerr::wrap!())?;

        Ok(Output { session, user })
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use secrecy::SecretBox;

    use crate::{
        command::{CreateUser, CreateUserSession},
        domain::user,
        infra::InMemory,
        Config, Service,
    };

    use super::{AuthorizeUserSession, Command as _, ExecutionError};

    fn service() -> Service<InMemory> {
        Service::new(
            Config {
                jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                    b"secret",
                ),
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    b"secret",
                ),
                session_ttl: Duration::from_secs(30 * 60),
            },
            InMemory::new(),
        )
    }

    async fn sign_in(
        service: &Service<InMemory>,
    ) -> crate::command::create_user_session::Output {
        _ = service
            .execute(CreateUser {
                name: user::Name::new("Ada Obi").unwrap(),
                email: user::Email::new("ada@example.com").unwrap(),
                password: SecretBox::new(Box::new(user::Password::from(
                    "qwerty123",
                ))),
                phone: None,
                role: user::Role::Buyer,
                authorized_as: None,
            })
            .await
            .unwrap();
        service
            .execute(CreateUserSession {
                email: user::Email::new("ada@example.com").unwrap(),
                password: SecretBox::new(Box::new(user::Password::from(
                    "qwerty123",
                ))),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn authorizes_issued_token() {
        let service = service();
        let issued = sign_in(&service).await;

        let out = service
            .execute(AuthorizeUserSession {
                token: issued.token,
            })
            .await
            .unwrap();

        assert_eq!(out.session.user_id, issued.user.id);
        assert_eq!(out.session.role, user::Role::Buyer);
        assert_eq!(out.user.id, issued.user.id);
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let service = service();

        let token = "not-a-jwt".parse::<user::session::Token>().unwrap();
        let err = service
            .execute(AuthorizeUserSession { token })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }
}
