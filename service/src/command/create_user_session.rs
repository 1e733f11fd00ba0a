//! [`Command`] for creating a [`Session`].

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{session::Token, Email, Password};
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`] by [`User`] credentials.
#[derive(Clone, Debug)]
pub struct CreateUserSession {
    /// [`Email`] of a [`User`].
    pub email: user::Email,

    /// [`Password`] of a [`User`].
    pub password: SecretBox<user::Password>,
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// [`User`] whose [`Session`] has been created.
    pub user: User,

    /// [`DateTime`] when the [`Session`] expires.
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<CreateUserSession> for Service<Db>
where
    Db: for<'e> Database<
        Select<By<Option<User>, &'e user::Email>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUserSession { email, password } = cmd;

        let user = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::WrongCredentials)
            .map_err(tracerr::wrap!())?;

        // A deleted `User` cannot sign in anymore.
        if user.deleted_at.is_some()
            || !user.password_hash.verify(password.expose_secret())
        {
            return Err(tracerr::new!(E::WrongCredentials));
        }

        let expires_at = (DateTime::now() + self.config().session_ttl)
            .coerce();
        let token = jsonwebtoken::encode::<Session>(
            &jsonwebtoken::Header::default(),
            &Session {
                user_id: user.id,
                role: user.role,
                expires_at,
            },
            &self.config().jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { session::Token::new_unchecked(token) };

        Ok(Output {
            token,
            user,
            expires_at,
        })
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// [`CreateUserSession`] contains wrong credentials.
    #[display("Wrong `User` credentials")]
    WrongCredentials,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use secrecy::SecretBox;

    use crate::{
        command::CreateUser,
        domain::user,
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, CreateUserSession, ExecutionError};

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

    async fn register(service: &Service<InMemory>, email: &str) {
        _ = service
            .execute(CreateUser {
                name: user::Name::new("Ada Obi").unwrap(),
                email: user::Email::new(email).unwrap(),
                password: SecretBox::new(Box::new(user::Password::from(
                    "qwerty123",
                ))),
                phone: None,
                role: user::Role::Buyer,
                authorized_as: None,
            })
            .await
            .unwrap();
    }

    fn cmd(email: &str, password: &str) -> CreateUserSession {
        CreateUserSession {
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(user::Password::from(password))),
        }
    }

    #[tokio::test]
    async fn issues_token_for_valid_credentials() {
        let service = service();
        register(&service, "ada@example.com").await;

        let out = service
            .execute(cmd("ada@example.com", "qwerty123"))
            .await
            .unwrap();

        assert!(!out.token.as_ref().is_empty());
        assert_eq!(out.user.role, user::Role::Buyer);
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let service = service();
        register(&service, "ada@example.com").await;

        let err = service
            .execute(cmd("ada@example.com", "wrong-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
    }

    #[tokio::test]
    async fn rejects_unknown_email() {
        let service = service();

        let err = service
            .execute(cmd("ghost@example.com", "qwerty123"))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
    }
}
