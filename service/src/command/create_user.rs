//! [`Command`] for creating a new [`User`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Password, Phone};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    read, Service,
};

use super::Command;

/// [`Command`] for creating a new [`User`].
#[derive(Debug)]
pub struct CreateUser {
    /// [`Name`] of a new [`User`].
    pub name: user::Name,

    /// [`Email`] of a new [`User`], used as the login identifier.
    pub email: user::Email,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,

    /// [`Phone`] of a new [`User`].
    pub phone: Option<user::Phone>,

    /// [`user::Role`] of a new [`User`].
    pub role: user::Role,

    /// [`user::Role`] the caller is authorized with, if any.
    ///
    /// Creating an [`user::Role::Admin`] requires an admin caller, except
    /// when no admin exists yet (first-run bootstrap).
    pub authorized_as: Option<user::Role>,
}

impl<Db> Command<CreateUser> for Service<Db>
where
    Db: for<'e> Database<
            Select<By<Option<User>, &'e user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::user::HasAdmins, ()>>,
            Ok = read::user::HasAdmins,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<User>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            name,
            email,
            password,
            phone,
            role,
            authorized_as,
        } = cmd;

        if role == user::Role::Admin
            && authorized_as != Some(user::Role::Admin)
        {
            let has_admins = self
                .database()
                .execute(Select(By::<read::user::HasAdmins, _>::new(())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if *has_admins {
                return Err(tracerr::new!(E::AdminRequired));
            }
        }

        let u = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if u.is_some() {
            return Err(tracerr::new!(E::EmailOccupied(email)));
        }

        let user = User {
            id: user::Id::new(),
            name,
            email,
            password_hash: user::PasswordHash::new(password.expose_secret()),
            phone,
            role,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Creating an admin requires an admin caller.
    #[display("Creating an admin `User` requires an admin")]
    AdminRequired,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`user::Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    EmailOccupied(#[error(not(source))] user::Email),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use secrecy::SecretBox;

    use crate::{
        domain::user,
        infra::InMemory,
        Config, Service,
    };

    use super::{Command as _, CreateUser, ExecutionError};

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

    fn cmd(
        email: &str,
        role: user::Role,
        authorized_as: Option<user::Role>,
    ) -> CreateUser {
        CreateUser {
            name: user::Name::new("Ada Obi").unwrap(),
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(user::Password::from(
                "qwerty123",
            ))),
            phone: None,
            role,
            authorized_as,
        }
    }

    #[tokio::test]
    async fn creates_buyer() {
        let service = service();

        let user = service
            .execute(cmd("ada@example.com", user::Role::Buyer, None))
            .await
            .unwrap();

        assert_eq!(user.role, user::Role::Buyer);
        assert!(user.deleted_at.is_none());
    }

    #[tokio::test]
    async fn rejects_occupied_email() {
        let service = service();
        service
            .execute(cmd("ada@example.com", user::Role::Buyer, None))
            .await
            .unwrap();

        let err = service
            .execute(cmd("ada@example.com", user::Role::Buyer, None))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::EmailOccupied(_)));
    }

    #[tokio::test]
    async fn bootstraps_first_admin_without_authorization() {
        let service = service();

        let admin = service
            .execute(cmd("root@example.com", user::Role::Admin, None))
            .await
            .unwrap();
        assert_eq!(admin.role, user::Role::Admin);
    }

    #[tokio::test]
    async fn second_admin_requires_an_admin_caller() {
        let service = service();
        service
            .execute(cmd("root@example.com", user::Role::Admin, None))
            .await
            .unwrap();

        let err = service
            .execute(cmd("second@example.com", user::Role::Admin, None))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::AdminRequired));

        let admin = service
            .execute(cmd(
                "second@example.com",
                user::Role::Admin,
                Some(user::Role::Admin),
            ))
            .await
            .unwrap();
        assert_eq!(admin.role, user::Role::Admin);
    }
}
