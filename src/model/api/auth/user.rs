use std::fmt::Display;

use mongodb::Database;
use rocket::{
    http::Status,
    request::Outcome,
    Request,
};
use serde::de::DeserializeOwned;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::Error;
use crate::model::{
    db::{admin::Admin, voter::Voter},
    mongodb::{Coll, Id, MongoCollection},
};

use super::AuthToken;

/// A user of our application, having defined rights.
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;
    /// Get the user's ID.
    fn id(&self) -> Id;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;

    fn id(&self) -> Id {
        self.id
    }
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn id(&self) -> Id {
        self.id
    }
}

/// Resolve the user behind the request's auth token.
///
/// Forwards if there is no valid token for this kind of user, or if the user
/// it names no longer exists.
pub async fn resolve_user<U>(req: &Request<'_>) -> Outcome<U, Error>
where
    U: User + MongoCollection + DeserializeOwned + Unpin + Send + Sync,
{
    let token = match req.guard::<AuthToken<U>>().await {
        Outcome::Success(token) => token,
        Outcome::Error(e) => return Outcome::Error(e),
        Outcome::Forward(status) => return Outcome::Forward(status),
    };

    let Some(db) = req.rocket().state::<Database>() else {
        return Outcome::Error((
            Status::InternalServerError,
            Error::Status(
                Status::InternalServerError,
                "Database is not connected".to_string(),
            ),
        ));
    };

    match Coll::<U>::from_db(db).find_one(token.id.as_doc(), None).await {
        Ok(Some(user)) => Outcome::Success(user),
        Ok(None) => Outcome::Forward(Status::Unauthorized),
        Err(e) => Outcome::Error((Status::InternalServerError, e.into())),
    }
}
