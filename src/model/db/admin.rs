use std::ops::{Deref, DerefMut};

use log::{info, warn};
use rocket::{
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{admin::AdminCredentials, auth::resolve_user},
    mongodb::{Coll, Id},
};

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    /// A malformed stored hash never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = Error;

    /// The signed-in admin, resolved from their session token.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        resolve_user(req).await
    }
}

/// Make sure at least one admin account exists, creating one from the
/// bootstrap credentials if necessary.
pub async fn ensure_admin_exists(
    admins: &Coll<NewAdmin>,
    bootstrap: Option<AdminCredentials>,
) -> Result<()> {
    if admins.count_documents(None, None).await? > 0 {
        return Ok(());
    }

    match bootstrap {
        Some(credentials) => {
            let username = credentials.username.clone();
            let admin = NewAdmin::try_from(credentials).map_err(|_| {
                Error::bad_request("Bootstrap admin credentials are not acceptable".to_string())
            })?;
            admins.insert_one(admin, None).await?;
            info!("Created bootstrap admin '{username}'");
        }
        None => {
            warn!("No admin accounts exist and no bootstrap admin is configured");
        }
    }
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCore {
        pub fn example() -> Self {
            AdminCredentials::example()
                .try_into()
                .expect("example credentials are valid")
        }
    }
}
