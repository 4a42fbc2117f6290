use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::mongodb::Id;

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .build())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type. This does not check that the user still exists; see [`super::resolve_user`].
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            return Outcome::Error((
                Status::InternalServerError,
                Error::Status(
                    Status::InternalServerError,
                    "Application config is not loaded".to_string(),
                ),
            ));
        };

        // Forward to any routes that do not require an authentication token.
        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return Outcome::Forward(Status::Unauthorized);
        };

        // Expired or tampered tokens are treated as absent.
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(_) => return Outcome::Forward(Status::Unauthorized),
        };

        // Check it represents the correct rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(Status::Forbidden);
        }

        Outcome::Success(token)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use crate::model::db::{admin::Admin, voter::Voter};

    use super::*;

    #[test]
    fn cookie_round_trip_keeps_identity_and_rights() {
        let config = Config::example();
        let id = Id::new();
        let token = AuthToken::<Voter> {
            id,
            rights: Rights::Voter,
            phantom: PhantomData,
        };

        let cookie = token.into_cookie(&config).unwrap();
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));

        let decoded = AuthToken::<Voter>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(decoded.id, id);
        assert!(decoded.permits(Rights::Voter));
        assert!(!decoded.permits(Rights::Admin));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = AuthToken::<Admin> {
            id: Id::new(),
            rights: Rights::Admin,
            phantom: PhantomData,
        };
        let cookie = token.into_cookie(&Config::example()).unwrap();

        let other = Config::example_with_secret("a different secret");
        assert!(AuthToken::<Admin>::from_cookie(&cookie, &other).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims::<Voter> {
            token: AuthToken {
                id: Id::new(),
                rights: Rights::Voter,
                phantom: PhantomData,
            },
            expire_at: Utc::now() - ChronoDuration::hours(1),
        };
        let config = Config::example();
        let value = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap();

        let cookie = Cookie::new(AUTH_TOKEN_COOKIE, value);
        assert!(AuthToken::<Voter>::from_cookie(&cookie, &config).is_err());
    }
}
