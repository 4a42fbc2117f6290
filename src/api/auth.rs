use chrono::Utc;
use log::info;
use mongodb::bson::doc;
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    admission::admit,
    api::{
        admin::AdminCredentials,
        auth::{AuthToken, AUTH_TOKEN_COOKIE},
        voter::{VoterDescription, VoterLogin},
    },
    db::{admin::Admin, election::Election, voter::Voter},
    mongodb::Coll,
};

use super::common::open_election;

pub fn routes() -> Vec<Route> {
    routes![authenticate, authenticate_voter, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);
    info!("Admin '{}' signed in", admin.username);

    Ok(())
}

/// Sign a voter in with their voter ID. Only possible while voting is open.
#[post("/auth/voter", data = "<login>", format = "json")]
pub async fn authenticate_voter(
    cookies: &CookieJar<'_>,
    login: Json<VoterLogin>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    config: &State<Config>,
) -> Result<Json<VoterDescription>> {
    open_election(&elections, Utc::now()).await?;

    let voter = admit(&voters, &login.voter_id).await?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config)?);
    info!("Voter {} signed in", voter.id);

    Ok(Json(voter.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}
