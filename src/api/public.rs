use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{CurrentElection, ElectionDescription},
    common::ElectionClock,
    db::election::{current_election, Election},
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![get_elections, election_current, election_status]
}

#[get("/elections")]
async fn get_elections(elections: Coll<Election>) -> Result<Json<Vec<ElectionDescription>>> {
    let newest_first = FindOptions::builder()
        .sort(doc! {"start_time": -1})
        .build();
    let elections = elections
        .find(None, newest_first)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(elections))
}

#[get("/elections/current")]
async fn election_current(elections: Coll<Election>) -> Result<Json<CurrentElection>> {
    let election = current_election(&elections)
        .await?
        .ok_or_else(|| Error::not_found("Current election".to_string()))?;
    let clock = election.window()?.clock_at(Utc::now());

    Ok(Json(CurrentElection {
        election: election.into(),
        clock,
    }))
}

#[get("/elections/current/status")]
async fn election_status(elections: Coll<Election>) -> Result<Json<ElectionClock>> {
    let election = current_election(&elections)
        .await?
        .ok_or_else(|| Error::not_found("Current election".to_string()))?;
    Ok(Json(election.window()?.clock_at(Utc::now())))
}
