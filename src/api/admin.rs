use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::Error as DbError,
    options::FindOptions,
    Client,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        activity::ActivityDescription,
        admin::AdminCredentials,
        election::{ElectionDescription, ElectionSpec},
        pagination::{Paginated, Pagination},
    },
    db::{
        activity::{log_activity, Activity, NewActivity},
        admin::{Admin, NewAdmin},
        candidate::Candidate,
        election::{Election, NewElection},
        position::Position,
        voter::Voter,
    },
    mongodb::{is_duplicate_key_error, is_transient_transaction_error, Coll, Id},
    results::{tally, PositionResults},
    stats::ElectionStats,
};

use super::common::{conflict, inserted_id, unique_violation};

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        delete_admin,
        create_election,
        modify_election,
        activate_election,
        delete_election,
        get_results,
        get_stats,
        get_activity,
    ]
}

#[get("/admins")]
async fn get_admins(_admin: Admin, admins: Coll<Admin>) -> Result<Json<Vec<String>>> {
    let admin_list: Vec<Admin> = admins.find(None, None).await?.try_collect().await?;
    let admin_names = admin_list
        .into_iter()
        .map(|admin| admin.admin.username)
        .collect();
    Ok(Json(admin_names))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    admin: Admin,
    new_admin: Json<AdminCredentials>,
    admins: Coll<NewAdmin>,
    activity: Coll<NewActivity>,
) -> Result<()> {
    let username = new_admin.username.clone();
    let created: NewAdmin = new_admin
        .0
        .try_into()
        .map_err(|_| Error::Status(Status::BadRequest, "Illegal admin credentials".to_string()))?;
    admins
        .insert_one(created, None)
        .await
        .map_err(|e| unique_violation(e, format!("Admin username {username}")))?;

    log_activity(
        &activity,
        "admin-created",
        &admin.username,
        format!("Added admin {username}"),
    )
    .await?;
    Ok(())
}

/// Remove an admin account. The last admin can never be removed, even by
/// concurrent deletions.
#[delete("/admins", data = "<username>", format = "json")]
async fn delete_admin(
    admin: Admin,
    username: Json<String>,
    admins: Coll<Admin>,
    activity: Coll<NewActivity>,
    db_client: &State<Client>,
) -> Result<()> {
    let contended = |e: DbError| {
        if is_transient_transaction_error(&e) {
            conflict("Another admin was removed at the same time".to_string())
        } else {
            e.into()
        }
    };

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! {
            "username": &*username,
        };
        let result = admins
            .delete_one_with_session(filter, None, &mut session)
            .await
            .map_err(contended)?;
        if result.deleted_count == 0 {
            return Err(Error::not_found(format!("Admin {}", *username)));
        }

        // Touch every remaining admin, so two deletions racing for the last
        // pair write the same documents and one of them aborts.
        let touch = doc! {
            "$inc": { "roster_version": 1 },
        };
        let remaining = admins
            .update_many_with_session(doc! {}, touch, None, &mut session)
            .await
            .map_err(contended)?;
        if remaining.matched_count == 0 {
            return Err(Error::Status(
                Status::UnprocessableEntity,
                "Cannot delete last admin!".to_string(),
            ));
        }

        session.commit_transaction().await.map_err(contended)?;
    }

    log_activity(
        &activity,
        "admin-deleted",
        &admin.username,
        format!("Removed admin {}", *username),
    )
    .await?;
    Ok(())
}

async fn find_election(elections: &Coll<Election>, election_id: Id) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Create an election. New elections start inactive.
#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    admin: Admin,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
    activity: Coll<NewActivity>,
) -> Result<Json<ElectionDescription>> {
    let election = spec.0.into_election()?;
    let id = inserted_id(new_elections.insert_one(&election, None).await?)?;
    info!("Created election {id}");
    log_activity(
        &activity,
        "election-created",
        &admin.username,
        format!("Created {}", election.title),
    )
    .await?;

    let election = find_election(&elections, id).await?;
    Ok(Json(election.into()))
}

/// Change an election's title or voting window. Whether it is active is unchanged.
#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    admin: Admin,
    election_id: Id,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    activity: Coll<NewActivity>,
) -> Result<Json<ElectionDescription>> {
    let election = spec.0.into_election()?;
    let update = doc! {
        "$set": {
            "title": &election.title,
            "start_time": BsonDateTime::from_chrono(election.start_time),
            "end_time": BsonDateTime::from_chrono(election.end_time),
        }
    };
    let result = elections
        .update_one(election_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    log_activity(
        &activity,
        "election-updated",
        &admin.username,
        format!("Updated {}", election.title),
    )
    .await?;

    let election = find_election(&elections, election_id).await?;
    Ok(Json(election.into()))
}

/// Make this the current election. Every other election is deactivated in the
/// same transaction, so there is never more than one current election.
#[post("/elections/<election_id>/activate")]
async fn activate_election(
    admin: Admin,
    election_id: Id,
    elections: Coll<Election>,
    activity: Coll<NewActivity>,
    db_client: &State<Client>,
) -> Result<Json<ElectionDescription>> {
    // A concurrent activation trips the unique index on active elections.
    let contended = |e: DbError| {
        if is_duplicate_key_error(&e) || is_transient_transaction_error(&e) {
            conflict("Another election was activated at the same time".to_string())
        } else {
            e.into()
        }
    };

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let others = doc! {
            "_id": { "$ne": election_id },
            "is_active": true,
        };
        let deactivate = doc! {
            "$set": { "is_active": false },
        };
        elections
            .update_many_with_session(others, deactivate, None, &mut session)
            .await
            .map_err(contended)?;

        let activate = doc! {
            "$set": { "is_active": true },
        };
        let result = elections
            .update_one_with_session(election_id.as_doc(), activate, None, &mut session)
            .await
            .map_err(contended)?;
        if result.matched_count == 0 {
            // Dropping the session aborts the transaction.
            return Err(Error::not_found(format!("Election {election_id}")));
        }

        session.commit_transaction().await.map_err(contended)?;
    }

    let election = find_election(&elections, election_id).await?;
    info!("Activated election {election_id}");
    log_activity(
        &activity,
        "election-activated",
        &admin.username,
        format!("Activated {}", election.title),
    )
    .await?;
    Ok(Json(election.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    admin: Admin,
    election_id: Id,
    elections: Coll<Election>,
    activity: Coll<NewActivity>,
) -> Result<()> {
    let election = find_election(&elections, election_id).await?;

    let mut inactive = election_id.as_doc();
    inactive.insert("is_active", false);
    let result = elections.delete_one(inactive, None).await?;
    if result.deleted_count == 0 {
        return Err(conflict(format!(
            "Election {} is the current election; activate another first",
            election.title
        )));
    }

    info!("Deleted election {election_id}");
    log_activity(
        &activity,
        "election-deleted",
        &admin.username,
        format!("Deleted {}", election.title),
    )
    .await?;
    Ok(())
}

#[get("/results")]
async fn get_results(
    _admin: Admin,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<PositionResults>>> {
    let positions: Vec<Position> = positions.find(None, None).await?.try_collect().await?;
    let candidates: Vec<Candidate> = candidates.find(None, None).await?.try_collect().await?;
    Ok(Json(tally(positions, candidates)))
}

#[get("/stats")]
async fn get_stats(
    _admin: Admin,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<Json<ElectionStats>> {
    let voters: Vec<Voter> = voters.find(None, None).await?.try_collect().await?;
    Ok(Json(ElectionStats::from_voters(
        &voters,
        config.recent_voters(),
    )))
}

#[get("/activity")]
async fn get_activity(
    _admin: Admin,
    pagination: Pagination,
    entries: Coll<Activity>,
) -> Result<Json<Paginated<ActivityDescription>>> {
    let total = entries.count_documents(None, None).await?;
    let newest_first = FindOptions::builder()
        .sort(doc! {"timestamp": -1, "_id": -1})
        .skip(pagination.skip())
        .limit(pagination.page_size() as i64)
        .build();
    let items = entries
        .find(None, newest_first)
        .await?
        .map_ok(ActivityDescription::from)
        .try_collect()
        .await?;

    Ok(Json(Paginated {
        items,
        pagination: pagination.result(total),
    }))
}
