use log::info;
use mongodb::{
    bson::{self, doc},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::{CandidateDescription, CandidateSpec},
    db::{
        activity::{log_activity, NewActivity},
        admin::Admin,
        candidate::{Candidate, NewCandidate},
        position::Position,
        registry::{Registry, RegistryEntry},
    },
    mongodb::{Coll, Id},
};

use super::common::{conflict, inserted_id};

pub fn routes() -> Vec<Route> {
    routes![
        get_candidates,
        create_candidate,
        get_candidate,
        update_candidate,
        delete_candidate,
        activate_candidate,
        deactivate_candidate,
    ]
}

/// Candidates must stand for a position that exists.
async fn check_position_exists(positions: &Coll<Position>, name: &str) -> Result<()> {
    let filter = doc! {
        "name": name,
    };
    if positions.find_one(filter, None).await?.is_none() {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            format!("No such position: {name}"),
        ));
    }
    Ok(())
}

async fn find_candidate(candidates: &Coll<Candidate>, candidate_id: Id) -> Result<Candidate> {
    candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))
}

#[get("/candidates")]
async fn get_candidates(
    _admin: Admin,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let by_position = FindOptions::builder()
        .sort(doc! {"position": 1, "display_order": 1, "name": 1})
        .build();
    let candidates = candidates
        .find(None, by_position)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    Ok(Json(candidates))
}

#[post("/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    admin: Admin,
    spec: Json<CandidateSpec>,
    positions: Coll<Position>,
    new_candidates: Coll<NewCandidate>,
    candidates: Coll<Candidate>,
    registry: Coll<RegistryEntry>,
    activity: Coll<NewActivity>,
) -> Result<Json<CandidateDescription>> {
    spec.validate()?;
    check_position_exists(&positions, &spec.position).await?;
    Registry::load(&registry)
        .await?
        .check_category(&spec.voter_category)?;

    let candidate = spec.0.into_candidate();
    let id = inserted_id(new_candidates.insert_one(&candidate, None).await?)?;
    info!("Created candidate {id}");
    log_activity(
        &activity,
        "candidate-created",
        &admin.username,
        format!("Added {} for {}", candidate.name, candidate.position),
    )
    .await?;

    let candidate = find_candidate(&candidates, id).await?;
    Ok(Json(candidate.into()))
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    _admin: Admin,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let candidate = find_candidate(&candidates, candidate_id).await?;
    Ok(Json(candidate.into()))
}

/// Replace a candidate's details. The vote count is untouched.
#[put("/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn update_candidate(
    admin: Admin,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    registry: Coll<RegistryEntry>,
    activity: Coll<NewActivity>,
) -> Result<Json<CandidateDescription>> {
    spec.validate()?;
    check_position_exists(&positions, &spec.position).await?;
    Registry::load(&registry)
        .await?
        .check_category(&spec.voter_category)?;

    let candidate = spec.0.into_candidate();
    let update = doc! {
        "$set": {
            "name": &candidate.name,
            "position": &candidate.position,
            "image_url": &candidate.image_url,
            "voter_category": bson::to_bson(&candidate.voter_category)?,
            "active": candidate.active,
            "display_order": candidate.display_order,
        }
    };
    let result = candidates
        .update_one(candidate_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    log_activity(
        &activity,
        "candidate-updated",
        &admin.username,
        format!("Updated {}", candidate.name),
    )
    .await?;

    let candidate = find_candidate(&candidates, candidate_id).await?;
    Ok(Json(candidate.into()))
}

/// Delete a candidate. Only possible before anyone has voted for them;
/// after that they can only be deactivated.
#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    admin: Admin,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
) -> Result<()> {
    let candidate = find_candidate(&candidates, candidate_id).await?;

    let mut without_votes = candidate_id.as_doc();
    without_votes.insert("votes", 0_i64);
    let result = candidates.delete_one(without_votes, None).await?;
    if result.deleted_count == 0 {
        return Err(conflict(format!(
            "Candidate {} has received votes; deactivate them instead",
            candidate.name
        )));
    }
    info!("Deleted candidate {candidate_id}");
    log_activity(
        &activity,
        "candidate-deleted",
        &admin.username,
        format!("Removed {} from {}", candidate.name, candidate.position),
    )
    .await?;
    Ok(())
}

async fn set_active(
    admin: &Admin,
    candidate_id: Id,
    active: bool,
    candidates: &Coll<Candidate>,
    activity: &Coll<NewActivity>,
) -> Result<Json<CandidateDescription>> {
    let update = doc! {
        "$set": {
            "active": active,
        }
    };
    let result = candidates
        .update_one(candidate_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }

    let candidate = find_candidate(candidates, candidate_id).await?;
    let action = if active {
        "candidate-activated"
    } else {
        "candidate-deactivated"
    };
    log_activity(
        activity,
        action,
        &admin.username,
        format!("{} ({})", candidate.name, candidate.position),
    )
    .await?;
    Ok(Json(candidate.into()))
}

#[post("/candidates/<candidate_id>/activate")]
async fn activate_candidate(
    admin: Admin,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
) -> Result<Json<CandidateDescription>> {
    set_active(&admin, candidate_id, true, &candidates, &activity).await
}

#[post("/candidates/<candidate_id>/deactivate")]
async fn deactivate_candidate(
    admin: Admin,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
) -> Result<Json<CandidateDescription>> {
    set_active(&admin, candidate_id, false, &candidates, &activity).await
}
