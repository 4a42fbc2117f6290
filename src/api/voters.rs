use log::{info, warn};
use mongodb::{
    bson::{doc, Bson, Document},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        pagination::{Paginated, Pagination},
        voter::{generate_voter_id, VoterDescription, VoterDetails, VoterSpec},
    },
    db::{
        activity::{log_activity, NewActivity},
        admin::Admin,
        registry::{Registry, RegistryEntry},
        voter::{find_by_voter_id, voted_filter, voter_id_filter, NewVoter, Voter, VOTED_AT},
    },
    mongodb::{is_duplicate_key_error, Coll},
};

use super::common::{conflict, unique_violation};

/// How many fresh IDs to try before giving up on a voter.
const ID_ATTEMPTS: usize = 5;

pub fn routes() -> Vec<Route> {
    routes![
        get_voters,
        create_voter,
        create_voters,
        get_voter,
        update_voter,
        delete_voter,
        regenerate_voter_id,
    ]
}

/// Insert a voter, generating an ID unless one was given.
/// Generated IDs that collide are replaced; a provided ID that collides is a conflict.
async fn register(
    voters: &Coll<NewVoter>,
    registry: &Registry,
    spec: VoterSpec,
) -> Result<NewVoter> {
    registry.check_voter(&spec.details.attributes())?;
    if let Some(voter_id) = spec.voter_id.clone() {
        let voter = spec.into_voter(voter_id)?;
        voters
            .insert_one(&voter, None)
            .await
            .map_err(|e| unique_violation(e, "Voter ID".to_string()))?;
        return Ok(voter);
    }

    for _ in 0..ID_ATTEMPTS {
        let voter = spec.clone().into_voter(generate_voter_id())?;
        match voters.insert_one(&voter, None).await {
            Ok(_) => return Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => {
                warn!("Generated voter ID collided, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(conflict("Could not generate an unused voter ID".to_string()))
}

/// Only voters who have not voted may be changed.
fn not_yet_voted(voter_id: &str) -> Document {
    let mut filter = voter_id_filter(voter_id);
    filter.insert(VOTED_AT, Bson::Null);
    filter
}

/// Explain why a change to a voter matched nothing.
async fn unchangeable(voters: &Coll<Voter>, voter_id: &str) -> Result<Error> {
    Ok(match find_by_voter_id(voters, voter_id).await? {
        Some(voter) => conflict(format!(
            "{} has already voted and can no longer be changed",
            voter.name
        )),
        None => Error::not_found("Voter".to_string()),
    })
}

#[get("/voters?<voted>")]
async fn get_voters(
    _admin: Admin,
    voted: Option<bool>,
    pagination: Pagination,
    voters: Coll<Voter>,
) -> Result<Json<Paginated<VoterDescription>>> {
    let filter = voted.map(voted_filter).unwrap_or_default();
    let total = voters.count_documents(filter.clone(), None).await?;

    let page = FindOptions::builder()
        .sort(doc! {"name": 1, "voter_id": 1})
        .skip(pagination.skip())
        .limit(pagination.page_size() as i64)
        .build();
    let items = voters
        .find(filter, page)
        .await?
        .map_ok(VoterDescription::from)
        .try_collect()
        .await?;

    Ok(Json(Paginated {
        items,
        pagination: pagination.result(total),
    }))
}

#[post("/voters", data = "<spec>", format = "json")]
async fn create_voter(
    admin: Admin,
    spec: Json<VoterSpec>,
    new_voters: Coll<NewVoter>,
    voters: Coll<Voter>,
    registry: Coll<RegistryEntry>,
    activity: Coll<NewActivity>,
) -> Result<Json<VoterDescription>> {
    let registry = Registry::load(&registry).await?;
    let voter = register(&new_voters, &registry, spec.0).await?;
    log_activity(
        &activity,
        "voter-created",
        &admin.username,
        format!("Registered {}", voter.name),
    )
    .await?;

    let voter = find_by_voter_id(&voters, &voter.voter_id)
        .await?
        .ok_or_else(|| Error::not_found("Voter".to_string()))?;
    Ok(Json(voter.into()))
}

/// One voter of a bulk registration that could not be registered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkFailure {
    index: usize,
    name: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct BulkResult {
    created: Vec<VoterDescription>,
    failed: Vec<BulkFailure>,
}

/// Register many voters at once. Each is registered independently, so one
/// bad entry does not prevent the others.
#[post("/voters/bulk", data = "<specs>", format = "json")]
async fn create_voters(
    admin: Admin,
    specs: Json<Vec<VoterSpec>>,
    new_voters: Coll<NewVoter>,
    voters: Coll<Voter>,
    registry: Coll<RegistryEntry>,
    activity: Coll<NewActivity>,
) -> Result<Json<BulkResult>> {
    let registry = Registry::load(&registry).await?;
    let mut created = Vec::new();
    let mut failed = Vec::new();

    for (index, spec) in specs.0.into_iter().enumerate() {
        let name = spec.details.name.clone();
        match register(&new_voters, &registry, spec).await {
            Ok(voter) => {
                if let Some(voter) = find_by_voter_id(&voters, &voter.voter_id).await? {
                    created.push(VoterDescription::from(voter));
                }
            }
            // Database outages abort the whole request.
            Err(Error::Db(e)) => return Err(e.into()),
            Err(e) => failed.push(BulkFailure {
                index,
                name,
                message: e.to_string(),
            }),
        }
    }

    info!(
        "Bulk registration: {} created, {} failed",
        created.len(),
        failed.len()
    );
    log_activity(
        &activity,
        "voters-imported",
        &admin.username,
        format!("Registered {} voters, {} failed", created.len(), failed.len()),
    )
    .await?;

    Ok(Json(BulkResult { created, failed }))
}

#[get("/voters/<voter_id>")]
async fn get_voter(
    _admin: Admin,
    voter_id: &str,
    voters: Coll<Voter>,
) -> Result<Json<VoterDescription>> {
    let voter = find_by_voter_id(&voters, voter_id)
        .await?
        .ok_or_else(|| Error::not_found("Voter".to_string()))?;
    Ok(Json(voter.into()))
}

#[put("/voters/<voter_id>", data = "<details>", format = "json")]
async fn update_voter(
    admin: Admin,
    voter_id: &str,
    details: Json<VoterDetails>,
    voters: Coll<Voter>,
    registry: Coll<RegistryEntry>,
    activity: Coll<NewActivity>,
) -> Result<Json<VoterDescription>> {
    details.validate()?;
    let attributes = details.attributes();
    Registry::load(&registry).await?.check_voter(&attributes)?;
    let update = doc! {
        "$set": {
            "name": details.name.trim(),
            "year": &attributes.year,
            "class": &attributes.class,
            "house": &attributes.house,
        }
    };
    let result = voters
        .update_one(not_yet_voted(voter_id), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(unchangeable(&voters, voter_id).await?);
    }
    log_activity(
        &activity,
        "voter-updated",
        &admin.username,
        format!("Updated {}", details.name.trim()),
    )
    .await?;

    let voter = find_by_voter_id(&voters, voter_id)
        .await?
        .ok_or_else(|| Error::not_found("Voter".to_string()))?;
    Ok(Json(voter.into()))
}

#[delete("/voters/<voter_id>")]
async fn delete_voter(
    admin: Admin,
    voter_id: &str,
    voters: Coll<Voter>,
    activity: Coll<NewActivity>,
) -> Result<()> {
    let voter = find_by_voter_id(&voters, voter_id)
        .await?
        .ok_or_else(|| Error::not_found("Voter".to_string()))?;

    let result = voters.delete_one(not_yet_voted(voter_id), None).await?;
    if result.deleted_count == 0 {
        return Err(unchangeable(&voters, voter_id).await?);
    }
    info!("Deleted voter {}", voter.id);
    log_activity(
        &activity,
        "voter-deleted",
        &admin.username,
        format!("Removed {}", voter.name),
    )
    .await?;
    Ok(())
}

/// Replace a voter's ID, e.g. after it was disclosed.
#[post("/voters/<voter_id>/regenerate")]
async fn regenerate_voter_id(
    admin: Admin,
    voter_id: &str,
    voters: Coll<Voter>,
    activity: Coll<NewActivity>,
) -> Result<Json<VoterDescription>> {
    for _ in 0..ID_ATTEMPTS {
        let fresh = generate_voter_id();
        let update = doc! {
            "$set": { "voter_id": &fresh },
        };
        match voters
            .update_one(not_yet_voted(voter_id), update, None)
            .await
        {
            Ok(result) if result.matched_count == 0 => {
                return Err(unchangeable(&voters, voter_id).await?);
            }
            Ok(_) => {
                let voter = find_by_voter_id(&voters, &fresh)
                    .await?
                    .ok_or_else(|| Error::not_found("Voter".to_string()))?;
                info!("Regenerated ID of voter {}", voter.id);
                log_activity(
                    &activity,
                    "voter-id-regenerated",
                    &admin.username,
                    format!("New voter ID for {}", voter.name),
                )
                .await?;
                return Ok(Json(voter.into()));
            }
            Err(e) if is_duplicate_key_error(&e) => {
                warn!("Generated voter ID collided, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(conflict("Could not generate an unused voter ID".to_string()))
}
