use log::info;
use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::registry::{RegistryEntryDescription, RegistryEntrySpec},
    common::AttributeKind,
    db::{
        activity::{log_activity, NewActivity},
        admin::Admin,
        candidate::Candidate,
        registry::{NewRegistryEntry, RegistryEntry},
        voter::Voter,
    },
    mongodb::{Coll, Id},
};

use super::common::{conflict, inserted_id, unique_violation};

pub fn routes() -> Vec<Route> {
    routes![
        get_registry,
        create_registry_entry,
        update_registry_entry,
        delete_registry_entry,
    ]
}

async fn find_entry(
    entries: &Coll<RegistryEntry>,
    kind: AttributeKind,
    entry_id: Id,
) -> Result<RegistryEntry> {
    let filter = doc! {
        "_id": entry_id,
        "kind": kind.field(),
    };
    entries
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("{kind} {entry_id}")))
}

/// How many voters and candidates refer to this value.
async fn usage(
    kind: AttributeKind,
    name: &str,
    voters: &Coll<Voter>,
    candidates: &Coll<Candidate>,
) -> Result<u64> {
    let mut holders = Document::new();
    holders.insert(kind.field(), name);
    let restricted_to = doc! {
        "voter_category.type": kind.field(),
        "voter_category.values": name,
    };
    Ok(voters.count_documents(holders, None).await?
        + candidates.count_documents(restricted_to, None).await?)
}

/// Every registered value of one kind, by name.
#[get("/registry/<kind>")]
async fn get_registry(
    _admin: Admin,
    kind: AttributeKind,
    entries: Coll<RegistryEntry>,
) -> Result<Json<Vec<RegistryEntryDescription>>> {
    let by_name = FindOptions::builder().sort(doc! {"name": 1}).build();
    let entries = entries
        .find(doc! {"kind": kind.field()}, by_name)
        .await?
        .map_ok(RegistryEntryDescription::from)
        .try_collect()
        .await?;
    Ok(Json(entries))
}

#[post("/registry/<kind>", data = "<spec>", format = "json")]
async fn create_registry_entry(
    admin: Admin,
    kind: AttributeKind,
    spec: Json<RegistryEntrySpec>,
    new_entries: Coll<NewRegistryEntry>,
    entries: Coll<RegistryEntry>,
    activity: Coll<NewActivity>,
) -> Result<Json<RegistryEntryDescription>> {
    spec.validate(kind)?;

    let entry = spec.0.into_entry(kind);
    let id = new_entries
        .insert_one(&entry, None)
        .await
        .map_err(|e| unique_violation(e, format!("{kind} {}", entry.name)))
        .and_then(inserted_id)?;
    info!("Registered {kind} {id}");
    log_activity(
        &activity,
        "registry-created",
        &admin.username,
        format!("Added {kind} {}", entry.name),
    )
    .await?;

    let entry = find_entry(&entries, kind, id).await?;
    Ok(Json(entry.into()))
}

/// Edit an entry. Values that voters or candidates use cannot be renamed.
#[put("/registry/<kind>/<entry_id>", data = "<spec>", format = "json")]
async fn update_registry_entry(
    admin: Admin,
    kind: AttributeKind,
    entry_id: Id,
    spec: Json<RegistryEntrySpec>,
    entries: Coll<RegistryEntry>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
) -> Result<Json<RegistryEntryDescription>> {
    spec.validate(kind)?;

    let existing = find_entry(&entries, kind, entry_id).await?;
    let updated = spec.0.into_entry(kind);
    if existing.name != updated.name {
        let count = usage(kind, &existing.name, &voters, &candidates).await?;
        if count > 0 {
            return Err(conflict(format!(
                "{kind} {} is used by {count} voter(s) or candidate(s) and cannot be renamed",
                existing.name
            )));
        }
    }

    let update = doc! {
        "$set": {
            "name": &updated.name,
            "description": &updated.description,
            "color": updated.color.clone(),
            "active": updated.active,
        }
    };
    entries
        .update_one(entry_id.as_doc(), update, None)
        .await
        .map_err(|e| unique_violation(e, format!("{kind} {}", updated.name)))?;
    log_activity(
        &activity,
        "registry-updated",
        &admin.username,
        format!("Updated {kind} {}", updated.name),
    )
    .await?;

    let entry = find_entry(&entries, kind, entry_id).await?;
    Ok(Json(entry.into()))
}

/// Delete an entry nobody uses. Deactivate it instead to keep it on record.
#[delete("/registry/<kind>/<entry_id>")]
async fn delete_registry_entry(
    admin: Admin,
    kind: AttributeKind,
    entry_id: Id,
    entries: Coll<RegistryEntry>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
) -> Result<()> {
    let entry = find_entry(&entries, kind, entry_id).await?;

    let count = usage(kind, &entry.name, &voters, &candidates).await?;
    if count > 0 {
        return Err(conflict(format!(
            "{kind} {} is used by {count} voter(s) or candidate(s)",
            entry.name
        )));
    }

    entries.delete_one(entry_id.as_doc(), None).await?;
    info!("Deleted {kind} {entry_id}");
    log_activity(
        &activity,
        "registry-deleted",
        &admin.username,
        format!("Removed {kind} {}", entry.name),
    )
    .await?;
    Ok(())
}
