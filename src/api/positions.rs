use log::info;
use mongodb::{
    bson::doc,
    options::{FindOneOptions, FindOptions},
    Client, ClientSession,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::position::{Direction, PositionDescription, PositionSpec},
    db::{
        activity::{log_activity, NewActivity},
        admin::Admin,
        candidate::Candidate,
        position::{ballot_order, NewPosition, Position},
    },
    mongodb::{Coll, Id},
};

use super::common::{conflict, inserted_id, unique_violation};

pub fn routes() -> Vec<Route> {
    routes![
        get_positions,
        create_position,
        update_position,
        delete_position,
        move_position,
        toggle_position,
    ]
}

async fn find_position(positions: &Coll<Position>, position_id: Id) -> Result<Position> {
    positions
        .find_one(position_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Position {position_id}")))
}

/// Every position, in ballot order.
async fn all_positions(
    positions: &Coll<Position>,
    session: &mut ClientSession,
) -> Result<Vec<Position>> {
    let mut cursor = positions.find_with_session(None, None, session).await?;
    let mut all = Vec::new();
    while let Some(position) = cursor.next(session).await {
        all.push(position?);
    }
    ballot_order(&mut all);
    Ok(all)
}

#[get("/positions")]
async fn get_positions(
    _admin: Admin,
    positions: Coll<Position>,
) -> Result<Json<Vec<PositionDescription>>> {
    let in_order = FindOptions::builder()
        .sort(doc! {"display_order": 1, "name": 1})
        .build();
    let positions = positions
        .find(None, in_order)
        .await?
        .map_ok(PositionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(positions))
}

/// Create a position. Unless told otherwise it goes after every existing one.
#[post("/positions", data = "<spec>", format = "json")]
async fn create_position(
    admin: Admin,
    spec: Json<PositionSpec>,
    positions: Coll<Position>,
    new_positions: Coll<NewPosition>,
    activity: Coll<NewActivity>,
) -> Result<Json<PositionDescription>> {
    spec.validate()?;

    let last = FindOneOptions::builder()
        .sort(doc! {"display_order": -1})
        .build();
    let next_order = positions
        .find_one(None, last)
        .await?
        .map_or(1, |position| position.display_order + 1);

    let position = spec.0.into_position(next_order);
    let id = new_positions
        .insert_one(&position, None)
        .await
        .map_err(|e| unique_violation(e, format!("Position {}", position.name)))
        .and_then(inserted_id)?;
    info!("Created position {id}");
    log_activity(
        &activity,
        "position-created",
        &admin.username,
        format!("Added {}", position.name),
    )
    .await?;

    let position = find_position(&positions, id).await?;
    Ok(Json(position.into()))
}

/// Edit a position. Renaming it renames it on its candidates too.
#[put("/positions/<position_id>", data = "<spec>", format = "json")]
async fn update_position(
    admin: Admin,
    position_id: Id,
    spec: Json<PositionSpec>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
    db_client: &State<Client>,
) -> Result<Json<PositionDescription>> {
    spec.validate()?;

    let (old_name, new_name) = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let existing = positions
            .find_one_with_session(position_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Position {position_id}")))?;
        let updated = spec.0.into_position(existing.display_order);

        let update = doc! {
            "$set": {
                "name": &updated.name,
                "description": &updated.description,
                "display_order": updated.display_order,
                "active": updated.active,
            }
        };
        positions
            .update_one_with_session(position_id.as_doc(), update, None, &mut session)
            .await
            .map_err(|e| unique_violation(e, format!("Position {}", updated.name)))?;

        if existing.name != updated.name {
            let standing = doc! {
                "position": &existing.name,
            };
            let rename = doc! {
                "$set": { "position": &updated.name },
            };
            let renamed = candidates
                .update_many_with_session(standing, rename, None, &mut session)
                .await?;
            info!(
                "Moved {} candidates to renamed position {position_id}",
                renamed.modified_count
            );
        }

        session.commit_transaction().await?;
        (existing.position.name, updated.name)
    };

    let details = if old_name == new_name {
        format!("Updated {new_name}")
    } else {
        format!("Renamed {old_name} to {new_name}")
    };
    log_activity(&activity, "position-updated", &admin.username, details).await?;

    let position = find_position(&positions, position_id).await?;
    Ok(Json(position.into()))
}

/// Delete a position nobody stands for.
#[delete("/positions/<position_id>")]
async fn delete_position(
    admin: Admin,
    position_id: Id,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    activity: Coll<NewActivity>,
) -> Result<()> {
    let position = find_position(&positions, position_id).await?;

    let standing = doc! {
        "position": &position.name,
    };
    let count = candidates.count_documents(standing, None).await?;
    if count > 0 {
        return Err(conflict(format!(
            "Position {} still has {count} candidate(s)",
            position.name
        )));
    }

    positions.delete_one(position_id.as_doc(), None).await?;
    info!("Deleted position {position_id}");
    log_activity(
        &activity,
        "position-deleted",
        &admin.username,
        format!("Removed {}", position.name),
    )
    .await?;
    Ok(())
}

/// Swap a position with its neighbour on the ballot. Display orders are
/// renumbered from 1 so that ties can never block a move. Moving the first
/// position up or the last one down changes nothing.
#[post("/positions/<position_id>/move?<direction>")]
async fn move_position(
    admin: Admin,
    position_id: Id,
    direction: Direction,
    positions: Coll<Position>,
    activity: Coll<NewActivity>,
    db_client: &State<Client>,
) -> Result<Json<Vec<PositionDescription>>> {
    let (moved, ordered) = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let mut ordered = all_positions(&positions, &mut session).await?;
        let index = ordered
            .iter()
            .position(|p| p.id == position_id)
            .ok_or_else(|| Error::not_found(format!("Position {position_id}")))?;
        let neighbour = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|&i| i < ordered.len()),
        };
        if let Some(neighbour) = neighbour {
            ordered.swap(index, neighbour);
        }

        for (order, position) in (1..).zip(ordered.iter_mut()) {
            if position.display_order == order {
                continue;
            }
            position.display_order = order;
            let renumber = doc! {
                "$set": { "display_order": order },
            };
            positions
                .update_one_with_session(position.id.as_doc(), renumber, None, &mut session)
                .await?;
        }

        session.commit_transaction().await?;
        (neighbour.is_some(), ordered)
    };

    if moved {
        let name = ordered
            .iter()
            .find(|p| p.id == position_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        log_activity(
            &activity,
            "position-moved",
            &admin.username,
            format!("Moved {name} {direction:?}"),
        )
        .await?;
    }

    Ok(Json(ordered.into_iter().map(Into::into).collect()))
}

#[post("/positions/<position_id>/toggle")]
async fn toggle_position(
    admin: Admin,
    position_id: Id,
    positions: Coll<Position>,
    activity: Coll<NewActivity>,
) -> Result<Json<PositionDescription>> {
    let position = find_position(&positions, position_id).await?;

    let mut unchanged = position_id.as_doc();
    unchanged.insert("active", position.active);
    let toggle = doc! {
        "$set": { "active": !position.active },
    };
    let result = positions.update_one(unchanged, toggle, None).await?;
    if result.modified_count == 0 {
        return Err(conflict(format!(
            "Position {} was changed concurrently, please retry",
            position.name
        )));
    }

    let state = if position.active {
        "Deactivated"
    } else {
        "Activated"
    };
    log_activity(
        &activity,
        "position-toggled",
        &admin.username,
        format!("{state} {}", position.name),
    )
    .await?;

    let position = find_position(&positions, position_id).await?;
    Ok(Json(position.into()))
}
