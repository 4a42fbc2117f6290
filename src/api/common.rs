use chrono::{DateTime, Utc};
use mongodb::{error::Error as DbError, results::InsertOneResult};
use rocket::http::Status;

use crate::error::{Error, Result, VoteError};
use crate::model::{
    common::ElectionStatus,
    db::election::{current_election, Election},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// The ID the database assigned to a freshly inserted document.
pub fn inserted_id(result: InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                "Database returned a non-ObjectId document ID".to_string(),
            )
        })
}

/// Get the current election, provided voting is open at `now`.
pub async fn open_election(elections: &Coll<Election>, now: DateTime<Utc>) -> Result<Election> {
    let election = current_election(elections)
        .await?
        .ok_or(VoteError::ElectionNotActive { status: None })?;
    let status = election.window()?.status_at(now);
    if status != ElectionStatus::Active {
        return Err(VoteError::ElectionNotActive {
            status: Some(status),
        }
        .into());
    }
    Ok(election)
}

/// A `409 Conflict` with the given reason.
pub fn conflict(reason: String) -> Error {
    Error::Status(Status::Conflict, reason)
}

/// Report a unique index violation as a conflict over `what`.
pub fn unique_violation(err: DbError, what: String) -> Error {
    if is_duplicate_key_error(&err) {
        conflict(format!("Already in use: {what}"))
    } else {
        err.into()
    }
}
