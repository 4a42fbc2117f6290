use chrono::{DateTime, Utc};
use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::{
    http::{Method, Status},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::redact_voter_ids;
use crate::model::common::ElectionStatus;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while handling a request.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a `404 Not Found` naming the missing thing.
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {what}"))
    }

    /// Shorthand for a `400 Bad Request`.
    pub fn bad_request(reason: String) -> Self {
        Self::Status(Status::BadRequest, reason)
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Bson(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
            Self::Vote(err) => err.status(),
            Self::Status(status, _) => *status,
        }
    }
}

/// Failures of the voting flow. These are shown to voters (or, for
/// [`VoteError::Configuration`], administrators) and carry the data
/// needed to explain them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(
    tag = "error",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum VoteError {
    #[error("Invalid voter ID")]
    InvalidId,
    #[error("Voter {name} has already voted")]
    AlreadyVoted {
        name: String,
        voter_id: String,
        voted_at: DateTime<Utc>,
    },
    #[error("Every position needs a selection or an abstention: {}", .positions.join(", "))]
    IncompletePositions { positions: Vec<String> },
    #[error("Candidate {candidate_id} is not on your ballot for {position}")]
    IneligibleCandidate {
        position: String,
        candidate_id: String,
    },
    #[error("Position {position} is not on your ballot")]
    UnknownPosition { position: String },
    #[error("The election changed while your vote was being recorded, please try again")]
    StaleReference,
    #[error("Voting is not open")]
    ElectionNotActive { status: Option<ElectionStatus> },
    #[error("Election misconfigured: {reason}")]
    Configuration { reason: String },
}

impl VoteError {
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidId => Status::Unauthorized,
            Self::AlreadyVoted { .. } | Self::StaleReference => Status::Conflict,
            Self::IncompletePositions { .. }
            | Self::IneligibleCandidate { .. }
            | Self::UnknownPosition { .. } => Status::UnprocessableEntity,
            Self::ElectionNotActive { .. } => Status::Forbidden,
            Self::Configuration { .. } => Status::InternalServerError,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    detail: Option<VoteError>,
}

impl From<Error> for ErrorBody {
    fn from(err: Error) -> Self {
        match err {
            // Never leak internals to the client.
            Error::Db(_) | Error::Bson(_) => Self {
                message: "Internal server error".to_string(),
                detail: None,
            },
            Error::Jwt(_) => Self {
                message: "Invalid or expired session".to_string(),
                detail: None,
            },
            Error::Vote(vote) => Self {
                message: vote.to_string(),
                detail: Some(vote),
            },
            Error::Status(_, message) => Self {
                message,
                detail: None,
            },
        }
    }
}

/// The log line for a failed request. Voter IDs in the path are redacted.
fn failure_line(method: Method, path: &str, err: &Error) -> String {
    format!("{method} {}: {err}", redact_voter_ids(path))
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let line = failure_line(req.method(), req.uri().path().as_str(), &self);
        if status.code >= 500 {
            error!("{line}");
        } else {
            warn!("{line}");
        }
        Custom(status, Json(ErrorBody::from(self))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rocket::serde::json::serde_json::{self, json};

    use super::*;

    #[test]
    fn already_voted_carries_prior_vote() {
        let voted_at = Utc.with_ymd_and_hms(2025, 5, 15, 12, 45, 0).unwrap();
        let err = Error::from(VoteError::AlreadyVoted {
            name: "John Doe".to_string(),
            voter_id: "VOTER2025".to_string(),
            voted_at,
        });
        assert_eq!(err.status(), Status::Conflict);

        let body = serde_json::to_value(ErrorBody::from(err)).unwrap();
        assert_eq!(
            body,
            json!({
                "message": "Voter John Doe has already voted",
                "error": "alreadyVoted",
                "name": "John Doe",
                "voterId": "VOTER2025",
                "votedAt": "2025-05-15T12:45:00Z",
            })
        );
    }

    #[test]
    fn incomplete_positions_are_listed() {
        let err = VoteError::IncompletePositions {
            positions: vec!["Senior Prefect".to_string(), "Sports Prefect".to_string()],
        };
        assert_eq!(err.status(), Status::UnprocessableEntity);
        assert_eq!(
            err.to_string(),
            "Every position needs a selection or an abstention: Senior Prefect, Sports Prefect"
        );

        let body = serde_json::to_value(ErrorBody::from(Error::from(err))).unwrap();
        assert_eq!(body["error"], "incompletePositions");
        assert_eq!(body["positions"], json!(["Senior Prefect", "Sports Prefect"]));
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(VoteError::InvalidId.status(), Status::Unauthorized);
        assert_eq!(VoteError::StaleReference.status(), Status::Conflict);
        assert_eq!(
            VoteError::ElectionNotActive {
                status: Some(ElectionStatus::Ended)
            }
            .status(),
            Status::Forbidden
        );
        assert_eq!(
            VoteError::Configuration {
                reason: "bad".to_string()
            }
            .status(),
            Status::InternalServerError
        );
        assert_eq!(
            Error::not_found("Voter".to_string()).status(),
            Status::NotFound
        );
    }

    #[test]
    fn failure_lines_never_name_voter_ids() {
        let line = failure_line(
            Method::Post,
            "/api/voters/VOTER482913/regenerate",
            &Error::not_found("Voter".to_string()),
        );
        assert_eq!(line, "POST /api/voters/<redacted>/regenerate: Not found: Voter");

        let line = failure_line(
            Method::Put,
            "/api/voters/VOTER482913",
            &Error::Status(Status::Conflict, "John Doe has already voted".to_string()),
        );
        assert!(!line.contains("VOTER482913"));

        let line = failure_line(
            Method::Get,
            "/api/ballot",
            &Error::from(VoteError::InvalidId),
        );
        assert_eq!(line, "GET /api/ballot: Invalid voter ID");
    }

    #[test]
    fn plain_errors_have_no_detail() {
        let body =
            serde_json::to_value(ErrorBody::from(Error::bad_request("nope".to_string()))).unwrap();
        assert_eq!(body, json!({"message": "nope"}));
    }
}
