use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::ElectionClock,
    db::election::{Election, NewElection},
    mongodb::{serde_hex, Id},
};

/// An election specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Voting opens at this time.
    #[serde(alias = "startDate")]
    pub start_time: DateTime<Utc>,
    /// Voting closes at this time.
    #[serde(alias = "endDate")]
    pub end_time: DateTime<Utc>,
}

impl ElectionSpec {
    /// Validate this spec and convert it into an inactive election.
    pub fn into_election(self) -> Result<NewElection> {
        if self.title.trim().is_empty() {
            return Err(Error::bad_request(
                "Election title must not be empty".to_string(),
            ));
        }
        let election = NewElection {
            title: self.title.trim().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: false,
        };
        election
            .window()
            .map_err(|e| Error::bad_request(e.to_string()))?;
        Ok(election)
    }
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let core = election.election;
        Self {
            id: election.id,
            title: core.title,
            start_time: core.start_time,
            end_time: core.end_time,
            is_active: core.is_active,
        }
    }
}

/// The current election along with its clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentElection {
    #[serde(flatten)]
    pub election: ElectionDescription,
    pub clock: ElectionClock,
}
