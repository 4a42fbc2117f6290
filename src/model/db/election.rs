use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoteError};
use crate::model::{
    common::ElectionWindow,
    mongodb::{Coll, Id},
};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Whether this is the current election. At most one election is active.
    pub is_active: bool,
}

impl ElectionCore {
    /// The voting window of this election.
    /// Fails if the stored times are malformed.
    pub fn window(&self) -> std::result::Result<ElectionWindow, VoteError> {
        ElectionWindow::new(self.start_time, self.end_time)
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Filter matching the active election.
pub fn active_filter() -> Document {
    doc! {
        "is_active": true,
    }
}

/// Get the current (active) election, if there is one.
pub async fn current_election(elections: &Coll<Election>) -> Result<Option<Election>> {
    Ok(elections.find_one(active_filter(), None).await?)
}
