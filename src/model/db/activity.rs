use chrono::{DateTime, Utc};
use log::debug;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{Coll, Id};

/// An entry in the administrative activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCore {
    /// Short machine-friendly name of what happened, e.g. `candidate-created`.
    pub action: String,
    /// Username of the admin responsible.
    pub user: String,
    /// Human-readable description.
    pub details: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl ActivityCore {
    pub fn new(action: &str, user: &str, details: String) -> Self {
        Self {
            action: action.to_string(),
            user: user.to_string(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// An activity log entry without an ID.
pub type NewActivity = ActivityCore;

/// An activity log entry from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub activity: ActivityCore,
}

/// Append an entry to the activity log.
pub async fn log_activity(
    activity: &Coll<NewActivity>,
    action: &str,
    user: &str,
    details: String,
) -> Result<()> {
    debug!("Activity {action} by {user}: {details}");
    activity
        .insert_one(NewActivity::new(action, user, details), None)
        .await?;
    Ok(())
}
