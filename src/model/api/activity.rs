use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::activity::Activity,
    mongodb::{serde_hex, Id},
};

/// An API-friendly activity log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub action: String,
    pub user: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Activity> for ActivityDescription {
    fn from(entry: Activity) -> Self {
        Self {
            id: entry.id,
            action: entry.activity.action,
            user: entry.activity.user,
            details: entry.activity.details,
            timestamp: entry.activity.timestamp,
        }
    }
}
