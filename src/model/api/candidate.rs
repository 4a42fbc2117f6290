use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::VoterCategory,
    db::candidate::{Candidate, NewCandidate},
    mongodb::{serde_hex, Id},
};

fn active_by_default() -> bool {
    true
}

/// A candidate specification, as created or edited by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    pub name: String,
    /// Name of the position contested.
    pub position: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub voter_category: VoterCategory,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub display_order: u32,
}

impl CandidateSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request(
                "Candidate name must not be empty".to_string(),
            ));
        }
        if self.position.trim().is_empty() {
            return Err(Error::bad_request(
                "Candidate position must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert into a new candidate with no votes.
    pub fn into_candidate(self) -> NewCandidate {
        NewCandidate {
            name: self.name.trim().to_string(),
            position: self.position,
            image_url: self.image_url,
            voter_category: self.voter_category,
            active: self.active,
            display_order: self.display_order,
            votes: 0,
        }
    }
}

/// An API-friendly candidate description, for admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub position: String,
    pub image_url: String,
    pub voter_category: VoterCategory,
    pub active: bool,
    pub display_order: u32,
    pub votes: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let core = candidate.candidate;
        Self {
            id: candidate.id,
            name: core.name,
            position: core.position,
            image_url: core.image_url,
            voter_category: core.voter_category,
            active: core.active,
            display_order: core.display_order,
            votes: core.votes,
        }
    }
}
