use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{VoterAttributes, VoterCategory},
    mongodb::Id,
};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    /// Name of the position being contested.
    pub position: String,
    pub image_url: String,
    /// Which voters see this candidate on their ballot.
    pub voter_category: VoterCategory,
    /// Inactive candidates are hidden from ballots but keep their votes.
    pub active: bool,
    /// Ordering within the position, ascending.
    pub display_order: u32,
    /// Vote tally. Only ever changed by an atomic increment.
    #[serde(default)]
    pub votes: u64,
}

impl CandidateCore {
    /// Does this candidate appear on the ballot of a voter with these attributes?
    pub fn is_eligible_for(&self, voter: &VoterAttributes) -> bool {
        self.active && self.voter_category.admits(voter)
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Order candidates for display: by display order, then name, then ID.
pub fn display_order(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(name: &str, position: &str, voter_category: VoterCategory) -> Self {
            Self {
                name: name.to_string(),
                position: position.to_string(),
                image_url: format!("https://example.com/{}.jpg", name.replace(' ', "-")),
                voter_category,
                active: true,
                display_order: 0,
                votes: 0,
            }
        }
    }

    impl Candidate {
        pub fn example(name: &str, position: &str, voter_category: VoterCategory) -> Self {
            Self {
                id: Id::new(),
                candidate: CandidateCore::example(name, position, voter_category),
            }
        }

        pub fn with_votes(mut self, votes: u64) -> Self {
            self.votes = votes;
            self
        }

        pub fn with_order(mut self, display_order: u32) -> Self {
            self.display_order = display_order;
            self
        }
    }
}
