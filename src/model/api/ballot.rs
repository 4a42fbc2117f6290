use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::VoteError;
use crate::model::{
    ballot::{Ballot, BallotDraft, BallotPosition},
    mongodb::{serde_hex, Id},
};

/// A candidate as shown on a ballot. Vote counts are never shown to voters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotCandidate {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotPositionDescription {
    pub position: String,
    pub description: String,
    pub candidates: Vec<BallotCandidate>,
}

impl From<&BallotPosition> for BallotPositionDescription {
    fn from(slot: &BallotPosition) -> Self {
        Self {
            position: slot.position.name.clone(),
            description: slot.position.description.clone(),
            candidates: slot
                .candidates
                .iter()
                .map(|c| BallotCandidate {
                    id: c.id,
                    name: c.name.clone(),
                    image_url: c.image_url.clone(),
                })
                .collect(),
        }
    }
}

/// An API-friendly view of a voter's ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotDescription {
    pub positions: Vec<BallotPositionDescription>,
}

impl From<&Ballot> for BallotDescription {
    fn from(ballot: &Ballot) -> Self {
        Self {
            positions: ballot.positions().iter().map(Into::into).collect(),
        }
    }
}

/// A decision as submitted: `{"select": "<candidate id>"}` or `"abstain"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Select(#[serde(with = "serde_hex")] Id),
    Abstain,
}

/// A voter's submitted decisions, keyed by position name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSubmission {
    pub decisions: BTreeMap<String, Choice>,
}

impl BallotSubmission {
    /// Apply every submitted decision to the draft.
    pub fn apply_to(&self, draft: &mut BallotDraft<'_>) -> Result<(), VoteError> {
        for (position, choice) in &self.decisions {
            match choice {
                Choice::Select(candidate_id) => draft.select(position, *candidate_id)?,
                Choice::Abstain => draft.abstain(position)?,
            }
        }
        Ok(())
    }
}
