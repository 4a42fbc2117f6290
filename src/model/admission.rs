//! The voter identity gate: decides whether a voter ID may open a ballot.

use log::debug;

use crate::error::{Result, VoteError};
use crate::model::{
    db::voter::{find_by_voter_id, Voter},
    mongodb::Coll,
};

/// Decide whether the voter found for an ID may vote.
///
/// `found` is the result of an exact-match lookup of the ID.
pub fn evaluate(voter_id: &str, found: Option<Voter>) -> std::result::Result<Voter, VoteError> {
    if voter_id.trim().is_empty() {
        return Err(VoteError::InvalidId);
    }
    let voter = found.ok_or(VoteError::InvalidId)?;
    match voter.voted_at() {
        Some(voted_at) => Err(VoteError::AlreadyVoted {
            name: voter.name.clone(),
            voter_id: voter.voter_id.clone(),
            voted_at,
        }),
        None => Ok(voter),
    }
}

/// Look up a voter ID and admit the voter if they have not voted yet.
pub async fn admit(voters: &Coll<Voter>, voter_id: &str) -> Result<Voter> {
    // Blank IDs never reach the database.
    let found = if voter_id.trim().is_empty() {
        None
    } else {
        find_by_voter_id(voters, voter_id).await?
    };
    let voter = evaluate(voter_id, found)?;
    debug!("Admitted voter {}", voter.id);
    Ok(voter)
}
