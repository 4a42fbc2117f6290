//! Recording a submitted ballot: marking the voter and counting their selections
//! as a single all-or-nothing transaction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    Client, ClientSession,
};
use rocket::tokio::time::sleep;
use serde::Serialize;

use crate::error::{Error, Result, VoteError};
use crate::model::{
    ballot::FinalBallot,
    db::{
        candidate::Candidate,
        voter::{Voter, VOTED_AT},
    },
    mongodb::{is_transient_transaction_error, Coll},
};

/// How many times a transaction is attempted before a conflict is reported.
const MAX_ATTEMPTS: u32 = 5;

/// Pause before retrying a conflicting transaction, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Confirmation that a ballot was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub name: String,
    pub voter_id: String,
    pub voted_at: DateTime<Utc>,
}

/// Record the voter's ballot at time `now`.
///
/// Either the voter is marked as voted and every selected candidate gains
/// exactly one vote, or nothing changes. A voter can only ever be recorded
/// once, however many submissions race.
pub async fn record(
    client: &Client,
    voters: &Coll<Voter>,
    candidates: &Coll<Candidate>,
    voter: &Voter,
    ballot: &FinalBallot,
    now: DateTime<Utc>,
) -> Result<Receipt> {
    // BSON datetimes have millisecond precision; report what is stored.
    let voted_at = BsonDateTime::from_chrono(now);
    let mut session = client.start_session(None).await?;

    let mut attempt = 1;
    loop {
        let result =
            record_once(&mut session, voters, candidates, voter, ballot, voted_at).await;
        match result {
            Err(Error::Db(ref e)) if is_transient_transaction_error(e) => {
                if attempt >= MAX_ATTEMPTS {
                    warn!(
                        "Giving up recording ballot of voter {} after {attempt} attempts",
                        voter.id
                    );
                    return Err(VoteError::StaleReference.into());
                }
                debug!(
                    "Transient conflict recording ballot of voter {}, retrying",
                    voter.id
                );
                // Give the competing transaction time to commit.
                sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// A single attempt at the recording transaction.
async fn record_once(
    session: &mut ClientSession,
    voters: &Coll<Voter>,
    candidates: &Coll<Candidate>,
    voter: &Voter,
    ballot: &FinalBallot,
    voted_at: BsonDateTime,
) -> Result<Receipt> {
    session.start_transaction(None).await?;

    match apply(session, voters, candidates, voter, ballot, voted_at).await {
        Ok(()) => {
            commit(session).await?;
            Ok(Receipt {
                name: voter.name.clone(),
                voter_id: voter.voter_id.clone(),
                voted_at: voted_at.to_chrono(),
            })
        }
        Err(e) => {
            // The server may already have aborted it.
            if let Err(abort_err) = session.abort_transaction().await {
                debug!("Abort after failed recording returned: {abort_err}");
            }
            Err(e)
        }
    }
}

/// Commit, retrying while the outcome of the commit itself is unknown.
async fn commit(session: &mut ClientSession) -> Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_ATTEMPTS =>
            {
                attempt += 1;
            }
            result => return Ok(result?),
        }
    }
}

/// The writes of the recording transaction.
async fn apply(
    session: &mut ClientSession,
    voters: &Coll<Voter>,
    candidates: &Coll<Candidate>,
    voter: &Voter,
    ballot: &FinalBallot,
    voted_at: BsonDateTime,
) -> Result<()> {
    // Mark the voter, but only if nobody has marked them yet.
    let not_yet_voted = doc! {
        "_id": voter.id,
        VOTED_AT: null,
    };
    let mark = doc! {
        "$set": { VOTED_AT: voted_at },
    };
    let marked = voters
        .update_one_with_session(not_yet_voted, mark, None, session)
        .await?;
    if marked.matched_count == 0 {
        return Err(already_recorded(session, voters, voter).await?.into());
    }

    // Count each selection against a still-active candidate of that position.
    for (position, candidate_id) in ballot.selections() {
        let filter = doc! {
            "_id": candidate_id,
            "position": position,
            "active": true,
        };
        let increment = doc! {
            "$inc": { "votes": 1_i64 },
        };
        let counted = candidates
            .update_one_with_session(filter, increment, None, session)
            .await?;
        if counted.matched_count == 0 {
            debug!("Candidate {candidate_id} for {position} vanished during recording");
            return Err(VoteError::StaleReference.into());
        }
    }

    Ok(())
}

/// Explain why the voter could not be marked.
async fn already_recorded(
    session: &mut ClientSession,
    voters: &Coll<Voter>,
    voter: &Voter,
) -> Result<VoteError> {
    let current = voters
        .find_one_with_session(voter.id.as_doc(), None, session)
        .await?;
    Ok(match current {
        Some(current) => match current.voted_at() {
            Some(voted_at) => VoteError::AlreadyVoted {
                name: current.name.clone(),
                voter_id: current.voter_id.clone(),
                voted_at,
            },
            None => VoteError::StaleReference,
        },
        None => VoteError::StaleReference,
    })
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{futures::TryStreamExt, local::asynchronous::Client};

    use crate::model::{
        ballot::Ballot,
        common::{VoterAttributes, VoterCategory},
        db::{
            candidate::NewCandidate,
            position::{NewPosition, Position},
            voter::NewVoter,
        },
    };

    use super::*;

    const SENIOR: &str = "Senior Prefect";
    const DINING: &str = "Dining Hall Prefect";

    async fn seed(
        positions: &Coll<NewPosition>,
        candidates: &Coll<NewCandidate>,
        voters: &Coll<NewVoter>,
    ) {
        positions
            .insert_many(
                [NewPosition::example(SENIOR, 1), NewPosition::example(DINING, 2)],
                None,
            )
            .await
            .unwrap();
        candidates
            .insert_many(
                [
                    NewCandidate::example("John Mensah", SENIOR, VoterCategory::All),
                    NewCandidate::example("Kofi Adu", DINING, VoterCategory::All),
                ],
                None,
            )
            .await
            .unwrap();
        voters.insert_one(NewVoter::example(), None).await.unwrap();
    }

    async fn final_ballot(
        positions: &Coll<Position>,
        candidates: &Coll<Candidate>,
    ) -> FinalBallot {
        let positions = positions
            .find(doc! {}, None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let all = candidates
            .find(doc! {}, None)
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        let john = all.iter().find(|c| c.name == "John Mensah").unwrap().id;

        let ballot = Ballot::compose(&VoterAttributes::example(), positions, all);
        let mut draft = ballot.draft();
        draft.select(SENIOR, john).unwrap();
        draft.abstain(DINING).unwrap();
        draft.submit().unwrap()
    }

    #[backend_test]
    async fn recording_is_all_or_nothing(
        client: Client,
        new_positions: Coll<NewPosition>,
        positions: Coll<Position>,
        new_candidates: Coll<NewCandidate>,
        candidates: Coll<Candidate>,
        new_voters: Coll<NewVoter>,
        voters: Coll<Voter>,
    ) {
        seed(&new_positions, &new_candidates, &new_voters).await;
        let db_client = client.rocket().state::<mongodb::Client>().unwrap();
        let ballot = final_ballot(&positions, &candidates).await;
        let voter = voters.find_one(doc! {}, None).await.unwrap().unwrap();

        // Deactivate the selected candidate after the ballot was composed.
        candidates
            .update_one(doc! {"name": "John Mensah"}, doc! {"$set": {"active": false}}, None)
            .await
            .unwrap();
        let result = record(db_client, &voters, &candidates, &voter, &ballot, Utc::now()).await;
        assert!(matches!(result, Err(Error::Vote(VoteError::StaleReference))));

        // Nothing changed.
        let voter = voters.find_one(doc! {}, None).await.unwrap().unwrap();
        assert!(!voter.has_voted());
    }

    #[backend_test]
    async fn concurrent_submissions_count_once(
        client: Client,
        new_positions: Coll<NewPosition>,
        positions: Coll<Position>,
        new_candidates: Coll<NewCandidate>,
        candidates: Coll<Candidate>,
        new_voters: Coll<NewVoter>,
        voters: Coll<Voter>,
    ) {
        seed(&new_positions, &new_candidates, &new_voters).await;
        let db_client = client.rocket().state::<mongodb::Client>().unwrap();
        let ballot = final_ballot(&positions, &candidates).await;
        let voter = voters.find_one(doc! {}, None).await.unwrap().unwrap();

        let now = Utc::now();
        let (first, second) = rocket::tokio::join!(
            record(db_client, &voters, &candidates, &voter, &ballot, now),
            record(db_client, &voters, &candidates, &voter, &ballot, now),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(Error::Vote(VoteError::AlreadyVoted { voter_id, .. })) if voter_id == "VOTER2025"
        )));

        let john = candidates
            .find_one(doc! {"name": "John Mensah"}, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(john.votes, 1);
        let kofi = candidates
            .find_one(doc! {"name": "Kofi Adu"}, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kofi.votes, 0);

        let voter = voters.find_one(doc! {}, None).await.unwrap().unwrap();
        assert!(voter.has_voted());
    }
}
