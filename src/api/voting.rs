use chrono::Utc;
use log::{info, warn};
use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, http::CookieJar, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    admission::evaluate,
    api::{
        auth::AUTH_TOKEN_COOKIE,
        ballot::{BallotDescription, BallotSubmission},
    },
    ballot::Ballot,
    db::{
        activity::{log_activity, NewActivity},
        candidate::Candidate,
        election::Election,
        position::Position,
        voter::Voter,
    },
    mongodb::Coll,
    recorder::{record, Receipt},
};

use super::common::open_election;

pub fn routes() -> Vec<Route> {
    routes![get_ballot, submit_ballot]
}

/// Compose the ballot for an admitted voter from the active positions and candidates.
async fn compose_for(
    voter: &Voter,
    positions: &Coll<Position>,
    candidates: &Coll<Candidate>,
) -> Result<Ballot> {
    let active = doc! {
        "active": true,
    };
    let positions: Vec<Position> = positions
        .find(active.clone(), None)
        .await?
        .try_collect()
        .await?;
    let candidates: Vec<Candidate> = candidates.find(active, None).await?.try_collect().await?;
    Ok(Ballot::compose(&voter.attributes, positions, candidates))
}

#[get("/ballot")]
async fn get_ballot(
    voter: Voter,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<BallotDescription>> {
    open_election(&elections, Utc::now()).await?;
    // The session may outlive the vote.
    let voter = evaluate(&voter.voter_id.clone(), Some(voter))?;

    let ballot = compose_for(&voter, &positions, &candidates).await?;
    Ok(Json(BallotDescription::from(&ballot)))
}

#[post("/ballot", data = "<submission>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn submit_ballot(
    voter: Voter,
    submission: Json<BallotSubmission>,
    cookies: &CookieJar<'_>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    voters: Coll<Voter>,
    activity: Coll<NewActivity>,
    db_client: &State<Client>,
) -> Result<Json<Receipt>> {
    open_election(&elections, Utc::now()).await?;
    let voter = evaluate(&voter.voter_id.clone(), Some(voter))?;

    // Check the submission against exactly what this voter may choose from.
    let ballot = compose_for(&voter, &positions, &candidates).await?;
    let mut draft = ballot.draft();
    submission.apply_to(&mut draft)?;
    let final_ballot = draft.submit()?;

    let receipt = record(
        db_client,
        &voters,
        &candidates,
        &voter,
        &final_ballot,
        Utc::now(),
    )
    .await?;
    info!("Recorded ballot of voter {}", voter.id);

    // The vote is committed; a missing log entry must not turn it into an error.
    if let Err(e) = log_activity(
        &activity,
        "vote-recorded",
        &voter.name,
        format!("Positions: {}", final_ballot.choices().len()),
    )
    .await
    {
        warn!("Failed to log recorded ballot of voter {}: {e}", voter.id);
    }

    // One vote per session.
    cookies.remove(AUTH_TOKEN_COOKIE);
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use mongodb::{options::CreateCollectionOptions, Database};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::{self, json, Value},
    };

    use crate::model::{
        common::VoterCategory,
        db::{
            candidate::NewCandidate,
            position::NewPosition,
            voter::{find_by_voter_id, NewVoter},
        },
        mongodb::{Id, MongoCollection},
    };

    use super::*;

    /// Two positions: one open to all, one restricted to a house the example voter is not in.
    async fn insert_positions_and_candidates(
        positions: &Coll<NewPosition>,
        candidates: &Coll<NewCandidate>,
    ) {
        positions
            .insert_many(
                [
                    NewPosition::example("Senior Prefect", 1),
                    NewPosition::example("Sports Prefect", 2),
                ],
                None,
            )
            .await
            .unwrap();
        candidates
            .insert_many(
                [
                    NewCandidate::example("John Mensah", "Senior Prefect", VoterCategory::All),
                    NewCandidate::example("Abena Osei", "Senior Prefect", VoterCategory::All),
                    NewCandidate::example(
                        "Kofi Boateng",
                        "Sports Prefect",
                        VoterCategory::House(vec!["Blue House".to_string()]),
                    ),
                ],
                None,
            )
            .await
            .unwrap();
    }

    async fn fetch_ballot(client: &Client) -> (Status, Value) {
        let response = client.get(uri!("/api", get_ballot)).dispatch().await;
        let status = response.status();
        let body = response.into_string().await.unwrap_or_default();
        (status, serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    async fn post_ballot(client: &Client, decisions: Value) -> (Status, Value) {
        let response = client
            .post(uri!("/api", submit_ballot))
            .header(ContentType::JSON)
            .body(json!({ "decisions": decisions }).to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_string().await.unwrap_or_default();
        (status, serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    fn candidate_id(ballot: &Value, position: usize, candidate: usize) -> String {
        ballot["positions"][position]["candidates"][candidate]["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[backend_test(voter)]
    async fn ballot_is_filtered_for_voter(
        client: Client,
        positions: Coll<NewPosition>,
        candidates: Coll<NewCandidate>,
    ) {
        insert_positions_and_candidates(&positions, &candidates).await;

        let (status, ballot) = fetch_ballot(&client).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(ballot["positions"][0]["position"], "Senior Prefect");
        assert_eq!(ballot["positions"][1]["position"], "Sports Prefect");

        // Ordered by name within equal display order, and no vote counts.
        let seniors = ballot["positions"][0]["candidates"].as_array().unwrap();
        assert_eq!(seniors.len(), 2);
        assert_eq!(seniors[0]["name"], "Abena Osei");
        assert!(seniors[0].get("votes").is_none());

        // The only sports candidate is for another house.
        assert_eq!(ballot["positions"][1]["candidates"], json!([]));
    }

    #[backend_test]
    async fn ballot_requires_voter(client: Client) {
        let (status, _) = fetch_ballot(&client).await;
        assert_eq!(Status::Unauthorized, status);
    }

    #[backend_test(voter)]
    async fn submission_is_recorded(
        client: Client,
        positions: Coll<NewPosition>,
        candidates: Coll<NewCandidate>,
        all_candidates: Coll<Candidate>,
        voters: Coll<Voter>,
    ) {
        insert_positions_and_candidates(&positions, &candidates).await;
        let (_, ballot) = fetch_ballot(&client).await;
        let chosen = candidate_id(&ballot, 0, 1);

        let (status, receipt) = post_ballot(
            &client,
            json!({
                "Senior Prefect": { "select": chosen },
                "Sports Prefect": "abstain",
            }),
        )
        .await;
        assert_eq!(Status::Ok, status);
        assert_eq!(receipt["name"], "John Doe");
        assert_eq!(receipt["voterId"], "VOTER2025");

        // Session ends with the vote.
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let chosen_id: Id = chosen.parse().unwrap();
        let candidate = all_candidates
            .find_one(chosen_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.votes, 1);
        let total: u64 = all_candidates
            .find(None, None)
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .iter()
            .map(|c| c.votes)
            .sum();
        assert_eq!(total, 1);

        let voter = find_by_voter_id(&voters, "VOTER2025")
            .await
            .unwrap()
            .unwrap();
        assert!(voter.has_voted());
    }

    #[backend_test(voter)]
    async fn incomplete_submission_is_refused(
        client: Client,
        positions: Coll<NewPosition>,
        candidates: Coll<NewCandidate>,
        voters: Coll<Voter>,
    ) {
        insert_positions_and_candidates(&positions, &candidates).await;
        let (_, ballot) = fetch_ballot(&client).await;

        let (status, body) = post_ballot(
            &client,
            json!({ "Senior Prefect": { "select": candidate_id(&ballot, 0, 0) } }),
        )
        .await;
        assert_eq!(Status::UnprocessableEntity, status);
        assert_eq!(body["error"], "incompletePositions");
        assert_eq!(body["positions"], json!(["Sports Prefect"]));

        // Nothing was recorded and the voter can try again.
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let voter = find_by_voter_id(&voters, "VOTER2025")
            .await
            .unwrap()
            .unwrap();
        assert!(!voter.has_voted());
    }

    #[backend_test(voter)]
    async fn ineligible_candidate_is_refused(
        client: Client,
        positions: Coll<NewPosition>,
        candidates: Coll<NewCandidate>,
        all_candidates: Coll<Candidate>,
    ) {
        insert_positions_and_candidates(&positions, &candidates).await;
        let (_, ballot) = fetch_ballot(&client).await;
        let restricted = all_candidates
            .find_one(doc! {"name": "Kofi Boateng"}, None)
            .await
            .unwrap()
            .unwrap();

        let (status, body) = post_ballot(
            &client,
            json!({
                "Senior Prefect": { "select": candidate_id(&ballot, 0, 0) },
                "Sports Prefect": { "select": restricted.id.to_hex() },
            }),
        )
        .await;
        assert_eq!(Status::UnprocessableEntity, status);
        assert_eq!(body["error"], "ineligibleCandidate");
        assert_eq!(body["position"], "Sports Prefect");
    }

    #[backend_test(voter)]
    async fn vote_stands_when_activity_log_fails(
        client: Client,
        db: Database,
        positions: Coll<NewPosition>,
        candidates: Coll<NewCandidate>,
        voters: Coll<Voter>,
    ) {
        insert_positions_and_candidates(&positions, &candidates).await;
        // Every insert into the activity log now fails validation.
        let reject_all = CreateCollectionOptions::builder()
            .validator(doc! {"$jsonSchema": {"required": ["never-present"]}})
            .build();
        db.create_collection(NewActivity::NAME, reject_all)
            .await
            .unwrap();

        let (status, receipt) = post_ballot(
            &client,
            json!({
                "Senior Prefect": "abstain",
                "Sports Prefect": "abstain",
            }),
        )
        .await;
        assert_eq!(Status::Ok, status);
        assert_eq!(receipt["voterId"], "VOTER2025");
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let voter = find_by_voter_id(&voters, "VOTER2025")
            .await
            .unwrap()
            .unwrap();
        assert!(voter.has_voted());
    }

    #[backend_test(voter)]
    async fn second_submission_is_refused(
        client: Client,
        positions: Coll<NewPosition>,
        candidates: Coll<NewCandidate>,
        voters: Coll<NewVoter>,
    ) {
        insert_positions_and_candidates(&positions, &candidates).await;
        let decisions = json!({
            "Senior Prefect": "abstain",
            "Sports Prefect": "abstain",
        });
        let (status, _) = post_ballot(&client, decisions.clone()).await;
        assert_eq!(Status::Ok, status);

        // Without a session the ballot is out of reach.
        let (status, _) = post_ballot(&client, decisions).await;
        assert_eq!(Status::Unauthorized, status);

        // Signing in again reports the earlier vote.
        let response = client
            .post(uri!("/api", crate::api::auth::authenticate_voter))
            .header(ContentType::JSON)
            .body(json!({ "voterId": NewVoter::example().voter_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(voters.count_documents(None, None).await.unwrap(), 1);
    }
}
