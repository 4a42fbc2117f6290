use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use rocket::{
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::auth::resolve_user,
    common::VoterAttributes,
    mongodb::{Coll, Id},
};

/// Name of the field recording when a voter voted.
pub const VOTED_AT: &str = "voted_at";

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// The voter's ballot credential. Unique.
    pub voter_id: String,
    pub name: String,
    #[serde(flatten)]
    pub attributes: VoterAttributes,
    /// When the voter's ballot was recorded. Voting status is derived from
    /// this alone, so "has voted" and "has a vote time" cannot disagree.
    #[serde(default)]
    pub voted_at: Option<BsonDateTime>,
}

impl VoterCore {
    /// Create a voter who has not voted yet.
    pub fn new(voter_id: String, name: String, attributes: VoterAttributes) -> Self {
        Self {
            voter_id,
            name,
            attributes,
            voted_at: None,
        }
    }

    pub fn has_voted(&self) -> bool {
        self.voted_at.is_some()
    }

    pub fn voted_at(&self) -> Option<DateTime<Utc>> {
        self.voted_at.map(BsonDateTime::to_chrono)
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Voter {
    type Error = Error;

    /// The admitted voter, resolved from their session token.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        resolve_user(req).await
    }
}

/// Filter matching the voter with the given ballot credential.
pub fn voter_id_filter(voter_id: &str) -> Document {
    doc! {
        "voter_id": voter_id,
    }
}

/// Filter matching voters who have (or have not) voted.
pub fn voted_filter(voted: bool) -> Document {
    if voted {
        doc! { VOTED_AT: { "$ne": null } }
    } else {
        doc! { VOTED_AT: null }
    }
}

/// Look up a voter by their ballot credential.
pub async fn find_by_voter_id(voters: &Coll<Voter>, voter_id: &str) -> Result<Option<Voter>> {
    Ok(voters.find_one(voter_id_filter(voter_id), None).await?)
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mongodb::bson;

    use super::*;

    #[test]
    fn voting_status_follows_vote_time() {
        let mut voter = NewVoter::example();
        assert!(!voter.has_voted());
        assert_eq!(voter.voted_at(), None);

        let now = Utc.with_ymd_and_hms(2025, 5, 15, 9, 30, 0).unwrap();
        voter.voted_at = Some(BsonDateTime::from_chrono(now));
        assert!(voter.has_voted());
        assert_eq!(voter.voted_at(), Some(now));
    }

    #[test]
    fn document_layout() {
        let voter = Voter {
            id: Id::new(),
            voter: NewVoter::example(),
        };
        let document = bson::to_document(&voter).unwrap();
        assert_eq!(document.get_str("voter_id").unwrap(), "VOTER2025");
        assert_eq!(document.get_str("class").unwrap(), "Form 3A");
        assert!(document.get_object_id("_id").is_ok());

        let parsed: Voter = bson::from_document(document).unwrap();
        assert_eq!(parsed, voter);
    }

    #[backend_test]
    async fn lookup_by_voter_id(voters: Coll<Voter>, new_voters: Coll<NewVoter>) {
        new_voters
            .insert_many([NewVoter::example(), NewVoter::example2()], None)
            .await
            .unwrap();

        let found = find_by_voter_id(&voters, "VOTER2026").await.unwrap().unwrap();
        assert_eq!(found.name, "Ama Owusu");

        assert!(find_by_voter_id(&voters, "VOTER9999")
            .await
            .unwrap()
            .is_none());
        // Exact match only.
        assert!(find_by_voter_id(&voters, "voter2025")
            .await
            .unwrap()
            .is_none());
    }
}
