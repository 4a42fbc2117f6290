use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::VoterAttributes,
    db::voter::{NewVoter, Voter},
    mongodb::{serde_hex, Id},
};

/// Prefix of every generated voter ID.
pub const VOTER_ID_PREFIX: &str = "VOTER";

/// Generate a fresh random voter ID, e.g. `VOTER482913`.
pub fn generate_voter_id() -> String {
    let number: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("{VOTER_ID_PREFIX}{number}")
}

/// A voter's editable personal details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDetails {
    pub name: String,
    pub year: String,
    pub class: String,
    pub house: String,
}

impl VoterDetails {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Voter name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn attributes(&self) -> VoterAttributes {
        VoterAttributes {
            year: self.year.trim().to_string(),
            class: self.class.trim().to_string(),
            house: self.house.trim().to_string(),
        }
    }
}

/// A voter to be registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterSpec {
    #[serde(flatten)]
    pub details: VoterDetails,
    /// Use this voter ID rather than generating one.
    #[serde(default)]
    pub voter_id: Option<String>,
}

impl VoterSpec {
    /// Validate this spec and turn it into a voter with the given ID.
    pub fn into_voter(self, voter_id: String) -> Result<NewVoter> {
        self.details.validate()?;
        if voter_id.trim().is_empty() || voter_id.trim() != voter_id {
            return Err(Error::bad_request(
                "Voter ID must not be blank or padded with whitespace".to_string(),
            ));
        }
        Ok(NewVoter::new(
            voter_id,
            self.details.name.trim().to_string(),
            self.details.attributes(),
        ))
    }
}

/// An API-friendly voter description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub voter_id: String,
    pub name: String,
    pub year: String,
    pub class: String,
    pub house: String,
    pub has_voted: bool,
    pub voted_at: Option<DateTime<Utc>>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        let has_voted = voter.has_voted();
        let voted_at = voter.voted_at();
        let core = voter.voter;
        Self {
            id: voter.id,
            voter_id: core.voter_id,
            name: core.name,
            year: core.attributes.year,
            class: core.attributes.class,
            house: core.attributes.house,
            has_voted,
            voted_at,
        }
    }
}

/// Request body of the voter sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterLogin {
    pub voter_id: String,
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use super::*;

    #[test]
    fn generated_ids_have_the_expected_shape() {
        for _ in 0..100 {
            let id = generate_voter_id();
            assert_eq!(id.len(), VOTER_ID_PREFIX.len() + 6);
            assert!(id.starts_with(VOTER_ID_PREFIX));
            assert!(id[VOTER_ID_PREFIX.len()..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn spec_accepts_optional_voter_id() {
        let spec: VoterSpec = serde_json::from_value(json!({
            "name": "Kwame Asante",
            "year": "2025",
            "class": "Form 3A",
            "house": "Red House",
            "voterId": "VOTER2023",
        }))
        .unwrap();
        assert_eq!(spec.voter_id.as_deref(), Some("VOTER2023"));
        assert_eq!(spec.details, VoterDetails::example());
    }

    #[test]
    fn blank_names_and_ids_are_refused() {
        let mut spec = VoterSpec::example();
        assert!(spec.clone().into_voter(" VOTER1 ".to_string()).is_err());
        assert!(spec.clone().into_voter("".to_string()).is_err());

        spec.details.name = "  ".to_string();
        assert!(spec.into_voter("VOTER1".to_string()).is_err());
    }

    #[test]
    fn description_reports_voting_status() {
        let voter = Voter {
            id: Id::new(),
            voter: NewVoter::example(),
        };
        let description = VoterDescription::from(voter);
        assert!(!description.has_voted);
        assert_eq!(description.voted_at, None);
        assert_eq!(description.class, "Form 3A");
    }
}
