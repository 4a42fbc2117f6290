//! Vote tallies per position.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{
    db::{
        candidate::{self, Candidate},
        position::{self, Position},
    },
    mongodb::{serde_hex, Id},
};

/// One candidate's share of the votes for their position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    #[serde(with = "serde_hex")]
    pub candidate_id: Id,
    pub name: String,
    pub image_url: String,
    pub votes: u64,
    /// Share of the position's votes, rounded to one decimal place.
    pub percentage: f64,
}

/// The results for a single position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResults {
    pub position: String,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

/// `votes` as a percentage of `total`, to one decimal place.
fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 1000.0 / total as f64).round() / 10.0
}

/// Rank the candidates of one position by votes, most first.
///
/// Candidates with equal votes keep their input order.
pub fn aggregate(candidates: &[Candidate]) -> Vec<CandidateResult> {
    let total = candidates.iter().map(|c| c.votes).sum();
    let mut results = candidates
        .iter()
        .map(|c| CandidateResult {
            candidate_id: c.id,
            name: c.name.clone(),
            image_url: c.image_url.clone(),
            votes: c.votes,
            percentage: percentage(c.votes, total),
        })
        .collect::<Vec<_>>();
    // Stable, so ties stay in input order.
    results.sort_by(|a, b| b.votes.cmp(&a.votes));
    results
}

/// Results for every position, in display order.
///
/// Candidates whose position no longer exists are reported after the known
/// positions, grouped by the position name they still carry.
pub fn tally(mut positions: Vec<Position>, mut candidates: Vec<Candidate>) -> Vec<PositionResults> {
    position::ballot_order(&mut positions);
    candidate::display_order(&mut candidates);

    let mut by_position: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        by_position
            .entry(candidate.position.clone())
            .or_default()
            .push(candidate);
    }

    let mut results = Vec::with_capacity(positions.len());
    for position in positions {
        let candidates = by_position.remove(&position.name).unwrap_or_default();
        results.push(position_results(position.position.name, &candidates));
    }
    // Whatever is left belongs to positions that have been deleted.
    for (position, candidates) in by_position {
        results.push(position_results(position, &candidates));
    }
    results
}

fn position_results(position: String, candidates: &[Candidate]) -> PositionResults {
    let candidates = aggregate(candidates);
    PositionResults {
        position,
        total_votes: candidates.iter().map(|c| c.votes).sum(),
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use crate::model::common::VoterCategory;

    use super::*;

    const SENIOR: &str = "Senior Prefect";

    fn candidate(name: &str, votes: u64) -> Candidate {
        Candidate::example(name, SENIOR, VoterCategory::All).with_votes(votes)
    }

    #[test]
    fn percentages_are_rounded_to_one_decimal() {
        let results = aggregate(&[
            candidate("Kofi Adu", 28),
            candidate("John Mensah", 45),
            candidate("Esi Nyarko", 15),
            candidate("Abena Osei", 32),
        ]);

        let summary = results
            .iter()
            .map(|r| (r.name.as_str(), r.votes, r.percentage))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            [
                ("John Mensah", 45, 37.5),
                ("Abena Osei", 32, 26.7),
                ("Kofi Adu", 28, 23.3),
                ("Esi Nyarko", 15, 12.5),
            ]
        );

        let sum: f64 = results.iter().map(|r| r.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.1);
    }

    #[test]
    fn no_votes_means_zero_percent() {
        let results = aggregate(&[candidate("John Mensah", 0), candidate("Abena Osei", 0)]);
        assert!(results.iter().all(|r| r.percentage == 0.0));
    }

    #[test]
    fn ties_keep_input_order() {
        let results = aggregate(&[
            candidate("Kofi Adu", 10),
            candidate("Abena Osei", 20),
            candidate("John Mensah", 10),
        ]);
        let names = results.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Abena Osei", "Kofi Adu", "John Mensah"]);
    }

    #[test]
    fn tally_groups_by_position_in_display_order() {
        let positions = vec![
            Position::example("Sports Prefect", 2),
            Position::example(SENIOR, 1),
        ];
        let candidates = vec![
            candidate("John Mensah", 3),
            Candidate::example("Yaw Boateng", "Sports Prefect", VoterCategory::All).with_votes(1),
            Candidate::example("Esi Nyarko", "Library Prefect", VoterCategory::All).with_votes(2),
            candidate("Abena Osei", 1),
        ];

        let results = tally(positions, candidates);
        let layout = results
            .iter()
            .map(|p| (p.position.as_str(), p.total_votes, p.candidates.len()))
            .collect::<Vec<_>>();
        assert_eq!(
            layout,
            [
                (SENIOR, 4, 2),
                ("Sports Prefect", 1, 1),
                ("Library Prefect", 2, 1),
            ]
        );
        assert_eq!(results[0].candidates[0].percentage, 75.0);
    }

    #[test]
    fn positions_without_candidates_are_reported_empty() {
        let results = tally(vec![Position::example(SENIOR, 1)], vec![]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].total_votes, 0);
        assert!(results[0].candidates.is_empty());
    }
}
