//! Ballot composition and the voter's in-progress decisions.

use crate::error::VoteError;
use crate::model::{
    common::VoterAttributes,
    db::{
        candidate::{self, Candidate},
        position::{self, Position},
    },
    mongodb::Id,
};

/// One position on a voter's ballot, with the candidates they may choose from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotPosition {
    pub position: Position,
    /// May be empty, in which case the voter can only abstain.
    pub candidates: Vec<Candidate>,
}

impl BallotPosition {
    pub fn name(&self) -> &str {
        &self.position.name
    }

    fn offers(&self, candidate_id: Id) -> bool {
        self.candidates.iter().any(|c| c.id == candidate_id)
    }
}

/// The positions and candidates a particular voter is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    positions: Vec<BallotPosition>,
}

impl Ballot {
    /// Compose the ballot for a voter with the given attributes.
    ///
    /// Every active position appears, in display order. Each carries the active
    /// candidates for that position whose category admits the voter. Candidates
    /// of unknown or inactive positions are dropped.
    pub fn compose(
        voter: &VoterAttributes,
        mut positions: Vec<Position>,
        mut candidates: Vec<Candidate>,
    ) -> Self {
        position::ballot_order(&mut positions);
        candidate::display_order(&mut candidates);

        let mut ballot = positions
            .into_iter()
            .filter(|p| p.active)
            .map(|position| BallotPosition {
                position,
                candidates: Vec::new(),
            })
            .collect::<Vec<_>>();

        for candidate in candidates {
            if !candidate.is_eligible_for(voter) {
                continue;
            }
            if let Some(slot) = ballot
                .iter_mut()
                .find(|slot| slot.position.name == candidate.position)
            {
                slot.candidates.push(candidate);
            }
        }

        Self { positions: ballot }
    }

    pub fn positions(&self) -> &[BallotPosition] {
        &self.positions
    }

    /// Start deciding this ballot, with every position undecided.
    pub fn draft(&self) -> BallotDraft<'_> {
        BallotDraft {
            ballot: self,
            decisions: vec![Decision::Undecided; self.positions.len()],
        }
    }
}

/// A voter's decision on one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Undecided,
    Selected(Id),
    Abstained,
}

/// Decisions being made against a [`Ballot`], before submission.
#[derive(Debug, Clone)]
pub struct BallotDraft<'b> {
    ballot: &'b Ballot,
    // Parallel to `ballot.positions`.
    decisions: Vec<Decision>,
}

impl<'b> BallotDraft<'b> {
    fn index_of(&self, position: &str) -> Result<usize, VoteError> {
        self.ballot
            .positions
            .iter()
            .position(|p| p.name() == position)
            .ok_or_else(|| VoteError::UnknownPosition {
                position: position.to_string(),
            })
    }

    /// Choose a candidate for a position, replacing any earlier decision.
    pub fn select(&mut self, position: &str, candidate_id: Id) -> Result<(), VoteError> {
        let index = self.index_of(position)?;
        if !self.ballot.positions[index].offers(candidate_id) {
            return Err(VoteError::IneligibleCandidate {
                position: position.to_string(),
                candidate_id: candidate_id.to_hex(),
            });
        }
        self.decisions[index] = Decision::Selected(candidate_id);
        Ok(())
    }

    /// Abstain from a position, replacing any earlier decision.
    pub fn abstain(&mut self, position: &str) -> Result<(), VoteError> {
        let index = self.index_of(position)?;
        self.decisions[index] = Decision::Abstained;
        Ok(())
    }

    /// Undo the decision for a position.
    pub fn clear(&mut self, position: &str) -> Result<(), VoteError> {
        let index = self.index_of(position)?;
        self.decisions[index] = Decision::Undecided;
        Ok(())
    }

    pub fn decision(&self, position: &str) -> Result<Decision, VoteError> {
        Ok(self.decisions[self.index_of(position)?])
    }

    /// Names of positions still undecided, in ballot order.
    pub fn undecided(&self) -> Vec<String> {
        self.ballot
            .positions
            .iter()
            .zip(&self.decisions)
            .filter(|(_, decision)| **decision == Decision::Undecided)
            .map(|(position, _)| position.name().to_string())
            .collect()
    }

    /// Finish the ballot. Every position must have been decided.
    pub fn submit(self) -> Result<FinalBallot, VoteError> {
        let undecided = self.undecided();
        if !undecided.is_empty() {
            return Err(VoteError::IncompletePositions {
                positions: undecided,
            });
        }

        let choices = self
            .ballot
            .positions
            .iter()
            .zip(self.decisions)
            .map(|(position, decision)| {
                let choice = match decision {
                    Decision::Selected(id) => FinalChoice::Selected(id),
                    _ => FinalChoice::Abstained,
                };
                (position.name().to_string(), choice)
            })
            .collect();
        Ok(FinalBallot { choices })
    }
}

/// A decided position on a submitted ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalChoice {
    Selected(Id),
    Abstained,
}

/// A complete ballot, ready to be recorded. It cannot be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalBallot {
    choices: Vec<(String, FinalChoice)>,
}

impl FinalBallot {
    /// Each position with its decision, in ballot order.
    pub fn choices(&self) -> &[(String, FinalChoice)] {
        &self.choices
    }

    /// The selected candidates, with the position each was chosen for.
    pub fn selections(&self) -> impl Iterator<Item = (&str, Id)> + '_ {
        self.choices.iter().filter_map(|(position, choice)| match choice {
            FinalChoice::Selected(id) => Some((position.as_str(), *id)),
            FinalChoice::Abstained => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::model::common::VoterCategory;

    use super::*;

    const SENIOR: &str = "Senior Prefect";
    const DINING: &str = "Dining Hall Prefect";
    const SPORTS: &str = "Sports Prefect";

    fn form_3a_only() -> VoterCategory {
        VoterCategory::Class(vec!["Form 3A".to_string()])
    }

    /// Three positions; the Sports Prefect candidates are only for Form 3B.
    fn fixture() -> (Vec<Position>, Vec<Candidate>) {
        let positions = vec![
            Position::example(SPORTS, 3),
            Position::example(SENIOR, 1),
            Position::example(DINING, 2),
        ];
        let candidates = vec![
            Candidate::example("John Mensah", SENIOR, VoterCategory::All),
            Candidate::example("Abena Osei", SENIOR, form_3a_only()),
            Candidate::example("Kofi Adu", DINING, VoterCategory::All),
            Candidate::example(
                "Yaw Boateng",
                SPORTS,
                VoterCategory::Class(vec!["Form 3B".to_string()]),
            ),
        ];
        (positions, candidates)
    }

    fn candidate_id(ballot: &Ballot, name: &str) -> Id {
        ballot
            .positions()
            .iter()
            .flat_map(|p| &p.candidates)
            .find(|c| c.name == name)
            .map(|c| c.id)
            .unwrap()
    }

    #[test]
    fn positions_appear_in_display_order_even_without_candidates() {
        let (positions, candidates) = fixture();
        let ballot = Ballot::compose(&VoterAttributes::example(), positions, candidates);

        let names = ballot
            .positions()
            .iter()
            .map(BallotPosition::name)
            .collect::<Vec<_>>();
        assert_eq!(names, [SENIOR, DINING, SPORTS]);
        assert_eq!(ballot.positions()[0].candidates.len(), 2);
        assert!(ballot.positions()[2].candidates.is_empty());
    }

    #[test]
    fn category_filters_candidates() {
        let (positions, candidates) = fixture();
        let ballot = Ballot::compose(&VoterAttributes::example2(), positions, candidates);

        let senior = &ballot.positions()[0];
        assert_eq!(senior.candidates.len(), 1);
        assert_eq!(senior.candidates[0].name, "John Mensah");
        assert_eq!(ballot.positions()[2].candidates.len(), 1);
    }

    #[test]
    fn inactive_and_orphaned_entries_never_appear() {
        let (mut positions, mut candidates) = fixture();
        positions[2].active = false; // Dining Hall Prefect
        candidates[0].active = false; // John Mensah
        candidates.push(Candidate::example("Esi Nyarko", "Library Prefect", VoterCategory::All));

        let ballot = Ballot::compose(&VoterAttributes::example(), positions, candidates);
        let names = ballot
            .positions()
            .iter()
            .map(BallotPosition::name)
            .collect::<Vec<_>>();
        assert_eq!(names, [SENIOR, SPORTS]);
        assert_eq!(ballot.positions()[0].candidates.len(), 1);
        assert_eq!(ballot.positions()[0].candidates[0].name, "Abena Osei");
    }

    #[test]
    fn incomplete_ballot_lists_exactly_the_undecided_positions() {
        let (positions, candidates) = fixture();
        let ballot = Ballot::compose(&VoterAttributes::example(), positions, candidates);
        let mut draft = ballot.draft();

        draft
            .select(SENIOR, candidate_id(&ballot, "Abena Osei"))
            .unwrap();
        assert_eq!(draft.undecided(), [DINING, SPORTS]);

        assert_eq!(
            draft.clone().submit(),
            Err(VoteError::IncompletePositions {
                positions: vec![DINING.to_string(), SPORTS.to_string()],
            })
        );

        draft.abstain(DINING).unwrap();
        draft.abstain(SPORTS).unwrap();
        let final_ballot = draft.submit().unwrap();
        assert_eq!(
            final_ballot.selections().collect::<Vec<_>>(),
            [(SENIOR, candidate_id(&ballot, "Abena Osei"))]
        );
        assert_eq!(final_ballot.choices()[1].1, FinalChoice::Abstained);
    }

    #[test]
    fn selection_and_abstention_replace_each_other() {
        let (positions, candidates) = fixture();
        let ballot = Ballot::compose(&VoterAttributes::example(), positions, candidates);
        let john = candidate_id(&ballot, "John Mensah");
        let mut draft = ballot.draft();

        draft.select(SENIOR, john).unwrap();
        draft.abstain(SENIOR).unwrap();
        assert_eq!(draft.decision(SENIOR), Ok(Decision::Abstained));

        draft.select(SENIOR, john).unwrap();
        assert_eq!(draft.decision(SENIOR), Ok(Decision::Selected(john)));

        draft.clear(SENIOR).unwrap();
        assert_eq!(draft.decision(SENIOR), Ok(Decision::Undecided));
    }

    #[test]
    fn candidates_must_be_on_the_ballot_for_that_position() {
        let (positions, candidates) = fixture();
        let ballot = Ballot::compose(&VoterAttributes::example(), positions, candidates);
        let john = candidate_id(&ballot, "John Mensah");
        let mut draft = ballot.draft();

        assert!(matches!(
            draft.select(DINING, john),
            Err(VoteError::IneligibleCandidate { .. })
        ));
        assert!(matches!(
            draft.select(SENIOR, Id::new()),
            Err(VoteError::IneligibleCandidate { .. })
        ));
        assert_eq!(
            draft.abstain("Library Prefect"),
            Err(VoteError::UnknownPosition {
                position: "Library Prefect".to_string()
            })
        );
    }

    #[test]
    fn empty_ballot_submits_immediately() {
        let ballot = Ballot::compose(&VoterAttributes::example(), vec![], vec![]);
        let final_ballot = ballot.draft().submit().unwrap();
        assert!(final_ballot.choices().is_empty());
    }
}
