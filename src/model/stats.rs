//! Turnout statistics for the admin dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::db::voter::Voter;

/// A voter who has recently voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentVoter {
    pub name: String,
    pub voter_id: String,
    pub voted_at: DateTime<Utc>,
}

/// Turnout within one year group, class or house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTurnout {
    pub label: String,
    pub voted: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Turnout {
    pub year: Vec<GroupTurnout>,
    pub class: Vec<GroupTurnout>,
    pub house: Vec<GroupTurnout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStats {
    pub total_voters: u64,
    pub voted_count: u64,
    pub remaining_voters: u64,
    /// Whole percent of voters who have voted.
    pub completion_percentage: u32,
    /// Newest first.
    pub recent_voters: Vec<RecentVoter>,
    pub turnout: Turnout,
}

impl ElectionStats {
    /// Summarise the register of voters, listing at most `recent_limit` recent voters.
    pub fn from_voters(voters: &[Voter], recent_limit: usize) -> Self {
        let total_voters = voters.len() as u64;
        let voted_count = voters.iter().filter(|v| v.has_voted()).count() as u64;
        let completion_percentage = if total_voters == 0 {
            0
        } else {
            (voted_count as f64 * 100.0 / total_voters as f64).round() as u32
        };

        let mut recent_voters = voters
            .iter()
            .filter_map(|v| {
                v.voted_at().map(|voted_at| RecentVoter {
                    name: v.name.clone(),
                    voter_id: v.voter_id.clone(),
                    voted_at,
                })
            })
            .collect::<Vec<_>>();
        recent_voters.sort_by(|a, b| b.voted_at.cmp(&a.voted_at));
        recent_voters.truncate(recent_limit);

        Self {
            total_voters,
            voted_count,
            remaining_voters: total_voters - voted_count,
            completion_percentage,
            recent_voters,
            turnout: Turnout {
                year: group_turnout(voters, |v| &v.attributes.year),
                class: group_turnout(voters, |v| &v.attributes.class),
                house: group_turnout(voters, |v| &v.attributes.house),
            },
        }
    }
}

/// Turnout grouped by some attribute, sorted by label.
fn group_turnout<F>(voters: &[Voter], attribute: F) -> Vec<GroupTurnout>
where
    F: Fn(&Voter) -> &String,
{
    let mut groups: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for voter in voters {
        let (voted, total) = groups.entry(attribute(voter).as_str()).or_default();
        *total += 1;
        if voter.has_voted() {
            *voted += 1;
        }
    }
    groups
        .into_iter()
        .map(|(label, (voted, total))| GroupTurnout {
            label: label.to_string(),
            voted,
            total,
        })
        .collect()
}
