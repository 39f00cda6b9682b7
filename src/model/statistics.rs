//! Aggregate results computed from candidate tallies.

use serde::{Deserialize, Serialize};

use crate::model::{common::CandidateId, db::TalliedCandidate};

/// Results for a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStatistics {
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    pub party: Option<String>,
    pub votes: u32,
    /// Share of all votes, rounded to two decimal places.
    pub percentage: f64,
}

/// Results for the whole election at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub statistics: Vec<CandidateStatistics>,
    pub total_votes: u64,
    pub voted_voters: u64,
}

impl Statistics {
    /// Compute statistics from the given tallies, keeping their order.
    pub fn compute(candidates: &[TalliedCandidate], voted_voters: u64) -> Self {
        let total_votes = candidates.iter().map(|c| u64::from(c.votes)).sum();
        let statistics = candidates
            .iter()
            .map(|c| CandidateStatistics {
                candidate_id: c.id,
                candidate_name: c.name.as_str().to_string(),
                party: c.party.clone(),
                votes: c.votes,
                percentage: percentage(c.votes.into(), total_votes),
            })
            .collect();
        Self {
            statistics,
            total_votes,
            voted_voters,
        }
    }
}

/// `votes` as a percentage of `total`, rounded to two decimal places.
/// Zero when there are no votes at all.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = votes as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{
        common::Identity,
        db::{Candidate, NewCandidate},
    };

    fn tallied(id: CandidateId, name: &str, votes: u32) -> TalliedCandidate {
        TalliedCandidate {
            candidate: Candidate::new(id, NewCandidate::new(Identity::parse(name).unwrap(), None)),
            votes,
        }
    }

    #[test]
    fn percentages_of_total() {
        let candidates = [tallied(1, "A", 3), tallied(2, "B", 1), tallied(3, "C", 0)];
        let stats = Statistics::compute(&candidates, 4);
        assert_eq!(stats.total_votes, 4);
        assert_eq!(stats.voted_voters, 4);
        let percentages: Vec<f64> = stats.statistics.iter().map(|s| s.percentage).collect();
        assert_eq!(percentages, vec![75.0, 25.0, 0.0]);
        assert_eq!(stats.statistics[0].candidate_name, "A");
    }

    #[test]
    fn no_votes_means_zero_percent() {
        let candidates = [tallied(1, "A", 0), tallied(2, "B", 0)];
        let stats = Statistics::compute(&candidates, 0);
        assert_eq!(stats.total_votes, 0);
        assert!(stats.statistics.iter().all(|s| s.percentage == 0.0));
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(1, 8), 12.5);
    }

    #[test]
    fn empty_election() {
        let stats = Statistics::compute(&[], 0);
        assert!(stats.statistics.is_empty());
        assert_eq!(stats.total_votes, 0);
    }
}
