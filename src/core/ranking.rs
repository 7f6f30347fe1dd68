use crate::core::catalog::{Candidate, Catalog};
use crate::core::tally::TallyState;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub candidate: Candidate,
    pub votes: u32,
}

/// Candidates with at least one vote, most votes first, ties by ascending
/// number.
pub fn rank(counts: &BTreeMap<u32, u32>, catalog: &Catalog) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = catalog
        .candidates()
        .iter()
        .filter_map(|candidate| {
            let votes = counts.get(&candidate.number).copied().unwrap_or(0);
            (votes > 0).then(|| RankedEntry {
                candidate: candidate.clone(),
                votes,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.candidate.number.cmp(&b.candidate.number))
    });
    ranked
}

/// Everything a run produces, ready for rendering or JSON export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyReport {
    pub total_votes: u32,
    pub counts: BTreeMap<u32, u32>,
    pub ranked: Vec<RankedEntry>,
    pub rejections: Vec<String>,
    pub warnings: Vec<String>,
}

impl TallyReport {
    pub fn new(state: &TallyState, catalog: &Catalog, warnings: Vec<String>) -> Self {
        Self {
            total_votes: state.total_votes(),
            counts: state.counts.clone(),
            ranked: rank(&state.counts, catalog),
            rejections: state.rejection_log(),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::core::catalog::NumberingPolicy;

    fn catalog(numbers: &[u32]) -> Catalog {
        let names: Vec<String> = numbers
            .iter()
            .map(|n| format!("logo_{}_user{}.png", n, n))
            .collect();
        Catalog::build_with_policy(
            &mut RunContext::default(),
            &names,
            NumberingPolicy::PreserveNumber,
        )
    }

    #[test]
    fn test_orders_by_votes_then_number() {
        let catalog = catalog(&[1, 2, 3, 4, 5]);
        let counts = BTreeMap::from([(1, 2), (2, 5), (3, 2), (4, 0), (5, 7)]);

        let ranked = rank(&counts, &catalog);
        let order: Vec<(u32, u32)> = ranked
            .iter()
            .map(|e| (e.candidate.number, e.votes))
            .collect();

        assert_eq!(order, vec![(5, 7), (2, 5), (1, 2), (3, 2)]);
    }

    #[test]
    fn test_ranking_is_a_total_order() {
        let catalog = catalog(&[10, 3, 7, 1, 8, 4]);
        let counts = BTreeMap::from([(10, 1), (3, 4), (7, 1), (1, 4), (8, 2), (4, 0)]);

        let ranked = rank(&counts, &catalog);
        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.votes >= b.votes);
            if a.votes == b.votes {
                assert!(a.candidate.number < b.candidate.number);
            }
        }
        assert_eq!(ranked.len(), 5);
    }

    #[test]
    fn test_zero_votes_stay_in_report_counts() {
        let catalog = catalog(&[1, 2]);
        let mut state = TallyState::new(&catalog);
        state.counts.insert(2, 1);

        let report = TallyReport::new(&state, &catalog, vec![]);
        assert_eq!(report.total_votes, 1);
        assert_eq!(report.ranked.len(), 1);
        assert_eq!(report.counts.get(&1), Some(&0));
    }
}
