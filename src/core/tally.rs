use crate::context::RunContext;
use crate::core::ballot::{self, BallotError};
use crate::core::catalog::Catalog;
use crate::core::sybil::{AccountLookup, SybilCheck};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A comment on the poll issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Accepted votes of one voter, in acceptance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub voter: String,
    pub candidates: Vec<u32>,
}

/// Why a vote comment was not counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    InvalidFormat { voter: String, excerpt: String },
    UnknownCandidate { voter: String, number: String },
    AccountTooNew { voter: String, candidate: u32 },
    DuplicateVote { voter: String, candidate: u32 },
    CapExceeded { voter: String, candidate: u32, max: usize },
}

impl Rejection {
    pub fn voter(&self) -> &str {
        match self {
            Rejection::InvalidFormat { voter, .. }
            | Rejection::UnknownCandidate { voter, .. }
            | Rejection::AccountTooNew { voter, .. }
            | Rejection::DuplicateVote { voter, .. }
            | Rejection::CapExceeded { voter, .. } => voter,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidFormat { voter, excerpt } => {
                write!(f, "Invalid vote format by {}: {}", voter, excerpt)
            }
            Rejection::UnknownCandidate { voter, number } => {
                write!(f, "Invalid logo number {} by {}", number, voter)
            }
            Rejection::AccountTooNew { voter, candidate } => write!(
                f,
                "User {} (voted Logo {}) created after poll start",
                voter, candidate
            ),
            Rejection::DuplicateVote { voter, candidate } => write!(
                f,
                "Duplicate vote for Logo {} by {} ignored",
                candidate, voter
            ),
            Rejection::CapExceeded {
                voter,
                candidate,
                max,
            } => write!(
                f,
                "User {} exceeded {} votes, ignoring vote for Logo {}",
                voter, max, candidate
            ),
        }
    }
}

/// Accumulator for one tally run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TallyState {
    /// Every catalog candidate, including those with no votes.
    pub counts: BTreeMap<u32, u32>,
    pub per_voter: BTreeMap<String, VoteRecord>,
    pub rejections: Vec<Rejection>,
}

impl TallyState {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            counts: catalog.candidates().iter().map(|c| (c.number, 0)).collect(),
            per_voter: BTreeMap::new(),
            rejections: Vec::new(),
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn votes_for(&self, number: u32) -> u32 {
        self.counts.get(&number).copied().unwrap_or(0)
    }

    pub fn rejection_log(&self) -> Vec<String> {
        self.rejections.iter().map(|r| r.to_string()).collect()
    }
}

/// Validates vote comments in fetch order and counts the accepted ones.
pub struct VoteTally<'c> {
    catalog: &'c Catalog,
    max_votes_per_user: usize,
    excerpt_len: usize,
    prefetch_accounts: bool,
}

impl<'c> VoteTally<'c> {
    pub fn new(catalog: &'c Catalog, max_votes_per_user: usize, excerpt_len: usize) -> Self {
        Self {
            catalog,
            max_votes_per_user,
            excerpt_len,
            prefetch_accounts: false,
        }
    }

    pub fn from_context(ctx: &RunContext, catalog: &'c Catalog) -> Self {
        let poll = &ctx.config().poll;
        Self {
            prefetch_accounts: poll.prefetch_accounts,
            ..Self::new(
                catalog,
                poll.max_votes_per_user,
                poll.max_rejection_log_entry_length,
            )
        }
    }

    pub fn run<L: AccountLookup + Sync + ?Sized>(
        &self,
        ctx: &mut RunContext,
        comments: &[Comment],
        sybil: &mut SybilCheck<'_, L>,
    ) -> TallyState {
        if self.prefetch_accounts {
            let voters = self.voters_needing_lookup(comments);
            sybil.prefetch(ctx, &voters);
        }

        let mut state = TallyState::new(self.catalog);
        for comment in comments {
            self.apply(ctx, &mut state, comment, sybil);
        }

        log::info!(
            "Counted {} vote(s) from {} voter(s), {} rejected",
            state.total_votes(),
            state.per_voter.len(),
            state.rejections.len()
        );
        state
    }

    /// Authors whose comments get as far as the account check, first-seen order.
    fn voters_needing_lookup(&self, comments: &[Comment]) -> Vec<String> {
        let mut seen = HashSet::new();
        comments
            .iter()
            .filter(|c| {
                ballot::parse_ballot(&c.body).is_ok_and(|n| self.catalog.contains(n))
            })
            .filter(|c| seen.insert(c.author.as_str()))
            .map(|c| c.author.clone())
            .collect()
    }

    fn apply<L: AccountLookup + ?Sized>(
        &self,
        ctx: &mut RunContext,
        state: &mut TallyState,
        comment: &Comment,
        sybil: &mut SybilCheck<'_, L>,
    ) {
        let voter = comment.author.as_str();
        let body = comment.body.trim();

        let number = match ballot::parse_ballot(body) {
            Ok(number) => number,
            Err(BallotError::InvalidFormat) => {
                return reject(
                    state,
                    Rejection::InvalidFormat {
                        voter: voter.to_string(),
                        excerpt: ballot::excerpt(body, self.excerpt_len),
                    },
                );
            }
            Err(BallotError::NumberOutOfRange(digits)) => {
                return reject(
                    state,
                    Rejection::UnknownCandidate {
                        voter: voter.to_string(),
                        number: digits,
                    },
                );
            }
        };

        if !self.catalog.contains(number) {
            return reject(
                state,
                Rejection::UnknownCandidate {
                    voter: voter.to_string(),
                    number: number.to_string(),
                },
            );
        }

        if sybil.is_flagged(ctx, voter) {
            return reject(
                state,
                Rejection::AccountTooNew {
                    voter: voter.to_string(),
                    candidate: number,
                },
            );
        }

        let already = state
            .per_voter
            .get(voter)
            .map(|r| r.candidates.as_slice())
            .unwrap_or_default();
        if already.contains(&number) {
            return reject(
                state,
                Rejection::DuplicateVote {
                    voter: voter.to_string(),
                    candidate: number,
                },
            );
        }
        if already.len() >= self.max_votes_per_user {
            return reject(
                state,
                Rejection::CapExceeded {
                    voter: voter.to_string(),
                    candidate: number,
                    max: self.max_votes_per_user,
                },
            );
        }

        state
            .per_voter
            .entry(voter.to_string())
            .or_insert_with(|| VoteRecord {
                voter: voter.to_string(),
                candidates: Vec::new(),
            })
            .candidates
            .push(number);
        *state.counts.entry(number).or_insert(0) += 1;
        log::info!("Counted vote for Logo {} by {}", number, voter);
    }
}

fn reject(state: &mut TallyState, rejection: Rejection) {
    log::warn!("{}", rejection);
    state.rejections.push(rejection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollConfig;
    use crate::core::catalog::NumberingPolicy;
    use crate::error::{PollError, Result};
    use chrono::TimeZone;

    fn opened() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap()
    }

    fn old_accounts(login: &str) -> Result<DateTime<Utc>> {
        match login {
            "sockpuppet" => Ok(Utc.with_ymd_and_hms(2025, 9, 2, 0, 0, 0).unwrap()),
            "unknown" => Err(PollError::Api {
                status: 404,
                message: "Not Found".to_string(),
            }),
            _ => Ok(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    fn catalog(ctx: &mut RunContext, count: usize) -> Catalog {
        let names: Vec<String> = (1..=count).map(|n| format!("logo_{}_owner{}.png", n, n)).collect();
        Catalog::build_with_policy(ctx, &names, NumberingPolicy::PreserveNumber)
    }

    fn comments(items: &[(&str, &str)]) -> Vec<Comment> {
        items
            .iter()
            .enumerate()
            .map(|(i, (author, body))| Comment {
                author: author.to_string(),
                body: body.to_string(),
                created_at: opened() + chrono::Duration::minutes(i as i64),
            })
            .collect()
    }

    fn tally(max_votes: usize, candidates: usize, items: &[(&str, &str)]) -> (TallyState, RunContext) {
        let mut config = PollConfig::default();
        config.poll.max_votes_per_user = max_votes;
        let mut ctx = RunContext::new(config);
        let catalog = catalog(&mut ctx, candidates);
        let mut sybil = SybilCheck::new(&old_accounts, opened());
        let state = VoteTally::from_context(&ctx, &catalog).run(&mut ctx, &comments(items), &mut sybil);
        (state, ctx)
    }

    fn recount(state: &TallyState, number: u32) -> u32 {
        state
            .per_voter
            .values()
            .filter(|r| r.candidates.contains(&number))
            .count() as u32
    }

    #[test]
    fn test_duplicate_vote_is_rejected_once() {
        let (state, _) = tally(
            3,
            2,
            &[
                ("alice", "Vote: Logo 1"),
                ("bob", "Vote: Logo 1"),
                ("alice", "Vote: Logo 1"),
            ],
        );

        assert_eq!(state.counts, BTreeMap::from([(1, 2), (2, 0)]));
        assert_eq!(
            state.rejections,
            vec![Rejection::DuplicateVote {
                voter: "alice".to_string(),
                candidate: 1
            }]
        );
        assert_eq!(state.rejection_log(), vec!["Duplicate vote for Logo 1 by alice ignored"]);
    }

    #[test]
    fn test_fourth_vote_exceeds_cap() {
        let (state, _) = tally(
            3,
            4,
            &[
                ("carol", "Vote: Logo 1"),
                ("carol", "Vote: Logo 2"),
                ("carol", "Vote: Logo 3"),
                ("carol", "Vote: Logo 4"),
            ],
        );

        assert_eq!(state.per_voter["carol"].candidates, vec![1, 2, 3]);
        assert_eq!(state.votes_for(4), 0);
        assert_eq!(
            state.rejection_log(),
            vec!["User carol exceeded 3 votes, ignoring vote for Logo 4"]
        );
    }

    #[test]
    fn test_duplicate_check_precedes_cap_check() {
        let (state, _) = tally(
            2,
            3,
            &[
                ("dave", "Vote: Logo 1"),
                ("dave", "Vote: Logo 2"),
                ("dave", "Vote: Logo 2"),
                ("dave", "Vote: Logo 3"),
            ],
        );

        assert!(matches!(state.rejections[0], Rejection::DuplicateVote { candidate: 2, .. }));
        assert!(matches!(state.rejections[1], Rejection::CapExceeded { candidate: 3, .. }));
    }

    #[test]
    fn test_free_text_is_invalid_format() {
        let (state, _) = tally(3, 2, &[("erin", "I like logo 1 best")]);

        assert_eq!(state.total_votes(), 0);
        assert!(state.per_voter.is_empty());
        assert_eq!(
            state.rejection_log(),
            vec!["Invalid vote format by erin: I like logo 1 b***"]
        );
    }

    #[test]
    fn test_unknown_candidate_is_rejected() {
        let (state, _) = tally(
            3,
            2,
            &[("frank", "Vote: Logo 9"), ("frank", "Vote: Logo 123456789012")],
        );

        assert_eq!(
            state.rejection_log(),
            vec![
                "Invalid logo number 9 by frank",
                "Invalid logo number 123456789012 by frank"
            ]
        );
        assert!(!state.counts.contains_key(&9));
    }

    #[test]
    fn test_new_accounts_are_rejected_unresolved_pass() {
        let (state, ctx) = tally(
            3,
            2,
            &[("sockpuppet", "Vote: Logo 1"), ("unknown", "Vote: Logo 2")],
        );

        assert_eq!(state.votes_for(1), 0);
        assert_eq!(state.votes_for(2), 1);
        assert_eq!(
            state.rejection_log(),
            vec!["User sockpuppet (voted Logo 1) created after poll start"]
        );
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].contains("unknown"));
    }

    #[test]
    fn test_invariants_hold_on_mixed_feed() {
        let (state, _) = tally(
            2,
            5,
            &[
                ("a", "Vote: Logo 1"),
                ("b", "Vote: Logo 2"),
                ("a", "Vote: Logo 1"),
                ("a", "Vote: Logo 3"),
                ("a", "Vote: Logo 4"),
                ("c", "Vote:Logo 5"),
                ("b", "nice work"),
                ("c", "Vote: Logo 2"),
                ("c", "Vote: Logo 1"),
                ("sockpuppet", "Vote: Logo 1"),
            ],
        );

        let accepted: usize = state.per_voter.values().map(|r| r.candidates.len()).sum();
        assert_eq!(state.total_votes() as usize, accepted);
        for record in state.per_voter.values() {
            assert!(record.candidates.len() <= 2);
            let unique: HashSet<_> = record.candidates.iter().collect();
            assert_eq!(unique.len(), record.candidates.len());
        }
        for (&number, &count) in &state.counts {
            assert_eq!(count, recount(&state, number));
        }
        assert_eq!(state.counts.len(), 5);
    }

    #[test]
    fn test_identical_snapshot_gives_identical_tally() {
        let feed = [
            ("a", "Vote: Logo 2"),
            ("b", "Vote: Logo 1"),
            ("a", "Vote: Logo 2"),
            ("c", "hello"),
            ("unknown", "Vote: Logo 1"),
        ];
        let (first, first_ctx) = tally(3, 3, &feed);
        let (second, second_ctx) = tally(3, 3, &feed);

        assert_eq!(first, second);
        assert_eq!(first_ctx.warnings(), second_ctx.warnings());
    }
}
