use crate::context::RunContext;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Resolves a voter identity to its account creation time.
pub trait AccountLookup {
    fn account_created_at(&self, login: &str) -> Result<DateTime<Utc>>;
}

impl<F> AccountLookup for F
where
    F: Fn(&str) -> Result<DateTime<Utc>>,
{
    fn account_created_at(&self, login: &str) -> Result<DateTime<Utc>> {
        self(login)
    }
}

/// Flags accounts created after the poll opened.
///
/// An identity that cannot be resolved is not flagged; the failure is
/// recorded as a warning. Each identity is looked up at most once per run.
pub struct SybilCheck<'a, L: ?Sized> {
    lookup: &'a L,
    poll_opened_at: DateTime<Utc>,
    resolved: HashMap<String, Option<DateTime<Utc>>>,
}

impl<'a, L: AccountLookup + ?Sized> SybilCheck<'a, L> {
    pub fn new(lookup: &'a L, poll_opened_at: DateTime<Utc>) -> Self {
        Self {
            lookup,
            poll_opened_at,
            resolved: HashMap::new(),
        }
    }

    pub fn poll_opened_at(&self) -> DateTime<Utc> {
        self.poll_opened_at
    }

    pub fn is_flagged(&mut self, ctx: &mut RunContext, voter: &str) -> bool {
        let created_at = match self.resolved.get(voter).copied() {
            Some(created_at) => created_at,
            None => {
                let result = self.lookup.account_created_at(voter);
                self.record(ctx, voter, result)
            }
        };
        created_at.is_some_and(|created_at| created_at > self.poll_opened_at)
    }

    fn record(
        &mut self,
        ctx: &mut RunContext,
        voter: &str,
        result: Result<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let created_at = match result {
            Ok(created_at) => Some(created_at),
            Err(e) => {
                ctx.warn(format!("Failed to fetch user {}: {}", voter, e));
                None
            }
        };
        self.resolved.insert(voter.to_string(), created_at);
        created_at
    }
}

impl<'a, L: AccountLookup + Sync + ?Sized> SybilCheck<'a, L> {
    /// Resolve `voters` concurrently. Results are merged in the order given,
    /// so warnings come out the same on every run.
    pub fn prefetch(&mut self, ctx: &mut RunContext, voters: &[String]) {
        let mut seen = HashSet::new();
        let pending: Vec<&String> = voters
            .iter()
            .filter(|v| !self.resolved.contains_key(v.as_str()) && seen.insert(v.as_str()))
            .collect();
        if pending.is_empty() {
            return;
        }

        log::debug!("Prefetching {} account(s)", pending.len());
        let lookup = self.lookup;
        let results: Vec<(&String, Result<DateTime<Utc>>)> = pending
            .into_par_iter()
            .map(|voter| (voter, lookup.account_created_at(voter)))
            .collect();

        for (voter, result) in results {
            self.record(ctx, voter, result);
        }
    }
}
