// Poll engine: logo deduplication, cataloging, vote validation and ranking.
// Nothing in here performs network I/O; remote data comes in through the
// traits in `services` and `sybil::AccountLookup`.

pub mod ballot;
pub mod catalog;
pub mod dedup;
pub mod fingerprint;
pub mod ranking;
pub mod sybil;
pub mod tally;

pub use catalog::{Candidate, Catalog, NumberingPolicy};
pub use dedup::{DedupOutcome, Deduplicator, DuplicatePair};
pub use ranking::{RankedEntry, TallyReport};
pub use sybil::{AccountLookup, SybilCheck};
pub use tally::{Comment, Rejection, TallyState, VoteRecord, VoteTally};
