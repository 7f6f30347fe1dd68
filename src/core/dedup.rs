// Near-duplicate suppression for submitted logos.
//
// Callers must pass files in a stable order (lexicographic by file name when
// the files come from a directory): the first file seen with a given
// fingerprint is the one that survives.

use crate::context::RunContext;
use crate::core::fingerprint::{Fingerprint, Fingerprinter};
use crate::error::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;

/// A file excluded because it looks like an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePair<T> {
    pub duplicate: T,
    pub original: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupOutcome<T> {
    /// Survivors in input order.
    pub unique: Vec<T>,
    pub duplicates: Vec<DuplicatePair<T>>,
    /// Items whose fingerprint could not be computed.
    pub skipped: Vec<T>,
}

pub struct Deduplicator {
    fingerprinter: Fingerprinter,
    threshold: u32,
}

impl Deduplicator {
    pub fn new(threshold: u32, canvas_size: u32) -> Self {
        Self {
            fingerprinter: Fingerprinter::new(canvas_size),
            threshold,
        }
    }

    pub fn from_context(ctx: &RunContext) -> Self {
        let images = &ctx.config().images;
        Self::new(images.hash_threshold, images.canvas_size)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Fingerprint `files` (in parallel) and drop near-duplicates.
    pub fn dedupe_files(&self, ctx: &mut RunContext, files: &[PathBuf]) -> DedupOutcome<PathBuf> {
        let fingerprinted: Vec<(PathBuf, Result<Fingerprint>)> = files
            .par_iter()
            .map(|path| (path.clone(), self.fingerprinter.fingerprint_path(path)))
            .collect();

        self.partition(ctx, fingerprinted, |path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        })
    }

    /// Sequential first-seen-wins pass over already fingerprinted items.
    pub fn partition<T, E, F>(
        &self,
        ctx: &mut RunContext,
        fingerprinted: Vec<(T, std::result::Result<Fingerprint, E>)>,
        label: F,
    ) -> DedupOutcome<T>
    where
        T: Clone,
        E: Display,
        F: Fn(&T) -> String,
    {
        let mut kept: Vec<(Fingerprint, T)> = Vec::new();
        let mut exact: HashMap<Fingerprint, usize> = HashMap::new();
        let mut outcome = DedupOutcome {
            unique: Vec::new(),
            duplicates: Vec::new(),
            skipped: Vec::new(),
        };

        for (item, fingerprint) in fingerprinted {
            let fingerprint = match fingerprint {
                Ok(fp) => fp,
                Err(e) => {
                    ctx.warn(format!(
                        "Failed to compute fingerprint for {}: {}",
                        label(&item),
                        e
                    ));
                    outcome.skipped.push(item);
                    continue;
                }
            };

            let matched = match exact.get(&fingerprint) {
                Some(&idx) => Some(idx),
                None if self.threshold > 0 => kept
                    .iter()
                    .position(|(fp, _)| fp.distance(&fingerprint) <= self.threshold),
                None => None,
            };

            match matched {
                Some(idx) => {
                    let original = kept[idx].1.clone();
                    log::warn!(
                        "Duplicate image detected: {} matches {}",
                        label(&item),
                        label(&original)
                    );
                    outcome.duplicates.push(DuplicatePair {
                        duplicate: item,
                        original,
                    });
                }
                None => {
                    exact.insert(fingerprint.clone(), kept.len());
                    kept.push((fingerprint, item.clone()));
                    outcome.unique.push(item);
                }
            }
        }

        log::info!(
            "Found {} unique logo files after filtering ({} duplicates, {} skipped)",
            outcome.unique.len(),
            outcome.duplicates.len(),
            outcome.skipped.len()
        );
        outcome
    }
}
