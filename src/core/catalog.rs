use crate::context::RunContext;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One poll entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub number: u32,
    pub owner: String,
    /// File the logo is stored under, as listed by the source.
    pub filename: String,
}

impl Candidate {
    /// File name this candidate would carry after renumbering:
    /// `logo_<number>_<owner><ext>`.
    pub fn canonical_filename(&self) -> String {
        let ext = self
            .filename
            .rfind('.')
            .map(|idx| &self.filename[idx..])
            .unwrap_or("");
        format!("logo_{}_{}{}", self.number, self.owner, ext)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberingPolicy {
    /// Number candidates 1..N in input order; embedded numbers are ignored.
    AutoRenumber,
    /// The embedded number is the identity; reuse is rejected.
    PreserveNumber,
}

impl NumberingPolicy {
    pub fn from_auto_number(auto_number: bool) -> Self {
        if auto_number {
            NumberingPolicy::AutoRenumber
        } else {
            NumberingPolicy::PreserveNumber
        }
    }
}

/// Components of a `logo_<number>_<owner><ext>` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoName {
    pub number: u32,
    pub owner: String,
    /// Final extension including the dot, original case.
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NameError {
    MissingPrefix,
    MissingExtension,
    Malformed,
    InvalidNumber(String),
    EmptyOwner,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::MissingPrefix => write!(f, "name does not start with logo_"),
            NameError::MissingExtension => write!(f, "missing file extension"),
            NameError::Malformed => write!(f, "expected logo_<number>_<owner>"),
            NameError::InvalidNumber(token) => write!(f, "invalid logo number {:?}", token),
            NameError::EmptyOwner => write!(f, "empty owner"),
        }
    }
}

/// Split a logo file name on its first two underscores. Underscores after
/// the second one belong to the owner.
pub fn parse_logo_name(filename: &str) -> Result<LogoName, NameError> {
    let (stem, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => return Err(NameError::MissingExtension),
    };

    let mut parts = stem.splitn(3, '_');
    let prefix = parts.next().unwrap_or_default();
    let (number, owner) = match (parts.next(), parts.next()) {
        (Some(number), Some(owner)) => (number, owner),
        _ if prefix != "logo" => return Err(NameError::MissingPrefix),
        _ => return Err(NameError::Malformed),
    };
    if prefix != "logo" {
        return Err(NameError::MissingPrefix);
    }

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(NameError::InvalidNumber(number.to_string()));
    }
    let number: u32 = number
        .parse()
        .map_err(|_| NameError::InvalidNumber(number.to_string()))?;

    if owner.is_empty() {
        return Err(NameError::EmptyOwner);
    }

    Ok(LogoName {
        number,
        owner: owner.to_string(),
        extension: ext.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CatalogRejectionReason {
    InvalidName(NameError),
    UnsupportedExtension(String),
    ZeroNumber,
    DuplicateNumber(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRejection {
    pub filename: String,
    pub reason: CatalogRejectionReason,
}

impl fmt::Display for CatalogRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            CatalogRejectionReason::InvalidName(e) => {
                write!(f, "Skipping malformed file name: {} ({})", self.filename, e)
            }
            CatalogRejectionReason::UnsupportedExtension(ext) => write!(
                f,
                "Skipping file with unsupported extension {}: {}",
                ext, self.filename
            ),
            CatalogRejectionReason::ZeroNumber => {
                write!(f, "Skipping logo number 0 in {}", self.filename)
            }
            CatalogRejectionReason::DuplicateNumber(n) => {
                write!(f, "Skipping duplicate logo number {} in {}", n, self.filename)
            }
        }
    }
}

/// Ordered set of candidates for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    candidates: Vec<Candidate>,
    rejections: Vec<CatalogRejection>,
}

impl Catalog {
    /// Build with the numbering policy from the run configuration.
    pub fn build<S: AsRef<str>>(ctx: &mut RunContext, filenames: &[S]) -> Self {
        let policy = NumberingPolicy::from_auto_number(ctx.config().poll.auto_number);
        Self::build_with_policy(ctx, filenames, policy)
    }

    pub fn build_with_policy<S: AsRef<str>>(
        ctx: &mut RunContext,
        filenames: &[S],
        policy: NumberingPolicy,
    ) -> Self {
        let mut catalog = Catalog::default();
        let mut seen = HashSet::new();
        let mut next_number = 0u32;

        for filename in filenames {
            let filename = filename.as_ref();
            let parsed = match parse_logo_name(filename) {
                Ok(parsed) => parsed,
                Err(e) => {
                    catalog.reject(ctx, filename, CatalogRejectionReason::InvalidName(e));
                    continue;
                }
            };
            if !ctx.config().images.is_allowed_extension(&parsed.extension) {
                catalog.reject(
                    ctx,
                    filename,
                    CatalogRejectionReason::UnsupportedExtension(parsed.extension),
                );
                continue;
            }

            let number = match policy {
                NumberingPolicy::AutoRenumber => {
                    next_number += 1;
                    next_number
                }
                NumberingPolicy::PreserveNumber => {
                    if parsed.number == 0 {
                        catalog.reject(ctx, filename, CatalogRejectionReason::ZeroNumber);
                        continue;
                    }
                    if !seen.insert(parsed.number) {
                        catalog.reject(
                            ctx,
                            filename,
                            CatalogRejectionReason::DuplicateNumber(parsed.number),
                        );
                        continue;
                    }
                    parsed.number
                }
            };

            catalog.candidates.push(Candidate {
                number,
                owner: parsed.owner,
                filename: filename.to_string(),
            });
        }

        catalog.candidates.sort_by_key(|c| c.number);
        log::info!(
            "Cataloged {} logos ({} rejected)",
            catalog.candidates.len(),
            catalog.rejections.len()
        );
        catalog
    }

    fn reject(&mut self, ctx: &mut RunContext, filename: &str, reason: CatalogRejectionReason) {
        let rejection = CatalogRejection {
            filename: filename.to_string(),
            reason,
        };
        ctx.warn(rejection.to_string());
        self.rejections.push(rejection);
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn rejections(&self) -> &[CatalogRejection] {
        &self.rejections
    }

    pub fn get(&self, number: u32) -> Option<&Candidate> {
        self.candidates
            .binary_search_by_key(&number, |c| c.number)
            .ok()
            .map(|idx| &self.candidates[idx])
    }

    pub fn contains(&self, number: u32) -> bool {
        self.get(number).is_some()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Repair step: renumber 1..N in the given order and rewrite file names.
pub fn renumber(candidates: &[Candidate]) -> Vec<Candidate> {
    candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| {
            let mut renamed = Candidate {
                number: idx as u32 + 1,
                owner: candidate.owner.clone(),
                filename: candidate.filename.clone(),
            };
            renamed.filename = renamed.canonical_filename();
            renamed
        })
        .collect()
}
