use crate::context::RunContext;
use crate::core::{Catalog, NumberingPolicy};
use crate::error::{PollError, Result};
use crate::services::LogoRepository;
use crate::services::renamer::scan_logo_dir;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub deleted: Vec<String>,
    /// Names the logos were published under, in upload order.
    pub uploaded: Vec<String>,
}

/// Replace the repository logos folder with the logos in `dir`.
///
/// The local catalog is built before anything remote is touched, so an
/// empty or unreadable directory never wipes the published logos. Under
/// auto-numbering the files are published as `logo_<1..N>_<owner><ext>`;
/// otherwise under their own names.
pub fn refresh_logos<R: LogoRepository + ?Sized>(
    ctx: &mut RunContext,
    repo: &R,
    dir: &Path,
) -> Result<UploadSummary> {
    let files = scan_logo_dir(ctx, dir)?;
    let names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    let policy = NumberingPolicy::from_auto_number(ctx.config().poll.auto_number);
    let catalog = Catalog::build_with_policy(ctx, &names, policy);
    if catalog.is_empty() {
        return Err(PollError::NoLogos {
            location: dir.display().to_string(),
        });
    }

    let mut summary = UploadSummary {
        deleted: delete_all(repo)?,
        ..UploadSummary::default()
    };

    for candidate in catalog.candidates() {
        let target = match policy {
            NumberingPolicy::AutoRenumber => candidate.canonical_filename(),
            NumberingPolicy::PreserveNumber => candidate.filename.clone(),
        };
        let data = match fs::read(dir.join(&candidate.filename)) {
            Ok(data) => data,
            Err(e) => {
                ctx.warn(format!("Failed to read {}: {}", candidate.filename, e));
                continue;
            }
        };
        repo.upload_logo(&target, &data)?;
        summary.uploaded.push(target);
    }

    if summary.uploaded.is_empty() {
        return Err(PollError::NoLogos {
            location: dir.display().to_string(),
        });
    }
    log::info!("Successfully uploaded {} logos", summary.uploaded.len());
    Ok(summary)
}

/// Delete every file in the logos folder. A missing folder has nothing
/// to delete.
fn delete_all<R: LogoRepository + ?Sized>(repo: &R) -> Result<Vec<String>> {
    let files = match repo.list_logos() {
        Ok(files) => files,
        Err(e) if e.status() == Some(404) => {
            log::info!("No logos folder found in repository, skipping deletion");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut deleted = Vec::new();
    for file in files.iter().filter(|f| f.is_file()) {
        repo.delete_logo(file)?;
        deleted.push(file.path.clone());
    }
    Ok(deleted)
}
