// Local repair step: drop duplicate artwork and renumber the remaining logos
// 1..N into a fresh directory.

use crate::context::RunContext;
use crate::core::catalog::{parse_logo_name, renumber};
use crate::core::{Catalog, Deduplicator, DuplicatePair, NumberingPolicy};
use crate::error::{PollError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Logo files directly inside `dir`, sorted by file name. This order is
/// what decides which of two duplicates survives and how logos are
/// numbered, so every caller goes through here.
pub fn scan_logo_dir(ctx: &mut RunContext, dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PollError::InvalidPath {
            path: dir.display().to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        let name = file_name(&path);
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        if !ctx.config().images.is_allowed_extension(&ext) {
            ctx.warn(format!("Skipping file with unsupported extension: {}", name));
            continue;
        }
        if let Err(e) = parse_logo_name(&name) {
            ctx.warn(format!("Skipping file with invalid name format: {} ({})", name, e));
            continue;
        }
        files.push(path);
    }

    files.sort_by_key(|p| file_name(p));
    log::info!("Found {} valid logo files in {}", files.len(), dir.display());
    Ok(files)
}

#[derive(Debug, Clone)]
pub struct RenameOptions {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub dry_run: bool,
    /// Replace `source` with `dest` once the copy is verified.
    pub replace_original: bool,
    pub filter_duplicates: bool,
    /// Where to write `Duplicate: X matches Original: Y` lines.
    pub duplicate_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedLogo {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameSummary {
    pub renamed: Vec<RenamedLogo>,
    pub duplicates: Vec<DuplicatePair<String>>,
    /// Files whose fingerprint could not be computed.
    pub skipped: Vec<String>,
    /// Directory that now holds the renumbered logos.
    pub output_dir: PathBuf,
    pub dry_run: bool,
}

pub fn duplicate_log_lines(duplicates: &[DuplicatePair<String>]) -> String {
    duplicates
        .iter()
        .map(|d| format!("Duplicate: {} matches Original: {}\n", d.duplicate, d.original))
        .collect()
}

pub fn renumber_directory(ctx: &mut RunContext, options: &RenameOptions) -> Result<RenameSummary> {
    let files = scan_logo_dir(ctx, &options.source)?;
    if files.is_empty() {
        return Err(PollError::NoLogos {
            location: options.source.display().to_string(),
        });
    }
    let source = fs::canonicalize(&options.source)?;
    let dest = resolve_path(&options.dest)?;
    if dest.starts_with(&source) || source.starts_with(&dest) {
        return Err(PollError::InvalidPath {
            path: options.dest.display().to_string(),
        });
    }

    let (unique, duplicates, skipped) = if options.filter_duplicates {
        let outcome = Deduplicator::from_context(ctx).dedupe_files(ctx, &files);
        let duplicates = outcome
            .duplicates
            .iter()
            .map(|d| DuplicatePair {
                duplicate: file_name(&d.duplicate),
                original: file_name(&d.original),
            })
            .collect();
        let skipped = outcome.skipped.iter().map(|p| file_name(p)).collect();
        (outcome.unique, duplicates, skipped)
    } else {
        (files, Vec::new(), Vec::new())
    };

    let names: Vec<String> = unique.iter().map(|p| file_name(p)).collect();
    let catalog = Catalog::build_with_policy(ctx, &names, NumberingPolicy::AutoRenumber);
    let renamed: Vec<RenamedLogo> = catalog
        .candidates()
        .iter()
        .zip(renumber(catalog.candidates()))
        .map(|(before, after)| RenamedLogo {
            from: before.filename.clone(),
            to: after.filename,
        })
        .collect();

    if let Some(log_path) = &options.duplicate_log {
        if duplicates.is_empty() {
            log::info!("No duplicates found, skipping {}", log_path.display());
        } else {
            fs::write(log_path, duplicate_log_lines(&duplicates))?;
            log::info!("Wrote {} duplicates to {}", duplicates.len(), log_path.display());
        }
    }

    let mut summary = RenameSummary {
        renamed,
        duplicates,
        skipped,
        output_dir: options.dest.clone(),
        dry_run: options.dry_run,
    };

    if options.dry_run {
        for logo in &summary.renamed {
            log::info!(
                "Would copy {} to {}",
                logo.from,
                options.dest.join(&logo.to).display()
            );
        }
        return Ok(summary);
    }

    if options.dest.exists() {
        fs::remove_dir_all(&options.dest)?;
        log::info!("Cleared existing destination directory {}", options.dest.display());
    }
    fs::create_dir_all(&options.dest)?;
    for logo in &summary.renamed {
        fs::copy(options.source.join(&logo.from), options.dest.join(&logo.to))?;
        log::info!("Copied {} to {}", logo.from, logo.to);
    }

    if options.replace_original {
        replace_directory(&options.source, &options.dest, summary.renamed.len())?;
        summary.output_dir = options.source.clone();
    }
    Ok(summary)
}

/// Absolute form of `path`, which may not exist yet: the nearest existing
/// ancestor is canonicalized and the missing components appended.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(fs::canonicalize(path)?);
    }
    let absolute = std::path::absolute(path)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve_path(parent)?.join(name)),
        _ => Ok(absolute),
    }
}

/// Swap `dest` in for `source` after checking that `dest` holds exactly
/// `expected` logo files.
fn replace_directory(source: &Path, dest: &Path, expected: usize) -> Result<()> {
    let found = fs::read_dir(dest)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("logo_"))
        .count();
    if found != expected {
        return Err(PollError::CountMismatch {
            dir: dest.display().to_string(),
            expected,
            found,
        });
    }

    fs::remove_dir_all(source)?;
    log::info!("Deleted original directory {}", source.display());
    fs::rename(dest, source)?;
    log::info!("Renamed {} to {}", dest.display(), source.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    /// Half black, half white; `vertical` picks the split direction.
    fn create_test_image(path: &Path, vertical: bool) {
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            let dark = if vertical { x < 32 } else { y < 32 };
            if dark { Rgb([0u8, 0, 0]) } else { Rgb([255u8, 255, 255]) }
        });
        img.save(path).unwrap();
    }

    fn options(source: &Path, dest: &Path) -> RenameOptions {
        RenameOptions {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            dry_run: false,
            replace_original: false,
            filter_duplicates: true,
            duplicate_log: None,
        }
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_scan_sorts_by_name_and_warns() {
        let temp = TempDir::new().unwrap();
        create_test_image(&temp.path().join("logo_9_zed.png"), true);
        create_test_image(&temp.path().join("logo_10_amy.png"), true);
        create_test_image(&temp.path().join("cover.png"), true);
        fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        fs::create_dir(temp.path().join("logo_1_dir.png")).unwrap();

        let mut ctx = RunContext::default();
        let files = scan_logo_dir(&mut ctx, temp.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();

        assert_eq!(names, vec!["logo_10_amy.png", "logo_9_zed.png"]);
        assert_eq!(ctx.warnings().len(), 2);
    }

    #[test]
    fn test_scan_rejects_missing_dir() {
        let result = scan_logo_dir(&mut RunContext::default(), Path::new("/nonexistent/logos"));
        assert!(matches!(result, Err(PollError::InvalidPath { .. })));
    }

    #[test]
    fn test_identical_images_are_collapsed_and_numbering_is_gapless() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("resized");
        let dest = temp.path().join("renamed");
        fs::create_dir(&source).unwrap();
        create_test_image(&source.join("logo_3_alice.png"), true);
        create_test_image(&source.join("logo_5_bob.png"), true);
        create_test_image(&source.join("logo_9_carol.png"), false);

        let mut opts = options(&source, &dest);
        opts.duplicate_log = Some(temp.path().join("logo_duplicate.txt"));
        let summary = renumber_directory(&mut RunContext::default(), &opts).unwrap();

        assert_eq!(names_in(&dest), vec!["logo_1_alice.png", "logo_2_carol.png"]);
        assert_eq!(
            summary.duplicates,
            vec![DuplicatePair {
                duplicate: "logo_5_bob.png".to_string(),
                original: "logo_3_alice.png".to_string(),
            }]
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("logo_duplicate.txt")).unwrap(),
            "Duplicate: logo_5_bob.png matches Original: logo_3_alice.png\n"
        );
        assert_eq!(names_in(&source).len(), 3);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("resized");
        let dest = temp.path().join("renamed");
        fs::create_dir(&source).unwrap();
        create_test_image(&source.join("logo_4_alice.png"), true);

        let mut opts = options(&source, &dest);
        opts.dry_run = true;
        let summary = renumber_directory(&mut RunContext::default(), &opts).unwrap();

        assert_eq!(summary.renamed[0].to, "logo_1_alice.png");
        assert!(!dest.exists());
    }

    #[test]
    fn test_replace_original_swaps_directories() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("resized");
        let dest = temp.path().join("renamed");
        fs::create_dir(&source).unwrap();
        create_test_image(&source.join("logo_7_alice.png"), true);
        create_test_image(&source.join("logo_8_bob.png"), false);
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        let mut opts = options(&source, &dest);
        opts.replace_original = true;
        opts.filter_duplicates = false;
        let summary = renumber_directory(&mut RunContext::default(), &opts).unwrap();

        assert_eq!(summary.output_dir, source);
        assert_eq!(names_in(&source), vec!["logo_1_alice.png", "logo_2_bob.png"]);
        assert!(!dest.exists());
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = renumber_directory(
            &mut RunContext::default(),
            &options(temp.path(), &temp.path().join("out")),
        );
        assert!(matches!(result, Err(PollError::NoLogos { .. })));
    }

    #[test]
    fn test_dest_equal_to_source_is_refused() {
        let temp = TempDir::new().unwrap();
        create_test_image(&temp.path().join("logo_1_alice.png"), true);
        let result = renumber_directory(&mut RunContext::default(), &options(temp.path(), temp.path()));
        assert!(matches!(result, Err(PollError::InvalidPath { .. })));
        assert!(temp.path().join("logo_1_alice.png").exists());
    }

    #[test]
    fn test_dest_containing_source_is_refused() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("logos").join("resized");
        fs::create_dir_all(&source).unwrap();
        create_test_image(&source.join("logo_1_alice.png"), true);

        let result = renumber_directory(
            &mut RunContext::default(),
            &options(&source, &temp.path().join("logos")),
        );
        assert!(matches!(result, Err(PollError::InvalidPath { .. })));
        assert!(source.join("logo_1_alice.png").exists());
    }

    #[test]
    fn test_dest_inside_source_is_refused() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("resized");
        fs::create_dir(&source).unwrap();
        create_test_image(&source.join("logo_1_alice.png"), true);

        let mut opts = options(&source, &source.join("renamed"));
        opts.replace_original = true;
        let result = renumber_directory(&mut RunContext::default(), &opts);
        assert!(matches!(result, Err(PollError::InvalidPath { .. })));
        assert!(source.join("logo_1_alice.png").exists());
        assert!(!source.join("renamed").exists());
    }
}
