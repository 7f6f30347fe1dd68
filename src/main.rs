use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use logopoll::core::Deduplicator;
use logopoll::services::collector::{self, HttpFetcher, MANIFEST_FILE_NAME};
use logopoll::services::renamer::{self, RenameOptions};
use logopoll::services::{GitHubClient, IssueTracker, poll, report, uploader};
use logopoll::{PollConfig, RunContext};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "logopoll", version, about = "Run a community logo poll on GitHub issues")]
struct Cli {
    /// Configuration file (default: ./logopoll.toml, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// GitHub token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prepare and publish logo files
    Logos {
        #[command(subcommand)]
        command: LogosCmd,
    },

    /// Publish the poll and its results
    Poll {
        #[command(subcommand)]
        command: PollCmd,
    },
}

#[derive(Subcommand, Debug)]
enum LogosCmd {
    /// Download and resize the logos submitted on the submissions issue
    Collect {
        /// Directory to save logos into
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,
        /// Where to write the format manifest
        #[arg(long, value_name = "FILE", default_value = MANIFEST_FILE_NAME)]
        manifest: PathBuf,
    },

    /// Drop duplicate artwork and renumber logos 1..N into a new directory
    Renumber {
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,
        #[arg(short, long, value_name = "DIR")]
        dest: PathBuf,
        /// Only show what would be copied
        #[arg(long)]
        dry_run: bool,
        /// Replace the source directory with the result
        #[arg(long)]
        replace_original: bool,
        /// Keep duplicate artwork
        #[arg(long)]
        no_dedup: bool,
        /// File that lists excluded duplicates
        #[arg(long, value_name = "FILE", default_value = "logo_duplicate.txt")]
        duplicate_log: PathBuf,
        /// Do not ask before replacing the source directory
        #[arg(short, long)]
        yes: bool,
    },

    /// List duplicate logos without changing anything
    Scan {
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,
    },

    /// Replace the repository logos folder with a local directory
    Upload {
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum PollCmd {
    /// Create or update the poll issue with the logo gallery
    Gallery,

    /// Tally the votes and publish the results issue
    Results {
        /// Print the results instead of publishing them
        #[arg(long)]
        dry_run: bool,
        /// Also write the tally report as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = PollConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let mut ctx = RunContext::new(config);
    let token = cli.token.as_deref();

    match cli.command {
        Commands::Logos { command } => match command {
            LogosCmd::Collect { dir, manifest } => collect(&mut ctx, token, &dir, &manifest)?,

            LogosCmd::Renumber {
                source,
                dest,
                dry_run,
                replace_original,
                no_dedup,
                duplicate_log,
                yes,
            } => {
                if replace_original && !dry_run && !yes {
                    let confirmed = Confirm::new()
                        .with_prompt(format!(
                            "Replace {} with the renumbered logos?",
                            source.display()
                        ))
                        .default(false)
                        .interact()?;
                    if !confirmed {
                        println!("Aborted.");
                        return Ok(());
                    }
                }

                println!("▶ Renumbering logos in: {}", source.display());
                let options = RenameOptions {
                    source,
                    dest,
                    dry_run,
                    replace_original,
                    filter_duplicates: !no_dedup,
                    duplicate_log: Some(duplicate_log),
                };
                let summary = benchmark("renumbering", || {
                    renamer::renumber_directory(&mut ctx, &options)
                })?;

                for logo in &summary.renamed {
                    let verb = if dry_run { "[dry-run] COPY" } else { "Copied" };
                    println!("   📦 {} {} → {}", verb, logo.from, logo.to);
                }
                for dup in &summary.duplicates {
                    println!("   🗑️  Duplicate {} matches {}", dup.duplicate, dup.original);
                }
                if dry_run {
                    println!("\n⚠️  Dry-run only; no files were changed.");
                } else {
                    println!(
                        "\n✅ {} logos written to {}",
                        summary.renamed.len(),
                        summary.output_dir.display()
                    );
                }
            }

            LogosCmd::Scan { dir } => {
                println!("▶ Scanning for duplicate logos in: {}", dir.display());
                let files = with_spinner("Scanning for logos…", || {
                    renamer::scan_logo_dir(&mut ctx, &dir)
                })?;
                println!("▶ Parallel hashing {} logos…", files.len());
                let dedup = Deduplicator::from_context(&ctx);
                let outcome = benchmark("hashing all logos", || dedup.dedupe_files(&mut ctx, &files));

                if outcome.duplicates.is_empty() {
                    println!("No duplicates found.");
                } else {
                    println!("Found {} duplicate(s):", outcome.duplicates.len());
                    for pair in &outcome.duplicates {
                        println!("   🏆 {}", pair.original.display());
                        println!("   ▶ {}", pair.duplicate.display());
                    }
                }
            }

            LogosCmd::Upload { dir } => {
                let github = remote_client(&ctx, token)?;
                println!("▶ Uploading logos from: {}", dir.display());
                let summary = uploader::refresh_logos(&mut ctx, &github, &dir)
                    .context("Logo refresh failed")?;
                println!(
                    "\n✅ Deleted {} and uploaded {} logos",
                    summary.deleted.len(),
                    summary.uploaded.len()
                );
            }
        },

        Commands::Poll { command } => {
            let github = remote_client(&ctx, token)?;
            let catalog = poll::load_catalog(&mut ctx, &github).context("Failed to load logos")?;

            match command {
                PollCmd::Gallery => {
                    let body = report::render_gallery(ctx.config(), &catalog, &timestamp());
                    let issue = poll::publish_gallery(&ctx, &github, body)?;
                    println!("✅ Poll issue: {}", issue.html_url);
                }

                PollCmd::Results { dry_run, json } => {
                    let report = with_spinner("Tallying votes…", || {
                        poll::tally_poll(&mut ctx, &github, &github, &catalog)
                    })?;
                    println!(
                        "▶ {} valid vote(s), {} rejected",
                        report.total_votes,
                        report.rejections.len()
                    );

                    if let Some(path) = json {
                        fs::write(&path, serde_json::to_string_pretty(&report)?)
                            .with_context(|| format!("Failed to write {:?}", path))?;
                        println!("✅ Wrote tally report to {}", path.display());
                    }

                    let body = report::render_results(ctx.config(), &report, &timestamp());
                    if dry_run {
                        println!("\n{}", body);
                        println!("⚠️  Dry-run only; results were not published.");
                    } else {
                        let issue = poll::publish_results(&ctx, &github, body)?;
                        println!("✅ Results issue: {}", issue.html_url);
                    }
                }
            }
        }
    }

    Ok(())
}

fn collect(ctx: &mut RunContext, token: Option<&str>, dir: &Path, manifest: &Path) -> Result<()> {
    let github = remote_client(ctx, token)?;
    let issue = ctx
        .config()
        .poll
        .submissions_issue
        .context("poll.submissions_issue is not set")?;

    println!("▶ Collecting logos from issue #{} into {}", issue, dir.display());
    let comments = github.issue_comments(issue)?;
    let fetcher = HttpFetcher::new()?;
    let summary = benchmark("downloading logos", || {
        collector::collect_logos(ctx, &fetcher, &comments, dir)
    })?;

    fs::write(manifest, summary.manifest())
        .with_context(|| format!("Failed to write manifest {:?}", manifest))?;
    println!(
        "\n✅ Saved {} logos ({} skipped); manifest in {}",
        summary.collected.len(),
        summary.skipped.len(),
        manifest.display()
    );
    Ok(())
}

fn remote_client(ctx: &RunContext, token: Option<&str>) -> Result<GitHubClient> {
    ctx.config().validate_remote()?;
    if token.is_none() {
        log::warn!("No GitHub token given; requests are unauthenticated");
    }
    Ok(GitHubClient::new(&ctx.config().repository, token)?)
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

/// Run `f()` behind a spinner showing `message`.
fn with_spinner<T, F: FnOnce() -> T>(message: &str, f: F) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = f();
    spinner.finish_and_clear();
    result
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
