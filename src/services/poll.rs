use crate::context::RunContext;
use crate::core::{AccountLookup, Catalog, SybilCheck, TallyReport, VoteTally};
use crate::error::{PollError, Result};
use crate::services::{Issue, IssueDraft, IssueState, IssueTracker, LogoRepository};

/// Catalog of the logos currently published in the repository folder.
/// A listing failure or an empty catalog ends the run.
///
/// Files are taken in name order, so under auto-numbering `logo_10_x.png`
/// becomes Logo 1 ahead of `logo_1_y.png`. Published logos are expected to have been
/// renumbered already (`logos renumber`, then `logos upload`), which makes
/// each file name agree with the number shown in the gallery.
pub fn load_catalog<R: LogoRepository + ?Sized>(ctx: &mut RunContext, repo: &R) -> Result<Catalog> {
    let mut names: Vec<String> = repo
        .list_logos()?
        .into_iter()
        .filter(|f| f.is_file())
        .map(|f| f.name)
        .collect();
    names.sort();

    let catalog = Catalog::build(ctx, &names);
    if catalog.is_empty() {
        return Err(PollError::NoLogos {
            location: format!("/{}", ctx.config().repository.logos_dir),
        });
    }
    Ok(catalog)
}

/// Fetch the poll thread and tally it. Failing to read the poll issue or
/// its comments is terminal: a partial feed would give wrong results.
pub fn tally_poll<T, L>(
    ctx: &mut RunContext,
    tracker: &T,
    lookup: &L,
    catalog: &Catalog,
) -> Result<TallyReport>
where
    T: IssueTracker + ?Sized,
    L: AccountLookup + Sync + ?Sized,
{
    let poll_issue = ctx
        .config()
        .poll
        .poll_issue
        .ok_or_else(|| PollError::Config("poll.poll_issue is not set".to_string()))?;

    let opened_at = tracker.issue(poll_issue)?.created_at;
    let comments = tracker.issue_comments(poll_issue)?;
    log::info!(
        "Tallying {} comments on issue #{} (opened {})",
        comments.len(),
        poll_issue,
        opened_at
    );

    let mut sybil = SybilCheck::new(lookup, opened_at);
    let state = VoteTally::from_context(ctx, catalog).run(ctx, &comments, &mut sybil);
    Ok(TallyReport::new(&state, catalog, ctx.take_warnings()))
}

fn ensure_writable(issue: &Issue) -> Result<()> {
    log::info!(
        "Issue #{} state: {:?}, locked: {}",
        issue.number,
        issue.state,
        issue.locked
    );
    if issue.locked {
        return Err(PollError::IssueUnavailable {
            number: issue.number,
            reason: "issue is locked".to_string(),
        });
    }
    if issue.state == IssueState::Closed {
        return Err(PollError::IssueUnavailable {
            number: issue.number,
            reason: "issue is closed".to_string(),
        });
    }
    Ok(())
}

/// Update the results issue, or create one when none is configured.
pub fn publish_results<T: IssueTracker + ?Sized>(
    ctx: &RunContext,
    tracker: &T,
    body: String,
) -> Result<Issue> {
    let poll = &ctx.config().poll;
    let draft = IssueDraft {
        title: poll.results_title.clone(),
        body,
        labels: Vec::new(),
    };

    match poll.results_issue {
        Some(number) => {
            ensure_writable(&tracker.issue(number)?)?;
            let issue = tracker.update_issue(number, &draft)?;
            log::info!("Successfully updated results issue: {}", issue.html_url);
            Ok(issue)
        }
        None => {
            let issue = tracker.create_issue(&draft)?;
            log::info!("Created results issue: {}", issue.html_url);
            log::info!("Set poll.results_issue = {} in your configuration", issue.number);
            Ok(issue)
        }
    }
}

/// Update the poll gallery issue, or create it. A deleted or missing issue
/// is replaced when `create_on_not_found` is set.
pub fn publish_gallery<T: IssueTracker + ?Sized>(
    ctx: &RunContext,
    tracker: &T,
    body: String,
) -> Result<Issue> {
    let poll = &ctx.config().poll;
    let mut draft = IssueDraft {
        title: poll.title.clone(),
        body,
        labels: vec!["poll".to_string()],
    };

    let Some(number) = poll.poll_issue else {
        return create_gallery(tracker, &draft);
    };

    let existing = match tracker.issue(number) {
        Ok(issue) => issue,
        Err(e) if matches!(e.status(), Some(404) | Some(410)) => {
            log::error!("Poll issue #{} is not available: {}", number, e);
            if poll.create_on_not_found {
                return create_gallery(tracker, &draft);
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    ensure_writable(&existing)?;

    if poll.preserve_title_on_update {
        draft.title = existing.title;
    }
    let issue = tracker.update_issue(number, &draft)?;
    log::info!("Successfully updated poll issue: {}", issue.html_url);
    Ok(issue)
}

fn create_gallery<T: IssueTracker + ?Sized>(tracker: &T, draft: &IssueDraft) -> Result<Issue> {
    let issue = tracker.create_issue(draft)?;
    log::info!("Created poll issue: {}", issue.html_url);
    log::info!("Set poll.poll_issue = {} in your configuration", issue.number);
    Ok(issue)
}
