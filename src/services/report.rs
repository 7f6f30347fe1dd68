// Markdown bodies for the poll gallery and the results issue.

use crate::config::PollConfig;
use crate::core::{Catalog, TallyReport};

fn plural(count: u32) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Header rows for a table `columns` wide with centered, untitled columns.
fn table_header(columns: usize) -> String {
    format!(
        "| {} |\n| {} |\n",
        vec![""; columns].join(" | "),
        vec![":---:"; columns].join(" | ")
    )
}

/// Rows of `columns` cells; the last row is padded with empty cells.
fn table_rows(cells: Vec<String>, columns: usize) -> String {
    let mut out = String::new();
    for chunk in cells.chunks(columns) {
        let mut row: Vec<&str> = chunk.iter().map(String::as_str).collect();
        row.resize(columns, "");
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn logo_url(config: &PollConfig, filename: &str) -> String {
    format!("{}/{}", config.repository.raw_base_url(), filename)
}

pub fn render_gallery(config: &PollConfig, catalog: &Catalog, updated: &str) -> String {
    let poll = &config.poll;
    let results_link = poll
        .results_issue
        .map(|n| config.repository.issue_url(n))
        .unwrap_or_else(|| "TBD".to_string());
    let deadline = poll.deadline.as_deref().unwrap_or("to be announced");

    let mut body = format!(
        "# {title} (Updated {updated})\n\n\
         Please vote for your favorite logo by commenting **exactly** `Vote: Logo X` (e.g., **`Vote: Logo 1`**).\n\
         Only {max} votes per user will be counted; additional votes will be ignored.\n\
         You can only vote once for the same logo.\n\
         Suspicious accounts (e.g., newly created) may be excluded.\n\
         Each person is limited to voting with one GitHub account.\n\n\
         **Deadline to vote**: {deadline}.\n\n\
         [🟢 **Poll Results** 🟢]({results_link})\n\n\
         ## Logos\n",
        title = poll.title,
        max = poll.max_votes_per_user,
    );
    body.push_str(&table_header(poll.logos_per_row));

    let cells = catalog
        .candidates()
        .iter()
        .map(|c| {
            format!(
                "![Logo {n}]({url})<br>**Logo {n}** (by {owner})",
                n = c.number,
                url = logo_url(config, &c.filename),
                owner = c.owner
            )
        })
        .collect();
    body.push_str(&table_rows(cells, poll.logos_per_row));
    body
}

pub fn render_results(config: &PollConfig, report: &TallyReport, updated: &str) -> String {
    let poll = &config.poll;
    let poll_link = poll
        .poll_issue
        .map(|n| config.repository.issue_url(n))
        .unwrap_or_default();

    let mut body = format!(
        "# {title} (Updated {updated})\n\
         [🟢 **Logo Poll** 🟢]({poll_link})\n\n\
         ## Total: {total} valid vote{s}.\n\n\
         ## Vote Results\n",
        title = poll.results_title,
        total = report.total_votes,
        s = plural(report.total_votes),
    );
    body.push_str(&table_header(poll.logos_per_row));

    if report.ranked.is_empty() {
        body.push_str("No valid votes recorded yet.\n");
    } else {
        let cells = report
            .ranked
            .iter()
            .map(|entry| {
                let c = &entry.candidate;
                format!(
                    "![Logo {n}]({url})<br>**Logo {n}** (by {owner}): **{votes}** vote{s}",
                    n = c.number,
                    url = logo_url(config, &c.filename),
                    owner = c.owner,
                    votes = entry.votes,
                    s = plural(entry.votes)
                )
            })
            .collect();
        body.push_str(&table_rows(cells, poll.logos_per_row));
    }

    body.push_str("\n## Invalid Votes\n");
    if report.rejections.is_empty() {
        body.push_str("No invalid votes recorded.\n");
    } else {
        for rejection in &report.rejections {
            body.push_str(&format!("- {}\n", rejection));
        }
    }

    if !report.warnings.is_empty() {
        body.push_str("\n## Processing Warnings\n");
        for warning in &report.warnings {
            body.push_str(&format!("- {}\n", warning));
        }
    }
    body
}
