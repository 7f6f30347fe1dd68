pub mod collector;
pub mod github;
pub mod poll;
pub mod renamer;
pub mod report;
pub mod uploader;

use crate::core::Comment;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use github::GitHubClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    #[serde(default)]
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub html_url: String,
}

/// Title, body and labels for creating or replacing an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Entry of the repository folder that holds the logos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RepoFile {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// Issue threads: poll metadata, the comment feed and publishing.
pub trait IssueTracker {
    fn issue(&self, number: u64) -> Result<Issue>;
    /// All comments in thread order.
    fn issue_comments(&self, number: u64) -> Result<Vec<Comment>>;
    fn create_issue(&self, draft: &IssueDraft) -> Result<Issue>;
    fn update_issue(&self, number: u64, draft: &IssueDraft) -> Result<Issue>;
}

/// The repository folder logos are published from.
pub trait LogoRepository {
    fn list_logos(&self) -> Result<Vec<RepoFile>>;
    fn delete_logo(&self, file: &RepoFile) -> Result<()>;
    fn upload_logo(&self, name: &str, data: &[u8]) -> Result<()>;
}
