use crate::config::RepositoryConfig;
use crate::core::{AccountLookup, Comment};
use crate::error::{PollError, Result};
use crate::services::{Issue, IssueDraft, IssueTracker, LogoRepository, RepoFile};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

const PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiUserRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    user: Option<ApiUserRef>,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ApiComment> for Comment {
    fn from(c: ApiComment) -> Self {
        Comment {
            author: c.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
            body: c.body.unwrap_or_default(),
            created_at: c.created_at,
        }
    }
}

/// Blocking client for the GitHub REST API, scoped to one repository.
pub struct GitHubClient {
    http: Client,
    api_url: String,
    owner: String,
    name: String,
    logos_dir: String,
    branch: String,
}

impl GitHubClient {
    pub fn new(repo: &RepositoryConfig, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("logopoll"));
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("token {}", token))
                .map_err(|e| PollError::Config(format!("invalid GitHub token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_url: repo.api_url.trim_end_matches('/').to_string(),
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            logos_dir: repo.logos_dir.trim_matches('/').to_string(),
            branch: repo.branch.clone(),
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.name, suffix)
    }

    /// Turn non-2xx responses into `PollError::Api` carrying GitHub's message.
    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiMessage>()
            .map(|m| m.message)
            .unwrap_or_default();
        Err(PollError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = Self::check(request.send()?)?;
        Ok(response.json()?)
    }
}

impl IssueTracker for GitHubClient {
    fn issue(&self, number: u64) -> Result<Issue> {
        Self::send_json(self.http.get(self.repo_url(&format!("issues/{}", number))))
    }

    fn issue_comments(&self, number: u64) -> Result<Vec<Comment>> {
        let url = self.repo_url(&format!("issues/{}/comments", number));
        let mut comments = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<ApiComment> = Self::send_json(self.http.get(&url).query(&[
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ]))?;
            if batch.is_empty() {
                break;
            }
            comments.extend(batch.into_iter().map(Comment::from));
            page += 1;
        }
        log::info!("Fetched {} comments from issue #{}", comments.len(), number);
        Ok(comments)
    }

    fn create_issue(&self, draft: &IssueDraft) -> Result<Issue> {
        Self::send_json(self.http.post(self.repo_url("issues")).json(draft))
    }

    fn update_issue(&self, number: u64, draft: &IssueDraft) -> Result<Issue> {
        Self::send_json(
            self.http
                .patch(self.repo_url(&format!("issues/{}", number)))
                .json(draft),
        )
    }
}

impl LogoRepository for GitHubClient {
    fn list_logos(&self) -> Result<Vec<RepoFile>> {
        let files: Vec<RepoFile> = Self::send_json(
            self.http
                .get(self.repo_url(&format!("contents/{}", self.logos_dir)))
                .query(&[("ref", self.branch.as_str())]),
        )?;
        log::info!("Fetched {} entries from /{}", files.len(), self.logos_dir);
        Ok(files)
    }

    fn delete_logo(&self, file: &RepoFile) -> Result<()> {
        let request = self
            .http
            .delete(self.repo_url(&format!("contents/{}", file.path)))
            .json(&json!({
                "message": format!("Delete {} for logo refresh", file.path),
                "sha": file.sha,
                "branch": self.branch,
            }));
        Self::check(request.send()?)?;
        log::info!("Deleted {}", file.path);
        Ok(())
    }

    fn upload_logo(&self, name: &str, data: &[u8]) -> Result<()> {
        let request = self
            .http
            .put(self.repo_url(&format!("contents/{}/{}", self.logos_dir, name)))
            .json(&json!({
                "message": format!("Upload logo {}", name),
                "content": STANDARD.encode(data),
                "branch": self.branch,
            }));
        Self::check(request.send()?)?;
        log::info!("Uploaded {}", name);
        Ok(())
    }
}

impl AccountLookup for GitHubClient {
    fn account_created_at(&self, login: &str) -> Result<DateTime<Utc>> {
        let user: ApiUser =
            Self::send_json(self.http.get(format!("{}/users/{}", self.api_url, login)))?;
        Ok(user.created_at)
    }
}
