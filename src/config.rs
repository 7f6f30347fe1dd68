use crate::error::{PollError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "logopoll.toml";

/// Everything a run needs to know, loaded from TOML. Missing sections and
/// keys fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PollConfig {
    pub repository: RepositoryConfig,
    pub poll: PollSettings,
    pub images: ImageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub owner: String,
    pub name: String,
    /// Folder in the repository that holds the published logos.
    pub logos_dir: String,
    pub branch: String,
    pub api_url: String,
    /// Where rendered issues link images from. Derived from the repository
    /// when unset.
    pub raw_base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub poll_issue: Option<u64>,
    pub results_issue: Option<u64>,
    /// Issue where logos were submitted as comments.
    pub submissions_issue: Option<u64>,
    pub title: String,
    pub results_title: String,
    pub deadline: Option<String>,
    pub max_votes_per_user: usize,
    pub auto_number: bool,
    pub logos_per_row: usize,
    pub max_rejection_log_entry_length: usize,
    pub preserve_title_on_update: bool,
    pub create_on_not_found: bool,
    /// Resolve voter accounts in parallel before tallying.
    pub prefetch_accounts: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Maximum Hamming distance between two fingerprints still counted as
    /// the same logo. Zero means exact match.
    pub hash_threshold: u32,
    /// Side of the square canvas logos are resized or rasterized to.
    pub canvas_size: u32,
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            name: String::new(),
            logos_dir: "logos".to_string(),
            branch: "main".to_string(),
            api_url: "https://api.github.com".to_string(),
            raw_base_url: None,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_issue: None,
            results_issue: None,
            submissions_issue: None,
            title: "Logo Poll".to_string(),
            results_title: "Logo Poll Results".to_string(),
            deadline: None,
            max_votes_per_user: 3,
            auto_number: true,
            logos_per_row: 3,
            max_rejection_log_entry_length: 15,
            preserve_title_on_update: true,
            create_on_not_found: true,
            prefetch_accounts: true,
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            hash_threshold: 0,
            canvas_size: 100,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RepositoryConfig {
    /// `https://raw.githubusercontent.com/<owner>/<name>/<branch>/<logos_dir>` unless overridden.
    pub fn raw_base_url(&self) -> String {
        match &self.raw_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://raw.githubusercontent.com/{}/{}/{}/{}",
                self.owner, self.name, self.branch, self.logos_dir
            ),
        }
    }

    pub fn issue_url(&self, number: u64) -> String {
        format!("https://github.com/{}/{}/issues/{}", self.owner, self.name, number)
    }
}

impl ImageSettings {
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

impl PollConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PollConfig =
            toml::from_str(text).map_err(|e| PollError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| PollError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load from `explicit`, else `./logopoll.toml`, else the per-user config
    /// directory, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for candidate in Self::search_paths() {
            if candidate.is_file() {
                log::debug!("Loading configuration from {}", candidate.display());
                return Self::from_file(&candidate);
            }
        }
        log::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("logopoll").join("config.toml"));
        }
        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll.max_votes_per_user == 0 {
            return Err(PollError::Config(
                "poll.max_votes_per_user must be at least 1".to_string(),
            ));
        }
        if self.poll.logos_per_row == 0 {
            return Err(PollError::Config(
                "poll.logos_per_row must be at least 1".to_string(),
            ));
        }
        if self.images.canvas_size == 0 {
            return Err(PollError::Config(
                "images.canvas_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Extra checks for commands that talk to GitHub.
    pub fn validate_remote(&self) -> Result<()> {
        self.validate()?;
        if self.repository.owner.trim().is_empty() || self.repository.name.trim().is_empty() {
            return Err(PollError::Config(
                "repository.owner and repository.name are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_poll_conventions() {
        let config = PollConfig::default();
        assert_eq!(config.poll.max_votes_per_user, 3);
        assert_eq!(config.poll.logos_per_row, 3);
        assert!(config.poll.auto_number);
        assert_eq!(config.images.hash_threshold, 0);
        assert_eq!(config.poll.max_rejection_log_entry_length, 15);
        assert_eq!(config.repository.logos_dir, "logos");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PollConfig::from_toml_str(
            r#"
            [repository]
            owner = "xlibre"
            name = "logo-poll"

            [poll]
            poll_issue = 63
            max_votes_per_user = 2
            auto_number = false
            "#,
        )
        .unwrap();

        assert_eq!(config.repository.owner, "xlibre");
        assert_eq!(config.repository.branch, "main");
        assert_eq!(config.poll.poll_issue, Some(63));
        assert_eq!(config.poll.max_votes_per_user, 2);
        assert!(!config.poll.auto_number);
        assert_eq!(config.poll.logos_per_row, 3);
        assert!(config.validate_remote().is_ok());
    }

    #[test]
    fn test_prefetch_accounts_can_be_disabled() {
        assert!(PollConfig::default().poll.prefetch_accounts);
        let config = PollConfig::from_toml_str("[poll]\nprefetch_accounts = false\n").unwrap();
        assert!(!config.poll.prefetch_accounts);
    }

    #[test]
    fn test_zero_vote_cap_is_rejected() {
        let result = PollConfig::from_toml_str("[poll]\nmax_votes_per_user = 0\n");
        assert!(matches!(result, Err(PollError::Config(_))));
    }

    #[test]
    fn test_remote_validation_requires_repository() {
        let config = PollConfig::default();
        assert!(config.validate().is_ok());
        assert!(matches!(config.validate_remote(), Err(PollError::Config(_))));
    }

    #[test]
    fn test_raw_base_url_derivation() {
        let mut repo = RepositoryConfig {
            owner: "fred".to_string(),
            name: "test".to_string(),
            ..RepositoryConfig::default()
        };
        assert_eq!(
            repo.raw_base_url(),
            "https://raw.githubusercontent.com/fred/test/main/logos"
        );

        repo.raw_base_url = Some("https://cdn.example.org/logos/".to_string());
        assert_eq!(repo.raw_base_url(), "https://cdn.example.org/logos");
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let images = ImageSettings::default();
        assert!(images.is_allowed_extension("PNG"));
        assert!(images.is_allowed_extension(".svg"));
        assert!(!images.is_allowed_extension("txt"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("poll.toml");
        fs::write(&path, "[images]\nhash_threshold = 4\n").unwrap();

        let config = PollConfig::load(Some(&path)).unwrap();
        assert_eq!(config.images.hash_threshold, 4);
    }
}
