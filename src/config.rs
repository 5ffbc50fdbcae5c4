//! Settings parser for the grid's TOML configuration file.
//!
//! The file is optional: a missing or empty file yields `Settings::default()`.
//! Unknown keys are accepted but logged, since they are usually typos of the
//! real setting names.
use crate::topic::Category;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Settings
// ============================================================================

/// Grid settings supplied by the host.
///
/// Every key is optional; absent keys take the documented defaults.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Comma-separated category slugs or numeric ids that show the grid.
    pub following_grid_category: String,

    /// Vote button label when the user has not voted.
    pub vote_label: String,

    /// Vote button label when the user has voted.
    pub unvote_label: String,

    /// Category name used for topics without a category.
    pub default_category_label: String,

    /// Page origin used to absolutize thumbnail URLs.
    pub origin: String,

    /// API key for authenticated remote calls. Masked in Debug output.
    pub api_key: Option<String>,

    /// Username the API key acts as.
    pub api_username: Option<String>,

    /// Per-request timeout for remote calls.
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            following_grid_category: "following".to_string(),
            vote_label: "Follow".to_string(),
            unvote_label: "Unfollow".to_string(),
            default_category_label: "General".to_string(),
            origin: "http://localhost:3000".to_string(),
            api_key: None,
            api_username: None,
            request_timeout_secs: 20,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("following_grid_category", &self.following_grid_category)
            .field("vote_label", &self.vote_label)
            .field("unvote_label", &self.unvote_label)
            .field("default_category_label", &self.default_category_label)
            .field("origin", &self.origin)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_username", &self.api_username)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Settings {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "following_grid_category",
        "vote_label",
        "unvote_label",
        "default_category_label",
        "origin",
        "api_key",
        "api_username",
        "request_timeout_secs",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(content)?;
        tracing::info!(
            origin = %settings.origin,
            targets = %settings.following_grid_category,
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Category targets from `following_grid_category`, trimmed, empties dropped.
    ///
    /// An empty setting falls back to the default target.
    pub fn category_targets(&self) -> Vec<String> {
        let targets: Vec<String> = self
            .following_grid_category
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();
        if targets.is_empty() {
            vec!["following".to_string()]
        } else {
            targets
        }
    }

    /// Whether `category` is one of the configured targets, by slug or numeric id.
    pub fn matches_category(&self, category: &Category) -> bool {
        let id = category.id.to_string();
        self.category_targets()
            .iter()
            .any(|t| t == &category.slug || t == &id)
    }

    /// Vote button label for the given voted state.
    pub fn vote_button_label(&self, voted: bool) -> &str {
        if voted {
            &self.unvote_label
        } else {
            &self.vote_label
        }
    }

    pub fn api_key_secret(&self) -> Option<SecretString> {
        self.api_key.clone().map(SecretString::from)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
