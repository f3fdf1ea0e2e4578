use crate::error::UploaderError;
use std::path::PathBuf;
use yt_upload::{DEFAULT_CHUNK_SIZE, PrivacyStatus};

/// Resumable chunks must be a multiple of this size
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_CLIENT_SECRETS: &str = "client_secrets.json";
pub const DEFAULT_CATEGORIES: &str = "youtube-categories.json";
pub const DEFAULT_ACCOUNT: &str = "default";
pub const DEFAULT_CATEGORY: &str = "Science & Technology";
pub const DEFAULT_FILENAME_PREFIX: &str = "ouP-";
pub const DEFAULT_TITLE_PREFIX: &str = "COINBASE PRO";
pub const DEFAULT_DESCRIPTION_PREFIX: &str =
    "Data Video for AI Machine Learning Training Bot - COINBASE PRO recording on";
pub const DEFAULT_TAGS: &str = "Coinbase,Coinbase Pro";

/// Deployment settings for one upload run
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderConfig {
    pub client_secrets_path: PathBuf,
    pub categories_path: PathBuf,
    pub token_dir: PathBuf,
    /// Account the OAuth token is cached under
    pub account: String,
    pub category_name: String,
    /// Stripped from the file stem before the date is parsed
    pub filename_prefix: String,
    pub title_prefix: String,
    pub description_prefix: String,
    pub tags: Vec<String>,
    pub privacy: PrivacyStatus,
    pub chunk_size: usize,
    pub api_base: String,
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self, UploaderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UploaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let token_dir = lookup("YT_UPLOADER_TOKEN_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_token_dir(lookup("HOME")));

        let privacy = get("YT_UPLOADER_PRIVACY", PrivacyStatus::Unlisted.as_str())
            .parse::<PrivacyStatus>()
            .map_err(|reason| UploaderError::ConfigLoad {
                path: "YT_UPLOADER_PRIVACY".to_string(),
                reason,
            })?;

        let chunk_size = match lookup("YT_UPLOADER_CHUNK_SIZE") {
            Some(raw) => parse_chunk_size(&raw)?,
            None => DEFAULT_CHUNK_SIZE,
        };

        let tags = get("YT_UPLOADER_TAGS", DEFAULT_TAGS)
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(Self {
            client_secrets_path: PathBuf::from(get(
                "YT_UPLOADER_CLIENT_SECRETS",
                DEFAULT_CLIENT_SECRETS,
            )),
            categories_path: PathBuf::from(get("YT_UPLOADER_CATEGORIES", DEFAULT_CATEGORIES)),
            token_dir,
            account: get("YT_UPLOADER_ACCOUNT", DEFAULT_ACCOUNT),
            category_name: get("YT_UPLOADER_CATEGORY", DEFAULT_CATEGORY),
            filename_prefix: lookup("YT_UPLOADER_FILENAME_PREFIX")
                .unwrap_or_else(|| DEFAULT_FILENAME_PREFIX.to_string()),
            title_prefix: get("YT_UPLOADER_TITLE_PREFIX", DEFAULT_TITLE_PREFIX),
            description_prefix: get("YT_UPLOADER_DESCRIPTION_PREFIX", DEFAULT_DESCRIPTION_PREFIX),
            tags,
            privacy,
            chunk_size,
            api_base: get("REST_API_ADDRESS", DEFAULT_API_BASE),
        })
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            client_secrets_path: PathBuf::from(DEFAULT_CLIENT_SECRETS),
            categories_path: PathBuf::from(DEFAULT_CATEGORIES),
            token_dir: default_token_dir(None),
            account: DEFAULT_ACCOUNT.to_string(),
            category_name: DEFAULT_CATEGORY.to_string(),
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
            description_prefix: DEFAULT_DESCRIPTION_PREFIX.to_string(),
            tags: DEFAULT_TAGS.split(',').map(str::to_string).collect(),
            privacy: PrivacyStatus::Unlisted,
            chunk_size: DEFAULT_CHUNK_SIZE,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

fn default_token_dir(home: Option<String>) -> PathBuf {
    home.map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".yt-video-uploader")
}

fn parse_chunk_size(raw: &str) -> Result<usize, UploaderError> {
    let invalid = |reason: String| UploaderError::ConfigLoad {
        path: "YT_UPLOADER_CHUNK_SIZE".to_string(),
        reason,
    };

    let size = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| invalid(format!("'{}' is not a byte count: {}", raw, e)))?;

    if size == 0 || size % CHUNK_GRANULARITY != 0 {
        return Err(invalid(format!(
            "{} is not a positive multiple of {} bytes",
            size, CHUNK_GRANULARITY
        )));
    }

    Ok(size)
}
