use crate::{OAuthError, OAuthToken};
use std::path::PathBuf;

/// Token cache directory holding one JSON file per account
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_account(account)))
    }

    /// Load the cached token for `account`, or `None` if nothing is cached yet
    pub fn load(&self, account: &str) -> Result<Option<OAuthToken>, OAuthError> {
        let path = self.path_for(account);
        if !path.exists() {
            return Ok(None);
        }
        OAuthToken::load_from_file(&path).map(Some)
    }

    pub fn save(&self, account: &str, token: &OAuthToken) -> Result<(), OAuthError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| OAuthError::TokenFile {
            path: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;
        token.save_to_file(&self.path_for(account))
    }
}

/// Keep account ids (usually e-mail addresses) safe as file names
fn sanitize_account(account: &str) -> String {
    let name: String = account
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.trim_matches('.').is_empty() {
        "default".to_string()
    } else {
        name
    }
}
