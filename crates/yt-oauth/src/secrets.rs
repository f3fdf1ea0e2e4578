use crate::OAuthError;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth client credentials as downloaded from the Google Cloud console
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Console downloads wrap the credentials in an `installed` or `web` section
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self, OAuthError> {
        let content = std::fs::read_to_string(path).map_err(|e| OAuthError::ClientSecrets {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_json(&content).map_err(|reason| OAuthError::ClientSecrets {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;

        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an 'installed' or 'web' section".to_string())
    }
}
