mod secrets;
mod store;

pub use secrets::{ClientSecrets, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};
pub use store::TokenStore;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default OAuth callback port
pub const OAUTH_CALLBACK_PORT: u16 = 8080;

/// Scope that allows uploading videos and nothing else
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// OAuth failures
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Failed to load client secrets '{path}': {reason}")]
    ClientSecrets { path: String, reason: String },

    #[error("OAuth token file '{path}': {reason}")]
    TokenFile { path: String, reason: String },

    #[error("OAuth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context} (status {status}): {body}")]
    TokenEndpoint {
        context: &'static str,
        status: u16,
        body: String,
    },

    #[error("Missing {0} in token response")]
    MissingField(&'static str),

    #[error("OAuth callback server failed: {0}")]
    CallbackServer(#[from] std::io::Error),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("OAuth authorization timeout (5 minutes)")]
    Timeout,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// OAuth 2.0 token information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Access token for API requests
    pub access_token: String,
    /// Refresh token for getting new access tokens
    pub refresh_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Expiry time as Unix timestamp (seconds since epoch)
    pub expires_at: u64,
}

impl OAuthToken {
    /// Check if the token is expired or will expire soon (within 60 seconds)
    pub fn is_expired(&self) -> bool {
        now_secs() + 60 >= self.expires_at
    }

    /// Load token from file
    pub fn load_from_file(path: &Path) -> Result<Self, OAuthError> {
        let content = std::fs::read_to_string(path).map_err(|e| OAuthError::TokenFile {
            path: path.display().to_string(),
            reason: format!("failed to read: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| OAuthError::TokenFile {
            path: path.display().to_string(),
            reason: format!("failed to parse: {}", e),
        })
    }

    /// Save token to file with secure permissions
    pub fn save_to_file(&self, path: &Path) -> Result<(), OAuthError> {
        let token_file_error = |reason: String| OAuthError::TokenFile {
            path: path.display().to_string(),
            reason,
        };

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| token_file_error(format!("failed to serialize: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| token_file_error(format!("failed to write: {}", e)))?;

        // Set secure permissions (owner read/write only) on Unix-like systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, permissions)
                .map_err(|e| token_file_error(format!("failed to set permissions: {}", e)))?;
        }

        Ok(())
    }
}

/// OAuth configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI for OAuth callback
    pub redirect_uri: String,
    /// OAuth scope(s)
    pub scope: String,
    pub auth_uri: String,
    pub token_uri: String,
    /// Account the consent screen should preselect
    pub login_hint: Option<String>,
}

impl OAuthConfig {
    /// Create new OAuth configuration with YouTube upload defaults
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri: format!("http://localhost:{}/oauth2callback", OAUTH_CALLBACK_PORT),
            scope: YOUTUBE_UPLOAD_SCOPE.to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            login_hint: None,
        }
    }

    pub fn from_secrets(secrets: &ClientSecrets, scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            auth_uri: secrets.auth_uri.clone(),
            token_uri: secrets.token_uri.clone(),
            ..Self::new(secrets.client_id.clone(), secrets.client_secret.clone())
        }
    }

    pub fn with_login_hint(mut self, account: &str) -> Self {
        self.login_hint = Some(account.to_string());
        self
    }
}

/// Supplies bearer tokens for API calls
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, OAuthError>;
}

/// Installed-app authorization bound to one account, backed by a token cache.
///
/// Client secrets are read on first use, so a missing secrets file only
/// matters once a token is actually needed.
#[derive(Debug, Clone)]
pub struct InstalledAppAuthorizer {
    secrets_path: PathBuf,
    account: String,
    store: TokenStore,
}

impl InstalledAppAuthorizer {
    pub fn new(
        secrets_path: impl Into<PathBuf>,
        account: impl Into<String>,
        store: TokenStore,
    ) -> Self {
        Self {
            secrets_path: secrets_path.into(),
            account: account.into(),
            store,
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for InstalledAppAuthorizer {
    async fn access_token(&self) -> Result<String, OAuthError> {
        let secrets = ClientSecrets::load(&self.secrets_path)?;
        let config = OAuthConfig::from_secrets(&secrets, YOUTUBE_UPLOAD_SCOPE).with_login_hint(&self.account);

        let token = authorize(&config, &self.store, &self.account).await?;
        Ok(token.access_token)
    }
}

/// Return a valid token for `account`: cached, refreshed, or freshly authorized.
pub async fn authorize(
    config: &OAuthConfig,
    store: &TokenStore,
    account: &str,
) -> Result<OAuthToken, OAuthError> {
    if let Some(token) = store.load(account)? {
        if !token.is_expired() {
            tracing::debug!(account, "Using cached OAuth token");
            return Ok(token);
        }

        tracing::info!(account, "Access token expired, refreshing...");
        match refresh_access_token(config, &token).await {
            Ok(refreshed) => {
                store.save(account, &refreshed)?;
                return Ok(refreshed);
            }
            Err(e) => {
                tracing::warn!(account, error = %e, "Token refresh failed, authorizing again");
            }
        }
    }

    let token = start_auth_flow(config).await?;
    store.save(account, &token)?;
    tracing::info!(account, path = %store.path_for(account).display(), "OAuth token saved");

    Ok(token)
}

async fn post_token_form(
    config: &OAuthConfig,
    params: &[(&str, &str)],
    context: &'static str,
) -> Result<serde_json::Value, OAuthError> {
    let client = reqwest::Client::new();
    let response = client.post(&config.token_uri).form(params).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await?;
        return Err(OAuthError::TokenEndpoint {
            context,
            status,
            body,
        });
    }

    Ok(response.json().await?)
}

fn token_type_of(response: &serde_json::Value) -> String {
    response
        .get("token_type")
        .and_then(|v| v.as_str())
        .unwrap_or("Bearer")
        .to_string()
}

/// Refresh the access token using the refresh token
pub async fn refresh_access_token(
    config: &OAuthConfig,
    current: &OAuthToken,
) -> Result<OAuthToken, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", current.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let refresh_response =
        post_token_form(config, &params, "Failed to refresh OAuth token").await?;

    let access_token = refresh_response
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or(OAuthError::MissingField("access_token"))?
        .to_string();

    let expires_in = refresh_response
        .get("expires_in")
        .and_then(|v| v.as_u64())
        .ok_or(OAuthError::MissingField("expires_in"))?;

    // Google only rotates the refresh token occasionally
    let refresh_token = refresh_response
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .unwrap_or(current.refresh_token.as_str())
        .to_string();

    tracing::info!("OAuth token refreshed successfully");

    Ok(OAuthToken {
        access_token,
        refresh_token,
        token_type: token_type_of(&refresh_response),
        expires_at: now_secs() + expires_in,
    })
}

/// Generate PKCE verifier and challenge
pub fn generate_pkce() -> (String, String) {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use rand::Rng;
    use rand::distributions::Alphanumeric;
    use sha2::{Digest, Sha256};

    let verifier: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();

    // base64url(SHA256(verifier))
    let hash = Sha256::digest(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hash);

    (verifier, challenge)
}

/// Generate authorization URL, returned with the PKCE verifier
pub fn generate_auth_url(config: &OAuthConfig) -> (String, String) {
    let (verifier, challenge) = generate_pkce();

    let mut auth_url = format!(
        "{}?\
        client_id={}&\
        redirect_uri={}&\
        response_type=code&\
        scope={}&\
        code_challenge={}&\
        code_challenge_method=S256&\
        access_type=offline&\
        prompt=consent",
        config.auth_uri,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope),
        urlencoding::encode(&challenge),
    );

    if let Some(hint) = &config.login_hint {
        auth_url.push_str(&format!("&login_hint={}", urlencoding::encode(hint)));
    }

    (auth_url, verifier)
}

/// Exchange authorization code for tokens
pub async fn exchange_code(
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<OAuthToken, OAuthError> {
    tracing::info!("Exchanging authorization code for tokens...");

    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("code_verifier", verifier),
        ("grant_type", "authorization_code"),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    let token_response =
        post_token_form(config, &params, "Failed to exchange authorization code").await?;

    let access_token = token_response
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or(OAuthError::MissingField("access_token"))?
        .to_string();

    let refresh_token = token_response
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .ok_or(OAuthError::MissingField("refresh_token"))?
        .to_string();

    let expires_in = token_response
        .get("expires_in")
        .and_then(|v| v.as_u64())
        .ok_or(OAuthError::MissingField("expires_in"))?;

    tracing::info!("Successfully obtained OAuth tokens");

    Ok(OAuthToken {
        access_token,
        refresh_token,
        token_type: token_type_of(&token_response),
        expires_at: now_secs() + expires_in,
    })
}

/// Start OAuth flow with local callback server
pub async fn start_auth_flow(config: &OAuthConfig) -> Result<OAuthToken, OAuthError> {
    use axum::{
        Router,
        extract::Query,
        response::{Html, IntoResponse},
        routing::get,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;

    let (auth_url, verifier) = generate_auth_url(config);

    eprintln!("\n=================================================");
    eprintln!("OAuth 2.0 Authorization Required");
    eprintln!("=================================================");
    eprintln!("\nPlease visit the following URL to authorize uploads:\n");
    eprintln!("{}\n", auth_url);
    eprintln!("Waiting for authorization...");
    eprintln!("=================================================\n");

    // Ok(code) or Err(error reported by the consent screen)
    let outcome = Arc::new(Mutex::new(None::<Result<String, String>>));
    let outcome_clone = outcome.clone();

    #[derive(Deserialize)]
    struct AuthCallback {
        code: Option<String>,
        error: Option<String>,
    }

    let callback_handler = move |Query(params): Query<AuthCallback>| async move {
        if let Some(error) = params.error {
            let page = format!(
                "<html><body><h1>Authorization Failed</h1><p>Error: {}</p>\
                <p>You can close this window.</p></body></html>",
                error
            );
            *outcome_clone.lock().await = Some(Err(error));
            return Html(page).into_response();
        }

        if let Some(code) = params.code {
            *outcome_clone.lock().await = Some(Ok(code));
            return Html(
                "<html><body><h1>Authorization Successful!</h1>\
                <p>You can close this window and return to the uploader.</p></body></html>",
            )
            .into_response();
        }

        Html("<html><body><h1>Authorization Failed</h1><p>No code received</p></body></html>")
            .into_response()
    };

    let app = Router::new().route("/oauth2callback", get(callback_handler));

    let listener =
        tokio::net::TcpListener::bind(format!("127.0.0.1:{}", OAUTH_CALLBACK_PORT)).await?;
    let server = axum::serve(listener, app);

    let server_handle = tokio::spawn(async move {
        server.await.ok();
    });

    let timeout = tokio::time::Duration::from_secs(300);
    let start = tokio::time::Instant::now();

    let result = loop {
        if start.elapsed() > timeout {
            break Err(OAuthError::Timeout);
        }

        let received = outcome.lock().await.clone();
        match received {
            Some(Ok(code)) => break Ok(code),
            Some(Err(error)) => break Err(OAuthError::AuthorizationDenied(error)),
            None => tokio::time::sleep(tokio::time::Duration::from_millis(500)).await,
        }
    };

    server_handle.abort();

    let code = result?;
    exchange_code(config, &code, &verifier).await
}
