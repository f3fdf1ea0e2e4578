use yt_oauth::OAuthError;
use yt_upload::UploadError;

/// Every way an upload run can fail. All of them end the run with a non-zero exit.
#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("{0}")]
    Usage(String),

    #[error("Failed to access '{path}': {source}")]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("Cannot read a recording date from '{input}': {reason}")]
    DateParse { input: String, reason: String },

    #[error("Category '{0}' is not in the category catalog")]
    CategoryNotFound(String),

    #[error("Authorization failed: {0}")]
    Auth(OAuthError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl UploaderError {
    /// Lines to print for this error, one per underlying cause
    pub fn causes(&self) -> Vec<String> {
        match self {
            UploaderError::Upload(e) => e.causes().to_vec(),
            other => vec![other.to_string()],
        }
    }
}

impl From<OAuthError> for UploaderError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::ClientSecrets { path, reason } => UploaderError::ConfigLoad { path, reason },
            other => UploaderError::Auth(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_secret_failures_are_config_errors() {
        let err: UploaderError = OAuthError::ClientSecrets {
            path: "client_secrets.json".to_string(),
            reason: "No such file or directory".to_string(),
        }
        .into();

        assert!(matches!(err, UploaderError::ConfigLoad { .. }));
        assert!(err.to_string().contains("client_secrets.json"));
    }

    #[test]
    fn other_oauth_failures_are_auth_errors() {
        let err: UploaderError = OAuthError::Timeout.into();
        assert!(matches!(err, UploaderError::Auth(OAuthError::Timeout)));
    }

    #[test]
    fn upload_errors_expand_into_each_cause() {
        let err: UploaderError =
            UploadError::from_causes(vec!["503 once".to_string(), "503 twice".to_string()]).into();
        assert_eq!(err.causes(), vec!["503 once".to_string(), "503 twice".to_string()]);

        let single = UploaderError::CategoryNotFound("Gaming".to_string());
        assert_eq!(single.causes().len(), 1);
    }
}
