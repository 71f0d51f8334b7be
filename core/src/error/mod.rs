use thiserror::Error;

/// Errors surfaced by the session manager to the panel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("{message}")]
    RateLimited { wait_ms: u64, message: String },
    #[error("Password does not meet the requirements: {}", .0.join(", "))]
    WeakPassword(Vec<String>),
    #[error("The provider rejected the new password as too weak")]
    WeakPasswordRejected,
    #[error("Wrong password")]
    WrongPassword,
    #[error("Authentication failed ({code})")]
    AuthFailure { code: String },
    #[error("No user profile found for {0}")]
    UserNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),
}

impl AuthError {
    /// Short machine-readable code, used as the `error_code` of security events.
    pub fn code(&self) -> &str {
        match self {
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::WeakPasswordRejected => "weak_password_rejected",
            AuthError::WrongPassword => "wrong_password",
            AuthError::AuthFailure { code } => code,
            AuthError::UserNotFound(_) => "user_not_found",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::RemoteUnavailable(_) => "remote_unavailable",
        }
    }

    pub fn no_session() -> Self {
        AuthError::AuthFailure {
            code: "no-current-user".to_string(),
        }
    }
}

/// Failure reported by the remote auth provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rejected request: {code}")]
    Rejected { code: String, message: String },
    #[error("provider transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn rejected(code: impl Into<String>) -> Self {
        let code = code.into();
        ProviderError::Rejected {
            message: code.clone(),
            code,
        }
    }

    /// Provider error code, or `network` for transport failures.
    pub fn code(&self) -> &str {
        match self {
            ProviderError::Rejected { code, .. } => code,
            ProviderError::Transport(_) => "network",
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport(msg) => AuthError::RemoteUnavailable(msg),
            ProviderError::Rejected { code, .. } => classify_provider_code(&code),
        }
    }
}

/// Maps provider error codes onto the user-facing categories.
///
/// Both the SDK style (`auth/wrong-password`) and the REST style
/// (`INVALID_PASSWORD`, `WEAK_PASSWORD : ...`) spellings are accepted.
pub fn classify_provider_code(code: &str) -> AuthError {
    let normalized = code
        .trim()
        .trim_start_matches("auth/")
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .replace('_', "-");

    match normalized.as_str() {
        "wrong-password" | "invalid-password" | "invalid-credential"
        | "invalid-login-credentials" => AuthError::WrongPassword,
        "weak-password" => AuthError::WeakPasswordRejected,
        "user-not-found" | "email-not-found" => AuthError::AuthFailure {
            code: "user-not-found".to_string(),
        },
        "network-request-failed" | "unavailable" => {
            AuthError::RemoteUnavailable(code.to_string())
        }
        _ => AuthError::AuthFailure {
            code: normalized,
        },
    }
}

/// Failure reported by the remote profile/document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AuthError::UserNotFound(id),
            other => AuthError::RemoteUnavailable(other.to_string()),
        }
    }
}

/// Failure of the local persisted cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_sdk_and_rest_spellings() {
        assert_eq!(
            classify_provider_code("auth/wrong-password"),
            AuthError::WrongPassword
        );
        assert_eq!(
            classify_provider_code("INVALID_PASSWORD"),
            AuthError::WrongPassword
        );
        assert_eq!(
            classify_provider_code("INVALID_LOGIN_CREDENTIALS"),
            AuthError::WrongPassword
        );
        assert_eq!(
            classify_provider_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPasswordRejected
        );
        assert_eq!(
            classify_provider_code("auth/weak-password"),
            AuthError::WeakPasswordRejected
        );
    }

    #[test]
    fn classify_falls_back_to_generic_failure() {
        assert_eq!(
            classify_provider_code("TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::AuthFailure {
                code: "too-many-attempts-try-later".to_string()
            }
        );
        assert!(matches!(
            classify_provider_code("auth/network-request-failed"),
            AuthError::RemoteUnavailable(_)
        ));
    }

    #[test]
    fn provider_transport_maps_to_remote_unavailable() {
        let err: AuthError = ProviderError::Transport("timeout".into()).into();
        assert_eq!(err, AuthError::RemoteUnavailable("timeout".into()));
    }

    #[test]
    fn weak_password_message_lists_violations() {
        let err = AuthError::WeakPassword(vec!["a".into(), "b".into()]);
        assert_eq!(
            err.to_string(),
            "Password does not meet the requirements: a, b"
        );
        assert_eq!(err.code(), "weak_password");
    }
}
