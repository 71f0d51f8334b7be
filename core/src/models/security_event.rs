use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    LoginSuccess,
    LoginFailure,
    RateLimitExceeded,
    SuspiciousInput,
    RegisterSuccess,
    RegisterFailure,
    Logout,
    PasswordChanged,
    PasswordChangeFailure,
    DisplayNameUpdated,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::LoginSuccess => "login_success",
            SecurityEventKind::LoginFailure => "login_failure",
            SecurityEventKind::RateLimitExceeded => "rate_limit_exceeded",
            SecurityEventKind::SuspiciousInput => "suspicious_input",
            SecurityEventKind::RegisterSuccess => "register_success",
            SecurityEventKind::RegisterFailure => "register_failure",
            SecurityEventKind::Logout => "logout",
            SecurityEventKind::PasswordChanged => "password_changed",
            SecurityEventKind::PasswordChangeFailure => "password_change_failure",
            SecurityEventKind::DisplayNameUpdated => "display_name_updated",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SecurityEventKind::LoginFailure
                | SecurityEventKind::RateLimitExceeded
                | SecurityEventKind::SuspiciousInput
                | SecurityEventKind::RegisterFailure
                | SecurityEventKind::PasswordChangeFailure
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Immutable entry of the security event log.
pub struct SecurityEvent {
    pub id: String,
    pub kind: SecurityEventKind,
    /// Email or uid the event concerns, when known.
    pub identity: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub payload: Option<Value>,
}
