//! Authenticated session value and its explicit update operation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name shown when no better display name can be resolved.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Usuário anônimo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Role stored on the profile document.
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parses a stored role, treating anything unrecognised as a plain user.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrador" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let role = Option::<String>::deserialize(deserializer)?;
        Ok(role.as_deref().map(Role::parse).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub email: String,
    /// Display name held by the auth provider.
    pub display_name: Option<String>,
    /// War-name override from the profile store.
    #[serde(rename = "nomeGuerra")]
    pub war_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Partial change to a [`Session`]; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub display_name: Option<String>,
    pub war_name: Option<String>,
    pub role: Option<Role>,
}

impl Session {
    pub fn apply(&mut self, update: SessionUpdate) -> bool {
        let before = self.clone();
        if let Some(display_name) = update.display_name {
            self.display_name = Some(display_name);
        }
        if let Some(war_name) = update.war_name {
            self.war_name = Some(war_name);
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        *self != before
    }

    /// The override that wins display-name resolution, if any.
    pub fn effective_war_name(&self) -> Option<&str> {
        effective_war_name(self.war_name.as_deref(), &self.email)
    }

    pub fn resolved_display_name(&self) -> String {
        resolve_display_name(
            self.war_name.as_deref(),
            self.display_name.as_deref(),
            Some(&self.email),
        )
    }
}

/// A war name counts only when present, non-empty, and distinct from the email.
pub fn effective_war_name<'a>(war_name: Option<&'a str>, email: &str) -> Option<&'a str> {
    war_name
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case(email.trim()))
}

/// Resolves a display name: war name, else provider name, else email,
/// else [`ANONYMOUS_DISPLAY_NAME`].
pub fn resolve_display_name(
    war_name: Option<&str>,
    name: Option<&str>,
    email: Option<&str>,
) -> String {
    let email_value = email.unwrap_or_default();
    effective_war_name(war_name, email_value)
        .or_else(|| name.map(str::trim).filter(|n| !n.is_empty()))
        .or_else(|| email.map(str::trim).filter(|e| !e.is_empty()))
        .unwrap_or(ANONYMOUS_DISPLAY_NAME)
        .to_string()
}

/// Observable lifecycle of the panel session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.session().map(|session| session.uid.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}
