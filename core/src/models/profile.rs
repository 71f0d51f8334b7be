use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Profile document stored per account in the remote profile store.
pub struct ProfileDocument {
    /// Account identity; also the document id.
    pub uid: String,
    pub email: String,
    /// Full name entered at registration.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "nomeGuerra", default)]
    pub war_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Fields written by a merge; absent fields keep their stored value.
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "nomeGuerra", skip_serializing_if = "Option::is_none")]
    pub war_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Emails are stored and queried in this form, so lookups ignore case.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl ProfilePatch {
    pub fn war_name(war_name: impl Into<String>) -> Self {
        Self {
            war_name: Some(war_name.into()),
            updated_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Names of the fields this patch writes, in document field spelling.
    pub fn field_names(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&ProfileDocument> for ProfilePatch {
    fn from(doc: &ProfileDocument) -> Self {
        Self {
            uid: Some(doc.uid.clone()),
            email: Some(doc.email.clone()),
            name: doc.name.clone(),
            war_name: doc.war_name.clone(),
            role: Some(doc.role),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}
