use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Equipment record as stored by the inventory collection.
pub struct Equipment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

impl Equipment {
    /// Trimmed, non-empty value of an optional field.
    pub fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Audit entry written whenever an equipment record is updated.
pub struct EquipmentHistoryEntry {
    pub equipment_id: String,
    pub changed_by: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub before: Equipment,
    pub after: Equipment,
}
