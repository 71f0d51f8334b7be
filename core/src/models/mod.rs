pub mod auth;
pub mod equipment;
pub mod profile;
pub mod security_event;
pub mod session;

pub use auth::{ChangePasswordRequest, RegisterRequest};
pub use equipment::{Equipment, EquipmentHistoryEntry};
pub use profile::{normalize_email, ProfileDocument, ProfilePatch};
pub use security_event::{SecurityEvent, SecurityEventKind};
pub use session::{Role, Session, SessionState, SessionUpdate, ANONYMOUS_DISPLAY_NAME};
