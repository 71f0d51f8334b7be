//! Session lifecycle of the admin panel.

pub mod refresh;
pub mod service;

pub use refresh::{DisplayNameRefresher, RefreshHandle};
pub use service::{SessionManager, SessionSettings};
