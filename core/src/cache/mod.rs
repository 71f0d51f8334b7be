//! Local persisted snapshots of the session and the equipment list.
//!
//! Writes are opportunistic and reads tolerate stale, absent, or corrupt
//! entries: a value that cannot be decoded is reported as absent.

pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;
use crate::models::{Equipment, Session};

pub use file::JsonFileCache;
pub use memory::MemoryCache;

pub const SESSION_KEY: &str = "currentUser";
pub const EQUIPMENT_KEY: &str = "equipmentSnapshot";

/// Raw key/value storage of serialized snapshots.
pub trait LocalCache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Typed, best-effort helpers over a [`LocalCache`].
pub trait SnapshotCache {
    fn load_session(&self) -> Option<Session>;
    fn store_session(&self, session: &Session);
    fn clear_session(&self);
    fn load_equipment(&self) -> Option<Vec<Equipment>>;
    fn store_equipment(&self, records: &[Equipment]);
}

impl<C: LocalCache + ?Sized> SnapshotCache for C {
    fn load_session(&self) -> Option<Session> {
        load(self, SESSION_KEY)
    }

    fn store_session(&self, session: &Session) {
        store(self, SESSION_KEY, session);
    }

    fn clear_session(&self) {
        discard(self, SESSION_KEY);
    }

    fn load_equipment(&self) -> Option<Vec<Equipment>> {
        load(self, EQUIPMENT_KEY)
    }

    fn store_equipment(&self, records: &[Equipment]) {
        store(self, EQUIPMENT_KEY, records);
    }
}

fn load<C, T>(cache: &C, key: &str) -> Option<T>
where
    C: LocalCache + ?Sized,
    T: DeserializeOwned,
{
    let raw = match cache.read(key) {
        Ok(raw) => raw?,
        Err(err) => {
            tracing::warn!(key, error = %err, "Failed to read local cache");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "Discarding corrupt cache entry");
            None
        }
    }
}

fn store<C, T>(cache: &C, key: &str, value: &T)
where
    C: LocalCache + ?Sized,
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(CacheError::from)
        .and_then(|raw| cache.write(key, &raw));
    if let Err(err) = result {
        tracing::warn!(key, error = %err, "Failed to write local cache");
    }
}

fn discard<C: LocalCache + ?Sized>(cache: &C, key: &str) {
    if let Err(err) = cache.remove(key) {
        tracing::warn!(key, error = %err, "Failed to clear local cache");
    }
}
