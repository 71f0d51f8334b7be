//! Contracts of the remote collaborators and their REST adapters.

pub mod firestore;
pub mod identity_toolkit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ProviderError, StoreError};
use crate::models::{Equipment, ProfileDocument, ProfilePatch};

pub use firestore::FirestoreClient;
pub use identity_toolkit::IdentityToolkitAuth;

/// Account as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Remote authentication provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError>;

    async fn create_account(&self, email: &str, password: &str)
        -> Result<AuthUser, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// User currently signed in with the provider, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// Stream of auth-state changes.
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;

    async fn update_display_name(&self, display_name: &str) -> Result<(), ProviderError>;

    async fn update_password(&self, new_password: &str) -> Result<(), ProviderError>;

    /// Re-presents the credential of the signed-in user.
    async fn reauthenticate(&self, email: &str, password: &str) -> Result<(), ProviderError>;
}

/// Remote store of profile documents, keyed by account uid.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, uid: &str) -> Result<Option<ProfileDocument>, StoreError>;

    /// Creates or merges the document for `uid`.
    async fn merge(&self, uid: &str, patch: &ProfilePatch) -> Result<(), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Vec<ProfileDocument>, StoreError>;

    /// Applies `patch` to every listed document; returns how many were updated.
    async fn update_many(&self, uids: &[String], patch: &ProfilePatch)
        -> Result<usize, StoreError>;
}

/// Equipment CRUD collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Equipment>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Equipment>, StoreError>;

    async fn create(&self, equipment: &Equipment) -> Result<Equipment, StoreError>;

    /// Updates the record and appends a history entry attributed to `changed_by`.
    async fn update(
        &self,
        equipment: &Equipment,
        changed_by: Option<String>,
    ) -> Result<Equipment, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
