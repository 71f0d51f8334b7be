#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use inventory_core::{
    auth::{SessionManager, SessionSettings},
    cache::MemoryCache,
    error::{ProviderError, StoreError},
    models::{normalize_email, ProfileDocument, ProfilePatch, Role},
    remote::{AuthProvider, AuthUser, ProfileStore},
};

/// Account table standing in for the remote auth provider.
pub struct FakeAuthProvider {
    accounts: Mutex<HashMap<String, (String, AuthUser)>>,
    state: watch::Sender<Option<AuthUser>>,
    sign_in_calls: AtomicUsize,
    fail_sign_out: bool,
}

impl FakeAuthProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
            sign_in_calls: AtomicUsize::new(0),
            fail_sign_out: false,
        }
    }

    pub fn failing_sign_out() -> Self {
        Self {
            fail_sign_out: true,
            ..Self::new()
        }
    }

    pub fn with_account(self, uid: &str, email: &str, password: &str) -> Self {
        let user = AuthUser {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: None,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_lowercase(), (password.to_string(), user));
        self
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    /// Simulates the provider dropping the session on its own.
    pub fn expire_session(&self) {
        self.state.send_replace(None);
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock().unwrap();
        let (stored, user) = accounts
            .get(&email.to_lowercase())
            .ok_or_else(|| ProviderError::rejected("EMAIL_NOT_FOUND"))?;
        if stored != password {
            return Err(ProviderError::rejected("INVALID_PASSWORD"));
        }
        let user = user.clone();
        drop(accounts);
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&email.to_lowercase()) {
            return Err(ProviderError::rejected("EMAIL_EXISTS"));
        }
        let user = AuthUser {
            uid: format!("uid-{}", accounts.len() + 1),
            email: email.to_string(),
            display_name: None,
        };
        accounts.insert(email.to_lowercase(), (password.to_string(), user.clone()));
        drop(accounts);
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.state.send_replace(None);
        if self.fail_sign_out {
            return Err(ProviderError::Transport("connection reset".into()));
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }

    async fn update_display_name(&self, display_name: &str) -> Result<(), ProviderError> {
        let current = self.current_user().ok_or_else(|| ProviderError::rejected("USER_DISABLED"))?;
        let mut accounts = self.accounts.lock().unwrap();
        if let Some((_, user)) = accounts.get_mut(&current.email.to_lowercase()) {
            user.display_name = Some(display_name.to_string());
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), ProviderError> {
        let current = self.current_user().ok_or_else(|| ProviderError::rejected("USER_DISABLED"))?;
        let mut accounts = self.accounts.lock().unwrap();
        if let Some((password, _)) = accounts.get_mut(&current.email.to_lowercase()) {
            *password = new_password.to_string();
        }
        Ok(())
    }

    async fn reauthenticate(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&email.to_lowercase()) {
            Some((stored, _)) if stored == password => Ok(()),
            Some(_) => Err(ProviderError::rejected("INVALID_PASSWORD")),
            None => Err(ProviderError::rejected("EMAIL_NOT_FOUND")),
        }
    }
}

/// In-memory profile collection.
#[derive(Default)]
pub struct FakeProfileStore {
    documents: Mutex<HashMap<String, ProfileDocument>>,
    offline: bool,
}

impl FakeProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn with_profile(self, uid: &str, email: &str, war_name: Option<&str>, role: Role) -> Self {
        self.documents.lock().unwrap().insert(
            uid.to_string(),
            ProfileDocument {
                uid: uid.to_string(),
                email: email.to_string(),
                name: None,
                war_name: war_name.map(str::to_string),
                role,
                created_at: None,
                updated_at: None,
            },
        );
        self
    }

    pub fn document(&self, uid: &str) -> Option<ProfileDocument> {
        self.documents.lock().unwrap().get(uid).cloned()
    }

    pub fn set_war_name(&self, uid: &str, war_name: &str) {
        if let Some(doc) = self.documents.lock().unwrap().get_mut(uid) {
            doc.war_name = Some(war_name.to_string());
        }
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Transport("store offline".into()));
        }
        Ok(())
    }
}

fn apply(doc: &mut ProfileDocument, patch: &ProfilePatch) {
    if let Some(email) = &patch.email {
        doc.email = email.clone();
    }
    if patch.name.is_some() {
        doc.name = patch.name.clone();
    }
    if patch.war_name.is_some() {
        doc.war_name = patch.war_name.clone();
    }
    if let Some(role) = patch.role {
        doc.role = role;
    }
    if patch.created_at.is_some() {
        doc.created_at = patch.created_at;
    }
    if patch.updated_at.is_some() {
        doc.updated_at = patch.updated_at;
    }
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn get(&self, uid: &str) -> Result<Option<ProfileDocument>, StoreError> {
        self.ensure_online()?;
        Ok(self.document(uid))
    }

    async fn merge(&self, uid: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut documents = self.documents.lock().unwrap();
        let doc = documents
            .entry(uid.to_string())
            .or_insert_with(|| ProfileDocument {
                uid: uid.to_string(),
                email: String::new(),
                name: None,
                war_name: None,
                role: Role::User,
                created_at: None,
                updated_at: None,
            });
        apply(doc, patch);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<ProfileDocument>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|doc| normalize_email(&doc.email) == normalize_email(email))
            .cloned()
            .collect())
    }

    async fn update_many(&self, uids: &[String], patch: &ProfilePatch) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let mut documents = self.documents.lock().unwrap();
        let mut updated = 0;
        for uid in uids {
            if let Some(doc) = documents.get_mut(uid) {
                apply(doc, patch);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

pub fn manager(
    provider: Arc<FakeAuthProvider>,
    profiles: Arc<FakeProfileStore>,
) -> (Arc<SessionManager>, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let manager = SessionManager::new(provider, profiles, cache.clone(), SessionSettings::default());
    (Arc::new(manager), cache)
}
