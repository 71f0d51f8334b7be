use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use validator::{Validate, ValidationErrors};

use crate::cache::{LocalCache, SnapshotCache};
use crate::config::Config;
use crate::error::AuthError;
use crate::models::session::effective_war_name;
use crate::models::{
    ChangePasswordRequest, ProfilePatch, RegisterRequest, Role, SecurityEventKind, Session,
    SessionState, SessionUpdate, ANONYMOUS_DISPLAY_NAME,
};
use crate::remote::{AuthProvider, AuthUser, ProfileStore};
use crate::security::{RateLimiter, SecurityLog, LOGIN_ACTION};
use crate::validation::{detect_suspicious_input, is_valid_email, sanitize_input, PasswordPolicy};

/// Tunables of the session manager.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub password_policy: PasswordPolicy,
    pub sanitize_max_length: usize,
    pub login_max_attempts: u32,
    pub login_window: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            password_policy: PasswordPolicy::with_min_length(config.password_min_length),
            sanitize_max_length: config.sanitize_max_length,
            login_max_attempts: config.login_max_attempts,
            login_window: config.login_window(),
        }
    }
}

/// Owns the panel session: authentication, registration, and the
/// display-name data kept in the profile store.
///
/// State changes are published on a `watch` channel; see [`SessionManager::subscribe`].
pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    cache: Arc<dyn LocalCache>,
    limiter: Arc<RateLimiter>,
    security_log: Arc<SecurityLog>,
    settings: SessionSettings,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        cache: Arc<dyn LocalCache>,
        settings: SessionSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self {
            provider,
            profiles,
            cache,
            limiter: Arc::new(RateLimiter::default()),
            security_log: Arc::new(SecurityLog::new()),
            settings,
            state,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_security_log(mut self, security_log: Arc<SecurityLog>) -> Self {
        self.security_log = security_log;
        self
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn security_log(&self) -> &Arc<SecurityLog> {
        &self.security_log
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let suspicious = detect_suspicious_input(email);
        let email = self.sanitize(email);
        let password = self.sanitize(password);
        let span = tracing::info_span!("login", %email);

        async move {
            if email.is_empty() || password.is_empty() {
                return Err(AuthError::InvalidInput(
                    "email and password are required".to_string(),
                ));
            }
            if suspicious {
                self.security_log.record(
                    SecurityEventKind::SuspiciousInput,
                    Some(&email),
                    Some(json!({ "field": "email" })),
                );
            }

            let decision = self.limiter.check(
                &email,
                LOGIN_ACTION,
                self.settings.login_max_attempts,
                self.settings.login_window,
            );
            if !decision.allowed {
                let wait_ms = decision.wait_millis();
                self.security_log.record(
                    SecurityEventKind::RateLimitExceeded,
                    Some(&email),
                    Some(json!({ "action": LOGIN_ACTION, "waitMs": wait_ms })),
                );
                return Err(AuthError::RateLimited {
                    wait_ms,
                    message: decision.message.unwrap_or_default(),
                });
            }

            self.publish(SessionState::Authenticating);
            let user = match self.provider.sign_in(&email, &password).await {
                Ok(user) => user,
                Err(err) => {
                    self.limiter.record_attempt(&email, LOGIN_ACTION, false);
                    self.security_log.record(
                        SecurityEventKind::LoginFailure,
                        Some(&email),
                        Some(json!({ "errorCode": err.code() })),
                    );
                    self.publish(SessionState::Anonymous);
                    return Err(err.into());
                }
            };

            self.limiter.record_attempt(&email, LOGIN_ACTION, true);
            self.security_log.record(
                SecurityEventKind::LoginSuccess,
                Some(&email),
                Some(json!({ "uid": user.uid })),
            );

            let session = self.compose_session(&user).await;
            self.establish(&session);
            tracing::info!(uid = %session.uid, "Login succeeded");
            Ok(session)
        }
        .instrument(span)
        .await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        war_name: &str,
    ) -> Result<Session, AuthError> {
        let request = RegisterRequest {
            email: self.sanitize(email),
            password: self.sanitize(password),
            full_name: self.sanitize(full_name),
            war_name: self.sanitize(war_name),
        };
        let span = tracing::info_span!("register", email = %request.email);

        async move {
            if let Err(err) = self.check_registration(&request) {
                self.security_log.record(
                    SecurityEventKind::RegisterFailure,
                    Some(&request.email),
                    Some(json!({ "errorCode": err.code() })),
                );
                return Err(err);
            }

            self.publish(SessionState::Authenticating);
            let user = match self
                .provider
                .create_account(&request.email, &request.password)
                .await
            {
                Ok(user) => user,
                Err(err) => {
                    self.security_log.record(
                        SecurityEventKind::RegisterFailure,
                        Some(&request.email),
                        Some(json!({ "errorCode": err.code() })),
                    );
                    self.publish(SessionState::Anonymous);
                    return Err(err.into());
                }
            };

            let war_name = Some(request.war_name.clone()).filter(|name| !name.is_empty());
            let display_name = war_name
                .clone()
                .unwrap_or_else(|| request.full_name.clone());
            if let Err(err) = self.provider.update_display_name(&display_name).await {
                tracing::warn!(uid = %user.uid, error = %err, "Failed to set provider display name");
            }

            let now = Utc::now();
            let profile = ProfilePatch {
                uid: Some(user.uid.clone()),
                email: Some(user.email.clone()),
                name: Some(request.full_name.clone()),
                war_name: war_name.clone(),
                role: Some(Role::User),
                created_at: Some(now),
                updated_at: Some(now),
            };
            if let Err(err) = self.profiles.merge(&user.uid, &profile).await {
                tracing::warn!(
                    uid = %user.uid,
                    error = %err,
                    "Profile write after registration failed, account kept"
                );
            }

            let session = Session {
                uid: user.uid,
                email: user.email,
                display_name: Some(display_name),
                war_name,
                role: Role::User,
            };
            self.security_log.record(
                SecurityEventKind::RegisterSuccess,
                Some(&session.email),
                Some(json!({ "uid": session.uid })),
            );
            self.establish(&session);
            tracing::info!(uid = %session.uid, "Account registered");
            Ok(session)
        }
        .instrument(span)
        .await
    }

    /// Signs out. Local state is cleared even when the provider call fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let identity = self.current_session().map(|session| session.email);

        if let Err(err) = self.provider.sign_out().await {
            tracing::warn!(error = %err, "Remote sign-out failed, clearing local session anyway");
        }
        self.cache.clear_session();
        self.publish(SessionState::Anonymous);
        self.security_log
            .record(SecurityEventKind::Logout, identity.as_deref(), None);
        Ok(())
    }

    /// Best available name for the signed-in user. Never fails: remote
    /// lookups that error fall back to locally known values.
    pub async fn display_name(&self) -> String {
        let session = self
            .current_session()
            .or_else(|| self.cache.load_session());
        let provider_user = self.provider.current_user();

        let uid = session
            .as_ref()
            .map(|s| s.uid.clone())
            .or_else(|| provider_user.as_ref().map(|u| u.uid.clone()));
        let email = session
            .as_ref()
            .map(|s| s.email.clone())
            .or_else(|| provider_user.as_ref().map(|u| u.email.clone()))
            .unwrap_or_default();

        let remote_war_name = match uid {
            Some(uid) => match self.profiles.get(&uid).await {
                Ok(profile) => profile.and_then(|p| p.war_name),
                Err(err) => {
                    tracing::warn!(%uid, error = %err, "Profile lookup failed, using local display name");
                    None
                }
            },
            None => None,
        };

        let cached_war_name = session.as_ref().and_then(|s| s.war_name.clone());
        let provider_name = provider_user
            .as_ref()
            .and_then(|u| u.display_name.clone())
            .or_else(|| session.as_ref().and_then(|s| s.display_name.clone()));

        effective_war_name(remote_war_name.as_deref(), &email)
            .or_else(|| effective_war_name(cached_war_name.as_deref(), &email))
            .or_else(|| provider_name.as_deref().map(str::trim).filter(|n| !n.is_empty()))
            .or_else(|| Some(email.trim()).filter(|e| !e.is_empty()))
            .unwrap_or(ANONYMOUS_DISPLAY_NAME)
            .to_string()
    }

    /// Changes the password after re-presenting the current credential.
    pub async fn change_password(&self, current: &str, next: &str) -> Result<(), AuthError> {
        let request = ChangePasswordRequest {
            current_password: self.sanitize(current),
            new_password: self.sanitize(next),
        };

        let strength = self.settings.password_policy.check(&request.new_password);
        if !strength.valid {
            return Err(AuthError::WeakPassword(strength.errors));
        }
        if let Err(errors) = request.validate() {
            if let Some(err) = invalid_fields(&errors, &["current_password"]) {
                return Err(err);
            }
        }

        let session = self.current_session().ok_or_else(AuthError::no_session)?;
        let span = tracing::info_span!("change_password", uid = %session.uid);

        let result = async {
            self.provider
                .reauthenticate(&session.email, &request.current_password)
                .await?;
            self.provider.update_password(&request.new_password).await
        }
        .instrument(span)
        .await;

        match result {
            Ok(()) => {
                self.security_log.record(
                    SecurityEventKind::PasswordChanged,
                    Some(&session.email),
                    None,
                );
                Ok(())
            }
            Err(err) => {
                self.security_log.record(
                    SecurityEventKind::PasswordChangeFailure,
                    Some(&session.email),
                    Some(json!({ "errorCode": err.code() })),
                );
                Err(err.into())
            }
        }
    }

    /// Sets the war name of the profile(s) registered under `email`.
    ///
    /// The signed-in user's own profile is upserted and the session is
    /// refreshed; any other email must already have a profile.
    pub async fn update_display_name_by_email(
        &self,
        email: &str,
        new_name: &str,
    ) -> Result<(), AuthError> {
        let email = self.sanitize(email);
        let new_name = self.sanitize(new_name);
        if email.is_empty() || new_name.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and display name are required".to_string(),
            ));
        }

        let mut patch = ProfilePatch::war_name(new_name.clone());
        match self.current_session() {
            Some(session) if session.email.eq_ignore_ascii_case(&email) => {
                patch.uid = Some(session.uid.clone());
                patch.email = Some(session.email.clone());
                self.profiles.merge(&session.uid, &patch).await?;
                self.apply_update(
                    &session.uid,
                    SessionUpdate {
                        war_name: Some(new_name.clone()),
                        ..SessionUpdate::default()
                    },
                );
            }
            _ => {
                let matches = self.profiles.find_by_email(&email).await?;
                if matches.is_empty() {
                    return Err(AuthError::UserNotFound(email));
                }
                if matches.len() > 1 {
                    tracing::warn!(%email, count = matches.len(), "Several profiles share one email");
                }
                let uids: Vec<String> = matches.into_iter().map(|doc| doc.uid).collect();
                let updated = self.profiles.update_many(&uids, &patch).await?;
                tracing::info!(%email, updated, "Display name updated");
            }
        }

        self.security_log.record(
            SecurityEventKind::DisplayNameUpdated,
            Some(&email),
            Some(json!({ "warName": new_name })),
        );
        Ok(())
    }

    /// Pulls war name and role from the profile store into the active
    /// session. Returns whether the session changed.
    pub async fn refresh_war_name(&self) -> Result<bool, AuthError> {
        let Some(session) = self.current_session() else {
            return Ok(false);
        };
        let Some(profile) = self.profiles.get(&session.uid).await? else {
            return Ok(false);
        };
        Ok(self.apply_update(
            &session.uid,
            SessionUpdate {
                war_name: profile.war_name,
                role: Some(profile.role),
                ..SessionUpdate::default()
            },
        ))
    }

    /// Re-hydrates the session from the local cache if the provider still
    /// reports the same user. A stale entry is discarded.
    pub fn restore(&self) -> Option<Session> {
        let cached = self.cache.load_session()?;
        match self.provider.current_user() {
            Some(user) if user.uid == cached.uid => {
                tracing::info!(uid = %cached.uid, "Session restored from cache");
                self.publish(SessionState::Authenticated(cached.clone()));
                Some(cached)
            }
            _ => {
                tracing::debug!(uid = %cached.uid, "Discarding stale cached session");
                self.cache.clear_session();
                None
            }
        }
    }

    /// Follows a provider auth-state change.
    pub async fn handle_auth_state(&self, user: Option<AuthUser>) {
        let current = self.state();
        match user {
            None => {
                if current.is_authenticated() {
                    tracing::info!("Provider session ended");
                    self.cache.clear_session();
                    self.publish(SessionState::Anonymous);
                }
            }
            Some(user) => {
                // login/register publish their own outcome
                if matches!(current, SessionState::Authenticating)
                    || current.uid() == Some(user.uid.as_str())
                {
                    return;
                }
                let session = match self.cache.load_session() {
                    Some(cached) if cached.uid == user.uid => cached,
                    _ => self.compose_session(&user).await,
                };
                self.establish(&session);
            }
        }
    }

    /// Spawns a task that feeds provider auth-state changes into
    /// [`SessionManager::handle_auth_state`]. It ends with the manager.
    pub fn spawn_auth_state_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let mut changes = self.provider.auth_state();

        tokio::spawn(async move {
            loop {
                let user = changes.borrow_and_update().clone();
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_auth_state(user).await;
                drop(manager);

                if changes.changed().await.is_err() {
                    break;
                }
            }
            tracing::debug!("Auth state listener stopped");
        })
    }

    async fn compose_session(&self, user: &AuthUser) -> Session {
        let profile = match self.profiles.get(&user.uid).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(uid = %user.uid, error = %err, "Profile fetch failed, using provider data");
                None
            }
        };
        let (war_name, role) = profile
            .map(|doc| (doc.war_name, doc.role))
            .unwrap_or((None, Role::User));

        Session {
            uid: user.uid.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            war_name,
            role,
        }
    }

    fn check_registration(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        if !is_valid_email(&request.email) {
            return Err(AuthError::InvalidInput(format!(
                "invalid email: {}",
                request.email
            )));
        }
        let strength = self.settings.password_policy.check(&request.password);
        if !strength.valid {
            return Err(AuthError::WeakPassword(strength.errors));
        }
        // email and password were checked against the configured policy above
        if let Err(errors) = request.validate() {
            if let Some(err) = invalid_fields(&errors, &["full_name", "war_name"]) {
                return Err(err);
            }
        }
        Ok(())
    }

    fn establish(&self, session: &Session) {
        self.cache.store_session(session);
        self.publish(SessionState::Authenticated(session.clone()));
    }

    /// Applies `update` to the active session when it still belongs to `uid`.
    fn apply_update(&self, uid: &str, update: SessionUpdate) -> bool {
        let mut updated = None;
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(session) if session.uid == uid => {
                let changed = session.apply(update);
                if changed {
                    updated = Some(session.clone());
                }
                changed
            }
            _ => false,
        });

        match updated {
            Some(session) => {
                self.cache.store_session(&session);
                true
            }
            None => false,
        }
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn sanitize(&self, raw: &str) -> String {
        sanitize_input(raw, self.settings.sanitize_max_length)
    }
}

fn invalid_fields(errors: &ValidationErrors, fields: &[&str]) -> Option<AuthError> {
    let mut invalid: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|field| field.to_string())
        .filter(|field| fields.contains(&field.as_str()))
        .collect();
    if invalid.is_empty() {
        return None;
    }
    invalid.sort();
    Some(AuthError::InvalidInput(format!(
        "invalid fields: {}",
        invalid.join(", ")
    )))
}
