//! Auth provider adapter over the Identity Toolkit v1 REST API.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::Config;
use crate::error::ProviderError;
use crate::remote::{AuthProvider, AuthUser};

/// Supplies the bearer token of the signed-in account to other adapters.
pub trait IdTokenSource: Send + Sync {
    fn id_token(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
struct ProviderSession {
    user: AuthUser,
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct IdentityToolkitAuth {
    client: Client,
    base_url: String,
    api_key: String,
    session: Mutex<Option<ProviderSession>>,
    state: watch::Sender<Option<AuthUser>>,
}

impl IdentityToolkitAuth {
    pub fn new(config: &Config) -> Self {
        Self::new_with_base_url(&config.auth_base_url, &config.api_key)
    }

    pub fn new_with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            session: Mutex::new(None),
            state,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.base_url, method)
    }

    async fn call(
        &self,
        method: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<AccountResponse, ProviderError> {
        let span = tracing::debug_span!("identity_toolkit", method);
        async move {
            let response = self
                .client
                .post(self.endpoint(method))
                .query(&[("key", self.api_key.as_str())])
                .json(body)
                .send()
                .await
                .map_err(|e| ProviderError::Transport(format!("Request failed: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                response.json().await.map_err(|e| {
                    ProviderError::Transport(format!("Failed to parse response: {}", e))
                })
            } else {
                let text = response.text().await.unwrap_or_default();
                Err(parse_error(status.as_u16(), &text))
            }
        }
        .instrument(span)
        .await
    }

    fn store_session(&self, account: AccountResponse, fallback_email: &str) -> AuthUser {
        let user = AuthUser {
            uid: account.local_id,
            email: account
                .email
                .unwrap_or_else(|| fallback_email.to_string()),
            display_name: account.display_name.filter(|n| !n.is_empty()),
        };
        let id_token = account.id_token.unwrap_or_default();
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(ProviderSession {
            user: user.clone(),
            id_token,
        });
        self.state.send_replace(Some(user.clone()));
        user
    }

    fn require_session(&self) -> Result<ProviderSession, ProviderError> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| ProviderError::rejected("no-current-user"))
    }

    fn refresh_token(&self, account: &AccountResponse) {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if let (Some(session), Some(token)) = (guard.as_mut(), account.id_token.as_ref()) {
            session.id_token = token.clone();
        }
    }
}

fn parse_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope.error.message;
            let code = message
                .split(':')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            ProviderError::Rejected { code, message }
        }
        Err(_) if status >= 500 => ProviderError::Transport(format!("HTTP {}", status)),
        Err(_) => ProviderError::Rejected {
            code: format!("http_{}", status),
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let account = self
            .call(
                "signInWithPassword",
                &CredentialRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.store_session(account, email))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ProviderError> {
        let account = self
            .call(
                "signUp",
                &CredentialRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.store_session(account, email))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        // Token revocation is not exposed over REST; dropping the token ends the session.
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.state.send_replace(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|session| session.user.clone())
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }

    async fn update_display_name(&self, display_name: &str) -> Result<(), ProviderError> {
        let session = self.require_session()?;
        let body: Value = json!({
            "idToken": session.id_token,
            "displayName": display_name,
            "returnSecureToken": false,
        });
        self.call("update", &body).await?;

        let mut user = session.user;
        user.display_name = Some(display_name.to_string());
        if let Some(current) = self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
        {
            current.user = user.clone();
        }
        self.state.send_replace(Some(user));
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), ProviderError> {
        let session = self.require_session()?;
        let body: Value = json!({
            "idToken": session.id_token,
            "password": new_password,
            "returnSecureToken": true,
        });
        let account = self.call("update", &body).await?;
        self.refresh_token(&account);
        Ok(())
    }

    async fn reauthenticate(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        let session = self.require_session()?;
        let account = self
            .call(
                "signInWithPassword",
                &CredentialRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        if account.local_id != session.user.uid {
            return Err(ProviderError::rejected("user-mismatch"));
        }
        self.refresh_token(&account);
        Ok(())
    }
}

impl IdTokenSource for IdentityToolkitAuth {
    fn id_token(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|session| session.id_token.clone())
            .filter(|token| !token.is_empty())
    }
}
