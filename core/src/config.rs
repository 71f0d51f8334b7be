use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Web API key of the auth provider project.
    pub api_key: String,
    pub auth_base_url: String,
    pub firestore_base_url: String,
    pub project_id: String,
    pub profile_collection: String,
    pub equipment_collection: String,
    pub history_collection: String,
    pub cache_dir: PathBuf,
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub password_min_length: usize,
    pub sanitize_max_length: usize,
    pub display_name_refresh_seconds: u64,
    pub rate_limit_cleanup_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            firestore_base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            profile_collection: "usuarios".to_string(),
            equipment_collection: "computadores".to_string(),
            history_collection: "historico".to_string(),
            cache_dir: PathBuf::from(".inventory-cache"),
            login_max_attempts: 5,
            login_window_seconds: 15 * 60,
            password_min_length: 6,
            sanitize_max_length: 255,
            display_name_refresh_seconds: 30,
            rate_limit_cleanup_threshold: 10_000,
        }
    }
}

impl Config {
    /// Loads `.env`, then layers `inventory.toml` (optional) and
    /// `INVENTORY_*` environment variables over the defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("inventory").required(false))
            .add_source(config::Environment::with_prefix("INVENTORY").try_parsing(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.login_max_attempts == 0 {
            anyhow::bail!("INVENTORY_LOGIN_MAX_ATTEMPTS must be greater than zero");
        }
        if self.login_window_seconds == 0 {
            anyhow::bail!("INVENTORY_LOGIN_WINDOW_SECONDS must be greater than zero");
        }
        if self.display_name_refresh_seconds == 0 {
            anyhow::bail!("INVENTORY_DISPLAY_NAME_REFRESH_SECONDS must be greater than zero");
        }
        Ok(())
    }

    pub fn login_window(&self) -> Duration {
        Duration::from_secs(self.login_window_seconds)
    }

    pub fn display_name_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.display_name_refresh_seconds)
    }

    /// Base URL of the document tree, e.g. `.../projects/p/databases/(default)/documents`.
    pub fn documents_base_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.firestore_base_url.trim_end_matches('/'),
            self.project_id
        )
    }
}

pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.chars().count())
}
