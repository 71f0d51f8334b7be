use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_core::{
    auth::{DisplayNameRefresher, SessionManager, SessionSettings},
    cache::{JsonFileCache, SnapshotCache},
    config::{mask_secret, Config},
    dashboard::{DashboardStats, SectionPalette},
    remote::{
        identity_toolkit::IdTokenSource, EquipmentRepository, FirestoreClient, IdentityToolkitAuth,
    },
    security::RateLimiter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Login,
    Dashboard,
    Whoami,
    Watch,
}

fn parse_command<I>(args: I) -> Option<Command>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    match args.into_iter().next()?.as_ref() {
        "login" => Some(Command::Login),
        "dashboard" => Some(Command::Dashboard),
        "whoami" => Some(Command::Whoami),
        "watch" => Some(Command::Watch),
        _ => None,
    }
}

struct Panel {
    sessions: Arc<SessionManager>,
    equipment: Arc<FirestoreClient>,
    cache: Arc<JsonFileCache>,
}

impl Panel {
    fn new(config: &Config) -> Self {
        let auth = Arc::new(IdentityToolkitAuth::new(config));
        let token: Arc<dyn IdTokenSource> = auth.clone();
        let store = Arc::new(FirestoreClient::new(config, Some(token)));
        let cache = Arc::new(JsonFileCache::new(config.cache_dir.clone()));

        let sessions = SessionManager::new(
            auth,
            store.clone(),
            cache.clone(),
            SessionSettings::from(config),
        )
        .with_rate_limiter(Arc::new(RateLimiter::new(
            config.rate_limit_cleanup_threshold,
        )));

        Self {
            sessions: Arc::new(sessions),
            equipment: store,
            cache,
        }
    }

    async fn sign_in(&self) -> anyhow::Result<()> {
        let email = std::env::var("INVENTORY_EMAIL").context("INVENTORY_EMAIL is not set")?;
        let password =
            std::env::var("INVENTORY_PASSWORD").context("INVENTORY_PASSWORD is not set")?;
        let session = self.sessions.login(&email, &password).await?;
        tracing::info!(uid = %session.uid, role = session.role.as_str(), "Signed in");
        Ok(())
    }

    async fn dashboard(&self) -> anyhow::Result<()> {
        let records = match self.equipment.list_all().await {
            Ok(records) => {
                self.cache.store_equipment(&records);
                records
            }
            Err(err) => {
                tracing::warn!(error = %err, "Equipment list unavailable, using local snapshot");
                self.cache
                    .load_equipment()
                    .context("no equipment snapshot available")?
            }
        };

        let stats = DashboardStats::from_records(&records);
        let palette = SectionPalette::new();

        println!("Equipamentos: {}", stats.total);
        println!("IPs distintos: {}", stats.unique_ips);
        println!("MACs distintos: {}", stats.unique_macs);
        println!("Por tipo:");
        for (kind, count) in stats.by_type.entries() {
            println!("  {kind}: {count}");
        }
        println!("Seções com mais equipamentos:");
        for (section, count) in &stats.top_sections {
            println!("  {section}: {count} ({})", palette.color_for(section));
        }
        Ok(())
    }

    /// Prints the display name whenever the session changes, until Ctrl-C.
    async fn watch(&self, interval: std::time::Duration) -> anyhow::Result<()> {
        let mut state = self.sessions.subscribe();
        let listener = self.sessions.spawn_auth_state_listener();
        let refresher = DisplayNameRefresher::spawn(self.sessions.clone(), interval);

        loop {
            let name = state
                .borrow_and_update()
                .session()
                .map(|session| session.resolved_display_name());
            match name {
                Some(name) => println!("{name}"),
                None => break,
            }
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        refresher.stop();
        listener.abort();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inventory_core=debug,inventory_admin=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(command) = parse_command(std::env::args().skip(1)) else {
        eprintln!("usage: inventory-admin <login|dashboard|whoami|watch>");
        std::process::exit(2);
    };

    let config = Config::load()?;
    tracing::info!(
        project_id = %config.project_id,
        api_key = %mask_secret(&config.api_key),
        cache_dir = %config.cache_dir.display(),
        login_max_attempts = config.login_max_attempts,
        login_window_seconds = config.login_window_seconds,
        "Loaded configuration from environment/.env"
    );

    let panel = Panel::new(&config);
    match command {
        Command::Login => panel.sign_in().await?,
        Command::Dashboard => {
            panel.sign_in().await?;
            panel.dashboard().await?;
        }
        // The provider session lives only as long as this process, so every
        // command signs in again instead of restoring the cached session.
        Command::Whoami => {
            panel.sign_in().await?;
            println!("{}", panel.sessions.display_name().await);
        }
        Command::Watch => {
            panel.sign_in().await?;
            panel.watch(config.display_name_refresh_interval()).await?;
        }
    }

    Ok(())
}
