use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::auth::service::SessionManager;

/// Periodically re-syncs the active session's war name with the profile store.
pub struct DisplayNameRefresher;

impl DisplayNameRefresher {
    /// Starts refreshing the session that is active right now.
    ///
    /// The task stops by itself once that session ends or another user signs
    /// in, and is aborted when the returned handle is dropped.
    pub fn spawn(manager: Arc<SessionManager>, interval: Duration) -> RefreshHandle {
        let mut state = manager.subscribe();
        let uid = state.borrow_and_update().uid().map(str::to_string);

        let task = tokio::spawn(async move {
            let Some(uid) = uid else {
                tracing::debug!("No active session, display-name refresh not started");
                return;
            };

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match manager.refresh_war_name().await {
                            Ok(true) => tracing::debug!(%uid, "Display name refreshed"),
                            Ok(false) => {}
                            Err(err) => tracing::warn!(%uid, error = %err, "Display name refresh failed"),
                        }
                    }
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if state.borrow_and_update().uid() != Some(uid.as_str()) {
                            tracing::info!(%uid, "Session changed, stopping display-name refresh");
                            break;
                        }
                    }
                }
            }
        });

        RefreshHandle { task: Some(task) }
    }
}

/// Owner of a running refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
