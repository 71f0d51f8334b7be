use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{SecurityEvent, SecurityEventKind};

/// Optional remote destination for security events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    async fn write(&self, event: SecurityEvent) -> anyhow::Result<()>;
}

/// Append-only, process-local security event log.
#[derive(Default)]
pub struct SecurityLog {
    events: Mutex<Vec<SecurityEvent>>,
    sink: Option<Arc<dyn SecurityEventSink>>,
}

impl SecurityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn SecurityEventSink>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            sink: Some(sink),
        }
    }

    /// Appends an event. Never fails: forwarding to the sink happens on a
    /// spawned task and its errors are only logged.
    pub fn record(
        &self,
        kind: SecurityEventKind,
        identity: Option<&str>,
        payload: Option<Value>,
    ) -> SecurityEvent {
        let event = SecurityEvent {
            id: Uuid::new_v4().to_string(),
            kind,
            identity: identity.map(str::to_string),
            occurred_at: Utc::now(),
            payload,
        };

        if kind.is_failure() {
            tracing::warn!(
                event = kind.as_str(),
                identity = identity.unwrap_or("-"),
                payload = ?event.payload,
                "Security event"
            );
        } else {
            tracing::info!(
                event = kind.as_str(),
                identity = identity.unwrap_or("-"),
                "Security event"
            );
        }

        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());

        if let Some(sink) = &self.sink {
            self.forward(Arc::clone(sink), event.clone());
        }

        event
    }

    fn forward(&self, sink: Arc<dyn SecurityEventSink>, event: SecurityEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(event = event.kind.as_str(), "No runtime, security sink skipped");
            return;
        };
        handle.spawn(async move {
            let kind = event.kind;
            if let Err(err) = sink.write(event).await {
                tracing::warn!(
                    error = ?err,
                    event = kind.as_str(),
                    "Failed to forward security event"
                );
            }
        });
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn events_of(&self, kind: SecurityEventKind) -> Vec<SecurityEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn record_appends_in_order() {
        let log = SecurityLog::new();
        log.record(SecurityEventKind::LoginFailure, Some("a@b.c"), None);
        log.record(
            SecurityEventKind::LoginSuccess,
            Some("a@b.c"),
            Some(json!({"uid": "u1"})),
        );

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, SecurityEventKind::LoginFailure);
        assert_eq!(events[1].payload, Some(json!({"uid": "u1"})));
        assert_eq!(log.events_of(SecurityEventKind::LoginSuccess).len(), 1);
    }

    #[test]
    fn record_without_runtime_skips_sink() {
        let mut sink = MockSecurityEventSink::new();
        sink.expect_write().times(0);
        let log = SecurityLog::with_sink(Arc::new(sink));

        log.record(SecurityEventKind::Logout, None, None);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn sink_failure_does_not_reach_caller() {
        let mut sink = MockSecurityEventSink::new();
        sink.expect_write()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("sink offline")));
        let log = SecurityLog::with_sink(Arc::new(sink));

        let event = log.record(SecurityEventKind::LoginFailure, Some("a@b.c"), None);
        assert_eq!(event.identity.as_deref(), Some("a@b.c"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn clear_empties_log() {
        let log = SecurityLog::new();
        log.record(SecurityEventKind::Logout, None, None);
        log.clear();
        assert!(log.is_empty());
    }
}
