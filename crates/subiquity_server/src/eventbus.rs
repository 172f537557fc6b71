//! The event bus (spec.md §4.3): an in-process broadcast bus keyed by
//! syslog identifier, standing in for `journald_listener` per
//! SPEC_FULL.md §12 (systemd-journald itself is out of scope, spec.md §1).
//! Also owns the network subscription fan-out.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::join_all;
use log::warn;
use subiquity_core::events::{
    ApplyErrorEvent, ApplyStartingEvent, ApplyStoppingEvent, ContextEvent, ContextEventType,
    LogLine, NetEventApi, RouteWatchEvent, UpdateLinkEvent,
};
use tokio::sync::broadcast;

use crate::context::{Context, ContextListener};

/// Structured start/finish events plus free-form log lines, each on its own
/// broadcast channel (spec.md §4.3 `event_syslog_id`/`log_syslog_id`).
pub struct EventBus {
    events: broadcast::Sender<ContextEvent>,
    logs: broadcast::Sender<LogLine>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1024);
        let (logs, _) = broadcast::channel(1024);
        Self { events, logs }
    }
}

impl EventBus {
    pub fn subscribe_events(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogLine> {
        self.logs.subscribe()
    }

    pub fn publish_log(&self, syslog_identifier: impl Into<String>, message: impl Into<String>) {
        let _ = self.logs.send(LogLine {
            syslog_identifier: syslog_identifier.into(),
            message: message.into(),
        });
    }
}

impl ContextListener for EventBus {
    fn on_enter(&self, ctx: &Context) {
        let _ = self.events.send(ContextEvent {
            event_type: ContextEventType::Start,
            context_id: ctx.id.clone(),
            context_parent_id: ctx.parent_id.clone(),
            context_name: ctx.name.clone(),
            message: ctx.description.clone(),
        });
    }

    fn on_exit(&self, ctx: &Context, status: subiquity_core::events::Status) {
        let _ = self.events.send(ContextEvent {
            event_type: ContextEventType::Finish,
            context_id: ctx.id.clone(),
            context_parent_id: ctx.parent_id.clone(),
            context_name: ctx.name.clone(),
            message: format!("{status:?}"),
        });
    }
}

/// `PUT /network/subscription` / `DELETE /network/subscription`
/// (spec.md §4.3 "Subscription fan-out"). Each registered subscriber is a
/// `NetEventApi` client dialing back into the subscriber's own local
/// socket — the generated client running in reverse.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: Mutex<HashMap<String, std::sync::Arc<dyn NetEventApi>>>,
}

impl SubscriptionRegistry {
    pub fn put(&self, socket_path: String, client: std::sync::Arc<dyn NetEventApi>) {
        self.subscribers.lock().unwrap().insert(socket_path, client);
    }

    pub fn delete(&self, socket_path: &str) {
        self.subscribers.lock().unwrap().remove(socket_path);
    }

    fn snapshot(&self) -> Vec<std::sync::Arc<dyn NetEventApi>> {
        self.subscribers.lock().unwrap().values().cloned().collect()
    }

    /// Dispatch is fire-and-forget and concurrent across subscribers
    /// (spec.md §5 "Subscription POSTs to distinct subscribers are launched
    /// concurrently; no cross-subscriber order is promised" and "a slow
    /// subscriber cannot block the producer").
    pub async fn update_link(&self, event: UpdateLinkEvent) {
        let subs = self.snapshot();
        join_all(subs.iter().map(|s| {
            let event = event.clone();
            async move { s.update_link(event).await }
        }))
        .await;
    }

    pub async fn route_watch(&self, event: RouteWatchEvent) {
        let subs = self.snapshot();
        join_all(subs.iter().map(|s| {
            let event = event.clone();
            async move { s.route_watch(event).await }
        }))
        .await;
    }

    pub async fn apply_starting(&self, event: ApplyStartingEvent) {
        let subs = self.snapshot();
        join_all(subs.iter().map(|s| {
            let event = event.clone();
            async move { s.apply_starting(event).await }
        }))
        .await;
    }

    pub async fn apply_stopping(&self, event: ApplyStoppingEvent) {
        let subs = self.snapshot();
        join_all(subs.iter().map(|s| {
            let event = event.clone();
            async move { s.apply_stopping(event).await }
        }))
        .await;
    }

    pub async fn apply_error(&self, event: ApplyErrorEvent) {
        let subs = self.snapshot();
        if subs.is_empty() {
            warn!("apply_error with no subscribers: {}", event.stage);
        }
        join_all(subs.iter().map(|s| {
            let event = event.clone();
            async move { s.apply_error(event).await }
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl NetEventApi for Counter {
        async fn update_link(&self, _event: UpdateLinkEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        async fn route_watch(&self, _event: RouteWatchEvent) {}
        async fn apply_starting(&self, _event: ApplyStartingEvent) {}
        async fn apply_stopping(&self, _event: ApplyStoppingEvent) {}
        async fn apply_error(&self, _event: ApplyErrorEvent) {}
    }

    #[tokio::test]
    async fn delete_stops_further_delivery() {
        let registry = SubscriptionRegistry::default();
        let count = Arc::new(AtomicUsize::new(0));
        registry.put("/tmp/s".to_string(), Arc::new(Counter(count.clone())));

        registry
            .update_link(UpdateLinkEvent {
                act: subiquity_core::types::LinkAction::NEW,
                info: subiquity_core::types::NetDevInfo {
                    name: "eth0".into(),
                    typ: "eth".into(),
                    is_connected: true,
                    addresses: vec![],
                },
            })
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        registry.delete("/tmp/s");
        registry
            .update_link(UpdateLinkEvent {
                act: subiquity_core::types::LinkAction::DEL,
                info: subiquity_core::types::NetDevInfo {
                    name: "eth0".into(),
                    typ: "eth".into(),
                    is_connected: false,
                    addresses: vec![],
                },
            })
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
