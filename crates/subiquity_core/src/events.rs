//! Wire types for the event bus and the network subscription protocol
//! (spec.md §4.3).

use serde::{Deserialize, Serialize};

use crate::types::{LinkAction, NetDevInfo};

/// One structured event emitted by a `Context` entry/exit (spec.md §4.3
/// `event_syslog_id` fields).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextEvent {
    pub event_type: ContextEventType,
    pub context_id: String,
    pub context_parent_id: Option<String>,
    pub context_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextEventType {
    Start,
    Finish,
}

/// The outcome a context exits with (spec.md §3 Context, §4.5 "status
/// derived from curtin's RESULT").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    SUCCESS,
    FAILURE,
    SKIP,
    WARN,
}

/// A free-form log line from `log_syslog_id` (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLine {
    pub syslog_identifier: String,
    pub message: String,
}

/// Body of an `update_link` subscription callback (spec.md §4.3, end-to-end
/// scenario 3: `POST .../update_link` with `{"data": {"act":"NEW","info":{…}}}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateLinkEvent {
    pub act: LinkAction,
    pub info: NetDevInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteWatchEvent {
    pub action: LinkAction,
    pub ifindex: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ApplyStartingEvent {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ApplyStoppingEvent {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyErrorEvent {
    pub stage: String,
}

/// The reverse client: the network controller's concrete view of a single
/// registered subscriber, used to POST `update_link`/`route_watch`/
/// `apply_starting`/`apply_stopping`/`apply_error` callbacks (spec.md §4.3
/// "Subscription fan-out").
#[async_trait::async_trait]
pub trait NetEventApi: Send + Sync {
    async fn update_link(&self, event: UpdateLinkEvent);
    async fn route_watch(&self, event: RouteWatchEvent);
    async fn apply_starting(&self, event: ApplyStartingEvent);
    async fn apply_stopping(&self, event: ApplyStoppingEvent);
    async fn apply_error(&self, event: ApplyErrorEvent);
}
