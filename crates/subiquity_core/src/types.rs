//! Wire DTOs shared by the client and server (spec.md §3, §6).
//!
//! These are the record/enum/tagged-union types the Serializer (see
//! `serialize`) moves across the Unix socket. Enum variants that are wire
//! values rather than internal names carry an explicit `#[serde(rename)]`
//! so the JSON shape matches the endpoint table in spec.md §6 exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The Serializer's "timestamp with format F" wire shape (spec.md §4.1): a
/// fixed RFC 3339 string, used for `ErrorReport` and crash marker timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

/// The server's externally visible status (spec.md §3 `ApplicationState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    STARTING,
    EARLY_COMMANDS,
    INTERACTIVE,
    NON_INTERACTIVE,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationState {
    pub status: ApplicationStatus,
    /// Syslog identifier clients should subscribe to for structured events.
    pub event_syslog_id: String,
    /// Syslog identifier clients should subscribe to for free-form log lines.
    pub log_syslog_id: String,
}

/// spec.md §3 `InstallState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallState {
    NOT_STARTED,
    RUNNING,
    NEEDS_CONFIRMATION,
    UU_RUNNING,
    UU_CANCELLING,
    DONE,
    ERROR,
}

impl InstallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstallState::DONE | InstallState::ERROR)
    }
}

/// Identifies an `ErrorReport` on the wire without shipping its full body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReportRef {
    pub base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallStatus {
    pub state: InstallState,
    pub error: Option<ErrorReportRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorReportKind {
    UI,
    INSTALL_FAIL,
    BLOCK_PROBE_FAIL,
    UNKNOWN,
    DAEMON,
    NETWORK_FAIL,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyboardSetting {
    pub layout: String,
    pub variant: String,
    pub toggle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IdentityData {
    pub realname: String,
    pub username: String,
    pub hostname: String,
    /// crypt(3)-hashed, never the plaintext password.
    pub crypted_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SshData {
    pub install_server: bool,
    pub allow_pw: bool,
    pub authorized_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkAction {
    NEW,
    CHANGE,
    DEL,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetDevInfo {
    pub name: String,
    pub typ: String,
    pub is_connected: bool,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapInfo {
    pub name: String,
    pub summary: String,
    pub publisher: String,
    pub verified: bool,
    pub description: String,
    pub confinement: String,
    pub license: Option<String>,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapSelection {
    pub name: String,
    pub channel: String,
    pub is_classic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapListResponse {
    pub status: RefreshStatus,
    pub snaps: Vec<SnapInfo>,
    pub selections: Vec<SnapSelection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RefreshStatus {
    #[default]
    UNKNOWN,
    AVAILABLE,
    UNAVAILABLE,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StorageResponse {
    pub status: RefreshStatus,
    pub disks: Vec<String>,
    pub orig_config: serde_json::Value,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bootloader {
    NONE,
    BIOS,
    PREP,
    UEFI,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    PROBING,
    DONE,
    FAILED,
}

/// A generic wrapper around the one payload argument an endpoint method may
/// declare (spec.md §3 "at most one tagged payload argument"). Its JSON
/// shape is always `{"data": <serialize(T, v)>}` per spec.md §4.2 step 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload<T> {
    pub data: T,
}

impl<T> Payload<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// The three distinguished statuses every endpoint response carries
/// (spec.md §4.4 `generic_result()`, §6 "all endpoints return
/// `{result, status}`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Ok,
    Skip,
    Confirm,
    Error,
}

/// The full envelope every endpoint response is wrapped in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub result: serde_json::Value,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_report: Option<ErrorReportRef>,
}

impl ResponseEnvelope {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            result,
            status: ResultStatus::Ok,
            error_report: None,
        }
    }

    pub fn skip() -> Self {
        Self {
            result: serde_json::Value::Null,
            status: ResultStatus::Skip,
            error_report: None,
        }
    }

    pub fn confirm() -> Self {
        Self {
            result: serde_json::Value::Null,
            status: ResultStatus::Confirm,
            error_report: None,
        }
    }

    pub fn error(report: ErrorReportRef) -> Self {
        Self {
            result: serde_json::Value::Null,
            status: ResultStatus::Error,
            error_report: Some(report),
        }
    }
}

/// The top-level autoinstall document (spec.md §6 "Autoinstall document").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutoinstallDocument {
    pub version: u32,
    #[serde(default, rename = "interactive-sections")]
    pub interactive_sections: Vec<String>,
    #[serde(default, rename = "early-commands")]
    pub early_commands: Option<CommandList>,
    #[serde(default, rename = "late-commands")]
    pub late_commands: Option<CommandList>,
    /// Every other top-level key is a controller's autoinstall slice, keyed
    /// by that controller's `autoinstall_key`.
    #[serde(flatten)]
    pub slices: BTreeMap<String, serde_json::Value>,
}

/// `early-commands`/`late-commands` entries: each is either a bare string
/// (run via `sh -c`) or a list of argv tokens run directly (spec.md §11
/// supplemented feature, grounded in `cmdlist.py`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Command {
    Shell(String),
    Argv(Vec<String>),
}

pub type CommandList = Vec<Command>;

impl AutoinstallDocument {
    pub fn is_wildcard_interactive(&self) -> bool {
        self.interactive_sections.iter().any(|s| s == "*")
    }

    pub fn is_section_interactive(&self, key: &str) -> bool {
        self.is_wildcard_interactive() || self.interactive_sections.iter().any(|s| s == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_accepts_bare_string_or_argv() {
        let list: CommandList = serde_json::from_str(r#"["echo hi", ["touch", "/tmp/x"]]"#)
            .expect("valid command list");
        assert_eq!(list[0], Command::Shell("echo hi".to_string()));
        assert_eq!(
            list[1],
            Command::Argv(vec!["touch".to_string(), "/tmp/x".to_string()])
        );
    }

    #[test]
    fn wildcard_interactive_covers_every_section() {
        let doc = AutoinstallDocument {
            version: 1,
            interactive_sections: vec!["*".to_string()],
            ..Default::default()
        };
        assert!(doc.is_section_interactive("network"));
        assert!(doc.is_section_interactive("identity"));
    }

    #[test]
    fn payload_wraps_under_data_key() {
        let p = Payload::new(KeyboardSetting {
            layout: "us".into(),
            variant: "".into(),
            toggle: None,
        });
        let wire = serde_json::to_value(&p).unwrap();
        assert!(wire.get("data").is_some());
    }
}
