//! The declarative API-definition binder (spec.md §4.2).
//!
//! The endpoint tree is a compile-time table of `EndpointDef` constants
//! rather than a runtime-walked structure, and each endpoint group is a
//! trait whose methods are named `<verb>` (e.g. `get`, `post`) or, where a
//! group exposes more than one method per verb, `<name>_<verb>`. A missing
//! implementation is a compile error, not a 500 at dispatch time — this is
//! the static replacement for dotted-name attribute lookup that spec.md §9
//! calls for.
//!
//! `subiquity-server` implements these traits directly against controller
//! state; `subiquity-tui`/`subiquity-agent` implement them against an HTTP
//! `Transport`, producing the client stub described in spec.md §4.2's
//! "client binding" from the exact same trait definitions.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::WireError;

/// One node in the endpoint tree: its cumulative HTTP path and its fully
/// qualified dotted name (spec.md §3 "Endpoint").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDef {
    pub path: &'static str,
    pub name: &'static str,
}

/// The HTTP methods an endpoint leaf may expose (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

/// The static endpoint tree (spec.md §6 "Endpoint surface"). Each constant
/// names the path a server binder registers a route at and a client stub
/// dials; `{param}` segments are path parameters contributed by a
/// parameterized parent (spec.md §3 "Path-parameter children").
pub mod paths {
    use super::EndpointDef;

    pub const META_STATUS: EndpointDef = EndpointDef {
        path: "/meta/status",
        name: "meta.status",
    };
    pub const META_CONFIRM: EndpointDef = EndpointDef {
        path: "/meta/confirm",
        name: "meta.confirm",
    };
    pub const META_MARK_CONFIGURED: EndpointDef = EndpointDef {
        path: "/meta/mark_configured",
        name: "meta.mark_configured",
    };
    pub const META_RESTART: EndpointDef = EndpointDef {
        path: "/meta/restart",
        name: "meta.restart",
    };
    pub const INSTALL_STATUS: EndpointDef = EndpointDef {
        path: "/install/status",
        name: "install.status",
    };
    pub const REFRESH: EndpointDef = EndpointDef {
        path: "/refresh",
        name: "refresh",
    };
    pub const REFRESH_PROGRESS: EndpointDef = EndpointDef {
        path: "/refresh/progress",
        name: "refresh.progress",
    };
    pub const NETWORK: EndpointDef = EndpointDef {
        path: "/network",
        name: "network",
    };
    pub const NETWORK_SUBSCRIPTION: EndpointDef = EndpointDef {
        path: "/network/subscription",
        name: "network.subscription",
    };
    pub const STORAGE: EndpointDef = EndpointDef {
        path: "/storage",
        name: "storage",
    };
    pub const STORAGE_RESET: EndpointDef = EndpointDef {
        path: "/storage/reset",
        name: "storage.reset",
    };
    pub const SNAPLIST: EndpointDef = EndpointDef {
        path: "/snaplist",
        name: "snaplist",
    };
    pub const SNAPLIST_SNAP_INFO: EndpointDef = EndpointDef {
        path: "/snaplist/snap_info",
        name: "snaplist.snap_info",
    };
    pub const KEYBOARD: EndpointDef = EndpointDef {
        path: "/keyboard",
        name: "keyboard",
    };
    pub const LOCALE: EndpointDef = EndpointDef {
        path: "/locale",
        name: "locale",
    };
    pub const PROXY: EndpointDef = EndpointDef {
        path: "/proxy",
        name: "proxy",
    };
    pub const MIRROR: EndpointDef = EndpointDef {
        path: "/mirror",
        name: "mirror",
    };
    pub const IDENTITY: EndpointDef = EndpointDef {
        path: "/identity",
        name: "identity",
    };
    pub const SSH: EndpointDef = EndpointDef {
        path: "/ssh",
        name: "ssh",
    };
    pub const REBOOT: EndpointDef = EndpointDef {
        path: "/reboot",
        name: "reboot",
    };
    pub const ERRORS_WAIT: EndpointDef = EndpointDef {
        path: "/errors/wait",
        name: "errors.wait",
    };
}

/// The caller-supplied transport a client stub is bound against (spec.md
/// §4.2 "client binding" step 5: `transport (method, path, params, json) →
/// json`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        verb: Verb,
        path: &str,
        query: &[(String, String)],
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, WireError>;
}

/// The three distinguished control-flow effects a client's response hook
/// may raise (spec.md §4.6 "Response hook").
#[derive(Debug)]
pub enum ClientEffect {
    Skip,
    Confirm,
    Abort(crate::types::ErrorReportRef),
}

/// Applies the response hook described in spec.md §4.6: inspect the
/// envelope's `status` and either hand back the plain result or raise one
/// of the three distinguished effects.
pub fn apply_response_hook(
    envelope: crate::types::ResponseEnvelope,
) -> Result<serde_json::Value, ClientEffect> {
    use crate::types::ResultStatus;
    match envelope.status {
        ResultStatus::Ok => Ok(envelope.result),
        ResultStatus::Skip => Err(ClientEffect::Skip),
        ResultStatus::Confirm => Err(ClientEffect::Confirm),
        ResultStatus::Error => Err(ClientEffect::Abort(
            envelope
                .error_report
                .unwrap_or(crate::types::ErrorReportRef {
                    base: "unknown".to_string(),
                }),
        )),
    }
}

/// Generic helper used by both a server binder and a generated client stub
/// to move a query argument across the wire, matching spec.md §4.2's
/// "JSON-parse the raw query value then deserialize using its annotated
/// type" rule.
pub fn encode_query_value<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("query arguments must always serialize")
}

pub fn decode_query_value<T: DeserializeOwned>(raw: &str) -> Result<T, WireError> {
    let json: serde_json::Value = serde_json::from_str(raw)?;
    serde_json::from_value(json).map_err(WireError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_hook_passes_ok_through() {
        let env = crate::types::ResponseEnvelope::ok(serde_json::json!({"a": 1}));
        let result = apply_response_hook(env).unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }

    #[test]
    fn response_hook_raises_skip() {
        let env = crate::types::ResponseEnvelope::skip();
        match apply_response_hook(env) {
            Err(ClientEffect::Skip) => {}
            other => panic!("expected Skip, got {other:?}"),
        }
    }

    #[test]
    fn response_hook_raises_abort_with_ref() {
        let env = crate::types::ResponseEnvelope::error(crate::types::ErrorReportRef {
            base: "InstallFail_2024".to_string(),
        });
        match apply_response_hook(env) {
            Err(ClientEffect::Abort(r)) => assert_eq!(r.base, "InstallFail_2024"),
            other => panic!("expected Abort, got {other:?}"),
        }
    }
}
