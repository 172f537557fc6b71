//! Server-side half of the API-definition binder (spec.md §4.2 "Server
//! binding"). Each handler below corresponds to one leaf of the endpoint
//! tree declared in `subiquity_core::api::paths`; registering them by
//! those shared path constants is what keeps the server and the generated
//! client stub from ever disagreeing on a route.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use subiquity_core::api::paths;
use subiquity_core::types::{
    ApplicationState, ApplicationStatus, ErrorReportRef, InstallState, RefreshStatus,
    ResponseEnvelope, SnapListResponse, StorageResponse,
};
use subiquity_model::GenericStatus;

use crate::eventbus::{EventBus, SubscriptionRegistry};
use crate::install::InstallTask;

/// Shared server state every handler closes over (spec.md §3 Ownership:
/// "The API router is the sole writer to each controller's sub-model").
/// `InstallModel` itself carries a `Mutex` per sub-model rather than one
/// lock over the whole struct, so a handler writing `/keyboard` never
/// contends with the install task's long wait on `install_events`.
pub struct AppState {
    pub model: Arc<subiquity_model::InstallModel>,
    pub install_task: Arc<InstallTask>,
    pub event_bus: Arc<EventBus>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub app_status: AtomicApplicationStatus,
    pub restart_requested: AtomicBool,
}

pub struct AtomicApplicationStatus(std::sync::atomic::AtomicU8);

impl AtomicApplicationStatus {
    pub fn new(status: ApplicationStatus) -> Self {
        Self(std::sync::atomic::AtomicU8::new(status as u8))
    }

    pub fn get(&self) -> ApplicationStatus {
        match self.0.load(Ordering::SeqCst) {
            0 => ApplicationStatus::STARTING,
            1 => ApplicationStatus::EARLY_COMMANDS,
            2 => ApplicationStatus::INTERACTIVE,
            _ => ApplicationStatus::NON_INTERACTIVE,
        }
    }

    pub fn set(&self, status: ApplicationStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }
}

fn envelope_response(status: axum::http::StatusCode, body: ResponseEnvelope) -> Response {
    (status, Json(body)).into_response()
}

fn ok(result: Value) -> Response {
    envelope_response(axum::http::StatusCode::OK, ResponseEnvelope::ok(result))
}

fn generic_status_envelope(status: GenericStatus, result: Value) -> Response {
    match status {
        GenericStatus::Ok => ok(result),
        GenericStatus::Skip => envelope_response(axum::http::StatusCode::OK, ResponseEnvelope::skip()),
        GenericStatus::Confirm => {
            envelope_response(axum::http::StatusCode::OK, ResponseEnvelope::confirm())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CurQuery<T> {
    pub cur: Option<T>,
}

// ---- /meta/* ------------------------------------------------------------

async fn meta_status_get(
    State(state): State<Arc<AppState>>,
    Query(_q): Query<CurQuery<ApplicationStatus>>,
) -> Response {
    // STARTING/EARLY_COMMANDS/INTERACTIVE transitions are rare one-shots, so
    // unlike /install/status this is a plain read rather than a long-poll.
    let app_state = ApplicationState {
        status: state.app_status.get(),
        event_syslog_id: "subiquity_event".to_string(),
        log_syslog_id: "subiquity_log".to_string(),
    };
    ok(serde_json::to_value(app_state).unwrap())
}

async fn meta_confirm_post(State(state): State<Arc<AppState>>) -> Response {
    state.install_task.confirm(&state.model);
    ok(Value::Null)
}

async fn meta_mark_configured_post(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<subiquity_core::types::Payload<Vec<String>>>,
) -> Response {
    for name in payload.into_inner() {
        state.model.mark_configured(&name);
    }
    ok(Value::Null)
}

async fn meta_restart_post(State(state): State<Arc<AppState>>) -> Response {
    state.restart_requested.store(true, Ordering::SeqCst);
    ok(Value::Null)
}

// ---- /install/status ------------------------------------------------------

async fn install_status_get(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CurQuery<InstallState>>,
) -> Response {
    let status = match q.cur {
        Some(cur) => state.install_task.wait_for_change(cur).await,
        None => state.install_task.status(),
    };
    ok(serde_json::to_value(status).unwrap())
}

// ---- /network -------------------------------------------------------------

async fn network_get(State(state): State<Arc<AppState>>) -> Response {
    let devices = state.model.network.lock().unwrap().devices.clone();
    ok(serde_json::to_value(devices).unwrap())
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub socket_path: String,
}

async fn network_subscription_put(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SubscriptionQuery>,
) -> Response {
    let client = crate::netclient::HttpNetEventClient::new(q.socket_path.clone());
    state.subscriptions.put(q.socket_path, Arc::new(client));
    ok(Value::Null)
}

async fn network_subscription_delete(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SubscriptionQuery>,
) -> Response {
    state.subscriptions.delete(&q.socket_path);
    ok(Value::Null)
}

// ---- /reboot ----------------------------------------------------------------

async fn reboot_post(State(state): State<Arc<AppState>>) -> Response {
    state.install_task.stop_uu(true).await;
    ok(Value::Null)
}

// ---- /errors/wait -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ErrorsWaitQuery {
    pub error_ref: String,
}

async fn errors_wait_get(Query(q): Query<ErrorsWaitQuery>) -> Response {
    ok(serde_json::to_value(ErrorReportRef { base: q.error_ref }).unwrap())
}

// ---- simple single-value endpoints --------------------------------------

macro_rules! simple_value_endpoint {
    ($get_fn:ident, $post_fn:ident, $field:ident, $ty:ty) => {
        async fn $get_fn(State(state): State<Arc<AppState>>) -> Response {
            let value = state.model.$field.lock().unwrap().clone();
            ok(serde_json::to_value(&value).unwrap())
        }

        async fn $post_fn(
            State(state): State<Arc<AppState>>,
            Json(payload): Json<subiquity_core::types::Payload<$ty>>,
        ) -> Response {
            *state.model.$field.lock().unwrap() = payload.into_inner();
            state.model.mark_configured(stringify!($field));
            generic_status_envelope(GenericStatus::Ok, Value::Null)
        }
    };
}

simple_value_endpoint!(keyboard_get, keyboard_post, keyboard, KeyboardModelWire);
simple_value_endpoint!(identity_get, identity_post, identity, IdentityModelWire);
simple_value_endpoint!(ssh_get, ssh_post, ssh, SshModelWire);
simple_value_endpoint!(locale_get, locale_post, locale, LocaleModelWire);
simple_value_endpoint!(proxy_get, proxy_post, proxy, ProxyModelWire);
simple_value_endpoint!(mirror_get, mirror_post, mirror, MirrorModelWire);

/// Thin wire-shape wrappers so the simple-value macro above can read/write
/// through `InstallModel`'s submodel fields without each submodel needing
/// its own serde impl.
type KeyboardModelWire = subiquity_model::submodels::keyboard::KeyboardModel;
type IdentityModelWire = subiquity_model::submodels::identity::IdentityModel;
type SshModelWire = subiquity_model::submodels::ssh::SshModel;
type LocaleModelWire = subiquity_model::submodels::locale::LocaleModel;
type ProxyModelWire = subiquity_model::submodels::proxy::ProxyModel;
type MirrorModelWire = subiquity_model::submodels::mirror::MirrorModel;

// ---- /storage ---------------------------------------------------------------

async fn storage_get(State(state): State<Arc<AppState>>) -> Response {
    let fs = state.model.filesystem.lock().unwrap();
    let response = StorageResponse {
        status: RefreshStatus::UNKNOWN,
        disks: fs.disks.clone(),
        orig_config: fs.orig_config.clone(),
        config: fs.config.clone(),
    };
    ok(serde_json::to_value(response).unwrap())
}

async fn storage_post(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<subiquity_core::types::Payload<Value>>,
) -> Response {
    {
        let mut fs = state.model.filesystem.lock().unwrap();
        fs.config = payload.into_inner();
    }
    state.model.mark_configured("filesystem");
    generic_status_envelope(GenericStatus::Ok, Value::Null)
}

async fn storage_reset_post(State(state): State<Arc<AppState>>) -> Response {
    let mut fs = state.model.filesystem.lock().unwrap();
    fs.config = Value::Null;
    fs.orig_config = Value::Null;
    ok(Value::Null)
}

// ---- /snaplist ----------------------------------------------------------------

async fn snaplist_get(State(state): State<Arc<AppState>>) -> Response {
    let snaplist = state.model.snaplist.lock().unwrap();
    let response = SnapListResponse {
        status: snaplist.status,
        snaps: snaplist.available.clone(),
        selections: snaplist.selections.clone(),
    };
    ok(serde_json::to_value(response).unwrap())
}

async fn snaplist_post(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<subiquity_core::types::Payload<Vec<subiquity_core::types::SnapSelection>>>,
) -> Response {
    {
        let mut snaplist = state.model.snaplist.lock().unwrap();
        snaplist.selections = payload.into_inner();
    }
    state.model.mark_configured("snaplist");
    generic_status_envelope(GenericStatus::Ok, Value::Null)
}

#[derive(Debug, Deserialize)]
pub struct SnapInfoQuery {
    pub name: String,
}

async fn snaplist_snap_info_get(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SnapInfoQuery>,
) -> Response {
    let snaplist = state.model.snaplist.lock().unwrap();
    let info = snaplist.available.iter().find(|s| s.name == q.name).cloned();
    ok(serde_json::to_value(info).unwrap())
}

// ---- /refresh -------------------------------------------------------------

async fn refresh_get(State(state): State<Arc<AppState>>) -> Response {
    let status = state.model.snaplist.lock().unwrap().status;
    ok(serde_json::to_value(status).unwrap())
}

async fn refresh_progress_get(Query(_q): Query<CurQuery<String>>) -> Response {
    ok(Value::Null)
}

/// Builds the full router from the shared endpoint path table, binding
/// every path in `subiquity_core::api::paths` to its handler
/// (spec.md §4.2 "Server binding").
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(paths::META_STATUS.path, get(meta_status_get))
        .route(paths::META_CONFIRM.path, post(meta_confirm_post))
        .route(
            paths::META_MARK_CONFIGURED.path,
            post(meta_mark_configured_post),
        )
        .route(paths::META_RESTART.path, post(meta_restart_post))
        .route(paths::INSTALL_STATUS.path, get(install_status_get))
        .route(paths::NETWORK.path, get(network_get))
        .route(
            paths::NETWORK_SUBSCRIPTION.path,
            put(network_subscription_put).delete(network_subscription_delete),
        )
        .route(paths::REBOOT.path, post(reboot_post))
        .route(paths::ERRORS_WAIT.path, get(errors_wait_get))
        .route(paths::KEYBOARD.path, get(keyboard_get).post(keyboard_post))
        .route(paths::IDENTITY.path, get(identity_get).post(identity_post))
        .route(paths::SSH.path, get(ssh_get).post(ssh_post))
        .route(paths::LOCALE.path, get(locale_get).post(locale_post))
        .route(paths::PROXY.path, get(proxy_get).post(proxy_post))
        .route(paths::MIRROR.path, get(mirror_get).post(mirror_post))
        .route(
            paths::STORAGE.path,
            get(storage_get).post(storage_post),
        )
        .route(paths::STORAGE_RESET.path, post(storage_reset_post))
        .route(
            paths::SNAPLIST.path,
            get(snaplist_get).post(snaplist_post),
        )
        .route(paths::SNAPLIST_SNAP_INFO.path, get(snaplist_snap_info_get))
        .route(paths::REFRESH.path, get(refresh_get))
        .route(paths::REFRESH_PROGRESS.path, get(refresh_progress_get))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use subiquity_core::types::ResultStatus;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            model: Arc::new(subiquity_model::InstallModel::default()),
            install_task: Arc::new(InstallTask::default()),
            event_bus: Arc::new(EventBus::default()),
            subscriptions: Arc::new(SubscriptionRegistry::default()),
            app_status: AtomicApplicationStatus::new(ApplicationStatus::STARTING),
            restart_requested: AtomicBool::new(false),
        })
    }

    async fn envelope_for(router: Router, request: Request<Body>) -> ResponseEnvelope {
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn meta_status_reports_the_current_application_status() {
        let router = build_router(test_state());
        let envelope = envelope_for(
            router,
            Request::builder()
                .uri(paths::META_STATUS.path)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(envelope.status, ResultStatus::Ok);
        let state: ApplicationState = serde_json::from_value(envelope.result).unwrap();
        assert_eq!(state.status, ApplicationStatus::STARTING);
    }

    #[tokio::test]
    async fn meta_restart_sets_the_restart_flag() {
        let state = test_state();
        let router = build_router(state.clone());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::META_RESTART.path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.restart_requested.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn keyboard_round_trips_through_get_and_post() {
        let state = test_state();
        let router = build_router(state.clone());

        let posted = serde_json::json!({"layout": "de", "variant": "nodeadkeys", "toggle": null});
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::KEYBOARD.path)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({"data": posted})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let envelope = envelope_for(
            router,
            Request::builder()
                .uri(paths::KEYBOARD.path)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(envelope.status, ResultStatus::Ok);
        let saved: KeyboardModelWire = serde_json::from_value(envelope.result).unwrap();
        assert_eq!(saved.setting.layout, "de");
    }

    #[tokio::test]
    async fn posting_keyboard_unblocks_its_own_stage_gate() {
        let state = test_state();
        let router = build_router(state.clone());

        assert!(!state.model.install_events.is_set("keyboard"));
        let posted = serde_json::json!({"layout": "us", "variant": "", "toggle": null});
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::KEYBOARD.path)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({"data": posted})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.model.install_events.is_set("keyboard"));
    }

    #[tokio::test]
    async fn meta_mark_configured_sets_the_named_stage_gates() {
        let state = test_state();
        let router = build_router(state.clone());

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::META_MARK_CONFIGURED.path)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({"data": ["identity", "source"]}))
                            .unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.model.postinstall_events.is_set("identity"));
        assert!(state.model.install_events.is_set("source"));
    }

    #[tokio::test]
    async fn storage_round_trips_and_reset_clears_the_config() {
        let state = test_state();
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::STORAGE.path)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({"data": {"layout": "direct"}}))
                            .unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.model.install_events.is_set("filesystem"));

        let envelope = envelope_for(
            router.clone(),
            Request::builder()
                .uri(paths::STORAGE.path)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let storage: StorageResponse = serde_json::from_value(envelope.result).unwrap();
        assert_eq!(storage.config["layout"], "direct");

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::STORAGE_RESET.path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.model.filesystem.lock().unwrap().config.is_null());
    }

    #[tokio::test]
    async fn snaplist_post_records_selections_and_unblocks_its_gate() {
        let state = test_state();
        let router = build_router(state.clone());

        let selection = serde_json::json!([{"name": "core20", "channel": "stable", "is_classic": false}]);
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(paths::SNAPLIST.path)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({"data": selection})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.model.postinstall_events.is_set("snaplist"));
        assert_eq!(state.model.snaplist.lock().unwrap().selections[0].name, "core20");
    }

    #[tokio::test]
    async fn network_subscription_put_then_delete_is_idempotent() {
        let state = test_state();
        let router = build_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("{}?socket_path=%2Ftmp%2Fa.socket", paths::NETWORK_SUBSCRIPTION.path))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("{}?socket_path=%2Ftmp%2Fa.socket", paths::NETWORK_SUBSCRIPTION.path))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn errors_wait_echoes_back_the_requested_reference() {
        let router = build_router(test_state());
        let envelope = envelope_for(
            router,
            Request::builder()
                .uri(format!("{}?error_ref=abc123", paths::ERRORS_WAIT.path))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let reference: ErrorReportRef = serde_json::from_value(envelope.result).unwrap();
        assert_eq!(reference.base, "abc123");
    }
}
