//! The reverse side of the subscription protocol (spec.md §4.3
//! "Subscription fan-out"): the agent's own socket receives exactly the
//! callbacks `subiquity_server::netclient::HttpNetEventClient` sends, so
//! these handlers mirror that client's request shapes one-for-one.

use axum::Router;
use axum::routing::post;
use axum::{Json, response::IntoResponse};
use log::info;
use subiquity_core::events::{
    ApplyErrorEvent, ApplyStartingEvent, ApplyStoppingEvent, RouteWatchEvent, UpdateLinkEvent,
};

async fn update_link(Json(event): Json<UpdateLinkEvent>) -> impl IntoResponse {
    info!("update_link: {event:?}");
    Json(serde_json::Value::Null)
}

async fn route_watch(Json(event): Json<RouteWatchEvent>) -> impl IntoResponse {
    info!("route_watch: {event:?}");
    Json(serde_json::Value::Null)
}

async fn apply_starting(Json(event): Json<ApplyStartingEvent>) -> impl IntoResponse {
    info!("apply_starting: {event:?}");
    Json(serde_json::Value::Null)
}

async fn apply_stopping(Json(event): Json<ApplyStoppingEvent>) -> impl IntoResponse {
    info!("apply_stopping: {event:?}");
    Json(serde_json::Value::Null)
}

async fn apply_error(Json(event): Json<ApplyErrorEvent>) -> impl IntoResponse {
    info!("apply_error: {event:?}");
    Json(serde_json::Value::Null)
}

pub fn build_callback_router() -> Router {
    Router::new()
        .route("/update_link", post(update_link))
        .route("/route_watch", post(route_watch))
        .route("/apply_starting", post(apply_starting))
        .route("/apply_stopping", post(apply_stopping))
        .route("/apply_error", post(apply_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use subiquity_core::types::{LinkAction, NetDevInfo};
    use tower::ServiceExt;

    async fn post(path: &str, body: serde_json::Value) -> StatusCode {
        let router = build_callback_router();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn update_link_accepts_a_well_formed_event() {
        let event = UpdateLinkEvent {
            act: LinkAction::NEW,
            info: NetDevInfo {
                name: "eth0".to_string(),
                typ: "ethernet".to_string(),
                is_connected: true,
                addresses: vec!["10.0.0.2/24".to_string()],
            },
        };
        let status = post("/update_link", serde_json::to_value(&event).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn route_watch_accepts_a_well_formed_event() {
        let event = RouteWatchEvent {
            action: LinkAction::CHANGE,
            ifindex: 3,
        };
        let status = post("/route_watch", serde_json::to_value(&event).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn apply_starting_and_stopping_accept_empty_bodies() {
        assert_eq!(post("/apply_starting", serde_json::json!({})).await, StatusCode::OK);
        assert_eq!(post("/apply_stopping", serde_json::json!({})).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn apply_error_accepts_a_stage_name() {
        let status = post("/apply_error", serde_json::json!({"stage": "curtin"})).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let router = build_callback_router();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update_link")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
