//! Control-plane client contract tests
//!
//! A small axum server stands in for the control plane and records every
//! request it receives.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_agent::api::{ApiClient, ApplyOutcome, ControlPlane, DEFAULT_REQUEST_TIMEOUT};
use engine_agent::engine::{EngineSet, EngineVersions};
use engine_agent::AgentError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recorded {
    fn push(&self, path: &str, body: Value) {
        self.requests.lock().unwrap().push((path.to_string(), body));
    }

    fn take(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

async fn spawn_control_plane(recorded: Recorded) -> String {
    let app = Router::new()
        .route(
            "/agent/heartbeat",
            post(|State(r): State<Recorded>, Json(body): Json<Value>| async move {
                r.push("heartbeat", body);
                Json(json!({"ok": true}))
            }),
        )
        .route(
            "/agent/desired-config",
            get(
                |State(r): State<Recorded>, Query(query): Query<HashMap<String, String>>| async move {
                    let token = query.get("node_token").cloned().unwrap_or_default();
                    r.push("desired-config", json!({ "node_token": token }));
                    if token != "node secret&1" {
                        return (StatusCode::UNAUTHORIZED, "invalid node token").into_response();
                    }
                    Json(json!({
                        "node_id": "node-1",
                        "desired_config_revision": 8,
                        "applied_config_revision": 7,
                        "engine_awg2_enabled": false,
                        "engine_singbox_enabled": true,
                        "desired_config": {"inbounds": []}
                    }))
                    .into_response()
                },
            ),
        )
        .route(
            "/agent/apply-result",
            post(|State(r): State<Recorded>, Json(body): Json<Value>| async move {
                r.push("apply-result", body);
                StatusCode::OK
            }),
        )
        .route(
            "/agent/report-usage",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "usage store down") }),
        )
        .with_state(recorded);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn client(base: &str, token: &str) -> ApiClient {
    ApiClient::new(base, token, DEFAULT_REQUEST_TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_heartbeat_body() {
    let recorded = Recorded::default();
    let base = spawn_control_plane(recorded.clone()).await;
    let versions = EngineVersions {
        singbox: "sing-box version 1.11.0".to_string(),
        awg2: "timeout".to_string(),
    };

    client(&base, "tok").heartbeat(&versions).await.unwrap();

    assert_eq!(
        recorded.take(),
        vec![(
            "heartbeat".to_string(),
            json!({
                "node_token": "tok",
                "engine_awg2_version": "timeout",
                "engine_singbox_version": "sing-box version 1.11.0"
            })
        )]
    );
}

#[tokio::test]
async fn test_desired_config_escapes_token() {
    let recorded = Recorded::default();
    let base = spawn_control_plane(recorded.clone()).await;

    let desired = client(&base, "node secret&1").desired_config().await.unwrap();

    assert_eq!(desired.node_id, "node-1");
    assert!(desired.needs_apply());
    assert_eq!(desired.enabled(), EngineSet::new(true, false));
    assert!(desired.payload.contains_key("inbounds"));
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let recorded = Recorded::default();
    let base = spawn_control_plane(recorded.clone()).await;

    let err = client(&base, "wrong").desired_config().await.unwrap_err();
    assert!(matches!(err, AgentError::Api(_)));
    assert!(err
        .to_string()
        .ends_with("desired-config failed: 401: invalid node token"));

    let err = client(&base, "tok")
        .report_usage("3f0c", 1024, "dev-hash")
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .ends_with("report-usage failed: 500: usage store down"));
}

#[tokio::test]
async fn test_apply_result_body() {
    let recorded = Recorded::default();
    let base = spawn_control_plane(recorded.clone()).await;
    let err = AgentError::Validation("sing-box config validation failed: missing inbounds".into());

    client(&base, "tok")
        .apply_result(&ApplyOutcome::failed(8, &err))
        .await
        .unwrap();

    let requests = recorded.take();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].1,
        json!({
            "node_token": "tok",
            "applied_config_revision": 8,
            "status": "failed",
            "details": {"error": "sing-box config validation failed: missing inbounds"}
        })
    );
}
