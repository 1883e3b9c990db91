//! Network adapter integration tests
//!
//! These tests run the HTTP and WebSocket adapters against a local axum
//! server standing in for the generation backend:
//! - Start call body and response handling
//! - Status record decoding
//! - Event stream frames through a full controller run
//! - Archive download to disk

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use flowforge_client::client::{ReconnectPolicy, RunController, StartRequest, StreamOptions};
use flowforge_client::domain::run::{AgentStatus, Prompt, RunId, RunLifecycle};
use flowforge_client::domain::services::{
    EventConnection, EventSource, GenerationRequest, GenerationService, RemoteStatus,
};
use flowforge_client::errors::ClientError;
use flowforge_client::infrastructure::{HttpGenerationService, WebSocketEventSource};

const PROJECT_ID: &str = "5d1c7a90-3e2f-4b6a-8c1d-9f0e2a4b6c8d";
const ARCHIVE: &[u8] = b"PK\x03\x04fake-zip-body";

#[derive(Clone, Default)]
struct Backend {
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn generate(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    if body["prompt"] == "reject me" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "pipeline offline").into_response();
    }
    backend.requests.lock().unwrap().push(body);
    Json(json!({"project_id": PROJECT_ID, "status": "generating"})).into_response()
}

async fn project(Path(id): Path<String>) -> Response {
    if id != PROJECT_ID {
        return (StatusCode::NOT_FOUND, "Project not found").into_response();
    }
    Json(json!({
        "project_id": PROJECT_ID,
        "status": "generating",
        "progress": 27,
        "current_phase": "frontend",
        "agents": {"agent_045": {"status": "active", "progress": 50}},
        "github_repo": null
    }))
    .into_response()
}

async fn download(Path(id): Path<String>) -> Response {
    if id != PROJECT_ID {
        return (StatusCode::NOT_FOUND, "Project not found").into_response();
    }
    Bytes::from_static(ARCHIVE).into_response()
}

async fn events(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(replay_run)
}

async fn replay_run(mut socket: WebSocket) {
    let frames = [
        json!({"type": "agent_update", "agent": {"id": "agent_001", "name": "Market Research Analyst", "phase": "analysis"}, "status": "active"}),
        json!({"type": "agent_update", "agent": {"id": "agent_001"}, "status": "complete"}),
        json!({"type": "phase_update", "phase": "design", "progress": 25}),
        json!({"type": "generation_complete", "github_repo": "https://github.com/acme/site", "deployment_url": "https://acme.github.io/site"}),
    ];

    let _ = socket.send(Message::Binary(b"{\"type\":\"heartbeat\"}".to_vec())).await;
    for frame in frames {
        if socket.send(Message::Text(frame.to_string())).await.is_err() {
            return;
        }
    }
    // hold the socket until the client hangs up
    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}

async fn spawn_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/api/project/:id", get(project))
        .route("/api/project/:id/download", get(download))
        .route("/api/ws/:id", get(events))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn http_service(addr: SocketAddr) -> HttpGenerationService {
    HttpGenerationService::new(format!("http://{}/api", addr), Duration::from_secs(5)).unwrap()
}

fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: Prompt::new(prompt).unwrap(),
        business_type: Some("bakery".to_string()),
        target_audience: None,
        include_auth: true,
    }
}

#[tokio::test]
async fn start_posts_request_and_returns_project_id() {
    let (addr, backend) = spawn_backend().await;
    let service = http_service(addr);

    let run_id = service.start(&request("Bakery landing page")).await.unwrap();

    assert_eq!(run_id.as_str(), PROJECT_ID);
    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["prompt"], "Bakery landing page");
    assert_eq!(requests[0]["business_type"], "bakery");
    assert_eq!(requests[0]["target_audience"], Value::Null);
    assert_eq!(requests[0]["include_auth"], true);
}

#[tokio::test]
async fn rejected_start_is_transport_error() {
    let (addr, _) = spawn_backend().await;
    let service = http_service(addr);

    let result = service.start(&request("reject me")).await;

    match result {
        Err(ClientError::Transport(message)) => {
            assert!(message.contains("500"));
            assert!(message.contains("pipeline offline"));
        }
        other => panic!("Expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = http_service(addr).start(&request("Bakery")).await;
    assert!(matches!(result, Err(ClientError::Transport(_))));
}

#[tokio::test]
async fn fetch_status_decodes_stored_record() {
    let (addr, _) = spawn_backend().await;
    let service = http_service(addr);

    let status = service.fetch_status(&RunId::new(PROJECT_ID)).await.unwrap();

    assert_eq!(status.status, RemoteStatus::Generating);
    assert_eq!(status.progress, 27);
    assert_eq!(status.current_phase, "frontend");
    assert_eq!(status.agents["agent_045"].status, AgentStatus::Active);
    assert_eq!(status.github_repo, None);
}

#[tokio::test]
async fn unknown_project_download_fails() {
    let (addr, _) = spawn_backend().await;
    let service = http_service(addr);
    let mut sink = Vec::new();

    let result = service
        .download_archive(&RunId::new("missing"), &mut sink)
        .await;

    assert!(matches!(result, Err(ClientError::Download(_))));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn websocket_connection_yields_text_frames() {
    let (addr, _) = spawn_backend().await;
    let source = WebSocketEventSource::new(format!("ws://{}/api/", addr));
    assert_eq!(
        source.stream_url(&RunId::new(PROJECT_ID)),
        format!("ws://{}/api/ws/{}", addr, PROJECT_ID)
    );

    let mut connection = source.connect(&RunId::new(PROJECT_ID)).await.unwrap();

    let first = connection.next_message().await.unwrap().unwrap();
    assert_eq!(first, r#"{"type":"heartbeat"}"#);
    let second = connection.next_message().await.unwrap().unwrap();
    assert!(second.contains("agent_001"));

    connection.close().await;
    connection.close().await;
    assert_eq!(connection.next_message().await.unwrap(), None);
}

#[tokio::test]
async fn full_run_against_backend() {
    let (addr, backend) = spawn_backend().await;
    let options = StreamOptions {
        reconnect: ReconnectPolicy::disabled(),
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Some(Duration::from_secs(5)),
    };
    let controller = RunController::new(
        Arc::new(http_service(addr)),
        Arc::new(WebSocketEventSource::new(format!("ws://{}/api", addr))),
        options,
    );

    let run_id = controller
        .start(StartRequest::new("  Bakery landing page ").business_type("bakery"))
        .await
        .unwrap();
    let result = controller.wait_for_completion().await.unwrap();

    assert_eq!(run_id.as_str(), PROJECT_ID);
    assert_eq!(backend.requests.lock().unwrap()[0]["prompt"], "Bakery landing page");
    assert_eq!(result.github_repo.as_deref(), Some("https://github.com/acme/site"));

    let view = controller.current_view();
    assert_eq!(view.state.lifecycle(), RunLifecycle::Complete);
    assert_eq!(view.state.agent("agent_001").unwrap().status, AgentStatus::Complete);
    assert_eq!(view.progress.overall_progress, 100);

    let dir = tempfile::tempdir().unwrap();
    let path = controller.download_archive(dir.path()).await.unwrap();
    assert_eq!(path.file_name().unwrap(), "flowforge-5d1c7a90.zip");
    assert_eq!(std::fs::read(&path).unwrap(), ARCHIVE);

    controller.close().await;
}

/// Accepts TCP connections and never answers the WebSocket handshake
async fn spawn_silent_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

#[tokio::test]
async fn stalled_stream_handshake_fails_start() {
    let (addr, _) = spawn_backend().await;
    let silent = spawn_silent_listener().await;
    let options = StreamOptions {
        reconnect: ReconnectPolicy::disabled(),
        connect_timeout: Duration::from_millis(200),
        idle_timeout: Some(Duration::from_secs(5)),
    };
    let controller = RunController::new(
        Arc::new(http_service(addr)),
        Arc::new(WebSocketEventSource::new(format!("ws://{}/api", silent))),
        options,
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(3),
        controller.start(StartRequest::new("Bakery landing page")),
    )
    .await
    .expect("start must not hang on the stream handshake");

    assert!(matches!(outcome, Err(ClientError::Transport(_))));
    let state = controller.current_state();
    assert_eq!(state.lifecycle(), RunLifecycle::Idle);
    assert_eq!(state.run_id().map(|id| id.as_str()), Some(PROJECT_ID));
}
