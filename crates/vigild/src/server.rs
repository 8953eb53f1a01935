use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use vigil_core::{FramePipeline, Session};

use crate::enrich::Enricher;

/// Shared by every connection. The pipeline and gallery are read-only; each
/// connection creates its own [`Session`].
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FramePipeline>,
    pub enricher: Enricher,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/ws", get(face_socket))
        .route("/api/face", get(face_socket))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.pipeline.config();
    let gallery = state.pipeline.gallery();
    Json(serde_json::json!({
        "service": "vigild",
        "version": env!("CARGO_PKG_VERSION"),
        "gallery_entries": gallery.len(),
        "identities": gallery.identity_count(),
        "frame_scale": config.frame_scale,
        "detection_method": config.detection_method.as_str(),
        "recognition_threshold": config.recognition_threshold,
        "enrichment": state.enricher.is_enabled(),
    }))
}

async fn face_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Receive binary frames until the peer goes away, answering each one with
/// a JSON array of face results. Frames are handled strictly in order.
async fn run_session(mut socket: WebSocket, state: AppState) {
    let session = Arc::new(Mutex::new(state.pipeline.session()));
    tracing::info!("session opened");

    while let Some(msg) = socket.recv().await {
        let bytes = match msg {
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "websocket receive failed");
                break;
            }
        };

        let reply = match handle_frame(&session, bytes, &state.enricher).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "frame handling failed, closing session");
                break;
            }
        };

        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }

    let session = session.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::info!(
        frames = session.frames_processed(),
        failed = session.frames_failed(),
        tracked = session.tracker().tracked_identities(),
        "session closed"
    );
}

/// Run one frame through the session on the blocking pool, enrich the
/// result, and render the reply.
async fn handle_frame(session: &Arc<Mutex<Session>>, bytes: Vec<u8>, enricher: &Enricher) -> Result<String> {
    let worker = Arc::clone(session);
    let result = tokio::task::spawn_blocking(move || {
        let mut session = worker.lock().unwrap_or_else(PoisonError::into_inner);
        session.process_bytes(&bytes, Instant::now())
    })
    .await
    .context("frame worker panicked")?;

    let faces = enricher.enrich(result).await;
    serde_json::to_string(&faces).context("failed to serialize frame result")
}
