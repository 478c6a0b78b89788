//! Shared fixtures: an in-process participant registry served over HTTP.
//!
//! The registry runs axum on its own thread and current-thread runtime, so
//! tests can drive it with the blocking client from a plain `#[test]`.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use claimtrust::registry::{
    BundleRequest, BundleResponse, ClaimsResponse, InMemoryDirectory, ParticipantRecord,
};
use claimtrust::{ClaimSet, KeyPair, ParticipantIdentity, RegistryVerifier};
use std::io::Write;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(Clone)]
struct AppState {
    verifier: Arc<RegistryVerifier<Arc<InMemoryDirectory>>>,
    api_key: Option<String>,
    hits: Arc<AtomicUsize>,
    /// Non-zero forces every response to this status
    forced_status: Arc<AtomicU16>,
}

pub struct MockRegistry {
    pub base_url: String,
    pub directory: Arc<InMemoryDirectory>,
    hits: Arc<AtomicUsize>,
    forced_status: Arc<AtomicU16>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockRegistry {
    pub fn start() -> Self {
        Self::start_with_api_key(None)
    }

    pub fn start_with_api_key(api_key: Option<&str>) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let forced_status = Arc::new(AtomicU16::new(0));

        let state = AppState {
            verifier: Arc::new(RegistryVerifier::new(directory.clone())),
            api_key: api_key.map(str::to_string),
            hits: hits.clone(),
            forced_status: forced_status.clone(),
        };
        let app = Router::new()
            .route("/api/participants/verification", post(verify))
            .route("/api/participants/:participant_id", get(lookup))
            .with_state(state);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = rx.await;
                    })
                    .await
                    .unwrap();
            });
        });

        Self {
            base_url: format!("http://{}/api/participants", addr),
            directory,
            hits,
            forced_status,
            shutdown: Some(tx),
        }
    }

    /// Generate keys for a participant, register it and return its identity.
    pub fn enroll(&self, participant_id: &str, claims: serde_json::Value) -> ParticipantIdentity {
        let keypair = KeyPair::generate();
        let claims = ClaimSet::from_json(claims).unwrap();
        self.directory.register(
            participant_id,
            ParticipantRecord {
                public_key_pem: keypair.public_key().to_pem().unwrap(),
                claims: claims.clone(),
            },
        );
        ParticipantIdentity::from_parts(participant_id, claims, keypair).unwrap()
    }

    /// Change what the registry holds for a participant.
    pub fn set_claims(&self, participant_id: &str, claims: serde_json::Value) {
        assert!(self
            .directory
            .update_claims(participant_id, ClaimSet::from_json(claims).unwrap()));
    }

    /// Answer every request with `status` until [`Self::recover`].
    pub fn fail_with(&self, status: u16) {
        self.forced_status.store(status, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.forced_status.store(0, Ordering::SeqCst);
    }

    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockRegistry {
    fn drop(&mut self) {
        // Not joined: idle keep-alive connections would hold graceful shutdown open
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn forced(state: &AppState) -> Option<Response> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match state.forced_status.load(Ordering::SeqCst) {
        0 => None,
        code => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Some((status, "forced failure").into_response())
        }
    }
}

async fn verify(State(state): State<AppState>, Json(request): Json<BundleRequest>) -> Response {
    if let Some(response) = forced(&state) {
        return response;
    }
    let result = state.verifier.verify(&request);
    Json(BundleResponse::from_result(&result)).into_response()
}

async fn lookup(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = forced(&state) {
        return response;
    }
    if let Some(expected) = &state.api_key {
        let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    match state.verifier.registered_claims(&participant_id) {
        Some(claims) => Json(ClaimsResponse { claims }).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Write `content` to a fresh temp file.
pub fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// A base URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/participants", addr)
}
