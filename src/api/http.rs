//! HTTP transport: the wire contract clients and peer nodes speak.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::coordinator::NodeCoordinator;

pub struct AppState {
    pub node: Arc<NodeCoordinator>,
    /// One-shot delay, in seconds, injected before the next `PUT /message`
    /// handling. Set by `POST /delay`, consumed and cleared by the next
    /// `PUT /message` call. Test-only aid for simulating a slow follower.
    delay_seconds: AtomicU64,
}

impl AppState {
    pub fn new(node: Arc<NodeCoordinator>) -> Self {
        Self {
            node,
            delay_seconds: AtomicU64::new(0),
        }
    }
}

pub struct HttpServer {
    state: Arc<AppState>,
    bind_address: String,
}

impl HttpServer {
    pub fn new(node: Arc<NodeCoordinator>, bind_address: String) -> Self {
        Self {
            state: Arc::new(AppState::new(node)),
            bind_address,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn start(&self) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        tracing::info!(address = %self.bind_address, "HTTP API listening");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Internal(e.to_string()))?;
        Ok(())
    }
}

fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/message", post(add_value).put(set_value))
        .route("/messages", get(get_values))
        .route("/heartbeat", get(heartbeat))
        .route("/delay", post(set_delay).get(get_delay))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct NewValue {
    value: String,
    write_concern: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SyncValue {
    key: u64,
    value: String,
}

#[derive(Debug, Deserialize)]
struct DelayValue {
    value: u64,
}

#[derive(Debug, Serialize)]
struct DelayResponse {
    delay: u64,
}

async fn add_value(State(state): State<Arc<AppState>>, Json(input): Json<NewValue>) -> impl IntoResponse {
    match state.node.add_value(input.value, input.write_concern).await {
        Ok(_) => (StatusCode::CREATED, Json(true)).into_response(),
        Err(err) => mode_error_response(err),
    }
}

async fn set_value(State(state): State<Arc<AppState>>, Json(input): Json<SyncValue>) -> impl IntoResponse {
    let pending_delay = state.delay_seconds.swap(0, Ordering::SeqCst);
    if pending_delay > 0 {
        tokio::time::sleep(std::time::Duration::from_secs(pending_delay)).await;
    }

    match state.node.set_value(input.key, input.value) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => mode_error_response(err),
    }
}

async fn get_values(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.node.get_values()))
}

async fn heartbeat() -> impl IntoResponse {
    StatusCode::OK
}

async fn set_delay(
    State(state): State<Arc<AppState>>,
    Json(input): Json<DelayValue>,
) -> impl IntoResponse {
    state.delay_seconds.store(input.value, Ordering::SeqCst);
    Json(DelayResponse {
        delay: state.delay_seconds.load(Ordering::SeqCst),
    })
}

async fn get_delay(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DelayResponse {
        delay: state.delay_seconds.load(Ordering::SeqCst),
    })
}

fn mode_error_response(err: crate::Error) -> axum::response::Response {
    (StatusCode::METHOD_NOT_ALLOWED, Json(err.to_string())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, WorkMode};
    use std::collections::HashMap;

    fn master_state() -> Arc<AppState> {
        let config = Config {
            work_mode: WorkMode::Master,
            app_name: "master".into(),
            secondaries: HashMap::new(),
            quorum: 1,
            heartbeat_interval_seconds: 5,
        };
        let node = Arc::new(NodeCoordinator::new_master(&config, reqwest::Client::new()));
        Arc::new(AppState::new(node))
    }

    #[tokio::test]
    async fn add_value_returns_201_with_true_body() {
        let state = master_state();
        let response = add_value(
            State(state),
            Json(NewValue { value: "a".into(), write_concern: None }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn set_value_on_master_returns_405() {
        let state = master_state();
        let response = set_value(State(state), Json(SyncValue { key: 1, value: "a".into() }))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn get_values_returns_consistent_prefix() {
        let state = master_state();
        add_value(
            State(state.clone()),
            Json(NewValue { value: "a".into(), write_concern: None }),
        )
        .await;
        let response = get_values(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn heartbeat_returns_200() {
        let response = heartbeat().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delay_round_trip() {
        let state = master_state();
        let response = set_delay(State(state.clone()), Json(DelayValue { value: 7 })).await;
        let bytes = axum::body::to_bytes(response.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: DelayResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.delay, 7);

        let get_response = get_delay(State(state)).await.into_response();
        let bytes = axum::body::to_bytes(get_response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: DelayResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.delay, 7);
    }
}
