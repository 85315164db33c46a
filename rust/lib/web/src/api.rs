//! JSON-RPC routes of the web client.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use hexya_core::{Authenticator, Module, RpcError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::{CallRequest, Dispatcher, SearchReadParams};

/// Shared state of the routes.
#[derive(Clone)]
pub struct WebState {
    pub dispatcher: Arc<Dispatcher>,
    pub auth: Arc<dyn Authenticator>,
}

/// A JSON-RPC 2.0 request. Only `params` is interpreted.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub params: Value,
}

fn envelope(id: Value, result: Result<Value, RpcError>) -> Json<Value> {
    Json(match result {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err(err) => json!({"jsonrpc": "2.0", "id": id, "error": err.to_rpc_error()}),
    })
}

fn params<T: DeserializeOwned>(raw: Value) -> Result<T, RpcError> {
    serde_json::from_value(raw)
        .map_err(|e| RpcError::TypeMismatch(format!("invalid params: {}", e)))
}

fn call(state: &WebState, headers: &HeaderMap, raw: Value) -> Result<Value, RpcError> {
    let principal = state.auth.principal(headers)?;
    let req: CallRequest = params(raw)?;
    state.dispatcher.execute(principal, &req)
}

/// POST /web/dataset/call_kw
async fn call_kw(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<RpcRequest>,
) -> Json<Value> {
    envelope(req.id, call(&state, &headers, req.params))
}

/// POST /web/dataset/call_button
///
/// Buttons answer with an action to run, or `false`.
async fn call_button(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<RpcRequest>,
) -> Json<Value> {
    let result = call(&state, &headers, req.params).map(|value| {
        if value.get("type").is_some() {
            value
        } else {
            Value::Bool(false)
        }
    });
    envelope(req.id, result)
}

/// POST /web/dataset/search_read
async fn search_read(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<RpcRequest>,
) -> Json<Value> {
    let result = (|| {
        let principal = state.auth.principal(&headers)?;
        let params: SearchReadParams = params(req.params)?;
        let found = state.dispatcher.search_read(principal, &params)?;
        serde_json::to_value(found).map_err(|e| RpcError::Internal(e.to_string()))
    })();
    envelope(req.id, result)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Routes of the web module.
pub struct WebModule {
    state: WebState,
}

impl WebModule {
    pub fn new(dispatcher: Arc<Dispatcher>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            state: WebState { dispatcher, auth },
        }
    }
}

impl Module for WebModule {
    fn name(&self) -> &str {
        "web"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/web/dataset/call_kw", post(call_kw))
            .route("/web/dataset/call_kw/{*path}", post(call_kw))
            .route("/web/dataset/call_button", post(call_button))
            .route("/web/dataset/search_read", post(search_read))
            .route("/health", get(health))
            .with_state(self.state.clone())
    }
}
