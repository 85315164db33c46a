//! The JSON-RPC routes, driven through the router.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use hexya_core::{Authenticator, DenyAll, FixedPrincipal, HeaderAuthenticator, Module};
use hexya_web::WebModule;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(auth: Arc<dyn Authenticator>) -> Router {
    WebModule::new(Arc::new(common::dispatcher()), auth).routes()
}

async fn post(
    app: Router,
    uri: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let resp = app.oneshot(req.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn rpc(params: Value) -> Value {
    json!({"jsonrpc": "2.0", "method": "call", "id": 7, "params": params})
}

#[tokio::test]
async fn health() {
    let app = router(Arc::new(DenyAll));
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn call_kw_returns_result_envelope() {
    let app = router(Arc::new(FixedPrincipal(1)));
    let params = json!({
        "model": "Country",
        "method": "search_count",
        "args": [[["code", "=", "be"]]],
        "kwargs": {},
    });
    let uri = "/web/dataset/call_kw/Country/search_count";
    let (status, body) = post(app, uri, rpc(params), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"jsonrpc": "2.0", "id": 7, "result": 1}));
}

#[tokio::test]
async fn errors_are_wrapped() {
    let app = router(Arc::new(DenyAll));
    let params = json!({"model": "res.partner", "method": "search", "args": [[]], "kwargs": {}});
    let (status, body) = post(app, "/web/dataset/call_kw", rpc(params), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(7));
    assert!(body.get("result").is_none());
    assert_eq!(body["error"]["code"], json!(200));
    assert_eq!(body["error"]["data"]["name"], json!("AUTHENTICATION_REQUIRED"));
    assert_eq!(
        body["error"]["data"]["message"],
        json!("User must be logged in to call model method")
    );
}

#[tokio::test]
async fn user_from_header() {
    let params =
        json!({"model": "res.users", "method": "read", "args": [[1], ["login"]], "kwargs": {}});
    let (_, body) = post(
        router(Arc::new(HeaderAuthenticator)),
        "/web/dataset/call_kw",
        rpc(params.clone()),
        &[("x-hexya-uid", "1")],
    )
    .await;
    assert_eq!(body["result"], json!([{"id": 1, "login": "admin"}]));

    let app = router(Arc::new(HeaderAuthenticator));
    let (_, body) = post(app, "/web/dataset/call_kw", rpc(params), &[]).await;
    assert_eq!(body["error"]["data"]["name"], json!("AUTHENTICATION_REQUIRED"));
}

#[tokio::test]
async fn search_read_route() {
    let app = router(Arc::new(FixedPrincipal(1)));
    let params = json!({
        "model": "Country",
        "domain": [["code", "in", ["be", "fr"]]],
        "fields": ["name", "currency_id"],
        "limit": 1,
        "sort": "name",
        "context": {},
    });
    let (_, body) = post(app, "/web/dataset/search_read", rpc(params), &[]).await;
    let result = &body["result"];
    assert_eq!(result["length"], json!(2));
    assert_eq!(result["records"].as_array().unwrap().len(), 1);
    assert_eq!(result["records"][0]["name"], json!("Belgium"));
    assert_eq!(result["records"][0]["currency_id"], json!([1, "EUR"]));
}

#[tokio::test]
async fn call_button_without_action_answers_false() {
    let app = router(Arc::new(FixedPrincipal(1)));
    let params =
        json!({"model": "res.partner", "method": "check_constraints", "args": [[1]], "kwargs": {}});
    let (_, body) = post(app, "/web/dataset/call_button", rpc(params), &[]).await;
    assert_eq!(body["result"], json!(false));
}
