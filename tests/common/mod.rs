//! Loopback HTTP server shared by the integration tests

#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::{any, get},
};
use serde_json::{Map, Value, json};

/// Echo the request back as JSON
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                json!(value.to_str().unwrap_or_default()),
            )
        })
        .collect();

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body": body,
    }))
}

async fn status(Path(code): Path<u16>) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": format!("status {code}")})))
}

fn router() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", any(status))
        .route(
            "/nested",
            get(|| async { Json(json!({"data": {"items": [1, 2, 3], "users": [{"name": "Alice"}]}})) }),
        )
        .route("/text", get(|| async { "plain body" }))
        .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        )
}

/// Start the loopback server, returning its base URL
pub async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router()).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
