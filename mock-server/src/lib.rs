//! Local HTTP server with the response shapes the request engine must
//! handle: plain replies, redirect chains, absolute and broken redirects,
//! request echo, oversized bodies and JSON with `\u` escapes.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, Request},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw of the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Body served by `/unicode`, escaped the way translation APIs do.
pub const UNICODE_BODY: &str = r#"{"translatedText":"\u4f60\u597d","match":1}"#;

pub fn app() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/redirect/{n}", get(redirect_chain))
        .route("/moved", get(moved))
        .route("/absolute", get(absolute))
        .route("/no-location", get(no_location))
        .route("/echo", any(echo))
        .route("/large/{size}", get(large))
        .route("/unicode", get(unicode))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("mock server listening on {addr}");
    }
    axum::serve(listener, app()).await
}

async fn ok() -> &'static str {
    "ok"
}

/// `/redirect/n` answers 302 to `/redirect/n-1`; `/redirect/0` answers 200.
async fn redirect_chain(Path(n): Path<u32>) -> Response {
    if n == 0 {
        return (StatusCode::OK, "done").into_response();
    }
    found(StatusCode::FOUND, &format!("/redirect/{}", n - 1))
}

async fn moved() -> Response {
    found(StatusCode::MOVED_PERMANENTLY, "/ok")
}

/// Redirects with a full URL built from the request's own `Host`.
async fn absolute(headers: HeaderMap) -> Response {
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    found(StatusCode::FOUND, &format!("http://{host}/ok"))
}

async fn no_location() -> StatusCode {
    StatusCode::FOUND
}

async fn echo(request: Request) -> Result<Json<Echo>, StatusCode> {
    let (parts, body) = request.into_parts();
    let body: Bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();
    Ok(Json(Echo {
        method: parts.method.to_string(),
        path: parts.uri.path_and_query().map_or("/", |p| p.as_str()).to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }))
}

async fn large(Path(size): Path<usize>) -> Vec<u8> {
    vec![b'x'; size]
}

async fn unicode() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], UNICODE_BODY)
}

fn found(status: StatusCode, location: &str) -> Response {
    (status, [(header::LOCATION, location.to_string())]).into_response()
}
