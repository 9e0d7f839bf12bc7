//! Auth proxy handlers.
//!
//! Each route forwards to the upstream backend and relays its answer,
//! including `Set-Cookie`, so the refresh credential only ever travels as an
//! HTTP-only cookie between the browser and the backend.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::{Credentials, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

const UPSTREAM_REFRESH_PATH: &str = "/api/auth/refresh";
const UPSTREAM_TOKEN_PATH: &str = "/api/auth/token";
const UPSTREAM_LOGOUT_PATH: &str = "/api/auth/logout";

/// Registers the auth proxy routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(REFRESH_PATH, post(token_refresh))
        .route(LOGIN_PATH, post(login))
        .route(LOGOUT_PATH, post(logout))
}

fn upstream_unreachable(e: reqwest::Error) -> HTTPError {
    warn!("Upstream auth backend unreachable: {}", e);
    HTTPError::new(StatusCode::BAD_GATEWAY, "Auth backend unreachable")
}

/// Copy status, content type, cookies and body from the upstream response.
async fn relay(upstream: reqwest::Response) -> Result<Response, HTTPError> {
    let status = upstream.status();
    let cookies: Vec<HeaderValue> = upstream.headers().get_all(SET_COOKIE).iter().cloned().collect();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    let body = upstream.bytes().await.map_err(|e| {
        warn!("Failed to read upstream body: {}", e);
        HTTPError::new(StatusCode::BAD_GATEWAY, "Auth backend response unreadable")
    })?;

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    for cookie in cookies {
        builder = builder.header(SET_COOKIE, cookie);
    }
    builder.body(Body::from(body)).map_err(|e| {
        HTTPError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to build response: {}", e),
        )
    })
}

/// POST /api/auth/token-refresh -> upstream PUT /api/auth/refresh, cookie forwarded.
async fn token_refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, HTTPError> {
    let mut request = state.upstream.put(state.upstream_url(UPSTREAM_REFRESH_PATH));
    match headers.get(COOKIE) {
        Some(cookie) => request = request.header(COOKIE, cookie.clone()),
        None => debug!("Token refresh requested without cookies"),
    }
    let response = request.send().await.map_err(upstream_unreachable)?;
    if !response.status().is_success() {
        info!("Upstream refresh answered {}", response.status());
    }
    relay(response).await
}

/// POST /api/auth/login -> upstream POST /api/auth/token.
async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Response, HTTPError> {
    debug!("Proxying login for '{}'", credentials.email);
    let response = state
        .upstream
        .post(state.upstream_url(UPSTREAM_TOKEN_PATH))
        .json(&credentials)
        .send()
        .await
        .map_err(upstream_unreachable)?;
    if !response.status().is_success() {
        info!("Upstream login answered {}", response.status());
    }
    relay(response).await
}

/// POST /api/auth/logout. The refresh cookie is expired whatever upstream says.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut request = state.upstream.post(state.upstream_url(UPSTREAM_LOGOUT_PATH));
    if let Some(cookie) = headers.get(COOKIE) {
        request = request.header(COOKIE, cookie.clone());
    }
    match request.send().await {
        Ok(response) if response.status().is_success() => debug!("Upstream logout succeeded"),
        Ok(response) => warn!("Upstream logout answered {}", response.status()),
        Err(e) => warn!("Upstream logout failed: {}", e),
    }

    let expired = format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        state.config.upstream.cookie_name
    );
    let mut response = Json(json!({ "result": "logged out" })).into_response();
    match HeaderValue::from_str(&expired) {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        Err(e) => warn!("Cookie name produces an invalid header: {}", e),
    }
    response
}
