#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use careermate_session::config::{extract_config, ConfigV1};
use careermate_session::routes::create_router;
use careermate_session::state::AppState;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tokio::net::TcpListener;

pub fn build_config(upstream_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
bind_address: 127.0.0.1:0
logging:
  level: "warn"
  format: "json"
upstream:
  base_url: "{upstream_url}"
  timeout_in_ms: 3000
session:
  storage:
    type: memory
guard:
  redirect_delay_ms: 0
"#
    );

    extract_config(&Figment::new().merge(Yaml::string(&yaml)))
        .expect("Failed to parse test config YAML")
}

pub fn build_app(config: ConfigV1) -> Router {
    let state = AppState::new(Arc::new(config)).expect("upstream client should build");
    create_router(state)
}

/// Serve the proxy on an ephemeral port and return its base URL.
pub async fn spawn_proxy(config: ConfigV1) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr: SocketAddr = listener.local_addr().expect("listener has an address");
    let app = build_app(config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("proxy server failed");
    });
    format!("http://{}", addr)
}

/// An access token as the backend would issue it. Signature is irrelevant to the client.
pub fn token_for(role: &str, email: &str) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": email,
            "scope": format!("ROLE_{}", role.to_uppercase()),
            "userId": 11,
            "name": "Integration User",
            "exp": 4_102_444_800i64
        }),
        &EncodingKey::from_secret(b"upstream-secret"),
    )
    .expect("Failed to create token")
}

pub fn token_body(token: &str, expires_in: i64) -> String {
    json!({ "result": { "accessToken": token, "expiresIn": expires_in } }).to_string()
}
