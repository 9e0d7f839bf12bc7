use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::base::{
    AuthBackend, BackendError, Credentials, Envelope, TokenGrant, LOGIN_PATH, LOGOUT_PATH,
    REFRESH_PATH,
};

/// Talks to the auth proxy over HTTP.
///
/// The reqwest client keeps its own cookie jar, which is where the
/// `refreshToken` cookie lives. Nothing in this crate can read it.
pub struct HttpAuthBackend {
    base_url: String,
    client: Client,
}

impl HttpAuthBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

fn network_error(e: reqwest::Error) -> BackendError {
    BackendError::Network(e.to_string())
}

#[async_trait::async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn refresh(&self) -> Result<TokenGrant, BackendError> {
        debug!("Requesting token refresh from {}", self.base_url);
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .send()
            .await
            .map_err(network_error)?;
        let envelope: Envelope<TokenGrant> = Self::read_json(response).await?;
        Ok(envelope.result)
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, BackendError> {
        debug!("Logging in '{}' via {}", credentials.email, self.base_url);
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(credentials)
            .send()
            .await
            .map_err(network_error)?;
        let envelope: Envelope<TokenGrant> = Self::read_json(response).await?;
        Ok(envelope.result)
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .send()
            .await
            .map_err(network_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Status(status.as_u16()))
        }
    }
}
