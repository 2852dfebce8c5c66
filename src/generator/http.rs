//! HTTP client for a JSON image-generation endpoint.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::ImageGenerator;
use crate::error::{Error, Result};
use crate::model::{ArtifactUrl, GenerationRequest};

/// Response body. Either field may be present; `error` wins.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    image_url: Option<String>,
    error: Option<String>,
}

/// POSTs each request as JSON and expects `{ "imageUrl": ... }` back.
pub struct HttpImageGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl HttpImageGenerator {
    /// Build a client. `timeout` bounds each call end to end.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ArtifactUrl> {
        let mut req = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(subject = %request.subject_id, %status, "generator responded");

        if !status.is_success() {
            let detail = serde_json::from_str::<GenerateResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(Error::Generation(format!("status {status}: {detail}")));
        }

        match serde_json::from_str::<GenerateResponse>(&body)? {
            GenerateResponse {
                error: Some(error), ..
            } => Err(Error::Generation(error)),
            GenerateResponse {
                image_url: Some(url),
                ..
            } => Ok(ArtifactUrl(url)),
            _ => Err(Error::Generation(
                "response carried neither imageUrl nor error".to_string(),
            )),
        }
    }
}
