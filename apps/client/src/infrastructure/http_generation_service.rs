use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::domain::run::RunId;
use crate::domain::services::{GenerationRequest, GenerationService, RemoteRunStatus};
use crate::errors::{ClientError, ClientResult};

#[derive(Debug, Deserialize)]
struct StartResponse {
    project_id: String,
}

/// HTTP implementation of GenerationService
///
/// Talks to the pipeline's REST surface under `api_base`
/// (for example `http://localhost:8001/api`).
pub struct HttpGenerationService {
    client: Client,
    api_base: String,
    request_timeout: Duration,
}

impl HttpGenerationService {
    /// Creates a new HttpGenerationService
    ///
    /// # Arguments
    /// * `api_base` - Base URL of the API
    /// * `request_timeout` - Timeout for start and status calls; archive
    ///   downloads are not bounded by it
    pub fn new(api_base: impl Into<String>, request_timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

async fn failure_detail(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn start(&self, request: &GenerationRequest) -> ClientResult<RunId> {
        let url = self.url("/generate");
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("Start request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "Start request rejected: {}",
                failure_detail(response).await
            )));
        }

        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(format!("Invalid start response: {}", e)))?;

        Ok(RunId::new(body.project_id))
    }

    async fn fetch_status(&self, run_id: &RunId) -> ClientResult<RemoteRunStatus> {
        let url = self.url(&format!("/project/{}", run_id));
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("Status request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "Status request rejected: {}",
                failure_detail(response).await
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Transport(format!("Invalid status response: {}", e)))
    }

    async fn download_archive(
        &self,
        run_id: &RunId,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> ClientResult<u64> {
        let url = self.url(&format!("/project/{}/download", run_id));
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Download(failure_detail(response).await));
        }

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ClientError::Download(e.to_string()))?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| ClientError::Download(e.to_string()))?;
            written += chunk.len() as u64;
        }
        sink.flush()
            .await
            .map_err(|e| ClientError::Download(e.to_string()))?;

        Ok(written)
    }
}
