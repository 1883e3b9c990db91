use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use crate::domain::run::{AgentStatus, Prompt, RunId};
use crate::errors::ClientResult;

/// Validated body of the remote start call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub business_type: Option<String>,
    pub target_audience: Option<String>,
    pub include_auth: bool,
}

/// Server-side status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Generating,
    Ready,
    Deployed,
    Error,
    #[serde(other)]
    Unknown,
}

/// Stored per-agent record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteAgentStatus {
    pub status: AgentStatus,
    #[serde(default)]
    pub progress: i64,
}

/// The server's stored record of a run, as returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRunStatus {
    pub project_id: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub current_phase: String,
    #[serde(default)]
    pub agents: HashMap<String, RemoteAgentStatus>,
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default)]
    pub deployment_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Remote generation pipeline, request/response side
///
/// Implementations handle transport details; callers only see
/// [`crate::errors::ClientError`] variants.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Starts a run and returns its server-issued id
    async fn start(&self, request: &GenerationRequest) -> ClientResult<RunId>;

    /// Fetches the stored record of a run
    async fn fetch_status(&self, run_id: &RunId) -> ClientResult<RemoteRunStatus>;

    /// Streams the generated archive into `sink`, returning bytes written
    async fn download_archive(
        &self,
        run_id: &RunId,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> ClientResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_wire_body() {
        let request = GenerationRequest {
            prompt: Prompt::new("SaaS landing page").unwrap(),
            business_type: Some("saas".to_string()),
            target_audience: None,
            include_auth: true,
        };

        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "prompt": "SaaS landing page",
                "business_type": "saas",
                "target_audience": null,
                "include_auth": true
            })
        );
    }

    #[test]
    fn remote_status_parses_stored_record() {
        let record: RemoteRunStatus = serde_json::from_str(
            r#"{
                "project_id": "p1",
                "prompt": "ignored",
                "status": "generating",
                "progress": 26,
                "current_phase": "frontend",
                "agents": {
                    "agent_001": {"id": "agent_001", "name": "x", "phase": "analysis", "status": "complete", "progress": 100},
                    "agent_045": {"id": "agent_045", "name": "y", "phase": "frontend", "status": "active"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(record.status, RemoteStatus::Generating);
        assert_eq!(record.agents.len(), 2);
        assert_eq!(record.agents["agent_045"].progress, 0);
        assert!(record.github_repo.is_none());
    }

    #[test]
    fn unknown_remote_status_is_tolerated() {
        let record: RemoteRunStatus =
            serde_json::from_str(r#"{"project_id":"p1","status":"archived"}"#).unwrap();
        assert_eq!(record.status, RemoteStatus::Unknown);
    }
}
