use serde_json::Value;

use crate::domain::run::RunId;

/// External collaborator that renders live previews
pub trait PreviewSink: Send + Sync {
    fn preview_ready(&self, run_id: &RunId, payload: &Value);
}

/// Default sink: records the preview in the log only
#[derive(Debug, Default)]
pub struct LoggingPreviewSink;

impl PreviewSink for LoggingPreviewSink {
    fn preview_ready(&self, run_id: &RunId, payload: &Value) {
        tracing::info!("Preview ready for run {}: {}", run_id, payload);
    }
}
