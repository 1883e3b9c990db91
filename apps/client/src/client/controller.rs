use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};

use super::stream::{EventStreamClient, StreamHandler, StreamOptions};
use crate::agents::AgentCatalog;
use crate::domain::progress::{PhaseProgressAggregator, ProgressReport};
use crate::domain::run::{FailureKind, Prompt, RunEvent, RunId, RunLifecycle, RunState, TerminalResult};
use crate::domain::services::{
    EventSource, GenerationRequest, GenerationService, LoggingPreviewSink, PreviewSink, RemoteRunStatus,
};
use crate::errors::{ClientError, ClientResult};

/// Caller input for starting a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub prompt: String,
    pub business_type: Option<String>,
    pub target_audience: Option<String>,
    pub include_auth: bool,
}

impl StartRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn business_type(mut self, business_type: impl Into<String>) -> Self {
        self.business_type = Some(business_type.into());
        self
    }

    pub fn target_audience(mut self, target_audience: impl Into<String>) -> Self {
        self.target_audience = Some(target_audience.into());
        self
    }

    pub fn include_auth(mut self, include_auth: bool) -> Self {
        self.include_auth = include_auth;
        self
    }

    /// Validates the prompt and normalizes blank optional fields to `None`
    fn validate(self) -> ClientResult<GenerationRequest> {
        let prompt = Prompt::new(&self.prompt).map_err(ClientError::Validation)?;
        Ok(GenerationRequest {
            prompt,
            business_type: non_blank(self.business_type),
            target_audience: non_blank(self.target_audience),
            include_auth: self.include_auth,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Run state together with its derived progress views
#[derive(Debug, Clone)]
pub struct RunView {
    pub state: Arc<RunState>,
    pub progress: ProgressReport,
}

/// File name the archive of `run_id` is saved under
pub fn archive_file_name(run_id: &RunId) -> String {
    format!("flowforge-{}.zip", run_id.short())
}

/// Public entry point for starting and observing generation runs
///
/// At most one run is live. Starting a new run while one is generating
/// closes the previous stream and discards its state.
///
/// All mutation of the published [`RunState`] happens on the stream
/// worker of the live run, except the reset and revert performed by
/// [`RunController::start`] while no worker exists. Readers get
/// immutable snapshots and never block the writer.
pub struct RunController {
    catalog: AgentCatalog,
    aggregator: PhaseProgressAggregator,
    service: Arc<dyn GenerationService>,
    source: Arc<dyn EventSource>,
    preview: Arc<dyn PreviewSink>,
    options: StreamOptions,
    snapshot: Arc<watch::Sender<Arc<RunState>>>,
    session: Mutex<Option<EventStreamClient>>,
}

impl RunController {
    pub fn new(
        service: Arc<dyn GenerationService>,
        source: Arc<dyn EventSource>,
        options: StreamOptions,
    ) -> Self {
        let catalog = AgentCatalog::new();
        let (snapshot, _) = watch::channel(Arc::new(RunState::new(&catalog)));

        Self {
            catalog,
            aggregator: PhaseProgressAggregator::new(catalog),
            service,
            source,
            preview: Arc::new(LoggingPreviewSink),
            options,
            snapshot: Arc::new(snapshot),
            session: Mutex::new(None),
        }
    }

    /// Replaces the collaborator that receives `preview_ready` payloads
    pub fn with_preview_sink(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = preview;
        self
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    /// Starts a new run
    ///
    /// # Returns
    /// * `Ok(RunId)` - Run started and its event stream is open
    /// * `Err(ClientError::Validation)` - Blank prompt; state unchanged
    /// * `Err(ClientError::Transport)` - Start call or stream open failed;
    ///   lifecycle reverted to idle
    pub async fn start(&self, request: StartRequest) -> ClientResult<RunId> {
        let request = request.validate()?;

        let mut session = self.session.lock().await;
        if let Some(mut previous) = session.take() {
            tracing::info!("Superseding run {}", previous.run_id());
            previous.close().await;
        }

        let mut state = RunState::begin(&self.catalog);
        self.publish(state.clone());
        tracing::info!("Starting generation run");

        let run_id = match self.service.start(&request).await {
            Ok(run_id) => run_id,
            Err(e) => {
                self.abandon(state, &e);
                return Err(e);
            }
        };
        state.attach_run(run_id.clone());
        self.publish(state.clone());

        let writer = RunStateWriter {
            run_id: run_id.clone(),
            state: state.clone(),
            snapshot: Arc::clone(&self.snapshot),
            preview: Arc::clone(&self.preview),
        };
        match EventStreamClient::open(
            Arc::clone(&self.source),
            Some(Arc::clone(&self.service)),
            run_id.clone(),
            writer,
            self.options,
        )
        .await
        {
            Ok(client) => {
                *session = Some(client);
                tracing::info!("Run {} is generating", run_id);
                Ok(run_id)
            }
            Err(e) => {
                self.abandon(state, &e);
                Err(e)
            }
        }
    }

    /// Latest immutable snapshot; never blocks
    pub fn current_state(&self) -> Arc<RunState> {
        self.snapshot.borrow().clone()
    }

    /// Latest snapshot with its derived progress views
    pub fn current_view(&self) -> RunView {
        let state = self.current_state();
        let progress = self.aggregator.derive(&state);
        RunView { state, progress }
    }

    /// Receiver notified after every applied event
    pub fn subscribe(&self) -> watch::Receiver<Arc<RunState>> {
        self.snapshot.subscribe()
    }

    /// Re-reads the stored run record from the server and applies it
    ///
    /// The resync is performed by the stream worker, so it is ordered
    /// with respect to inbound events.
    pub async fn refresh(&self) -> ClientResult<()> {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(client) => client.request_resync(),
            None => Err(ClientError::NoActiveRun),
        }
    }

    /// Waits until the current run ends
    ///
    /// # Returns
    /// * `Ok(TerminalResult)` - The run completed
    /// * `Err(RemoteReported | Transport | Timeout)` - The run failed
    /// * `Err(Superseded)` - Another start replaced this run
    /// * `Err(NoActiveRun)` - Nothing was started
    pub async fn wait_for_completion(&self) -> ClientResult<TerminalResult> {
        let mut receiver = self.snapshot.subscribe();
        let awaited = receiver
            .borrow()
            .run_id()
            .cloned()
            .ok_or(ClientError::NoActiveRun)?;

        loop {
            let state = receiver.borrow_and_update().clone();
            if state.run_id() != Some(&awaited) {
                return Err(ClientError::Superseded(awaited.to_string()));
            }

            let message = || state.last_error().unwrap_or("unknown error").to_string();
            match state.lifecycle() {
                RunLifecycle::Complete => {
                    return Ok(state.terminal_result().cloned().unwrap_or_default());
                }
                RunLifecycle::Error => {
                    return Err(match state.failure_kind() {
                        Some(FailureKind::Timeout) => {
                            ClientError::Timeout(self.options.idle_timeout.unwrap_or_default())
                        }
                        Some(FailureKind::Transport) => ClientError::Transport(message()),
                        _ => ClientError::RemoteReported(message()),
                    });
                }
                RunLifecycle::Idle => return Err(ClientError::Transport(message())),
                RunLifecycle::Generating => {}
            }

            if receiver.changed().await.is_err() {
                return Err(ClientError::NoActiveRun);
            }
        }
    }

    /// Saves the current run's archive as `dir/flowforge-<id prefix>.zip`
    ///
    /// Failures are reported as [`ClientError::Download`] and leave the
    /// run state untouched.
    pub async fn download_archive(&self, dir: &Path) -> ClientResult<PathBuf> {
        let run_id = self
            .current_state()
            .run_id()
            .cloned()
            .ok_or(ClientError::NoActiveRun)?;
        let path = dir.join(archive_file_name(&run_id));

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ClientError::Download(format!("Cannot create {}: {}", path.display(), e)))?;

        let written = match self.service.download_archive(&run_id, &mut file).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };
        file.flush()
            .await
            .map_err(|e| ClientError::Download(format!("Cannot write {}: {}", path.display(), e)))?;

        tracing::info!("Saved archive of run {} ({} bytes) to {}", run_id, written, path.display());
        Ok(path)
    }

    /// Stops live updates for the current run; the remote pipeline is
    /// not notified
    pub async fn close(&self) {
        if let Some(mut client) = self.session.lock().await.take() {
            client.close().await;
        }
    }

    fn publish(&self, state: RunState) {
        self.snapshot.send_replace(Arc::new(state));
    }

    fn abandon(&self, mut state: RunState, error: &ClientError) {
        tracing::error!("Failed to start run: {}", error);
        if let Err(e) = state.revert_to_idle(error.to_string()) {
            tracing::warn!("{}", e);
        }
        self.publish(state);
    }
}

/// Applies stream input to the live run and publishes snapshots
struct RunStateWriter {
    run_id: RunId,
    state: RunState,
    snapshot: Arc<watch::Sender<Arc<RunState>>>,
    preview: Arc<dyn PreviewSink>,
}

impl RunStateWriter {
    fn publish(&self) {
        self.snapshot.send_replace(Arc::new(self.state.clone()));
    }

    fn log_lifecycle(&self, before: RunLifecycle) {
        let after = self.state.lifecycle();
        if before == after {
            return;
        }
        match after {
            RunLifecycle::Error => tracing::error!(
                "Run {} failed: {}",
                self.run_id,
                self.state.last_error().unwrap_or("unknown error")
            ),
            _ => tracing::info!("Run {} is now {}", self.run_id, after),
        }
    }
}

impl StreamHandler for RunStateWriter {
    fn handle_event(&mut self, event: RunEvent) {
        let preview = match &event {
            RunEvent::PreviewReady { payload } => Some(payload.clone()),
            _ => None,
        };

        let kind = event.kind();
        let before = self.state.lifecycle();
        match self.state.apply(event) {
            Ok(()) => {
                if let Some(payload) = &preview {
                    self.preview.preview_ready(&self.run_id, payload);
                }
                self.log_lifecycle(before);
                self.publish();
            }
            Err(e) => tracing::warn!("Skipping {} for run {}: {}", kind, self.run_id, e),
        }
    }

    fn handle_resync(&mut self, status: RemoteRunStatus) {
        let before = self.state.lifecycle();
        match self.state.resync(&status) {
            Ok(()) => {
                tracing::debug!("Run {} resynced from server record", self.run_id);
                self.log_lifecycle(before);
                self.publish();
            }
            Err(e) => tracing::warn!("Ignoring resync of run {}: {}", self.run_id, e),
        }
    }

    fn handle_transport_failure(&mut self, error: ClientError) {
        if self.state.lifecycle().is_terminal() {
            tracing::info!("Event stream of finished run {} dropped: {}", self.run_id, error);
            return;
        }

        let before = self.state.lifecycle();
        match self.state.fail(FailureKind::Transport, error.to_string()) {
            Ok(()) => {
                self.log_lifecycle(before);
                self.publish();
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn handle_idle_timeout(&mut self, window: Duration) {
        let before = self.state.lifecycle();
        let message = format!("No progress event received within {}s", window.as_secs());
        match self.state.fail(FailureKind::Timeout, message) {
            Ok(()) => {
                self.log_lifecycle(before);
                self.publish();
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn is_terminal(&self) -> bool {
        self.state.lifecycle().is_terminal()
    }
}
