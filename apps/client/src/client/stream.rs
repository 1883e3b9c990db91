use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::reconnect::ReconnectPolicy;
use crate::domain::run::{RunEvent, RunId};
use crate::domain::services::{EventConnection, EventSource, GenerationService, RemoteRunStatus};
use crate::errors::{ClientError, ClientResult};

/// Consumer of a run's event stream
///
/// All calls happen on the stream's single worker task, in arrival order.
pub trait StreamHandler: Send + 'static {
    /// A recognized event arrived
    fn handle_event(&mut self, event: RunEvent);

    /// The server's stored record was fetched after a reconnect or on request
    fn handle_resync(&mut self, status: RemoteRunStatus);

    /// The stream was lost and could not be re-established, or was lost
    /// after the run already ended
    fn handle_transport_failure(&mut self, error: ClientError);

    /// No frame arrived within the watchdog window
    fn handle_idle_timeout(&mut self, window: Duration);

    /// Whether the run has reached a terminal lifecycle
    fn is_terminal(&self) -> bool;
}

/// Reconnect, handshake and watchdog settings for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub reconnect: ReconnectPolicy,
    /// Upper bound on a single connect, including the WebSocket handshake
    pub connect_timeout: Duration,
    /// `None` disables the watchdog
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Debug)]
enum StreamCommand {
    Resync,
    Close,
}

/// Event stream bound to exactly one run
///
/// Opening connects and spawns a worker task that decodes frames and
/// hands them to the registered [`StreamHandler`]. The binding cannot be
/// changed; superseding a run means closing this client and opening a
/// new one. Dropping the client stops the worker.
pub struct EventStreamClient {
    run_id: RunId,
    commands: mpsc::UnboundedSender<StreamCommand>,
    task: Option<JoinHandle<()>>,
}

impl EventStreamClient {
    /// Connects to the stream of `run_id` and starts dispatching to `handler`
    ///
    /// `resync` is used to fetch the stored run record after a reconnect.
    pub async fn open<H: StreamHandler>(
        source: Arc<dyn EventSource>,
        resync: Option<Arc<dyn GenerationService>>,
        run_id: RunId,
        handler: H,
        options: StreamOptions,
    ) -> ClientResult<Self> {
        let connection = connect_with_timeout(source.as_ref(), &run_id, options.connect_timeout).await?;
        tracing::info!("Event stream opened for run {}", run_id);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let worker = StreamWorker {
            source,
            resync,
            run_id: run_id.clone(),
            options,
            commands: command_rx,
        };
        let task = tokio::spawn(worker.run(connection, handler));

        Ok(Self {
            run_id,
            commands,
            task: Some(task),
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// True once the worker stopped (terminal event, failure or close)
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Asks the worker to fetch the stored run record and apply it
    pub fn request_resync(&self) -> ClientResult<()> {
        if self.is_finished() {
            return Err(ClientError::NoActiveRun);
        }
        self.commands
            .send(StreamCommand::Resync)
            .map_err(|_| ClientError::NoActiveRun)
    }

    /// Tears the stream down and waits for the worker; idempotent
    pub async fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let _ = self.commands.send(StreamCommand::Close);
        if let Err(e) = task.await {
            if e.is_panic() {
                tracing::error!("Event stream worker for run {} panicked", self.run_id);
            }
        }
        tracing::debug!("Event stream closed for run {}", self.run_id);
    }
}

enum Step {
    Command(Option<StreamCommand>),
    Read(ClientResult<Option<String>>),
    Idle(Duration),
}

enum Reconnect {
    Connected(Box<dyn EventConnection>),
    GaveUp(ClientError),
    Closed,
}

struct StreamWorker {
    source: Arc<dyn EventSource>,
    resync: Option<Arc<dyn GenerationService>>,
    run_id: RunId,
    options: StreamOptions,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
}

impl StreamWorker {
    async fn run<H: StreamHandler>(mut self, mut connection: Box<dyn EventConnection>, mut handler: H) {
        let idle_timeout = self.options.idle_timeout;
        // single deadline for the stream; only inbound frames and a
        // re-established connection push it back
        let watchdog = tokio::time::sleep(idle_timeout.unwrap_or(Duration::MAX));
        tokio::pin!(watchdog);

        loop {
            let step = tokio::select! {
                biased;
                command = self.commands.recv() => Step::Command(command),
                read = connection.next_message() => Step::Read(read),
                _ = &mut watchdog, if idle_timeout.is_some() => Step::Idle(idle_timeout.unwrap_or_default()),
            };

            let read = match step {
                Step::Read(read) => read,
                Step::Command(Some(StreamCommand::Resync)) => {
                    self.resync(&mut handler).await;
                    if handler.is_terminal() {
                        connection.close().await;
                        return;
                    }
                    continue;
                }
                // explicit close, or the owning client was dropped
                Step::Command(Some(StreamCommand::Close)) | Step::Command(None) => {
                    connection.close().await;
                    return;
                }
                Step::Idle(window) => {
                    if !handler.is_terminal() {
                        handler.handle_idle_timeout(window);
                    }
                    connection.close().await;
                    return;
                }
            };

            let lost = match read {
                Ok(Some(text)) => {
                    if let Some(window) = idle_timeout {
                        watchdog.as_mut().reset(Instant::now() + window);
                    }
                    if self.dispatch(&text, &mut handler) {
                        connection.close().await;
                        return;
                    }
                    continue;
                }
                Ok(None) => ClientError::Transport("event stream closed by server".to_string()),
                Err(e) => e,
            };

            if handler.is_terminal() {
                handler.handle_transport_failure(lost);
                return;
            }
            match self.reconnect(lost).await {
                Reconnect::Connected(fresh) => {
                    connection = fresh;
                    if let Some(window) = idle_timeout {
                        watchdog.as_mut().reset(Instant::now() + window);
                    }
                    self.resync(&mut handler).await;
                    if handler.is_terminal() {
                        connection.close().await;
                        return;
                    }
                }
                Reconnect::GaveUp(error) => {
                    handler.handle_transport_failure(error);
                    return;
                }
                Reconnect::Closed => return,
            }
        }
    }

    /// Decodes one frame and hands it on; true once a terminal event was handled
    fn dispatch<H: StreamHandler>(&self, text: &str, handler: &mut H) -> bool {
        match RunEvent::decode(text) {
            Ok(Some(event)) => {
                let terminal = event.is_terminal();
                tracing::debug!("Run {} received {}", self.run_id, event.kind());
                handler.handle_event(event);
                terminal
            }
            Ok(None) => {
                tracing::debug!("Ignoring unrecognized event for run {}", self.run_id);
                false
            }
            Err(e) => {
                tracing::warn!("Skipping malformed event for run {}: {}", self.run_id, e);
                false
            }
        }
    }

    async fn reconnect(&mut self, error: ClientError) -> Reconnect {
        let policy = self.options.reconnect;
        let mut last_error = error;

        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                "Event stream for run {} lost ({}); reconnect attempt {}/{} in {:?}",
                self.run_id,
                last_error,
                attempt,
                policy.max_attempts,
                delay
            );

            let backoff = tokio::time::sleep(delay);
            if interruptible(&mut self.commands, &self.run_id, backoff).await.is_none() {
                return Reconnect::Closed;
            }

            let connect = connect_with_timeout(self.source.as_ref(), &self.run_id, self.options.connect_timeout);
            match interruptible(&mut self.commands, &self.run_id, connect).await {
                None => return Reconnect::Closed,
                Some(Ok(connection)) => {
                    tracing::info!("Event stream for run {} re-established", self.run_id);
                    return Reconnect::Connected(connection);
                }
                Some(Err(e)) => last_error = e,
            }
        }

        Reconnect::GaveUp(last_error)
    }

    async fn resync<H: StreamHandler>(&self, handler: &mut H) {
        let Some(service) = &self.resync else {
            return;
        };
        match service.fetch_status(&self.run_id).await {
            Ok(status) => handler.handle_resync(status),
            Err(e) => tracing::warn!("Could not resync run {}: {}", self.run_id, e),
        }
    }
}

async fn connect_with_timeout(
    source: &dyn EventSource,
    run_id: &RunId,
    window: Duration,
) -> ClientResult<Box<dyn EventConnection>> {
    match tokio::time::timeout(window, source.connect(run_id)).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Transport(format!(
            "Timed out opening event stream for run {} after {:?}",
            run_id, window
        ))),
    }
}

/// Drives `work` to completion while still serving commands
///
/// Returns `None` if the stream was closed first. Resync requests are
/// not dropped: a re-established stream is always resynced.
async fn interruptible<F: Future>(
    commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
    run_id: &RunId,
    work: F,
) -> Option<F::Output> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Some(output),
            command = commands.recv() => match command {
                Some(StreamCommand::Resync) => {
                    tracing::debug!("Resync of run {} deferred until the stream is back", run_id);
                }
                Some(StreamCommand::Close) | None => return None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a script of reads, then stays silent
    struct ScriptedConnection {
        reads: VecDeque<ClientResult<Option<String>>>,
    }

    #[async_trait]
    impl EventConnection for ScriptedConnection {
        async fn next_message(&mut self) -> ClientResult<Option<String>> {
            match self.reads.pop_front() {
                Some(read) => read,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {}
    }

    /// Hands out one scripted connection per connect call
    ///
    /// Once the script runs out, connects are refused, or hang forever
    /// for a stalling source.
    struct ScriptedSource {
        connections: Mutex<VecDeque<Vec<ClientResult<Option<String>>>>>,
        connects: Mutex<u32>,
        stall_when_exhausted: bool,
    }

    impl ScriptedSource {
        fn new(connections: Vec<Vec<ClientResult<Option<String>>>>) -> Arc<Self> {
            Arc::new(Self {
                connections: Mutex::new(connections.into()),
                connects: Mutex::new(0),
                stall_when_exhausted: false,
            })
        }

        fn stalling(connections: Vec<Vec<ClientResult<Option<String>>>>) -> Arc<Self> {
            Arc::new(Self {
                connections: Mutex::new(connections.into()),
                connects: Mutex::new(0),
                stall_when_exhausted: true,
            })
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn connect(&self, _run_id: &RunId) -> ClientResult<Box<dyn EventConnection>> {
            *self.connects.lock().unwrap() += 1;
            let next = self.connections.lock().unwrap().pop_front();
            match next {
                Some(reads) => Ok(Box::new(ScriptedConnection {
                    reads: reads.into(),
                })),
                None if self.stall_when_exhausted => std::future::pending().await,
                None => Err(ClientError::Transport("connection refused".to_string())),
            }
        }
    }

    /// Status endpoint that always reports a running pipeline
    struct RunningService;

    #[async_trait]
    impl GenerationService for RunningService {
        async fn start(&self, _request: &crate::domain::services::GenerationRequest) -> ClientResult<RunId> {
            Ok(RunId::new("r1"))
        }

        async fn fetch_status(&self, _run_id: &RunId) -> ClientResult<RemoteRunStatus> {
            Ok(serde_json::from_str(r#"{"project_id":"r1","status":"generating"}"#)?)
        }

        async fn download_archive(
            &self,
            _run_id: &RunId,
            _sink: &mut (dyn tokio::io::AsyncWrite + Unpin + Send),
        ) -> ClientResult<u64> {
            Ok(0)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Event(&'static str),
        Resync,
        Failure,
        Timeout,
    }

    #[derive(Clone, Default)]
    struct RecordingHandler {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl StreamHandler for RecordingHandler {
        fn handle_event(&mut self, event: RunEvent) {
            self.calls.lock().unwrap().push(Call::Event(event.kind()));
        }

        fn handle_resync(&mut self, _status: RemoteRunStatus) {
            self.calls.lock().unwrap().push(Call::Resync);
        }

        fn handle_transport_failure(&mut self, _error: ClientError) {
            self.calls.lock().unwrap().push(Call::Failure);
        }

        fn handle_idle_timeout(&mut self, _window: Duration) {
            self.calls.lock().unwrap().push(Call::Timeout);
        }

        fn is_terminal(&self) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| matches!(c, Call::Event("generation_complete") | Call::Event("generation_error")))
        }
    }

    fn text(frame: &str) -> ClientResult<Option<String>> {
        Ok(Some(frame.to_string()))
    }

    fn fast_options() -> StreamOptions {
        StreamOptions {
            reconnect: ReconnectPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(10),
            },
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
        }
    }

    async fn wait_finished(client: &EventStreamClient) {
        for _ in 0..200 {
            if client.is_finished() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("stream worker did not finish");
    }

    #[tokio::test]
    async fn dispatches_in_order_and_skips_bad_frames() {
        let source = ScriptedSource::new(vec![vec![
            text(r#"{"type":"phase_update","phase":"analysis","progress":0}"#),
            text("{broken"),
            text(r#"{"type":"mystery"}"#),
            text(r#"{"type":"agent_update","id":"agent_001","status":"active"}"#),
            text(r#"{"type":"generation_complete"}"#),
            text(r#"{"type":"agent_update","id":"agent_002","status":"active"}"#),
        ]]);
        let handler = RecordingHandler::default();

        let client = EventStreamClient::open(source, None, RunId::new("r1"), handler.clone(), fast_options())
            .await
            .unwrap();
        wait_finished(&client).await;

        assert_eq!(
            *handler.calls.lock().unwrap(),
            vec![
                Call::Event("phase_update"),
                Call::Event("agent_update"),
                Call::Event("generation_complete"),
            ]
        );
    }

    #[tokio::test]
    async fn reconnects_after_drop() {
        let source = ScriptedSource::new(vec![
            vec![
                text(r#"{"type":"agent_update","id":"agent_001","status":"active"}"#),
                Ok(None),
            ],
            vec![text(r#"{"type":"generation_error","error":"boom"}"#)],
        ]);
        let handler = RecordingHandler::default();

        let client = EventStreamClient::open(source.clone(), None, RunId::new("r1"), handler.clone(), fast_options())
            .await
            .unwrap();
        wait_finished(&client).await;

        assert_eq!(*source.connects.lock().unwrap(), 2);
        assert_eq!(
            *handler.calls.lock().unwrap(),
            vec![Call::Event("agent_update"), Call::Event("generation_error")]
        );
    }

    #[tokio::test]
    async fn gives_up_after_policy_is_exhausted() {
        let source = ScriptedSource::new(vec![vec![Err(ClientError::Transport("reset".to_string()))]]);
        let handler = RecordingHandler::default();

        let client = EventStreamClient::open(source.clone(), None, RunId::new("r1"), handler.clone(), fast_options())
            .await
            .unwrap();
        wait_finished(&client).await;

        // initial connect plus two failed retries
        assert_eq!(*source.connects.lock().unwrap(), 3);
        assert_eq!(*handler.calls.lock().unwrap(), vec![Call::Failure]);
    }

    #[tokio::test]
    async fn idle_watchdog_fires() {
        let source = ScriptedSource::new(vec![vec![]]);
        let handler = RecordingHandler::default();
        let options = StreamOptions {
            idle_timeout: Some(Duration::from_millis(20)),
            ..fast_options()
        };

        let client = EventStreamClient::open(source, None, RunId::new("r1"), handler.clone(), options)
            .await
            .unwrap();
        wait_finished(&client).await;

        assert_eq!(*handler.calls.lock().unwrap(), vec![Call::Timeout]);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let source = ScriptedSource::new(vec![vec![]]);
        let handler = RecordingHandler::default();

        let mut client = EventStreamClient::open(source, None, RunId::new("r1"), handler.clone(), fast_options())
            .await
            .unwrap();
        client.close().await;
        client.close().await;

        assert!(client.is_finished());
        assert!(client.request_resync().is_err());
        assert!(handler.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_fails_when_source_refuses() {
        let source = ScriptedSource::new(vec![]);

        let result = EventStreamClient::open(
            source,
            None,
            RunId::new("r1"),
            RecordingHandler::default(),
            fast_options(),
        )
        .await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn watchdog_fires_despite_resync_requests() {
        let source = ScriptedSource::new(vec![vec![]]);
        let handler = RecordingHandler::default();
        let options = StreamOptions {
            idle_timeout: Some(Duration::from_millis(100)),
            ..fast_options()
        };

        let client = EventStreamClient::open(
            source,
            Some(Arc::new(RunningService)),
            RunId::new("r1"),
            handler.clone(),
            options,
        )
        .await
        .unwrap();

        let started = Instant::now();
        while !client.is_finished() && started.elapsed() < Duration::from_secs(2) {
            let _ = client.request_resync();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert!(client.is_finished());
        assert_eq!(handler.calls.lock().unwrap().last(), Some(&Call::Timeout));
        assert!(handler.calls.lock().unwrap().contains(&Call::Resync));
    }

    #[tokio::test]
    async fn open_times_out_when_handshake_stalls() {
        let source = ScriptedSource::stalling(vec![]);
        let options = StreamOptions {
            connect_timeout: Duration::from_millis(50),
            ..fast_options()
        };

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            EventStreamClient::open(source, None, RunId::new("r1"), RecordingHandler::default(), options),
        )
        .await
        .expect("open must not hang");

        match result {
            Err(ClientError::Transport(message)) => assert!(message.contains("Timed out")),
            Err(other) => panic!("Expected transport error, got {:?}", other),
            Ok(_) => panic!("Expected open to fail"),
        }
    }

    #[tokio::test]
    async fn stalled_reconnects_give_up() {
        let source = ScriptedSource::stalling(vec![vec![Ok(None)]]);
        let handler = RecordingHandler::default();
        let options = StreamOptions {
            connect_timeout: Duration::from_millis(30),
            ..fast_options()
        };

        let client = EventStreamClient::open(source.clone(), None, RunId::new("r1"), handler.clone(), options)
            .await
            .unwrap();
        wait_finished(&client).await;

        assert_eq!(*source.connects.lock().unwrap(), 3);
        assert_eq!(*handler.calls.lock().unwrap(), vec![Call::Failure]);
    }

    #[tokio::test]
    async fn close_interrupts_stalled_reconnect() {
        let source = ScriptedSource::stalling(vec![vec![Ok(None)]]);
        let handler = RecordingHandler::default();
        let options = StreamOptions {
            connect_timeout: Duration::from_secs(30),
            ..fast_options()
        };

        let mut client = EventStreamClient::open(source.clone(), None, RunId::new("r1"), handler.clone(), options)
            .await
            .unwrap();
        for _ in 0..200 {
            if *source.connects.lock().unwrap() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*source.connects.lock().unwrap(), 2);

        tokio::time::timeout(Duration::from_secs(1), client.close())
            .await
            .expect("close must not wait for the stalled connect");

        assert!(client.is_finished());
        assert!(handler.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resync_request_keeps_reconnect_backoff() {
        let source = ScriptedSource::new(vec![
            vec![Ok(None)],
            vec![text(r#"{"type":"generation_complete"}"#)],
        ]);
        let handler = RecordingHandler::default();
        let options = StreamOptions {
            reconnect: ReconnectPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(200),
                max_delay: Duration::from_millis(200),
            },
            ..fast_options()
        };

        let started = Instant::now();
        let client = EventStreamClient::open(
            source,
            Some(Arc::new(RunningService)),
            RunId::new("r1"),
            handler.clone(),
            options,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        client.request_resync().unwrap();
        wait_finished(&client).await;

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(
            *handler.calls.lock().unwrap(),
            vec![Call::Resync, Call::Event("generation_complete")]
        );
    }
}
