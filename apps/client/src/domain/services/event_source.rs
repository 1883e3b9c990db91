use async_trait::async_trait;

use crate::domain::run::RunId;
use crate::errors::ClientResult;

/// Factory for per-run event connections
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens the event stream of `run_id`
    async fn connect(&self, run_id: &RunId) -> ClientResult<Box<dyn EventConnection>>;
}

/// One open duplex connection, read server-to-client
#[async_trait]
pub trait EventConnection: Send {
    /// Next text frame
    ///
    /// # Returns
    /// * `Ok(Some(text))` - A frame arrived
    /// * `Ok(None)` - The peer closed the connection
    /// * `Err(_)` - The connection failed
    async fn next_message(&mut self) -> ClientResult<Option<String>>;

    /// Closes the connection; safe to call more than once
    async fn close(&mut self);
}
