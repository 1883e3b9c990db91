// Client layer
// Run orchestration on top of the domain ports

pub mod controller;
pub mod reconnect;
pub mod stream;

pub use controller::{archive_file_name, RunController, RunView, StartRequest};
pub use reconnect::ReconnectPolicy;
pub use stream::{EventStreamClient, StreamHandler, StreamOptions};
