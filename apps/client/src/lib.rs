//! FlowForge Client Library
//!
//! This library drives the FlowForge site-generation pipeline from the
//! client side: it starts runs, consumes their event streams, keeps a
//! consistent picture of all 88 agents and derives phase progress.

pub mod agents;
pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infrastructure;

pub use client::{RunController, StartRequest};
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
