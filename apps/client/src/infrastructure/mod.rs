// Infrastructure layer module
// Network adapters for the generation pipeline ports
// Follows Hexagonal Architecture

pub mod http_generation_service;
pub mod websocket_event_source;

pub use http_generation_service::HttpGenerationService;
pub use websocket_event_source::{WebSocketConnection, WebSocketEventSource};
