// Domain layer module exports
// Domain is independent of transport concerns

pub mod progress;
pub mod run;
pub mod services;
