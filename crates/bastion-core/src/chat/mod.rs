//! Chat-platform abstractions (Discord today, behind the `ChatBackend` port).

pub mod port;
pub mod types;
