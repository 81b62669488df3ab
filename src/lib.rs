//! Resilient client for a remote push-style log stream.
//!
//! [`tail::LogTailer`] dials the logs service, reads label-grouped batches
//! over a websocket, renders each entry into a [`sink::LogSink`], and
//! reconnects from the last seen timestamp when the connection drops.

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod sink;
pub mod tail;
pub mod transport;

pub use sink::{LogSink, MemorySink, Severity, SinkRecord, TracingSink};
pub use tail::{LogTailer, StreamSession, TailConfig, TailError};
