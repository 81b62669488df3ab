pub mod message;
pub mod retry;
pub mod session;
pub mod watermark;

pub use message::{DecodeError, DroppedEntry, LabelSet, LogMessage, StreamEntry, StreamValue};
pub use retry::{retry, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{build_dial_request, LogTailer, StreamSession, TailConfig, TailError};
pub use watermark::WatermarkTracker;
