pub mod channel;
pub mod runner;

pub use channel::{create_channel, Receiver, Sender, DEFAULT_BUFFER_LIMIT};
pub use runner::{run_consumer, ConsumerStats};
