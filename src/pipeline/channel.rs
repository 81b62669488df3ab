use crate::transport::Frame;
use tokio::sync::mpsc;

pub type Sender = mpsc::Sender<Frame>;
pub type Receiver = mpsc::Receiver<Frame>;

/// Frames buffered between the connection reader and the renderer
pub const DEFAULT_BUFFER_LIMIT: usize = 10;

/// Create the bounded frame channel.
///
/// Sends wait while the channel is full, which stalls the reader and is the
/// only backpressure applied to the transport. A zero capacity is raised to 1.
pub fn create_channel(buffer_size: usize) -> (Sender, Receiver) {
    mpsc::channel(buffer_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_full_channel_blocks_sender() {
        let (tx, mut rx) = create_channel(2);
        tx.send(Frame::from("a")).await.unwrap();
        tx.send(Frame::from("b")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(Frame::from("c"))).await;
        assert!(blocked.is_err());

        assert_eq!(rx.recv().await, Some(Frame::from("a")));
        tx.send(Frame::from("c")).await.unwrap();
        assert_eq!(rx.recv().await, Some(Frame::from("b")));
        assert_eq!(rx.recv().await, Some(Frame::from("c")));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_usable() {
        let (tx, mut rx) = create_channel(0);
        tx.send(Frame::from("x")).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(Frame::from("x")));
        assert_eq!(rx.recv().await, None);
    }
}
