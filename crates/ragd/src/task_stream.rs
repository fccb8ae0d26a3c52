//! Channel-backed stream whose producer task dies with the consumer.
//!
//! The producer runs on its own task and sends items through a bounded
//! `mpsc` channel. Dropping the stream aborts the task, so an abandoned
//! response never keeps a model call running in the background.

use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

pub struct TaskStream<T> {
    inner: ReceiverStream<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> TaskStream<T> {
    /// Spawn `producer` with the sending half of a channel of `capacity`.
    pub fn spawn<F, Fut>(capacity: usize, producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(producer(tx));
        Self {
            inner: ReceiverStream::new(rx),
            task,
        }
    }
}

impl<T> Stream for TaskStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl<T> Drop for TaskStream<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_items_arrive_in_order() {
        let stream = TaskStream::spawn(4, |tx| async move {
            for i in 0..3 {
                if tx.send(i).await.is_err() {
                    return;
                }
            }
        });
        let items: Vec<i32> = stream.collect().await;
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_drop_aborts_producer() {
        let (held_tx, held_rx) = oneshot::channel::<()>();
        let mut stream = TaskStream::spawn(1, move |tx| async move {
            let _held = held_tx;
            let _ = tx.send("first").await;
            // Long model call that must not outlive the consumer
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let _ = tx.send("second").await;
        });

        assert_eq!(stream.next().await, Some("first"));
        drop(stream);

        // Sender is dropped with the aborted task's future
        assert!(held_rx.await.is_err());
    }
}
