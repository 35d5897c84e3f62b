//! Bridges a synchronous graph/agent executor running on a dedicated
//! worker thread to an asynchronous consumer, via a bounded
//! single-producer/single-consumer queue.
//!
//! Grounded directly on `original_source/src/core/runners.py`'s
//! thread + `queue.Queue` pattern: the worker pushes events and a `None`
//! sentinel on completion; here the sentinel is simply channel closure.
//! `std::sync::mpsc::sync_channel` gives the bounded, blocking-on-full
//! semantics spec.md §4.7/§9 calls for (backpressure by blocking the
//! producer, never dropping events).

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::events::ProgressEvent;

/// Handle to the producer side, given to a worker closure running on its
/// own thread. `send` blocks if the queue is full — intentional
/// backpressure (spec.md §4.7).
#[derive(Clone)]
pub struct EventSender {
    inner: SyncSender<ProgressEvent>,
}

impl EventSender {
    /// Blocks until there is room in the bounded queue. Returns `false`
    /// once the consumer has disconnected, signaling the worker it may
    /// stop producing once it reaches its next checkpoint (spec.md §5
    /// cancellation semantics).
    pub fn send(&self, event: ProgressEvent) -> bool {
        self.inner.send(event).is_ok()
    }
}

/// Runs `work` on a dedicated OS thread, forwarding every event it
/// produces into a bounded channel that is then exposed as an async
/// `Stream` via `tokio_stream`. The worker thread is detached: nothing
/// joins it, on drop or otherwise. Completion is signaled purely by
/// channel closure, which the consumer observes as its `EventStream`
/// ending — that's the only completion signal callers should rely on.
pub struct RunnerBridge {
    worker: Option<JoinHandle<()>>,
}

impl RunnerBridge {
    /// Start `work` on a worker thread with a queue of `capacity` events.
    /// Returns the bridge (for explicit lifecycle/cancellation handling)
    /// and an async stream of events terminating when the worker finishes
    /// or the consumer drops the stream. The caller must keep the bridge
    /// alive for at least as long as it polls the stream — see
    /// `crate::runner::EventStream`, which bundles the two so nothing
    /// drops the bridge before the worker has had a chance to run.
    pub fn spawn<F>(capacity: usize, work: F) -> (Self, ReceiverStream<ProgressEvent>)
    where
        F: FnOnce(EventSender) + Send + 'static,
    {
        let (sync_tx, sync_rx) = mpsc::sync_channel::<ProgressEvent>(capacity);
        let (async_tx, async_rx) = tokio::sync::mpsc::channel::<ProgressEvent>(capacity);

        let worker = std::thread::spawn(move || {
            work(EventSender { inner: sync_tx });
        });

        // Forward from the worker's sync channel to the async channel on a
        // blocking task, so the async consumer never touches `std::sync::mpsc`
        // directly (spec.md §4.7's prescribed bridge shape).
        tokio::task::spawn_blocking(move || loop {
            match sync_rx.recv_timeout(Duration::from_millis(250)) {
                Ok(event) => {
                    if async_tx.blocking_send(event).is_err() {
                        // Consumer dropped the stream; stop forwarding but let
                        // the worker drain naturally to its next checkpoint.
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        (Self { worker: Some(worker) }, ReceiverStream::new(async_rx))
    }

    /// Block until the worker thread finishes. Consumers normally don't
    /// need this; the event stream ending already implies the worker is
    /// done or has been abandoned. Not called automatically on drop —
    /// dropping a `RunnerBridge` never blocks.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("runner worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn forwards_events_in_order_and_closes_on_completion() {
        let (_bridge, mut stream) = RunnerBridge::spawn(4, |tx| {
            for i in 0..3 {
                tx.send(ProgressEvent::Token {
                    token: i.to_string(),
                    is_first: i == 0,
                    is_last: i == 2,
                });
            }
        });

        let mut received = Vec::new();
        while let Some(event) = stream.next().await {
            received.push(event);
        }
        assert_eq!(received.len(), 3);
        assert!(matches!(&received[0], ProgressEvent::Token { token, .. } if token == "0"));
        assert!(matches!(&received[2], ProgressEvent::Token { is_last: true, .. }));
    }

    #[tokio::test]
    async fn backpressure_blocks_producer_until_consumer_drains() {
        let (_bridge, mut stream) = RunnerBridge::spawn(1, |tx| {
            for i in 0..5 {
                tx.send(ProgressEvent::Token {
                    token: i.to_string(),
                    is_first: i == 0,
                    is_last: i == 4,
                });
            }
        });

        let mut count = 0;
        while stream.next().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
