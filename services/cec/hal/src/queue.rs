//! Bounded message queue drained by one worker thread.
//!
//! Producers never block: a full queue hands the message back as
//! `QueueError::Full`. The worker handles messages in FIFO order until it
//! reaches `ExitRequested` or every sender is gone. Shutting down never
//! blocks on the channel, so it is safe from inside an async runtime; only
//! the join waits for the worker.

use crate::message::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Number of messages the queue holds
pub const MAX_QUEUE_SIZE: usize = 32;

/// Enqueue failures
#[derive(Error, Debug)]
pub enum QueueError {
    /// Queue is at capacity, the message is handed back
    #[error("message queue full")]
    Full(Message),
    /// Worker has stopped
    #[error("message queue closed")]
    Closed,
}

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    handled: AtomicU64,
}

/// Message queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQueueStats {
    /// Messages accepted by `enqueue`
    pub enqueued: u64,
    /// Messages refused because the queue was full
    pub dropped: u64,
    /// Messages handled by the worker
    pub handled: u64,
}

/// Bounded FIFO plus its worker thread
#[derive(Debug)]
pub struct MessageQueue {
    tx: Option<mpsc::Sender<Message>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<QueueCounters>,
}

impl MessageQueue {
    /// Start the worker; `handler` runs on it for every message but the exit request
    pub fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: FnMut(Message) + Send + 'static,
    {
        Self::with_capacity(MAX_QUEUE_SIZE, handler)
    }

    /// Start the worker with a custom capacity
    pub fn with_capacity<F>(capacity: usize, mut handler: F) -> std::io::Result<Self>
    where
        F: FnMut(Message) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(QueueCounters::default());
        let worker_counters = counters.clone();

        let worker = thread::Builder::new()
            .name("cec-msg-handler".to_string())
            .spawn(move || {
                debug!("Message handler started");
                while let Some(message) = rx.blocking_recv() {
                    if let Message::ExitRequested = message {
                        info!("Exit requested in message handler");
                        break;
                    }
                    handler(message);
                    worker_counters.handled.fetch_add(1, Ordering::Relaxed);
                }
                debug!("Message handler stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            counters,
        })
    }

    /// Append a message without blocking
    pub fn enqueue(&self, message: Message) -> Result<(), QueueError> {
        let tx = self.tx.as_ref().ok_or(QueueError::Closed)?;
        match tx.try_send(message) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Message queue full, dropping message");
                Err(QueueError::Full(message))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Get queue statistics
    pub fn get_stats(&self) -> MessageQueueStats {
        MessageQueueStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            handled: self.counters.handled.load(Ordering::Relaxed),
        }
    }

    /// Request exit and wait for the worker to drain the queue
    pub fn shutdown(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let Some(worker) = self.worker.take() else {
            return;
        };

        if worker.thread().id() == thread::current().id() {
            // Called from a handler; the worker stops once the queue drains
            // and the sender dropped here was the last one.
            warn!("Message queue shut down from its own worker, not joining");
            drop(tx);
            return;
        }

        // The queue owns the only sender, so once it is dropped the worker
        // drains what is left and sees the channel close.
        match tx.try_send(Message::ExitRequested) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Message queue full, worker exits once it drains");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Message handler already stopped");
            }
        }
        drop(tx);

        if worker.join().is_err() {
            error!("Message handler thread panicked");
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
