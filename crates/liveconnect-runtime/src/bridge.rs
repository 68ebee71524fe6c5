//! Blocking waits for correlated replies
//!
//! A JNI thread sends a request and then parks until the reply lands in a oneshot slot,
//! the reply timeout elapses, or the transport goes away.

use crate::{AsyncRuntime, ShutdownSignal};
use liveconnect_core::{BridgeError, BridgeResult};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Completes one outstanding request
pub type ReplySender<T> = oneshot::Sender<BridgeResult<T>>;

/// Waits on one outstanding request
pub type ReplyReceiver<T> = oneshot::Receiver<BridgeResult<T>>;

/// Create the slot a single reply is delivered through
pub fn reply_channel<T>() -> (ReplySender<T>, ReplyReceiver<T>) {
    oneshot::channel()
}

/// Bridge between blocking JNI callers and the async transport
pub struct AsyncBridge {
    runtime: Arc<AsyncRuntime>,
    reference_counter: AtomicU32,
}

impl AsyncBridge {
    pub fn new(runtime: Arc<AsyncRuntime>) -> Self {
        Self {
            runtime,
            reference_counter: AtomicU32::new(0),
        }
    }

    pub fn runtime(&self) -> &Arc<AsyncRuntime> {
        &self.runtime
    }

    /// Next correlation reference
    ///
    /// Monotonic and never negative, so it can not collide with the "no reply" marker.
    pub fn next_reference(&self) -> i32 {
        let raw = self.reference_counter.fetch_add(1, Ordering::Relaxed);
        (raw & i32::MAX as u32) as i32
    }

    /// Block until the reply arrives or `timeout` elapses
    pub fn wait_reply<T>(
        &self,
        receiver: ReplyReceiver<T>,
        timeout: Duration,
        command: &str,
    ) -> BridgeResult<T> {
        if self.runtime.is_shutting_down() {
            return Err(BridgeError::Transport(
                "bridge is shutting down".to_string(),
            ));
        }
        let started = Instant::now();
        // The timer must be created inside the runtime.
        let waited = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, receiver).await })?;
        match waited {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(closed_slot()),
            Err(_) => Err(BridgeError::Timeout {
                command: command.to_string(),
                waited_ms: elapsed_ms(started),
            }),
        }
    }

    /// Check a reply slot without blocking
    ///
    /// Returns `None` while the reply is still outstanding.
    pub fn poll_reply<T>(receiver: &mut ReplyReceiver<T>) -> Option<BridgeResult<T>> {
        match receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(closed_slot())),
        }
    }

    /// Run an async operation to completion with a deadline
    pub fn call_sync_timeout<F, T>(&self, future: F, timeout: Duration, command: &str) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        let started = Instant::now();
        let waited = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, future).await })?;
        match waited {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout {
                command: command.to_string(),
                waited_ms: elapsed_ms(started),
            }),
        }
    }

    pub fn spawn<F, T>(&self, future: F) -> tokio::task::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.runtime.shutdown_signal()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.runtime.is_shutting_down()
    }
}

fn closed_slot() -> BridgeError {
    BridgeError::Transport("reply slot closed before a reply arrived".to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
