//! Session shutdown signalling

use std::sync::Arc;
use tokio::sync::watch;

/// Why the session is going down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The host asked for an orderly close
    Requested,
    /// The duplex stream failed or the counterpart hung up
    TransportLost(String),
    /// The owning runtime went away without an explicit trigger
    RuntimeDropped,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Requested => write!(f, "shutdown requested"),
            ShutdownReason::TransportLost(detail) => write!(f, "transport lost: {}", detail),
            ShutdownReason::RuntimeDropped => write!(f, "runtime dropped"),
        }
    }
}

/// Handle for triggering shutdown; the first reason wins
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger shutdown, returning `true` if this call recorded the reason
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// The recorded reason, if shutdown has been triggered
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.sender.borrow().clone()
    }

    /// Get a signal that tasks can wait on
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal for detecting shutdown (cloneable, can be passed to tasks)
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownSignal {
    /// Check if shutdown has been triggered (non-blocking)
    pub fn is_triggered(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Wait for shutdown and return its reason
    ///
    /// Returns immediately if already triggered. Usable inside `select!`.
    pub async fn wait(&mut self) -> ShutdownReason {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(ShutdownReason::RuntimeDropped),
            Err(_) => ShutdownReason::RuntimeDropped,
        }
    }
}

#[cfg(test)]
#[path = "shutdown/shutdown_tests.rs"]
mod shutdown_tests;
