//! Tokio runtime management

use crate::shutdown::{ShutdownHandle, ShutdownReason, ShutdownSignal};
use liveconnect_core::{BridgeConfig, BridgeError, BridgeResult};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

/// Configuration for the async runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (None = number of CPU cores)
    pub worker_threads: Option<usize>,
    /// Name given to every runtime thread
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "liveconnect-io".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive runtime settings from a session configuration
    pub fn from_bridge_config(config: &BridgeConfig) -> Self {
        Self {
            worker_threads: config.worker_threads,
            ..Self::default()
        }
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }
}

/// Owns the Tokio runtime that drives the socket
///
/// The runtime sits behind a mutex so [`AsyncRuntime::shutdown`] can take it out while
/// other threads still hold the value; work is submitted through a cloned [`Handle`].
pub struct AsyncRuntime {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    shutdown_handle: ShutdownHandle,
}

impl AsyncRuntime {
    pub fn new(config: RuntimeConfig) -> BridgeResult<Self> {
        let mut builder = Builder::new_multi_thread();

        if let Some(threads) = config.worker_threads {
            builder.worker_threads(threads);
        }

        let runtime = builder
            .thread_name(&config.thread_name)
            .enable_io()
            .enable_time()
            .build()
            .map_err(|e| BridgeError::Runtime(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            shutdown_handle: ShutdownHandle::new(),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_handle.signal()
    }

    /// Block the calling thread on a future
    ///
    /// Must not be called from a runtime worker thread.
    pub fn block_on<F: Future>(&self, future: F) -> BridgeResult<F::Output> {
        if Handle::try_current().is_ok() {
            return Err(BridgeError::Runtime(
                "cannot block on the bridge runtime from inside an async context".to_string(),
            ));
        }
        if !self.is_running() {
            return Err(BridgeError::Runtime("runtime has been shut down".to_string()));
        }
        Ok(self.handle.block_on(future))
    }

    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Whether the underlying runtime is still owned
    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_handle.is_triggered()
    }

    /// Signal shutdown and wait up to `grace` for spawned tasks to finish
    ///
    /// Safe to call more than once; only the first call stops the runtime.
    pub fn shutdown(&self, grace: Duration) {
        self.shutdown_handle.trigger(ShutdownReason::Requested);
        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            tracing::info!(?grace, "stopping bridge runtime");
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(grace);
            }
        }
    }
}

impl Drop for AsyncRuntime {
    fn drop(&mut self) {
        self.shutdown_handle.trigger(ShutdownReason::RuntimeDropped);
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
