//! Background space reclamation.
//!
//! The worker owns a dedicated thread that periodically asks the engine to
//! reclaim space held by stale value-log segments. It never touches
//! namespaces or transactions.

use crate::config::MaintenanceConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use typedkv_core::{Error, Result};
use typedkv_storage::Engine;

/// Name of the maintenance thread
const THREAD_NAME: &str = "typedkv-maintenance";

/// Longest sleep between two checks of the shutdown signal
const MAX_POLL: Duration = Duration::from_millis(100);

/// Handle to the running maintenance thread.
pub(crate) struct MaintenanceWorker {
    shutdown_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    /// Spawns the worker thread.
    pub(crate) fn start(engine: Arc<dyn Engine>, config: MaintenanceConfig) -> Result<Self> {
        let shutdown_signal = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown_signal);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || Self::run(engine, config, thread_shutdown))?;

        debug!("maintenance worker started");
        Ok(Self {
            shutdown_signal,
            thread: Some(thread),
        })
    }

    fn run(engine: Arc<dyn Engine>, config: MaintenanceConfig, shutdown: Arc<AtomicBool>) {
        let poll = config.interval.min(MAX_POLL).max(Duration::from_millis(1));
        let mut last_pass = Instant::now();

        while !shutdown.load(Ordering::Acquire) {
            thread::sleep(poll);

            if shutdown.load(Ordering::Acquire) || last_pass.elapsed() < config.interval {
                continue;
            }

            match engine.reclaim_space(config.discard_ratio) {
                Ok(()) => debug!(
                    backend = engine.kind(),
                    discard_ratio = config.discard_ratio,
                    "maintenance pass finished"
                ),
                Err(err) => warn!(error = %err, "maintenance pass failed"),
            }
            last_pass = Instant::now();
        }
    }

    /// Signals the thread and waits for it, letting an in-flight pass finish.
    pub(crate) fn stop(&mut self) -> Result<()> {
        self.shutdown_signal.store(true, Ordering::Release);

        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| Error::Storage("maintenance thread panicked".to_string()))?;
            debug!("maintenance worker stopped");
        }
        Ok(())
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "failed to stop maintenance worker");
        }
    }
}
