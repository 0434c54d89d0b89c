//! Async bridge for blocking native calls.
//!
//! Native setup and start calls may block for a long time (permission
//! prompts, camera warm-up).  Each one runs on its own worker thread and
//! the frame loop polls the returned [`NativeCall`] for completion.  A
//! failed or panicking call completes with no result; interpreting a
//! missing result is left to the lifecycle orchestrator.

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::error::EngineError;

// ── Call gate ──────────────────────────────────────────────

/// Allows at most one outstanding native call per backend.
#[derive(Debug, Clone, Default)]
pub struct CallGate {
    busy: Arc<AtomicBool>,
}

impl CallGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a call issued through this gate is still running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ── Native call ────────────────────────────────────────────

struct Completion<T> {
    done: AtomicBool,
    result: Mutex<Option<T>>,
}

impl<T> Completion<T> {
    fn pending() -> Self {
        Self {
            done: AtomicBool::new(false),
            result: Mutex::new(None),
        }
    }

    fn finish(&self, value: Option<T>) {
        *self.result.lock() = value;
        self.done.store(true, Ordering::Release);
    }
}

/// Handle to a native call running off the frame loop.
pub struct NativeCall<T> {
    label: &'static str,
    completion: Arc<Completion<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> NativeCall<T> {
    /// Run `f` on a worker thread.
    ///
    /// Rejected with [`EngineError::CallOutstanding`] while another call
    /// issued through `gate` has not completed.
    pub fn spawn<F>(label: &'static str, gate: &CallGate, f: F) -> Result<Self, EngineError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        if !gate.try_acquire() {
            return Err(EngineError::CallOutstanding(label));
        }

        let completion = Arc::new(Completion::pending());
        let worker_completion = Arc::clone(&completion);
        let worker_gate = gate.clone();

        let spawned = thread::Builder::new()
            .name(format!("native-{}", label))
            .spawn(move || {
                let value = match panic::catch_unwind(AssertUnwindSafe(f)) {
                    Ok(Ok(value)) => Some(value),
                    Ok(Err(e)) => {
                        error!("bridge: native call {} failed: {:#}", label, e);
                        None
                    }
                    Err(_) => {
                        error!("bridge: native call {} panicked", label);
                        None
                    }
                };
                // Gate opens before completion is visible so the next
                // call can be issued as soon as this one reports done.
                worker_gate.release();
                worker_completion.finish(value);
            });

        match spawned {
            Ok(handle) => {
                debug!("bridge: issued {}", label);
                Ok(Self {
                    label,
                    completion,
                    worker: Some(handle),
                })
            }
            Err(e) => {
                error!("bridge: could not spawn worker for {}: {}", label, e);
                gate.release();
                completion.finish(None);
                Ok(Self {
                    label,
                    completion,
                    worker: None,
                })
            }
        }
    }
}

impl<T> NativeCall<T> {
    /// A call that completed synchronously with `value`.
    pub fn resolved(label: &'static str, value: T) -> Self {
        let completion = Completion::pending();
        completion.finish(Some(value));
        Self {
            label,
            completion: Arc::new(completion),
            worker: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Non-blocking completion check.
    pub fn is_complete(&self) -> bool {
        self.completion.done.load(Ordering::Acquire)
    }

    /// Take the result of a completed call.
    ///
    /// `None` while the call is still running, and also once complete if
    /// the native call failed or the result was already taken.
    pub fn take_result(&mut self) -> Option<T> {
        if !self.is_complete() {
            return None;
        }
        self.reap();
        self.completion.result.lock().take()
    }

    /// Block until the call completes.  Teardown only.
    pub fn wait(mut self) -> Option<T> {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("bridge: worker for {} exited abnormally", self.label);
            }
        }
        self.completion.result.lock().take()
    }

    fn reap(&mut self) {
        if let Some(handle) = self.worker.take() {
            // Completion is published as the worker's last action.
            let _ = handle.join();
        }
    }
}

impl<T> std::fmt::Debug for NativeCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCall")
            .field("label", &self.label)
            .field("complete", &self.is_complete())
            .finish()
    }
}
