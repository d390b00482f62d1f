use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::progress::ScanProgress;
use crate::reconstruct::reconstruct;
use crate::state::{IngestOutcome, ScanConfig, ScanMachine, ScanState};

/// Thread-safe receiver for one transfer at a time.
///
/// [`ingest`](Self::ingest) may be called from any thread at any rate;
/// each call runs the whole transition under one lock. Reconstruction runs
/// on the runtime's blocking pool so callers never wait for it. State
/// changes are published on a [`watch`] channel.
#[derive(Clone)]
pub struct ScanSession {
    machine: Arc<Mutex<ScanMachine>>,
    state_tx: Arc<watch::Sender<ScanState>>,
    runtime: Handle,
}

impl ScanSession {
    /// Creates a session that schedules reconstruction on `runtime`.
    pub fn new(config: ScanConfig, runtime: Handle) -> Self {
        let (state_tx, _) = watch::channel(ScanState::Idle);
        Self {
            machine: Arc::new(Mutex::new(ScanMachine::new(config))),
            state_tx: Arc::new(state_tx),
            runtime,
        }
    }

    /// Creates a session on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn current(config: ScanConfig) -> Self {
        Self::new(config, Handle::current())
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    /// Returns the current state.
    pub fn state(&self) -> ScanState {
        self.lock().state().clone()
    }

    /// Offers one scanned frame text.
    ///
    /// Malformed and duplicate frames change nothing. When the last missing
    /// frame arrives, reconstruction is spawned and this returns
    /// [`IngestOutcome::Complete`] without waiting for it.
    pub fn ingest(&self, text: &str) -> IngestOutcome {
        let mut machine = self.lock();
        let outcome = machine.ingest(text);
        match outcome {
            IngestOutcome::Stored { .. } | IngestOutcome::Failed => {
                self.state_tx.send_replace(machine.state().clone());
            }
            IngestOutcome::Complete { .. } => {
                self.state_tx.send_replace(machine.state().clone());
                self.spawn_reconstruction(&machine);
            }
            _ => {}
        }
        outcome
    }

    fn spawn_reconstruction(&self, machine: &ScanMachine) {
        let Some((generation, frames)) = machine.reconstruction_job() else {
            return;
        };
        let shared = Arc::clone(&self.machine);
        let state_tx = Arc::clone(&self.state_tx);
        debug!(generation, frames = frames.len(), "spawning reconstruction");

        self.runtime.spawn_blocking(move || {
            let result = reconstruct(&frames);
            let mut machine = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if machine.finish(generation, result) {
                state_tx.send_replace(machine.state().clone());
            }
        });
    }

    /// Discards all frames and returns to `Idle`.
    ///
    /// Safe in any state. An in-flight reconstruction still runs to the
    /// end, but its result is dropped.
    pub fn reset(&self) {
        let mut machine = self.lock();
        machine.reset();
        self.state_tx.send_replace(ScanState::Idle);
    }

    /// Indices not yet stored, ascending. Empty until the total is known.
    pub fn missing_indices(&self) -> Vec<usize> {
        self.lock().missing_indices()
    }

    pub fn progress(&self) -> ScanProgress {
        self.lock().progress()
    }

    /// Waits until the session reaches `Success` or `Error`.
    pub async fn finished(&self) -> ScanState {
        let mut rx = self.subscribe();
        match rx.wait_for(ScanState::is_terminal).await {
            Ok(state) => state.clone(),
            // The sender lives as long as `self`; fall back to a snapshot.
            Err(_) => self.state(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanMachine> {
        // Frames are insert-only, so state behind a poisoned lock is still
        // coherent.
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
