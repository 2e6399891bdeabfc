//! Bounded-concurrency load dispatcher
//!
//! The manager owns the single SQL connection used for bulk loads. Load
//! actions queue onto a fixed pool of worker threads; the connection
//! mutex serializes statements, and a separate in-flight counter lets
//! `finalize` wait for quiescence without holding the connection.

use crate::engine::{EngineError, SqlEngine};
use crate::error::{MergeError, Result};
use crate::infile::LoadChannelRegistry;
use crate::row_buffer::RowBuffer;
use crate::statements::form_load_infile;
use czar_proto::ResultEnvelope;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Configuration for the merge manager
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MergeManagerConfig {
    /// Worker threads executing load actions
    pub workers: usize,
}

impl Default for MergeManagerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Lifecycle of one load action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Registered but not yet picked up by a worker
    Prepared,
    /// Executing its bulk-load statement
    Running,
    /// Load completed
    Done,
    /// Load failed; the error is recorded on the manager
    Failed,
}

/// One deferred bulk load of a result envelope into the merge table.
///
/// Construction transfers ownership of the envelope's rows into the
/// load channel registry; the action itself only carries the statement
/// ingredients.
#[derive(Debug)]
pub struct LoadAction {
    table: String,
    virt_file: String,
    state: ActionState,
}

impl LoadAction {
    /// Virtual-file name the bulk-load statement references
    pub fn virt_file(&self) -> &str {
        &self.virt_file
    }

    pub fn state(&self) -> ActionState {
        self.state
    }
}

/// Owns the SQL connection and dispatches bulk loads.
pub struct MergeManager {
    engine: Mutex<Box<dyn SqlEngine>>,
    registry: Arc<LoadChannelRegistry>,
    inflight: Mutex<usize>,
    idle: Condvar,
    queue: Mutex<VecDeque<LoadAction>>,
    work_ready: Condvar,
    stopping: AtomicBool,
    failure: Mutex<Option<MergeError>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl MergeManager {
    /// Start the manager and its worker pool.
    ///
    /// `registry` must be the same registry the engine resolves virtual
    /// infile names through.
    pub fn new(
        engine: Box<dyn SqlEngine>,
        registry: Arc<LoadChannelRegistry>,
        config: MergeManagerConfig,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            engine: Mutex::new(engine),
            registry,
            inflight: Mutex::new(0),
            idle: Condvar::new(),
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            stopping: AtomicBool::new(false),
            failure: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        });
        {
            let mut workers = manager.workers.lock();
            for _ in 0..config.workers.max(1) {
                let runner = Arc::clone(&manager);
                workers.push(std::thread::spawn(move || runner.worker_loop()));
            }
        }
        manager
    }

    /// Prepare a load action for one envelope.
    ///
    /// Takes exclusive ownership of the envelope, registers its rows
    /// under a fresh virtual-file name and increments the in-flight
    /// counter. The action must be handed to [`dispatch`].
    ///
    /// [`dispatch`]: MergeManager::dispatch
    pub fn new_action(&self, table: &str, envelope: ResultEnvelope) -> LoadAction {
        let virt_file = self.registry.register(RowBuffer::new(envelope));
        {
            let mut inflight = self.inflight.lock();
            *inflight += 1;
        }
        LoadAction {
            table: table.to_string(),
            virt_file,
            state: ActionState::Prepared,
        }
    }

    /// Queue an action onto the worker pool.
    pub fn dispatch(&self, action: LoadAction) {
        self.queue.lock().push_back(action);
        self.work_ready.notify_one();
    }

    /// Execute one statement under the connection mutex.
    pub fn apply_sql(&self, sql: &str) -> Result<()> {
        let mut engine = self.engine.lock();
        if !engine.connected() {
            return Err(MergeError::Connect(EngineError::new(
                2006,
                "server connection lost",
            )));
        }
        engine.execute(sql).map_err(MergeError::Exec)
    }

    /// Decrement the in-flight counter, waking `wait_idle` at zero.
    pub fn signal_done(&self) {
        let mut inflight = self.inflight.lock();
        *inflight = inflight.saturating_sub(1);
        if *inflight == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until every prepared action has reached a terminal state.
    pub fn wait_idle(&self) {
        let mut inflight = self.inflight.lock();
        while *inflight > 0 {
            self.idle.wait(&mut inflight);
        }
    }

    /// Number of actions not yet terminal
    pub fn in_flight(&self) -> usize {
        *self.inflight.lock()
    }

    /// First load failure recorded on this manager, if any
    pub fn failure(&self) -> Option<MergeError> {
        self.failure.lock().clone()
    }

    /// Drain the queue and stop the worker pool. Idempotent.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.work_ready.notify_all();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn worker_loop(&self) {
        loop {
            let action = {
                let mut queue = self.queue.lock();
                loop {
                    if let Some(action) = queue.pop_front() {
                        break action;
                    }
                    if self.stopping.load(Ordering::Acquire) {
                        return;
                    }
                    self.work_ready.wait(&mut queue);
                }
            };
            self.run_action(action);
        }
    }

    fn run_action(&self, mut action: LoadAction) {
        action.state = ActionState::Running;
        let stmt = form_load_infile(&action.table, &action.virt_file);
        tracing::debug!("loading {} into {}", action.virt_file, action.table);

        let result = self.apply_sql(&stmt);
        // The buffer is released whether the load succeeded or not.
        self.registry.release(&action.virt_file);

        match result {
            Ok(()) => action.state = ActionState::Done,
            Err(err) => {
                action.state = ActionState::Failed;
                tracing::warn!("bulk load into {} failed: {}", action.table, err);
                let mut failure = self.failure.lock();
                if failure.is_none() {
                    *failure = Some(err);
                }
            }
        }
        self.signal_done();
    }
}
