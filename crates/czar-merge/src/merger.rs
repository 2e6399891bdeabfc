//! Per-session merge facade
//!
//! One [`InfileMerger`] lives for one user query. Transport threads feed
//! it raw frame bytes with [`merge`]; once every worker has answered,
//! [`finalize`] runs the optional aggregation/order/limit fixup and the
//! target table becomes visible to the user.
//!
//! The first fatal error is recorded on the session; every later call
//! returns it verbatim and no further SQL is issued.
//!
//! [`merge`]: InfileMerger::merge
//! [`finalize`]: InfileMerger::finalize

use crate::engine::SqlEngine;
use crate::error::{MergeError, Result};
use crate::infile::LoadChannelRegistry;
use crate::manager::{MergeManager, MergeManagerConfig};
use crate::statements::{form_create_table, form_drop_table, form_fixup_select};
use czar_core::{RowSchema, SessionId};
use czar_proto::{DecodeOutcome, FrameCodec};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Aggregation/order/limit fixup applied at finalize.
///
/// Produced by the planner whenever merging worker fragments is not
/// enough to answer the query (aggregates, ORDER BY, LIMIT).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeFixup {
    /// Projection of the final SELECT
    pub select: String,
    /// Planner-provided fragment appended after the merge table
    /// (e.g. a GROUP BY clause)
    pub post: String,
    /// ORDER BY expression, without the keyword
    pub order_by: Option<String>,
    /// Row limit of the final result
    pub limit: Option<u64>,
}

impl Default for MergeFixup {
    fn default() -> Self {
        Self {
            select: "*".to_string(),
            post: String::new(),
            order_by: None,
            limit: None,
        }
    }
}

impl MergeFixup {
    fn suffix(&self) -> String {
        let mut parts = Vec::new();
        if !self.post.is_empty() {
            parts.push(self.post.clone());
        }
        if let Some(order_by) = &self.order_by {
            parts.push(format!("ORDER BY {order_by}"));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("LIMIT {limit}"));
        }
        parts.join(" ")
    }
}

/// Configuration for one merge session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Database holding result tables
    pub target_db: String,
    /// User-visible result table; synthesized from `target_db` when
    /// empty
    pub target_table: String,
    /// Fixup step, when the planner requires one
    pub fixup: Option<MergeFixup>,
    /// Storage engine for the transient merge table
    /// (e.g. `MEMORY`)
    pub merge_engine: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    TableCreated,
    Finalized,
}

/// Per-query orchestrator of the result merge.
pub struct InfileMerger {
    config: MergeConfig,
    target_table: String,
    merge_table: String,
    codec: FrameCodec,
    manager: Arc<MergeManager>,
    session_id: Mutex<Option<SessionId>>,
    need_create: Mutex<bool>,
    state: Mutex<SessionState>,
    error: Mutex<Option<MergeError>>,
    finalized: Mutex<Option<Result<()>>>,
}

impl InfileMerger {
    /// Create a merger over `engine`, whose infile facility resolves
    /// virtual names through `registry`.
    pub fn new(
        config: MergeConfig,
        engine: Box<dyn SqlEngine>,
        registry: Arc<LoadChannelRegistry>,
    ) -> Self {
        Self::with_manager_config(config, engine, registry, MergeManagerConfig::default())
    }

    pub fn with_manager_config(
        config: MergeConfig,
        engine: Box<dyn SqlEngine>,
        registry: Arc<LoadChannelRegistry>,
        manager_config: MergeManagerConfig,
    ) -> Self {
        let target_table = if config.target_table.is_empty() {
            let id = Uuid::new_v4().simple().to_string();
            format!("{}.result_{}", config.target_db, &id[..8])
        } else {
            config.target_table.clone()
        };
        // A fixup needs scratch space; without one the merge table is
        // the target itself.
        let merge_table = if config.fixup.is_some() {
            format!("{target_table}_m")
        } else {
            target_table.clone()
        };
        let manager = MergeManager::new(engine, registry, manager_config);

        Self {
            config,
            target_table,
            merge_table,
            codec: FrameCodec::default(),
            manager,
            session_id: Mutex::new(None),
            need_create: Mutex::new(true),
            state: Mutex::new(SessionState::Open),
            error: Mutex::new(None),
            finalized: Mutex::new(None),
        }
    }

    /// Feed frame bytes into the session.
    ///
    /// Consumes at most one whole frame and returns the consumed byte
    /// count; the caller slides its input window by that amount. A
    /// return of 0 means the buffer does not yet hold a whole frame.
    pub fn merge(&self, buf: &[u8]) -> Result<usize> {
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        if *self.state.lock() == SessionState::Finalized {
            return Err(MergeError::SessionFinished);
        }
        // Surface any load failure recorded since the last call.
        if let Some(err) = self.manager.failure() {
            return Err(self.record(err));
        }

        match self.codec.decode(buf) {
            Ok(DecodeOutcome::NeedMore) => Ok(0),
            Err(frame_err) => Err(self.record(MergeError::Frame(frame_err))),
            Ok(DecodeOutcome::Frame(frame)) => {
                self.check_session(frame.envelope.session_id)?;
                self.ensure_table(&frame.envelope.row_schema)?;
                let action = self
                    .manager
                    .new_action(&self.merge_table, frame.envelope);
                self.manager.dispatch(action);
                Ok(frame.consumed)
            }
        }
    }

    /// Complete the session.
    ///
    /// Blocks until every dispatched load has finished, then runs the
    /// fixup projection and drops the merge table when one was
    /// configured. Idempotent: a second call returns the first outcome
    /// and performs no additional SQL.
    pub fn finalize(&self) -> Result<()> {
        let mut finalized = self.finalized.lock();
        if let Some(outcome) = finalized.clone() {
            return outcome;
        }
        let outcome = self.run_finalize();
        *finalized = Some(outcome.clone());
        outcome
    }

    /// Record a user-initiated cancellation.
    ///
    /// In-flight loads are allowed to complete; their results are
    /// discarded with the session.
    pub fn cancel(&self) {
        let mut error = self.error.lock();
        if error.is_none() {
            tracing::info!("merge into {} cancelled", self.target_table);
            *error = Some(MergeError::Cancelled);
        }
    }

    /// Whether the session reached a terminal state
    pub fn is_finished(&self) -> bool {
        *self.state.lock() == SessionState::Finalized || self.error.lock().is_some()
    }

    /// Session id recorded from the first frame, if any
    pub fn session_id(&self) -> Option<SessionId> {
        *self.session_id.lock()
    }

    pub fn merge_table(&self) -> &str {
        &self.merge_table
    }

    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    fn run_finalize(&self) -> Result<()> {
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        self.manager.wait_idle();
        if let Some(err) = self.manager.failure() {
            return Err(self.record(err));
        }

        if self.merge_table != self.target_table {
            let fixup = self.config.fixup.as_ref();
            let select = fixup.map(|f| f.select.as_str()).unwrap_or("*");
            let suffix = fixup.map(MergeFixup::suffix).unwrap_or_default();
            let stmt =
                form_fixup_select(&self.target_table, select, &self.merge_table, &suffix);
            tracing::info!("merging {} into {}", self.merge_table, self.target_table);
            self.manager.apply_sql(&stmt).map_err(|e| self.record(e))?;
            self.manager
                .apply_sql(&form_drop_table(&self.merge_table))
                .map_err(|e| self.record(e))?;
        } else {
            tracing::info!("merged directly into {}", self.target_table);
        }

        *self.state.lock() = SessionState::Finalized;
        Ok(())
    }

    fn check_session(&self, got: SessionId) -> Result<()> {
        let mut session = self.session_id.lock();
        match *session {
            None => {
                *session = Some(got);
                Ok(())
            }
            Some(expected) if expected == got => Ok(()),
            Some(expected) => {
                drop(session);
                Err(self.record(MergeError::SessionMismatch { expected, got }))
            }
        }
    }

    /// Issue the merge-table DDL exactly once per session.
    fn ensure_table(&self, schema: &RowSchema) -> Result<()> {
        let mut need_create = self.need_create.lock();
        if !*need_create {
            return Ok(());
        }
        // A concurrent first frame may have failed the DDL while this
        // one waited on the create mutex; the statement must not be
        // retried.
        if let Some(err) = self.error.lock().clone() {
            return Err(err);
        }
        let stmt =
            form_create_table(&self.merge_table, schema, self.config.merge_engine.as_deref());
        tracing::debug!("creating merge table: {stmt}");

        match self.manager.apply_sql(&stmt) {
            Ok(()) => {
                *need_create = false;
                *self.state.lock() = SessionState::TableCreated;
                Ok(())
            }
            Err(MergeError::Exec(source)) => Err(self.record(MergeError::CreateTable {
                table: self.merge_table.clone(),
                source,
            })),
            Err(other) => Err(self.record(other)),
        }
    }

    fn record(&self, err: MergeError) -> MergeError {
        let mut slot = self.error.lock();
        slot.get_or_insert(err).clone()
    }
}

impl Drop for InfileMerger {
    fn drop(&mut self) {
        self.manager.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixup_suffix_assembly() {
        let fixup = MergeFixup {
            select: "*".to_string(),
            post: "GROUP BY `id`".to_string(),
            order_by: Some("`v`".to_string()),
            limit: Some(2),
        };
        assert_eq!(fixup.suffix(), "GROUP BY `id` ORDER BY `v` LIMIT 2");
        assert_eq!(MergeFixup::default().suffix(), "");
    }

    #[test]
    fn test_fixup_suffix_limit_only() {
        let fixup = MergeFixup {
            limit: Some(10),
            ..MergeFixup::default()
        };
        assert_eq!(fixup.suffix(), "LIMIT 10");
    }
}
