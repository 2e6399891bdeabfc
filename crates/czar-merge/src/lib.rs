//! Result streaming and merging engine
//!
//! Workers answer a chunked user query with framed binary result
//! messages that arrive concurrently at the coordinator. This crate
//! turns those frames into one user-visible answer table:
//!
//! - [`InfileMerger`] is the per-session facade: feed it raw bytes with
//!   `merge`, then call `finalize` once every frame has been delivered.
//! - The first frame's row schema materializes the transient merge
//!   table; every frame's rows are bulk-loaded into it through the
//!   engine's infile facility.
//! - `finalize` optionally runs an aggregation/order/limit fixup that
//!   projects the merge table into the target table, then drops the
//!   merge table.
//!
//! # Modules
//!
//! - [`merger`]: per-session orchestration facade
//! - [`manager`]: bounded worker pool owning the SQL connection
//! - [`infile`]: virtual-file registry feeding the bulk loader
//! - [`row_buffer`]: lazy row-byte source over one result envelope
//! - [`statements`]: SQL text builders
//! - [`engine`]: seam to the SQL engine
//! - [`error`]: session error taxonomy

pub mod engine;
pub mod error;
pub mod infile;
pub mod manager;
pub mod merger;
pub mod row_buffer;
pub mod statements;

// Re-exports
pub use engine::{EngineError, SqlEngine, ENGINE_TABLE_FULL};
pub use error::{MergeError, Result};
pub use infile::LoadChannelRegistry;
pub use manager::{ActionState, LoadAction, MergeManager, MergeManagerConfig};
pub use merger::{InfileMerger, MergeConfig, MergeFixup};
pub use row_buffer::RowBuffer;
