//! Virtual-file registry for bulk loads
//!
//! The engine's infile facility reads from a named source. The registry
//! maps process-unique virtual names to in-memory [`RowBuffer`]s so a
//! bulk-load statement can reference rows that never touch disk. A
//! buffer is registered per load action and released when the action
//! completes, successfully or not.

use crate::row_buffer::RowBuffer;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of virtual infile names to their row buffers.
#[derive(Debug, Default)]
pub struct LoadChannelRegistry {
    channels: DashMap<String, Mutex<RowBuffer>>,
    next_id: AtomicU64,
}

impl LoadChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer under a fresh virtual name.
    pub fn register(&self, buffer: RowBuffer) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("czar-infile-{id}");
        self.channels.insert(name.clone(), Mutex::new(buffer));
        name
    }

    /// Pull the next bytes of a registered buffer into `dst`.
    ///
    /// Returns `None` for unknown names, otherwise the byte count (0 at
    /// end of stream).
    pub fn read(&self, name: &str, dst: &mut [u8]) -> Option<usize> {
        self.channels.get(name).map(|entry| entry.lock().read(dst))
    }

    /// Drain a registered buffer to its end.
    pub fn read_to_end(&self, name: &str) -> Option<Vec<u8>> {
        self.channels
            .get(name)
            .map(|entry| entry.lock().read_to_end())
    }

    /// Release a buffer and its resources; returns whether it existed.
    pub fn release(&self, name: &str) -> bool {
        self.channels.remove(name).is_some()
    }

    /// Number of currently registered buffers
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
