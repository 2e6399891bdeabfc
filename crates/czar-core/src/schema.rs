//! Row schema declared by workers for a result stream
//!
//! The schema travels inside the first result envelope of a session and
//! drives the DDL for the transient merge table. Column order is
//! significant and must survive the trip from worker to coordinator.

use serde::{Deserialize, Serialize};

/// Schema of one result column as declared by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    name: String,
    sql_type: String,
    engine_type: Option<String>,
    default_value: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            engine_type: None,
            default_value: None,
        }
    }

    /// Attach a storage-engine column type (e.g. `int(11)`) that takes
    /// precedence over the portable SQL type in generated DDL.
    pub fn with_engine_type(mut self, engine_type: impl Into<String>) -> Self {
        self.engine_type = Some(engine_type.into());
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn engine_type(&self) -> Option<&str> {
        self.engine_type.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

/// Ordered sequence of column descriptors for one result stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSchema {
    columns: Vec<ColumnSchema>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self { columns: vec![] }
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }
}

/// One result row. Cells are raw bytes in the engine's text format;
/// `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<Option<Vec<u8>>>,
}

impl Row {
    pub fn new(cells: Vec<Option<Vec<u8>>>) -> Self {
        Self { cells }
    }

    /// Build a row from text cells, mapping `None` to SQL NULL.
    pub fn from_text(cells: &[Option<&str>]) -> Self {
        Self {
            cells: cells
                .iter()
                .map(|c| c.map(|s| s.as_bytes().to_vec()))
                .collect(),
        }
    }

    pub fn cells(&self) -> &[Option<Vec<u8>>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
