//! Configuration-store contract
//!
//! The resolver reads partitioning metadata from an external
//! configuration store. [`ConfigStore`] is the seam; production wires in
//! the distributed store client, tests and single-node setups use
//! [`MemoryConfigStore`].

use crate::error::{MetaError, Result};
use std::collections::HashMap;

/// Partitioning parameters recorded for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitioningParams {
    /// 0 = unpartitioned, 1 = chunked, 2 = sub-chunkable
    pub chunk_level: u32,
    /// Director table this table is partitioned by; empty or equal to
    /// the table's own name for directors themselves
    pub dir_table: String,
    /// Foreign-key column referencing the director
    pub dir_col_name: String,
}

/// Match-table parameters recorded for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchParams {
    pub dir_table1: String,
    pub dir_table2: String,
    pub dir_col_name1: String,
    pub dir_col_name2: String,
}

/// Everything the store records for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableParams {
    pub partitioning: PartitioningParams,
    /// Present only for match tables
    pub match_params: Option<MatchParams>,
}

/// Partitioning scheme of a whole database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbStriping {
    /// Two tables can be co-located for joins only when their databases
    /// share this id
    pub partitioning_id: u32,
}

/// Read-only access to the partitioning metadata of the cluster.
pub trait ConfigStore: Send + Sync {
    /// Partitioning and match parameters for one table
    fn table_params(&self, db: &str, table: &str) -> Result<TableParams>;

    /// Partition columns of a director table, ordered longitude,
    /// latitude, primary key
    fn partition_columns(&self, db: &str, table: &str) -> Result<Vec<String>>;

    /// Partitioning scheme of a database
    fn db_striping(&self, db: &str) -> Result<DbStriping>;
}

#[derive(Debug, Clone, Default)]
struct TableEntry {
    params: TableParams,
    partition_cols: Vec<String>,
}

/// In-memory [`ConfigStore`] for tests and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    tables: HashMap<(String, String), TableEntry>,
    dbs: HashMap<String, DbStriping>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database and its partitioning id
    pub fn add_db(&mut self, db: impl Into<String>, partitioning_id: u32) {
        self.dbs.insert(db.into(), DbStriping { partitioning_id });
    }

    /// Register an unpartitioned table
    pub fn add_unpartitioned(&mut self, db: &str, table: &str) {
        self.tables
            .insert(key(db, table), TableEntry::default());
    }

    /// Register a director table with its longitude, latitude and
    /// primary-key columns
    pub fn add_director(&mut self, db: &str, table: &str, lon: &str, lat: &str, pk: &str) {
        self.tables.insert(
            key(db, table),
            TableEntry {
                params: TableParams {
                    partitioning: PartitioningParams {
                        chunk_level: 2,
                        dir_table: table.to_string(),
                        dir_col_name: pk.to_string(),
                    },
                    match_params: None,
                },
                partition_cols: vec![lon.to_string(), lat.to_string(), pk.to_string()],
            },
        );
    }

    /// Register a child table referencing `dir_table` through `fk`
    pub fn add_child(&mut self, db: &str, table: &str, dir_table: &str, fk: &str) {
        self.tables.insert(
            key(db, table),
            TableEntry {
                params: TableParams {
                    partitioning: PartitioningParams {
                        chunk_level: 1,
                        dir_table: dir_table.to_string(),
                        dir_col_name: fk.to_string(),
                    },
                    match_params: None,
                },
                partition_cols: Vec::new(),
            },
        );
    }

    /// Register a match table relating two directors
    pub fn add_match(
        &mut self,
        db: &str,
        table: &str,
        dir_table1: &str,
        dir_table2: &str,
        fk1: &str,
        fk2: &str,
    ) {
        self.tables.insert(
            key(db, table),
            TableEntry {
                params: TableParams {
                    partitioning: PartitioningParams {
                        chunk_level: 1,
                        dir_table: String::new(),
                        dir_col_name: String::new(),
                    },
                    match_params: Some(MatchParams {
                        dir_table1: dir_table1.to_string(),
                        dir_table2: dir_table2.to_string(),
                        dir_col_name1: fk1.to_string(),
                        dir_col_name2: fk2.to_string(),
                    }),
                },
                partition_cols: Vec::new(),
            },
        );
    }

    fn entry(&self, db: &str, table: &str) -> Result<&TableEntry> {
        self.tables
            .get(&key(db, table))
            .ok_or_else(|| MetaError::Store(format!("no metadata for table {db}.{table}")))
    }
}

fn key(db: &str, table: &str) -> (String, String) {
    (db.to_string(), table.to_string())
}

impl ConfigStore for MemoryConfigStore {
    fn table_params(&self, db: &str, table: &str) -> Result<TableParams> {
        Ok(self.entry(db, table)?.params.clone())
    }

    fn partition_columns(&self, db: &str, table: &str) -> Result<Vec<String>> {
        Ok(self.entry(db, table)?.partition_cols.clone())
    }

    fn db_striping(&self, db: &str) -> Result<DbStriping> {
        self.dbs
            .get(db)
            .copied()
            .ok_or_else(|| MetaError::Store(format!("no striping recorded for database {db}")))
    }
}
