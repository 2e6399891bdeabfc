//! Descriptor pool and resolution
//!
//! Resolution is deterministic: the store is consulted once per table,
//! descriptors are memoized by `(db, table)`, and recursive director
//! lookups hit the memo. New descriptors are staged during resolution
//! and committed only after the whole resolution succeeds, so a failed
//! `get` leaves the pool untouched.

use crate::error::{MetaError, Result};
use crate::store::ConfigStore;
use crate::table_info::{ChildInfo, DirectorInfo, MatchInfo, TableInfo};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

type Key = (String, String);
type Staged = BTreeMap<Key, Arc<TableInfo>>;

/// Per-query context the resolver runs under.
#[derive(Clone)]
pub struct QueryContext {
    /// Database substituted for empty qualifiers
    pub default_db: String,
    /// Handle to the configuration store
    pub store: Arc<dyn ConfigStore>,
}

impl QueryContext {
    pub fn new(default_db: impl Into<String>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            default_db: default_db.into(),
            store,
        }
    }
}

/// Pool of table descriptors, keyed and ordered by `(db, name)`.
///
/// The pool owns every descriptor; lookups hand out shared references
/// whose director links point at the pooled director allocations.
#[derive(Default)]
pub struct TableInfoPool {
    pool: RwLock<BTreeMap<Key, Arc<TableInfo>>>,
}

impl TableInfoPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an already-resolved descriptor without touching the store
    pub fn lookup(&self, db: &str, table: &str) -> Option<Arc<TableInfo>> {
        self.pool
            .read()
            .get(&(db.to_string(), table.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.pool.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.read().is_empty()
    }

    /// Resolve the descriptor for `db.table`, consulting the store and
    /// memoizing the result.
    ///
    /// Returns `None` for unpartitioned tables. An empty `db` is
    /// substituted with the context's default database. Invariant
    /// violations raise [`MetaError::InvalidTable`] and leave the pool
    /// unchanged.
    pub fn get(
        &self,
        ctx: &QueryContext,
        db: &str,
        table: &str,
    ) -> Result<Option<Arc<TableInfo>>> {
        let db = if db.is_empty() {
            ctx.default_db.as_str()
        } else {
            db
        };
        let mut staged = Staged::new();
        let resolved = self.resolve(ctx, db, table, &mut staged)?;
        if staged.is_empty() {
            return Ok(resolved);
        }

        let mut pool = self.pool.write();
        for (key, info) in staged {
            // A concurrent get may have resolved the same table; the
            // first committed descriptor wins.
            pool.entry(key).or_insert(info);
        }
        match resolved {
            Some(_) => Ok(pool.get(&(db.to_string(), table.to_string())).cloned()),
            None => Ok(None),
        }
    }

    fn resolve(
        &self,
        ctx: &QueryContext,
        db: &str,
        table: &str,
        staged: &mut Staged,
    ) -> Result<Option<Arc<TableInfo>>> {
        let key = (db.to_string(), table.to_string());
        if let Some(info) = self.lookup(db, table) {
            return Ok(Some(info));
        }
        if let Some(info) = staged.get(&key) {
            return Ok(Some(info.clone()));
        }

        let params = ctx.store.table_params(db, table)?;
        let chunk_level = params.partitioning.chunk_level;
        if chunk_level == 0 {
            // Unpartitioned: no descriptor.
            return Ok(None);
        }

        let info = if let Some(m) = &params.match_params {
            let first = self.resolve_director(ctx, db, &m.dir_table1, staged)?;
            let second = self.resolve_director(ctx, db, &m.dir_table2, staged)?;
            let (first, second) = match (first, second) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(MetaError::InvalidTable(format!(
                        "{db}.{table} is a match table, but does not \
                         reference two director tables"
                    )));
                }
            };
            if m.dir_col_name1 == m.dir_col_name2
                || m.dir_col_name1.is_empty()
                || m.dir_col_name2.is_empty()
            {
                return Err(MetaError::InvalidTable(format!(
                    "match table {db}.{table} metadata does not contain \
                     2 non-empty and distinct director column names"
                )));
            }
            if first.partitioning_id != second.partitioning_id {
                return Err(MetaError::InvalidTable(format!(
                    "match table {db}.{table} relates two director tables \
                     with different partitionings"
                )));
            }
            TableInfo::Match(MatchInfo {
                db: db.to_string(),
                name: table.to_string(),
                first,
                second,
                first_fk: m.dir_col_name1.clone(),
                second_fk: m.dir_col_name2.clone(),
            })
        } else if params.partitioning.dir_table.is_empty()
            || params.partitioning.dir_table == table
        {
            if chunk_level != 2 {
                return Err(MetaError::InvalidTable(format!(
                    "{db}.{table} is a director table, but cannot be sub-chunked"
                )));
            }
            let cols = ctx.store.partition_columns(db, table)?;
            let distinct =
                cols.len() == 3 && cols[0] != cols[1] && cols[1] != cols[2] && cols[0] != cols[2];
            if !distinct || cols.iter().any(|c| c.is_empty()) {
                return Err(MetaError::InvalidTable(format!(
                    "director table {db}.{table} metadata does not contain \
                     non-empty and distinct director, longitude and latitude \
                     column names"
                )));
            }
            let striping = ctx.store.db_striping(db)?;
            TableInfo::Director(Arc::new(DirectorInfo {
                db: db.to_string(),
                name: table.to_string(),
                lon: cols[0].clone(),
                lat: cols[1].clone(),
                pk: cols[2].clone(),
                partitioning_id: striping.partitioning_id,
            }))
        } else {
            if chunk_level != 1 {
                return Err(MetaError::InvalidTable(format!(
                    "{db}.{table} is a child table, but can be sub-chunked"
                )));
            }
            let director = self
                .resolve_director(ctx, db, &params.partitioning.dir_table, staged)?
                .ok_or_else(|| {
                    MetaError::InvalidTable(format!(
                        "{db}.{table} is a child table, but does not \
                         reference a director table"
                    ))
                })?;
            if params.partitioning.dir_col_name.is_empty() {
                return Err(MetaError::InvalidTable(format!(
                    "child table {db}.{table} metadata does not contain \
                     a director column name"
                )));
            }
            TableInfo::Child(ChildInfo {
                db: db.to_string(),
                name: table.to_string(),
                director,
                fk: params.partitioning.dir_col_name.clone(),
            })
        };

        tracing::debug!("resolved {}", info);
        let info = Arc::new(info);
        staged.insert(key, info.clone());
        Ok(Some(info))
    }

    fn resolve_director(
        &self,
        ctx: &QueryContext,
        db: &str,
        table: &str,
        staged: &mut Staged,
    ) -> Result<Option<Arc<DirectorInfo>>> {
        Ok(self
            .resolve(ctx, db, table, staged)?
            .and_then(|info| info.as_director().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;

    fn lsst_store() -> MemoryConfigStore {
        let mut store = MemoryConfigStore::new();
        store.add_db("LSST", 17);
        store.add_director("LSST", "Object", "ra", "decl", "objectId");
        store.add_director("LSST", "Source", "raSrc", "declSrc", "sourceId");
        store.add_child("LSST", "ObjectExtras", "Object", "objectId");
        store.add_match("LSST", "RefMatch", "Object", "Source", "objectId", "sourceId");
        store.add_unpartitioned("LSST", "Filter");
        store
    }

    fn ctx(store: MemoryConfigStore) -> QueryContext {
        QueryContext::new("LSST", Arc::new(store))
    }

    #[test]
    fn test_unpartitioned_has_no_descriptor() {
        let pool = TableInfoPool::new();
        let ctx = ctx(lsst_store());

        assert!(pool.get(&ctx, "LSST", "Filter").unwrap().is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_director_resolution() {
        let pool = TableInfoPool::new();
        let ctx = ctx(lsst_store());

        let info = pool.get(&ctx, "LSST", "Object").unwrap().unwrap();
        let dir = info.as_director().expect("Object is a director");
        assert_eq!(dir.pk, "objectId");
        assert_eq!(dir.lon, "ra");
        assert_eq!(dir.lat, "decl");
        assert_eq!(dir.partitioning_id, 17);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_empty_db_uses_default() {
        let pool = TableInfoPool::new();
        let ctx = ctx(lsst_store());

        let info = pool.get(&ctx, "", "Object").unwrap().unwrap();
        assert_eq!(info.db(), "LSST");
    }

    #[test]
    fn test_child_references_pooled_director() {
        let pool = TableInfoPool::new();
        let ctx = ctx(lsst_store());

        let child = pool.get(&ctx, "LSST", "ObjectExtras").unwrap().unwrap();
        let child = match child.as_ref() {
            TableInfo::Child(c) => c,
            other => panic!("expected child, got {other}"),
        };
        assert_eq!(child.fk, "objectId");

        let dir = pool.get(&ctx, "LSST", "Object").unwrap().unwrap();
        let dir = dir.as_director().unwrap();
        assert!(Arc::ptr_eq(&child.director, dir));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_match_topology() {
        let pool = TableInfoPool::new();
        let ctx = ctx(lsst_store());

        let info = pool.get(&ctx, "LSST", "RefMatch").unwrap().unwrap();
        let m = match info.as_ref() {
            TableInfo::Match(m) => m,
            other => panic!("expected match, got {other}"),
        };
        assert_eq!(m.first_fk, "objectId");
        assert_eq!(m.second_fk, "sourceId");
        assert_eq!(m.first.partitioning_id, m.second.partitioning_id);

        // One call pooled the match table and both directors.
        assert_eq!(pool.len(), 3);

        // Repeated gets return the same descriptor instances.
        let again = pool.get(&ctx, "LSST", "RefMatch").unwrap().unwrap();
        assert!(Arc::ptr_eq(&info, &again));
        let object = pool.get(&ctx, "LSST", "Object").unwrap().unwrap();
        assert!(Arc::ptr_eq(object.as_director().unwrap(), &m.first));
    }

    #[test]
    fn test_match_with_mismatched_partitionings_changes_nothing() {
        // Source was resolved while the database was striped with id 23;
        // the store has since been re-striped to 17. The pool keeps the
        // descriptor it built, so the match invariant must fail.
        let mut old = MemoryConfigStore::new();
        old.add_db("LSST", 23);
        old.add_director("LSST", "Source", "raSrc", "declSrc", "sourceId");

        let pool = TableInfoPool::new();
        let old_ctx = QueryContext::new("LSST", Arc::new(old));
        pool.get(&old_ctx, "LSST", "Source").unwrap().unwrap();

        let ctx = ctx(lsst_store());
        pool.get(&ctx, "LSST", "Object").unwrap().unwrap();
        let before = pool.len();

        let err = pool.get(&ctx, "LSST", "RefMatch").unwrap_err();
        assert!(matches!(err, MetaError::InvalidTable(_)));
        assert_eq!(pool.len(), before);
    }

    #[test]
    fn test_match_fk_columns_must_differ() {
        let mut store = MemoryConfigStore::new();
        store.add_db("LSST", 17);
        store.add_director("LSST", "Object", "ra", "decl", "objectId");
        store.add_director("LSST", "Source", "raSrc", "declSrc", "sourceId");
        store.add_match("LSST", "RefMatch", "Object", "Source", "objectId", "objectId");

        let pool = TableInfoPool::new();
        let ctx = ctx(store);
        let err = pool.get(&ctx, "LSST", "RefMatch").unwrap_err();
        assert!(matches!(err, MetaError::InvalidTable(_)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_director_must_be_sub_chunkable() {
        let mut store = MemoryConfigStore::new();
        store.add_db("LSST", 17);
        store.add_director("LSST", "Object", "ra", "decl", "objectId");
        // Corrupt the chunk level via a child-shaped entry that names
        // itself as director.
        store.add_child("LSST", "Broken", "Broken", "id");

        let pool = TableInfoPool::new();
        let ctx = ctx(store);
        let err = pool.get(&ctx, "LSST", "Broken").unwrap_err();
        assert!(matches!(err, MetaError::InvalidTable(_)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_director_columns_must_be_distinct() {
        let mut store = MemoryConfigStore::new();
        store.add_db("LSST", 17);
        store.add_director("LSST", "Object", "ra", "ra", "objectId");

        let pool = TableInfoPool::new();
        let ctx = ctx(store);
        let err = pool.get(&ctx, "LSST", "Object").unwrap_err();
        assert!(matches!(err, MetaError::InvalidTable(_)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_child_missing_director_column() {
        let mut store = MemoryConfigStore::new();
        store.add_db("LSST", 17);
        store.add_director("LSST", "Object", "ra", "decl", "objectId");
        store.add_child("LSST", "ObjectExtras", "Object", "");

        let pool = TableInfoPool::new();
        let ctx = ctx(store);
        let err = pool.get(&ctx, "LSST", "ObjectExtras").unwrap_err();
        assert!(matches!(err, MetaError::InvalidTable(_)));
        // The staged director is discarded along with the child.
        assert!(pool.is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let pool = TableInfoPool::new();
        let ctx = ctx(lsst_store());

        let a = pool.get(&ctx, "LSST", "ObjectExtras").unwrap().unwrap();
        let b = pool.get(&ctx, "LSST", "ObjectExtras").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 2);
    }
}
