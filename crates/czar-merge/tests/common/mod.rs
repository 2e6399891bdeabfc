//! In-memory SQL engine for merge tests
//!
//! Understands the statement shapes the merger emits (merge-table DDL,
//! bulk loads through the load channel registry, the finalize
//! projection and drop) and keeps the resulting tables inspectable.

use czar_merge::{EngineError, LoadChannelRegistry, SqlEngine};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default)]
pub struct EngineState {
    pub tables: BTreeMap<String, TableData>,
    pub statements: Vec<String>,
    /// Count of column-definition CREATE TABLE statements (merge DDL)
    pub create_table_count: usize,
    /// Fail the next statement of any kind with this error
    pub fail_next: Option<EngineError>,
    /// Fail every bulk-load statement with this error
    pub fail_loads: Option<EngineError>,
}

pub struct MemorySqlEngine {
    registry: Arc<LoadChannelRegistry>,
    state: Arc<Mutex<EngineState>>,
}

impl MemorySqlEngine {
    pub fn new(registry: Arc<LoadChannelRegistry>) -> Self {
        Self {
            registry,
            state: Arc::new(Mutex::new(EngineState::default())),
        }
    }

    /// Shared handle kept by the test after the engine moves into the
    /// merger.
    pub fn state(&self) -> Arc<Mutex<EngineState>> {
        Arc::clone(&self.state)
    }
}

impl SqlEngine for MemorySqlEngine {
    fn execute(&mut self, sql: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.statements.push(sql.to_string());
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }

        if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            let (name, tail) = parse_quoted_name(rest).ok_or_else(|| syntax(sql))?;
            if let Some(tail) = tail.strip_prefix(" (") {
                let end = tail.rfind(')').ok_or_else(|| syntax(sql))?;
                let columns = tail[..end]
                    .split(", ")
                    .filter_map(|def| parse_quoted_name(def).map(|(col, _)| col))
                    .collect();
                state.create_table_count += 1;
                state.tables.entry(name).or_insert(TableData {
                    columns,
                    rows: Vec::new(),
                });
                Ok(())
            } else if let Some(tail) = tail.strip_prefix(" SELECT ") {
                let from = tail.find(" FROM ").ok_or_else(|| syntax(sql))?;
                let (src, suffix) =
                    parse_quoted_name(&tail[from + " FROM ".len()..]).ok_or_else(|| syntax(sql))?;
                let mut data = state
                    .tables
                    .get(&src)
                    .cloned()
                    .ok_or_else(|| missing_table(&src))?;
                apply_suffix(&mut data, suffix.trim_start()).map_err(|_| syntax(sql))?;
                state.tables.entry(name).or_insert(data);
                Ok(())
            } else {
                Err(syntax(sql))
            }
        } else if let Some(rest) = sql.strip_prefix("LOAD DATA LOCAL INFILE '") {
            if let Some(err) = state.fail_loads.clone() {
                return Err(err);
            }
            let end = rest.find('\'').ok_or_else(|| syntax(sql))?;
            let virt_file = &rest[..end];
            let rest = rest[end + 1..]
                .strip_prefix(" INTO TABLE ")
                .ok_or_else(|| syntax(sql))?;
            let (table, _) = parse_quoted_name(rest).ok_or_else(|| syntax(sql))?;
            let bytes = self
                .registry
                .read_to_end(virt_file)
                .ok_or_else(|| EngineError::new(29, format!("file not found: {virt_file}")))?;
            let rows = parse_tsv(&bytes);
            let data = state
                .tables
                .get_mut(&table)
                .ok_or_else(|| missing_table(&table))?;
            data.rows.extend(rows);
            Ok(())
        } else if let Some(rest) = sql.strip_prefix("DROP TABLE IF EXISTS ") {
            let (name, _) = parse_quoted_name(rest).ok_or_else(|| syntax(sql))?;
            state.tables.remove(&name);
            Ok(())
        } else {
            Err(syntax(sql))
        }
    }
}

fn syntax(sql: &str) -> EngineError {
    EngineError::new(1064, format!("syntax error near: {sql}"))
}

fn missing_table(name: &str) -> EngineError {
    EngineError::new(1146, format!("table {name} doesn't exist"))
}

/// Parse a backtick-quoted, possibly dotted name; returns the unquoted
/// name and the remainder of the input.
fn parse_quoted_name(input: &str) -> Option<(String, &str)> {
    let mut rest = input;
    let mut parts = Vec::new();
    loop {
        rest = rest.strip_prefix('`')?;
        let end = rest.find('`')?;
        parts.push(rest[..end].to_string());
        rest = &rest[end + 1..];
        match rest.strip_prefix('.') {
            Some(r) => rest = r,
            None => break,
        }
    }
    Some((parts.join("."), rest))
}

/// Apply an `ORDER BY` / `LIMIT` finalize suffix to a table snapshot.
fn apply_suffix(data: &mut TableData, mut suffix: &str) -> Result<(), ()> {
    if let Some(rest) = suffix.strip_prefix("ORDER BY ") {
        let (col, rest) = parse_quoted_name(rest).ok_or(())?;
        let idx = data.columns.iter().position(|c| *c == col).ok_or(())?;
        data.rows.sort_by(|a, b| compare_cells(&a[idx], &b[idx]));
        suffix = rest.trim_start();
    }
    if let Some(rest) = suffix.strip_prefix("LIMIT ") {
        let limit: usize = rest.trim().parse().map_err(|_| ())?;
        data.rows.truncate(limit);
    }
    Ok(())
}

fn compare_cells(a: &Option<String>, b: &Option<String>) -> Ordering {
    let numeric = |cell: &Option<String>| cell.as_deref().and_then(|s| s.parse::<f64>().ok());
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Decode the loader text format: tab-separated cells, newline rows,
/// backslash escapes, `\N` for NULL.
fn parse_tsv(bytes: &[u8]) -> Vec<Vec<Option<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell: Vec<u8> = Vec::new();
    let mut escaped = false;
    for &b in bytes {
        if escaped {
            cell.push(b'\\');
            cell.push(b);
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'\t' {
            row.push(finish_cell(std::mem::take(&mut cell)));
        } else if b == b'\n' {
            row.push(finish_cell(std::mem::take(&mut cell)));
            rows.push(std::mem::take(&mut row));
        } else {
            cell.push(b);
        }
    }
    rows
}

fn finish_cell(raw: Vec<u8>) -> Option<String> {
    if raw == b"\\N" {
        return None;
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut escaped = false;
    for b in raw {
        if escaped {
            out.push(b);
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}
