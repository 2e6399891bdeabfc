//! SQL text builders
//!
//! Every statement the merger issues is built here, so the exact shapes
//! the engine sees are in one place. Table names may arrive qualified
//! (`db.table`); each component is backtick-quoted separately.

use czar_core::RowSchema;

/// Backtick-quote one identifier component.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a possibly `db.table`-qualified name component-wise.
pub fn quote_table(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// DDL for the merge table, preserving the declared column order.
///
/// The engine-specific column type wins over the portable SQL type when
/// the worker declared one. `engine` adds a table-level storage engine
/// clause (e.g. `MEMORY` for transient merge tables).
pub fn form_create_table(table: &str, schema: &RowSchema, engine: Option<&str>) -> String {
    let cols = schema
        .columns()
        .iter()
        .map(|col| {
            let mut def = format!(
                "{} {}",
                quote_ident(col.name()),
                col.engine_type().unwrap_or_else(|| col.sql_type())
            );
            if let Some(default) = col.default_value() {
                def.push_str(" DEFAULT ");
                def.push_str(&quote_string(default));
            }
            def
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmt = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_table(table),
        cols
    );
    if let Some(engine) = engine {
        stmt.push_str(" ENGINE=");
        stmt.push_str(engine);
    }
    stmt
}

/// Bulk-load statement pulling rows from a registered virtual file.
pub fn form_load_infile(table: &str, virt_file: &str) -> String {
    format!(
        "LOAD DATA LOCAL INFILE {} INTO TABLE {}",
        quote_string(virt_file),
        quote_table(table)
    )
}

/// Projection that populates the target table from the merge table.
pub fn form_fixup_select(target: &str, select: &str, merge_table: &str, suffix: &str) -> String {
    let mut stmt = format!(
        "CREATE TABLE IF NOT EXISTS {} SELECT {} FROM {}",
        quote_table(target),
        select,
        quote_table(merge_table)
    );
    if !suffix.is_empty() {
        stmt.push(' ');
        stmt.push_str(suffix);
    }
    stmt
}

/// Drop the transient merge table.
pub fn form_drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_table(table))
}
