//! SQL DDL for the catalog tables.
//!
//! Defines `caps` (one row per catalog item, with an optional half-precision
//! embedding blob) and `schema_meta`. All DDL uses `IF NOT EXISTS`.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS caps (
    id INTEGER PRIMARY KEY,
    brand TEXT NOT NULL,
    cap_type TEXT NOT NULL,
    image_ref TEXT NOT NULL,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_caps_image_ref ON caps(image_ref);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
