use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // Checkpoint every ~400KB instead of the default ~4MB
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // In-memory and fresh databases legitimately fail this
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS habit_patterns (
            device_id             TEXT NOT NULL,
            original_name         TEXT NOT NULL,
            corrected_name        TEXT,
            corrected_grams       REAL,
            preferred_cook_method TEXT,
            occurrence_count      INTEGER NOT NULL DEFAULT 0,
            auto_apply            INTEGER NOT NULL DEFAULT 0,
            updated_at            TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (device_id, original_name)
        );

        CREATE TABLE IF NOT EXISTS meals (
            id               TEXT PRIMARY KEY,
            device_id        TEXT NOT NULL,
            food             TEXT NOT NULL DEFAULT '',
            ingredients_json TEXT NOT NULL DEFAULT '[]',
            calories         REAL NOT NULL DEFAULT 0,
            protein_g        REAL NOT NULL DEFAULT 0,
            fat_g            REAL NOT NULL DEFAULT 0,
            carbs_g          REAL NOT NULL DEFAULT 0,
            verdict          TEXT NOT NULL DEFAULT '',
            suggestion       TEXT NOT NULL DEFAULT '',
            eaten_at         TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_meals_device ON meals(device_id, eaten_at);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
