use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::time::now_ms;

pub const ACTIVE_USER_ID: &str = "active_user_id";

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now_ms()],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
    Ok(rows > 0)
}
