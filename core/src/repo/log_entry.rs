use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{LogEntry, Macros, NewLogEntry};
use crate::time::now_ms;

use super::{MACRO_COLUMNS, new_id};

// 0: id, 1: user_id, 2: food_type, 3: food_id, 4: portion, 5: name,
// 6..=12: macros, 13: logged_at, 14: created_at
fn select_sql(filter: &str) -> String {
    format!(
        "SELECT id, user_id, food_type, food_id, portion, name, {MACRO_COLUMNS}, logged_at, created_at
         FROM log_entries {filter}"
    )
}

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        food_type: row.get(2)?,
        food_id: row.get(3)?,
        portion: row.get(4)?,
        name: row.get(5)?,
        macros: Macros::from_row(row, 6)?,
        logged_at: row.get(13)?,
        created_at: row.get(14)?,
    })
}

/// Insert a log with its snapshot. There is deliberately no update: snapshots are immutable.
pub fn create(conn: &Connection, entry: &NewLogEntry) -> Result<LogEntry> {
    let id = new_id();
    let now = now_ms();
    let m = &entry.macros;
    conn.execute(
        &format!(
            "INSERT INTO log_entries (id, user_id, food_type, food_id, portion, name, {MACRO_COLUMNS}, logged_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            id,
            entry.user_id,
            entry.food_type,
            entry.food_id,
            entry.portion,
            entry.name,
            m.kcal,
            m.protein,
            m.fat,
            m.carbs,
            m.fibre,
            m.sugar,
            m.sodium,
            entry.logged_at,
            now,
        ],
    )?;
    Ok(LogEntry {
        id,
        user_id: entry.user_id.clone(),
        food_type: entry.food_type,
        food_id: entry.food_id.clone(),
        portion: entry.portion,
        name: entry.name.clone(),
        macros: entry.macros,
        logged_at: entry.logged_at,
        created_at: now,
    })
}

pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<LogEntry>> {
    let entry = conn
        .query_row(&select_sql("WHERE id = ?1"), params![id], from_row)
        .optional()?;
    Ok(entry)
}

/// Newest first.
pub fn list_by_user(conn: &Connection, user_id: &str, limit: i64) -> Result<Vec<LogEntry>> {
    let mut stmt = conn.prepare(&select_sql(
        "WHERE user_id = ?1 ORDER BY logged_at DESC, rowid DESC LIMIT ?2",
    ))?;
    let entries = stmt
        .query_map(params![user_id, limit], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Entries with `start <= logged_at < end`, newest first.
pub fn list_between(
    conn: &Connection,
    user_id: &str,
    start: i64,
    end: i64,
) -> Result<Vec<LogEntry>> {
    let mut stmt = conn.prepare(&select_sql(
        "WHERE user_id = ?1 AND logged_at >= ?2 AND logged_at < ?3
         ORDER BY logged_at DESC, rowid DESC",
    ))?;
    let entries = stmt
        .query_map(params![user_id, start, end], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn count_between(conn: &Connection, user_id: &str, start: i64, end: i64) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM log_entries WHERE user_id = ?1 AND logged_at >= ?2 AND logged_at < ?3",
        params![user_id, start, end],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM log_entries WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
