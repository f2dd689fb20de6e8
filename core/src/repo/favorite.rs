use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{Favorite, FoodType};

use super::new_id;

const COLUMNS: &str = "id, user_id, food_type, food_id, use_count, last_used_at, created_at";

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        id: row.get(0)?,
        user_id: row.get(1)?,
        food_type: row.get(2)?,
        food_id: row.get(3)?,
        use_count: row.get(4)?,
        last_used_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Favorite>> {
    let fav = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM favorites WHERE id = ?1"),
            params![id],
            from_row,
        )
        .optional()?;
    Ok(fav)
}

pub fn find(
    conn: &Connection,
    user_id: &str,
    food_type: FoodType,
    food_id: &str,
) -> Result<Option<Favorite>> {
    let fav = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM favorites WHERE user_id = ?1 AND food_type = ?2 AND food_id = ?3"
            ),
            params![user_id, food_type, food_id],
            from_row,
        )
        .optional()?;
    Ok(fav)
}

/// Fails with a constraint violation if the (user, food) pair already exists.
pub fn create(
    conn: &Connection,
    user_id: &str,
    food_type: FoodType,
    food_id: &str,
    now: i64,
) -> Result<Favorite> {
    let fav = Favorite {
        id: new_id(),
        user_id: user_id.to_string(),
        food_type,
        food_id: food_id.to_string(),
        use_count: 1,
        last_used_at: now,
        created_at: now,
    };
    conn.execute(
        &format!("INSERT INTO favorites ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            fav.id,
            fav.user_id,
            fav.food_type,
            fav.food_id,
            fav.use_count,
            fav.last_used_at,
            fav.created_at,
        ],
    )?;
    Ok(fav)
}

/// Bump usage and last-used time. Returns the updated row, or `None` if it is gone.
pub fn touch(conn: &Connection, id: &str, now: i64) -> Result<Option<Favorite>> {
    conn.execute(
        "UPDATE favorites SET use_count = use_count + 1, last_used_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    get_by_id(conn, id)
}

pub fn delete(
    conn: &Connection,
    user_id: &str,
    food_type: FoodType,
    food_id: &str,
) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM favorites WHERE user_id = ?1 AND food_type = ?2 AND food_id = ?3",
        params![user_id, food_type, food_id],
    )?;
    Ok(rows > 0)
}

pub fn count_by_user(conn: &Connection, user_id: &str) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM favorites WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Most used first, ties broken by most recently used.
pub fn list_by_frequency(conn: &Connection, user_id: &str) -> Result<Vec<Favorite>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM favorites
         WHERE user_id = ?1
         ORDER BY use_count DESC, last_used_at DESC, rowid"
    ))?;
    let favs = stmt
        .query_map(params![user_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(favs)
}
