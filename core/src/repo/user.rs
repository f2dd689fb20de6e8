use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{NewUser, UpdateUser, User};
use crate::time::now_ms;

use super::new_id;

const COLUMNS: &str = "id, display_name, avatar, created_at, updated_at";

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        avatar: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn create(conn: &Connection, user: &NewUser) -> Result<User> {
    let now = now_ms();
    let created = User {
        id: new_id(),
        display_name: user.display_name.clone(),
        avatar: user.avatar.clone(),
        created_at: now,
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO users (id, display_name, avatar, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            created.id,
            created.display_name,
            created.avatar,
            created.created_at,
            created.updated_at,
        ],
    )?;
    Ok(created)
}

pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            from_row,
        )
        .optional()?;
    Ok(user)
}

/// Oldest first, so the first installed identity comes first.
pub fn list(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users ORDER BY created_at, rowid"
    ))?;
    let users = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Returns `None` if the user does not exist.
pub fn update(conn: &Connection, id: &str, update: &UpdateUser) -> Result<Option<User>> {
    let now = now_ms();
    if let Some(ref name) = update.display_name {
        conn.execute(
            "UPDATE users SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now, id],
        )?;
    }
    if let Some(ref avatar) = update.avatar {
        conn.execute(
            "UPDATE users SET avatar = ?1, updated_at = ?2 WHERE id = ?3",
            params![avatar, now, id],
        )?;
    }
    get_by_id(conn, id)
}
