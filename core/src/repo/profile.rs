use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{NewProfile, Profile, UpdateProfile};
use crate::time::now_ms;

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: row.get(0)?,
        daily_kcal_goal: row.get(1)?,
        goal_type: row.get(2)?,
        goal_text: row.get(3)?,
        goal_icon: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// One profile per user; a second create for the same user is a constraint violation.
pub fn create(conn: &Connection, user_id: &str, profile: &NewProfile) -> Result<Profile> {
    let now = now_ms();
    conn.execute(
        "INSERT INTO profiles (user_id, daily_kcal_goal, goal_type, goal_text, goal_icon, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            profile.daily_kcal_goal,
            profile.goal_type,
            profile.goal_text,
            profile.goal_icon,
            now,
            now,
        ],
    )?;
    Ok(Profile {
        user_id: user_id.to_string(),
        daily_kcal_goal: profile.daily_kcal_goal,
        goal_type: profile.goal_type,
        goal_text: profile.goal_text.clone(),
        goal_icon: profile.goal_icon.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_by_user(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    let profile = conn
        .query_row(
            "SELECT user_id, daily_kcal_goal, goal_type, goal_text, goal_icon, created_at, updated_at
             FROM profiles WHERE user_id = ?1",
            params![user_id],
            from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn update(conn: &Connection, user_id: &str, update: &UpdateProfile) -> Result<Option<Profile>> {
    let now = now_ms();
    if let Some(goal) = update.daily_kcal_goal {
        conn.execute(
            "UPDATE profiles SET daily_kcal_goal = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![goal, now, user_id],
        )?;
    }
    if let Some(goal_type) = update.goal_type {
        conn.execute(
            "UPDATE profiles SET goal_type = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![goal_type, now, user_id],
        )?;
    }
    if let Some(ref goal_text) = update.goal_text {
        conn.execute(
            "UPDATE profiles SET goal_text = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![goal_text, now, user_id],
        )?;
    }
    if let Some(ref goal_icon) = update.goal_icon {
        conn.execute(
            "UPDATE profiles SET goal_icon = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![goal_icon, now, user_id],
        )?;
    }
    get_by_user(conn, user_id)
}
