use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{CustomFood, Macros, NewCustomFood, UpdateCustomFood};
use crate::time::now_ms;

use super::{MACRO_COLUMNS, new_id};

// 0: id, 1: user_id, 2: name, 3..=9: macros, 10: created_at, 11: updated_at, 12: deleted_at
fn select_sql(filter: &str) -> String {
    format!(
        "SELECT id, user_id, name, {MACRO_COLUMNS}, created_at, updated_at, deleted_at
         FROM custom_foods {filter}"
    )
}

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<CustomFood> {
    Ok(CustomFood {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        macros: Macros::from_row(row, 3)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        deleted_at: row.get(12)?,
    })
}

pub fn create(conn: &Connection, food: &NewCustomFood) -> Result<CustomFood> {
    let now = now_ms();
    let id = new_id();
    let m = &food.macros;
    conn.execute(
        &format!(
            "INSERT INTO custom_foods (id, user_id, name, {MACRO_COLUMNS}, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            id,
            food.user_id,
            food.name,
            m.kcal,
            m.protein,
            m.fat,
            m.carbs,
            m.fibre,
            m.sugar,
            m.sodium,
            now,
            now,
        ],
    )?;
    Ok(CustomFood {
        id,
        user_id: food.user_id.clone(),
        name: food.name.clone(),
        macros: food.macros,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Soft-deleted foods are still returned; callers check [`CustomFood::is_deleted`].
pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<CustomFood>> {
    let food = conn
        .query_row(&select_sql("WHERE id = ?1"), params![id], from_row)
        .optional()?;
    Ok(food)
}

pub fn list_by_user(conn: &Connection, user_id: &str) -> Result<Vec<CustomFood>> {
    let mut stmt = conn.prepare(&select_sql(
        "WHERE user_id = ?1 AND deleted_at IS NULL ORDER BY name, created_at",
    ))?;
    let foods = stmt
        .query_map(params![user_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(foods)
}

/// Existing log snapshots are untouched by an update.
pub fn update(
    conn: &Connection,
    id: &str,
    update: &UpdateCustomFood,
) -> Result<Option<CustomFood>> {
    let now = now_ms();
    if let Some(ref name) = update.name {
        conn.execute(
            "UPDATE custom_foods SET name = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
            params![name, now, id],
        )?;
    }
    if let Some(m) = update.macros {
        conn.execute(
            "UPDATE custom_foods
             SET kcal = ?1, protein = ?2, fat = ?3, carbs = ?4, fibre = ?5, sugar = ?6, sodium = ?7,
                 updated_at = ?8
             WHERE id = ?9 AND deleted_at IS NULL",
            params![
                m.kcal, m.protein, m.fat, m.carbs, m.fibre, m.sugar, m.sodium, now, id,
            ],
        )?;
    }
    get_by_id(conn, id)
}

/// Returns false if the food is missing or already deleted.
pub fn soft_delete(conn: &Connection, id: &str) -> Result<bool> {
    let now = now_ms();
    let rows = conn.execute(
        "UPDATE custom_foods SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        params![now, id],
    )?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repo::user;
    use crate::test_support::{sample_custom_food, sample_user};

    #[test]
    fn test_create_and_get_custom_food() {
        let db = Database::open_in_memory().unwrap();
        let u = user::create(db.conn(), &sample_user()).unwrap();
        let food = create(db.conn(), &sample_custom_food(&u.id)).unwrap();

        let fetched = get_by_id(db.conn(), &food.id).unwrap().unwrap();
        assert_eq!(fetched, food);
        assert_eq!(fetched.macros.fibre, Some(1.5));
    }

    #[test]
    fn test_soft_delete_hides_from_list_but_keeps_row() {
        let db = Database::open_in_memory().unwrap();
        let u = user::create(db.conn(), &sample_user()).unwrap();
        let food = create(db.conn(), &sample_custom_food(&u.id)).unwrap();

        assert!(soft_delete(db.conn(), &food.id).unwrap());
        assert!(!soft_delete(db.conn(), &food.id).unwrap());

        assert!(list_by_user(db.conn(), &u.id).unwrap().is_empty());
        let kept = get_by_id(db.conn(), &food.id).unwrap().unwrap();
        assert!(kept.is_deleted());
    }

    #[test]
    fn test_update_custom_food() {
        let db = Database::open_in_memory().unwrap();
        let u = user::create(db.conn(), &sample_user()).unwrap();
        let food = create(db.conn(), &sample_custom_food(&u.id)).unwrap();

        let updated = update(
            db.conn(),
            &food.id,
            &UpdateCustomFood {
                name: Some("Bánh bao trứng muối".to_string()),
                macros: Some(Macros::new(350.0, 12.0, 11.0, 50.0)),
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.name, "Bánh bao trứng muối");
        assert!((updated.macros.kcal - 350.0).abs() < f64::EPSILON);
        assert_eq!(updated.macros.fibre, None);
    }

    #[test]
    fn test_list_only_own_foods() {
        let db = Database::open_in_memory().unwrap();
        let a = user::create(db.conn(), &sample_user()).unwrap();
        let b = user::create(db.conn(), &sample_user()).unwrap();
        create(db.conn(), &sample_custom_food(&a.id)).unwrap();
        assert_eq!(list_by_user(db.conn(), &a.id).unwrap().len(), 1);
        assert!(list_by_user(db.conn(), &b.id).unwrap().is_empty());
    }
}
