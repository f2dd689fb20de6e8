//! Reference catalog. Rows are only ever inserted by the seed loader and
//! deactivated, never updated in place or deleted.

use std::collections::HashMap;

use rusqlite::{Connection, params};

use crate::error::Result;
use crate::models::{FoodCategory, Macros, Portion, PortionMacros, SystemFood};

use super::{MACRO_COLUMNS, contains_pattern};

// 0: id, 1: name_vi, 2: name_en, 3: category, 4: confidence, 5: is_active, 6: created_at
const FOOD_COLUMNS: &str = "id, name_vi, name_en, category, confidence, is_active, created_at";

struct FoodRow {
    id: String,
    name_vi: String,
    name_en: String,
    category: FoodCategory,
    confidence: f64,
    is_active: bool,
    created_at: i64,
}

fn food_row(row: &rusqlite::Row) -> rusqlite::Result<FoodRow> {
    Ok(FoodRow {
        id: row.get(0)?,
        name_vi: row.get(1)?,
        name_en: row.get(2)?,
        category: row.get(3)?,
        confidence: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Attach the S/M/L values to each food row. Foods missing a portion row are skipped.
fn with_portions(conn: &Connection, rows: Vec<FoodRow>) -> Result<Vec<SystemFood>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut portions: HashMap<String, HashMap<Portion, Macros>> = HashMap::new();
    {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT food_id, portion, {MACRO_COLUMNS} FROM system_food_portions WHERE food_id = ?1"
        ))?;
        for r in &rows {
            let found = stmt
                .query_map(params![r.id], |row| {
                    Ok((
                        row.get::<_, Portion>(1)?,
                        Macros::from_row(row, 2)?,
                    ))
                })?
                .collect::<Result<HashMap<_, _>, _>>()?;
            portions.insert(r.id.clone(), found);
        }
    }

    let foods = rows
        .into_iter()
        .filter_map(|r| {
            let mut p = portions.remove(&r.id)?;
            Some(SystemFood {
                portions: PortionMacros {
                    small: p.remove(&Portion::S)?,
                    medium: p.remove(&Portion::M)?,
                    large: p.remove(&Portion::L)?,
                },
                id: r.id,
                name_vi: r.name_vi,
                name_en: r.name_en,
                category: r.category,
                confidence: r.confidence,
                is_active: r.is_active,
                created_at: r.created_at,
            })
        })
        .collect();
    Ok(foods)
}

fn insert_portion(conn: &Connection, food_id: &str, portion: Portion, m: &Macros) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO system_food_portions (food_id, portion, {MACRO_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            food_id, portion, m.kcal, m.protein, m.fat, m.carbs, m.fibre, m.sugar, m.sodium,
        ],
    )?;
    Ok(())
}

/// Seed-only insert of a catalog entry and its three portions.
pub(crate) fn insert(conn: &Connection, food: &SystemFood) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO system_foods ({FOOD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            food.id,
            food.name_vi,
            food.name_en,
            food.category,
            food.confidence,
            food.is_active,
            food.created_at,
        ],
    )?;
    for portion in Portion::ALL {
        insert_portion(conn, &food.id, *portion, food.portions.get(*portion))?;
    }
    Ok(())
}

pub fn count(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM system_foods", [], |row| row.get(0))?;
    Ok(n)
}

/// Inactive foods are still returned so historical references resolve.
pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<SystemFood>> {
    let mut stmt = conn.prepare(&format!("SELECT {FOOD_COLUMNS} FROM system_foods WHERE id = ?1"))?;
    let rows = stmt
        .query_map(params![id], food_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(with_portions(conn, rows)?.into_iter().next())
}

pub fn list_active(conn: &Connection, category: Option<FoodCategory>) -> Result<Vec<SystemFood>> {
    let rows = if let Some(category) = category {
        let mut stmt = conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM system_foods
             WHERE is_active = 1 AND category = ?1
             ORDER BY name_vi, id"
        ))?;
        stmt.query_map(params![category], food_row)?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        let mut stmt = conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM system_foods
             WHERE is_active = 1
             ORDER BY category, name_vi, id"
        ))?;
        stmt.query_map([], food_row)?
            .collect::<Result<Vec<_>, _>>()?
    };
    with_portions(conn, rows)
}

/// Case-insensitive substring match on either name, active foods only.
pub fn search(conn: &Connection, query: &str) -> Result<Vec<SystemFood>> {
    let pattern = contains_pattern(query);
    let mut stmt = conn.prepare(&format!(
        "SELECT {FOOD_COLUMNS} FROM system_foods
         WHERE is_active = 1
           AND (name_vi LIKE ?1 ESCAPE '\\' OR name_en LIKE ?1 ESCAPE '\\')
         ORDER BY name_vi, id
         LIMIT 20"
    ))?;
    let rows = stmt
        .query_map(params![pattern], food_row)?
        .collect::<Result<Vec<_>, _>>()?;
    with_portions(conn, rows)
}

/// Returns false if no food has that id.
pub fn set_active(conn: &Connection, id: &str, active: bool) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE system_foods SET is_active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    Ok(rows > 0)
}
