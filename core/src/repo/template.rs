use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{
    Macros, MealTemplate, NewMealTemplate, NewTemplateItem, TemplateItem, UpdateMealTemplate,
};
use crate::time::now_ms;

use super::{MACRO_COLUMNS, new_id};

// 0: id, 1: user_id, 2: name, 3: description, 4..=10: totals, 11: use_count,
// 12: last_used_at, 13: created_at, 14: updated_at, 15: deleted_at
fn template_sql(filter: &str) -> String {
    format!(
        "SELECT id, user_id, name, description, {MACRO_COLUMNS}, use_count, last_used_at,
                created_at, updated_at, deleted_at
         FROM meal_templates {filter}"
    )
}

fn template_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealTemplate> {
    Ok(MealTemplate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        totals: Macros::from_row(row, 4)?,
        use_count: row.get(11)?,
        last_used_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        deleted_at: row.get(15)?,
    })
}

// 0: id, 1: template_id, 2: food_type, 3: food_id, 4: portion, 5: name,
// 6..=12: macros, 13: is_required, 14: sort_order, 15: created_at
fn item_sql(filter: &str) -> String {
    format!(
        "SELECT id, template_id, food_type, food_id, portion, name, {MACRO_COLUMNS},
                is_required, sort_order, created_at
         FROM template_items {filter}"
    )
}

fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<TemplateItem> {
    Ok(TemplateItem {
        id: row.get(0)?,
        template_id: row.get(1)?,
        food_type: row.get(2)?,
        food_id: row.get(3)?,
        portion: row.get(4)?,
        name: row.get(5)?,
        macros: Macros::from_row(row, 6)?,
        is_required: row.get(13)?,
        sort_order: row.get(14)?,
        created_at: row.get(15)?,
    })
}

// --- Templates ---

pub fn create(conn: &Connection, template: &NewMealTemplate) -> Result<MealTemplate> {
    let id = new_id();
    let now = now_ms();
    conn.execute(
        "INSERT INTO meal_templates (id, user_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, template.user_id, template.name, template.description, now, now],
    )?;
    Ok(MealTemplate {
        id,
        user_id: template.user_id.clone(),
        name: template.name.clone(),
        description: template.description.clone(),
        totals: Macros::default(),
        use_count: 0,
        last_used_at: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Soft-deleted templates are still returned; check `deleted_at`.
pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<MealTemplate>> {
    let template = conn
        .query_row(&template_sql("WHERE id = ?1"), params![id], template_from_row)
        .optional()?;
    Ok(template)
}

/// Live templates, most used first.
pub fn list_by_user(conn: &Connection, user_id: &str) -> Result<Vec<MealTemplate>> {
    let mut stmt = conn.prepare(&template_sql(
        "WHERE user_id = ?1 AND deleted_at IS NULL
         ORDER BY use_count DESC, updated_at DESC, rowid",
    ))?;
    let templates = stmt
        .query_map(params![user_id], template_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(templates)
}

pub fn update(
    conn: &Connection,
    id: &str,
    update: &UpdateMealTemplate,
) -> Result<Option<MealTemplate>> {
    let now = now_ms();
    if let Some(ref name) = update.name {
        conn.execute(
            "UPDATE meal_templates SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now, id],
        )?;
    }
    if let Some(ref description) = update.description {
        conn.execute(
            "UPDATE meal_templates SET description = ?1, updated_at = ?2 WHERE id = ?3",
            params![description, now, id],
        )?;
    }
    get_by_id(conn, id)
}

pub fn soft_delete(conn: &Connection, id: &str) -> Result<bool> {
    let now = now_ms();
    let rows = conn.execute(
        "UPDATE meal_templates SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        params![now, id],
    )?;
    Ok(rows > 0)
}

pub fn set_totals(conn: &Connection, id: &str, totals: &Macros) -> Result<()> {
    conn.execute(
        "UPDATE meal_templates
         SET kcal = ?1, protein = ?2, fat = ?3, carbs = ?4, fibre = ?5, sugar = ?6, sodium = ?7,
             updated_at = ?8
         WHERE id = ?9",
        params![
            totals.kcal,
            totals.protein,
            totals.fat,
            totals.carbs,
            totals.fibre,
            totals.sugar,
            totals.sodium,
            now_ms(),
            id,
        ],
    )?;
    Ok(())
}

pub fn mark_used(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE meal_templates SET use_count = use_count + 1, last_used_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

// --- Items ---

pub fn next_sort_order(conn: &Connection, template_id: &str) -> Result<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM template_items WHERE template_id = ?1",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Appends after the current last item.
pub fn add_item(conn: &Connection, item: &NewTemplateItem) -> Result<TemplateItem> {
    let id = new_id();
    let now = now_ms();
    let sort_order = next_sort_order(conn, &item.template_id)?;
    let m = &item.macros;
    conn.execute(
        &format!(
            "INSERT INTO template_items (id, template_id, food_type, food_id, portion, name, {MACRO_COLUMNS},
                                         is_required, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            id,
            item.template_id,
            item.food_type,
            item.food_id,
            item.portion,
            item.name,
            m.kcal,
            m.protein,
            m.fat,
            m.carbs,
            m.fibre,
            m.sugar,
            m.sodium,
            item.is_required,
            sort_order,
            now,
        ],
    )?;
    Ok(TemplateItem {
        id,
        template_id: item.template_id.clone(),
        food_type: item.food_type,
        food_id: item.food_id.clone(),
        portion: item.portion,
        name: item.name.clone(),
        macros: item.macros,
        is_required: item.is_required,
        sort_order,
        created_at: now,
    })
}

pub fn list_items(conn: &Connection, template_id: &str) -> Result<Vec<TemplateItem>> {
    let mut stmt = conn.prepare(&item_sql("WHERE template_id = ?1 ORDER BY sort_order, rowid"))?;
    let items = stmt
        .query_map(params![template_id], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn count_items(conn: &Connection, template_id: &str) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM template_items WHERE template_id = ?1",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn remove_item(conn: &Connection, template_id: &str, item_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM template_items WHERE id = ?1 AND template_id = ?2",
        params![item_id, template_id],
    )?;
    Ok(rows > 0)
}
