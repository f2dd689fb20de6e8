//! Reference food catalog bundled with the binary.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{FoodCategory, Macros, Portion, PortionMacros, SystemFood};
use crate::repo::system_food;
use crate::time::now_ms;

const CATALOG_CSV: &str = include_str!("../data/system_foods.csv");

/// One (food, portion) row of the catalog file.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: String,
    name_vi: String,
    name_en: String,
    category: FoodCategory,
    confidence: f64,
    portion: Portion,
    kcal: f64,
    protein: f64,
    fat: f64,
    carbs: f64,
    fibre: Option<f64>,
    sugar: Option<f64>,
    sodium: Option<f64>,
}

struct PendingFood {
    id: String,
    name_vi: String,
    name_en: String,
    category: FoodCategory,
    confidence: f64,
    portions: HashMap<Portion, Macros>,
}

impl PendingFood {
    fn finish(mut self, created_at: i64) -> Result<SystemFood> {
        let mut take = |portion: Portion| {
            self.portions.remove(&portion).ok_or_else(|| {
                Error::Catalog(format!("food '{}' has no {portion} portion", self.id))
            })
        };
        let portions = PortionMacros {
            small: take(Portion::S)?,
            medium: take(Portion::M)?,
            large: take(Portion::L)?,
        };
        Ok(SystemFood {
            id: self.id,
            name_vi: self.name_vi,
            name_en: self.name_en,
            category: self.category,
            portions,
            confidence: self.confidence,
            is_active: true,
            created_at,
        })
    }
}

/// Parse catalog text into foods, in file order. Each food needs exactly one S, M and L row.
pub fn parse_catalog(text: &str, created_at: i64) -> Result<Vec<SystemFood>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut order: Vec<PendingFood> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in rdr.deserialize() {
        let row: CatalogRow = record?;
        let macros = Macros {
            kcal: row.kcal,
            protein: row.protein,
            fat: row.fat,
            carbs: row.carbs,
            fibre: row.fibre,
            sugar: row.sugar,
            sodium: row.sodium,
        };

        let i = *index.entry(row.id.clone()).or_insert_with(|| {
            order.push(PendingFood {
                id: row.id.clone(),
                name_vi: row.name_vi.clone(),
                name_en: row.name_en.clone(),
                category: row.category,
                confidence: row.confidence,
                portions: HashMap::new(),
            });
            order.len() - 1
        });
        if order[i].portions.insert(row.portion, macros).is_some() {
            return Err(Error::Catalog(format!(
                "food '{}' lists portion {} twice",
                row.id, row.portion
            )));
        }
    }

    order.into_iter().map(|f| f.finish(created_at)).collect()
}

/// The bundled catalog.
pub fn catalog() -> Result<Vec<SystemFood>> {
    parse_catalog(CATALOG_CSV, now_ms())
}

/// Insert the bundled catalog if the table is empty. Returns the number of foods inserted.
///
/// All rows go in one transaction, so an interrupted seed leaves the table empty
/// and the next boot seeds again.
pub fn seed_system_foods(conn: &Connection) -> Result<usize> {
    let existing = system_food::count(conn)?;
    if existing > 0 {
        info!(existing, "system foods already seeded");
        return Ok(0);
    }

    let foods = catalog()?;
    let tx = conn.unchecked_transaction()?;
    for food in &foods {
        system_food::insert(&tx, food)?;
    }
    tx.commit()?;

    info!(count = foods.len(), "seeded system foods");
    Ok(foods.len())
}
