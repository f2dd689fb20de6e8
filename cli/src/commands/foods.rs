use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bua_core::models::{FoodCategory, Macros, NewCustomFood};

use super::helpers::{
    Service, active_user, finish, macro_summary, no_neg_zero, print_json, print_system_food_table,
    resolve_id, short_id, truncate,
};

pub(crate) fn cmd_foods(
    service: &Service,
    search: Option<&str>,
    category: Option<FoodCategory>,
    json: bool,
) -> Result<()> {
    let mut foods = match search {
        Some(q) => service.search_system_foods(q)?,
        None => service.system_foods(category)?,
    };
    if let (Some(_), Some(category)) = (search, category) {
        foods.retain(|f| f.category == category);
    }

    if json {
        print_json(&foods)
    } else if foods.is_empty() {
        eprintln!("No foods found.");
        Ok(())
    } else {
        print_system_food_table(&foods);
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_custom_add(
    service: &Service,
    name: &str,
    kcal: f64,
    protein: f64,
    fat: f64,
    carbs: f64,
    fibre: Option<f64>,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Name cannot be empty");
    }
    if [kcal, protein, fat, carbs].iter().any(|v| *v < 0.0) {
        bail!("Nutrition values cannot be negative");
    }

    let user = active_user(service)?;
    let food = service
        .create_custom_food(&NewCustomFood {
            user_id: user.id,
            name: name.trim().to_string(),
            macros: Macros {
                fibre,
                ..Macros::new(kcal, protein, fat, carbs)
            },
        })
        .await?;

    if json {
        print_json(&food)
    } else {
        println!(
            "Added custom food {} [{}]: {}",
            food.name,
            short_id(&food.id),
            macro_summary(&food.macros)
        );
        Ok(())
    }
}

pub(crate) fn cmd_custom_list(service: &Service, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let foods = service.custom_foods(&user.id)?;

    if json {
        return print_json(&foods);
    }
    if foods.is_empty() {
        eprintln!("No custom foods. Use `bua custom add` to create one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct CustomRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal")]
        kcal: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "C")]
        carbs: String,
    }

    let rows: Vec<CustomRow> = foods
        .iter()
        .map(|f| CustomRow {
            id: short_id(&f.id),
            name: truncate(&f.name, 30),
            kcal: format!("{:.0}", no_neg_zero(f.macros.kcal)),
            protein: format!("{:.1}", no_neg_zero(f.macros.protein)),
            fat: format!("{:.1}", no_neg_zero(f.macros.fat)),
            carbs: format!("{:.1}", no_neg_zero(f.macros.carbs)),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

/// Full id of one of the user's custom foods from a printed short id.
pub(crate) fn resolve_custom_id(service: &Service, user_id: &str, prefix: &str) -> Result<String> {
    let foods = service.custom_foods(user_id)?;
    resolve_id(prefix, foods.iter().map(|f| f.id.as_str()))
}

pub(crate) async fn cmd_custom_delete(service: &Service, id: &str, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let id = resolve_custom_id(service, &user.id, id)?;
    let outcome = service.delete_custom_food(&user.id, &id).await?;
    finish(outcome, json, |_| println!("Deleted custom food {}", short_id(&id)))
}
