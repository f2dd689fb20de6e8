use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bua_core::models::FoodType;

use super::foods::resolve_custom_id;
use super::helpers::{Service, active_user, finish, format_time, print_json, truncate};

fn food_key(
    service: &Service,
    user_id: &str,
    id: &str,
    custom: bool,
) -> Result<(FoodType, String)> {
    if custom {
        Ok((FoodType::Custom, resolve_custom_id(service, user_id, id)?))
    } else {
        Ok((FoodType::System, id.to_string()))
    }
}

pub(crate) async fn cmd_fav_add(
    service: &Service,
    id: &str,
    custom: bool,
    json: bool,
) -> Result<()> {
    let user = active_user(service)?;
    let (food_type, food_id) = food_key(service, &user.id, id, custom)?;
    let outcome = service.add_favorite(&user.id, food_type, &food_id).await?;
    finish(outcome, json, |fav| {
        println!("Favorited {} (used {} time(s))", fav.food_id, fav.use_count);
    })
}

pub(crate) async fn cmd_fav_remove(
    service: &Service,
    id: &str,
    custom: bool,
    json: bool,
) -> Result<()> {
    let user = active_user(service)?;
    let (food_type, food_id) = food_key(service, &user.id, id, custom)?;
    let outcome = service.remove_favorite(&user.id, food_type, &food_id).await?;
    finish(outcome, json, |_| println!("Removed {food_id} from favorites"))
}

pub(crate) fn cmd_fav_list(service: &Service, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let favorites = service.favorites_by_frequency(&user.id)?;

    if json {
        return print_json(&favorites);
    }
    if favorites.is_empty() {
        eprintln!("No favorites yet. Use `bua fav add <food-id>`.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct FavRow {
        #[tabled(rename = "Food ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        food_type: String,
        #[tabled(rename = "Uses")]
        uses: i64,
        #[tabled(rename = "Last used")]
        last_used: String,
    }

    let mut rows = Vec::with_capacity(favorites.len());
    for fav in &favorites {
        let name = service
            .food(&user.id, fav.food_type, &fav.food_id)?
            .map(|f| f.as_food_ref().name().to_string())
            .unwrap_or_else(|| "(removed)".to_string());
        rows.push(FavRow {
            id: fav.food_id.clone(),
            name: truncate(&name, 30),
            food_type: fav.food_type.to_string(),
            uses: fav.use_count,
            last_used: format_time(fav.last_used_at),
        });
    }
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
