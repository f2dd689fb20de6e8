use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bua_core::models::{FoodType, Portion};
use bua_core::time::now_ms;

use super::foods::resolve_custom_id;
use super::helpers::{
    Service, active_user, finish, macro_summary, print_json, print_log_table, resolve_id, short_id,
};

pub(crate) async fn cmd_log(
    service: &Service,
    food_id: &str,
    portion: Portion,
    custom: bool,
    json: bool,
) -> Result<()> {
    let user = active_user(service)?;
    let (food_type, food_id) = if custom {
        (FoodType::Custom, resolve_custom_id(service, &user.id, food_id)?)
    } else {
        (FoodType::System, food_id.to_string())
    };

    let outcome = service
        .log_food_by_id(&user.id, food_type, &food_id, portion)
        .await?;
    let remaining = service.remaining_logs(&user.id, now_ms())?;
    finish(outcome, json, |entry| {
        println!(
            "Logged {} ({}): {}",
            entry.name,
            entry.portion,
            macro_summary(&entry.macros)
        );
        println!("{remaining} log(s) left today.");
    })
}

pub(crate) fn cmd_today(service: &Service, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let now = now_ms();
    let entries = service.logs_for_day(&user.id, now)?;
    let totals = service.day_totals(&user.id, now)?;

    if json {
        return print_json(&serde_json::json!({ "totals": totals, "entries": entries }));
    }

    println!("{}", totals.date);
    if entries.is_empty() {
        println!("Nothing logged yet.");
    } else {
        print_log_table(&entries);
    }
    println!("Total: {}", macro_summary(&totals.totals));
    if let (Some(goal), Some(left)) = (totals.kcal_goal, totals.kcal_remaining) {
        println!("Goal: {goal} kcal, {left:.0} kcal remaining");
    }
    let remaining = service.remaining_logs(&user.id, now)?;
    println!("{remaining} of {} log(s) left today.", service.limits().daily_log_cap);
    Ok(())
}

pub(crate) fn cmd_history(service: &Service, limit: u32, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let entries = service.recent_logs(&user.id, i64::from(limit))?;

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        eprintln!("No entries yet. Use `bua log` to record a meal.");
        return Ok(());
    }

    print_log_table(&entries);

    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        count: i64,
        #[tabled(rename = "kcal")]
        kcal: String,
    }

    let mut days: Vec<DayRow> = Vec::new();
    for entry in &entries {
        let totals = service.day_totals(&user.id, entry.logged_at)?;
        if days.last().is_none_or(|d| d.date != totals.date) {
            days.push(DayRow {
                date: totals.date,
                count: totals.entry_count,
                kcal: format!("{:.0}", totals.totals.kcal),
            });
        }
    }
    let table = Table::new(&days)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) async fn cmd_delete_log(service: &Service, id: &str, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let recent = service.recent_logs(&user.id, 500)?;
    let id = resolve_id(id, recent.iter().map(|e| e.id.as_str()))?;
    let outcome = service.delete_log(&user.id, &id).await?;
    finish(outcome, json, |_| println!("Deleted entry {}", short_id(&id)))
}
