use anyhow::{Context, Result, bail};
use chrono::{Local, TimeZone};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bua_core::models::{LogEntry, Macros, SystemFood, User};
use bua_core::{BuaService, FileImageStore, Outcome};

pub(crate) type Service = BuaService<FileImageStore>;

/// The onboarded user the CLI acts for.
pub(crate) fn active_user(service: &Service) -> Result<User> {
    service
        .active_user()?
        .context("No profile yet. Run `bua init` first.")
}

/// Print an outcome. A refusal is an error in text mode and a normal object in JSON mode.
pub(crate) fn finish<T: Serialize>(
    outcome: Outcome<T>,
    json: bool,
    show: impl FnOnce(&T),
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match outcome.value {
        Some(ref value) if outcome.is_ok() => {
            show(value);
            Ok(())
        }
        _ => bail!("{}", outcome.code.message()),
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn format_time(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map_or_else(|| ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

pub(crate) fn macro_summary(m: &Macros) -> String {
    format!(
        "{:.0} kcal (P {:.1}g, F {:.1}g, C {:.1}g)",
        no_neg_zero(m.kcal),
        no_neg_zero(m.protein),
        no_neg_zero(m.fat),
        no_neg_zero(m.carbs)
    )
}

pub(crate) fn print_system_food_table(foods: &[SystemFood]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "English")]
        name_en: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "S kcal")]
        small: String,
        #[tabled(rename = "M kcal")]
        medium: String,
        #[tabled(rename = "L kcal")]
        large: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id.clone(),
            name: truncate(&f.name_vi, 25),
            name_en: truncate(&f.name_en, 25),
            category: f.category.to_string(),
            small: format!("{:.0}", f.portions.small.kcal),
            medium: format!("{:.0}", f.portions.medium.kcal),
            large: format!("{:.0}", f.portions.large.kcal),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_log_table(entries: &[LogEntry]) {
    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "Size")]
        portion: String,
        #[tabled(rename = "kcal")]
        kcal: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "C")]
        carbs: String,
    }

    let rows: Vec<LogRow> = entries
        .iter()
        .map(|e| LogRow {
            id: short_id(&e.id),
            time: format_time(e.logged_at),
            name: truncate(&e.name, 30),
            portion: e.portion.to_string(),
            kcal: format!("{:.0}", no_neg_zero(e.macros.kcal)),
            protein: format!("{:.1}", no_neg_zero(e.macros.protein)),
            fat: format!("{:.1}", no_neg_zero(e.macros.fat)),
            carbs: format!("{:.1}", no_neg_zero(e.macros.carbs)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// First block of a UUID, enough to tell rows apart on screen.
pub(crate) fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}

/// Expand a short id printed by [`short_id`] back to the full id among `candidates`.
pub(crate) fn resolve_id<'a>(
    prefix: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Result<String> {
    let matches: Vec<&str> = candidates
        .into_iter()
        .filter(|id| id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [one] => Ok((*one).to_string()),
        [] => bail!("No entry matches '{prefix}'"),
        _ => bail!("'{prefix}' is ambiguous, use more characters"),
    }
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Bánh mì thịt nướng", 10), "Bánh mì...");
        assert_eq!(truncate("Phở bò", 10), "Phở bò");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }

    #[test]
    fn test_short_id_and_resolve() {
        let id = "3f2a9c1e-0000-4000-8000-000000000000";
        assert_eq!(short_id(id), "3f2a9c1e");
        let ids = [id, "3f2b0000-0000-4000-8000-000000000000"];
        assert_eq!(resolve_id("3f2a", ids).unwrap(), id);
        assert!(resolve_id("3f2", ids).is_err());
        assert!(resolve_id("ffff", ids).is_err());
    }

    #[test]
    fn test_macro_summary() {
        let m = Macros::new(430.0, 24.0, 10.0, 60.0);
        assert_eq!(macro_summary(&m), "430 kcal (P 24.0g, F 10.0g, C 60.0g)");
    }

    #[test]
    fn test_finish_json_reports_refusal() {
        let outcome: Outcome<u32> = Outcome::rejected(bua_core::OutcomeCode::NotFound);
        assert!(finish(outcome, true, |_| {}).is_ok());
        let outcome: Outcome<u32> = Outcome::rejected(bua_core::OutcomeCode::NotFound);
        let err = finish(outcome, false, |_| {}).unwrap_err();
        assert_eq!(err.to_string(), "not found");
    }
}
