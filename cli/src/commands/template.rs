use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bua_core::models::{FoodType, NewMealTemplate, Portion};

use super::foods::resolve_custom_id;
use super::helpers::{
    Service, active_user, finish, macro_summary, no_neg_zero, print_json, print_log_table,
    resolve_id, short_id, truncate,
};

fn resolve_template(service: &Service, user_id: &str, prefix: &str) -> Result<String> {
    let templates = service.list_templates(user_id)?;
    resolve_id(prefix, templates.iter().map(|t| t.id.as_str()))
}

pub(crate) async fn cmd_template_create(
    service: &Service,
    name: &str,
    description: Option<String>,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Name cannot be empty");
    }
    let user = active_user(service)?;
    let template = service
        .create_template(&NewMealTemplate {
            user_id: user.id,
            name: name.trim().to_string(),
            description,
        })
        .await?;

    if json {
        print_json(&template)
    } else {
        println!("Created template '{}' [{}]", template.name, short_id(&template.id));
        Ok(())
    }
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub(crate) async fn cmd_template_add(
    service: &Service,
    template: &str,
    food_id: &str,
    portion: Portion,
    custom: bool,
    optional: bool,
    json: bool,
) -> Result<()> {
    let user = active_user(service)?;
    let template_id = resolve_template(service, &user.id, template)?;
    let (food_type, food_id) = if custom {
        (FoodType::Custom, resolve_custom_id(service, &user.id, food_id)?)
    } else {
        (FoodType::System, food_id.to_string())
    };

    let outcome = service
        .add_template_item(&user.id, &template_id, food_type, &food_id, portion, !optional)
        .await?;
    finish(outcome, json, |item| {
        println!("Added {} ({}) to template", item.name, item.portion);
    })
}

pub(crate) async fn cmd_template_remove(
    service: &Service,
    template: &str,
    item: &str,
    json: bool,
) -> Result<()> {
    let user = active_user(service)?;
    let template_id = resolve_template(service, &user.id, template)?;
    let Some(detail) = service.template_detail(&user.id, &template_id)? else {
        bail!("Template not found");
    };
    let item_id = resolve_id(item, detail.items.iter().map(|i| i.id.as_str()))?;
    let outcome = service
        .remove_template_item(&user.id, &template_id, &item_id)
        .await?;
    finish(outcome, json, |_| println!("Removed item {}", short_id(&item_id)))
}

pub(crate) fn cmd_template_show(service: &Service, template: &str, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let template_id = resolve_template(service, &user.id, template)?;
    let Some(detail) = service.template_detail(&user.id, &template_id)? else {
        bail!("Template not found");
    };

    if json {
        return print_json(&detail);
    }

    println!("{} [{}]", detail.template.name, short_id(&detail.template.id));
    if let Some(ref d) = detail.template.description {
        println!("  {d}");
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "Size")]
        portion: String,
        #[tabled(rename = "kcal")]
        kcal: String,
        #[tabled(rename = "Required")]
        required: String,
    }

    let rows: Vec<ItemRow> = detail
        .items
        .iter()
        .map(|i| ItemRow {
            id: short_id(&i.id),
            name: truncate(&i.name, 30),
            portion: i.portion.to_string(),
            kcal: format!("{:.0}", no_neg_zero(i.macros.kcal)),
            required: if i.is_required { "yes" } else { "no" }.to_string(),
        })
        .collect();
    if rows.is_empty() {
        println!("  No items yet.");
    } else {
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    println!("Total: {}", macro_summary(&detail.template.totals));
    Ok(())
}

pub(crate) fn cmd_template_list(service: &Service, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let templates = service.list_templates(&user.id)?;

    if json {
        return print_json(&templates);
    }
    if templates.is_empty() {
        eprintln!("No templates. Use `bua template create` to make one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct TemplateRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal")]
        kcal: String,
        #[tabled(rename = "Uses")]
        uses: i64,
    }

    let rows: Vec<TemplateRow> = templates
        .iter()
        .map(|t| TemplateRow {
            id: short_id(&t.id),
            name: truncate(&t.name, 30),
            kcal: format!("{:.0}", no_neg_zero(t.totals.kcal)),
            uses: t.use_count,
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) async fn cmd_template_delete(
    service: &Service,
    template: &str,
    json: bool,
) -> Result<()> {
    let user = active_user(service)?;
    let template_id = resolve_template(service, &user.id, template)?;
    let outcome = service.delete_template(&user.id, &template_id).await?;
    finish(outcome, json, |_| println!("Deleted template {}", short_id(&template_id)))
}

pub(crate) async fn cmd_template_log(service: &Service, template: &str, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let template_id = resolve_template(service, &user.id, template)?;
    let outcome = service.log_template(&user.id, &template_id).await?;
    finish(outcome, json, |entries| {
        println!("Logged {} item(s):", entries.len());
        print_log_table(entries);
    })
}
