mod commands;
mod config;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    Service, cmd_custom_add, cmd_custom_delete, cmd_custom_list, cmd_delete_log, cmd_fav_add,
    cmd_fav_list, cmd_fav_remove, cmd_foods, cmd_history, cmd_init, cmd_log, cmd_profile_set,
    cmd_profile_show, cmd_template_add, cmd_template_create, cmd_template_delete,
    cmd_template_list, cmd_template_log, cmd_template_remove, cmd_template_show, cmd_today,
};
use crate::config::Config;
use bua_core::AppContext;
use bua_core::models::{FoodCategory, GoalType, Portion};

#[derive(Parser)]
#[command(
    name = "bua",
    version,
    about = "A local-first Vietnamese meal logger",
    long_about = "\n  bữa: log what you eat, one tap at a time.\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create your profile (first run)
    Init {
        /// Display name
        name: String,
        /// Avatar emoji
        #[arg(long, default_value = "🍜")]
        avatar: String,
        /// Daily calorie goal
        #[arg(long, default_value = "2000")]
        kcal: i64,
        /// Goal: lose, maintain, gain
        #[arg(long, default_value = "maintain")]
        goal: GoalType,
        /// Free-text note about your goal
        #[arg(long)]
        goal_text: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Browse the built-in food catalog
    Foods {
        /// Search Vietnamese or English names
        #[arg(short, long)]
        search: Option<String>,
        /// Filter by category: noodle, rice, bread, soup, snack, drink, dessert, other
        #[arg(short, long)]
        category: Option<FoodCategory>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food by ID
    Log {
        /// Catalog food ID (e.g. sf-pho-bo), or custom food ID with --custom
        food_id: String,
        /// Portion size: S, M, L
        #[arg(short, long, default_value = "M")]
        portion: Portion,
        /// The ID refers to one of your custom foods
        #[arg(long)]
        custom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's entries and totals
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent entries
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a log entry by ID
    DeleteLog {
        /// Entry ID (the short form shown in tables is enough)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage custom foods
    Custom {
        #[command(subcommand)]
        command: CustomCommands,
    },
    /// Manage favorite foods
    Fav {
        #[command(subcommand)]
        command: FavCommands,
    },
    /// Manage meal templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Delete all data and start over
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile and limits
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update your goal
    Set {
        /// Daily calorie goal
        #[arg(long)]
        kcal: Option<i64>,
        /// Goal: lose, maintain, gain
        #[arg(long)]
        goal: Option<GoalType>,
        /// Goal note (empty string clears it)
        #[arg(long)]
        goal_text: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CustomCommands {
    /// Add a custom food with absolute nutrition values
    Add {
        /// Food name
        name: String,
        /// Calories
        #[arg(long)]
        kcal: f64,
        /// Protein (g)
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Fat (g)
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Carbohydrates (g)
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fibre (g)
        #[arg(long)]
        fibre: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your custom foods
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a custom food (logged entries are kept)
    Delete {
        /// Custom food ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FavCommands {
    /// Add a food to favorites, or count another use
    Add {
        /// Food ID
        food_id: String,
        /// The ID refers to one of your custom foods
        #[arg(long)]
        custom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a food from favorites
    Remove {
        /// Food ID
        food_id: String,
        /// The ID refers to one of your custom foods
        #[arg(long)]
        custom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List favorites, most used first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Create an empty template
    Create {
        /// Template name
        name: String,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a food to a template
    Add {
        /// Template ID
        template: String,
        /// Food ID
        food_id: String,
        /// Portion size: S, M, L
        #[arg(short, long, default_value = "M")]
        portion: Portion,
        /// The food ID refers to one of your custom foods
        #[arg(long)]
        custom: bool,
        /// Mark the item as optional
        #[arg(long)]
        optional: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item from a template
    Remove {
        /// Template ID
        template: String,
        /// Item ID
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a template and its items
    Show {
        /// Template ID
        template: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List templates, most used first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a template
    Delete {
        /// Template ID
        template: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log every item of a template now
    Log {
        /// Template ID
        template: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BUA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut ctx = AppContext::new(config.image_store(), config.limits);

    if let Commands::Reset { yes, json } = cli.command {
        if !yes {
            bail!("This deletes all your data. Re-run with --yes to confirm.");
        }
        ctx.reset().await.context("Failed to reset the database")?;
        if json {
            println!("{}", serde_json::json!({ "status": "ok" }));
        } else {
            println!("All data deleted. Run `bua init` to start again.");
        }
        return Ok(());
    }

    ctx.initialise()
        .await
        .context("Failed to open the database. `bua reset --yes` starts over with an empty one")?;
    let service = ctx.service()?;
    dispatch(service, cli.command).await
}

#[allow(clippy::too_many_lines)]
async fn dispatch(service: &Service, command: Commands) -> Result<()> {
    match command {
        Commands::Init {
            name,
            avatar,
            kcal,
            goal,
            goal_text,
            json,
        } => cmd_init(service, &name, &avatar, kcal, goal, goal_text, json).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(service, json),
            ProfileCommands::Set {
                kcal,
                goal,
                goal_text,
                json,
            } => cmd_profile_set(service, kcal, goal, goal_text, json).await,
        },
        Commands::Foods {
            search,
            category,
            json,
        } => cmd_foods(service, search.as_deref(), category, json),
        Commands::Log {
            food_id,
            portion,
            custom,
            json,
        } => cmd_log(service, &food_id, portion, custom, json).await,
        Commands::Today { json } => cmd_today(service, json),
        Commands::History { limit, json } => cmd_history(service, limit, json),
        Commands::DeleteLog { id, json } => cmd_delete_log(service, &id, json).await,
        Commands::Custom { command } => match command {
            CustomCommands::Add {
                name,
                kcal,
                protein,
                fat,
                carbs,
                fibre,
                json,
            } => cmd_custom_add(service, &name, kcal, protein, fat, carbs, fibre, json).await,
            CustomCommands::List { json } => cmd_custom_list(service, json),
            CustomCommands::Delete { id, json } => cmd_custom_delete(service, &id, json).await,
        },
        Commands::Fav { command } => match command {
            FavCommands::Add {
                food_id,
                custom,
                json,
            } => cmd_fav_add(service, &food_id, custom, json).await,
            FavCommands::Remove {
                food_id,
                custom,
                json,
            } => cmd_fav_remove(service, &food_id, custom, json).await,
            FavCommands::List { json } => cmd_fav_list(service, json),
        },
        Commands::Template { command } => match command {
            TemplateCommands::Create {
                name,
                description,
                json,
            } => cmd_template_create(service, &name, description, json).await,
            TemplateCommands::Add {
                template,
                food_id,
                portion,
                custom,
                optional,
                json,
            } => {
                cmd_template_add(service, &template, &food_id, portion, custom, optional, json)
                    .await
            }
            TemplateCommands::Remove {
                template,
                item,
                json,
            } => cmd_template_remove(service, &template, &item, json).await,
            TemplateCommands::Show { template, json } => {
                cmd_template_show(service, &template, json)
            }
            TemplateCommands::List { json } => cmd_template_list(service, json),
            TemplateCommands::Delete { template, json } => {
                cmd_template_delete(service, &template, json).await
            }
            TemplateCommands::Log { template, json } => {
                cmd_template_log(service, &template, json).await
            }
        },
        Commands::Reset { .. } => bail!("Reset must run before the database is opened"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_parses_portion() {
        let cli = Cli::try_parse_from(["bua", "log", "sf-pho-bo", "--portion", "l"]).unwrap();
        match cli.command {
            Commands::Log {
                food_id, portion, ..
            } => {
                assert_eq!(food_id, "sf-pho-bo");
                assert_eq!(portion, Portion::L);
            }
            _ => panic!("expected log command"),
        }
    }

    #[test]
    fn test_bad_category_rejected() {
        assert!(Cli::try_parse_from(["bua", "foods", "--category", "pizza"]).is_err());
    }
}
