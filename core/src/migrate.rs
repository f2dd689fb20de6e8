//! Versioned schema steps.
//!
//! The applied version lives in `schema_migrations`. Each step runs in its own
//! transaction together with the row that records it, so a failing step leaves
//! the recorded version exactly where it was.

use rusqlite::{Connection, params};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::time::now_ms;

pub enum Step {
    Sql(&'static str),
    /// For changes that must inspect the live schema before acting.
    Code(fn(&Connection) -> rusqlite::Result<()>),
}

pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub step: Step,
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial",
        step: Step::Sql(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                avatar TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                daily_kcal_goal INTEGER NOT NULL CHECK (daily_kcal_goal > 0),
                goal_type TEXT NOT NULL CHECK (goal_type IN ('lose', 'maintain', 'gain')),
                goal_text TEXT,
                goal_icon TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS system_foods (
                id TEXT PRIMARY KEY,
                name_vi TEXT NOT NULL,
                name_en TEXT NOT NULL,
                category TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS system_food_portions (
                food_id TEXT NOT NULL REFERENCES system_foods(id),
                portion TEXT NOT NULL CHECK (portion IN ('S', 'M', 'L')),
                kcal REAL NOT NULL,
                protein REAL NOT NULL,
                fat REAL NOT NULL,
                carbs REAL NOT NULL,
                fibre REAL,
                sugar REAL,
                sodium REAL,
                PRIMARY KEY (food_id, portion)
            );

            CREATE TABLE IF NOT EXISTS custom_foods (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                kcal REAL NOT NULL,
                protein REAL NOT NULL,
                fat REAL NOT NULL,
                carbs REAL NOT NULL,
                fibre REAL,
                sugar REAL,
                sodium REAL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS log_entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                food_type TEXT NOT NULL CHECK (food_type IN ('system', 'custom')),
                food_id TEXT NOT NULL,
                portion TEXT NOT NULL CHECK (portion IN ('S', 'M', 'L')),
                name TEXT NOT NULL,
                kcal REAL NOT NULL,
                protein REAL NOT NULL,
                fat REAL NOT NULL,
                carbs REAL NOT NULL,
                fibre REAL,
                sugar REAL,
                sodium REAL,
                logged_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_system_foods_category ON system_foods(category);
            CREATE INDEX IF NOT EXISTS idx_custom_foods_user ON custom_foods(user_id);
            CREATE INDEX IF NOT EXISTS idx_log_entries_user_time ON log_entries(user_id, logged_at);",
        ),
    },
    Migration {
        version: 2,
        name: "favorites",
        step: Step::Sql(
            "CREATE TABLE IF NOT EXISTS favorites (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                food_type TEXT NOT NULL CHECK (food_type IN ('system', 'custom')),
                food_id TEXT NOT NULL,
                use_count INTEGER NOT NULL DEFAULT 1,
                last_used_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, food_type, food_id)
            );

            CREATE INDEX IF NOT EXISTS idx_favorites_user_usage
                ON favorites(user_id, use_count DESC, last_used_at DESC);",
        ),
    },
    Migration {
        version: 3,
        name: "meal_templates",
        step: Step::Sql(
            "CREATE TABLE IF NOT EXISTS meal_templates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                description TEXT,
                kcal REAL NOT NULL DEFAULT 0,
                protein REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                carbs REAL NOT NULL DEFAULT 0,
                fibre REAL,
                sugar REAL,
                sodium REAL,
                use_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS template_items (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL REFERENCES meal_templates(id),
                food_type TEXT NOT NULL CHECK (food_type IN ('system', 'custom')),
                food_id TEXT NOT NULL,
                portion TEXT NOT NULL CHECK (portion IN ('S', 'M', 'L')),
                name TEXT NOT NULL,
                kcal REAL NOT NULL,
                protein REAL NOT NULL,
                fat REAL NOT NULL,
                carbs REAL NOT NULL,
                fibre REAL,
                sugar REAL,
                sodium REAL,
                is_required INTEGER NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_meal_templates_user ON meal_templates(user_id);
            CREATE INDEX IF NOT EXISTS idx_template_items_template
                ON template_items(template_id, sort_order);",
        ),
    },
    Migration {
        version: 4,
        name: "template_last_used",
        step: Step::Code(add_template_last_used),
    },
];

fn add_template_last_used(conn: &Connection) -> rusqlite::Result<()> {
    if !has_column(conn, "meal_templates", "last_used_at")? {
        conn.execute_batch("ALTER TABLE meal_templates ADD COLUMN last_used_at INTEGER;")?;
    }
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[must_use]
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );",
    )
    .map_err(|e| Error::Migration {
        version: 0,
        name: "schema_migrations",
        source: e,
    })
}

pub fn current_version(conn: &Connection) -> Result<u32> {
    ensure_version_table(conn)?;
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(u32::try_from(version).unwrap_or(u32::MAX))
}

/// Steps above the recorded version, in the order they must run.
pub fn pending<'a>(conn: &Connection, steps: &'a [Migration]) -> Result<Vec<&'a Migration>> {
    for (i, m) in steps.iter().enumerate() {
        let expected = u32::try_from(i + 1).unwrap_or(u32::MAX);
        if m.version != expected {
            return Err(Error::Migration {
                version: m.version,
                name: m.name,
                source: rusqlite::Error::InvalidParameterName(format!(
                    "migration out of sequence, expected version {expected}"
                )),
            });
        }
    }

    let supported = steps.last().map_or(0, |m| m.version);
    let current = current_version(conn)?;
    if current > supported {
        return Err(Error::UnsupportedSchema {
            found: current,
            supported,
        });
    }

    Ok(steps.iter().filter(|m| m.version > current).collect())
}

/// Apply one step atomically.
pub fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let wrap = |source: rusqlite::Error| Error::Migration {
        version: migration.version,
        name: migration.name,
        source,
    };

    let tx = conn.unchecked_transaction().map_err(wrap)?;
    let result = match &migration.step {
        Step::Sql(sql) => tx.execute_batch(sql),
        Step::Code(f) => f(&tx),
    };
    result
        .and_then(|()| {
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, now_ms()],
            )
        })
        .map_err(|e| {
            error!(
                version = migration.version,
                name = migration.name,
                error = %e,
                "migration failed"
            );
            wrap(e)
        })?;
    tx.commit().map_err(wrap)?;

    info!(version = migration.version, name = migration.name, "applied migration");
    Ok(())
}

/// Bring the database up to the latest version. Returns the number of steps applied.
pub fn run(conn: &Connection) -> Result<usize> {
    run_steps(conn, MIGRATIONS)
}

pub(crate) fn run_steps(conn: &Connection, steps: &[Migration]) -> Result<usize> {
    let pending = pending(conn, steps)?;
    for migration in &pending {
        apply(conn, migration)?;
    }
    Ok(pending.len())
}
