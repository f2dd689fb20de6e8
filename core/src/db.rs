//! Connection manager.
//!
//! The live database is an in-memory SQLite connection. Durability comes from
//! writing the whole database image through an [`ImageStore`] after each change.

use std::cell::RefCell;
use std::path::Path;

use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, Params, Row};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::migrate::{self, MIGRATIONS};
use crate::seed;
use crate::storage::{ImageStore, MemoryImageStore};

const SCRATCH_FILE: &str = "image.sqlite";

pub struct Database<S = MemoryImageStore> {
    conn: Connection,
    store: S,
    /// Last image the store accepted. Empty when nothing is durable yet.
    durable: RefCell<Vec<u8>>,
}

fn start_engine() -> Result<Connection> {
    Connection::open_in_memory().map_err(|e| Error::initialization("could not start the engine", e))
}

fn enable_foreign_keys(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(|e| Error::initialization("could not enable foreign keys", e))
}

/// Restore a serialized image into a fresh connection and check it is intact.
fn restore(image: &[u8]) -> Result<Connection> {
    let dir = tempfile::tempdir().map_err(|e| Error::initialization("no scratch space", e))?;
    let path = dir.path().join(SCRATCH_FILE);
    std::fs::write(&path, image).map_err(|e| Error::initialization("no scratch space", e))?;

    let mut conn = start_engine()?;
    conn.restore(DatabaseName::Main, &path, None::<fn(Progress)>)
        .map_err(|e| Error::initialization("stored image is not a database", e))?;

    let check: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| Error::initialization("stored image is not a database", e))?;
    if check != "ok" {
        return Err(Error::initialization("stored image failed integrity check", check));
    }
    Ok(conn)
}

fn serialize(conn: &Connection, scratch: &Path) -> Result<Vec<u8>> {
    let path = scratch.join(SCRATCH_FILE);
    conn.backup(DatabaseName::Main, &path, None)?;
    Ok(std::fs::read(&path)?)
}

impl Database {
    /// Empty database with every migration applied and no durable backing.
    pub fn open_in_memory() -> Result<Self> {
        let conn = start_engine()?;
        enable_foreign_keys(&conn)?;
        migrate::run(&conn)?;
        let scratch = tempfile::tempdir()?;
        let image = serialize(&conn, scratch.path())?;
        Ok(Database {
            conn,
            store: MemoryImageStore::with_image(image.clone()),
            durable: RefCell::new(image),
        })
    }
}

impl<S: ImageStore> Database<S> {
    /// Load the stored image, or start empty when there is none.
    ///
    /// The stored image is never modified here, even when it cannot be read.
    pub async fn open(store: S) -> Result<Self> {
        let image = store
            .load()
            .await
            .map_err(|e| Error::initialization("could not read the stored image", e))?;

        let image = image.unwrap_or_default();
        let conn = if image.is_empty() {
            info!("no stored image, starting empty");
            start_engine()?
        } else {
            let conn = restore(&image)?;
            info!(bytes = image.len(), "restored database image");
            conn
        };
        enable_foreign_keys(&conn)?;

        Ok(Database {
            conn,
            store,
            durable: RefCell::new(image),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    pub fn query<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, f)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The whole database as bytes, in SQLite file format.
    pub fn image(&self) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        serialize(&self.conn, scratch.path())
    }

    /// Write the full image to the store.
    ///
    /// When the write fails, every change made since the last successful
    /// persist is dropped from the live database before the error is returned.
    pub async fn persist(&self) -> Result<()> {
        let saved = match self.image() {
            Ok(image) => {
                let written = self.store.save(&image).await;
                written.map(|()| image).map_err(Error::from)
            }
            Err(e) => Err(e),
        };
        match saved {
            Ok(image) => {
                debug!(bytes = image.len(), "persisted database image");
                *self.durable.borrow_mut() = image;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "persist failed, discarding unsaved changes");
                self.discard_unsaved()?;
                Err(e)
            }
        }
    }

    /// Bring every table's rows back to the last durable image.
    fn discard_unsaved(&self) -> Result<()> {
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join(SCRATCH_FILE);
        std::fs::write(&path, &*self.durable.borrow())?;

        let tables = self.query(
            "SELECT name FROM main.sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get::<_, String>(0),
        )?;

        self.conn.pragma_update(None, "foreign_keys", false)?;
        let path = path.to_string_lossy().into_owned();
        self.conn.execute("ATTACH DATABASE ?1 AS durable", [path])?;
        let copied = self.copy_durable_rows(&tables);
        let detached = self.conn.execute_batch("DETACH DATABASE durable");
        self.conn.pragma_update(None, "foreign_keys", true)?;
        copied?;
        detached?;
        Ok(())
    }

    fn copy_durable_rows(&self, tables: &[String]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for table in tables {
            tx.execute(&format!("DELETE FROM main.\"{table}\""), [])?;
            let mut stmt = tx.prepare("SELECT name FROM pragma_table_info(?1, 'durable')")?;
            let columns = stmt
                .query_map([table], |row| row.get::<_, String>(0))?
                .map(|name| name.map(|n| format!("\"{n}\"")))
                .collect::<Result<Vec<_>, _>>()?;
            if columns.is_empty() {
                continue;
            }
            let columns = columns.join(", ");
            let sql = format!(
                "INSERT INTO main.\"{table}\" ({columns}) \
                 SELECT {columns} FROM durable.\"{table}\""
            );
            tx.execute(&sql, [])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Apply pending schema steps, persisting after each one.
    pub async fn migrate(&self) -> Result<usize> {
        let pending = migrate::pending(&self.conn, MIGRATIONS)?;
        for migration in &pending {
            migrate::apply(&self.conn, migration)?;
            self.persist().await?;
        }
        if pending.is_empty() {
            debug!(version = migrate::latest_version(), "schema up to date");
        }
        Ok(pending.len())
    }

    pub async fn seed_system_foods(&self) -> Result<usize> {
        let inserted = seed::seed_system_foods(&self.conn)?;
        if inserted > 0 {
            self.persist().await?;
        }
        Ok(inserted)
    }

    /// Release the connection. Whatever was persisted stays in the store.
    pub fn close(self) -> Result<S> {
        let Database { conn, store, .. } = self;
        conn.close().map_err(|(_, e)| Error::from(e))?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodCategory, FoodRef, NewLogEntry, Portion};
    use crate::repo::{log_entry, system_food, user};
    use crate::storage::FileImageStore;
    use crate::test_support::{FailingStore, sample_user};

    #[tokio::test]
    async fn test_open_without_image_starts_empty() {
        let store = MemoryImageStore::new();
        let db = Database::open(store.clone()).await.unwrap();
        assert_eq!(migrate::current_version(db.conn()).unwrap(), 0);
        // Opening alone writes nothing
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_migrate_persists_each_step() {
        let store = MemoryImageStore::new();
        let db = Database::open(store.clone()).await.unwrap();
        let applied = db.migrate().await.unwrap();
        assert_eq!(applied, MIGRATIONS.len());
        assert!(store.snapshot().is_some());
        assert_eq!(db.migrate().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persist_and_reopen_log_entry() {
        let store = MemoryImageStore::new();
        let db = Database::open(store.clone()).await.unwrap();
        db.migrate().await.unwrap();

        let u = user::create(db.conn(), &sample_user()).unwrap();
        let food =
            crate::test_support::sample_system_food("sf-pho", "Phở bò", FoodCategory::Noodle);
        let entry = log_entry::create(
            db.conn(),
            &NewLogEntry::snapshot(&u.id, FoodRef::System(&food), Portion::M, 42),
        )
        .unwrap();
        db.persist().await.unwrap();
        db.close().unwrap();

        let reopened = Database::open(store).await.unwrap();
        let fetched = log_entry::get_by_id(reopened.conn(), &entry.id).unwrap().unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(
            migrate::current_version(reopened.conn()).unwrap(),
            migrate::latest_version()
        );
    }

    #[tokio::test]
    async fn test_failed_persist_discards_unsaved_changes() {
        let store = FailingStore::default();
        let db = Database::open(store.clone()).await.unwrap();
        db.migrate().await.unwrap();
        let u = user::create(db.conn(), &sample_user()).unwrap();
        db.persist().await.unwrap();

        let food =
            crate::test_support::sample_system_food("sf-pho", "Phở bò", FoodCategory::Noodle);
        let entry = log_entry::create(
            db.conn(),
            &NewLogEntry::snapshot(&u.id, FoodRef::System(&food), Portion::M, 42),
        )
        .unwrap();
        store.fail_next_save();
        assert!(matches!(db.persist().await, Err(Error::Storage(_))));

        // Live state is back to the stored image
        assert!(log_entry::get_by_id(db.conn(), &entry.id).unwrap().is_none());
        assert!(user::get_by_id(db.conn(), &u.id).unwrap().is_some());
        let fk: bool = db.conn().query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert!(fk);

        db.persist().await.unwrap();
        db.close().unwrap();
        let reopened = Database::open(store.inner).await.unwrap();
        assert!(log_entry::get_by_id(reopened.conn(), &entry.id).unwrap().is_none());
        assert!(user::get_by_id(reopened.conn(), &u.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(FileImageStore::new(dir.path(), "bua")).await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.seed_system_foods().await.unwrap(), 23);
        db.close().unwrap();

        let db = Database::open(FileImageStore::new(dir.path(), "bua")).await.unwrap();
        assert_eq!(system_food::count(db.conn()).unwrap(), 23);
        assert_eq!(db.seed_system_foods().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_image_fails_and_is_kept() {
        let garbage = b"definitely not sqlite, just some bytes that go on for a while".repeat(20);
        let store = MemoryImageStore::with_image(garbage.clone());
        let err = Database::open(store.clone()).await.err().unwrap();
        assert!(matches!(err, Error::Initialization { .. }));
        assert!(err.is_fatal());
        assert_eq!(store.snapshot(), Some(garbage));
    }

    #[tokio::test]
    async fn test_zero_length_image_is_empty_database() {
        let store = MemoryImageStore::with_image(Vec::new());
        let db = Database::open(store).await.unwrap();
        assert_eq!(db.migrate().await.unwrap(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let store = MemoryImageStore::new();
        let db = Database::open(store.clone()).await.unwrap();
        db.migrate().await.unwrap();
        db.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (99, 'future', 0)",
            [],
        )
        .unwrap();
        db.persist().await.unwrap();
        db.close().unwrap();

        let db = Database::open(store).await.unwrap();
        let err = db.migrate().await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchema { found: 99, .. }));
    }

    #[test]
    fn test_query_maps_rows() {
        let db = Database::open_in_memory().unwrap();
        let names: Vec<String> = db
            .query(
                "SELECT name FROM schema_migrations ORDER BY version",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(names.first().map(String::as_str), Some("initial"));
        assert_eq!(names.len(), MIGRATIONS.len());
    }
}
