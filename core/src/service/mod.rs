//! Domain rules layered over the repositories.
//!
//! [`BuaService`] owns the database. Every method that changes data persists the
//! image before returning. Refusals by a business rule come back as an
//! [`Outcome`]; only infrastructure failures are errors.

mod favorites;
mod outcome;
mod quick_add;
mod templates;

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::info;

pub use outcome::{Outcome, OutcomeCode, Status};

use crate::config::Limits;
use crate::db::Database;
use crate::error::Result;
use crate::favorites_version::{FavoritesVersion, VersionedCache};
use crate::models::{
    CustomFood, Favorite, FoodCategory, FoodRef, FoodType, NewCustomFood, NewProfile, NewUser,
    Profile, SystemFood, UpdateCustomFood, UpdateProfile, User,
};
use crate::repo::{custom_food, profile, settings, system_food, user};
use crate::storage::{ImageStore, MemoryImageStore};

/// A food loaded by type and id.
#[derive(Debug, Clone)]
pub enum Food {
    System(SystemFood),
    Custom(CustomFood),
}

impl Food {
    #[must_use]
    pub fn as_food_ref(&self) -> FoodRef<'_> {
        match self {
            Food::System(f) => FoodRef::System(f),
            Food::Custom(f) => FoodRef::Custom(f),
        }
    }
}

pub struct BuaService<S = MemoryImageStore> {
    db: Database<S>,
    limits: Limits,
    favorites_version: FavoritesVersion,
    favorites_cache: RefCell<HashMap<String, VersionedCache<Vec<Favorite>>>>,
}

impl BuaService {
    /// Service over a migrated in-memory database with no durable backing.
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, Limits::default()))
    }
}

impl<S: ImageStore> BuaService<S> {
    pub fn new(db: Database<S>, limits: Limits) -> Self {
        Self {
            db,
            limits,
            favorites_version: FavoritesVersion::new(),
            favorites_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Open, migrate and seed the store, in that order.
    pub async fn open(store: S, limits: Limits) -> Result<Self> {
        let limits = limits.validate()?;
        let db = Database::open(store).await?;
        let migrated = db.migrate().await?;
        let seeded = db.seed_system_foods().await?;
        info!(migrated, seeded, "database ready");
        Ok(Self::new(db, limits))
    }

    pub fn database(&self) -> &Database<S> {
        &self.db
    }

    pub fn into_database(self) -> Database<S> {
        self.db
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn favorites_version(&self) -> &FavoritesVersion {
        &self.favorites_version
    }

    /// Look up a food the user may refer to. Custom foods of other users are not visible.
    pub fn food(&self, user_id: &str, food_type: FoodType, food_id: &str) -> Result<Option<Food>> {
        let conn = self.db.conn();
        let food = match food_type {
            FoodType::System => system_food::get_by_id(conn, food_id)?.map(Food::System),
            FoodType::Custom => custom_food::get_by_id(conn, food_id)?
                .filter(|f| f.user_id == user_id)
                .map(Food::Custom),
        };
        Ok(food)
    }

    // --- Users & onboarding ---

    /// Create the user and their profile together and make the user active.
    pub async fn complete_onboarding(
        &self,
        new_user: &NewUser,
        new_profile: &NewProfile,
    ) -> Result<(User, Profile)> {
        let tx = self.db.conn().unchecked_transaction()?;
        let created = user::create(&tx, new_user)?;
        let created_profile = profile::create(&tx, &created.id, new_profile)?;
        settings::set(&tx, settings::ACTIVE_USER_ID, &created.id)?;
        tx.commit()?;
        self.db.persist().await?;
        info!(user_id = %created.id, "onboarding complete");
        Ok((created, created_profile))
    }

    pub fn active_user(&self) -> Result<Option<User>> {
        let conn = self.db.conn();
        match settings::get(conn, settings::ACTIVE_USER_ID)? {
            Some(id) => user::get_by_id(conn, &id),
            None => Ok(None),
        }
    }

    pub fn users(&self) -> Result<Vec<User>> {
        user::list(self.db.conn())
    }

    pub async fn switch_user(&self, user_id: &str) -> Result<Outcome<User>> {
        let Some(found) = user::get_by_id(self.db.conn(), user_id)? else {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        };
        settings::set(self.db.conn(), settings::ACTIVE_USER_ID, &found.id)?;
        self.db.persist().await?;
        Ok(Outcome::ok(found))
    }

    pub fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        profile::get_by_user(self.db.conn(), user_id)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &UpdateProfile,
    ) -> Result<Outcome<Profile>> {
        let Some(updated) = profile::update(self.db.conn(), user_id, update)? else {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        };
        self.db.persist().await?;
        Ok(Outcome::ok(updated))
    }

    // --- System foods ---

    pub fn system_food(&self, id: &str) -> Result<Option<SystemFood>> {
        system_food::get_by_id(self.db.conn(), id)
    }

    pub fn system_foods(&self, category: Option<FoodCategory>) -> Result<Vec<SystemFood>> {
        system_food::list_active(self.db.conn(), category)
    }

    pub fn search_system_foods(&self, query: &str) -> Result<Vec<SystemFood>> {
        system_food::search(self.db.conn(), query)
    }

    // --- Custom foods ---

    pub fn custom_foods(&self, user_id: &str) -> Result<Vec<CustomFood>> {
        custom_food::list_by_user(self.db.conn(), user_id)
    }

    pub async fn create_custom_food(&self, food: &NewCustomFood) -> Result<CustomFood> {
        let created = custom_food::create(self.db.conn(), food)?;
        self.db.persist().await?;
        Ok(created)
    }

    pub async fn update_custom_food(
        &self,
        user_id: &str,
        id: &str,
        update: &UpdateCustomFood,
    ) -> Result<Outcome<CustomFood>> {
        if self.food(user_id, FoodType::Custom, id)?.is_none() {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        let Some(updated) = custom_food::update(self.db.conn(), id, update)? else {
            return Ok(Outcome::rejected(OutcomeCode::FoodUnavailable));
        };
        self.db.persist().await?;
        Ok(Outcome::ok(updated))
    }

    /// Soft delete. Existing logs keep their snapshot.
    pub async fn delete_custom_food(&self, user_id: &str, id: &str) -> Result<Outcome<()>> {
        if self.food(user_id, FoodType::Custom, id)?.is_none() {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        if !custom_food::soft_delete(self.db.conn(), id)? {
            return Ok(Outcome::rejected(OutcomeCode::FoodUnavailable));
        }
        self.db.persist().await?;
        Ok(Outcome::ok(()))
    }
}
