use tracing::{debug, warn};

use super::{BuaService, Outcome, OutcomeCode};
use crate::error::Result;
use crate::models::{Favorite, FoodType};
use crate::repo::favorite;
use crate::storage::ImageStore;
use crate::time::now_ms;

impl<S: ImageStore> BuaService<S> {
    /// Advance the favorites version, then persist.
    async fn favorites_changed(&self) -> Result<()> {
        let version = self.favorites_version.invalidate();
        debug!(version, "favorites changed");
        self.db.persist().await
    }

    /// Favorite a food, or count another use if it already is one.
    pub async fn add_favorite(
        &self,
        user_id: &str,
        food_type: FoodType,
        food_id: &str,
    ) -> Result<Outcome<Favorite>> {
        let conn = self.db.conn();
        let now = now_ms();

        if let Some(existing) = favorite::find(conn, user_id, food_type, food_id)? {
            let touched = favorite::touch(conn, &existing.id, now)?;
            self.favorites_changed().await?;
            return Ok(touched.map_or_else(
                || Outcome::rejected(OutcomeCode::NotFound),
                Outcome::ok,
            ));
        }

        let Some(food) = self.food(user_id, food_type, food_id)? else {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        };
        if !food.as_food_ref().is_available() {
            return Ok(Outcome::rejected(OutcomeCode::FoodUnavailable));
        }

        let count = favorite::count_by_user(conn, user_id)?;
        if count >= i64::from(self.limits.max_favorites) {
            warn!(user_id, count, cap = self.limits.max_favorites, "favorites cap reached");
            return Ok(Outcome::rejected(OutcomeCode::FavoritesLimitReached));
        }

        let created = favorite::create(conn, user_id, food_type, food_id, now)?;
        self.favorites_changed().await?;
        Ok(Outcome::ok(created))
    }

    pub async fn remove_favorite(
        &self,
        user_id: &str,
        food_type: FoodType,
        food_id: &str,
    ) -> Result<Outcome<()>> {
        if !favorite::delete(self.db.conn(), user_id, food_type, food_id)? {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        self.favorites_changed().await?;
        Ok(Outcome::ok(()))
    }

    /// Most used first. Served from memory until the favorites version moves.
    pub fn favorites_by_frequency(&self, user_id: &str) -> Result<Vec<Favorite>> {
        let version = self.favorites_version.current();
        let mut caches = self.favorites_cache.borrow_mut();
        caches
            .entry(user_id.to_string())
            .or_default()
            .get_or_refresh(version, || favorite::list_by_frequency(self.db.conn(), user_id))
    }
}
