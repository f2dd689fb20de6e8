use tracing::{info, warn};

use super::{BuaService, Outcome, OutcomeCode};
use crate::error::Result;
use crate::models::{DayTotals, FoodRef, FoodType, LogEntry, Macros, NewLogEntry, Portion};
use crate::repo::{log_entry, profile};
use crate::storage::ImageStore;
use crate::time::{local_date, local_day_bounds, now_ms};

impl<S: ImageStore> BuaService<S> {
    /// Entries the user has logged in the local day containing `now`.
    pub fn logs_today_count(&self, user_id: &str, now: i64) -> Result<i64> {
        let (start, end) = local_day_bounds(now);
        log_entry::count_between(self.db.conn(), user_id, start, end)
    }

    /// How many more entries the daily cap allows today.
    pub fn remaining_logs(&self, user_id: &str, now: i64) -> Result<i64> {
        let used = self.logs_today_count(user_id, now)?;
        Ok((i64::from(self.limits.daily_log_cap) - used).max(0))
    }

    pub async fn log_food(
        &self,
        user_id: &str,
        food: FoodRef<'_>,
        portion: Portion,
    ) -> Result<Outcome<LogEntry>> {
        self.log_food_at(user_id, food, portion, now_ms()).await
    }

    /// Log `food` at `now`, snapshotting its name and macros for `portion`.
    pub async fn log_food_at(
        &self,
        user_id: &str,
        food: FoodRef<'_>,
        portion: Portion,
        now: i64,
    ) -> Result<Outcome<LogEntry>> {
        let count = self.logs_today_count(user_id, now)?;
        if count >= i64::from(self.limits.daily_log_cap) {
            warn!(user_id, count, cap = self.limits.daily_log_cap, "daily log cap reached");
            return Ok(Outcome::rejected(OutcomeCode::DailyLimitReached));
        }

        let entry = log_entry::create(
            self.db.conn(),
            &NewLogEntry::snapshot(user_id, food, portion, now),
        )?;
        self.db.persist().await?;
        info!(user_id, food_id = food.id(), portion = %portion, "logged food");
        Ok(Outcome::ok(entry))
    }

    /// Like [`Self::log_food`] for a food known only by type and id.
    pub async fn log_food_by_id(
        &self,
        user_id: &str,
        food_type: FoodType,
        food_id: &str,
        portion: Portion,
    ) -> Result<Outcome<LogEntry>> {
        let Some(food) = self.food(user_id, food_type, food_id)? else {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        };
        let food = food.as_food_ref();
        if !food.is_available() {
            return Ok(Outcome::rejected(OutcomeCode::FoodUnavailable));
        }
        self.log_food(user_id, food, portion).await
    }

    pub async fn delete_log(&self, user_id: &str, log_id: &str) -> Result<Outcome<()>> {
        let owned =
            log_entry::get_by_id(self.db.conn(), log_id)?.is_some_and(|e| e.user_id == user_id);
        if !owned || !log_entry::delete(self.db.conn(), log_id)? {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        self.db.persist().await?;
        Ok(Outcome::ok(()))
    }

    /// Entries in the local day containing `at`, newest first.
    pub fn logs_for_day(&self, user_id: &str, at: i64) -> Result<Vec<LogEntry>> {
        let (start, end) = local_day_bounds(at);
        log_entry::list_between(self.db.conn(), user_id, start, end)
    }

    pub fn recent_logs(&self, user_id: &str, limit: i64) -> Result<Vec<LogEntry>> {
        log_entry::list_by_user(self.db.conn(), user_id, limit)
    }

    /// Macro totals for the local day containing `at`, against the profile goal if any.
    pub fn day_totals(&self, user_id: &str, at: i64) -> Result<DayTotals> {
        let entries = self.logs_for_day(user_id, at)?;
        let totals = entries.iter().map(|e| e.macros).sum::<Macros>();
        let kcal_goal = profile::get_by_user(self.db.conn(), user_id)?.map(|p| p.daily_kcal_goal);
        #[allow(clippy::cast_precision_loss)]
        let kcal_remaining = kcal_goal.map(|goal| goal as f64 - totals.kcal);
        Ok(DayTotals {
            date: local_date(at).to_string(),
            entry_count: i64::try_from(entries.len()).unwrap_or(i64::MAX),
            totals,
            kcal_goal,
            kcal_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::db::Database;
    use crate::models::FoodCategory;
    use crate::repo::system_food;
    use crate::service::tests::onboarded;
    use crate::storage::MemoryImageStore;
    use crate::test_support::{FailingStore, sample_custom_food, sample_system_food};

    const NOON: i64 = 1_760_000_000_000;

    #[tokio::test]
    async fn test_log_below_cap_snapshots_portion() {
        let (service, user) = onboarded().await;
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        let outcome = service
            .log_food_at(&user.id, FoodRef::System(&pho), Portion::L, NOON)
            .await
            .unwrap();
        assert!(outcome.is_ok());
        let entry = outcome.into_value().unwrap();
        assert_eq!(entry.macros, pho.portions.large);
        assert_eq!(entry.name, "Phở bò");
        assert_eq!(entry.logged_at, NOON);
    }

    #[tokio::test]
    async fn test_daily_cap_scenario() {
        let (service, user) = onboarded().await;
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        let tea = service.system_food("sf-tra-da").unwrap().unwrap();

        for i in 0..5 {
            let outcome = service
                .log_food_at(&user.id, FoodRef::System(&pho), Portion::M, NOON + i)
                .await
                .unwrap();
            assert_eq!(outcome.code, OutcomeCode::Ok);
        }
        let sixth = service
            .log_food_at(&user.id, FoodRef::System(&tea), Portion::M, NOON + 5)
            .await
            .unwrap();
        assert!(sixth.is_ok());

        let seventh = service
            .log_food_at(&user.id, FoodRef::System(&tea), Portion::S, NOON + 6)
            .await
            .unwrap();
        assert_eq!(seventh.code, OutcomeCode::DailyLimitReached);
        assert!(seventh.value.is_none());
        assert_eq!(service.logs_today_count(&user.id, NOON).unwrap(), 6);
        assert_eq!(service.remaining_logs(&user.id, NOON).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_entry_behind() {
        let store = FailingStore::default();
        let service = BuaService::open(store.clone(), Limits::default()).await.unwrap();
        let (user, _) = service
            .complete_onboarding(
                &crate::test_support::sample_user(),
                &crate::test_support::sample_profile(),
            )
            .await
            .unwrap();
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();

        store.fail_next_save();
        let failed = service
            .log_food_at(&user.id, FoodRef::System(&pho), Portion::M, NOON)
            .await;
        assert!(failed.is_err());
        assert_eq!(service.logs_today_count(&user.id, NOON).unwrap(), 0);

        let retried = service
            .log_food_at(&user.id, FoodRef::System(&pho), Portion::M, NOON)
            .await
            .unwrap();
        assert_eq!(retried.code, OutcomeCode::Ok);
        assert_eq!(service.logs_today_count(&user.id, NOON).unwrap(), 1);
        assert_eq!(service.remaining_logs(&user.id, NOON).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cap_resets_next_day() {
        let (service, user) = onboarded().await;
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        for i in 0..6 {
            service
                .log_food_at(&user.id, FoodRef::System(&pho), Portion::M, NOON + i)
                .await
                .unwrap();
        }
        let (_, end) = local_day_bounds(NOON);
        let tomorrow = service
            .log_food_at(&user.id, FoodRef::System(&pho), Portion::M, end + 1)
            .await
            .unwrap();
        assert!(tomorrow.is_ok());
    }

    #[tokio::test]
    async fn test_cap_is_per_user() {
        let (service, user) = onboarded().await;
        let (other, _) = service
            .complete_onboarding(
                &crate::test_support::sample_user(),
                &crate::test_support::sample_profile(),
            )
            .await
            .unwrap();
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        for i in 0..6 {
            service
                .log_food_at(&user.id, FoodRef::System(&pho), Portion::M, NOON + i)
                .await
                .unwrap();
        }
        let outcome = service
            .log_food_at(&other.id, FoodRef::System(&pho), Portion::M, NOON)
            .await
            .unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_custom_food_logs_absolute_macros() {
        let (service, user) = onboarded().await;
        let food = service
            .create_custom_food(&sample_custom_food(&user.id))
            .await
            .unwrap();
        let entry = service
            .log_food_at(&user.id, FoodRef::Custom(&food), Portion::S, NOON)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(entry.macros, food.macros);
        assert_eq!(entry.food_type, FoodType::Custom);
    }

    #[tokio::test]
    async fn test_log_by_id_not_found_and_unavailable() {
        let (service, user) = onboarded().await;
        let missing = service
            .log_food_by_id(&user.id, FoodType::System, "sf-nope", Portion::M)
            .await
            .unwrap();
        assert_eq!(missing.code, OutcomeCode::NotFound);

        system_food::set_active(service.database().conn(), "sf-pho-bo", false).unwrap();
        let inactive = service
            .log_food_by_id(&user.id, FoodType::System, "sf-pho-bo", Portion::M)
            .await
            .unwrap();
        assert_eq!(inactive.code, OutcomeCode::FoodUnavailable);

        let ok = service
            .log_food_by_id(&user.id, FoodType::System, "sf-tra-da", Portion::M)
            .await
            .unwrap();
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_delete_log_only_own_entries() {
        let (service, user) = onboarded().await;
        let entry = service
            .log_food_by_id(&user.id, FoodType::System, "sf-tra-da", Portion::M)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(
            service.delete_log("someone", &entry.id).await.unwrap().code,
            OutcomeCode::NotFound
        );
        assert!(service.delete_log(&user.id, &entry.id).await.unwrap().is_ok());
        assert_eq!(
            service.delete_log(&user.id, &entry.id).await.unwrap().code,
            OutcomeCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_day_totals_against_goal() {
        let (service, user) = onboarded().await;
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        for portion in [Portion::S, Portion::L] {
            service
                .log_food_at(&user.id, FoodRef::System(&pho), portion, NOON)
                .await
                .unwrap();
        }
        let totals = service.day_totals(&user.id, NOON).unwrap();
        let expected = pho.portions.small.kcal + pho.portions.large.kcal;
        assert_eq!(totals.entry_count, 2);
        assert!((totals.totals.kcal - expected).abs() < 1e-9);
        assert_eq!(totals.kcal_goal, Some(2000));
        assert!((totals.kcal_remaining.unwrap() - (2000.0 - expected)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_logged_entry_survives_persist_and_reopen() {
        let store = MemoryImageStore::new();
        let service = BuaService::open(store.clone(), Limits::default()).await.unwrap();
        let (user, _) = service
            .complete_onboarding(
                &crate::test_support::sample_user(),
                &crate::test_support::sample_profile(),
            )
            .await
            .unwrap();
        let food = sample_system_food("sf-x", "Món thử", FoodCategory::Other);
        let entry = service
            .log_food_at(&user.id, FoodRef::System(&food), Portion::M, NOON)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        service.into_database().close().unwrap();

        let db = Database::open(store).await.unwrap();
        let fetched = log_entry::get_by_id(db.conn(), &entry.id).unwrap().unwrap();
        assert_eq!(fetched, entry);
    }
}
