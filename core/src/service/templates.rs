use rusqlite::Connection;
use tracing::{info, warn};

use super::{BuaService, Outcome, OutcomeCode};
use crate::error::Result;
use crate::models::{
    FoodType, LogEntry, Macros, MealTemplate, MealTemplateDetail, NewLogEntry, NewMealTemplate,
    NewTemplateItem, Portion, TemplateItem, UpdateMealTemplate,
};
use crate::repo::{log_entry, template};
use crate::storage::ImageStore;
use crate::time::now_ms;

/// Recompute a template's totals from its items and store them.
fn refresh_totals(conn: &Connection, template_id: &str) -> Result<Macros> {
    let totals: Macros = template::list_items(conn, template_id)?
        .iter()
        .map(|item| item.macros)
        .sum();
    template::set_totals(conn, template_id, &totals)?;
    Ok(totals)
}

impl<S: ImageStore> BuaService<S> {
    /// A live template owned by `user_id`.
    fn owned_template(&self, user_id: &str, template_id: &str) -> Result<Option<MealTemplate>> {
        let found = template::get_by_id(self.db.conn(), template_id)?
            .filter(|t| t.user_id == user_id && t.deleted_at.is_none());
        Ok(found)
    }

    pub async fn create_template(&self, new_template: &NewMealTemplate) -> Result<MealTemplate> {
        let created = template::create(self.db.conn(), new_template)?;
        self.db.persist().await?;
        Ok(created)
    }

    pub fn list_templates(&self, user_id: &str) -> Result<Vec<MealTemplate>> {
        template::list_by_user(self.db.conn(), user_id)
    }

    pub fn template_detail(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<Option<MealTemplateDetail>> {
        let Some(found) = self.owned_template(user_id, template_id)? else {
            return Ok(None);
        };
        let items = template::list_items(self.db.conn(), template_id)?;
        Ok(Some(MealTemplateDetail {
            template: found,
            items,
        }))
    }

    pub async fn update_template(
        &self,
        user_id: &str,
        template_id: &str,
        update: &UpdateMealTemplate,
    ) -> Result<Outcome<MealTemplate>> {
        if self.owned_template(user_id, template_id)?.is_none() {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        let Some(updated) = template::update(self.db.conn(), template_id, update)? else {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        };
        self.db.persist().await?;
        Ok(Outcome::ok(updated))
    }

    /// Soft delete. Entries already logged from the template are kept.
    pub async fn delete_template(&self, user_id: &str, template_id: &str) -> Result<Outcome<()>> {
        if self.owned_template(user_id, template_id)?.is_none()
            || !template::soft_delete(self.db.conn(), template_id)?
        {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        self.db.persist().await?;
        Ok(Outcome::ok(()))
    }

    /// Append a food snapshot to a template. Totals are updated in the same transaction.
    pub async fn add_template_item(
        &self,
        user_id: &str,
        template_id: &str,
        food_type: FoodType,
        food_id: &str,
        portion: Portion,
        is_required: bool,
    ) -> Result<Outcome<TemplateItem>> {
        if self.owned_template(user_id, template_id)?.is_none() {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        let Some(food) = self.food(user_id, food_type, food_id)? else {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        };
        let food = food.as_food_ref();
        if !food.is_available() {
            return Ok(Outcome::rejected(OutcomeCode::FoodUnavailable));
        }

        let count = template::count_items(self.db.conn(), template_id)?;
        if count >= i64::from(self.limits.max_template_items) {
            warn!(
                template_id,
                count,
                cap = self.limits.max_template_items,
                "template item cap reached"
            );
            return Ok(Outcome::rejected(OutcomeCode::TemplateItemLimitReached));
        }

        let tx = self.db.conn().unchecked_transaction()?;
        let item = template::add_item(
            &tx,
            &NewTemplateItem {
                template_id: template_id.to_string(),
                food_type,
                food_id: food_id.to_string(),
                portion,
                name: food.name().to_string(),
                macros: food.macros(portion),
                is_required,
            },
        )?;
        refresh_totals(&tx, template_id)?;
        tx.commit()?;

        self.db.persist().await?;
        Ok(Outcome::ok(item))
    }

    pub async fn remove_template_item(
        &self,
        user_id: &str,
        template_id: &str,
        item_id: &str,
    ) -> Result<Outcome<()>> {
        if self.owned_template(user_id, template_id)?.is_none() {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }

        let tx = self.db.conn().unchecked_transaction()?;
        if !template::remove_item(&tx, template_id, item_id)? {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        refresh_totals(&tx, template_id)?;
        tx.commit()?;

        self.db.persist().await?;
        Ok(Outcome::ok(()))
    }

    pub async fn log_template(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<Outcome<Vec<LogEntry>>> {
        self.log_template_at(user_id, template_id, now_ms()).await
    }

    /// Log every item of a template at `now`, or nothing if the daily cap would be exceeded.
    pub async fn log_template_at(
        &self,
        user_id: &str,
        template_id: &str,
        now: i64,
    ) -> Result<Outcome<Vec<LogEntry>>> {
        if self.owned_template(user_id, template_id)?.is_none() {
            return Ok(Outcome::rejected(OutcomeCode::NotFound));
        }
        let items = template::list_items(self.db.conn(), template_id)?;
        if items.is_empty() {
            return Ok(Outcome::ok(Vec::new()));
        }
        let incoming = i64::try_from(items.len()).unwrap_or(i64::MAX);

        let count = self.logs_today_count(user_id, now)?;
        if count + incoming > i64::from(self.limits.daily_log_cap) {
            warn!(
                user_id,
                count,
                incoming,
                cap = self.limits.daily_log_cap,
                "template would exceed daily log cap"
            );
            return Ok(Outcome::rejected(OutcomeCode::DailyLimitReached));
        }

        let tx = self.db.conn().unchecked_transaction()?;
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            entries.push(log_entry::create(
                &tx,
                &NewLogEntry {
                    user_id: user_id.to_string(),
                    food_type: item.food_type,
                    food_id: item.food_id,
                    portion: item.portion,
                    name: item.name,
                    macros: item.macros,
                    logged_at: now,
                },
            )?);
        }
        template::mark_used(&tx, template_id, now)?;
        tx.commit()?;

        self.db.persist().await?;
        info!(user_id, template_id, logged = entries.len(), "logged template");
        Ok(Outcome::ok(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::db::Database;
    use crate::models::FoodRef;
    use crate::service::tests::onboarded;
    use crate::test_support::{sample_profile, sample_user};

    const NOON: i64 = 1_760_000_000_000;

    async fn breakfast<St: ImageStore>(service: &BuaService<St>, user_id: &str) -> MealTemplate {
        service
            .create_template(&NewMealTemplate {
                user_id: user_id.to_string(),
                name: "Bữa sáng".to_string(),
                description: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_items_update_totals() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        let coffee = service.system_food("sf-ca-phe-sua-da").unwrap().unwrap();

        service
            .add_template_item(&user.id, &t.id, FoodType::System, &pho.id, Portion::M, true)
            .await
            .unwrap();
        let added = service
            .add_template_item(&user.id, &t.id, FoodType::System, &coffee.id, Portion::S, false)
            .await
            .unwrap()
            .into_value()
            .unwrap();

        let detail = service.template_detail(&user.id, &t.id).unwrap().unwrap();
        assert_eq!(detail.items.len(), 2);
        let expected = pho.portions.medium.kcal + coffee.portions.small.kcal;
        assert!((detail.template.totals.kcal - expected).abs() < 1e-9);

        assert!(service
            .remove_template_item(&user.id, &t.id, &added.id)
            .await
            .unwrap()
            .is_ok());
        let detail = service.template_detail(&user.id, &t.id).unwrap().unwrap();
        assert!((detail.template.totals.kcal - pho.portions.medium.kcal).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_item_cap() {
        let limits = Limits {
            max_template_items: 2,
            ..Limits::default()
        };
        let service = BuaService::new(Database::open_in_memory().unwrap(), limits);
        crate::seed::seed_system_foods(service.database().conn()).unwrap();
        let (user, _) = service
            .complete_onboarding(&sample_user(), &sample_profile())
            .await
            .unwrap();
        let t = breakfast(&service, &user.id).await;

        for _ in 0..2 {
            let outcome = service
                .add_template_item(&user.id, &t.id, FoodType::System, "sf-pho-bo", Portion::M, true)
                .await
                .unwrap();
            assert!(outcome.is_ok());
        }
        let third = service
            .add_template_item(&user.id, &t.id, FoodType::System, "sf-pho-bo", Portion::M, true)
            .await
            .unwrap();
        assert_eq!(third.code, OutcomeCode::TemplateItemLimitReached);
    }

    #[tokio::test]
    async fn test_missing_template_or_food_is_not_found() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        let no_template = service
            .add_template_item(&user.id, "nope", FoodType::System, "sf-pho-bo", Portion::M, true)
            .await
            .unwrap();
        assert_eq!(no_template.code, OutcomeCode::NotFound);

        let no_food = service
            .add_template_item(&user.id, &t.id, FoodType::System, "sf-nope", Portion::M, true)
            .await
            .unwrap();
        assert_eq!(no_food.code, OutcomeCode::NotFound);

        let other_user = service
            .add_template_item("someone", &t.id, FoodType::System, "sf-pho-bo", Portion::M, true)
            .await
            .unwrap();
        assert_eq!(other_user.code, OutcomeCode::NotFound);
    }

    #[tokio::test]
    async fn test_log_template_all_or_nothing() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        for id in ["sf-pho-bo", "sf-ca-phe-sua-da", "sf-tra-da"] {
            service
                .add_template_item(&user.id, &t.id, FoodType::System, id, Portion::M, true)
                .await
                .unwrap();
        }

        let logged = service.log_template_at(&user.id, &t.id, NOON).await.unwrap();
        assert_eq!(logged.value.as_ref().unwrap().len(), 3);
        let used = service.list_templates(&user.id).unwrap();
        assert_eq!(used[0].use_count, 1);
        assert_eq!(used[0].last_used_at, Some(NOON));

        // 3 of 6 used, another 3 fits exactly
        assert!(service.log_template_at(&user.id, &t.id, NOON).await.unwrap().is_ok());

        let refused = service.log_template_at(&user.id, &t.id, NOON).await.unwrap();
        assert_eq!(refused.code, OutcomeCode::DailyLimitReached);
        assert_eq!(service.logs_today_count(&user.id, NOON).unwrap(), 6);
    }

    #[tokio::test]
    async fn test_template_snapshot_is_logged() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        let pho = service.system_food("sf-pho-bo").unwrap().unwrap();
        service
            .add_template_item(&user.id, &t.id, FoodType::System, &pho.id, Portion::L, true)
            .await
            .unwrap();
        let direct = service
            .log_food_at(&user.id, FoodRef::System(&pho), Portion::L, NOON)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        let via_template = service
            .log_template_at(&user.id, &t.id, NOON)
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(via_template[0].macros, direct.macros);
        assert_eq!(via_template[0].name, direct.name);
    }

    #[tokio::test]
    async fn test_deleted_template_disappears() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        assert!(service.delete_template(&user.id, &t.id).await.unwrap().is_ok());
        assert!(service.list_templates(&user.id).unwrap().is_empty());
        assert!(service.template_detail(&user.id, &t.id).unwrap().is_none());
        assert_eq!(
            service.delete_template(&user.id, &t.id).await.unwrap().code,
            OutcomeCode::NotFound
        );
        assert_eq!(
            service.log_template(&user.id, &t.id).await.unwrap().code,
            OutcomeCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_log_empty_template_writes_nothing() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        let outcome = service.log_template_at(&user.id, &t.id, NOON).await.unwrap();
        assert!(outcome.is_ok());
        assert!(outcome.into_value().unwrap().is_empty());

        let listed = service.list_templates(&user.id).unwrap();
        assert_eq!(listed[0].use_count, 0);
        assert!(listed[0].last_used_at.is_none());
        assert_eq!(service.logs_today_count(&user.id, NOON).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename_template() {
        let (service, user) = onboarded().await;
        let t = breakfast(&service, &user.id).await;
        let renamed = service
            .update_template(
                &user.id,
                &t.id,
                &UpdateMealTemplate {
                    name: Some("Bữa trưa".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(renamed.name, "Bữa trưa");
    }
}
