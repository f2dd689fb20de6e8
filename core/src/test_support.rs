//! Fixtures shared by the unit tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::{
    FoodCategory, GoalType, Macros, NewCustomFood, NewProfile, NewUser, PortionMacros, SystemFood,
};
use crate::storage::{ImageStore, MemoryImageStore};

/// Memory store whose next `save` can be made to fail once.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryImageStore,
    fail_next_save: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }
}

impl ImageStore for FailingStore {
    async fn load(&self) -> io::Result<Option<Vec<u8>>> {
        self.inner.load().await
    }

    async fn save(&self, image: &[u8]) -> io::Result<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        self.inner.save(image).await
    }

    async fn clear(&self) -> io::Result<()> {
        self.inner.clear().await
    }
}

pub fn sample_user() -> NewUser {
    NewUser {
        display_name: "Lan".to_string(),
        avatar: "🍜".to_string(),
    }
}

pub fn sample_profile() -> NewProfile {
    NewProfile {
        daily_kcal_goal: 2000,
        goal_type: GoalType::Maintain,
        goal_text: Some("Ăn uống cân bằng".to_string()),
        goal_icon: Some("⚖️".to_string()),
    }
}

pub fn sample_system_food(id: &str, name_vi: &str, category: FoodCategory) -> SystemFood {
    SystemFood {
        id: id.to_string(),
        name_vi: name_vi.to_string(),
        name_en: format!("{name_vi} (en)"),
        category,
        portions: PortionMacros {
            small: Macros::new(300.0, 15.0, 8.0, 40.0),
            medium: Macros {
                fibre: Some(2.0),
                ..Macros::new(420.0, 21.0, 11.0, 56.0)
            },
            large: Macros {
                sodium: Some(1900.0),
                ..Macros::new(560.0, 28.0, 15.0, 75.0)
            },
        },
        confidence: 0.9,
        is_active: true,
        created_at: 1_700_000_000_000,
    }
}

pub fn sample_custom_food(user_id: &str) -> NewCustomFood {
    NewCustomFood {
        user_id: user_id.to_string(),
        name: "Bánh bao".to_string(),
        macros: Macros {
            fibre: Some(1.5),
            ..Macros::new(320.0, 11.0, 9.0, 48.0)
        },
    }
}
