use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Text-backed enum stored as a lowercase (or portion letter) column value.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $(t if t.eq_ignore_ascii_case($text) => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Portion {
    S,
    M,
    L,
}

text_enum!(Portion, "portion", { S => "S", M => "M", L => "L" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodType {
    System,
    Custom,
}

text_enum!(FoodType, "food type", { System => "system", Custom => "custom" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Noodle,
    Rice,
    Bread,
    Soup,
    Snack,
    Drink,
    Dessert,
    Other,
}

text_enum!(FoodCategory, "food category", {
    Noodle => "noodle",
    Rice => "rice",
    Bread => "bread",
    Soup => "soup",
    Snack => "snack",
    Drink => "drink",
    Dessert => "dessert",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Lose,
    Maintain,
    Gain,
}

text_enum!(GoalType, "goal type", { Lose => "lose", Maintain => "maintain", Gain => "gain" });

// --- Nutrition values ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub kcal: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fibre: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sugar: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sodium: Option<f64>,
}

impl Macros {
    #[must_use]
    pub fn new(kcal: f64, protein: f64, fat: f64, carbs: f64) -> Self {
        Self {
            kcal,
            protein,
            fat,
            carbs,
            ..Self::default()
        }
    }

    /// Read the seven macro columns starting at `offset`
    /// (kcal, protein, fat, carbs, fibre, sugar, sodium).
    pub(crate) fn from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            kcal: row.get(offset)?,
            protein: row.get(offset + 1)?,
            fat: row.get(offset + 2)?,
            carbs: row.get(offset + 3)?,
            fibre: row.get(offset + 4)?,
            sugar: row.get(offset + 5)?,
            sodium: row.get(offset + 6)?,
        })
    }
}

fn add_optional(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            kcal: self.kcal + rhs.kcal,
            protein: self.protein + rhs.protein,
            fat: self.fat + rhs.fat,
            carbs: self.carbs + rhs.carbs,
            fibre: add_optional(self.fibre, rhs.fibre),
            sugar: add_optional(self.sugar, rhs.sugar),
            sodium: add_optional(self.sodium, rhs.sodium),
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Macros {
        iter.fold(Macros::default(), Add::add)
    }
}

// --- Users & profiles ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub avatar: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub daily_kcal_goal: i64,
    pub goal_type: GoalType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_icon: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub daily_kcal_goal: i64,
    pub goal_type: GoalType,
    pub goal_text: Option<String>,
    pub goal_icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub daily_kcal_goal: Option<i64>,
    pub goal_type: Option<GoalType>,
    pub goal_text: Option<Option<String>>,
    pub goal_icon: Option<Option<String>>,
}

// --- Foods ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortionMacros {
    #[serde(rename = "S")]
    pub small: Macros,
    #[serde(rename = "M")]
    pub medium: Macros,
    #[serde(rename = "L")]
    pub large: Macros,
}

impl PortionMacros {
    #[must_use]
    pub fn get(&self, portion: Portion) -> &Macros {
        match portion {
            Portion::S => &self.small,
            Portion::M => &self.medium,
            Portion::L => &self.large,
        }
    }
}

/// Reference catalog entry. Read-only outside the seed loader; only `is_active` ever changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemFood {
    pub id: String,
    pub name_vi: String,
    pub name_en: String,
    pub category: FoodCategory,
    pub portions: PortionMacros,
    pub confidence: f64,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFood {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub macros: Macros,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl CustomFood {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewCustomFood {
    pub user_id: String,
    pub name: String,
    pub macros: Macros,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCustomFood {
    pub name: Option<String>,
    pub macros: Option<Macros>,
}

/// A food chosen by the caller, system or custom, from which snapshots are taken.
#[derive(Debug, Clone, Copy)]
pub enum FoodRef<'a> {
    System(&'a SystemFood),
    Custom(&'a CustomFood),
}

impl FoodRef<'_> {
    #[must_use]
    pub fn food_type(&self) -> FoodType {
        match self {
            FoodRef::System(_) => FoodType::System,
            FoodRef::Custom(_) => FoodType::Custom,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            FoodRef::System(f) => &f.id,
            FoodRef::Custom(f) => &f.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            FoodRef::System(f) => &f.name_vi,
            FoodRef::Custom(f) => &f.name,
        }
    }

    /// Custom foods carry absolute values, so the portion only matters for system foods.
    #[must_use]
    pub fn macros(&self, portion: Portion) -> Macros {
        match self {
            FoodRef::System(f) => *f.portions.get(portion),
            FoodRef::Custom(f) => f.macros,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        match self {
            FoodRef::System(f) => f.is_active,
            FoodRef::Custom(f) => !f.is_deleted(),
        }
    }
}

// --- Log entries ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub user_id: String,
    pub food_type: FoodType,
    pub food_id: String,
    pub portion: Portion,
    pub name: String,
    pub macros: Macros,
    pub logged_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub user_id: String,
    pub food_type: FoodType,
    pub food_id: String,
    pub portion: Portion,
    pub name: String,
    pub macros: Macros,
    pub logged_at: i64,
}

impl NewLogEntry {
    #[must_use]
    pub fn snapshot(user_id: &str, food: FoodRef<'_>, portion: Portion, logged_at: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            food_type: food.food_type(),
            food_id: food.id().to_string(),
            portion,
            name: food.name().to_string(),
            macros: food.macros(portion),
            logged_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayTotals {
    pub date: String,
    pub entry_count: i64,
    pub totals: Macros,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal_goal: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal_remaining: Option<f64>,
}

// --- Favorites ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub user_id: String,
    pub food_type: FoodType,
    pub food_id: String,
    pub use_count: i64,
    pub last_used_at: i64,
    pub created_at: i64,
}

// --- Meal templates ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealTemplate {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub totals: Macros,
    pub use_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewMealTemplate {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMealTemplate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub id: String,
    pub template_id: String,
    pub food_type: FoodType,
    pub food_id: String,
    pub portion: Portion,
    pub name: String,
    pub macros: Macros,
    pub is_required: bool,
    pub sort_order: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewTemplateItem {
    pub template_id: String,
    pub food_type: FoodType,
    pub food_id: String,
    pub portion: Portion,
    pub name: String,
    pub macros: Macros,
    pub is_required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealTemplateDetail {
    #[serde(flatten)]
    pub template: MealTemplate,
    pub items: Vec<TemplateItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_roundtrip_is_case_insensitive() {
        assert_eq!("m".parse::<Portion>().unwrap(), Portion::M);
        assert_eq!("Custom".parse::<FoodType>().unwrap(), FoodType::Custom);
        assert_eq!(" soup ".parse::<FoodCategory>().unwrap(), FoodCategory::Soup);
        assert_eq!(GoalType::Lose.as_str(), "lose");
        let err = "XL".parse::<Portion>().unwrap_err();
        assert_eq!(err.to_string(), "invalid portion 'XL'");
    }

    #[test]
    fn test_macros_sum_keeps_optional_fields() {
        let a = Macros {
            fibre: Some(2.0),
            ..Macros::new(100.0, 5.0, 3.0, 12.0)
        };
        let b = Macros::new(50.0, 1.0, 1.0, 8.0);
        let total: Macros = [a, b].into_iter().sum();
        assert!((total.kcal - 150.0).abs() < f64::EPSILON);
        assert!((total.carbs - 20.0).abs() < f64::EPSILON);
        assert_eq!(total.fibre, Some(2.0));
        assert_eq!(total.sugar, None);
    }

    #[test]
    fn test_food_ref_custom_ignores_portion() {
        let food = CustomFood {
            id: "c1".to_string(),
            user_id: "u1".to_string(),
            name: "Bánh bao".to_string(),
            macros: Macros::new(320.0, 11.0, 9.0, 48.0),
            created_at: 0,
            updated_at: 0,
            deleted_at: None,
        };
        let r = FoodRef::Custom(&food);
        assert_eq!(r.macros(Portion::S), r.macros(Portion::L));
        assert_eq!(r.food_type(), FoodType::Custom);
        assert!(r.is_available());
    }

    #[test]
    fn test_macros_serialize_skips_missing_optionals() {
        let json = serde_json::to_value(Macros::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert!(json.get("fibre").is_none());
        assert_eq!(json["kcal"], 1.0);
    }
}
