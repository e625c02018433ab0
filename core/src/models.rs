use serde::{Deserialize, Serialize};

use crate::conversion::{ConversionProfile, StoredConversion};
use crate::error::{FoodError, FoodResult};

/// Source tag for values taken from the local catalog.
pub const SOURCE_DATASET: &str = "dataset";

/// Source tags whose macros get replaced by catalog values when a catalog
/// match exists.
pub const LOW_TRUST_SOURCES: &[&str] = &["manual", "unknown"];

pub const MEAL_TYPES: &[&str] = &[
    "breakfast",
    "morning snack",
    "lunch",
    "evening snack",
    "dinner",
];

/// Per-100g macro profile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

impl Macros {
    #[must_use]
    pub fn rounded(&self) -> Self {
        use crate::providers::round2;
        Self {
            calories: round2(self.calories),
            protein: round2(self.protein),
            carbs: round2(self.carbs),
            fats: round2(self.fats),
        }
    }
}

/// Persisted, name-keyed nutrition record shared by every user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodMaster {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    #[serde(flatten)]
    pub macros: Macros,
    #[serde(flatten)]
    pub conversion: StoredConversion,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

impl FoodMaster {
    /// Complete profile for gram conversion. Unset fields fall back to the
    /// generic defaults; after a resolve pass none are unset.
    #[must_use]
    pub fn profile(&self) -> ConversionProfile {
        self.conversion.complete_with(&ConversionProfile::default())
    }
}

#[derive(Debug, Clone)]
pub struct NewFoodMaster {
    pub name: String,
    pub macros: Macros,
    pub conversion: ConversionProfile,
    pub source: String,
}

/// One logged portion. Grams and macros are a snapshot taken at log time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodLogEntry {
    pub id: i64,
    pub uuid: String,
    pub user_id: String,
    pub food_id: i64,
    pub food_name: String,
    pub quantity: f64,
    pub unit: String,
    pub grams: f64,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
    pub meal_type: String,
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Whole-unit macros for a logged portion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoggedMacros {
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
}

#[derive(Debug, Clone)]
pub struct NewFoodLogEntry {
    pub user_id: String,
    pub food_id: i64,
    pub food_name: String,
    pub quantity: f64,
    pub unit: String,
    pub grams: f64,
    pub macros: LoggedMacros,
    pub meal_type: String,
    pub date: chrono::NaiveDate,
}

/// Recomputed values written by an explicit edit.
#[derive(Debug, Clone)]
pub struct UpdateFoodLogEntry {
    pub quantity: f64,
    pub unit: String,
    pub grams: f64,
    pub macros: LoggedMacros,
    pub meal_type: String,
}

/// A request to log a portion of a named food.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFood {
    pub food_name: String,
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub meal_type: String,
    /// `YYYY-MM-DD`, today when absent.
    #[serde(default)]
    pub date: Option<String>,
}

fn default_unit() -> String {
    "g".to_string()
}

/// Explicit edit of a log entry. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFoodLog {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub meal_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub source: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub date: String,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
    pub entries: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCalories {
    pub date: String,
    pub calories: i64,
}

/// Canonicalize a meal slot. Case-insensitive; `_` and `-` count as spaces.
pub fn validate_meal_type(meal: &str) -> FoodResult<String> {
    let lower = meal
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(FoodError::Validation(format!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )))
    }
}

/// Empty or manual-origin sources are eligible for a catalog refresh.
#[must_use]
pub fn is_low_trust_source(source: &str) -> bool {
    let source = source.trim();
    source.is_empty() || LOW_TRUST_SOURCES.contains(&source.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_meal_types() {
        for meal in MEAL_TYPES {
            assert_eq!(validate_meal_type(meal).unwrap(), *meal);
        }
    }

    #[test]
    fn test_meal_type_separators_and_case() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert_eq!(validate_meal_type("Morning Snack").unwrap(), "morning snack");
        assert_eq!(validate_meal_type("evening_snack").unwrap(), "evening snack");
        assert_eq!(validate_meal_type("MORNING-SNACK").unwrap(), "morning snack");
    }

    #[test]
    fn test_invalid_meal_type() {
        assert!(matches!(
            validate_meal_type("brunch"),
            Err(FoodError::Validation(_))
        ));
        assert!(validate_meal_type("").is_err());
        assert!(validate_meal_type("snack").is_err());
    }

    #[test]
    fn test_low_trust_sources() {
        assert!(is_low_trust_source(""));
        assert!(is_low_trust_source("  "));
        assert!(is_low_trust_source("manual"));
        assert!(is_low_trust_source("Manual"));
        assert!(is_low_trust_source("unknown"));
        assert!(!is_low_trust_source("dataset"));
        assert!(!is_low_trust_source("usda"));
        assert!(!is_low_trust_source("gemini"));
    }

    #[test]
    fn test_macros_rounded() {
        let m = Macros {
            calories: 63.799_999,
            protein: 2.204,
            carbs: 13.2,
            fats: 0.445,
        }
        .rounded();
        assert!((m.calories - 63.8).abs() < 1e-9);
        assert!((m.protein - 2.2).abs() < 1e-9);
        assert!((m.carbs - 13.2).abs() < 1e-9);
    }
}
