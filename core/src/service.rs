use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Days, Local, NaiveDate};
use tracing::debug;

use crate::calculator::{Unit, scale_macros, to_grams, validate_quantity};
use crate::dataset::DatasetCache;
use crate::db::Database;
use crate::error::{FoodError, FoodResult};
use crate::food_master::FoodResolver;
use crate::models::{
    AddFood, DailyTotals, DayCalories, FoodLogEntry, FoodMaster, NewFoodLogEntry, SOURCE_DATASET,
    Suggestion, UpdateFoodLog, UpdateFoodLogEntry, validate_meal_type,
};
use crate::providers::ProviderChain;
use crate::scorer::{DEFAULT_SUGGESTION_LIMIT, search_suggestions};

pub const MAX_SUGGESTION_LIMIT: usize = 50;

/// Food resolution and logging over one database and one catalog.
///
/// Calls are synchronous; provider lookups block. Async callers should run
/// them on a blocking thread.
pub struct ThaliService {
    db: Database,
    dataset: Arc<DatasetCache>,
}

impl ThaliService {
    pub fn new(db_path: &Path, dataset_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::with_parts(db, DatasetCache::new(dataset_path)))
    }

    /// The catalog cache may be shared between services that each own a
    /// connection.
    #[must_use]
    pub fn with_parts(db: Database, dataset: impl Into<Arc<DatasetCache>>) -> Self {
        Self {
            db,
            dataset: dataset.into(),
        }
    }

    /// Ranked catalog matches for a typed fragment.
    #[must_use]
    pub fn suggest(&self, query: &str, limit: Option<usize>) -> Vec<Suggestion> {
        let limit = limit
            .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
            .clamp(1, MAX_SUGGESTION_LIMIT);
        let entries = self.dataset.load();
        search_suggestions(&entries, query, limit)
            .into_iter()
            .map(|e| Suggestion {
                name: e.name.clone(),
                source: SOURCE_DATASET.to_string(),
                calories: e.calories,
                protein: e.protein,
                carbs: e.carbs,
                fats: e.fats,
            })
            .collect()
    }

    pub fn resolve_food(&self, chain: Option<&ProviderChain>, name: &str) -> FoodResult<FoodMaster> {
        let resolver = FoodResolver::new(&self.db, &self.dataset);
        match chain {
            Some(chain) => resolver.with_chain(chain).resolve(name),
            None => resolver.resolve(name),
        }
    }

    /// Resolve the food and log a portion of it. Input is validated before
    /// any lookup happens.
    pub fn add_food(
        &self,
        chain: Option<&ProviderChain>,
        user_id: &str,
        req: &AddFood,
    ) -> FoodResult<FoodLogEntry> {
        let quantity = validate_quantity(req.quantity)?;
        let unit: Unit = req.unit.parse()?;
        let meal_type = validate_meal_type(&req.meal_type)?;
        if req.food_name.trim().is_empty() {
            return Err(FoodError::validation("Food name is required"));
        }
        let date = match req.date.as_deref() {
            Some(d) => parse_date(d)?,
            None => Local::now().date_naive(),
        };

        let food = self.resolve_food(chain, &req.food_name)?;
        let grams = to_grams(&food.profile(), quantity, unit)?;
        let macros = scale_macros(&food.macros, grams);
        debug!(food = %food.name, grams, calories = macros.calories, "logging food");

        Ok(self.db.insert_food_log(&NewFoodLogEntry {
            user_id: user_id.to_string(),
            food_id: food.id,
            food_name: food.name,
            quantity,
            unit: unit.to_string(),
            grams,
            macros,
            meal_type,
            date,
        })?)
    }

    pub fn logs_for_date(&self, user_id: &str, date: NaiveDate) -> FoodResult<Vec<FoodLogEntry>> {
        Ok(self.db.get_food_logs_for_date(user_id, date)?)
    }

    /// Explicit edit. Grams and macros are recomputed from the food's
    /// current record. `None` when the entry does not exist.
    pub fn update_log(
        &self,
        user_id: &str,
        id: i64,
        update: &UpdateFoodLog,
    ) -> FoodResult<Option<FoodLogEntry>> {
        let quantity = update.quantity.map(validate_quantity).transpose()?;
        let unit = update
            .unit
            .as_deref()
            .map(str::parse::<Unit>)
            .transpose()?;
        let meal_type = update
            .meal_type
            .as_deref()
            .map(validate_meal_type)
            .transpose()?;

        let Some(current) = self.db.get_food_log(user_id, id)? else {
            return Ok(None);
        };
        let food = self.db.get_food_master_by_id(current.food_id)?;

        let quantity = quantity.unwrap_or(current.quantity);
        let unit = match unit {
            Some(unit) => unit,
            None => current.unit.parse()?,
        };
        let grams = to_grams(&food.profile(), quantity, unit)?;
        let macros = scale_macros(&food.macros, grams);

        Ok(self.db.update_food_log(
            user_id,
            id,
            &UpdateFoodLogEntry {
                quantity,
                unit: unit.to_string(),
                grams,
                macros,
                meal_type: meal_type.unwrap_or(current.meal_type),
            },
        )?)
    }

    pub fn delete_log(&self, user_id: &str, id: i64) -> FoodResult<bool> {
        Ok(self.db.delete_food_log(user_id, id)?)
    }

    pub fn daily_totals(&self, user_id: &str, date: NaiveDate) -> FoodResult<DailyTotals> {
        Ok(self.db.get_daily_totals(user_id, date)?)
    }

    /// Seven days ending at `end`, oldest first. Days without logs are zero.
    pub fn weekly_calories(&self, user_id: &str, end: NaiveDate) -> FoodResult<Vec<DayCalories>> {
        let start = end
            .checked_sub_days(Days::new(6))
            .ok_or_else(|| FoodError::validation("Date out of range"))?;
        let by_day = self.db.get_calories_by_day(user_id, start, end)?;
        Ok(start
            .iter_days()
            .take(7)
            .map(|d| {
                let date = d.format("%Y-%m-%d").to_string();
                let calories = by_day.get(&date).copied().unwrap_or(0);
                DayCalories { date, calories }
            })
            .collect())
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> FoodResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| FoodError::Validation(format!("Invalid date '{s}'. Expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Macros;
    use crate::providers::tests::{MockProvider, Reply};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    const FOODS: &str = r#"{"foods": [
        {"id": 1, "name": "Idli", "category": "breakfast", "calories": 58, "protein": 2, "carbs": 12, "fats": 0.4, "aliases": ["steamed rice cake"]},
        {"id": 2, "name": "Rava Idli", "calories": 140, "protein": 4, "carbs": 20, "fats": 5},
        {"id": 3, "name": "Masala Chai", "category": "beverage", "servingUnit": "100ml", "calories": 40, "protein": 1.2, "carbs": 6, "fats": 1.1},
        {"id": 4, "name": "Boiled Egg", "category": "protein", "calories": 155, "protein": 13, "carbs": 1.1, "fats": 11}
    ]}"#;

    fn service() -> (ThaliService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foods.json");
        std::fs::write(&path, FOODS).unwrap();
        let svc = ThaliService::with_parts(
            Database::open_in_memory().unwrap(),
            DatasetCache::new(&path),
        );
        (svc, dir)
    }

    fn add(food: &str, quantity: f64, unit: &str, meal: &str) -> AddFood {
        AddFood {
            food_name: food.to_string(),
            quantity,
            unit: unit.to_string(),
            meal_type: meal.to_string(),
            date: Some("2026-03-02".to_string()),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_suggest_ranks_and_limits() {
        let (svc, _dir) = service();
        let results = svc.suggest("idli", None);
        let names: Vec<&str> = results.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Idli", "Rava Idli"]);
        assert!(results.iter().all(|s| s.source == SOURCE_DATASET));

        assert_eq!(svc.suggest("idli", Some(1)).len(), 1);
        assert_eq!(svc.suggest("idli", Some(0)).len(), 1);
        assert!(svc.suggest("", None).is_empty());
    }

    #[test]
    fn test_add_two_idlis() {
        let (svc, _dir) = service();
        let entry = svc
            .add_food(None, "asha", &add("Idli", 2.0, "piece", "Breakfast"))
            .unwrap();
        assert!((entry.grams - 110.0).abs() < f64::EPSILON);
        assert_eq!(entry.calories, 64);
        assert_eq!(entry.unit, "piece");
        assert_eq!(entry.meal_type, "breakfast");
        assert_eq!(entry.date, "2026-03-02");
        assert_eq!(entry.food_name, "idli");
    }

    #[test]
    fn test_add_liquid_by_glass() {
        let (svc, _dir) = service();
        let entry = svc
            .add_food(None, "asha", &add("masala chai", 1.0, "glass", "evening_snack"))
            .unwrap();
        assert!((entry.grams - 250.0).abs() < f64::EPSILON);
        assert_eq!(entry.calories, 100);
    }

    #[test]
    fn test_add_validates_before_resolving() {
        let (svc, _dir) = service();
        let mock = MockProvider::new("mock", Reply::Found(Macros::default()));
        let calls = Arc::clone(&mock.calls);
        let chain = ProviderChain::new(vec![Box::new(mock)]);

        for req in [
            add("pizza", 0.0, "g", "lunch"),
            add("pizza", -2.0, "g", "lunch"),
            add("pizza", 1.0, "tablespoon", "lunch"),
            add("pizza", 1.0, "g", "brunch"),
            add("  ", 1.0, "g", "lunch"),
            AddFood {
                date: Some("02/03/2026".to_string()),
                ..add("pizza", 1.0, "g", "lunch")
            },
        ] {
            let err = svc.add_food(Some(&chain), "asha", &req).unwrap_err();
            assert!(matches!(err, FoodError::Validation(_)), "{req:?}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(svc.db.count_food_masters().unwrap(), 0);
    }

    #[test]
    fn test_add_unknown_food_without_chain() {
        let (svc, _dir) = service();
        let err = svc
            .add_food(None, "asha", &add("pizza", 100.0, "g", "lunch"))
            .unwrap_err();
        assert!(matches!(err, FoodError::NotInCatalog(_)));
    }

    #[test]
    fn test_logged_snapshot_survives_record_change() {
        let (svc, _dir) = service();
        let entry = svc
            .add_food(None, "asha", &add("idli", 100.0, "g", "lunch"))
            .unwrap();
        let food = svc.resolve_food(None, "idli").unwrap();
        svc.db
            .update_food_master_macros(
                food.id,
                &Macros {
                    calories: 200.0,
                    ..food.macros
                },
                "usda",
            )
            .unwrap();
        let logs = svc.logs_for_date("asha", day(2)).unwrap();
        assert_eq!(logs[0].id, entry.id);
        assert_eq!(logs[0].calories, 58);
    }

    #[test]
    fn test_update_log_recomputes_from_current_record() {
        let (svc, _dir) = service();
        let entry = svc
            .add_food(None, "asha", &add("idli", 2.0, "piece", "breakfast"))
            .unwrap();

        let updated = svc
            .update_log(
                "asha",
                entry.id,
                &UpdateFoodLog {
                    quantity: Some(3.0),
                    ..UpdateFoodLog::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!((updated.grams - 165.0).abs() < f64::EPSILON);
        assert_eq!(updated.calories, 96);
        assert_eq!(updated.unit, "piece");
        assert_eq!(updated.meal_type, "breakfast");

        let updated = svc
            .update_log(
                "asha",
                entry.id,
                &UpdateFoodLog {
                    unit: Some("g".to_string()),
                    meal_type: Some("dinner".to_string()),
                    ..UpdateFoodLog::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!((updated.grams - 3.0).abs() < f64::EPSILON);
        assert_eq!(updated.meal_type, "dinner");

        assert!(svc.update_log("ravi", entry.id, &UpdateFoodLog::default()).unwrap().is_none());
        let bad = UpdateFoodLog {
            unit: Some("spoon".to_string()),
            ..UpdateFoodLog::default()
        };
        assert!(matches!(
            svc.update_log("asha", entry.id, &bad),
            Err(FoodError::Validation(_))
        ));
    }

    #[test]
    fn test_delete_and_totals() {
        let (svc, _dir) = service();
        let a = svc
            .add_food(None, "asha", &add("idli", 2.0, "piece", "breakfast"))
            .unwrap();
        svc.add_food(None, "asha", &add("boiled egg", 1.0, "piece", "breakfast"))
            .unwrap();

        let totals = svc.daily_totals("asha", day(2)).unwrap();
        assert_eq!(totals.calories, 64 + 78);
        assert_eq!(totals.entries, 2);

        assert!(svc.delete_log("asha", a.id).unwrap());
        assert!(!svc.delete_log("asha", a.id).unwrap());
        assert_eq!(svc.daily_totals("asha", day(2)).unwrap().calories, 78);
    }

    #[test]
    fn test_oversized_portion_leaves_totals_readable() {
        let (svc, _dir) = service();
        for _ in 0..2 {
            assert!(matches!(
                svc.add_food(None, "asha", &add("boiled egg", 1e307, "cup", "dinner")),
                Err(FoodError::Validation(_))
            ));
        }
        let entry = svc
            .add_food(None, "asha", &add("boiled egg", 1.0, "piece", "dinner"))
            .unwrap();
        let huge = UpdateFoodLog {
            quantity: Some(9_999.0),
            unit: Some("bowl".to_string()),
            meal_type: None,
        };
        assert!(matches!(
            svc.update_log("asha", entry.id, &huge),
            Err(FoodError::Validation(_))
        ));

        let totals = svc.daily_totals("asha", day(2)).unwrap();
        assert_eq!(totals.entries, 1);
        assert_eq!(totals.calories, 78);
        assert_eq!(svc.weekly_calories("asha", day(2)).unwrap().len(), 7);
    }

    #[test]
    fn test_weekly_calories_fills_gaps() {
        let (svc, _dir) = service();
        svc.add_food(None, "asha", &add("idli", 100.0, "g", "lunch"))
            .unwrap();
        let week = svc.weekly_calories("asha", day(5)).unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, "2026-02-27");
        assert_eq!(week[6].date, "2026-03-05");
        let logged: Vec<(&str, i64)> = week
            .iter()
            .filter(|d| d.calories > 0)
            .map(|d| (d.date.as_str(), d.calories))
            .collect();
        assert_eq!(logged, vec![("2026-03-02", 58)]);
    }

    #[test]
    fn test_provider_resolved_food_logs() {
        let (svc, _dir) = service();
        let chain = ProviderChain::new(vec![Box::new(MockProvider::new(
            "usda",
            Reply::Found(Macros {
                calories: 266.0,
                protein: 11.0,
                carbs: 33.0,
                fats: 10.0,
            }),
        ))]);
        let entry = svc
            .add_food(Some(&chain), "asha", &add("Pizza", 1.0, "piece", "dinner"))
            .unwrap();
        assert!((entry.grams - 50.0).abs() < f64::EPSILON);
        assert_eq!(entry.calories, 133);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2026-03-02").unwrap(), day(2));
        assert!(matches!(parse_date("yesterday"), Err(FoodError::Validation(_))));
    }
}
