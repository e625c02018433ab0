//! External nutrition lookups tried in priority order.
//!
//! Each provider turns its own response shape into per-100g macros and runs
//! them through [`normalize_macros`]. The chain only reports an error when
//! every provider has been tried.

pub mod calorieninjas;
pub mod gemini;
pub mod openfoodfacts;
pub mod usda;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{FoodError, FoodResult};
use crate::models::Macros;

pub const MAX_CALORIES_PER_100G: f64 = 900.0;
pub const MAX_MACRO_GRAMS_PER_100G: f64 = 100.0;

/// Order used when no explicit order is configured.
pub const DEFAULT_PROVIDER_ORDER: &[&str] = &[
    gemini::SOURCE,
    usda::SOURCE,
    calorieninjas::SOURCE,
    openfoodfacts::SOURCE,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub macros: Macros,
    pub source: String,
}

/// Per-100g values as a provider reported them, before validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMacros {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
}

/// Validate and round provider values.
///
/// Protein is required; carbs and fats default to zero. Missing calories
/// are derived as `protein*4 + carbs*4 + fats*9` and the result is rejected
/// when that comes out as zero. Values outside the per-100g bounds are
/// rejected. Output is rounded to two decimals.
#[must_use]
pub fn normalize_macros(raw: RawMacros, source: &str) -> Option<ProviderResult> {
    let protein = raw.protein?;
    let carbs = raw.carbs.unwrap_or(0.0);
    let fats = raw.fats.unwrap_or(0.0);
    let calories = match raw.calories {
        Some(c) => c,
        None => {
            let derived = kcal_from_macros(protein, carbs, fats);
            if derived > 0.0 {
                derived
            } else {
                return None;
            }
        }
    };
    let macros = Macros {
        calories,
        protein,
        carbs,
        fats,
    };
    within_bounds(&macros).then(|| ProviderResult {
        macros: macros.rounded(),
        source: source.to_string(),
    })
}

#[must_use]
pub fn kcal_from_macros(protein: f64, carbs: f64, fats: f64) -> f64 {
    protein * 4.0 + carbs * 4.0 + fats * 9.0
}

/// Plausibility guard for per-100g values. NaN never passes.
#[must_use]
pub fn within_bounds(m: &Macros) -> bool {
    (0.0..=MAX_CALORIES_PER_100G).contains(&m.calories)
        && (0.0..=MAX_MACRO_GRAMS_PER_100G).contains(&m.protein)
        && (0.0..=MAX_MACRO_GRAMS_PER_100G).contains(&m.carbs)
        && (0.0..=MAX_MACRO_GRAMS_PER_100G).contains(&m.fats)
}

/// Round to two decimal places.
#[must_use]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Accepts numbers, numeric strings and null for optional numeric fields;
/// external payloads are not consistent about which they send.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(crate::dataset::to_num))
}

/// One external nutrition source.
///
/// `fetch` returns `Ok(None)` for a normal miss (nothing found, nothing
/// plausible) and `Err` for transport-level trouble: network errors,
/// timeouts, bad status codes, unparsable bodies.
pub trait NutritionProvider: Send + Sync {
    /// Source tag stored on records this provider resolves.
    fn name(&self) -> &str;

    /// Providers without credentials are skipped, not counted as failures.
    fn is_configured(&self) -> bool {
        true
    }

    fn fetch(&self, food: &str) -> Result<Option<ProviderResult>>;
}

#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn NutritionProvider>>,
}

impl ProviderChain {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn NutritionProvider>>) -> Self {
        Self { providers }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    /// First plausible result in provider order.
    ///
    /// Exhaustion is `NotInCatalog` when every provider answered cleanly
    /// and `ProviderUnavailable` when at least one of them failed.
    pub fn resolve(&self, food: &str) -> FoodResult<ProviderResult> {
        let food = food.trim().to_lowercase();
        if food.is_empty() {
            return Err(FoodError::validation("Food name is required"));
        }

        let mut failed = 0usize;
        for provider in &self.providers {
            let name = provider.name();
            if !provider.is_configured() {
                debug!(provider = name, "skipping provider without credentials");
                continue;
            }
            match provider.fetch(&food) {
                Ok(Some(result)) if within_bounds(&result.macros) => {
                    debug!(provider = name, food = %food, "nutrition resolved");
                    return Ok(ProviderResult {
                        macros: result.macros.rounded(),
                        source: result.source,
                    });
                }
                Ok(Some(result)) => {
                    warn!(provider = name, food = %food, ?result, "discarding implausible nutrition values");
                }
                Ok(None) => debug!(provider = name, food = %food, "no nutrition result"),
                Err(e) => {
                    warn!(provider = name, food = %food, "nutrition lookup failed: {e:#}");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            Err(FoodError::ProviderUnavailable(food))
        } else {
            Err(FoodError::NotInCatalog(food))
        }
    }
}
