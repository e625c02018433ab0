//! USDA FoodData Central search results.
//!
//! A search returns many loosely related foods ("rice flour", "rice
//! pudding mix" for "rice"), so hits are ranked before the first one with
//! usable nutrients is taken.

use serde::Deserialize;

use super::{ProviderResult, RawMacros, kcal_from_macros, lenient_f64, normalize_macros};
use crate::text::{normalize, tokens};

pub const SOURCE: &str = "usda";
pub const SEARCH_URL: &str = "https://api.nal.usda.gov/fdc/v1/foods/search";
pub const PAGE_SIZE: u32 = 25;

/// Largest tolerated relative gap between reported and macro-derived kcal.
pub const MAX_KCAL_DELTA: f64 = 1.2;

const BAD_TERMS: &[&str] = &[
    "powder",
    "mix",
    "supplement",
    "extract",
    "concentrate",
    "seasoning",
    "flavor",
    "peel",
    "dehydrated",
];

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub foods: Vec<SearchFood>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFood {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodNutrient {
    #[serde(default)]
    pub nutrient_name: String,
    #[serde(default, deserialize_with = "nutrient_number")]
    pub nutrient_number: String,
    #[serde(default)]
    pub unit_name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
}

fn nutrient_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// How a nutrient is recognised: by number, or by a name fragment, with an
/// optional unit requirement.
struct NutrientKey {
    number: Option<&'static str>,
    name: Option<&'static str>,
    unit: Option<&'static str>,
}

const fn by_number(number: &'static str, unit: Option<&'static str>) -> NutrientKey {
    NutrientKey {
        number: Some(number),
        name: None,
        unit,
    }
}

const fn by_name(name: &'static str, unit: Option<&'static str>) -> NutrientKey {
    NutrientKey {
        number: None,
        name: Some(name),
        unit,
    }
}

const ENERGY: &[NutrientKey] = &[by_number("1008", Some("kcal")), by_name("energy", Some("kcal"))];
const PROTEIN: &[NutrientKey] = &[by_number("1003", None), by_name("protein", None)];
const CARBS: &[NutrientKey] = &[by_number("1005", None), by_name("carbohydrate", None)];
const FAT: &[NutrientKey] = &[
    by_number("1004", None),
    by_name("total lipid (fat)", None),
    by_name("fat", None),
];

#[must_use]
pub fn search_params(food: &str, api_key: &str) -> Vec<(&'static str, String)> {
    vec![
        ("api_key", api_key.to_string()),
        ("query", food.to_string()),
        ("pageSize", PAGE_SIZE.to_string()),
    ]
}

/// Relevance of a search hit for the query. Can be negative.
#[must_use]
pub fn score_candidate(food: &SearchFood, query: &str) -> i32 {
    let name = normalize(&food.description);
    let query = normalize(query);
    let data_type = food.data_type.to_lowercase();

    let mut score = 0;
    if name == query {
        score += 60;
    }
    if name.starts_with(&query) {
        score += 35;
    }
    for t in tokens(&query) {
        if name.contains(t) {
            score += 8;
        }
        if tokens(&name).any(|w| w.starts_with(t)) {
            score += 12;
        }
    }

    score += [("foundation", 5), ("sr legacy", 4), ("survey", 3), ("branded", 1)]
        .iter()
        .filter(|(kind, _)| data_type.contains(kind))
        .map(|(_, bonus)| bonus)
        .sum::<i32>();

    let bad = BAD_TERMS.iter().filter(|t| name.contains(*t)).count();
    score - 4 * i32::try_from(bad).unwrap_or(0)
}

fn nutrient_amount(nutrients: &[FoodNutrient], keys: &[NutrientKey]) -> Option<f64> {
    nutrients.iter().find_map(|n| {
        let name = n.nutrient_name.to_lowercase();
        let unit = n.unit_name.to_lowercase();
        keys.iter()
            .any(|k| {
                let hit = k.name.is_some_and(|want| name.contains(want))
                    || k.number.is_some_and(|want| n.nutrient_number == want);
                hit && k.unit.is_none_or(|want| unit == want)
            })
            .then_some(n.value)
            .flatten()
    })
}

/// Per-100g macros of one food. All four nutrients are required, and the
/// reported energy must roughly agree with the macros.
#[must_use]
pub fn normalize_food(food: &SearchFood) -> Option<ProviderResult> {
    let calories = nutrient_amount(&food.food_nutrients, ENERGY)?;
    let protein = nutrient_amount(&food.food_nutrients, PROTEIN)?;
    let carbs = nutrient_amount(&food.food_nutrients, CARBS)?;
    let fats = nutrient_amount(&food.food_nutrients, FAT)?;

    let derived = kcal_from_macros(protein, carbs, fats);
    if derived > 0.0 && (derived - calories).abs() / derived > MAX_KCAL_DELTA {
        return None;
    }

    normalize_macros(
        RawMacros {
            calories: Some(calories),
            protein: Some(protein),
            carbs: Some(carbs),
            fats: Some(fats),
        },
        SOURCE,
    )
}

/// Best-ranked hit with usable nutrients. Equal scores keep API order.
#[must_use]
pub fn normalize_search(resp: &SearchResponse, query: &str) -> Option<ProviderResult> {
    let mut ranked: Vec<(&SearchFood, i32)> = resp
        .foods
        .iter()
        .map(|f| (f, score_candidate(f, query)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().find_map(|(f, _)| normalize_food(f))
}
