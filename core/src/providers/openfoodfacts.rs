//! Open Food Facts product search.
//!
//! Products carry per-100g nutriments, with energy in kcal or only in kJ.
//! The first product whose nutriments are complete and within bounds is used.

use serde::Deserialize;

use super::{ProviderResult, RawMacros, lenient_f64, normalize_macros};

pub const SOURCE: &str = "openfoodfacts";
pub const SEARCH_URL: &str = "https://world.openfoodfacts.org/cgi/search.pl";
pub const PAGE_SIZE: u32 = 20;

const KJ_PER_KCAL: f64 = 4.184;

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub products: Vec<ProductData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g", default, deserialize_with = "lenient_f64")]
    pub energy_kcal_100g: Option<f64>,
    /// Energy in kJ.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub energy_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub proteins_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbohydrates_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat_100g: Option<f64>,
}

/// Query parameters for a search.
#[must_use]
pub fn search_params(food: &str) -> Vec<(&'static str, String)> {
    vec![
        ("search_terms", food.to_string()),
        ("search_simple", "1".to_string()),
        ("action", "process".to_string()),
        ("json", "1".to_string()),
        ("page_size", PAGE_SIZE.to_string()),
    ]
}

/// Per-100g values of a product when all four are present. Calories fall
/// back to the kJ energy figure.
#[must_use]
pub fn product_macros(p: &ProductData) -> Option<RawMacros> {
    let n = p.nutriments.as_ref()?;
    let calories = n
        .energy_kcal_100g
        .or_else(|| n.energy_100g.map(|kj| kj / KJ_PER_KCAL))?;
    Some(RawMacros {
        calories: Some(calories),
        protein: Some(n.proteins_100g?),
        carbs: Some(n.carbohydrates_100g?),
        fats: Some(n.fat_100g?),
    })
}

/// First complete product in result order.
#[must_use]
pub fn normalize_search(resp: &SearchResponse) -> Option<ProviderResult> {
    resp.products
        .iter()
        .find_map(|p| product_macros(p).and_then(|raw| normalize_macros(raw, SOURCE)))
}
