//! CalorieNinjas natural-language nutrition lookup.
//!
//! Items are reported per serving, so values are rescaled to 100 g using
//! the item's serving size.

use serde::Deserialize;

use super::{ProviderResult, RawMacros, lenient_f64, normalize_macros};

pub const SOURCE: &str = "calorieninjas";
pub const NUTRITION_URL: &str = "https://api.calorieninjas.com/v1/nutrition";

#[derive(Debug, Default, Deserialize)]
pub struct NutritionResponse {
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub serving_size_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbohydrates_total_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat_total_g: Option<f64>,
}

/// Ask for a 100 g portion so the answer is usually per-100g already.
#[must_use]
pub fn query_for(food: &str) -> String {
    format!("100g {food}")
}

/// Rescale the first item to 100 g. A missing or zero serving size means
/// 100 g; a negative one is rejected. All four values are required.
#[must_use]
pub fn normalize_item(item: &Item) -> Option<ProviderResult> {
    let serving = match item.serving_size_g {
        Some(s) if s > 0.0 => s,
        Some(s) if s < 0.0 => return None,
        _ => 100.0,
    };
    let scale = 100.0 / serving;
    let raw = RawMacros {
        calories: Some(item.calories? * scale),
        protein: Some(item.protein_g? * scale),
        carbs: Some(item.carbohydrates_total_g? * scale),
        fats: Some(item.fat_total_g? * scale),
    };
    normalize_macros(raw, SOURCE)
}

#[must_use]
pub fn normalize_response(resp: &NutritionResponse) -> Option<ProviderResult> {
    resp.items.first().and_then(normalize_item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> NutritionResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_query_prefix() {
        assert_eq!(query_for("upma"), "100g upma");
    }

    #[test]
    fn test_scales_to_100g() {
        let resp = parse(
            r#"{"items": [{"name": "rice", "serving_size_g": 200, "calories": 260,
                "protein_g": 5.4, "carbohydrates_total_g": 56.4, "fat_total_g": 0.6}]}"#,
        );
        let r = normalize_response(&resp).unwrap();
        assert_eq!(r.source, SOURCE);
        assert!((r.macros.calories - 130.0).abs() < 1e-9);
        assert!((r.macros.protein - 2.7).abs() < 1e-9);
        assert!((r.macros.carbs - 28.2).abs() < 1e-9);
        assert!((r.macros.fats - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_zero_or_missing_serving_is_100g() {
        let resp = parse(
            r#"{"items": [{"serving_size_g": 0, "calories": 97,
                "protein_g": 3.1, "carbohydrates_total_g": 20, "fat_total_g": 0.1}]}"#,
        );
        let r = normalize_response(&resp).unwrap();
        assert!((r.macros.calories - 97.0).abs() < 1e-9);

        let resp = parse(
            r#"{"items": [{"calories": "97", "protein_g": 3.1,
                "carbohydrates_total_g": 20, "fat_total_g": 0.1}]}"#,
        );
        assert!(normalize_response(&resp).is_some());
    }

    #[test]
    fn test_negative_serving_rejected() {
        let resp = parse(
            r#"{"items": [{"serving_size_g": -5, "calories": 97,
                "protein_g": 3.1, "carbohydrates_total_g": 20, "fat_total_g": 0.1}]}"#,
        );
        assert!(normalize_response(&resp).is_none());
    }

    #[test]
    fn test_missing_field_or_no_items() {
        let resp = parse(
            r#"{"items": [{"calories": 97, "protein_g": 3.1, "carbohydrates_total_g": 20}]}"#,
        );
        assert!(normalize_response(&resp).is_none());
        assert!(normalize_response(&parse(r#"{"items": []}"#)).is_none());
    }
}
