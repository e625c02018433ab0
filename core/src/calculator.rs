use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::conversion::ConversionProfile;
use crate::error::{FoodError, FoodResult};
use crate::models::{LoggedMacros, Macros};

pub const UNIT_NAMES: &[&str] = &["g", "cup", "bowl", "piece", "glass", "katori"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[serde(rename = "g")]
    Grams,
    Cup,
    Bowl,
    Piece,
    Glass,
    Katori,
}

impl FromStr for Unit {
    type Err = FoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Ok(Self::Grams),
            "cup" | "cups" => Ok(Self::Cup),
            "bowl" | "bowls" => Ok(Self::Bowl),
            "piece" | "pieces" | "pc" | "pcs" => Ok(Self::Piece),
            "glass" | "glasses" => Ok(Self::Glass),
            "katori" | "katoris" => Ok(Self::Katori),
            _ => Err(FoodError::Validation(format!(
                "Invalid unit '{s}'. Must be one of: {}",
                UNIT_NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Grams => "g",
            Self::Cup => "cup",
            Self::Bowl => "bowl",
            Self::Piece => "piece",
            Self::Glass => "glass",
            Self::Katori => "katori",
        };
        f.write_str(name)
    }
}

/// Largest quantity accepted for any unit.
pub const MAX_QUANTITY: f64 = 10_000.0;

/// Largest single portion, in grams, that can be logged.
pub const MAX_PORTION_GRAMS: f64 = 100_000.0;

/// Ceiling for one logged macro value. Keeps per-day sums far from `i64`
/// overflow in SQLite.
const MAX_LOGGED_VALUE: f64 = 1_000_000_000.0;

pub fn validate_quantity(quantity: f64) -> FoodResult<f64> {
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(FoodError::validation("Quantity must be a positive number"));
    }
    if quantity > MAX_QUANTITY {
        return Err(FoodError::Validation(format!(
            "Quantity must not exceed {MAX_QUANTITY}"
        )));
    }
    Ok(quantity)
}

/// Weight in grams of `quantity` units, rounded to two decimals.
pub fn to_grams(profile: &ConversionProfile, quantity: f64, unit: Unit) -> FoodResult<f64> {
    let quantity = validate_quantity(quantity)?;
    let per_unit = match unit {
        Unit::Grams => 1.0,
        Unit::Cup => profile.grams_per_cup,
        Unit::Bowl => profile.grams_per_bowl,
        Unit::Piece => profile.grams_per_piece,
        Unit::Glass => profile.grams_per_glass,
        Unit::Katori => profile.grams_per_katori,
    };
    let grams = crate::providers::round2(quantity * per_unit);
    if !grams.is_finite() || grams > MAX_PORTION_GRAMS {
        return Err(FoodError::Validation(format!(
            "Portion of {quantity} {unit} is larger than {MAX_PORTION_GRAMS} g"
        )));
    }
    Ok(grams)
}

/// Scale per-100g macros to a portion. Whole units, half away from zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn scale_macros(per_100g: &Macros, grams: f64) -> LoggedMacros {
    let factor = grams / 100.0;
    // NaN casts to 0; the clamp bounds everything else.
    let scale = |v: f64| (v * factor).round().clamp(0.0, MAX_LOGGED_VALUE) as i64;
    LoggedMacros {
        calories: scale(per_100g.calories),
        protein: scale(per_100g.protein),
        carbs: scale(per_100g.carbs),
        fats: scale(per_100g.fats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parsing() {
        assert_eq!("g".parse::<Unit>().unwrap(), Unit::Grams);
        assert_eq!("Grams".parse::<Unit>().unwrap(), Unit::Grams);
        assert_eq!(" cups ".parse::<Unit>().unwrap(), Unit::Cup);
        assert_eq!("pcs".parse::<Unit>().unwrap(), Unit::Piece);
        assert_eq!("GLASS".parse::<Unit>().unwrap(), Unit::Glass);
        assert_eq!("katori".parse::<Unit>().unwrap(), Unit::Katori);
        assert_eq!("bowls".parse::<Unit>().unwrap(), Unit::Bowl);
    }

    #[test]
    fn test_unknown_unit_rejected() {
        for bad in ["tablespoon", "oz", "", "kg", "plate"] {
            assert!(
                matches!(bad.parse::<Unit>(), Err(FoodError::Validation(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_unit_display_round_trips() {
        for name in UNIT_NAMES {
            let unit: Unit = name.parse().unwrap();
            assert_eq!(unit.to_string(), *name);
        }
    }

    #[test]
    fn test_to_grams() {
        let p = ConversionProfile::default();
        assert!((to_grams(&p, 150.0, Unit::Grams).unwrap() - 150.0).abs() < f64::EPSILON);
        assert!((to_grams(&p, 1.5, Unit::Cup).unwrap() - 360.0).abs() < f64::EPSILON);
        assert!((to_grams(&p, 2.0, Unit::Katori).unwrap() - 300.0).abs() < f64::EPSILON);
        assert!((to_grams(&p, 1.0, Unit::Glass).unwrap() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_grams_rejects_bad_quantity() {
        let p = ConversionProfile::default();
        for q in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                to_grams(&p, q, Unit::Piece),
                Err(FoodError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_quantity_upper_bound() {
        let p = ConversionProfile::default();
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(matches!(
            validate_quantity(MAX_QUANTITY + 1.0),
            Err(FoodError::Validation(_))
        ));
        assert!(matches!(
            to_grams(&p, 1e307, Unit::Cup),
            Err(FoodError::Validation(_))
        ));
    }

    #[test]
    fn test_portion_weight_bound() {
        let heavy = ConversionProfile {
            grams_per_bowl: 1e305,
            ..ConversionProfile::default()
        };
        assert!(matches!(
            to_grams(&heavy, 2.0, Unit::Bowl),
            Err(FoodError::Validation(_))
        ));
        let p = ConversionProfile::default();
        assert!(to_grams(&p, MAX_PORTION_GRAMS, Unit::Grams).is_ok());
        assert!(to_grams(&p, 1000.0, Unit::Cup).is_err());
    }

    #[test]
    fn test_scale_macros_never_saturates() {
        let per_100g = Macros {
            calories: 900.0,
            protein: 100.0,
            carbs: 0.0,
            fats: 0.0,
        };
        let m = scale_macros(&per_100g, f64::INFINITY);
        assert!(m.calories < i64::MAX / 1_000);
        assert_eq!(scale_macros(&per_100g, f64::NAN).calories, 0);
    }

    #[test]
    fn test_scale_macros_rounds_to_whole_units() {
        let per_100g = Macros {
            calories: 130.0,
            protein: 2.7,
            carbs: 28.2,
            fats: 0.3,
        };
        let m = scale_macros(&per_100g, 150.0);
        assert_eq!(
            m,
            LoggedMacros {
                calories: 195,
                protein: 4,
                carbs: 42,
                fats: 0,
            }
        );
    }

    /// Two idlis: 55 g each, 58 kcal per 100 g.
    #[test]
    fn test_idli_portion() {
        let profile = ConversionProfile {
            grams_per_piece: 55.0,
            ..ConversionProfile::default()
        };
        let grams = to_grams(&profile, 2.0, Unit::Piece).unwrap();
        assert!((grams - 110.0).abs() < f64::EPSILON);
        let per_100g = Macros {
            calories: 58.0,
            protein: 2.0,
            carbs: 12.0,
            fats: 0.4,
        };
        let m = scale_macros(&per_100g, grams);
        assert_eq!(m.calories, 64);
        assert_eq!(m.protein, 2);
        assert_eq!(m.carbs, 13);
        assert_eq!(m.fats, 0);
    }
}
