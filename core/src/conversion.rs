//! Grams-per-unit factors for household measures.
//!
//! Food-specific piece weights take priority over category defaults, which
//! take priority over the generic defaults.

use serde::Serialize;

use crate::dataset::DatasetEntry;
use crate::text::{normalize, tokens};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConversionProfile {
    pub grams_per_cup: f64,
    pub grams_per_bowl: f64,
    pub grams_per_piece: f64,
    pub grams_per_glass: f64,
    pub grams_per_katori: f64,
}

impl Default for ConversionProfile {
    fn default() -> Self {
        Self {
            grams_per_cup: 240.0,
            grams_per_bowl: 300.0,
            grams_per_piece: 50.0,
            grams_per_glass: 250.0,
            grams_per_katori: 150.0,
        }
    }
}

impl ConversionProfile {
    /// Defaults for drinks and other pourable foods, roughly 1 g per ml.
    pub const LIQUID: Self = Self {
        grams_per_cup: 240.0,
        grams_per_bowl: 250.0,
        grams_per_piece: LIQUID_PIECE_GRAMS,
        grams_per_glass: 250.0,
        grams_per_katori: 120.0,
    };

    #[must_use]
    pub fn get(&self, field: ConversionField) -> f64 {
        match field {
            ConversionField::Cup => self.grams_per_cup,
            ConversionField::Bowl => self.grams_per_bowl,
            ConversionField::Piece => self.grams_per_piece,
            ConversionField::Glass => self.grams_per_glass,
            ConversionField::Katori => self.grams_per_katori,
        }
    }
}

const GENERIC_PIECE_GRAMS: f64 = 50.0;
const LIQUID_PIECE_GRAMS: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionField {
    Cup,
    Bowl,
    Piece,
    Glass,
    Katori,
}

impl ConversionField {
    pub const ALL: [Self; 5] = [Self::Cup, Self::Bowl, Self::Piece, Self::Glass, Self::Katori];

    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Cup => "grams_per_cup",
            Self::Bowl => "grams_per_bowl",
            Self::Piece => "grams_per_piece",
            Self::Glass => "grams_per_glass",
            Self::Katori => "grams_per_katori",
        }
    }
}

/// Conversion factors as persisted. `None`, zero, negative and non-finite
/// all mean "unset".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StoredConversion {
    pub grams_per_cup: Option<f64>,
    pub grams_per_bowl: Option<f64>,
    pub grams_per_piece: Option<f64>,
    pub grams_per_glass: Option<f64>,
    pub grams_per_katori: Option<f64>,
}

impl From<ConversionProfile> for StoredConversion {
    fn from(p: ConversionProfile) -> Self {
        Self {
            grams_per_cup: Some(p.grams_per_cup),
            grams_per_bowl: Some(p.grams_per_bowl),
            grams_per_piece: Some(p.grams_per_piece),
            grams_per_glass: Some(p.grams_per_glass),
            grams_per_katori: Some(p.grams_per_katori),
        }
    }
}

#[must_use]
pub fn is_set(value: Option<f64>) -> bool {
    value.is_some_and(|v| v.is_finite() && v > 0.0)
}

impl StoredConversion {
    #[must_use]
    pub fn get(&self, field: ConversionField) -> Option<f64> {
        match field {
            ConversionField::Cup => self.grams_per_cup,
            ConversionField::Bowl => self.grams_per_bowl,
            ConversionField::Piece => self.grams_per_piece,
            ConversionField::Glass => self.grams_per_glass,
            ConversionField::Katori => self.grams_per_katori,
        }
    }

    pub fn set(&mut self, field: ConversionField, value: f64) {
        let slot = match field {
            ConversionField::Cup => &mut self.grams_per_cup,
            ConversionField::Bowl => &mut self.grams_per_bowl,
            ConversionField::Piece => &mut self.grams_per_piece,
            ConversionField::Glass => &mut self.grams_per_glass,
            ConversionField::Katori => &mut self.grams_per_katori,
        };
        *slot = Some(value);
    }

    #[must_use]
    pub fn missing_fields(&self) -> Vec<ConversionField> {
        ConversionField::ALL
            .into_iter()
            .filter(|f| !is_set(self.get(*f)))
            .collect()
    }

    /// Values for the unset fields only. Set fields, including custom
    /// values, are never part of the result.
    #[must_use]
    pub fn backfill(&self, inferred: &ConversionProfile) -> Vec<(ConversionField, f64)> {
        self.missing_fields()
            .into_iter()
            .map(|f| (f, inferred.get(f)))
            .collect()
    }

    #[must_use]
    pub fn complete_with(&self, fallback: &ConversionProfile) -> ConversionProfile {
        let pick = |f: ConversionField| match self.get(f) {
            v @ Some(_) if is_set(v) => v.unwrap_or_default(),
            _ => fallback.get(f),
        };
        ConversionProfile {
            grams_per_cup: pick(ConversionField::Cup),
            grams_per_bowl: pick(ConversionField::Bowl),
            grams_per_piece: pick(ConversionField::Piece),
            grams_per_glass: pick(ConversionField::Glass),
            grams_per_katori: pick(ConversionField::Katori),
        }
    }
}

/// Keyword phrases and the average weight of one piece. Checked in order;
/// stuffed breads come before plain flatbreads.
const PIECE_RULES: &[(&[&str], f64)] = &[
    (&["egg"], 50.0),
    (&["idli"], 55.0),
    (&["dosa"], 100.0),
    (
        &[
            "aloo paratha",
            "gobi paratha",
            "paneer paratha",
            "mooli paratha",
            "stuffed paratha",
            "kulcha",
        ],
        80.0,
    ),
    (&["paratha"], 80.0),
    (&["chapati", "chapathi", "roti", "phulka", "bhakri", "thepla"], 40.0),
    (&["naan"], 90.0),
    (&["puri", "poori"], 25.0),
    (&["vada", "medu vada"], 40.0),
    (&["samosa"], 60.0),
    (&["banana"], 118.0),
    (&["apple"], 182.0),
    (&["orange"], 131.0),
    (&["mango"], 200.0),
    (&["guava"], 100.0),
    (&["pear"], 178.0),
    (&["kiwi"], 75.0),
    (&["bread", "bread slice", "toast"], 30.0),
    (&["pav", "bun"], 45.0),
    (&["donut", "doughnut"], 50.0),
    (&["muffin", "croissant"], 60.0),
    (&["cake", "cake slice", "pastry"], 90.0),
];

/// Piece weight from the first keyword rule that matches a whole word (or
/// its plural) in the food name.
#[must_use]
pub fn piece_weight(name: &str) -> Option<f64> {
    let padded = format!(" {} ", normalize(name));
    PIECE_RULES.iter().find_map(|(keywords, grams)| {
        keywords
            .iter()
            .any(|kw| {
                padded.contains(&format!(" {kw} "))
                    || padded.contains(&format!(" {kw}s "))
                    || padded.contains(&format!(" {kw}es "))
            })
            .then_some(*grams)
    })
}

const VOLUME_UNITS: &[&str] = &[
    "ml", "l", "litre", "litres", "liter", "liters", "cup", "cups", "glass", "glasses", "floz",
];

const BEVERAGE_HINTS: &[&str] = &[
    "beverage", "drink", "juice", "milk", "shake", "smoothie", "soup", "tea", "coffee", "lassi",
];

/// Serving unit names a volume, or the category names a drink.
#[must_use]
pub fn is_liquid(entry: &DatasetEntry) -> bool {
    let unit = entry.serving_unit.to_lowercase();
    let unit_words: Vec<&str> = unit
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();
    let volume_unit = unit_words.iter().any(|w| VOLUME_UNITS.contains(w))
        || unit_words.windows(2).any(|w| w == ["fl", "oz"]);

    let category = normalize(&entry.category);
    let beverage = tokens(&category).any(|w| BEVERAGE_HINTS.iter().any(|h| w.starts_with(h)));

    volume_unit || beverage
}

/// Conversion profile for a food, from its catalog match if there is one.
#[must_use]
pub fn infer_profile(entry: Option<&DatasetEntry>) -> ConversionProfile {
    let Some(entry) = entry else {
        return ConversionProfile::default();
    };
    let liquid = is_liquid(entry);
    let base = if liquid {
        ConversionProfile::LIQUID
    } else {
        ConversionProfile::default()
    };
    let grams_per_piece = piece_weight(&entry.name).unwrap_or(if liquid {
        LIQUID_PIECE_GRAMS
    } else {
        GENERIC_PIECE_GRAMS
    });
    ConversionProfile {
        grams_per_piece,
        ..base
    }
}
