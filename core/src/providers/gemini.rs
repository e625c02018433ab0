//! Nutrition estimates from the Gemini `generateContent` API.
//!
//! The model is asked for a bare JSON object but does not always comply,
//! so the reply is parsed as JSON first and scraped for `key: number`
//! pairs second.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ProviderResult, RawMacros, normalize_macros};
use crate::dataset::to_num;

pub const SOURCE: &str = "gemini";
pub const GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
pub const TEMPERATURE: f64 = 0.1;

const CALORIE_KEYS: &[&str] = &["calories", "kcal", "energy"];
const PROTEIN_KEYS: &[&str] = &["protein", "protein_g"];
const CARB_KEYS: &[&str] = &["carbs", "carbohydrates", "carbohydrate", "carbs_g"];
const FAT_KEYS: &[&str] = &["fats", "fat", "fat_g"];

const NUM: &str = r"([0-9]+(?:\.[0-9]+)?)";
const CALORIE_PATTERNS: &[&str] = &[
    r#"calories?"?\s*[:=]\s*"#,
    r#"kcal"?\s*[:=]?\s*"#,
    r#"energy"?\s*[:=]\s*"#,
];
const PROTEIN_PATTERNS: &[&str] = &[r#"protein(?:_g)?"?\s*[:=]\s*"#, r#"proteins?"?\s*[:=]\s*"#];
const CARB_PATTERNS: &[&str] = &[r#"carbs?(?:_g)?"?\s*[:=]\s*"#, r#"carbohydrates?"?\s*[:=]\s*"#];
const FAT_PATTERNS: &[&str] = &[r#"fats?(?:_g)?"?\s*[:=]\s*"#, r#"lipids?"?\s*[:=]\s*"#];

static CALORIE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(CALORIE_PATTERNS));
static PROTEIN_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(PROTEIN_PATTERNS));
static CARB_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(CARB_PATTERNS));
static FAT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(FAT_PATTERNS));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    pub temperature: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    #[must_use]
    pub fn text(&self) -> &str {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .unwrap_or_default()
    }
}

#[must_use]
pub fn prompt_for(food: &str) -> String {
    format!(
        "You are estimating nutrition for a food log. \
         Interpret \"{food}\" as the closest common edible food item. \
         Return ONLY one JSON object per 100g with numeric keys exactly: calories, protein, carbs, fats. \
         No markdown, no explanations, no units."
    )
}

#[must_use]
pub fn request_for(food: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(prompt_for(food)),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
        },
    }
}

/// Macros from a model reply.
#[must_use]
pub fn parse_reply(text: &str) -> Option<ProviderResult> {
    if let Some(r) = json_object(text).and_then(|v| normalize_macros(from_json(&v), SOURCE)) {
        return Some(r);
    }
    let raw = RawMacros {
        calories: scrape(text, &CALORIE_RES),
        protein: scrape(text, &PROTEIN_RES),
        carbs: scrape(text, &CARB_RES),
        fats: scrape(text, &FAT_RES),
    };
    normalize_macros(raw, SOURCE)
}

/// Span from the first `{` to the last `}`, parsed as JSON.
fn json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn from_json(data: &Value) -> RawMacros {
    let pick = |keys: &[&str]| keys.iter().find_map(|k| data.get(*k).and_then(to_num));
    RawMacros {
        calories: pick(CALORIE_KEYS),
        protein: pick(PROTEIN_KEYS),
        carbs: pick(CARB_KEYS),
        fats: pick(FAT_KEYS),
    }
}

/// One case-insensitive `prefix number` regex per prefix, in priority order.
fn compile(prefixes: &[&str]) -> Vec<Regex> {
    prefixes
        .iter()
        .filter_map(|prefix| Regex::new(&format!("(?i){prefix}{NUM}")).ok())
        .collect()
}

fn scrape(text: &str, patterns: &[Regex]) -> Option<f64> {
    patterns
        .iter()
        .find_map(|re| re.captures(text)?.get(1)?.as_str().parse().ok())
}
