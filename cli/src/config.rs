use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use thali_core::dataset::DEFAULT_DATASET_PATH;
use thali_core::providers::DEFAULT_PROVIDER_ORDER;

pub const DEFAULT_USER: &str = "local";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 12;

pub struct Config {
    pub db_path: PathBuf,
    pub dataset_path: PathBuf,
    pub user_id: String,
    pub providers: Vec<String>,
    pub provider_timeout: Duration,
    pub gemini_key: Option<String>,
    pub usda_key: Option<String>,
    pub calorieninjas_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |keys: &[&str]| {
            keys.iter().find_map(|k| {
                lookup(k)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
        };

        let db_path = match get(&["THALI_DB_PATH"]) {
            Some(p) => PathBuf::from(p),
            None => {
                let proj_dirs = ProjectDirs::from("", "", "thali")
                    .context("Could not determine home directory")?;
                let data_dir = proj_dirs.data_dir().to_path_buf();
                std::fs::create_dir_all(&data_dir).with_context(|| {
                    format!("Failed to create data directory: {}", data_dir.display())
                })?;
                data_dir.join("thali.db")
            }
        };

        let dataset_path = get(&["THALI_DATASET_PATH", "FOOD_DATASET_PATH"])
            .map_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH), PathBuf::from);

        let providers = get(&["THALI_PROVIDERS"]).map_or_else(
            || DEFAULT_PROVIDER_ORDER.iter().map(ToString::to_string).collect(),
            |list| parse_provider_order(&list),
        );

        let timeout_secs = match get(&["THALI_PROVIDER_TIMEOUT_SECS"]) {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .with_context(|| format!("Invalid THALI_PROVIDER_TIMEOUT_SECS '{v}'"))?,
            None => DEFAULT_PROVIDER_TIMEOUT_SECS,
        };

        Ok(Config {
            db_path,
            dataset_path,
            user_id: get(&["THALI_USER"]).unwrap_or_else(|| DEFAULT_USER.to_string()),
            providers,
            provider_timeout: Duration::from_secs(timeout_secs),
            gemini_key: get(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            usda_key: get(&["USDA_FDC_API_KEY"]),
            calorieninjas_key: get(&["CALORIE_NINJAS_KEY", "API_KEY"]),
        })
    }
}

/// Known provider names in the given order, duplicates dropped.
fn parse_provider_order(list: &str) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for name in list.split(',').map(|s| s.trim().to_lowercase()) {
        if name.is_empty() || order.contains(&name) {
            continue;
        }
        if DEFAULT_PROVIDER_ORDER.contains(&name.as_str()) {
            order.push(name);
        } else {
            warn!(provider = %name, "ignoring unknown nutrition provider");
        }
    }
    order
}
