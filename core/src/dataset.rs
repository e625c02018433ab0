//! Local food catalog loaded from a JSON file and kept in memory.
//!
//! The catalog is re-read only when the file's modification time changes.
//! A missing file is an empty catalog. A file that cannot be read or parsed
//! keeps whatever snapshot was loaded before, so a half-written replacement
//! never takes the catalog away from running requests.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::text::{normalize, tokens};

pub const DEFAULT_DATASET_PATH: &str = "data/foods.json";

const NAME_FIELDS: &[&str] = &[
    "/name",
    "/food",
    "/foodName",
    "/item",
    "/description",
    "/title",
];
const ID_FIELDS: &[&str] = &["/id", "/foodId"];
const CALORIE_FIELDS: &[&str] = &[
    "/macros/calories",
    "/calories_per_100g",
    "/calories",
    "/kcal",
    "/energy_kcal",
    "/energy",
];
const PROTEIN_FIELDS: &[&str] = &[
    "/macros/protein",
    "/protein_per_100g",
    "/protein",
    "/protein_g",
];
const CARB_FIELDS: &[&str] = &[
    "/macros/carbs",
    "/carbs_per_100g",
    "/carbs",
    "/carbohydrates",
    "/carbohydrate_g",
];
const FAT_FIELDS: &[&str] = &[
    "/macros/fat",
    "/fats_per_100g",
    "/fats",
    "/fat",
    "/fat_g",
];
const SERVING_UNIT_FIELDS: &[&str] = &["/servingUnit", "/unit"];

/// One usable catalog row, per-100g macros plus precomputed match keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetEntry {
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub serving_unit: String,
    pub name_norm: String,
    pub aliases: Vec<String>,
    pub aliases_norm: Vec<String>,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

/// Backing storage for the catalog.
pub trait CatalogSource: Send + Sync {
    /// Modification time of the catalog, `None` when it does not exist.
    fn modified(&self) -> io::Result<Option<SystemTime>>;
    fn read(&self) -> io::Result<String>;
}

impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    fn modified(&self) -> io::Result<Option<SystemTime>> {
        (**self).modified()
    }

    fn read(&self) -> io::Result<String> {
        (**self).read()
    }
}

pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for FileCatalog {
    fn modified(&self) -> io::Result<Option<SystemTime>> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

#[derive(Default)]
struct Snapshot {
    mtime: Option<SystemTime>,
    entries: Arc<Vec<DatasetEntry>>,
}

pub struct DatasetCache {
    source: Box<dyn CatalogSource>,
    state: Mutex<Snapshot>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_source(FileCatalog::new(path))
    }

    pub fn with_source(source: impl CatalogSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            state: Mutex::new(Snapshot::default()),
        }
    }

    /// Current catalog. Returns the same `Arc` as the previous call while
    /// the file's modification time is unchanged.
    pub fn load(&self) -> Arc<Vec<DatasetEntry>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mtime = match self.source.modified() {
            Ok(Some(mtime)) => mtime,
            Ok(None) => {
                debug!("food catalog not found, using empty catalog");
                return Arc::new(Vec::new());
            }
            Err(e) => {
                warn!("failed to stat food catalog: {e}");
                return Arc::clone(&state.entries);
            }
        };

        if state.mtime == Some(mtime) {
            return Arc::clone(&state.entries);
        }

        let raw = match self.source.read() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to read food catalog: {e}");
                return Arc::clone(&state.entries);
            }
        };

        match parse_catalog(&raw) {
            Ok(entries) => {
                debug!(entries = entries.len(), "loaded food catalog");
                state.entries = Arc::new(entries);
                state.mtime = Some(mtime);
            }
            Err(e) => {
                warn!("food catalog is not valid JSON, keeping previous snapshot: {e}");
            }
        }
        Arc::clone(&state.entries)
    }
}

/// Parse catalog JSON: a top-level array of rows or `{"foods": [...]}`.
/// Any other shape is an empty catalog.
pub fn parse_catalog(raw: &str) -> Result<Vec<DatasetEntry>, serde_json::Error> {
    let data: Value = serde_json::from_str(raw)?;
    let rows = match data {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove("foods") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(rows.iter().filter_map(map_row).collect())
}

/// Map a raw catalog row. Rows without a name, calories or protein, or
/// with negative macros, are dropped.
#[must_use]
pub fn map_row(row: &Value) -> Option<DatasetEntry> {
    let name = first_str(row, NAME_FIELDS)?;
    let calories = first_num(row, CALORIE_FIELDS)?;
    let protein = first_num(row, PROTEIN_FIELDS)?;
    let carbs = first_num(row, CARB_FIELDS).unwrap_or(0.0);
    let fats = first_num(row, FAT_FIELDS).unwrap_or(0.0);
    if [calories, protein, carbs, fats].iter().any(|v| *v < 0.0) {
        return None;
    }

    let name_norm = normalize(&name);
    let mut aliases = row.get("aliases").map(parse_aliases).unwrap_or_default();
    aliases.extend(
        tokens(&name_norm)
            .filter(|t| t.len() >= 2)
            .map(str::to_string),
    );
    let aliases_norm = aliases
        .iter()
        .map(|a| normalize(a))
        .filter(|a| !a.is_empty())
        .collect();

    Some(DatasetEntry {
        id: ID_FIELDS.iter().find_map(|p| row.pointer(p).and_then(id_string)),
        category: row
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_lowercase(),
        serving_unit: first_str(row, SERVING_UNIT_FIELDS)
            .unwrap_or_else(|| "100g".to_string())
            .to_lowercase(),
        name,
        name_norm,
        aliases,
        aliases_norm,
        calories,
        protein,
        carbs,
        fats,
    })
}

fn parse_aliases(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn first_str(row: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|p| {
        row.pointer(p)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn first_num(row: &Value, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|p| row.pointer(p).and_then(to_num))
}

/// Numbers or numeric strings; non-finite values count as absent.
pub(crate) fn to_num(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeCatalog {
        mtime: Mutex<Option<SystemTime>>,
        body: Mutex<String>,
        reads: AtomicUsize,
    }

    impl FakeCatalog {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                mtime: Mutex::new(Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))),
                body: Mutex::new(body.to_string()),
                reads: AtomicUsize::new(0),
            })
        }

        fn replace(&self, body: &str, secs: u64) {
            *self.body.lock().unwrap() = body.to_string();
            *self.mtime.lock().unwrap() = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
        }
    }

    impl CatalogSource for FakeCatalog {
        fn modified(&self) -> io::Result<Option<SystemTime>> {
            Ok(*self.mtime.lock().unwrap())
        }

        fn read(&self) -> io::Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.lock().unwrap().clone())
        }
    }

    const IDLI: &str = r#"[{"name": "Idli", "calories": 58, "protein": 2, "carbs": 12, "fats": 0.4}]"#;

    #[test]
    fn test_map_row_basic() {
        let entry = map_row(&json!({
            "id": 7,
            "name": "Ragi Mudde",
            "category": " Main Course ",
            "calories": 120,
            "protein": "3.1",
            "aliases": ["finger millet ball"],
        }))
        .unwrap();
        assert_eq!(entry.id.as_deref(), Some("7"));
        assert_eq!(entry.name, "Ragi Mudde");
        assert_eq!(entry.category, "main course");
        assert_eq!(entry.serving_unit, "100g");
        assert_eq!(entry.name_norm, "ragi mudde");
        assert!((entry.protein - 3.1).abs() < f64::EPSILON);
        assert!(entry.carbs.abs() < f64::EPSILON);
        assert!(entry.fats.abs() < f64::EPSILON);
        assert_eq!(
            entry.aliases,
            vec!["finger millet ball", "ragi", "mudde"]
        );
        assert_eq!(
            entry.aliases_norm,
            vec!["finger millet ball", "ragi", "mudde"]
        );
    }

    #[test]
    fn test_map_row_field_synonyms_priority() {
        let entry = map_row(&json!({
            "foodName": "Poha",
            "macros": {"calories": 130, "protein": 2.5, "carbs": 25, "fat": 3},
            "calories": 999,
            "unit": "Bowl",
        }))
        .unwrap();
        assert_eq!(entry.name, "Poha");
        assert!((entry.calories - 130.0).abs() < f64::EPSILON);
        assert!((entry.fats - 3.0).abs() < f64::EPSILON);
        assert_eq!(entry.serving_unit, "bowl");

        let entry = map_row(&json!({
            "description": "Curd",
            "energy_kcal": 60,
            "protein_g": 3.1,
            "carbohydrate_g": 3.4,
            "fat_g": 4.0,
        }))
        .unwrap();
        assert_eq!(entry.name, "Curd");
        assert!((entry.carbs - 3.4).abs() < f64::EPSILON);
        assert!((entry.fats - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_map_row_comma_separated_aliases() {
        let entry = map_row(&json!({
            "name": "Chapati",
            "calories": 297,
            "protein": 9.6,
            "aliases": "roti, phulka,, ",
        }))
        .unwrap();
        assert_eq!(entry.aliases, vec!["roti", "phulka", "chapati"]);
    }

    #[test]
    fn test_map_row_drops_incomplete_rows() {
        assert!(map_row(&json!({"calories": 100, "protein": 5})).is_none());
        assert!(map_row(&json!({"name": "Tea", "protein": 0.1})).is_none());
        assert!(map_row(&json!({"name": "Tea", "calories": 2})).is_none());
        assert!(map_row(&json!({"name": "  ", "calories": 2, "protein": 0})).is_none());
        assert!(map_row(&json!({"name": "Bad", "calories": -5, "protein": 1})).is_none());
        assert!(map_row(&json!({"name": "Bad", "calories": "abc", "protein": 1})).is_none());
    }

    #[test]
    fn test_parse_catalog_shapes() {
        assert_eq!(parse_catalog(IDLI).unwrap().len(), 1);
        let wrapped = format!(r#"{{"foods": {IDLI}}}"#);
        assert_eq!(parse_catalog(&wrapped).unwrap().len(), 1);
        assert!(parse_catalog(r#"{"items": []}"#).unwrap().is_empty());
        assert!(parse_catalog("42").unwrap().is_empty());
        assert!(parse_catalog("not json").is_err());
    }

    #[test]
    fn test_load_unchanged_mtime_returns_same_instance() {
        let source = FakeCatalog::new(IDLI);
        let cache = DatasetCache::with_source(Arc::clone(&source));

        let first = cache.load();
        let second = cache.load();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_reloads_when_mtime_changes() {
        let source = FakeCatalog::new(IDLI);
        let cache = DatasetCache::with_source(Arc::clone(&source));
        let first = cache.load();

        source.replace(
            r#"[{"name": "Idli", "calories": 58, "protein": 2},
                {"name": "Dosa", "calories": 168, "protein": 3.9}]"#,
            2_000,
        );
        let second = cache.load();
        assert_eq!(second.len(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_parse_failure_keeps_previous_snapshot() {
        let source = FakeCatalog::new(IDLI);
        let cache = DatasetCache::with_source(Arc::clone(&source));
        let first = cache.load();

        source.replace("[{\"name\": \"Idli\", \"calor", 2_000);
        let during_write = cache.load();
        assert!(Arc::ptr_eq(&first, &during_write));

        // mtime was not recorded, so the finished write is picked up
        source.replace(
            r#"[{"name": "Upma", "calories": 110, "protein": 3}]"#,
            2_000,
        );
        let after = cache.load();
        assert_eq!(after[0].name, "Upma");
    }

    #[test]
    fn test_load_parse_failure_without_snapshot_is_empty() {
        let source = FakeCatalog::new("{{{");
        let cache = DatasetCache::with_source(source);
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path().join("nope.json"));
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foods.json");
        std::fs::write(&path, IDLI).unwrap();

        let cache = DatasetCache::new(&path);
        let entries = cache.load();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_norm, "idli");
        assert!(Arc::ptr_eq(&entries, &cache.load()));
    }
}
