//! Create-or-fetch of name-keyed food master records.
//!
//! Lookup goes store, then catalog, then the provider chain. Records are
//! repaired on every resolve: unset conversion factors are backfilled and
//! macros from low-trust sources are replaced by catalog values.
//!
//! Creation takes no lock. Two first-time resolutions of the same name may
//! both try to insert; the unique name constraint rejects the second and
//! the loser re-reads the winner's record.

use std::cell::OnceCell;
use std::sync::Arc;

use tracing::{debug, info};

use crate::conversion::infer_profile;
use crate::dataset::{DatasetCache, DatasetEntry};
use crate::db::Database;
use crate::error::{FoodError, FoodResult};
use crate::models::{FoodMaster, Macros, NewFoodMaster, SOURCE_DATASET, is_low_trust_source};
use crate::providers::ProviderChain;
use crate::scorer::lookup_best;
use crate::text::canonical_name;

/// Catalog snapshot loaded on first use, at most once per resolve.
struct LazyCatalog<'a> {
    cache: &'a DatasetCache,
    entries: OnceCell<Arc<Vec<DatasetEntry>>>,
}

impl<'a> LazyCatalog<'a> {
    fn new(cache: &'a DatasetCache) -> Self {
        Self {
            cache,
            entries: OnceCell::new(),
        }
    }

    fn best_match(&self, name: &str) -> Option<&DatasetEntry> {
        let entries = self.entries.get_or_init(|| self.cache.load());
        lookup_best(entries, name)
    }
}

pub struct FoodResolver<'a> {
    db: &'a Database,
    dataset: &'a DatasetCache,
    chain: Option<&'a ProviderChain>,
}

impl<'a> FoodResolver<'a> {
    #[must_use]
    pub fn new(db: &'a Database, dataset: &'a DatasetCache) -> Self {
        Self {
            db,
            dataset,
            chain: None,
        }
    }

    /// Fall back to external providers for names the catalog lacks.
    #[must_use]
    pub fn with_chain(mut self, chain: &'a ProviderChain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn resolve(&self, name: &str) -> FoodResult<FoodMaster> {
        let key = canonical_name(name);
        if key.is_empty() {
            return Err(FoodError::validation("Food name is required"));
        }
        let catalog = LazyCatalog::new(self.dataset);

        let existing = match self.db.get_food_master_by_name(&key)? {
            Some(record) => Some(record),
            None => self.db.find_food_master_like(&key)?,
        };
        let record = match existing {
            Some(record) => {
                debug!(food = %key, id = record.id, "food master hit");
                record
            }
            None => self.create(&key, &catalog)?,
        };
        self.repair(record, &catalog)
    }

    fn create(&self, key: &str, catalog: &LazyCatalog) -> FoodResult<FoodMaster> {
        let matched = catalog.best_match(key);
        let (macros, source) = match (matched, self.chain) {
            (Some(entry), _) => (macros_of(entry), SOURCE_DATASET.to_string()),
            (None, Some(chain)) => {
                let found = chain.resolve(key)?;
                (found.macros, found.source)
            }
            (None, None) => return Err(FoodError::NotInCatalog(key.to_string())),
        };

        let new = NewFoodMaster {
            name: key.to_string(),
            macros,
            conversion: infer_profile(matched),
            source,
        };
        match self.db.insert_food_master(&new) {
            Ok(record) => {
                info!(food = %key, id = record.id, source = %record.source, "created food master record");
                Ok(record)
            }
            Err(e) if matches!(e.downcast_ref::<FoodError>(), Some(FoodError::PersistenceConflict(_))) => {
                debug!(food = %key, "lost create race, re-reading existing record");
                self.db
                    .get_food_master_by_name(key)?
                    .ok_or_else(|| FoodError::Storage(e))
            }
            Err(e) => Err(FoodError::Storage(e)),
        }
    }

    /// Backfill unset conversion fields and refresh low-trust macros. Does
    /// not touch the catalog or the store when neither is needed.
    fn repair(&self, record: FoodMaster, catalog: &LazyCatalog) -> FoodResult<FoodMaster> {
        let missing = record.conversion.missing_fields();
        let low_trust = is_low_trust_source(&record.source);
        if missing.is_empty() && !low_trust {
            return Ok(record);
        }

        let matched = catalog.best_match(&record.name);
        let mut changed = false;

        if let Some(entry) = matched.filter(|_| low_trust) {
            self.db
                .update_food_master_macros(record.id, &macros_of(entry), SOURCE_DATASET)?;
            info!(food = %record.name, "refreshed low-trust macros from catalog");
            changed = true;
        }

        if !missing.is_empty() {
            let patch = record.conversion.backfill(&infer_profile(matched));
            let written = self.db.update_conversion_fields(record.id, &patch)?;
            debug!(food = %record.name, fields = written, "backfilled conversion profile");
            changed |= written > 0;
        }

        if changed {
            Ok(self.db.get_food_master_by_id(record.id)?)
        } else {
            Ok(record)
        }
    }
}

fn macros_of(entry: &DatasetEntry) -> Macros {
    Macros {
        calories: entry.calories,
        protein: entry.protein,
        carbs: entry.carbs,
        fats: entry.fats,
    }
    .rounded()
}
