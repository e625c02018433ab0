use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{Connection, ffi, params, params_from_iter};
use uuid::Uuid;

use crate::conversion::{ConversionField, StoredConversion};
use crate::error::FoodError;
use crate::models::{
    DailyTotals, FoodLogEntry, FoodMaster, Macros, NewFoodLogEntry, NewFoodMaster,
    UpdateFoodLogEntry,
};

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const FOOD_MASTER_COLUMNS: &str = "id, uuid, name, calories, protein, carbs, fats,
    grams_per_cup, grams_per_bowl, grams_per_piece, grams_per_glass, grams_per_katori,
    source, created_at, updated_at";

const FOOD_LOG_COLUMNS: &str = "id, uuid, user_id, food_id, food_name, quantity, unit, grams,
    calories, protein, carbs, fats, meal_type, date, created_at, updated_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS food_master (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL UNIQUE,
                    calories REAL NOT NULL,
                    protein REAL NOT NULL,
                    carbs REAL NOT NULL DEFAULT 0,
                    fats REAL NOT NULL DEFAULT 0,
                    grams_per_cup REAL,
                    grams_per_bowl REAL,
                    grams_per_piece REAL,
                    grams_per_glass REAL,
                    grams_per_katori REAL,
                    source TEXT NOT NULL DEFAULT 'manual',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    user_id TEXT NOT NULL,
                    food_id INTEGER NOT NULL REFERENCES food_master(id),
                    food_name TEXT NOT NULL,
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    grams REAL NOT NULL,
                    calories INTEGER NOT NULL,
                    protein INTEGER NOT NULL,
                    carbs INTEGER NOT NULL,
                    fats INTEGER NOT NULL,
                    meal_type TEXT NOT NULL,
                    date TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_food_logs_user_date ON food_logs(user_id, date);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn food_master_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodMaster> {
        Ok(FoodMaster {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            macros: Macros {
                calories: row.get(3)?,
                protein: row.get(4)?,
                carbs: row.get(5)?,
                fats: row.get(6)?,
            },
            conversion: StoredConversion {
                grams_per_cup: row.get(7)?,
                grams_per_bowl: row.get(8)?,
                grams_per_piece: row.get(9)?,
                grams_per_glass: row.get(10)?,
                grams_per_katori: row.get(11)?,
            },
            source: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn food_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodLogEntry> {
        Ok(FoodLogEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            food_id: row.get(3)?,
            food_name: row.get(4)?,
            quantity: row.get(5)?,
            unit: row.get(6)?,
            grams: row.get(7)?,
            calories: row.get(8)?,
            protein: row.get(9)?,
            carbs: row.get(10)?,
            fats: row.get(11)?,
            meal_type: row.get(12)?,
            date: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }

    // --- Food master ---

    pub fn get_food_master_by_id(&self, id: i64) -> Result<FoodMaster> {
        self.conn
            .query_row(
                &format!("SELECT {FOOD_MASTER_COLUMNS} FROM food_master WHERE id = ?1"),
                params![id],
                Self::food_master_from_row,
            )
            .context("Food master record not found")
    }

    pub fn get_food_master_by_name(&self, name: &str) -> Result<Option<FoodMaster>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_MASTER_COLUMNS} FROM food_master WHERE name = ?1"
        ))?;
        let mut rows = stmt.query(params![name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_master_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Case-insensitive substring match on stored names, taken literally.
    /// The shortest matching name wins.
    pub fn find_food_master_like(&self, fragment: &str) -> Result<Option<FoodMaster>> {
        let escaped = fragment
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_MASTER_COLUMNS} FROM food_master
             WHERE name LIKE ?1 ESCAPE '\\'
             ORDER BY length(name), id
             LIMIT 1"
        ))?;
        let mut rows = stmt.query(params![pattern])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_master_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Insert a new record. A name that already exists fails with
    /// [`FoodError::PersistenceConflict`].
    pub fn insert_food_master(&self, food: &NewFoodMaster) -> Result<FoodMaster> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let p = &food.conversion;
        let inserted = self.conn.execute(
            "INSERT INTO food_master (uuid, name, calories, protein, carbs, fats,
                grams_per_cup, grams_per_bowl, grams_per_piece, grams_per_glass, grams_per_katori,
                source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                uuid,
                food.name,
                food.macros.calories,
                food.macros.protein,
                food.macros.carbs,
                food.macros.fats,
                p.grams_per_cup,
                p.grams_per_bowl,
                p.grams_per_piece,
                p.grams_per_glass,
                p.grams_per_katori,
                food.source,
                now,
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(FoodError::PersistenceConflict(food.name.clone()).into());
            }
            Err(e) => return Err(e).context("Failed to insert food master record"),
        }
        let id = self.conn.last_insert_rowid();
        self.get_food_master_by_id(id)
    }

    pub fn update_food_master_macros(
        &self,
        id: i64,
        macros: &Macros,
        source: &str,
    ) -> Result<FoodMaster> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE food_master
             SET calories = ?1, protein = ?2, carbs = ?3, fats = ?4, source = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                macros.calories,
                macros.protein,
                macros.carbs,
                macros.fats,
                source,
                now,
                id
            ],
        )?;
        self.get_food_master_by_id(id)
    }

    /// Write only the given conversion columns in one statement. Returns the
    /// number of columns written; an empty patch touches nothing.
    pub fn update_conversion_fields(&self, id: i64, fields: &[(ConversionField, f64)]) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        let assignments: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ?{}", field.column(), i + 1))
            .collect();
        let n = fields.len();
        let sql = format!(
            "UPDATE food_master SET {}, updated_at = ?{} WHERE id = ?{}",
            assignments.join(", "),
            n + 1,
            n + 2
        );
        let mut values: Vec<Value> = fields.iter().map(|(_, v)| Value::Real(*v)).collect();
        values.push(Value::Text(Local::now().to_rfc3339()));
        values.push(Value::Integer(id));
        self.conn
            .execute(&sql, params_from_iter(values))
            .context("Failed to backfill conversion fields")?;
        Ok(n)
    }

    pub fn count_food_masters(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM food_master", [], |row| row.get(0))?)
    }

    // --- Food logs ---

    pub fn insert_food_log(&self, entry: &NewFoodLogEntry) -> Result<FoodLogEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO food_logs (uuid, user_id, food_id, food_name, quantity, unit, grams,
                calories, protein, carbs, fats, meal_type, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                uuid,
                entry.user_id,
                entry.food_id,
                entry.food_name,
                entry.quantity,
                entry.unit,
                entry.grams,
                entry.macros.calories,
                entry.macros.protein,
                entry.macros.carbs,
                entry.macros.fats,
                entry.meal_type,
                date_str,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food_log(&entry.user_id, id)?
            .context("Food log entry not found")
    }

    pub fn get_food_log(&self, user_id: &str, id: i64) -> Result<Option<FoodLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_LOG_COLUMNS} FROM food_logs WHERE id = ?1 AND user_id = ?2"
        ))?;
        let mut rows = stmt.query(params![id, user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_log_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Newest first.
    pub fn get_food_logs_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<FoodLogEntry>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_LOG_COLUMNS} FROM food_logs
             WHERE user_id = ?1 AND date = ?2
             ORDER BY created_at DESC, id DESC"
        ))?;
        let entries = stmt
            .query_map(params![user_id, date_str], Self::food_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Overwrite a log entry with recomputed values. `None` when the entry
    /// does not exist for this user.
    pub fn update_food_log(
        &self,
        user_id: &str,
        id: i64,
        update: &UpdateFoodLogEntry,
    ) -> Result<Option<FoodLogEntry>> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE food_logs
             SET quantity = ?1, unit = ?2, grams = ?3, calories = ?4, protein = ?5,
                 carbs = ?6, fats = ?7, meal_type = ?8, updated_at = ?9
             WHERE id = ?10 AND user_id = ?11",
            params![
                update.quantity,
                update.unit,
                update.grams,
                update.macros.calories,
                update.macros.protein,
                update.macros.carbs,
                update.macros.fats,
                update.meal_type,
                now,
                id,
                user_id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_food_log(user_id, id)
    }

    pub fn delete_food_log(&self, user_id: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_logs WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn get_daily_totals(&self, user_id: &str, date: NaiveDate) -> Result<DailyTotals> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(calories), 0), COALESCE(SUM(protein), 0),
                        COALESCE(SUM(carbs), 0), COALESCE(SUM(fats), 0), COUNT(*)
                 FROM food_logs WHERE user_id = ?1 AND date = ?2",
                params![user_id, date_str],
                |row| {
                    Ok(DailyTotals {
                        date: date_str.clone(),
                        calories: row.get(0)?,
                        protein: row.get(1)?,
                        carbs: row.get(2)?,
                        fats: row.get(3)?,
                        entries: row.get(4)?,
                    })
                },
            )
            .context("Failed to compute daily totals")
    }

    /// Calories per logged day in `[start, end]`, keyed by `YYYY-MM-DD`.
    /// Days without entries are absent.
    pub fn get_calories_by_day(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, SUM(calories) FROM food_logs
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY date",
        )?;
        let rows = stmt
            .query_map(
                params![
                    user_id,
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}
