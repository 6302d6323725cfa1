use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use nutri_core::{
    AUTO_APPLY_THRESHOLD, CookMethod, HabitEdit, HabitLearner, HabitPattern, Ingredient,
    MacroTotals, MealRecord, Repository,
};

use crate::error::{Result, StoreError};
use crate::schema;

const PATTERN_COLUMNS: &str = "device_id, original_name, corrected_name, corrected_grams,
     preferred_cook_method, occurrence_count, auto_apply, updated_at";

const MEAL_COLUMNS: &str = "id, device_id, food, ingredients_json, calories, protein_g, fat_g,
     carbs_g, verdict, suggestion, eaten_at";

// On conflict the stored row can only move forward: the count never drops
// and auto_apply never clears. Mirrors HabitPattern::merged.
const UPSERT_PATTERN: &str = "
    INSERT INTO habit_patterns (device_id, original_name, corrected_name, corrected_grams,
        preferred_cook_method, occurrence_count, auto_apply, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, (?7 OR ?6 >= ?9), ?8)
    ON CONFLICT(device_id, original_name) DO UPDATE SET
        corrected_name = COALESCE(excluded.corrected_name, habit_patterns.corrected_name),
        corrected_grams = COALESCE(excluded.corrected_grams, habit_patterns.corrected_grams),
        preferred_cook_method =
            COALESCE(excluded.preferred_cook_method, habit_patterns.preferred_cook_method),
        occurrence_count = MAX(habit_patterns.occurrence_count, excluded.occurrence_count),
        auto_apply = (habit_patterns.auto_apply OR excluded.auto_apply
            OR MAX(habit_patterns.occurrence_count, excluded.occurrence_count) >= ?9),
        updated_at = excluded.updated_at";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!("opened store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Habit patterns ---

    pub fn get_pattern(&self, device_id: &str, original_name: &str) -> Result<Option<HabitPattern>> {
        get_pattern_on(&self.conn, device_id, original_name)
    }

    /// Apply one correction as a single read-modify-write.
    ///
    /// Runs under `BEGIN IMMEDIATE` so two processes recording the same edit
    /// serialize on the write lock instead of both reading the old count.
    pub fn record_edit(&self, device_id: &str, edit: &HabitEdit) -> Result<HabitPattern> {
        if edit.original_name.trim().is_empty() {
            return Err(StoreError::InvalidData(
                "edit has an empty original name".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let existing = get_pattern_on(&tx, device_id, &edit.original_name)?;
        let learner = HabitLearner::from_patterns(device_id, existing.into_iter().collect());
        let next = learner.preview_edit(edit);
        upsert_pattern_on(&tx, &next)?;
        tx.commit()?;

        tracing::info!(
            device = device_id,
            name = %next.original_name,
            count = next.occurrence_count,
            auto_apply = next.auto_apply,
            "recorded habit edit"
        );
        Ok(next)
    }

    /// Returns whether a row was removed.
    pub fn delete_pattern(&self, device_id: &str, original_name: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM habit_patterns WHERE device_id = ?1 AND original_name = ?2",
            params![device_id, original_name],
        )?;
        Ok(rows > 0)
    }

    // --- Meals ---

    pub fn get_meal(&self, id: Uuid) -> Result<Option<MealRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = ?1"),
                [id.to_string()],
                RawMeal::from_row,
            )
            .optional()?;
        raw.map(RawMeal::into_record).transpose()
    }

    pub fn meal_count(&self, device_id: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM meals WHERE device_id = ?1",
            [device_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn delete_meal(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM meals WHERE id = ?1", [id.to_string()])?;
        Ok(rows > 0)
    }

    /// Write many patterns and meals in one transaction.
    pub fn save_batch(&self, patterns: &[HabitPattern], meals: &[MealRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for pattern in patterns {
            upsert_pattern_on(&tx, pattern)?;
        }
        for meal in meals {
            save_meal_on(&tx, meal)?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl Repository for Store {
    type Error = StoreError;

    fn get_patterns_by_device(&self, device_id: &str) -> Result<Vec<HabitPattern>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATTERN_COLUMNS} FROM habit_patterns
             WHERE device_id = ?1 ORDER BY original_name"
        ))?;
        let raw: Vec<RawPattern> = stmt
            .query_map([device_id], RawPattern::from_row)?
            .collect::<std::result::Result<_, _>>()?;
        raw.into_iter().map(RawPattern::into_pattern).collect()
    }

    fn upsert_pattern(&self, pattern: &HabitPattern) -> Result<()> {
        upsert_pattern_on(&self.conn, pattern)
    }

    fn get_meals_by_device(&self, device_id: &str) -> Result<Vec<MealRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE device_id = ?1 ORDER BY eaten_at, rowid"
        ))?;
        let raw: Vec<RawMeal> = stmt
            .query_map([device_id], RawMeal::from_row)?
            .collect::<std::result::Result<_, _>>()?;
        raw.into_iter().map(RawMeal::into_record).collect()
    }

    fn save_meal(&self, meal: &MealRecord) -> Result<()> {
        save_meal_on(&self.conn, meal)
    }
}

fn get_pattern_on(
    conn: &Connection,
    device_id: &str,
    original_name: &str,
) -> Result<Option<HabitPattern>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {PATTERN_COLUMNS} FROM habit_patterns
                 WHERE device_id = ?1 AND original_name = ?2"
            ),
            params![device_id, original_name],
            RawPattern::from_row,
        )
        .optional()?;
    raw.map(RawPattern::into_pattern).transpose()
}

fn upsert_pattern_on(conn: &Connection, p: &HabitPattern) -> Result<()> {
    conn.execute(
        UPSERT_PATTERN,
        params![
            p.device_id,
            p.original_name,
            p.corrected_name,
            p.corrected_grams,
            p.preferred_cook_method.map(CookMethod::as_str),
            p.occurrence_count,
            p.auto_apply,
            p.updated_at,
            AUTO_APPLY_THRESHOLD,
        ],
    )?;
    Ok(())
}

fn save_meal_on(conn: &Connection, meal: &MealRecord) -> Result<()> {
    let ingredients = serde_json::to_string(&meal.ingredients)?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO meals ({MEAL_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            meal.id.to_string(),
            meal.device_id,
            meal.food,
            ingredients,
            meal.totals.calories,
            meal.totals.protein_g,
            meal.totals.fat_g,
            meal.totals.carbs_g,
            meal.verdict,
            meal.suggestion,
            meal.eaten_at,
        ],
    )?;
    Ok(())
}

struct RawPattern {
    device_id: String,
    original_name: String,
    corrected_name: Option<String>,
    corrected_grams: Option<f64>,
    cook_method: Option<String>,
    occurrence_count: u32,
    auto_apply: bool,
    updated_at: String,
}

impl RawPattern {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            device_id: row.get(0)?,
            original_name: row.get(1)?,
            corrected_name: row.get(2)?,
            corrected_grams: row.get(3)?,
            cook_method: row.get(4)?,
            occurrence_count: row.get(5)?,
            auto_apply: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_pattern(self) -> Result<HabitPattern> {
        let preferred_cook_method = match self.cook_method.as_deref() {
            None => None,
            Some(s) => Some(CookMethod::parse(s).ok_or_else(|| {
                StoreError::InvalidData(format!("unknown cook method '{s}'"))
            })?),
        };
        Ok(HabitPattern {
            device_id: self.device_id,
            original_name: self.original_name,
            corrected_name: self.corrected_name,
            corrected_grams: self.corrected_grams,
            preferred_cook_method,
            occurrence_count: self.occurrence_count,
            auto_apply: self.auto_apply,
            updated_at: self.updated_at,
        })
    }
}

struct RawMeal {
    id: String,
    device_id: String,
    food: String,
    ingredients_json: String,
    totals: MacroTotals,
    verdict: String,
    suggestion: String,
    eaten_at: String,
}

impl RawMeal {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            device_id: row.get(1)?,
            food: row.get(2)?,
            ingredients_json: row.get(3)?,
            totals: MacroTotals {
                calories: row.get(4)?,
                protein_g: row.get(5)?,
                fat_g: row.get(6)?,
                carbs_g: row.get(7)?,
            },
            verdict: row.get(8)?,
            suggestion: row.get(9)?,
            eaten_at: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<MealRecord> {
        let ingredients: Vec<Ingredient> = serde_json::from_str(&self.ingredients_json)
            .map_err(|e| {
                StoreError::InvalidData(format!("meal {} ingredients: {e}", self.id))
            })?;
        Ok(MealRecord {
            id: parse_uuid(&self.id)?,
            device_id: self.device_id,
            food: self.food,
            ingredients,
            totals: self.totals,
            verdict: self.verdict,
            suggestion: self.suggestion,
            eaten_at: self.eaten_at,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutri_core::{AnalysisContext, analyze_meal};

    const DEVICE: &str = "phone-1";

    fn meal_record(device: &str, food: &str) -> MealRecord {
        let ingredients = vec![
            Ingredient::new("西兰花", 80.0).with_macros(2.0, 0.3, 6.0, 34.0),
            Ingredient::new("白米饭", 200.0).with_macros(4.0, 0.6, 44.0, 200.0),
        ];
        let analysis = analyze_meal(&ingredients, &AnalysisContext::default());
        MealRecord::new(device, food, ingredients, &analysis)
    }

    #[test]
    fn test_metadata() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.get_metadata("foo").unwrap().is_none());

        store.set_metadata("foo", "bar").unwrap();
        assert_eq!(store.get_metadata("foo").unwrap(), Some("bar".to_string()));

        store.set_metadata("foo", "baz").unwrap();
        assert_eq!(store.get_metadata("foo").unwrap(), Some("baz".to_string()));
    }

    #[test]
    fn test_record_edit_reaches_threshold() {
        let store = Store::open_in_memory().unwrap();
        let edit = HabitEdit::new("油条").rename("油饼").cook(CookMethod::DeepFry);

        assert!(!store.record_edit(DEVICE, &edit).unwrap().auto_apply);
        assert!(!store.record_edit(DEVICE, &edit).unwrap().auto_apply);
        let third = store.record_edit(DEVICE, &edit).unwrap();
        assert!(third.auto_apply);
        assert_eq!(third.occurrence_count, 3);

        let loaded = store.get_pattern(DEVICE, "油条").unwrap().unwrap();
        assert_eq!(loaded, third);
        assert_eq!(loaded.preferred_cook_method, Some(CookMethod::DeepFry));
    }

    #[test]
    fn test_record_edit_rejects_empty_name() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.record_edit(DEVICE, &HabitEdit::new("  ")).is_err());
    }

    #[test]
    fn test_upsert_never_regresses() {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..4 {
            store
                .record_edit(DEVICE, &HabitEdit::new("rice").grams(150.0))
                .unwrap();
        }

        // A stale writer that only saw one edit
        let stale = HabitLearner::new(DEVICE).preview_edit(&HabitEdit::new("rice").rename("brown rice"));
        store.upsert_pattern(&stale).unwrap();

        let row = store.get_pattern(DEVICE, "rice").unwrap().unwrap();
        assert_eq!(row.occurrence_count, 4);
        assert!(row.auto_apply);
        assert_eq!(row.corrected_name.as_deref(), Some("brown rice"));
        assert_eq!(row.corrected_grams, Some(150.0));
    }

    #[test]
    fn test_fresh_insert_past_threshold_auto_applies() {
        let store = Store::open_in_memory().unwrap();
        let mut pattern = HabitLearner::new(DEVICE).preview_edit(&HabitEdit::new("米饭").grams(120.0));
        pattern.occurrence_count = 4;
        assert!(!pattern.auto_apply);
        store.upsert_pattern(&pattern).unwrap();

        let row = store.get_pattern(DEVICE, "米饭").unwrap().unwrap();
        assert_eq!(row.occurrence_count, 4);
        assert!(row.auto_apply);
    }

    #[test]
    fn test_stale_learner_caches_stored_row() {
        let store = Store::open_in_memory().unwrap();
        let mut stale = HabitLearner::load(&store, DEVICE).unwrap();
        for _ in 0..3 {
            store.record_edit(DEVICE, &HabitEdit::new("rice")).unwrap();
        }

        let committed = stale
            .commit_edit(&store, &HabitEdit::new("rice").grams(90.0))
            .unwrap();
        let row = store.get_pattern(DEVICE, "rice").unwrap().unwrap();
        assert_eq!(committed, row);
        assert_eq!(stale.get("rice"), Some(&row));
        assert_eq!(row.occurrence_count, 3);
        assert_eq!(row.corrected_grams, Some(90.0));
        assert!(row.auto_apply);
    }

    #[test]
    fn test_learner_roundtrip_through_store() {
        let store = Store::open_in_memory().unwrap();
        let mut learner = HabitLearner::load(&store, DEVICE).unwrap();
        assert!(learner.is_empty());

        for _ in 0..3 {
            learner
                .commit_edit(&store, &HabitEdit::new("油条").grams(60.0))
                .unwrap();
        }

        let reloaded = HabitLearner::load(&store, DEVICE).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.is_trusted_meal(&[Ingredient::new("油条", 100.0)]));
        assert!(HabitLearner::load(&store, "other").unwrap().is_empty());
    }

    #[test]
    fn test_delete_pattern() {
        let store = Store::open_in_memory().unwrap();
        store.record_edit(DEVICE, &HabitEdit::new("rice")).unwrap();
        assert!(store.delete_pattern(DEVICE, "rice").unwrap());
        assert!(!store.delete_pattern(DEVICE, "rice").unwrap());
        assert!(store.get_pattern(DEVICE, "rice").unwrap().is_none());
    }

    #[test]
    fn test_meal_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let record = meal_record(DEVICE, "rice and broccoli");
        store.save_meal(&record).unwrap();

        let loaded = store.get_meal(record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(store.meal_count(DEVICE).unwrap(), 1);
        assert_eq!(store.meal_count("other").unwrap(), 0);
    }

    #[test]
    fn test_save_meal_replaces_by_id() {
        let store = Store::open_in_memory().unwrap();
        let mut record = meal_record(DEVICE, "lunch");
        store.save_meal(&record).unwrap();
        record.food = "dinner".to_string();
        store.save_meal(&record).unwrap();

        let meals = store.get_meals_by_device(DEVICE).unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].food, "dinner");
    }

    #[test]
    fn test_meals_partitioned_by_device() {
        let store = Store::open_in_memory().unwrap();
        store.save_meal(&meal_record("a", "one")).unwrap();
        store.save_meal(&meal_record("a", "two")).unwrap();
        store.save_meal(&meal_record("b", "three")).unwrap();

        assert_eq!(store.get_meals_by_device("a").unwrap().len(), 2);
        assert_eq!(store.get_meals_by_device("b").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_meal() {
        let store = Store::open_in_memory().unwrap();
        let record = meal_record(DEVICE, "snack");
        store.save_meal(&record).unwrap();
        assert!(store.delete_meal(record.id).unwrap());
        assert!(store.get_meal(record.id).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_ingredients_is_invalid_data() {
        let store = Store::open_in_memory().unwrap();
        let record = meal_record(DEVICE, "x");
        store.save_meal(&record).unwrap();
        store
            .conn()
            .execute("UPDATE meals SET ingredients_json = 'nope'", [])
            .unwrap();

        let err = store.get_meals_by_device(DEVICE).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn test_save_batch() {
        let store = Store::open_in_memory().unwrap();
        let pattern = HabitLearner::new(DEVICE).preview_edit(&HabitEdit::new("面条"));
        store
            .save_batch(&[pattern], &[meal_record(DEVICE, "noodles")])
            .unwrap();
        assert_eq!(store.get_patterns_by_device(DEVICE).unwrap().len(), 1);
        assert_eq!(store.meal_count(DEVICE).unwrap(), 1);
    }
}
