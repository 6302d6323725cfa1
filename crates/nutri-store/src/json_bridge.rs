use std::fs;
use std::path::Path;

use nutri_core::{Repository, WireExport, export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Rows written by an import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub patterns: usize,
    pub meals: usize,
}

impl Store {
    /// Import an export bundle, re-keying every row to `device_id`.
    ///
    /// Patterns merge with what is already stored, so importing an older
    /// bundle never lowers a count. A pattern at or past the auto-apply
    /// threshold is stored with `auto_apply` set whatever the bundle says.
    /// Meals replace rows with the same id. Nothing is written if any
    /// pattern is malformed.
    pub fn import_json_str(&self, json: &str, device_id: &str) -> Result<ImportSummary> {
        let bundle = import_json(json)
            .map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.import_bundle(bundle, device_id)
    }

    pub fn import_json_file(&self, path: &Path, device_id: &str) -> Result<ImportSummary> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json, device_id)
    }

    fn import_bundle(&self, mut bundle: WireExport, device_id: &str) -> Result<ImportSummary> {
        if bundle.device_id != device_id {
            tracing::info!(
                "re-keying import from device {} to {device_id}",
                bundle.device_id
            );
        }
        for pattern in &mut bundle.patterns {
            if pattern.original_name.trim().is_empty() {
                return Err(StoreError::InvalidData(
                    "imported pattern has an empty originalName".to_string(),
                ));
            }
            if pattern.occurrence_count == 0 {
                return Err(StoreError::InvalidData(format!(
                    "imported pattern '{}' has occurrenceCount 0",
                    pattern.original_name
                )));
            }
            pattern.device_id = device_id.to_string();
            pattern.normalize();
        }
        for meal in &mut bundle.meals {
            meal.device_id = device_id.to_string();
        }

        self.save_batch(&bundle.patterns, &bundle.meals)?;
        let summary = ImportSummary {
            patterns: bundle.patterns.len(),
            meals: bundle.meals.len(),
        };
        tracing::info!(
            "imported {} patterns and {} meals (format {})",
            summary.patterns,
            summary.meals,
            bundle.version
        );
        Ok(summary)
    }

    /// Export one device's patterns and meals as a JSON string.
    pub fn export_json_string(&self, device_id: &str) -> Result<String> {
        let patterns = self.get_patterns_by_device(device_id)?;
        let meals = self.get_meals_by_device(device_id)?;
        export_json(device_id, &patterns, &meals)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }

    pub fn export_json_file(&self, path: &Path, device_id: &str) -> Result<()> {
        let json = self.export_json_string(device_id)?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutri_core::{
        AnalysisContext, HabitEdit, HabitLearner, Ingredient, MealRecord, analyze_meal,
    };
    use tempfile::TempDir;

    fn seeded(device: &str) -> Store {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..3 {
            store
                .record_edit(device, &HabitEdit::new("油条").rename("油饼"))
                .unwrap();
        }
        let meal = vec![Ingredient::new("油饼", 100.0).with_macros(6.0, 18.0, 40.0, 350.0)];
        let analysis = analyze_meal(&meal, &AnalysisContext::default());
        store
            .save_meal(&MealRecord::new(device, "breakfast", meal, &analysis))
            .unwrap();
        store
    }

    #[test]
    fn test_export_import_roundtrip() {
        let source = seeded("old-phone");
        let json = source.export_json_string("old-phone").unwrap();

        let target = Store::open_in_memory().unwrap();
        let summary = target.import_json_str(&json, "old-phone").unwrap();
        assert_eq!(summary, ImportSummary { patterns: 1, meals: 1 });

        let patterns = target.get_patterns_by_device("old-phone").unwrap();
        assert_eq!(patterns, source.get_patterns_by_device("old-phone").unwrap());
        assert_eq!(
            target.get_meals_by_device("old-phone").unwrap(),
            source.get_meals_by_device("old-phone").unwrap()
        );
    }

    #[test]
    fn test_import_rekeys_to_target_device() {
        let json = seeded("old-phone").export_json_string("old-phone").unwrap();
        let target = Store::open_in_memory().unwrap();
        target.import_json_str(&json, "new-phone").unwrap();

        assert!(target.get_patterns_by_device("old-phone").unwrap().is_empty());
        let patterns = target.get_patterns_by_device("new-phone").unwrap();
        assert_eq!(patterns[0].device_id, "new-phone");
        assert!(patterns[0].auto_apply);
        assert_eq!(target.meal_count("new-phone").unwrap(), 1);
    }

    #[test]
    fn test_import_does_not_lower_counts() {
        let store = seeded("p");
        let older = r#"{
            "version": "1.0",
            "deviceId": "p",
            "patterns": [{"deviceId": "p", "originalName": "油条", "occurrenceCount": 1}]
        }"#;
        store.import_json_str(older, "p").unwrap();
        let row = store.get_pattern("p", "油条").unwrap().unwrap();
        assert_eq!(row.occurrence_count, 3);
        assert!(row.auto_apply);
        assert_eq!(row.corrected_name.as_deref(), Some("油饼"));
    }

    #[test]
    fn test_import_derives_auto_apply_from_count() {
        let store = Store::open_in_memory().unwrap();
        let bundle = r#"{
            "version": "1.0",
            "deviceId": "p",
            "patterns": [
                {"deviceId": "p", "originalName": "油条", "correctedGrams": 60, "occurrenceCount": 5},
                {"deviceId": "p", "originalName": "米饭", "occurrenceCount": 2}
            ]
        }"#;
        store.import_json_str(bundle, "p").unwrap();

        let learner = HabitLearner::load(&store, "p").unwrap();
        assert!(learner.get("油条").unwrap().auto_apply);
        assert!(!learner.get("米饭").unwrap().auto_apply);
        assert!(learner.is_trusted_meal(&[Ingredient::new("油条", 100.0)]));

        let row = store.get_pattern("p", "油条").unwrap().unwrap();
        assert!(row.auto_apply);
    }

    #[test]
    fn test_import_rejects_zero_count() {
        let store = Store::open_in_memory().unwrap();
        let bundle = r#"{
            "version": "1.0",
            "deviceId": "p",
            "patterns": [
                {"deviceId": "p", "originalName": "油条", "occurrenceCount": 5},
                {"deviceId": "p", "originalName": "米饭", "occurrenceCount": 0}
            ]
        }"#;
        let err = store.import_json_str(bundle, "p").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
        assert!(store.get_patterns_by_device("p").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_invalid_data() {
        let store = Store::open_in_memory().unwrap();
        let err = store.import_json_str("{not json", "p").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        seeded("p").export_json_file(&path, "p").unwrap();

        let target = Store::open_in_memory().unwrap();
        let summary = target.import_json_file(&path, "p").unwrap();
        assert_eq!(summary.meals, 1);
    }

    #[test]
    fn test_missing_file_is_invalid_data() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .import_json_file(Path::new("/nonexistent/export.json"), "p")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
