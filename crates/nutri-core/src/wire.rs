//! JSON wire formats.
//!
//! Two shapes cross the engine boundary as JSON: the payload the image
//! recognition service returns for a photographed meal, and the export
//! bundle of one device's learned patterns and meal log.

use serde::{Deserialize, Serialize};

use crate::habit::HabitPattern;
use crate::ingredient::{Ingredient, MacroTotals};
use crate::meal::MealRecord;
use crate::time::now_iso8601;

pub const CURRENT_VERSION: &str = "1.0";

// --- Recognition payload ---

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedIngredient {
    pub name: String,
    #[serde(default)]
    pub grams: f64,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub fat_g: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
}

impl RecognizedIngredient {
    fn has_macros(&self) -> bool {
        self.protein_g.is_some()
            || self.fat_g.is_some()
            || self.carbs_g.is_some()
            || self.calories.is_some()
    }
}

/// What the vision service returns for one photo. Every field is optional
/// on the wire; absent numbers read as zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionResult {
    pub food: String,
    pub ingredients: Vec<RecognizedIngredient>,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub verdict: String,
    pub suggestion: String,
}

impl RecognitionResult {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn totals(&self) -> MacroTotals {
        MacroTotals {
            calories: self.calories,
            protein_g: self.protein_g,
            fat_g: self.fat_g,
            carbs_g: self.carbs_g,
        }
    }

    /// Engine ingredients, in recognition order.
    ///
    /// Items that carry their own macros keep them. Whatever remains of the
    /// meal-level totals is spread over the other items by grams, or evenly
    /// when none of them has a weight.
    pub fn to_ingredients(&self) -> Vec<Ingredient> {
        let explicit = self
            .ingredients
            .iter()
            .filter(|r| r.has_macros())
            .fold(MacroTotals::default(), |acc, r| MacroTotals {
                calories: acc.calories + r.calories.unwrap_or(0.0),
                protein_g: acc.protein_g + r.protein_g.unwrap_or(0.0),
                fat_g: acc.fat_g + r.fat_g.unwrap_or(0.0),
                carbs_g: acc.carbs_g + r.carbs_g.unwrap_or(0.0),
            });
        let remaining = MacroTotals {
            calories: (self.calories - explicit.calories).max(0.0),
            protein_g: (self.protein_g - explicit.protein_g).max(0.0),
            fat_g: (self.fat_g - explicit.fat_g).max(0.0),
            carbs_g: (self.carbs_g - explicit.carbs_g).max(0.0),
        };

        let implicit: Vec<&RecognizedIngredient> =
            self.ingredients.iter().filter(|r| !r.has_macros()).collect();
        let implicit_grams: f64 = implicit.iter().map(|r| r.grams.max(0.0)).sum();
        let share = |r: &RecognizedIngredient| {
            if implicit_grams > 0.0 {
                r.grams.max(0.0) / implicit_grams
            } else {
                1.0 / implicit.len() as f64
            }
        };

        self.ingredients
            .iter()
            .map(|r| {
                let base = Ingredient::new(&r.name, r.grams);
                if r.has_macros() {
                    base.with_macros(
                        r.protein_g.unwrap_or(0.0),
                        r.fat_g.unwrap_or(0.0),
                        r.carbs_g.unwrap_or(0.0),
                        r.calories.unwrap_or(0.0),
                    )
                } else {
                    let s = share(r);
                    base.with_macros(
                        remaining.protein_g * s,
                        remaining.fat_g * s,
                        remaining.carbs_g * s,
                        remaining.calories * s,
                    )
                }
            })
            .collect()
    }
}

// --- Device export bundle ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireExport {
    pub version: String,
    #[serde(default)]
    pub timestamp: String,
    pub device_id: String,
    #[serde(default)]
    pub patterns: Vec<HabitPattern>,
    #[serde(default)]
    pub meals: Vec<MealRecord>,
}

/// Serialize one device's patterns and meals to pretty JSON.
pub fn export_json(
    device_id: &str,
    patterns: &[HabitPattern],
    meals: &[MealRecord],
) -> Result<String, serde_json::Error> {
    let export = WireExport {
        version: CURRENT_VERSION.to_string(),
        timestamp: now_iso8601(),
        device_id: device_id.to_string(),
        patterns: patterns.to_vec(),
        meals: meals.to_vec(),
    };
    serde_json::to_string_pretty(&export)
}

pub fn import_json(json: &str) -> Result<WireExport, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{HabitEdit, HabitLearner};
    use crate::meal::{AnalysisContext, analyze_meal};

    const PAYLOAD: &str = r#"{
        "food": "rice with broccoli",
        "ingredients": [
            {"name": "白米饭", "grams": 200},
            {"name": "西兰花", "grams": 50}
        ],
        "calories": 250,
        "protein_g": 5,
        "fat_g": 1,
        "carbs_g": 50,
        "verdict": "ok",
        "suggestion": "eat greens first"
    }"#;

    #[test]
    fn test_parse_recognition() {
        let r = RecognitionResult::parse(PAYLOAD).unwrap();
        assert_eq!(r.food, "rice with broccoli");
        assert_eq!(r.ingredients.len(), 2);
        assert_eq!(r.totals().carbs_g, 50.0);
    }

    #[test]
    fn test_totals_spread_by_grams() {
        let r = RecognitionResult::parse(PAYLOAD).unwrap();
        let ings = r.to_ingredients();
        assert!((ings[0].carbs_g - 40.0).abs() < 1e-10);
        assert!((ings[1].carbs_g - 10.0).abs() < 1e-10);
        assert!((ings[0].calories + ings[1].calories - 250.0).abs() < 1e-10);
    }

    #[test]
    fn test_explicit_macros_kept_and_remainder_spread() {
        let json = r#"{
            "calories": 300, "protein_g": 20, "fat_g": 5, "carbs_g": 40,
            "ingredients": [
                {"name": "鸡胸肉", "grams": 100, "protein_g": 18, "calories": 120},
                {"name": "米饭", "grams": 150},
                {"name": "青菜", "grams": 0}
            ]
        }"#;
        let ings = RecognitionResult::parse(json).unwrap().to_ingredients();
        assert_eq!(ings[0].protein_g, 18.0);
        assert_eq!(ings[0].carbs_g, 0.0);
        // remaining protein 2, calories 180, all to the only weighted item
        assert!((ings[1].protein_g - 2.0).abs() < 1e-10);
        assert!((ings[1].calories - 180.0).abs() < 1e-10);
        assert_eq!(ings[2].calories, 0.0);
    }

    #[test]
    fn test_even_split_without_grams() {
        let json = r#"{"calories": 100, "ingredients": [{"name": "a"}, {"name": "b"}]}"#;
        let ings = RecognitionResult::parse(json).unwrap().to_ingredients();
        assert!((ings[0].calories - 50.0).abs() < 1e-10);
        assert!((ings[1].calories - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_missing_everything_is_tolerated() {
        let r = RecognitionResult::parse("{}").unwrap();
        assert!(r.to_ingredients().is_empty());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut learner = HabitLearner::new("dev-1");
        learner.record_edit(&HabitEdit::new("油条").rename("油饼"));
        let patterns: Vec<HabitPattern> = learner.patterns().cloned().collect();

        let ings = RecognitionResult::parse(PAYLOAD).unwrap().to_ingredients();
        let analysis = analyze_meal(&ings, &AnalysisContext::default());
        let meals = vec![MealRecord::new("dev-1", "rice", ings, &analysis)];

        let json = export_json("dev-1", &patterns, &meals).unwrap();
        assert!(json.contains("\"deviceId\""));
        assert!(json.contains("\"originalName\""));

        let back = import_json(&json).unwrap();
        assert_eq!(back.version, CURRENT_VERSION);
        assert_eq!(back.device_id, "dev-1");
        assert_eq!(back.patterns, patterns);
        assert_eq!(back.meals, meals);
    }

    #[test]
    fn test_import_tolerates_missing_optional_fields() {
        let json = r#"{
            "version": "1.0",
            "deviceId": "d",
            "patterns": [{"deviceId": "d", "originalName": "rice", "occurrenceCount": 2}]
        }"#;
        let back = import_json(json).unwrap();
        assert_eq!(back.patterns[0].occurrence_count, 2);
        assert!(!back.patterns[0].auto_apply);
        assert!(back.meals.is_empty());
    }
}
