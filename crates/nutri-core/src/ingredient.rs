use serde::{Deserialize, Serialize};

/// One recognized component of a meal.
///
/// Macro fields default to zero when absent so a partial recognition never
/// blocks logging the meal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub grams: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub calories: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_method: Option<CookMethod>,
}

impl Ingredient {
    pub fn new(name: &str, grams: f64) -> Self {
        Self {
            name: name.to_string(),
            grams: grams.max(0.0),
            protein_g: 0.0,
            fat_g: 0.0,
            carbs_g: 0.0,
            calories: 0.0,
            cook_method: None,
        }
    }

    /// Builder-style macro assignment: protein, fat, carbs (grams) and calories.
    pub fn with_macros(mut self, protein_g: f64, fat_g: f64, carbs_g: f64, calories: f64) -> Self {
        self.protein_g = protein_g;
        self.fat_g = fat_g;
        self.carbs_g = carbs_g;
        self.calories = calories;
        self
    }

    /// Sum of the three macronutrients in grams.
    pub fn macro_mass(&self) -> f64 {
        self.protein_g + self.fat_g + self.carbs_g
    }

    /// Whether any macro or calorie value was recorded.
    pub fn has_macros(&self) -> bool {
        self.macro_mass() > 0.0 || self.calories > 0.0
    }

    /// Rescale grams and all macros to a new portion size.
    /// A zero original portion only updates grams.
    pub fn rescaled(&self, grams: f64) -> Self {
        let grams = grams.max(0.0);
        let mut out = self.clone();
        if self.grams > 0.0 {
            let factor = grams / self.grams;
            out.protein_g *= factor;
            out.fat_g *= factor;
            out.carbs_g *= factor;
            out.calories *= factor;
        }
        out.grams = grams;
        out
    }
}

/// Preparation method. Changes fat and calories, never the category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CookMethod {
    Steam,
    StirFry,
    DeepFry,
    Braise,
}

impl CookMethod {
    /// (fat multiplier, calorie multiplier)
    pub fn multipliers(self) -> (f64, f64) {
        match self {
            CookMethod::Steam => (1.0, 1.0),
            CookMethod::StirFry => (1.3, 1.15),
            CookMethod::DeepFry => (1.8, 1.4),
            CookMethod::Braise => (1.2, 1.1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CookMethod::Steam => "steam",
            CookMethod::StirFry => "stirFry",
            CookMethod::DeepFry => "deepFry",
            CookMethod::Braise => "braise",
        }
    }

    /// Parse either the camelCase wire name or a loose CLI spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "steam" | "steamed" | "蒸" => Some(CookMethod::Steam),
            "stirfry" | "stirfried" | "炒" => Some(CookMethod::StirFry),
            "deepfry" | "deepfried" | "fried" | "炸" => Some(CookMethod::DeepFry),
            "braise" | "braised" | "炖" | "焖" => Some(CookMethod::Braise),
            _ => None,
        }
    }
}

/// Apply the cooking-method multipliers to a raw ingredient.
///
/// This runs before scoring and is never called by the classifier. The
/// method is recorded on the returned ingredient.
pub fn apply_cook_method(ingredient: &Ingredient, method: CookMethod) -> Ingredient {
    let (fat_mul, cal_mul) = method.multipliers();
    let mut out = ingredient.clone();
    out.fat_g *= fat_mul;
    out.calories *= cal_mul;
    out.cook_method = Some(method);
    out
}

/// Summed macros over a meal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

impl MacroTotals {
    pub fn of(ingredients: &[Ingredient]) -> Self {
        ingredients.iter().fold(Self::default(), |acc, i| Self {
            calories: acc.calories + i.calories,
            protein_g: acc.protein_g + i.protein_g,
            fat_g: acc.fat_g + i.fat_g,
            carbs_g: acc.carbs_g + i.carbs_g,
        })
    }
}

/// Per-nutrient daily targets the macro match score compares against.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroTargets {
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
}

impl Default for MacroTargets {
    fn default() -> Self {
        Self {
            calories: 2000.0,
            protein_g: 60.0,
            fat_g: 65.0,
            carbs_g: 275.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rice() -> Ingredient {
        Ingredient::new("rice", 200.0).with_macros(4.0, 0.6, 44.0, 200.0)
    }

    #[test]
    fn test_missing_macros_default_to_zero() {
        let ing: Ingredient = serde_json::from_str(r#"{"name":"油条"}"#).unwrap();
        assert_eq!(ing.grams, 0.0);
        assert_eq!(ing.protein_g, 0.0);
        assert_eq!(ing.calories, 0.0);
        assert!(ing.cook_method.is_none());
        assert!(!ing.has_macros());
    }

    #[test]
    fn test_negative_grams_clamped() {
        assert_eq!(Ingredient::new("x", -5.0).grams, 0.0);
    }

    #[test]
    fn test_rescaled_scales_macros() {
        let half = rice().rescaled(100.0);
        assert_eq!(half.grams, 100.0);
        assert!((half.carbs_g - 22.0).abs() < 1e-10);
        assert!((half.calories - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_rescaled_from_zero_grams_only_sets_grams() {
        let ing = Ingredient::new("x", 0.0).with_macros(1.0, 1.0, 1.0, 10.0);
        let out = ing.rescaled(50.0);
        assert_eq!(out.grams, 50.0);
        assert_eq!(out.calories, 10.0);
    }

    #[test]
    fn test_deep_fry_multipliers() {
        let fried = apply_cook_method(&rice(), CookMethod::DeepFry);
        assert!((fried.fat_g - 0.6 * 1.8).abs() < 1e-10);
        assert!((fried.calories - 280.0).abs() < 1e-10);
        assert_eq!(fried.protein_g, 4.0);
        assert_eq!(fried.carbs_g, 44.0);
        assert_eq!(fried.cook_method, Some(CookMethod::DeepFry));
    }

    #[test]
    fn test_steam_is_identity_on_macros() {
        let steamed = apply_cook_method(&rice(), CookMethod::Steam);
        assert_eq!(steamed.fat_g, rice().fat_g);
        assert_eq!(steamed.calories, rice().calories);
    }

    #[test]
    fn test_cook_method_parse() {
        assert_eq!(CookMethod::parse("stir-fry"), Some(CookMethod::StirFry));
        assert_eq!(CookMethod::parse("deepFry"), Some(CookMethod::DeepFry));
        assert_eq!(CookMethod::parse("炖"), Some(CookMethod::Braise));
        assert_eq!(CookMethod::parse("grill"), None);
    }

    #[test]
    fn test_cook_method_wire_name() {
        let json = serde_json::to_string(&CookMethod::StirFry).unwrap();
        assert_eq!(json, "\"stirFry\"");
        for m in [
            CookMethod::Steam,
            CookMethod::StirFry,
            CookMethod::DeepFry,
            CookMethod::Braise,
        ] {
            assert_eq!(CookMethod::parse(m.as_str()), Some(m));
        }
    }

    #[test]
    fn test_totals() {
        let broccoli = Ingredient::new("broccoli", 80.0).with_macros(2.0, 0.3, 6.0, 34.0);
        let t = MacroTotals::of(&[rice(), broccoli]);
        assert!((t.calories - 234.0).abs() < 1e-10);
        assert!((t.protein_g - 6.0).abs() < 1e-10);
        assert!((t.fat_g - 0.9).abs() < 1e-10);
        assert!((t.carbs_g - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_targets_partial_toml_style_defaults() {
        let t: MacroTargets = serde_json::from_str(r#"{"protein_g": 90}"#).unwrap();
        assert_eq!(t.protein_g, 90.0);
        assert_eq!(t.calories, 2000.0);
    }
}
