//! One-pass meal analysis and the persisted meal record.
//!
//! Data flows one way: classify → evaluate order → curve and scores →
//! advisories. Nothing here touches storage; the caller decides whether the
//! resulting [`MealRecord`] is saved.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::advisory::{
    Advisory, AdvisoryKey, Clock, battery_advisory, match_advisory, performance_advisory,
    sequence_advisory,
};
use crate::classify::{Category, CategoryCounts, classify, dominant_category};
use crate::constants::DEFAULT_CRASH_OFFSET_HOURS;
use crate::curve::{CurveSummary, synthesize};
use crate::ingredient::{Ingredient, MacroTargets, MacroTotals};
use crate::scoring::{ScoreResult, score_meal};
use crate::sequence::{SequenceQuality, evaluate_categories, recommended_order};
use crate::time::now_iso8601;

/// Everything an analysis needs besides the ingredients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisContext {
    pub targets: MacroTargets,
    /// Glycemic index of the meal when known.
    pub gi: Option<f64>,
    /// Local hour of day the meal is eaten (0..=23).
    pub current_hour: u32,
    pub crash_offset_hours: u32,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            targets: MacroTargets::default(),
            gi: None,
            current_hour: 12,
            crash_offset_hours: DEFAULT_CRASH_OFFSET_HOURS,
        }
    }
}

impl AnalysisContext {
    fn clock(&self) -> Clock {
        Clock {
            current_hour: self.current_hour,
            crash_offset_hours: self.crash_offset_hours,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIngredient {
    pub name: String,
    pub grams: f64,
    pub category: Category,
}

/// Result of [`analyze_meal`]. Ephemeral; only the inputs are persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealAnalysis {
    pub items: Vec<ClassifiedIngredient>,
    pub counts: CategoryCounts,
    pub quality: SequenceQuality,
    pub dominant: Option<Category>,
    pub curve: Vec<f64>,
    pub curve_summary: Option<CurveSummary>,
    pub totals: MacroTotals,
    pub scores: ScoreResult,
    /// Sequence, performance, battery and match advice, in that order.
    pub advisories: Vec<Advisory>,
    /// Ingredient names in the suggested eating order.
    pub recommended_order: Vec<String>,
}

impl MealAnalysis {
    fn advisory(&self, prefix: &str) -> Option<&Advisory> {
        self.advisories
            .iter()
            .find(|a| a.key.as_str().starts_with(prefix))
    }

    /// Key written into a meal record's `verdict`.
    pub fn verdict_key(&self) -> AdvisoryKey {
        self.advisory("sequence.")
            .map(|a| a.key)
            .unwrap_or(AdvisoryKey::SequenceModerate)
    }

    /// Key written into a meal record's `suggestion`.
    pub fn suggestion_key(&self) -> AdvisoryKey {
        self.advisory("performance.")
            .map(|a| a.key)
            .unwrap_or(AdvisoryKey::PerformanceSteady)
    }
}

pub fn analyze_meal(ingredients: &[Ingredient], ctx: &AnalysisContext) -> MealAnalysis {
    let categories: Vec<Category> = ingredients.iter().map(classify).collect();
    let items = ingredients
        .iter()
        .zip(&categories)
        .map(|(ing, cat)| ClassifiedIngredient {
            name: ing.name.clone(),
            grams: ing.grams,
            category: *cat,
        })
        .collect();

    let counts = CategoryCounts::of(ingredients);
    let quality = evaluate_categories(&categories);
    let dominant = dominant_category(ingredients);
    let curve = synthesize(quality, dominant);
    let curve_summary = CurveSummary::of(&curve);
    let totals = MacroTotals::of(ingredients);
    let scores = score_meal(&totals, &ctx.targets, ctx.gi);

    let clock = ctx.clock();
    let advisories = vec![
        sequence_advisory(quality, &counts, clock),
        performance_advisory(scores.performance_index),
        battery_advisory(scores.battery_level, clock),
        match_advisory(scores.match_score),
    ];

    let recommended_order = recommended_order(ingredients)
        .into_iter()
        .map(|i| i.name)
        .collect();

    MealAnalysis {
        items,
        counts,
        quality,
        dominant,
        curve,
        curve_summary,
        totals,
        scores,
        advisories,
        recommended_order,
    }
}

/// Durable meal log entry, owned by the persistence collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRecord {
    pub id: Uuid,
    pub device_id: String,
    #[serde(default)]
    pub food: String,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub totals: MacroTotals,
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub eaten_at: String,
}

impl MealRecord {
    pub fn new(
        device_id: &str,
        food: &str,
        ingredients: Vec<Ingredient>,
        analysis: &MealAnalysis,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            food: food.to_string(),
            ingredients,
            totals: analysis.totals,
            verdict: analysis.verdict_key().as_str().to_string(),
            suggestion: analysis.suggestion_key().as_str().to_string(),
            eaten_at: now_iso8601(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoreState;

    fn rice() -> Ingredient {
        Ingredient::new("白米饭", 200.0).with_macros(4.0, 0.6, 44.0, 200.0)
    }

    fn broccoli() -> Ingredient {
        Ingredient::new("西兰花", 80.0).with_macros(2.0, 0.3, 6.0, 34.0)
    }

    #[test]
    fn test_analysis_carb_first() {
        let a = analyze_meal(&[rice(), broccoli()], &AnalysisContext::default());
        assert_eq!(a.quality, SequenceQuality::Poor);
        assert_eq!(a.items[0].category, Category::CarbLead);
        assert_eq!(a.items[1].category, Category::FiberLead);
        assert_eq!(a.dominant, Some(Category::CarbLead));
        assert_eq!(a.curve.len(), 25);
        assert_eq!(a.recommended_order, vec!["西兰花", "白米饭"]);
        assert_eq!(a.verdict_key(), AdvisoryKey::SequencePoor);
        assert_eq!(a.advisories.len(), 4);
    }

    #[test]
    fn test_analysis_scores_follow_totals() {
        let a = analyze_meal(&[broccoli(), rice()], &AnalysisContext::default());
        assert_eq!(a.quality, SequenceQuality::Optimal);
        assert!((a.totals.carbs_g - 50.0).abs() < 1e-10);
        assert_eq!(a.scores.battery_level, 100);
        assert_eq!(a.scores.battery_state, ScoreState::Surplus);
        // Optimal order, but carbs carry the most grams → spike curve
        assert!(a.curve_summary.unwrap().final_value < 30.0);
    }

    #[test]
    fn test_empty_meal() {
        let a = analyze_meal(&[], &AnalysisContext::default());
        assert_eq!(a.quality, SequenceQuality::Optimal);
        assert_eq!(a.dominant, None);
        assert!(a.items.is_empty());
        assert_eq!(a.verdict_key(), AdvisoryKey::SequenceOptimal);
    }

    #[test]
    fn test_record_carries_keys() {
        let meal = vec![rice(), broccoli()];
        let a = analyze_meal(&meal, &AnalysisContext::default());
        let record = MealRecord::new("dev", "rice and broccoli", meal, &a);
        assert_eq!(record.verdict, "sequence.poor");
        assert!(record.suggestion.starts_with("performance."));
        assert_eq!(record.totals, a.totals);
        assert!(record.eaten_at.ends_with('Z'));
    }

    #[test]
    fn test_record_wire_is_camel_case() {
        let a = analyze_meal(&[rice()], &AnalysisContext::default());
        let record = MealRecord::new("dev", "rice", vec![rice()], &a);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("deviceId").is_some());
        assert!(json.get("eatenAt").is_some());
    }
}
