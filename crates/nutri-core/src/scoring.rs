//! Linear scoring formulas over meal totals.
//!
//! Every score is clamped to its closed range before it leaves this module,
//! and every score maps to a three-state bucket through its own cutpoints.
//! The cutpoints differ per formula on purpose and are not unified.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_GI, HEALTH_MEAL_CAP, HEALTH_SCORE_CAP};
use crate::ingredient::{MacroTargets, MacroTotals};
use crate::meal::MealRecord;
use crate::time::date_of;

/// Qualitative bucket of a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreState {
    Surplus,
    Neutral,
    Deficit,
}

impl ScoreState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreState::Surplus => "surplus",
            ScoreState::Neutral => "neutral",
            ScoreState::Deficit => "deficit",
        }
    }
}

/// `value >= surplus_at` is surplus, `value <= deficit_at` is deficit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cutpoints {
    pub surplus_at: u32,
    pub deficit_at: u32,
}

impl Cutpoints {
    pub fn classify(self, value: u32) -> ScoreState {
        if value >= self.surplus_at {
            ScoreState::Surplus
        } else if value <= self.deficit_at {
            ScoreState::Deficit
        } else {
            ScoreState::Neutral
        }
    }
}

pub const PERFORMANCE_CUTPOINTS: Cutpoints = Cutpoints {
    surplus_at: 65,
    deficit_at: 40,
};

pub const BATTERY_CUTPOINTS: Cutpoints = Cutpoints {
    surplus_at: 70,
    deficit_at: 35,
};

pub const MATCH_CUTPOINTS: Cutpoints = Cutpoints {
    surplus_at: 75,
    deficit_at: 45,
};

/// Deficit below 500 (i.e. at most 499).
pub const HEALTH_CUTPOINTS: Cutpoints = Cutpoints {
    surplus_at: 2000,
    deficit_at: 499,
};

fn clamp_round(value: f64, lo: u32, hi: u32) -> u32 {
    if value.is_nan() {
        return lo;
    }
    value.round().clamp(lo as f64, hi as f64) as u32
}

// ---------------------------------------------------------------------------
// Performance index (BPI)
// ---------------------------------------------------------------------------

/// Inputs to the performance index. Fiber and glycemic load are estimated
/// from carbohydrate mass when the recognizer did not supply them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInput {
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    #[serde(default)]
    pub fiber_g: Option<f64>,
    #[serde(default)]
    pub glycemic_load: Option<f64>,
}

impl From<&MacroTotals> for PerformanceInput {
    fn from(t: &MacroTotals) -> Self {
        Self {
            protein_g: t.protein_g,
            fat_g: t.fat_g,
            carbs_g: t.carbs_g,
            fiber_g: None,
            glycemic_load: None,
        }
    }
}

pub fn estimate_fiber(carbs_g: f64) -> f64 {
    carbs_g * 0.08
}

pub fn estimate_glycemic_load(carbs_g: f64) -> f64 {
    carbs_g * 0.55
}

/// `round(50 + 0.6·protein + 1.2·fiber − 0.4·GL − 0.15·fat)` in `[0, 100]`.
pub fn performance_index(input: &PerformanceInput) -> u32 {
    let fiber = input.fiber_g.unwrap_or_else(|| estimate_fiber(input.carbs_g));
    let gl = input
        .glycemic_load
        .unwrap_or_else(|| estimate_glycemic_load(input.carbs_g));
    let raw = 50.0 + input.protein_g * 0.6 + fiber * 1.2 - gl * 0.4 - input.fat_g * 0.15;
    clamp_round(raw, 0, 100)
}

// ---------------------------------------------------------------------------
// Battery level
// ---------------------------------------------------------------------------

/// Brain-charge level in `[5, 100]`: fixed penalties past thresholds plus a
/// small protein bonus. `gi` defaults to 55.
pub fn battery_level(totals: &MacroTotals, gi: Option<f64>) -> u32 {
    let gi = gi.unwrap_or(DEFAULT_GI);
    let mut level = 100.0;

    if totals.carbs_g > 60.0 {
        level -= 15.0;
    }
    if gi > 70.0 {
        level -= 20.0;
    }
    if totals.fat_g > 25.0 {
        level -= 15.0;
    }
    if totals.calories > 800.0 {
        level -= 10.0;
    }
    if totals.calories > 1200.0 {
        level -= 10.0;
    }
    level += (totals.protein_g * 0.2).min(10.0);

    clamp_round(level, 5, 100)
}

// ---------------------------------------------------------------------------
// Macro match
// ---------------------------------------------------------------------------

/// Fraction of the daily target one meal should ideally cover.
const IDEAL_MEAL_SHARE: f64 = 1.0 / 3.0;

fn nutrient_match(actual: f64, target: f64) -> f64 {
    let ratio = if target > 0.0 { actual / target } else { 0.0 };
    (1.0 - 2.5 * (ratio - IDEAL_MEAL_SHARE).abs()).max(0.0)
}

/// How close the meal is to a balanced third of each daily target, `[0, 100]`.
pub fn match_score(actual: &MacroTotals, target: &MacroTargets) -> u32 {
    let parts = [
        nutrient_match(actual.calories, target.calories),
        nutrient_match(actual.protein_g, target.protein_g),
        nutrient_match(actual.fat_g, target.fat_g),
        nutrient_match(actual.carbs_g, target.carbs_g),
    ];
    let mean = parts.iter().sum::<f64>() / parts.len() as f64;
    clamp_round(mean * 100.0, 0, 100)
}

// ---------------------------------------------------------------------------
// Cumulative health score
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthLevel {
    Beginner,
    Regular,
    Expert,
    Master,
}

impl HealthLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 5000 => HealthLevel::Master,
            s if s >= 2000 => HealthLevel::Expert,
            s if s >= 500 => HealthLevel::Regular,
            _ => HealthLevel::Beginner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthLevel::Beginner => "beginner",
            HealthLevel::Regular => "regular",
            HealthLevel::Expert => "expert",
            HealthLevel::Master => "master",
        }
    }
}

/// `min(meals·50, 3000) + days·100`, capped at 9999.
pub fn health_score(total_meals: u32, unique_days: u32) -> u32 {
    let meals = total_meals.saturating_mul(50).min(HEALTH_MEAL_CAP);
    meals
        .saturating_add(unique_days.saturating_mul(100))
        .min(HEALTH_SCORE_CAP)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_meals: u32,
    pub unique_days: u32,
    pub score: u32,
    pub level: HealthLevel,
    pub state: ScoreState,
}

impl HealthSummary {
    pub fn new(total_meals: u32, unique_days: u32) -> Self {
        let score = health_score(total_meals, unique_days);
        Self {
            total_meals,
            unique_days,
            score,
            level: HealthLevel::from_score(score),
            state: HEALTH_CUTPOINTS.classify(score),
        }
    }
}

/// Health summary over a device's meal log. Days are UTC calendar dates of
/// `eaten_at`; records with an unparseable timestamp count as meals only.
pub fn health_from_meals(meals: &[MealRecord]) -> HealthSummary {
    let days: BTreeSet<&str> = meals.iter().filter_map(|m| date_of(&m.eaten_at)).collect();
    let total = u32::try_from(meals.len()).unwrap_or(u32::MAX);
    let unique = u32::try_from(days.len()).unwrap_or(u32::MAX);
    HealthSummary::new(total, unique)
}

// ---------------------------------------------------------------------------
// Per-meal bundle
// ---------------------------------------------------------------------------

/// Bounded per-meal scores and their buckets. Recomputed on demand, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub battery_level: u32,
    pub battery_state: ScoreState,
    pub match_score: u32,
    pub match_state: ScoreState,
    pub performance_index: u32,
    pub performance_state: ScoreState,
}

pub fn score_meal(totals: &MacroTotals, targets: &MacroTargets, gi: Option<f64>) -> ScoreResult {
    let battery = battery_level(totals, gi);
    let matched = match_score(totals, targets);
    let bpi = performance_index(&PerformanceInput::from(totals));

    ScoreResult {
        battery_level: battery,
        battery_state: BATTERY_CUTPOINTS.classify(battery),
        match_score: matched,
        match_state: MATCH_CUTPOINTS.classify(matched),
        performance_index: bpi,
        performance_state: PERFORMANCE_CUTPOINTS.classify(bpi),
    }
}
