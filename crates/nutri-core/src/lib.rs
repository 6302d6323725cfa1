//! Meal scoring and eating-order advisory engine.
//!
//! Classifies recognized ingredients as fiber-, protein- or carb-leading,
//! judges the order they are eaten in, synthesizes a normalized blood-glucose
//! curve, computes the performance, battery, match and health scores, and
//! learns each device's correction habits.
//!
//! Zero I/O. Persistence goes through the [`Repository`] seam; the clock is
//! passed in through [`AnalysisContext`].

pub mod advisory;
pub mod classify;
pub mod constants;
pub mod curve;
pub mod habit;
pub mod ingredient;
pub mod meal;
pub mod repository;
pub mod scoring;
pub mod sequence;
pub mod time;
pub mod wire;

pub use advisory::{Advisory, AdvisoryKey, AdvisoryParams, Clock, crash_time};
pub use classify::{Category, CategoryCounts, classify, dominant_category};
pub use constants::{AUTO_APPLY_THRESHOLD, CURVE_POINTS, CURVE_STEP_MINUTES};
pub use curve::{CurveShape, CurveSummary, synthesize};
pub use habit::{HabitApplication, HabitEdit, HabitLearner, HabitPattern};
pub use ingredient::{CookMethod, Ingredient, MacroTargets, MacroTotals, apply_cook_method};
pub use meal::{AnalysisContext, MealAnalysis, MealRecord, analyze_meal};
pub use repository::{MemoryRepository, Repository};
pub use scoring::{
    HealthLevel, HealthSummary, ScoreResult, ScoreState, battery_level, health_from_meals,
    health_score, match_score, performance_index, score_meal,
};
pub use sequence::{SequenceQuality, evaluate, recommended_order};
pub use time::{now_iso8601, now_unix_secs, unix_to_iso8601};
pub use wire::{CURRENT_VERSION, RecognitionResult, WireExport, export_json, import_json};
