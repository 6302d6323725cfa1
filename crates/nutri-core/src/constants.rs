/// Occurrences of the same correction needed before it is applied silently.
pub const AUTO_APPLY_THRESHOLD: u32 = 3;

/// Fraction of a meal (from the front) in which a carb-lead item marks the order as poor.
pub const EARLY_CARB_FRACTION: f64 = 0.3;

/// Macro-ratio fallback: carbs share above this classifies as carb-lead.
pub const CARB_RATIO_CUTOFF: f64 = 0.6;

/// Macro-ratio fallback: protein share above this classifies as protein-lead.
pub const PROTEIN_RATIO_CUTOFF: f64 = 0.4;

/// Number of points in a synthesized energy curve (0..=4h inclusive).
pub const CURVE_POINTS: usize = 25;

/// Minutes represented by one curve step (4h / 24 steps).
pub const CURVE_STEP_MINUTES: u32 = 10;

/// Lowest value the poor-order curve may reach.
pub const POOR_CURVE_FLOOR: f64 = 15.0;

/// Glycemic index assumed when none is supplied.
pub const DEFAULT_GI: f64 = 55.0;

/// Hours after the current hour at which an energy crash is predicted.
pub const DEFAULT_CRASH_OFFSET_HOURS: u32 = 2;

/// Latest hour of the day a predicted crash may be scheduled at.
pub const LAST_HOUR_OF_DAY: u32 = 23;

/// Neutral midpoint used by the linear advisory transforms.
pub const SCORE_MIDPOINT: f64 = 50.0;

/// Focus minutes gained per score point above the midpoint.
pub const MINUTES_PER_POINT: f64 = 2.4;

/// Percentage of focus lost per score point below the midpoint.
pub const LOSS_PER_POINT: f64 = 1.5;

/// Cumulative health score: meal contribution cap.
pub const HEALTH_MEAL_CAP: u32 = 3000;

/// Cumulative health score: absolute cap.
pub const HEALTH_SCORE_CAP: u32 = 9999;
