//! Advisory selection: computed state → message key plus numeric inserts.
//!
//! Only keys and parameters are produced here. Turning a key into a
//! sentence is the localization layer's job.

use serde::{Deserialize, Serialize};

use crate::classify::{Category, CategoryCounts};
use crate::constants::{
    DEFAULT_CRASH_OFFSET_HOURS, LAST_HOUR_OF_DAY, LOSS_PER_POINT, MINUTES_PER_POINT,
    SCORE_MIDPOINT,
};
use crate::curve::{CurveSummary, synthesize};
use crate::scoring::{BATTERY_CUTPOINTS, MATCH_CUTPOINTS, PERFORMANCE_CUTPOINTS, ScoreState};
use crate::sequence::SequenceQuality;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvisoryKey {
    #[serde(rename = "sequence.add_fiber")]
    SequenceAddFiber,
    #[serde(rename = "sequence.poor")]
    SequencePoor,
    #[serde(rename = "sequence.moderate")]
    SequenceModerate,
    #[serde(rename = "sequence.optimal")]
    SequenceOptimal,
    #[serde(rename = "performance.high")]
    PerformanceHigh,
    #[serde(rename = "performance.steady")]
    PerformanceSteady,
    #[serde(rename = "performance.low")]
    PerformanceLow,
    #[serde(rename = "battery.full")]
    BatteryFull,
    #[serde(rename = "battery.steady")]
    BatterySteady,
    #[serde(rename = "battery.low")]
    BatteryLow,
    #[serde(rename = "match.balanced")]
    MatchBalanced,
    #[serde(rename = "match.fair")]
    MatchFair,
    #[serde(rename = "match.unbalanced")]
    MatchUnbalanced,
}

impl AdvisoryKey {
    pub fn as_str(self) -> &'static str {
        match self {
            AdvisoryKey::SequenceAddFiber => "sequence.add_fiber",
            AdvisoryKey::SequencePoor => "sequence.poor",
            AdvisoryKey::SequenceModerate => "sequence.moderate",
            AdvisoryKey::SequenceOptimal => "sequence.optimal",
            AdvisoryKey::PerformanceHigh => "performance.high",
            AdvisoryKey::PerformanceSteady => "performance.steady",
            AdvisoryKey::PerformanceLow => "performance.low",
            AdvisoryKey::BatteryFull => "battery.full",
            AdvisoryKey::BatterySteady => "battery.steady",
            AdvisoryKey::BatteryLow => "battery.low",
            AdvisoryKey::MatchBalanced => "match.balanced",
            AdvisoryKey::MatchFair => "match.fair",
            AdvisoryKey::MatchUnbalanced => "match.unbalanced",
        }
    }
}

/// Numeric inserts for the localized message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crash_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_loss: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_gained: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub key: AdvisoryKey,
    #[serde(default)]
    pub params: AdvisoryParams,
}

impl Advisory {
    fn bare(key: AdvisoryKey) -> Self {
        Self {
            key,
            params: AdvisoryParams::default(),
        }
    }
}

/// Hour offset and clock used for crash predictions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    pub current_hour: u32,
    pub crash_offset_hours: u32,
}

impl Clock {
    pub fn at(current_hour: u32) -> Self {
        Self {
            current_hour,
            crash_offset_hours: DEFAULT_CRASH_OFFSET_HOURS,
        }
    }

    pub fn crash_time(self) -> String {
        crash_time(self.current_hour, self.crash_offset_hours)
    }
}

/// `min(hour + offset, 23):00`. Never rolls over into the next day.
pub fn crash_time(current_hour: u32, offset_hours: u32) -> String {
    let hour = current_hour
        .saturating_add(offset_hours)
        .min(LAST_HOUR_OF_DAY);
    format!("{hour:02}:00")
}

/// `max(0, round((score − 50)·2.4))`
pub fn minutes_gained(score: f64) -> u32 {
    ((score - SCORE_MIDPOINT) * MINUTES_PER_POINT).round().max(0.0) as u32
}

/// `clamp(round((50 − score)·1.5), 0, 100)`
pub fn percent_loss(score: f64) -> u32 {
    ((SCORE_MIDPOINT - score) * LOSS_PER_POINT)
        .round()
        .clamp(0.0, 100.0) as u32
}

/// Most frequent category; ties resolve in priority order.
fn leading_category(counts: &CategoryCounts) -> Option<Category> {
    if counts.total() == 0 {
        return None;
    }
    let mut best = Category::PRIORITY[0];
    for c in Category::PRIORITY {
        if counts.get(c) > counts.get(best) {
            best = c;
        }
    }
    Some(best)
}

/// Advice on the eating order of a meal.
pub fn sequence_advisory(
    quality: SequenceQuality,
    counts: &CategoryCounts,
    clock: Clock,
) -> Advisory {
    if counts.fiber == 0 && counts.carb > 0 {
        return Advisory {
            key: AdvisoryKey::SequenceAddFiber,
            params: AdvisoryParams {
                crash_time: Some(clock.crash_time()),
                ..Default::default()
            },
        };
    }

    match quality {
        SequenceQuality::Poor => {
            let loss = CurveSummary::of(&synthesize(SequenceQuality::Poor, None))
                .map(|s| ((s.peak - s.final_value) / s.peak * 100.0).round().clamp(0.0, 100.0) as u32)
                .unwrap_or(0);
            Advisory {
                key: AdvisoryKey::SequencePoor,
                params: AdvisoryParams {
                    crash_time: Some(clock.crash_time()),
                    percent_loss: Some(loss),
                    minutes_gained: None,
                },
            }
        }
        SequenceQuality::Moderate => Advisory::bare(AdvisoryKey::SequenceModerate),
        SequenceQuality::Optimal => {
            let curve = synthesize(SequenceQuality::Optimal, leading_category(counts));
            let gained = CurveSummary::of(&curve)
                .map(|s| minutes_gained(s.mean))
                .unwrap_or(0);
            Advisory {
                key: AdvisoryKey::SequenceOptimal,
                params: AdvisoryParams {
                    minutes_gained: Some(gained),
                    ..Default::default()
                },
            }
        }
    }
}

pub fn performance_advisory(performance_index: u32) -> Advisory {
    let score = performance_index as f64;
    match PERFORMANCE_CUTPOINTS.classify(performance_index) {
        ScoreState::Surplus => Advisory {
            key: AdvisoryKey::PerformanceHigh,
            params: AdvisoryParams {
                minutes_gained: Some(minutes_gained(score)),
                ..Default::default()
            },
        },
        ScoreState::Deficit => Advisory {
            key: AdvisoryKey::PerformanceLow,
            params: AdvisoryParams {
                percent_loss: Some(percent_loss(score)),
                ..Default::default()
            },
        },
        ScoreState::Neutral => Advisory::bare(AdvisoryKey::PerformanceSteady),
    }
}

pub fn battery_advisory(battery_level: u32, clock: Clock) -> Advisory {
    match BATTERY_CUTPOINTS.classify(battery_level) {
        ScoreState::Surplus => Advisory::bare(AdvisoryKey::BatteryFull),
        ScoreState::Neutral => Advisory::bare(AdvisoryKey::BatterySteady),
        ScoreState::Deficit => Advisory {
            key: AdvisoryKey::BatteryLow,
            params: AdvisoryParams {
                crash_time: Some(clock.crash_time()),
                percent_loss: Some(percent_loss(battery_level as f64)),
                minutes_gained: None,
            },
        },
    }
}

pub fn match_advisory(match_score: u32) -> Advisory {
    match MATCH_CUTPOINTS.classify(match_score) {
        ScoreState::Surplus => Advisory::bare(AdvisoryKey::MatchBalanced),
        ScoreState::Neutral => Advisory::bare(AdvisoryKey::MatchFair),
        ScoreState::Deficit => Advisory::bare(AdvisoryKey::MatchUnbalanced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(fiber: usize, protein: usize, carb: usize) -> CategoryCounts {
        CategoryCounts {
            fiber,
            protein,
            carb,
        }
    }

    #[test]
    fn test_crash_time_clamps_to_same_day() {
        assert_eq!(crash_time(12, 2), "14:00");
        assert_eq!(crash_time(7, 2), "09:00");
        assert_eq!(crash_time(22, 2), "23:00");
        assert_eq!(crash_time(23, 2), "23:00");
        assert_eq!(crash_time(u32::MAX, 2), "23:00");
    }

    #[test]
    fn test_linear_transforms() {
        assert_eq!(minutes_gained(77.0), 65);
        assert_eq!(minutes_gained(40.0), 0);
        assert_eq!(percent_loss(30.0), 30);
        assert_eq!(percent_loss(70.0), 0);
        assert_eq!(percent_loss(-100.0), 100);
    }

    #[test]
    fn test_no_fiber_with_carbs_asks_for_fiber() {
        let a = sequence_advisory(SequenceQuality::Poor, &counts(0, 1, 1), Clock::at(12));
        assert_eq!(a.key, AdvisoryKey::SequenceAddFiber);
        assert_eq!(a.params.crash_time.as_deref(), Some("14:00"));
    }

    #[test]
    fn test_poor_sequence_params() {
        let a = sequence_advisory(SequenceQuality::Poor, &counts(1, 0, 1), Clock::at(21));
        assert_eq!(a.key, AdvisoryKey::SequencePoor);
        assert_eq!(a.params.crash_time.as_deref(), Some("23:00"));
        let loss = a.params.percent_loss.unwrap();
        assert!((70..=90).contains(&loss), "loss {loss}");
    }

    #[test]
    fn test_optimal_sequence_gains_minutes() {
        let a = sequence_advisory(SequenceQuality::Optimal, &counts(2, 1, 1), Clock::at(12));
        assert_eq!(a.key, AdvisoryKey::SequenceOptimal);
        assert!(a.params.minutes_gained.unwrap() > 80);
        assert!(a.params.crash_time.is_none());
    }

    #[test]
    fn test_moderate_sequence_is_bare() {
        let a = sequence_advisory(SequenceQuality::Moderate, &counts(1, 2, 1), Clock::at(12));
        assert_eq!(a, Advisory::bare(AdvisoryKey::SequenceModerate));
    }

    #[test]
    fn test_performance_buckets() {
        let high = performance_advisory(77);
        assert_eq!(high.key, AdvisoryKey::PerformanceHigh);
        assert_eq!(high.params.minutes_gained, Some(65));

        let low = performance_advisory(30);
        assert_eq!(low.key, AdvisoryKey::PerformanceLow);
        assert_eq!(low.params.percent_loss, Some(30));

        assert_eq!(performance_advisory(50).key, AdvisoryKey::PerformanceSteady);
    }

    #[test]
    fn test_battery_and_match_buckets() {
        assert_eq!(battery_advisory(90, Clock::at(9)).key, AdvisoryKey::BatteryFull);
        assert_eq!(battery_advisory(50, Clock::at(9)).key, AdvisoryKey::BatterySteady);
        let low = battery_advisory(30, Clock::at(9));
        assert_eq!(low.key, AdvisoryKey::BatteryLow);
        assert_eq!(low.params.crash_time.as_deref(), Some("11:00"));

        assert_eq!(match_advisory(80).key, AdvisoryKey::MatchBalanced);
        assert_eq!(match_advisory(60).key, AdvisoryKey::MatchFair);
        assert_eq!(match_advisory(10).key, AdvisoryKey::MatchUnbalanced);
    }

    #[test]
    fn test_key_wire_names_match_as_str() {
        for key in [
            AdvisoryKey::SequenceAddFiber,
            AdvisoryKey::SequencePoor,
            AdvisoryKey::PerformanceHigh,
            AdvisoryKey::BatteryLow,
            AdvisoryKey::MatchUnbalanced,
        ] {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }
}
