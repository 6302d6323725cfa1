//! Deterministic 0–4 hour energy/focus projection.
//!
//! Each (quality, dominant category) pair maps to one closed-form curve so
//! the presentation layer can render a stable chart without any randomness.
//! Points are sampled at `t = i / 24` for `i` in `0..=24`, ten minutes apart.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::constants::{CURVE_POINTS, CURVE_STEP_MINUTES, POOR_CURVE_FLOOR};
use crate::sequence::SequenceQuality;

/// Which closed-form curve a (quality, dominant) pair selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurveShape {
    SpikeCrash,
    FiberPlateau,
    Plateau,
    GentleBump,
}

impl CurveShape {
    pub fn select(quality: SequenceQuality, dominant: Option<Category>) -> Self {
        match (quality, dominant) {
            (SequenceQuality::Poor, _) | (_, Some(Category::CarbLead)) => CurveShape::SpikeCrash,
            (SequenceQuality::Optimal, Some(Category::FiberLead)) => CurveShape::FiberPlateau,
            (SequenceQuality::Optimal, _) => CurveShape::Plateau,
            (SequenceQuality::Moderate, _) => CurveShape::GentleBump,
        }
    }

    /// Value at normalized time `t` in `[0, 1]`.
    pub fn value_at(self, t: f64) -> f64 {
        match self {
            CurveShape::SpikeCrash => spike_crash(t),
            CurveShape::FiberPlateau => 80.0 + 15.0 * (0.7 * PI * t).sin() * (1.0 - 0.15 * t),
            CurveShape::Plateau => 75.0 + 20.0 * (0.8 * PI * t).sin() * (1.0 - 0.2 * t),
            CurveShape::GentleBump => {
                let dip = if t > 0.5 { 20.0 * (t - 0.5) } else { 0.0 };
                65.0 + 25.0 * gaussian(t, 0.3, 0.15) - dip
            }
        }
    }
}

fn gaussian(t: f64, center: f64, width: f64) -> f64 {
    let z = (t - center) / width;
    (-z * z).exp()
}

/// Sugar spike at t=0.15, linear crash from t=0.25, damped ripple floor past
/// t=0.5, never below [`POOR_CURVE_FLOOR`].
fn spike_crash(t: f64) -> f64 {
    let crash = if t > 0.25 { 80.0 * (t - 0.25) } else { 0.0 };
    let mut v = 45.0 + 55.0 * gaussian(t, 0.15, 0.08) - crash;

    if t > 0.5 {
        let dt = t - 0.5;
        let ripple = 20.0 + 6.0 * (4.0 * PI * dt).sin() * (-2.0 * dt).exp();
        v = v.max(ripple);
    }

    v.max(POOR_CURVE_FLOOR)
}

/// Synthesize the 25-point projection for a meal.
pub fn synthesize(quality: SequenceQuality, dominant: Option<Category>) -> Vec<f64> {
    let shape = CurveShape::select(quality, dominant);
    let last = (CURVE_POINTS - 1) as f64;
    (0..CURVE_POINTS)
        .map(|i| shape.value_at(i as f64 / last))
        .collect()
}

/// Minutes after the meal represented by point `index`.
pub fn minute_at(index: usize) -> u32 {
    index as u32 * CURVE_STEP_MINUTES
}

/// Headline figures of a curve for gauges and captions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveSummary {
    pub peak: f64,
    pub peak_minute: u32,
    /// Lowest point at or after the peak.
    pub trough: f64,
    pub final_value: f64,
    pub mean: f64,
}

impl CurveSummary {
    /// `None` for an empty series.
    pub fn of(points: &[f64]) -> Option<Self> {
        let final_value = *points.last()?;

        let mut peak_idx = 0;
        for (i, v) in points.iter().enumerate() {
            if *v > points[peak_idx] {
                peak_idx = i;
            }
        }
        let peak = points[peak_idx];
        let trough = points[peak_idx..]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let mean = points.iter().sum::<f64>() / points.len() as f64;

        Some(Self {
            peak,
            peak_minute: minute_at(peak_idx),
            trough,
            final_value,
            mean,
        })
    }
}
