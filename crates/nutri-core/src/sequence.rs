//! Eating-order evaluation.
//!
//! Models the advice to eat vegetables before starches. The cutoffs are
//! heuristic and fixed: downstream advisory text depends on them exactly.

use serde::{Deserialize, Serialize};

use crate::classify::{Category, classify};
use crate::constants::EARLY_CARB_FRACTION;
use crate::ingredient::Ingredient;

/// Verdict on the order in which a meal's items are eaten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceQuality {
    Optimal,
    Moderate,
    Poor,
}

impl SequenceQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceQuality::Optimal => "optimal",
            SequenceQuality::Moderate => "moderate",
            SequenceQuality::Poor => "poor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "optimal" => Some(SequenceQuality::Optimal),
            "moderate" => Some(SequenceQuality::Moderate),
            "poor" => Some(SequenceQuality::Poor),
            _ => None,
        }
    }
}

/// Evaluate an ordered ingredient list.
pub fn evaluate(ingredients: &[Ingredient]) -> SequenceQuality {
    if ingredients.len() <= 1 {
        return SequenceQuality::Optimal;
    }

    let categories: Vec<Category> = ingredients.iter().map(classify).collect();
    evaluate_categories(&categories)
}

/// Same rules as [`evaluate`] over already-classified items.
pub fn evaluate_categories(categories: &[Category]) -> SequenceQuality {
    let len = categories.len();
    if len <= 1 {
        return SequenceQuality::Optimal;
    }

    let first_carb = categories.iter().position(|c| *c == Category::CarbLead);
    let first_fiber = categories.iter().position(|c| *c == Category::FiberLead);

    if let (Some(carb), Some(fiber)) = (first_carb, first_fiber)
        && carb < fiber
    {
        return SequenceQuality::Poor;
    }

    let early_cutoff = len as f64 * EARLY_CARB_FRACTION;
    if categories
        .iter()
        .enumerate()
        .any(|(i, c)| *c == Category::CarbLead && (i as f64) < early_cutoff)
    {
        return SequenceQuality::Poor;
    }

    if categories[0] == Category::FiberLead {
        SequenceQuality::Optimal
    } else {
        SequenceQuality::Moderate
    }
}

/// Stable reorder: fiber-lead items first, then protein-lead, then carb-lead.
pub fn recommended_order(ingredients: &[Ingredient]) -> Vec<Ingredient> {
    let mut keyed: Vec<(Category, &Ingredient)> =
        ingredients.iter().map(|i| (classify(i), i)).collect();
    keyed.sort_by_key(|(c, _)| *c);
    keyed.into_iter().map(|(_, i)| i.clone()).collect()
}
