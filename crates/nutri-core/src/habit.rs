//! Habit learning: remember a user's repeated corrections of recognized
//! ingredients and apply them silently once they have been made often enough.
//!
//! Patterns are partitioned by device. The learner holds one device's
//! patterns in memory and is handed in explicitly; nothing here reads an
//! ambient device identity. `auto_apply` only ever moves from false to true.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::AUTO_APPLY_THRESHOLD;
use crate::ingredient::{CookMethod, Ingredient};
use crate::repository::Repository;
use crate::time::now_iso8601;

/// A learned correction for one recognized ingredient name on one device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPattern {
    pub device_id: String,
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_grams: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_cook_method: Option<CookMethod>,
    pub occurrence_count: u32,
    #[serde(default)]
    pub auto_apply: bool,
    #[serde(default)]
    pub updated_at: String,
}

impl HabitPattern {
    fn first(device_id: &str, edit: &HabitEdit) -> Self {
        Self {
            device_id: device_id.to_string(),
            original_name: edit.original_name.clone(),
            corrected_name: edit.corrected_name.clone(),
            corrected_grams: edit.corrected_grams,
            preferred_cook_method: edit.cook_method,
            occurrence_count: 1,
            auto_apply: false,
            updated_at: now_iso8601(),
        }
    }

    /// Fold a repeated correction in. Omitted fields keep their prior value.
    fn absorb(&mut self, edit: &HabitEdit) {
        self.occurrence_count = self.occurrence_count.saturating_add(1);
        if edit.corrected_name.is_some() {
            self.corrected_name = edit.corrected_name.clone();
        }
        if edit.corrected_grams.is_some() {
            self.corrected_grams = edit.corrected_grams;
        }
        if edit.cook_method.is_some() {
            self.preferred_cook_method = edit.cook_method;
        }
        self.auto_apply = self.auto_apply || self.occurrence_count >= AUTO_APPLY_THRESHOLD;
        self.updated_at = now_iso8601();
    }

    /// Re-derive `auto_apply` from the count for a row written elsewhere.
    pub fn normalize(&mut self) {
        self.auto_apply = self.auto_apply || self.occurrence_count >= AUTO_APPLY_THRESHOLD;
    }

    /// Combine a stored row with an incoming write of the same key.
    ///
    /// Storage backends use this on conflict so a stale writer can never
    /// lower the count or clear `auto_apply`.
    pub fn merged(existing: &HabitPattern, incoming: &HabitPattern) -> HabitPattern {
        let occurrence_count = existing.occurrence_count.max(incoming.occurrence_count);
        HabitPattern {
            device_id: incoming.device_id.clone(),
            original_name: incoming.original_name.clone(),
            corrected_name: incoming
                .corrected_name
                .clone()
                .or_else(|| existing.corrected_name.clone()),
            corrected_grams: incoming.corrected_grams.or(existing.corrected_grams),
            preferred_cook_method: incoming
                .preferred_cook_method
                .or(existing.preferred_cook_method),
            occurrence_count,
            auto_apply: existing.auto_apply
                || incoming.auto_apply
                || occurrence_count >= AUTO_APPLY_THRESHOLD,
            updated_at: incoming.updated_at.clone(),
        }
    }

    /// Rewrite one ingredient with this correction. Macros follow a grams
    /// change proportionally.
    pub fn apply_to(&self, ingredient: &Ingredient) -> Ingredient {
        let mut out = match self.corrected_grams {
            Some(grams) => ingredient.rescaled(grams),
            None => ingredient.clone(),
        };
        if let Some(name) = &self.corrected_name {
            out.name = name.clone();
        }
        if let Some(method) = self.preferred_cook_method {
            out.cook_method = Some(method);
        }
        out
    }
}

/// One user correction of a recognized ingredient.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitEdit {
    pub original_name: String,
    #[serde(default)]
    pub corrected_name: Option<String>,
    #[serde(default)]
    pub corrected_grams: Option<f64>,
    #[serde(default)]
    pub cook_method: Option<CookMethod>,
}

impl HabitEdit {
    pub fn new(original_name: &str) -> Self {
        Self {
            original_name: original_name.to_string(),
            ..Default::default()
        }
    }

    pub fn rename(mut self, name: &str) -> Self {
        self.corrected_name = Some(name.to_string());
        self
    }

    pub fn grams(mut self, grams: f64) -> Self {
        self.corrected_grams = Some(grams.max(0.0));
        self
    }

    pub fn cook(mut self, method: CookMethod) -> Self {
        self.cook_method = Some(method);
        self
    }
}

/// Outcome of [`HabitLearner::apply_habits`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitApplication {
    pub ingredients: Vec<Ingredient>,
    /// Original names that were corrected, for disclosure in the UI.
    pub applied: BTreeSet<String>,
}

/// In-memory pattern set for one device.
#[derive(Clone, Debug, Default)]
pub struct HabitLearner {
    device_id: String,
    patterns: BTreeMap<String, HabitPattern>,
}

impl HabitLearner {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            patterns: BTreeMap::new(),
        }
    }

    /// Build from previously persisted rows. Rows for other devices are ignored.
    pub fn from_patterns(device_id: &str, patterns: Vec<HabitPattern>) -> Self {
        let patterns = patterns
            .into_iter()
            .filter(|p| p.device_id == device_id)
            .map(|mut p| {
                p.normalize();
                (p.original_name.clone(), p)
            })
            .collect();
        Self {
            device_id: device_id.to_string(),
            patterns,
        }
    }

    /// Load a device's patterns through the persistence collaborator.
    pub fn load<R: Repository>(repo: &R, device_id: &str) -> Result<Self, R::Error> {
        let patterns = repo.get_patterns_by_device(device_id)?;
        Ok(Self::from_patterns(device_id, patterns))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn get(&self, original_name: &str) -> Option<&HabitPattern> {
        self.patterns.get(original_name)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &HabitPattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The pattern that recording `edit` would produce, without storing it.
    pub fn preview_edit(&self, edit: &HabitEdit) -> HabitPattern {
        match self.patterns.get(&edit.original_name) {
            Some(existing) => {
                let mut next = existing.clone();
                next.absorb(edit);
                next
            }
            None => HabitPattern::first(&self.device_id, edit),
        }
    }

    /// Record a correction and return the updated pattern.
    pub fn record_edit(&mut self, edit: &HabitEdit) -> &HabitPattern {
        let next = self.preview_edit(edit);
        let key = next.original_name.clone();
        self.patterns.insert(key.clone(), next);
        &self.patterns[&key]
    }

    /// Record a correction and write it through the persistence collaborator.
    ///
    /// After the write the learner reloads the device's rows, so it returns
    /// and caches what the repository merged, including other writers' work.
    /// The in-memory set only changes once the write succeeded. Errors are
    /// returned unchanged and not retried.
    pub fn commit_edit<R: Repository>(
        &mut self,
        repo: &R,
        edit: &HabitEdit,
    ) -> Result<HabitPattern, R::Error> {
        let next = self.preview_edit(edit);
        repo.upsert_pattern(&next)?;
        self.patterns.insert(next.original_name.clone(), next.clone());

        let stored = repo.get_patterns_by_device(&self.device_id)?;
        *self = Self::from_patterns(&self.device_id, stored);
        Ok(self.patterns.get(&next.original_name).cloned().unwrap_or(next))
    }

    fn auto_pattern(&self, name: &str) -> Option<&HabitPattern> {
        self.patterns.get(name).filter(|p| p.auto_apply)
    }

    /// Replace every ingredient that has an auto-apply pattern for its exact
    /// name. Everything else passes through unchanged.
    pub fn apply_habits(&self, ingredients: &[Ingredient]) -> HabitApplication {
        let mut applied = BTreeSet::new();
        let ingredients = ingredients
            .iter()
            .map(|ing| match self.auto_pattern(&ing.name) {
                Some(pattern) => {
                    applied.insert(ing.name.clone());
                    pattern.apply_to(ing)
                }
                None => ing.clone(),
            })
            .collect();
        HabitApplication {
            ingredients,
            applied,
        }
    }

    /// True when the user has fully taught every item of this meal.
    /// An empty meal is not trusted.
    pub fn is_trusted_meal(&self, ingredients: &[Ingredient]) -> bool {
        !ingredients.is_empty()
            && ingredients
                .iter()
                .all(|ing| self.auto_pattern(&ing.name).is_some())
    }
}
