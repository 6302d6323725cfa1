//! The narrow persistence seam the engine talks to.
//!
//! The engine never owns storage. It loads and writes habit patterns and
//! meal records through [`Repository`], and whatever the backend reports as
//! an error is handed back to the caller untouched.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard};

use crate::habit::HabitPattern;
use crate::meal::MealRecord;

pub trait Repository {
    type Error;

    fn get_patterns_by_device(&self, device_id: &str) -> Result<Vec<HabitPattern>, Self::Error>;

    /// Insert or update the `(device_id, original_name)` row. Implementations
    /// must merge with [`HabitPattern::merged`] so concurrent writers cannot
    /// regress a pattern.
    fn upsert_pattern(&self, pattern: &HabitPattern) -> Result<(), Self::Error>;

    fn get_meals_by_device(&self, device_id: &str) -> Result<Vec<MealRecord>, Self::Error>;

    fn save_meal(&self, meal: &MealRecord) -> Result<(), Self::Error>;
}

/// Process-local repository for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    patterns: Mutex<BTreeMap<(String, String), HabitPattern>>,
    meals: Mutex<Vec<MealRecord>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Repository for MemoryRepository {
    type Error = Infallible;

    fn get_patterns_by_device(&self, device_id: &str) -> Result<Vec<HabitPattern>, Infallible> {
        Ok(lock(&self.patterns)
            .values()
            .filter(|p| p.device_id == device_id)
            .cloned()
            .collect())
    }

    fn upsert_pattern(&self, pattern: &HabitPattern) -> Result<(), Infallible> {
        let mut patterns = lock(&self.patterns);
        let key = (pattern.device_id.clone(), pattern.original_name.clone());
        let next = match patterns.get(&key) {
            Some(existing) => HabitPattern::merged(existing, pattern),
            None => {
                let mut fresh = pattern.clone();
                fresh.normalize();
                fresh
            }
        };
        patterns.insert(key, next);
        Ok(())
    }

    fn get_meals_by_device(&self, device_id: &str) -> Result<Vec<MealRecord>, Infallible> {
        Ok(lock(&self.meals)
            .iter()
            .filter(|m| m.device_id == device_id)
            .cloned()
            .collect())
    }

    fn save_meal(&self, meal: &MealRecord) -> Result<(), Infallible> {
        let mut meals = lock(&self.meals);
        match meals.iter_mut().find(|m| m.id == meal.id) {
            Some(slot) => *slot = meal.clone(),
            None => meals.push(meal.clone()),
        }
        Ok(())
    }
}
