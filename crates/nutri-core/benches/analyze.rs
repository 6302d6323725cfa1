//! Benchmarks for the per-meal analysis path.
//!
//! Run with: cargo bench -p nutri-core

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nutri_core::{AnalysisContext, HabitEdit, HabitLearner, Ingredient, analyze_meal, classify};

fn meal() -> Vec<Ingredient> {
    vec![
        Ingredient::new("白米饭", 200.0).with_macros(4.0, 0.6, 44.0, 200.0),
        Ingredient::new("西兰花", 80.0).with_macros(2.0, 0.3, 6.0, 34.0),
        Ingredient::new("鸡胸肉", 120.0).with_macros(26.0, 3.0, 0.0, 140.0),
        Ingredient::new("番茄炒蛋", 150.0).with_macros(9.0, 12.0, 6.0, 170.0),
        Ingredient::new("mystery stew", 250.0).with_macros(12.0, 10.0, 20.0, 230.0),
    ]
}

fn bench_classify(c: &mut Criterion) {
    let meal = meal();
    c.bench_function("classify/5 items", |b| {
        b.iter(|| meal.iter().map(|i| classify(black_box(i))).count())
    });
}

fn bench_analyze(c: &mut Criterion) {
    let meal = meal();
    let ctx = AnalysisContext::default();
    c.bench_function("analyze_meal/5 items", |b| {
        b.iter(|| analyze_meal(black_box(&meal), &ctx))
    });
}

fn bench_apply_habits(c: &mut Criterion) {
    let mut learner = HabitLearner::new("bench");
    for _ in 0..3 {
        learner.record_edit(&HabitEdit::new("白米饭").grams(150.0));
        learner.record_edit(&HabitEdit::new("鸡胸肉").rename("鸡腿肉"));
    }
    let meal = meal();
    c.bench_function("apply_habits/5 items", |b| {
        b.iter(|| learner.apply_habits(black_box(&meal)))
    });
}

criterion_group!(benches, bench_classify, bench_analyze, bench_apply_habits);
criterion_main!(benches);
