//! Ingredient classification into fiber-lead, protein-lead or carb-lead.
//!
//! Curated name fragments decide first; the macro-ratio heuristic is only a
//! fallback for names no rule recognizes. Classification is a pure function
//! of name and macros and is never cached on the ingredient.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::constants::{CARB_RATIO_CUTOFF, PROTEIN_RATIO_CUTOFF};
use crate::ingredient::Ingredient;

/// Coarse nutritional role of a single ingredient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    FiberLead,
    ProteinLead,
    CarbLead,
}

impl Category {
    /// Rule priority order. Earlier categories win both keyword and tie-break contests.
    pub const PRIORITY: [Category; 3] = [
        Category::FiberLead,
        Category::ProteinLead,
        Category::CarbLead,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::FiberLead => "fiberLead",
            Category::ProteinLead => "proteinLead",
            Category::CarbLead => "carbLead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "fiberlead" | "fiber" => Some(Category::FiberLead),
            "proteinlead" | "protein" => Some(Category::ProteinLead),
            "carblead" | "carb" | "carbs" => Some(Category::CarbLead),
            _ => None,
        }
    }
}

const FIBER_KEYWORDS: &[&str] = &[
    // zh
    "蔬菜", "青菜", "西兰花", "西蓝花", "花椰菜", "菜花", "菠菜", "生菜", "白菜", "卷心菜",
    "包菜", "芹菜", "黄瓜", "番茄", "西红柿", "茄子", "萝卜", "莴笋", "韭菜", "豆芽",
    "豆角", "四季豆", "秋葵", "苦瓜", "冬瓜", "丝瓜", "芦笋", "菌", "菇", "木耳",
    "海带", "紫菜", "沙拉", "青椒", "洋葱", "油麦菜", "空心菜", "苋菜", "芥兰", "莲藕",
    // en
    "vegetable", "veggie", "salad", "broccoli", "cauliflower", "spinach", "lettuce", "kale",
    "cabbage", "celery", "cucumber", "tomato", "eggplant", "carrot", "radish", "zucchini",
    "asparagus", "mushroom", "pepper", "onion", "greens", "bok choy", "seaweed", "okra",
    "green bean", "sprout",
];

const PROTEIN_KEYWORDS: &[&str] = &[
    // zh
    "肉", "鸡", "鸭", "鹅", "牛", "猪", "羊", "鱼", "虾", "蟹", "贝", "蛋", "豆腐", "豆干",
    "豆浆", "黄豆", "毛豆", "鹰嘴豆", "奶酪", "酸奶", "排骨", "火腿", "香肠", "培根", "鱿鱼",
    // en
    "chicken", "beef", "pork", "lamb", "mutton", "turkey", "duck", "fish", "salmon", "tuna",
    "cod", "shrimp", "prawn", "crab", "egg", "tofu", "tempeh", "bean", "lentil", "chickpea",
    "steak", "meat", "ham", "bacon", "sausage", "cheese", "yogurt", "milk",
];

const CARB_KEYWORDS: &[&str] = &[
    // zh
    "米", "饭", "面", "粉", "粥", "馒头", "包子", "饺子", "馄饨", "饼", "油条", "土豆",
    "薯", "玉米", "燕麦", "麦片", "糖", "甜", "南瓜", "芋", "山药", "年糕", "粽子", "糕",
    // en
    "rice", "noodle", "pasta", "spaghetti", "bread", "bun", "toast", "bagel", "potato",
    "fries", "corn", "oat", "cereal", "cake", "cookie", "biscuit", "cracker", "sugar",
    "candy", "dessert", "tortilla", "dumpling", "pancake", "waffle", "muffin", "donut",
    "flour", "wheat", "grain", "quinoa", "pizza",
];

const RULES: [(Category, &[&str]); 3] = [
    (Category::FiberLead, FIBER_KEYWORDS),
    (Category::ProteinLead, PROTEIN_KEYWORDS),
    (Category::CarbLead, CARB_KEYWORDS),
];

/// Bracketed portion notes such as "(200g)" or "（一碗）".
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|（[^）]*）|\[[^\]]*\]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lower-case a name and strip portion annotations and redundant whitespace.
pub fn normalize_name(name: &str) -> String {
    let stripped = ANNOTATION.replace_all(name, " ");
    WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

/// Keyword stage only. `None` when no curated fragment matches.
pub fn classify_by_name(name: &str) -> Option<Category> {
    let normalized = normalize_name(name);
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(category, _)| *category)
}

/// Macro-ratio fallback. Ambiguous compositions (pure fat, trace macros)
/// resolve to fiber-lead.
pub fn classify_by_macros(ingredient: &Ingredient) -> Category {
    let mass = ingredient.macro_mass();
    let total = if mass > 0.0 { mass } else { 1.0 };

    if ingredient.carbs_g / total > CARB_RATIO_CUTOFF {
        Category::CarbLead
    } else if ingredient.protein_g / total > PROTEIN_RATIO_CUTOFF {
        Category::ProteinLead
    } else {
        Category::FiberLead
    }
}

pub fn classify(ingredient: &Ingredient) -> Category {
    classify_by_name(&ingredient.name).unwrap_or_else(|| classify_by_macros(ingredient))
}

/// Number of ingredients per category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub fiber: usize,
    pub protein: usize,
    pub carb: usize,
}

impl CategoryCounts {
    pub fn of(ingredients: &[Ingredient]) -> Self {
        let mut counts = Self::default();
        for ing in ingredients {
            match classify(ing) {
                Category::FiberLead => counts.fiber += 1,
                Category::ProteinLead => counts.protein += 1,
                Category::CarbLead => counts.carb += 1,
            }
        }
        counts
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::FiberLead => self.fiber,
            Category::ProteinLead => self.protein,
            Category::CarbLead => self.carb,
        }
    }

    pub fn total(&self) -> usize {
        self.fiber + self.protein + self.carb
    }
}

/// Category carrying the most grams. Ties go to the earlier category in
/// [`Category::PRIORITY`]; an empty meal has no dominant category.
pub fn dominant_category(ingredients: &[Ingredient]) -> Option<Category> {
    if ingredients.is_empty() {
        return None;
    }

    let mut grams = [0.0_f64; 3];
    for ing in ingredients {
        let slot = match classify(ing) {
            Category::FiberLead => 0,
            Category::ProteinLead => 1,
            Category::CarbLead => 2,
        };
        grams[slot] += ing.grams;
    }

    let mut best = 0;
    for slot in 1..3 {
        if grams[slot] > grams[best] {
            best = slot;
        }
    }
    Some(Category::PRIORITY[best])
}
