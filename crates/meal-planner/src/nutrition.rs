/// Macro arithmetic and the fallback nutrient estimator.
///
/// `Macros` is the aggregation type: every field is a known, non-negative quantity
/// (kcal for calories, grams otherwise). `MacroFacts` is what a stored recipe actually
/// carries, where each field may be unknown. Scoring looks at `MacroFacts`; display and
/// totals use `MacroFacts::resolved`, which reads unknown as zero.
use std::iter::Sum;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub const ZERO: Macros = Macros {
        calories: 0.0,
        protein: 0.0,
        carbs: 0.0,
        fat: 0.0,
    };

    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
        .clamped()
    }

    /// Component-wise sum. Never negative.
    pub fn add(self, other: Macros) -> Macros {
        Macros {
            calories: self.calories + other.calories,
            protein: self.protein + other.protein,
            carbs: self.carbs + other.carbs,
            fat: self.fat + other.fat,
        }
        .clamped()
    }

    /// Multiply every component by `k`. A negative factor yields zero.
    pub fn scale(self, k: f64) -> Macros {
        let k = non_negative(k);
        Macros {
            calories: self.calories * k,
            protein: self.protein * k,
            carbs: self.carbs * k,
            fat: self.fat * k,
        }
        .clamped()
    }

    pub fn clamped(self) -> Macros {
        Macros {
            calories: non_negative(self.calories),
            protein: non_negative(self.protein),
            carbs: non_negative(self.carbs),
            fat: non_negative(self.fat),
        }
    }
}

impl Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Macros {
        iter.fold(Macros::ZERO, Macros::add)
    }
}

impl<'a> Sum<&'a Macros> for Macros {
    fn sum<I: Iterator<Item = &'a Macros>>(iter: I) -> Macros {
        iter.copied().sum()
    }
}

/// Macros as recorded for a recipe, with `None` meaning "unknown" rather than zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacroFacts {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl MacroFacts {
    #[cfg(test)]
    pub fn known(m: Macros) -> Self {
        Self {
            calories: Some(m.calories),
            protein: Some(m.protein),
            carbs: Some(m.carbs),
            fat: Some(m.fat),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.calories.is_some() && self.protein.is_some() && self.carbs.is_some() && self.fat.is_some()
    }

    /// Unknown fields read as zero.
    pub fn resolved(&self) -> Macros {
        Macros::new(
            self.calories.unwrap_or(0.0),
            self.protein.unwrap_or(0.0),
            self.carbs.unwrap_or(0.0),
            self.fat.unwrap_or(0.0),
        )
    }

    /// Clamp known negatives (and NaN) to zero. Applied at ingestion from external sources.
    pub fn clamped(self) -> Self {
        Self {
            calories: self.calories.map(non_negative),
            protein: self.protein.map(non_negative),
            carbs: self.carbs.map(non_negative),
            fat: self.fat.map(non_negative),
        }
    }

    /// Fill unknown fields from an estimate. Known fields are never overwritten.
    pub fn fill_unknown(self, estimate: Macros) -> Self {
        Self {
            calories: self.calories.or(Some(estimate.calories)),
            protein: self.protein.or(Some(estimate.protein)),
            carbs: self.carbs.or(Some(estimate.carbs)),
            fat: self.fat.or(Some(estimate.fat)),
        }
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Per-100g nutrients and the portion assumed when an ingredient line has no quantity.
struct NutrientEntry {
    key: &'static str,
    per_100g: Macros,
    default_grams: f64,
}

const fn entry(key: &'static str, cal: f64, p: f64, c: f64, f: f64, grams: f64) -> NutrientEntry {
    NutrientEntry {
        key,
        per_100g: Macros {
            calories: cal,
            protein: p,
            carbs: c,
            fat: f,
        },
        default_grams: grams,
    }
}

const NUTRIENT_TABLE: &[NutrientEntry] = &[
    entry("egg", 155.0, 13.0, 1.1, 11.0, 50.0),
    entry("rice", 130.0, 2.7, 28.0, 0.3, 150.0),
    entry("bread", 265.0, 9.0, 49.0, 3.2, 60.0),
    entry("butter", 717.0, 0.9, 0.1, 81.0, 10.0),
    entry("tomato", 18.0, 0.9, 3.9, 0.2, 100.0),
    entry("paneer", 321.0, 21.0, 3.6, 25.0, 120.0),
    entry("tofu", 76.0, 8.0, 1.9, 4.8, 120.0),
    entry("oats", 389.0, 17.0, 66.0, 7.0, 40.0),
    entry("chickpeas", 164.0, 9.0, 27.0, 2.6, 120.0),
    entry("cheese", 402.0, 25.0, 1.3, 33.0, 40.0),
    entry("maggi", 436.0, 10.0, 60.0, 17.0, 70.0),
    entry("peanut", 567.0, 26.0, 16.0, 49.0, 20.0),
    entry("curd", 98.0, 11.0, 3.4, 5.0, 200.0),
    entry("milk", 60.0, 3.2, 5.0, 3.3, 200.0),
    entry("oil", 884.0, 0.0, 0.0, 100.0, 10.0),
    entry("soy", 446.0, 36.0, 30.0, 20.0, 30.0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub macros: Macros,
    /// Table keys that contributed, in ingredient order.
    pub matched: Vec<String>,
}

/// Rough macro estimate from ingredient lines.
///
/// Each line is keyed on its first word (so "soy sauce" counts as soy, "eggs" as egg) and
/// contributes the table's default portion. Unrecognised lines contribute nothing.
pub fn estimate_macros<S: AsRef<str>>(ingredients: &[S]) -> Estimate {
    let mut macros = Macros::ZERO;
    let mut matched = Vec::new();
    for line in ingredients {
        let Some(entry) = lookup(line.as_ref()) else {
            continue;
        };
        macros = macros.add(entry.per_100g.scale(entry.default_grams / 100.0));
        matched.push(entry.key.to_string());
    }
    Estimate { macros, matched }
}

fn lookup(line: &str) -> Option<&'static NutrientEntry> {
    let lower = line.trim().to_lowercase();
    let first = lower.split_whitespace().next()?;
    let find = |key: &str| NUTRIENT_TABLE.iter().find(|e| e.key == key);
    find(first).or_else(|| first.strip_suffix('s').and_then(find))
}
