/// Fit scoring: how well one recipe answers one search request.
///
/// Four sub-scores, each in `[0, 1]`:
/// - ingredients: share of query terms found inside the recipe's ingredient lines
/// - time: 1.0 within the time cap, decaying linearly to 0 at twice the cap
/// - nutrition: 1.0 at or under the calorie cap, decaying linearly to 0 at twice the cap
/// - query: token overlap between the raw query and title/description (only for non-empty queries)
///
/// The overall score is the weighted mean of the sub-scores that are present.
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{FitBreakdown, Recipe, SearchRequest};

const WEIGHT_INGREDIENTS: f64 = 0.4;
const WEIGHT_TIME: f64 = 0.2;
const WEIGHT_NUTRITION: f64 = 0.3;
const WEIGHT_QUERY: f64 = 0.1;

/// Nutrition score when a calorie cap is set but the recipe's calories are unknown.
pub const UNKNOWN_CALORIES_SCORE: f64 = 0.5;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]+").expect("valid regex"));

/// Score `recipe` against `request`, returning the overall score and its breakdown.
pub fn score(recipe: &Recipe, request: &SearchRequest) -> (f64, FitBreakdown) {
    let terms = query_terms(&request.query);
    let fit = FitBreakdown {
        ingredients: ingredient_match(recipe, &terms),
        time: time_match(recipe.time_minutes, request.time_cap()),
        nutrition: nutrition_match(recipe.macros.calories, request.calorie_cap()),
        query: query_match(&request.query, recipe),
    };
    (overall(&fit), fit)
}

/// Weighted mean over the sub-scores present, renormalising the weights.
pub fn overall(fit: &FitBreakdown) -> f64 {
    let mut weighted = WEIGHT_INGREDIENTS * fit.ingredients
        + WEIGHT_TIME * fit.time
        + WEIGHT_NUTRITION * fit.nutrition;
    let mut total_weight = WEIGHT_INGREDIENTS + WEIGHT_TIME + WEIGHT_NUTRITION;
    if let Some(q) = fit.query {
        weighted += WEIGHT_QUERY * q;
        total_weight += WEIGHT_QUERY;
    }
    clamp_unit(weighted / total_weight)
}

/// Split a query into lowercase terms on commas and whitespace.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Number of `terms` that appear as a substring of at least one ingredient line.
pub fn matched_terms(recipe: &Recipe, terms: &[String]) -> usize {
    let lines: Vec<String> = recipe
        .ingredients
        .iter()
        .map(|i| i.to_lowercase())
        .collect();
    terms
        .iter()
        .filter(|term| lines.iter().any(|line| line.contains(term.as_str())))
        .count()
}

/// A recipe with no ingredients scores 0 even for an empty query.
pub fn ingredient_match(recipe: &Recipe, terms: &[String]) -> f64 {
    if recipe.ingredients.is_empty() {
        return 0.0;
    }
    if terms.is_empty() {
        return 1.0;
    }
    clamp_unit(matched_terms(recipe, terms) as f64 / terms.len() as f64)
}

pub fn time_match(time_minutes: u32, max_time_minutes: Option<u32>) -> f64 {
    let Some(cap) = max_time_minutes.filter(|c| *c > 0) else {
        return 1.0;
    };
    if time_minutes <= cap {
        return 1.0;
    }
    let overage = f64::from(time_minutes - cap);
    clamp_unit(1.0 - overage / f64::from(cap))
}

pub fn nutrition_match(calories: Option<f64>, calorie_cap: Option<f64>) -> f64 {
    let Some(cap) = calorie_cap.filter(|c| c.is_finite() && *c > 0.0) else {
        return 1.0;
    };
    let Some(calories) = calories else {
        return UNKNOWN_CALORIES_SCORE;
    };
    clamp_unit(1.0 - ((calories - cap) / cap).max(0.0))
}

/// Share of the query's distinct words found in the recipe's title or description.
/// `None` when the query is blank.
pub fn query_match(query: &str, recipe: &Recipe) -> Option<f64> {
    if query.trim().is_empty() {
        return None;
    }
    let wanted = words(query);
    if wanted.is_empty() {
        return Some(0.0);
    }
    let mut have = words(&recipe.title);
    if let Some(description) = &recipe.description {
        have.extend(words(description));
    }
    let overlap = wanted.iter().filter(|w| have.contains(*w)).count();
    Some(clamp_unit(overlap as f64 / wanted.len() as f64))
}

fn words(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
