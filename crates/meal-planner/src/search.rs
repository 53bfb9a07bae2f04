/// Search ranking over the recipe corpus.
///
/// Every candidate is scored with the fit scorer. Hard constraints filter rather than weight:
/// a recipe whose time or nutrition sub-score hits 0 under a supplied cap is dropped, as is one
/// below `min_protein`. Survivors are ordered by score (descending) then id (ascending) and
/// truncated to `limit`. Planning reads the whole ordering through `SearchEngine::rank_all`.
use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::fit;
use crate::model::{FitBreakdown, Recipe, ScoredRecipe, SearchRequest};
use crate::store::RecipeStore;

pub struct SearchEngine<S> {
    store: Arc<S>,
    max_limit: usize,
}

impl<S: RecipeStore> SearchEngine<S> {
    pub fn new(store: Arc<S>, max_limit: usize) -> Self {
        Self { store, max_limit }
    }

    /// Validate `request`, read the corpus, and rank it.
    ///
    /// No matches is an empty result, not an error.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<ScoredRecipe>, AppError> {
        let request = request.validate(self.max_limit)?;
        let corpus = self.store.list().await;
        let results = rank(&request, &corpus);
        debug!(
            query = %request.query,
            corpus = corpus.len(),
            results = results.len(),
            "search ranked"
        );
        Ok(results)
    }

    /// Every survivor of `request`'s filters, in rank order. `limit` is ignored.
    pub async fn rank_all(&self, request: &SearchRequest) -> Vec<ScoredRecipe> {
        let corpus = self.store.list().await;
        let results = rank_unbounded(request, &corpus);
        debug!(corpus = corpus.len(), results = results.len(), "corpus ranked");
        results
    }

    pub async fn get(&self, id: &str) -> Result<Recipe, AppError> {
        self.store.get(id).await
    }
}

/// Rank `corpus` against `request`. Pure and deterministic.
pub fn rank(request: &SearchRequest, corpus: &[Recipe]) -> Vec<ScoredRecipe> {
    let mut scored = rank_unbounded(request, corpus);
    scored.truncate(request.limit);
    scored
}

fn rank_unbounded(request: &SearchRequest, corpus: &[Recipe]) -> Vec<ScoredRecipe> {
    let terms = fit::query_terms(&request.query);
    let mut scored: Vec<ScoredRecipe> = corpus
        .iter()
        .filter(|r| passes_protein_floor(r, request.min_protein))
        .filter_map(|recipe| {
            let (score, fit) = fit::score(recipe, request);
            if disqualified(&fit, request) {
                return None;
            }
            let explanation = explain(recipe, &terms);
            Some(ScoredRecipe {
                recipe: recipe.clone(),
                score,
                fit,
                explanation: Some(explanation),
            })
        })
        .collect();

    scored.sort_by(by_score_then_id);
    scored
}

/// Score descending, id ascending.
pub fn by_score_then_id(a: &ScoredRecipe, b: &ScoredRecipe) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.recipe.id.cmp(&b.recipe.id))
}

fn disqualified(fit: &FitBreakdown, request: &SearchRequest) -> bool {
    (request.time_cap().is_some() && fit.time == 0.0)
        || (request.calorie_cap().is_some() && fit.nutrition == 0.0)
}

fn passes_protein_floor(recipe: &Recipe, min_protein: Option<f64>) -> bool {
    match min_protein {
        None => true,
        Some(floor) => recipe.macros.protein.is_some_and(|p| p >= floor),
    }
}

fn explain(recipe: &Recipe, terms: &[String]) -> String {
    let mut parts = Vec::with_capacity(4);
    if !terms.is_empty() {
        parts.push(format!(
            "matches {}/{} query terms",
            fit::matched_terms(recipe, terms),
            terms.len()
        ));
    }
    parts.push(format!("{} min", recipe.time_minutes));
    parts.push(match recipe.macros.protein {
        Some(p) => format!("{}g protein", p.round()),
        None => "protein unknown".to_string(),
    });
    parts.push(match recipe.macros.calories {
        Some(c) => format!("{} kcal", c.round()),
        None => "calories unknown".to_string(),
    });
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{MacroFacts, Macros};
    use crate::store::MemoryStore;

    fn recipe(id: &str, title: &str, ingredients: &[&str], time: u32, calories: f64, protein: f64) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: vec!["Cook.".to_string()],
            time_minutes: time,
            macros: MacroFacts::known(Macros::new(calories, protein, 10.0, 5.0)),
            cuisine: None,
        }
    }

    fn corpus() -> Vec<Recipe> {
        vec![
            recipe("r01", "Scrambled Eggs", &["egg", "salt", "butter"], 10, 200.0, 12.0),
            recipe("r02", "Egg Fried Rice", &["rice", "egg", "soy sauce", "oil"], 18, 520.0, 18.0),
            recipe("r03", "Tomato Sandwich", &["bread", "tomato", "butter"], 5, 260.0, 7.0),
            recipe("r05", "Chickpea Salad", &["chickpeas", "tomato", "lemon"], 8, 340.0, 14.0),
            recipe("r04", "Paneer Bhurji", &["paneer", "onion", "tomato"], 12, 360.0, 24.0),
            recipe("r06", "Dal Tadka", &["toor dal", "onion", "tomato"], 25, 360.0, 18.0),
        ]
    }

    #[test]
    fn empty_corpus_gives_empty_results() {
        assert!(rank(&SearchRequest::default(), &[]).is_empty());
    }

    #[test]
    fn results_sorted_by_score_then_id_and_limited() {
        let request = SearchRequest {
            limit: 10,
            ..SearchRequest::default()
        };
        let results = rank(&request, &corpus());
        assert_eq!(results.len(), 6);
        // empty query, no caps: every recipe ties at 1.0, so id order decides
        let ids: Vec<&str> = results.iter().map(|r| r.recipe.id.as_str()).collect();
        assert_eq!(ids, vec!["r01", "r02", "r03", "r04", "r05", "r06"]);

        let limited = rank(&SearchRequest::default(), &corpus());
        assert_eq!(limited.len(), 2);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn query_prefers_matching_ingredients() {
        let request = SearchRequest {
            query: "egg".to_string(),
            limit: 3,
            ..SearchRequest::default()
        };
        let results = rank(&request, &corpus());
        let ids: Vec<&str> = results.iter().map(|r| r.recipe.id.as_str()).collect();
        // r01 has egg as an ingredient, but its title word is "eggs"
        assert_eq!(ids[..2], ["r02", "r01"]);
        assert_eq!(results[0].fit.ingredients, 1.0);
        assert_eq!(results[0].fit.query, Some(1.0));
        assert_eq!(
            results[0].explanation.as_deref(),
            Some("matches 1/1 query terms · 18 min · 18g protein · 520 kcal")
        );
    }

    #[test]
    fn hard_caps_filter_instead_of_penalising() {
        let request = SearchRequest {
            max_time_minutes: Some(10),
            max_calories: Some(300.0),
            limit: 10,
            ..SearchRequest::default()
        };
        let results = rank(&request, &corpus());
        let ids: Vec<&str> = results.iter().map(|r| r.recipe.id.as_str()).collect();
        // r06 takes 25 min (> 2x cap) and is dropped; r02 at 520 kcal is penalised but kept
        assert!(!ids.contains(&"r06"));
        assert!(ids.contains(&"r02"));
        assert_eq!(ids[0], "r01");

        let strict = SearchRequest {
            max_calories: Some(250.0),
            limit: 10,
            ..SearchRequest::default()
        };
        let ids: Vec<String> = rank(&strict, &corpus())
            .into_iter()
            .map(|r| r.recipe.id)
            .collect();
        // 520 kcal is more than double 250 kcal
        assert!(!ids.contains(&"r02".to_string()));
    }

    #[test]
    fn protein_floor_drops_lean_and_unknown_recipes() {
        let mut items = corpus();
        items[0].macros.protein = None;
        let request = SearchRequest {
            min_protein: Some(15.0),
            limit: 10,
            ..SearchRequest::default()
        };
        let ids: Vec<String> = rank(&request, &items).into_iter().map(|r| r.recipe.id).collect();
        assert_eq!(ids, vec!["r02", "r04", "r06"]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let request = SearchRequest {
            query: "tomato onion".to_string(),
            max_time_minutes: Some(15),
            limit: 4,
            ..SearchRequest::default()
        };
        let items = corpus();
        assert_eq!(rank(&request, &items), rank(&request, &items));
    }

    #[tokio::test]
    async fn engine_validates_limit_and_reads_store() {
        let engine = SearchEngine::new(Arc::new(MemoryStore::new(corpus())), 50);
        let zero = SearchRequest {
            limit: 0,
            ..SearchRequest::default()
        };
        assert!(matches!(
            engine.search(zero).await,
            Err(AppError::InvalidRequest(_))
        ));
        let results = engine.search(SearchRequest::with_query("paneer")).await.unwrap();
        assert_eq!(results[0].recipe.id, "r04");
        assert!(matches!(engine.get("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn rank_all_ignores_limit_but_keeps_filters() {
        let engine = SearchEngine::new(Arc::new(MemoryStore::new(corpus())), 2);
        let request = SearchRequest {
            max_calories: Some(250.0),
            limit: 1,
            ..SearchRequest::default()
        };
        let ids: Vec<String> = engine
            .rank_all(&request)
            .await
            .into_iter()
            .map(|r| r.recipe.id)
            .collect();
        // r02 at 520 kcal is over double the cap
        assert_eq!(ids.len(), 5);
        assert!(!ids.contains(&"r02".to_string()));
        assert_eq!(ids[0], "r01");
    }
}
