/// Day planning: greedy assembly of meals toward a protein target under a calorie cap.
///
/// Stored recipes are taken first, best score first across the whole corpus, skipping any
/// whose addition would push the running calories over the cap. If protein is still short,
/// generation is asked once for recipes that fit the remaining budget. The cap is never exceeded; a protein shortfall is
/// reported through `totals`, not as an error.
use std::future::Future;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cuisine::CuisineClassifier;
use crate::error::AppError;
use crate::generate::{CompletionBackend, Orchestrator};
use crate::model::{
    DayPlan, GeneratedRecipe, GenerationRequest, MealSource, PlanRequest, PlanTargets,
    PlannedMeal, ScoredRecipe, SearchRequest, DEFAULT_GENERATION_COUNT,
};
use crate::nutrition::Macros;
use crate::search::SearchEngine;
use crate::store::RecipeStore;

/// Where the planner pulls candidates from.
pub trait CandidateSource: Send + Sync {
    /// Every stored recipe that survives `calorie_cap` as a hard cap, in rank order.
    fn candidates(&self, calorie_cap: f64) -> impl Future<Output = Vec<ScoredRecipe>> + Send;

    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<Vec<GeneratedRecipe>, AppError>> + Send;
}

/// The search engine and generator together, as the server wires them.
pub struct Kitchen<S, B, C> {
    pub search: SearchEngine<S>,
    pub generator: Orchestrator<B, C>,
}

impl<S, B, C> CandidateSource for Kitchen<S, B, C>
where
    S: RecipeStore,
    B: CompletionBackend,
    C: CuisineClassifier,
{
    async fn candidates(&self, calorie_cap: f64) -> Vec<ScoredRecipe> {
        let request = SearchRequest {
            max_calories: Some(calorie_cap),
            ..SearchRequest::default()
        };
        self.search.rank_all(&request).await
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Vec<GeneratedRecipe>, AppError> {
        self.generator.generate(request).await
    }
}

pub struct DayPlanner {
    /// Used for generation when the request names no ingredients.
    fallback_ingredients: Vec<String>,
}

impl DayPlanner {
    pub fn new(fallback_ingredients: Vec<String>) -> Self {
        Self {
            fallback_ingredients,
        }
    }

    pub async fn plan_day<Src: CandidateSource>(
        &self,
        source: &Src,
        request: PlanRequest,
    ) -> Result<DayPlan, AppError> {
        let request = request.validate()?;
        let mut plan = Accumulator::new(PlanTargets {
            calories: request.calorie_cap,
            protein: request.protein_target_g,
        });

        let stored = source.candidates(request.calorie_cap).await;
        for candidate in &stored {
            if plan.done() {
                break;
            }
            let Some(meal) = stored_meal(candidate) else {
                debug!(id = %candidate.recipe.id, "skipping candidate with unknown calories");
                continue;
            };
            plan.offer(meal);
        }

        if !plan.done() {
            self.fill_with_generated(source, &request, &mut plan).await;
        }

        let plan = plan.finish();
        info!(
            meals = plan.meals.len(),
            calories = plan.totals.calories,
            protein = plan.totals.protein,
            protein_target = plan.targets.protein,
            "day planned"
        );
        Ok(plan)
    }

    async fn fill_with_generated<Src: CandidateSource>(
        &self,
        source: &Src,
        request: &PlanRequest,
        plan: &mut Accumulator,
    ) {
        let ingredients = request
            .ingredients
            .clone()
            .filter(|i| i.iter().any(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| self.fallback_ingredients.clone());
        if ingredients.is_empty() {
            return;
        }
        let remaining = plan.remaining_calories();
        info!(
            protein_short = plan.targets.protein - plan.totals.protein,
            remaining_calories = remaining,
            "stored recipes fall short, falling back to generation"
        );
        let generation = GenerationRequest {
            calorie_cap: Some(remaining),
            count: DEFAULT_GENERATION_COUNT,
            ..GenerationRequest::new(ingredients)
        };
        match source.generate(generation).await {
            Ok(recipes) => {
                for (index, recipe) in recipes.into_iter().enumerate() {
                    if plan.done() {
                        break;
                    }
                    plan.offer(generated_meal(recipe, index));
                }
            }
            Err(e) => warn!(error = %e, "plan generation fallback failed, returning best effort"),
        }
    }
}

struct Accumulator {
    targets: PlanTargets,
    meals: Vec<PlannedMeal>,
    totals: Macros,
}

impl Accumulator {
    fn new(targets: PlanTargets) -> Self {
        Self {
            targets,
            meals: Vec::new(),
            totals: Macros::ZERO,
        }
    }

    fn done(&self) -> bool {
        self.totals.protein >= self.targets.protein || self.remaining_calories() <= 0.0
    }

    fn remaining_calories(&self) -> f64 {
        self.targets.calories - self.totals.calories
    }

    /// Add `meal` if it keeps calories within the cap.
    fn offer(&mut self, meal: PlannedMeal) {
        if self.totals.calories + meal.macros.calories > self.targets.calories {
            debug!(id = %meal.id, calories = meal.macros.calories, "meal does not fit remaining budget");
            return;
        }
        self.totals = self.totals.add(meal.macros);
        self.meals.push(meal);
    }

    fn finish(self) -> DayPlan {
        DayPlan {
            targets: self.targets,
            totals: self.meals.iter().map(|m| &m.macros).sum(),
            meals: self.meals,
        }
    }
}

/// `None` when calories are unknown: such a recipe cannot be shown to fit the cap.
fn stored_meal(candidate: &ScoredRecipe) -> Option<PlannedMeal> {
    candidate.recipe.macros.calories?;
    let recipe = &candidate.recipe;
    Some(PlannedMeal {
        id: recipe.id.clone(),
        title: recipe.title.clone(),
        source: MealSource::Stored,
        cuisine: recipe.cuisine.clone(),
        ingredients: recipe.ingredients.clone(),
        instructions: recipe.instructions.clone(),
        macros: recipe.macros.resolved(),
        score: Some(candidate.score),
    })
}

fn generated_meal(recipe: GeneratedRecipe, index: usize) -> PlannedMeal {
    PlannedMeal {
        id: generated_id(&recipe.title, index),
        title: recipe.title,
        source: MealSource::Generated,
        cuisine: recipe.cuisine,
        ingredients: recipe.ingredients,
        instructions: recipe.instructions,
        macros: recipe.macros,
        score: None,
    }
}

/// `gen-` plus the first 12 hex chars of sha256("{title}|{index}").
pub fn generated_id(title: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(index.to_string().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("gen-{}", &hash[..12])
}
