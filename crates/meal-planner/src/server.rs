/// MCP server for recipe search, generation, and day planning.
///
/// Exposes five tools:
/// - `search_recipes`: Rank saved recipes against a query, time budget, and nutrition goals
/// - `get_recipe`: Look up a saved recipe by id
/// - `generate_recipes`: Generate new recipes from ingredients via the completion host
/// - `plan_day`: Assemble a day of meals toward a protein target under a calorie cap
/// - `estimate_macros`: Estimate macros for a list of ingredient lines
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::info;

use crate::cuisine::KeywordClassifier;
use crate::generate::OpenAiBackend;
use crate::model::{
    DayPlan, GeneratedRecipe, GenerationRequest, PlanRequest, PlannedMeal, Recipe,
    ScoredRecipe, SearchRequest, DEFAULT_GENERATION_COUNT, DEFAULT_SEARCH_LIMIT,
};
use crate::nutrition::{estimate_macros, Macros};
use crate::planner::{CandidateSource, DayPlanner, Kitchen};
use crate::store::CorpusStore;
use meal_common::mcp_api::{
    DayPlanResponse, EstimateMacrosParams, EstimateMacrosResponse, FitInfo,
    GenerateRecipesParams, GenerateRecipesResponse, GeneratedRecipeInfo, GetRecipeParams,
    MacrosInfo, PlanDayParams, PlanTargetsInfo, PlannedMealInfo, RecipeInfo, ScoredRecipeInfo,
    SearchRecipesParams, SearchRecipesResponse,
};

pub type AppKitchen = Kitchen<CorpusStore, OpenAiBackend, KeywordClassifier>;

#[derive(Clone)]
pub struct MealPlannerServer {
    kitchen: Arc<AppKitchen>,
    planner: Arc<DayPlanner>,
    tool_router: ToolRouter<MealPlannerServer>,
}

impl MealPlannerServer {
    pub fn new(kitchen: AppKitchen, planner: DayPlanner) -> Self {
        Self {
            kitchen: Arc::new(kitchen),
            planner: Arc::new(planner),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl MealPlannerServer {
    #[tool(description = "Search saved recipes. Ranks by ingredient match against the query, time budget, and calorie cap; recipes far over a supplied cap are dropped. Returns scored results with a fit breakdown.")]
    async fn search_recipes(
        &self,
        Parameters(params): Parameters<SearchRecipesParams>,
    ) -> Result<Json<SearchRecipesResponse>, String> {
        let request = SearchRequest {
            query: params.query.trim().to_string(),
            max_time_minutes: params.max_time_minutes,
            max_calories: params.max_calories,
            min_protein: params.min_protein,
            limit: params
                .limit
                .map(|l| l as usize)
                .unwrap_or(DEFAULT_SEARCH_LIMIT),
        };

        let results = self
            .kitchen
            .search
            .search(request)
            .await
            .map_err(|e| format!("search failed: {e}"))?;

        Ok(Json(SearchRecipesResponse {
            results: results.iter().map(to_api_scored).collect(),
        }))
    }

    #[tool(description = "Get a saved recipe by id (e.g. 'r05').")]
    async fn get_recipe(
        &self,
        Parameters(params): Parameters<GetRecipeParams>,
    ) -> Result<Json<RecipeInfo>, String> {
        let recipe_id = params.recipe_id.trim().to_string();
        if recipe_id.is_empty() {
            return Err("recipe_id must not be empty".to_string());
        }

        let recipe = self
            .kitchen
            .search
            .get(&recipe_id)
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(to_api_recipe(&recipe)))
    }

    #[tool(description = "Generate new recipes from a list of ingredients, with an optional cuisine hint and per-recipe calorie cap. Calls the configured completion host once; fails if it is unreachable or returns nothing usable.")]
    async fn generate_recipes(
        &self,
        Parameters(params): Parameters<GenerateRecipesParams>,
    ) -> Result<Json<GenerateRecipesResponse>, String> {
        let request = GenerationRequest {
            ingredients: params.ingredients,
            cuisine: params.cuisine,
            calorie_cap: params.calorie_cap,
            count: params
                .count
                .map(|c| c as usize)
                .unwrap_or(DEFAULT_GENERATION_COUNT),
        };

        let recipes = self
            .kitchen
            .generate(request)
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(GenerateRecipesResponse {
            recipes: recipes.iter().map(to_api_generated).collect(),
        }))
    }

    #[tool(description = "Plan a day of meals that works toward a protein target without exceeding a calorie cap. Uses saved recipes first and generates at most once if they fall short. A shortfall is visible in totals rather than reported as an error.")]
    async fn plan_day(
        &self,
        Parameters(params): Parameters<PlanDayParams>,
    ) -> Result<Json<DayPlanResponse>, String> {
        info!(
            protein_target_g = params.protein_target_g,
            calorie_cap = params.calorie_cap,
            "plan_day tool invoked"
        );
        let request = PlanRequest {
            ingredients: params.ingredients,
            ..PlanRequest::new(params.protein_target_g, params.calorie_cap)
        };

        let plan = self
            .planner
            .plan_day(self.kitchen.as_ref(), request)
            .await
            .map_err(|e| format!("planning failed: {e}"))?;

        Ok(Json(to_api_plan(&plan)))
    }

    #[tool(description = "Estimate calories, protein, carbs, and fat for a list of ingredient lines using a built-in nutrient table. Unrecognised ingredients contribute nothing.")]
    async fn estimate_macros(
        &self,
        Parameters(params): Parameters<EstimateMacrosParams>,
    ) -> Result<Json<EstimateMacrosResponse>, String> {
        let estimate = estimate_macros(&params.ingredients);
        Ok(Json(EstimateMacrosResponse {
            macros: to_api_macros(&estimate.macros),
            matched: estimate.matched,
        }))
    }
}

fn to_api_macros(macros: &Macros) -> MacrosInfo {
    MacrosInfo {
        calories: macros.calories,
        protein: macros.protein,
        carbs: macros.carbs,
        fat: macros.fat,
    }
}

fn to_api_recipe(recipe: &Recipe) -> RecipeInfo {
    RecipeInfo {
        id: recipe.id.clone(),
        title: recipe.title.clone(),
        description: recipe.description.clone(),
        ingredients: recipe.ingredients.clone(),
        instructions: recipe.instructions.clone(),
        time_minutes: recipe.time_minutes,
        macros: to_api_macros(&recipe.macros.resolved()),
        cuisine: recipe.cuisine.clone(),
    }
}

fn to_api_scored(scored: &ScoredRecipe) -> ScoredRecipeInfo {
    ScoredRecipeInfo {
        recipe: to_api_recipe(&scored.recipe),
        score: scored.score,
        fit: FitInfo {
            ingredients: scored.fit.ingredients,
            time: scored.fit.time,
            nutrition: scored.fit.nutrition,
            query: scored.fit.query,
        },
        explanation: scored.explanation.clone(),
    }
}

fn to_api_generated(recipe: &GeneratedRecipe) -> GeneratedRecipeInfo {
    GeneratedRecipeInfo {
        title: recipe.title.clone(),
        cuisine: recipe.cuisine.clone(),
        ingredients: recipe.ingredients.clone(),
        instructions: recipe.instructions.clone(),
        time_minutes: recipe.time_minutes,
        macros: to_api_macros(&recipe.macros),
    }
}

fn to_api_meal(meal: &PlannedMeal) -> PlannedMealInfo {
    PlannedMealInfo {
        id: meal.id.clone(),
        title: meal.title.clone(),
        source: meal.source.as_str().to_string(),
        cuisine: meal.cuisine.clone(),
        ingredients: meal.ingredients.clone(),
        instructions: meal.instructions.clone(),
        macros: to_api_macros(&meal.macros),
        score: meal.score,
    }
}

fn to_api_plan(plan: &DayPlan) -> DayPlanResponse {
    DayPlanResponse {
        targets: PlanTargetsInfo {
            calories: plan.targets.calories,
            protein: plan.targets.protein,
        },
        meals: plan.meals.iter().map(to_api_meal).collect(),
        totals: to_api_macros(&plan.totals),
    }
}

#[tool_handler]
impl ServerHandler for MealPlannerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "meal-planner".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Recipe and meal-planning MCP server. Use search_recipes to rank saved \
                 recipes, get_recipe for a single recipe by id, generate_recipes to create \
                 new recipes from ingredients, plan_day to assemble meals toward a protein \
                 target under a calorie cap, and estimate_macros for quick nutrition estimates."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FitBreakdown, MealSource, PlanTargets};
    use crate::nutrition::MacroFacts;

    #[test]
    fn tools_publish_output_schemas() {
        let tools = MealPlannerServer::tool_router().list_all();
        for name in [
            "search_recipes",
            "get_recipe",
            "generate_recipes",
            "plan_day",
            "estimate_macros",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[test]
    fn unknown_macros_render_as_zero() {
        let recipe = Recipe {
            id: "r09".to_string(),
            title: "Saffron Water".to_string(),
            description: None,
            ingredients: vec!["saffron".to_string()],
            instructions: Vec::new(),
            time_minutes: 2,
            macros: MacroFacts {
                calories: Some(5.0),
                ..MacroFacts::default()
            },
            cuisine: None,
        };
        let scored = ScoredRecipe {
            recipe,
            score: 0.75,
            fit: FitBreakdown {
                ingredients: 1.0,
                time: 1.0,
                nutrition: 1.0,
                query: None,
            },
            explanation: None,
        };
        let api = to_api_scored(&scored);
        assert_eq!(api.recipe.macros.calories, 5.0);
        assert_eq!(api.recipe.macros.protein, 0.0);
        assert_eq!(api.fit.query, None);
        let json = serde_json::to_value(&api.fit).unwrap();
        assert!(json.get("query").is_none());
    }

    #[test]
    fn plan_maps_sources_and_totals() {
        let plan = DayPlan {
            targets: PlanTargets {
                calories: 1000.0,
                protein: 80.0,
            },
            meals: vec![PlannedMeal {
                id: "gen-0123456789ab".to_string(),
                title: "Tofu Scramble".to_string(),
                source: MealSource::Generated,
                cuisine: None,
                ingredients: vec!["tofu".to_string()],
                instructions: vec!["Fry.".to_string()],
                macros: Macros::new(400.0, 30.0, 20.0, 10.0),
                score: None,
            }],
            totals: Macros::new(400.0, 30.0, 20.0, 10.0),
        };
        let api = to_api_plan(&plan);
        assert_eq!(api.meals[0].source, "generated");
        assert_eq!(api.totals.calories, 400.0);
        assert_eq!(api.targets.protein, 80.0);
    }
}
