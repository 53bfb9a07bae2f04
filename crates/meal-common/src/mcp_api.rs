use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchRecipesParams {
    /// Free-text query, e.g. "high protein egg". Empty matches everything.
    #[serde(default)]
    pub query: String,
    /// Hard cap on preparation time in minutes. Slower recipes decay and are dropped at zero.
    pub max_time_minutes: Option<u32>,
    /// Hard calorie cap per recipe (kcal).
    pub max_calories: Option<f64>,
    /// Drop recipes with less protein than this (grams).
    pub min_protein: Option<f64>,
    /// Maximum number of results to return (default: 2).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetRecipeParams {
    /// Stable recipe id, e.g. "r05".
    pub recipe_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateRecipesParams {
    /// Ingredients the recipes should be built around. Must not be empty.
    pub ingredients: Vec<String>,
    /// Optional cuisine hint, e.g. "Thai".
    pub cuisine: Option<String>,
    /// Optional per-recipe calorie cap (kcal).
    pub calorie_cap: Option<f64>,
    /// Number of recipes to generate (default: 2).
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PlanDayParams {
    /// Daily protein target in grams.
    pub protein_target_g: f64,
    /// Daily calorie cap (kcal). The plan never exceeds it.
    pub calorie_cap: f64,
    /// Ingredients to hand to recipe generation if stored recipes fall short.
    pub ingredients: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EstimateMacrosParams {
    /// Ingredient lines, e.g. ["egg", "rice", "soy sauce"].
    pub ingredients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MacrosInfo {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FitInfo {
    pub ingredients: f64,
    pub time: f64,
    pub nutrition: f64,
    /// Present only when the search carried a non-empty query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecipeInfo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub time_minutes: u32,
    pub macros: MacrosInfo,
    pub cuisine: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoredRecipeInfo {
    pub recipe: RecipeInfo,
    pub score: f64,
    pub fit: FitInfo,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchRecipesResponse {
    pub results: Vec<ScoredRecipeInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedRecipeInfo {
    pub title: String,
    pub cuisine: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub time_minutes: Option<u32>,
    pub macros: MacrosInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateRecipesResponse {
    pub recipes: Vec<GeneratedRecipeInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanTargetsInfo {
    pub calories: f64,
    pub protein: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedMealInfo {
    pub id: String,
    pub title: String,
    /// "stored" or "generated".
    pub source: String,
    pub cuisine: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub macros: MacrosInfo,
    /// Fit score for stored recipes; absent for generated ones.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DayPlanResponse {
    pub targets: PlanTargetsInfo,
    pub meals: Vec<PlannedMealInfo>,
    pub totals: MacrosInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EstimateMacrosResponse {
    pub macros: MacrosInfo,
    /// Ingredient keys found in the nutrient table.
    pub matched: Vec<String>,
}
