use crate::error::AppError;
use crate::nutrition::{MacroFacts, Macros};

pub const DEFAULT_SEARCH_LIMIT: usize = 2;
pub const DEFAULT_GENERATION_COUNT: usize = 2;

/// A saved recipe from the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Unique, stable id, e.g. "r05"
    pub id: String,
    /// Never empty
    pub title: String,
    pub description: Option<String>,
    /// Ingredient lines in recipe order
    pub ingredients: Vec<String>,
    /// Steps in order, without numbering
    pub instructions: Vec<String>,
    /// Always positive
    pub time_minutes: u32,
    pub macros: MacroFacts,
    pub cuisine: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub max_time_minutes: Option<u32>,
    pub max_calories: Option<f64>,
    pub min_protein: Option<f64>,
    pub limit: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_time_minutes: None,
            max_calories: None,
            min_protein: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchRequest {
    #[cfg(test)]
    pub fn with_query(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Self::default()
        }
    }

    /// The calorie cap in effect. Zero, negative, and non-finite caps count as unset.
    pub fn calorie_cap(&self) -> Option<f64> {
        self.max_calories.filter(|c| c.is_finite() && *c > 0.0)
    }

    /// The time cap in effect. A zero cap counts as unset.
    pub fn time_cap(&self) -> Option<u32> {
        self.max_time_minutes.filter(|t| *t > 0)
    }

    pub fn validate(self, max_limit: usize) -> Result<Self, AppError> {
        if self.limit == 0 {
            return Err(AppError::InvalidRequest("limit must be positive".to_string()));
        }
        if self.limit > max_limit {
            return Err(AppError::InvalidRequest(format!(
                "limit must be at most {max_limit}"
            )));
        }
        if let Some(p) = self.min_protein {
            if !p.is_finite() || p < 0.0 {
                return Err(AppError::InvalidRequest(
                    "min_protein must be a non-negative number".to_string(),
                ));
            }
        }
        Ok(self)
    }
}

/// Sub-scores in `[0, 1]`. `query` is present only for non-empty free-text searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitBreakdown {
    pub ingredients: f64,
    pub time: f64,
    pub nutrition: f64,
    pub query: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecipe {
    pub recipe: Recipe,
    pub score: f64,
    pub fit: FitBreakdown,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub ingredients: Vec<String>,
    pub cuisine: Option<String>,
    pub calorie_cap: Option<f64>,
    pub count: usize,
}

impl GenerationRequest {
    pub fn new(ingredients: Vec<String>) -> Self {
        Self {
            ingredients,
            cuisine: None,
            calorie_cap: None,
            count: DEFAULT_GENERATION_COUNT,
        }
    }

    /// Trim and de-duplicate ingredients (case-insensitive, first spelling wins), drop a blank
    /// cuisine hint and a non-positive calorie cap, and reject what cannot be generated.
    pub fn validate(self, max_count: usize) -> Result<Self, AppError> {
        let mut ingredients: Vec<String> = Vec::with_capacity(self.ingredients.len());
        for raw in self.ingredients {
            let item = raw.trim();
            if item.is_empty() {
                continue;
            }
            if ingredients.iter().any(|seen| seen.eq_ignore_ascii_case(item)) {
                continue;
            }
            ingredients.push(item.to_string());
        }
        if ingredients.is_empty() {
            return Err(AppError::InvalidRequest(
                "ingredients must not be empty".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(AppError::InvalidRequest("count must be positive".to_string()));
        }
        if self.count > max_count {
            return Err(AppError::InvalidRequest(format!(
                "count must be at most {max_count}"
            )));
        }
        let cuisine = self
            .cuisine
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let calorie_cap = self.calorie_cap.filter(|c| c.is_finite() && *c > 0.0);
        Ok(Self {
            ingredients,
            cuisine,
            calorie_cap,
            count: self.count,
        })
    }
}

/// A recipe produced by the generation capability. It has no persistent id.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRecipe {
    pub title: String,
    pub cuisine: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub time_minutes: Option<u32>,
    pub macros: Macros,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub protein_target_g: f64,
    pub calorie_cap: f64,
    /// Handed to generation if stored recipes cannot reach the target.
    pub ingredients: Option<Vec<String>>,
}

impl PlanRequest {
    pub fn new(protein_target_g: f64, calorie_cap: f64) -> Self {
        Self {
            protein_target_g,
            calorie_cap,
            ingredients: None,
        }
    }

    pub fn validate(self) -> Result<Self, AppError> {
        if !self.protein_target_g.is_finite() || self.protein_target_g <= 0.0 {
            return Err(AppError::InvalidRequest(
                "protein_target_g must be a positive number".to_string(),
            ));
        }
        if !self.calorie_cap.is_finite() || self.calorie_cap <= 0.0 {
            return Err(AppError::InvalidRequest(
                "calorie_cap must be a positive number".to_string(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealSource {
    Stored,
    Generated,
}

impl MealSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealSource::Stored => "stored",
            MealSource::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMeal {
    pub id: String,
    pub title: String,
    pub source: MealSource,
    pub cuisine: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub macros: Macros,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanTargets {
    pub calories: f64,
    pub protein: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    pub targets: PlanTargets,
    pub meals: Vec<PlannedMeal>,
    /// Sum over `meals`
    pub totals: Macros,
}
