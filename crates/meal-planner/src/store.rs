/// Recipe corpus access.
///
/// The corpus is owned by an external store and read here through `RecipeStore`
/// (`list` + `get`). Two stores exist:
/// - `MemoryStore`: an immutable in-process corpus, loaded from a JSON seed file
/// - `RedisStore`: one JSON record per key under `recipes:v1:recipe:{id}`
///
/// Both ingest the same `StoredRecipe` record shape and canonicalise it into `Recipe`.
/// Records that cannot be canonicalised are skipped with a warning.
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::Recipe;
use crate::nutrition::{estimate_macros, MacroFacts};
use meal_common::redis::RedisCache;

const KEY_PREFIX: &str = "recipes:v1:recipe:";
const DEFAULT_TIME_MINUTES: u32 = 15;

pub trait RecipeStore: Send + Sync {
    /// Every recipe, ordered by id. An unreachable store reads as empty.
    fn list(&self) -> impl Future<Output = Vec<Recipe>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = Result<Recipe, AppError>> + Send;
}

// --- Record shape ---

/// A recipe as written by whatever owns the store.
///
/// Ingredients may be a list or a comma-joined string, instructions a list or a
/// newline-joined string. Any macro may be missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecipe {
    pub id: RecordId,
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Option<TextOrList>,
    #[serde(default)]
    pub instructions: Option<TextOrList>,
    #[serde(default)]
    pub time_minutes: Option<i64>,
    #[serde(default)]
    pub macros: Option<StoredMacros>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(u64),
}

impl RecordId {
    fn into_string(self) -> String {
        match self {
            RecordId::Text(s) => s.trim().to_string(),
            RecordId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    List(Vec<String>),
    Text(String),
}

impl TextOrList {
    fn into_lines(self, separator: char) -> Vec<String> {
        let parts: Vec<String> = match self {
            TextOrList::List(items) => items,
            TextOrList::Text(text) => text.split(separator).map(str::to_string).collect(),
        };
        parts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredMacros {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl StoredRecipe {
    /// Canonicalise into a `Recipe`.
    ///
    /// Negative macros clamp to zero; unknown macros are estimated from the ingredient lines
    /// when any ingredient is recognised, and otherwise stay unknown.
    pub fn into_recipe(self) -> Result<Recipe, String> {
        let id = self.id.into_string();
        if id.is_empty() {
            return Err("empty id".to_string());
        }
        let title = self.title.map(|t| t.trim().to_string()).unwrap_or_default();
        if title.is_empty() {
            return Err(format!("recipe {id} has no title"));
        }

        let ingredients = self
            .ingredients
            .map(|i| i.into_lines(','))
            .unwrap_or_default();
        let instructions = self
            .instructions
            .map(|i| i.into_lines('\n'))
            .unwrap_or_default();

        let time_minutes = self
            .time_minutes
            .filter(|t| *t > 0)
            .map(|t| u32::try_from(t).unwrap_or(u32::MAX))
            .unwrap_or(DEFAULT_TIME_MINUTES);

        let stored = self.macros.unwrap_or_default();
        let mut macros = MacroFacts {
            calories: stored.calories,
            protein: stored.protein,
            carbs: stored.carbs,
            fat: stored.fat,
        }
        .clamped();
        if !macros.is_complete() {
            let estimate = estimate_macros(&ingredients);
            if !estimate.matched.is_empty() {
                macros = macros.fill_unknown(estimate.macros);
            }
        }

        Ok(Recipe {
            id,
            title,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            ingredients,
            instructions,
            time_minutes,
            macros,
            cuisine: self
                .cuisine
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        })
    }
}

// --- In-memory store ---

pub struct MemoryStore {
    recipes: Vec<Recipe>,
    index: HashMap<String, usize>,
}

impl MemoryStore {
    /// Build from canonical recipes. Later duplicates of an id are dropped.
    pub fn new(recipes: Vec<Recipe>) -> Self {
        let unique = sorted_unique(recipes);
        let index = unique
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self {
            recipes: unique,
            index,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn from_records(records: Vec<StoredRecipe>) -> Self {
        Self::new(canonicalise(records))
    }

    /// Load a JSON array of `StoredRecipe` records from `path`.
    pub fn load_seed_file(path: &Path) -> Result<Self, AppError> {
        let records = read_seed_file(path)?;
        let store = Self::from_records(records);
        info!(path = %path.display(), recipes = store.len(), "seed corpus loaded");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }
}

impl RecipeStore for MemoryStore {
    async fn list(&self) -> Vec<Recipe> {
        self.recipes.clone()
    }

    async fn get(&self, id: &str) -> Result<Recipe, AppError> {
        self.index
            .get(id.trim())
            .map(|&i| self.recipes[i].clone())
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }
}

pub fn read_seed_file(path: &Path) -> Result<Vec<StoredRecipe>, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Seed(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str::<Vec<StoredRecipe>>(&raw)
        .map_err(|e| AppError::Seed(format!("invalid seed file {}: {e}", path.display())))
}

/// Sort by id and drop every recipe whose id was already seen, keeping the first.
fn sorted_unique(mut recipes: Vec<Recipe>) -> Vec<Recipe> {
    // stable, so the first occurrence of an id sorts ahead of its duplicates
    recipes.sort_by(|a, b| a.id.cmp(&b.id));
    recipes.dedup_by(|later, kept| {
        let duplicate = later.id == kept.id;
        if duplicate {
            warn!(id = %later.id, "duplicate recipe id, skipping");
        }
        duplicate
    });
    recipes
}

fn canonicalise(records: Vec<StoredRecipe>) -> Vec<Recipe> {
    records
        .into_iter()
        .filter_map(|record| {
            record
                .into_recipe()
                .inspect_err(|reason| warn!(reason = %reason, "skipping malformed recipe record"))
                .ok()
        })
        .collect()
}

// --- Redis store ---

pub struct RedisStore {
    redis: RedisCache,
}

impl RedisStore {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }

    pub async fn is_available(&self) -> bool {
        self.redis.is_available().await
    }

    /// Number of recipe keys currently stored, `None` if Redis cannot be read.
    pub async fn count(&self) -> Option<usize> {
        self.redis.scan_keys(KEY_PREFIX).await.map(|keys| keys.len())
    }

    /// Write seed records into Redis. Returns how many were written.
    pub async fn import(&self, records: &[StoredRecipe]) -> usize {
        let mut written = 0;
        for record in records {
            let id = record.id.clone().into_string();
            let Ok(json) = serde_json::to_string(record) else {
                continue;
            };
            if self.redis.set(&recipe_key(&id), &json).await {
                written += 1;
            }
        }
        written
    }
}

impl RecipeStore for RedisStore {
    async fn list(&self) -> Vec<Recipe> {
        let Some(keys) = self.redis.scan_keys(KEY_PREFIX).await else {
            warn!("recipe store unreadable, treating corpus as empty");
            return Vec::new();
        };
        let Some(values) = self.redis.get_many(&keys).await else {
            warn!("recipe store unreadable, treating corpus as empty");
            return Vec::new();
        };
        recipes_from_entries(keys.into_iter().zip(values))
    }

    async fn get(&self, id: &str) -> Result<Recipe, AppError> {
        let key = recipe_key(id.trim());
        let raw = self
            .redis
            .get(&key)
            .await
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        keyed_recipe(&key, raw).ok_or_else(|| AppError::NotFound(id.to_string()))
    }
}

/// Canonical recipes from `(key, value)` pairs as read from Redis, ordered by id.
///
/// Missing values, undecodable records and records whose id is not the key's `{id}`
/// suffix are skipped; so are later duplicates of an id.
fn recipes_from_entries(
    entries: impl IntoIterator<Item = (String, Option<String>)>,
) -> Vec<Recipe> {
    let recipes = entries
        .into_iter()
        .filter_map(|(key, raw)| keyed_recipe(&key, raw?))
        .collect();
    sorted_unique(recipes)
}

fn keyed_recipe(key: &str, raw: String) -> Option<Recipe> {
    let recipe = decode_record(key, raw)?
        .into_recipe()
        .inspect_err(|reason| warn!(key, reason = %reason, "malformed recipe record"))
        .ok()?;
    if key.strip_prefix(KEY_PREFIX) != Some(recipe.id.as_str()) {
        warn!(key, id = %recipe.id, "recipe id does not match its key, skipping");
        return None;
    }
    Some(recipe)
}

fn recipe_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn decode_record(key: &str, raw: String) -> Option<StoredRecipe> {
    serde_json::from_str(&raw)
        .inspect_err(|e| warn!(error = %e, key, "recipe record deserialization failed"))
        .ok()
}

// --- Configured store ---

/// The store selected at startup.
pub enum CorpusStore {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl RecipeStore for CorpusStore {
    async fn list(&self) -> Vec<Recipe> {
        match self {
            CorpusStore::Memory(store) => store.list().await,
            CorpusStore::Redis(store) => store.list().await,
        }
    }

    async fn get(&self, id: &str) -> Result<Recipe, AppError> {
        match self {
            CorpusStore::Memory(store) => store.get(id).await,
            CorpusStore::Redis(store) => store.get(id).await,
        }
    }
}
