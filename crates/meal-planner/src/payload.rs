/// Parsing of raw generation output.
///
/// Model output arrives as text that should be JSON but often is not quite: wrapped in
/// prose or code fences, a single object where a list was asked for, or fields of the
/// wrong type. The shape is resolved once into `GenerationPayload`, then each entry is
/// validated into a `RecipeDraft` on its own so one bad entry cannot sink the rest.
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::nutrition::Macros;

pub const MAX_STEPS: usize = 12;

static STEP_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:step\s*\d+\s*[.):]?|\d+\s*[.)])\s+").expect("valid regex")
});

/// Keys whose presence marks a bare object as an attempted recipe.
const RECIPE_KEYS: &[&str] = &["title", "ingredients", "instructions", "macros"];

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPayload {
    /// A lone recipe object. Older prompts and small models answer this way even when
    /// several recipes were requested; it is accepted as a one-element list.
    SingleRecipe(Value),
    /// `{"recipes": [...]}` or a bare top-level array.
    RecipeList(Vec<Value>),
    /// Nothing recipe-shaped could be recovered. Carries a short reason.
    Malformed(String),
}

impl GenerationPayload {
    pub fn parse(raw: &str) -> Self {
        let Some(value) = extract_json(raw) else {
            return GenerationPayload::Malformed("response is not JSON".to_string());
        };
        match value {
            Value::Array(items) => GenerationPayload::RecipeList(items),
            Value::Object(mut obj) => match obj.remove("recipes") {
                Some(Value::Array(items)) => GenerationPayload::RecipeList(items),
                Some(_) => GenerationPayload::Malformed("\"recipes\" is not an array".to_string()),
                None if RECIPE_KEYS.iter().any(|k| obj.contains_key(*k)) => {
                    GenerationPayload::SingleRecipe(Value::Object(obj))
                }
                None => GenerationPayload::Malformed("object has no recipe fields".to_string()),
            },
            other => GenerationPayload::Malformed(format!("unexpected JSON {}", kind(&other))),
        }
    }

    /// The entries to validate, in response order.
    pub fn into_entries(self) -> Vec<Value> {
        match self {
            GenerationPayload::SingleRecipe(v) => vec![v],
            GenerationPayload::RecipeList(items) => items,
            GenerationPayload::Malformed(_) => Vec::new(),
        }
    }
}

/// Strict parse first, then a fenced block, then the outermost `{...}` or `[...]` slice.
/// Both slices are tried, earliest start first, since prose may hold a stray bracket.
fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let unfenced = strip_code_fence(trimmed);
    if let Ok(v) = serde_json::from_str::<Value>(unfenced) {
        return Some(v);
    }
    let mut slices: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .iter()
        .filter_map(|&(open, close)| {
            let start = unfenced.find(open)?;
            let end = unfenced.rfind(close)?;
            (end > start).then(|| (start, &unfenced[start..=end]))
        })
        .collect();
    slices.sort_by_key(|(start, _)| *start);
    slices
        .into_iter()
        .find_map(|(_, slice)| serde_json::from_str::<Value>(slice).ok())
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A validated entry, before cuisine resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub cuisine: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub time_minutes: Option<u32>,
    pub macros: Macros,
}

impl RecipeDraft {
    /// Validate one entry. Requires a non-empty title, ingredients, instructions, and a
    /// macros object with calories; other macros default to 0. Returns the reason on failure.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(obj) = value else {
            return Err(format!("entry is a {}, not an object", kind(&value)));
        };

        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or("missing title")?
            .to_string();

        let ingredients = string_list(obj.get("ingredients"), ',');
        if ingredients.is_empty() {
            return Err(format!("\"{title}\" has no ingredients"));
        }

        let instructions = normalize_steps(string_list(obj.get("instructions"), '\n'));
        if instructions.is_empty() {
            return Err(format!("\"{title}\" has no instructions"));
        }

        let macros = obj
            .get("macros")
            .and_then(Value::as_object)
            .ok_or_else(|| format!("\"{title}\" has no macros"))?;
        let calories =
            number(macros, "calories").ok_or_else(|| format!("\"{title}\" has no calories"))?;
        let macros = Macros::new(
            calories,
            number(macros, "protein").unwrap_or(0.0),
            number(macros, "carbs").unwrap_or(0.0),
            number(macros, "fat").unwrap_or(0.0),
        );

        let cuisine = obj
            .get("cuisine")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let time_minutes = number(&obj, "time_minutes")
            .filter(|t| *t >= 1.0)
            .map(|t| t.round().min(f64::from(u32::MAX)) as u32);

        Ok(Self {
            title,
            cuisine,
            ingredients,
            instructions,
            time_minutes,
            macros,
        })
    }
}

/// An array of strings (non-strings are stringified), or one string split on `separator`.
fn string_list(value: Option<&Value>, separator: char) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split(separator).map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strip leading step numbers ("1.", "2)", "Step 3:") and keep at most `MAX_STEPS`.
/// A number must be followed by whitespace to count, so "1.5 cups" and "10-minute" stay.
pub fn normalize_steps(steps: Vec<String>) -> Vec<String> {
    steps
        .into_iter()
        .map(|s| STEP_NUMBER_RE.replace(&s, "").trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_STEPS)
        .collect()
}

/// A number, or a string holding one ("350", "350 kcal" is rejected).
fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_object_is_a_single_recipe() {
        let payload = GenerationPayload::parse(r#"{"title": "Egg Curry", "ingredients": ["egg"]}"#);
        assert!(matches!(payload, GenerationPayload::SingleRecipe(_)));
        assert_eq!(payload.into_entries().len(), 1);
    }

    #[test]
    fn recipes_key_and_bare_array_are_lists() {
        let wrapped = GenerationPayload::parse(r#"{"recipes": [{"title": "a"}, {"title": "b"}]}"#);
        assert!(matches!(&wrapped, GenerationPayload::RecipeList(items) if items.len() == 2));
        let bare = GenerationPayload::parse(r#"[{"title": "a"}]"#);
        assert!(matches!(&bare, GenerationPayload::RecipeList(items) if items.len() == 1));
    }

    #[test]
    fn json_is_recovered_from_prose_and_fences() {
        let prose = "Sure! Here you go:\n{\"title\": \"Poha\", \"macros\": {\"calories\": 360}}\nEnjoy.";
        assert!(matches!(GenerationPayload::parse(prose), GenerationPayload::SingleRecipe(_)));

        let fenced = "```json\n{\"recipes\": [{\"title\": \"Upma\"}]}\n```";
        assert!(matches!(GenerationPayload::parse(fenced), GenerationPayload::RecipeList(_)));
    }

    #[test]
    fn stray_bracket_in_prose_does_not_hide_the_object() {
        let raw = "Here are [2] recipes:\n{\"recipes\": [{\"title\": \"Poha\"}, {\"title\": \"Upma\"}]}";
        let payload = GenerationPayload::parse(raw);
        assert!(
            matches!(&payload, GenerationPayload::RecipeList(items) if items.len() == 2),
            "{payload:?}"
        );

        let trailing = "[{\"title\": \"Poha\"}] (1 recipe, see {notes})";
        assert!(matches!(
            GenerationPayload::parse(trailing),
            GenerationPayload::RecipeList(items) if items.len() == 1
        ));
    }

    #[test]
    fn quantities_at_the_start_of_a_step_are_kept() {
        let steps = normalize_steps(vec![
            "1.5 cups of rice go into the pot.".to_string(),
            "10-minute marinade: coat the tofu.".to_string(),
            "1. Rinse the rice.".to_string(),
            "2) Drain it.".to_string(),
            "Step 3: Simmer.".to_string(),
            "step 4 Rest.".to_string(),
        ]);
        assert_eq!(
            steps,
            vec![
                "1.5 cups of rice go into the pot.",
                "10-minute marinade: coat the tofu.",
                "Rinse the rice.",
                "Drain it.",
                "Simmer.",
                "Rest.",
            ]
        );
    }

    #[test]
    fn unusable_output_is_malformed() {
        for raw in ["I cannot help with that.", "42", r#"{"recipes": "none"}"#, r#"{"note": "hi"}"#] {
            let payload = GenerationPayload::parse(raw);
            assert!(
                matches!(payload, GenerationPayload::Malformed(_)),
                "expected malformed for {raw}"
            );
            assert!(payload.into_entries().is_empty());
        }
    }

    #[test]
    fn draft_requires_core_fields() {
        let ok = json!({
            "title": " Tofu Stir Fry ",
            "ingredients": ["tofu", "bell pepper"],
            "instructions": ["1. Press the tofu for 10 min.", "2) Stir fry on high heat for 5 min."],
            "macros": {"calories": "420", "protein": 28}
        });
        let draft = RecipeDraft::from_value(ok).unwrap();
        assert_eq!(draft.title, "Tofu Stir Fry");
        assert_eq!(
            draft.instructions,
            vec!["Press the tofu for 10 min.", "Stir fry on high heat for 5 min."]
        );
        assert_eq!(draft.macros, Macros::new(420.0, 28.0, 0.0, 0.0));

        let no_calories = json!({
            "title": "x", "ingredients": ["a"], "instructions": ["b"], "macros": {"protein": 3}
        });
        assert!(RecipeDraft::from_value(no_calories).is_err());

        let no_steps = json!({
            "title": "x", "ingredients": ["a"], "instructions": [], "macros": {"calories": 1}
        });
        assert!(RecipeDraft::from_value(no_steps).is_err());

        let no_title = json!({
            "ingredients": ["a"], "instructions": ["b"], "macros": {"calories": 1}
        });
        assert!(RecipeDraft::from_value(no_title).is_err());
        assert!(RecipeDraft::from_value(json!("just text")).is_err());
    }

    #[test]
    fn instruction_string_is_split_and_capped() {
        let text: Vec<String> = (1..=15).map(|i| format!("Step {i}: Do thing {i}.")).collect();
        let draft = RecipeDraft::from_value(json!({
            "title": "Long",
            "ingredients": "egg, rice",
            "instructions": text.join("\n"),
            "macros": {"calories": 500, "fat": -4}
        }))
        .unwrap();
        assert_eq!(draft.ingredients, vec!["egg", "rice"]);
        assert_eq!(draft.instructions.len(), MAX_STEPS);
        assert_eq!(draft.instructions[0], "Do thing 1.");
        assert_eq!(draft.macros.fat, 0.0);
    }
}
