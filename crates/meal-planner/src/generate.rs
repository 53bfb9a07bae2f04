/// Recipe generation through an external completion capability.
///
/// `Orchestrator::generate` validates the request, builds one prompt, invokes the backend once
/// under a timeout, and normalises whatever comes back into `GeneratedRecipe`s. Nothing here
/// retries; a failed call is reported to the caller as `GenerationUnavailable`.
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cuisine::CuisineClassifier;
use crate::error::AppError;
use crate::model::{GeneratedRecipe, GenerationRequest};
use crate::payload::{GenerationPayload, RecipeDraft};
use meal_common::error::CommonError;
use meal_common::openai::{OpenAiClient, OpenAiClientError};

pub const SYSTEM_RULES: &str = "You are a careful dietician and chef. \
Return STRICT JSON ONLY with keys: title (string), cuisine (string), \
ingredients (array of strings), instructions (array of strings), time_minutes (number), \
macros (object with numbers: calories, protein, carbs, fat). \
No prose, no extra keys, no code blocks, no markdown. \
Write instructions as a short step-by-step list (5-8 steps), one action per step, \
each starting with a verb and giving a concrete time or temperature where it applies. \
Recipes must be food-safe (no raw eggs).";

/// The generation capability: prompt in, raw model text out.
pub trait CompletionBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, CommonError>> + Send;
}

/// Chat-completions backend. Sends `SYSTEM_RULES` as the system message.
pub struct OpenAiBackend {
    client: OpenAiClient,
}

impl OpenAiBackend {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, CommonError> {
        match self.client.complete_json(SYSTEM_RULES, prompt).await {
            Ok(text) => Ok(text),
            // the host answered with nothing; let parsing report it as empty
            Err(OpenAiClientError::EmptyCompletion) => Ok(String::new()),
            Err(e) => {
                if e.is_transport() {
                    warn!(error = %e, model = %self.client.config().model, "completion host unreachable");
                }
                Err(CommonError::Upstream(e.to_string()))
            }
        }
    }
}

pub struct Orchestrator<B, C> {
    backend: B,
    classifier: C,
    timeout: Duration,
    max_count: usize,
}

impl<B: CompletionBackend, C: CuisineClassifier> Orchestrator<B, C> {
    pub fn new(backend: B, classifier: C, timeout: Duration, max_count: usize) -> Self {
        Self {
            backend,
            classifier,
            timeout,
            max_count,
        }
    }

    /// Generate up to `request.count` recipes.
    ///
    /// Invalid entries in the response are dropped with a warning. The call fails only when the
    /// backend cannot be reached in time (`GenerationUnavailable`) or nothing usable came back
    /// (`GenerationEmpty`).
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<GeneratedRecipe>, AppError> {
        let request = request.validate(self.max_count)?;
        let prompt = build_prompt(&request);

        let raw = match tokio::time::timeout(self.timeout, self.backend.complete(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "recipe generation failed");
                return Err(AppError::GenerationUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "recipe generation timed out");
                return Err(AppError::GenerationUnavailable(format!(
                    "no response within {:?}",
                    self.timeout
                )));
            }
        };

        let payload = GenerationPayload::parse(&raw);
        match &payload {
            GenerationPayload::SingleRecipe(_) => {
                debug!(requested = request.count, "single recipe object returned, wrapping")
            }
            GenerationPayload::Malformed(reason) => {
                warn!(reason = %reason, bytes = raw.len(), "generation response unusable")
            }
            GenerationPayload::RecipeList(_) => {}
        }

        let entries = payload.into_entries();
        let received = entries.len();
        let mut recipes = Vec::with_capacity(received);
        for (index, entry) in entries.into_iter().enumerate() {
            match RecipeDraft::from_value(entry) {
                Ok(draft) => recipes.push(self.finish(draft, &request)),
                Err(reason) => warn!(index, reason = %reason, "dropping generated recipe"),
            }
        }
        if recipes.is_empty() {
            return Err(AppError::GenerationEmpty { received });
        }
        recipes.truncate(request.count);
        info!(
            requested = request.count,
            received,
            kept = recipes.len(),
            "recipes generated"
        );
        Ok(recipes)
    }

    /// Resolve cuisine: produced value, then the requested hint, then the classifier.
    fn finish(&self, draft: RecipeDraft, request: &GenerationRequest) -> GeneratedRecipe {
        let cuisine = draft
            .cuisine
            .or_else(|| request.cuisine.clone())
            .or_else(|| self.classifier.classify(&draft.title));
        GeneratedRecipe {
            title: draft.title,
            cuisine,
            ingredients: draft.ingredients,
            instructions: draft.instructions,
            time_minutes: draft.time_minutes,
            macros: draft.macros,
        }
    }
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    let cuisine_rule = match &request.cuisine {
        Some(c) => format!(
            "CUISINE HARD RULE: every recipe MUST be {c} cuisine, use common {c} flavours and \
             techniques, and set the cuisine field to \"{c}\"."
        ),
        None => "Pick an appropriate cuisine for each recipe and set the cuisine field.".to_string(),
    };
    let calorie_rule = match request.calorie_cap {
        Some(cap) => format!("Keep each recipe at or under {cap:.0} kcal."),
        None => "Set macros to a reasonable estimate.".to_string(),
    };
    let shape = if request.count == 1 {
        "Return a single recipe object.".to_string()
    } else {
        format!(
            "Return JSON of the form {{\"recipes\": [...]}} holding exactly {} recipe objects.",
            request.count
        )
    };
    format!(
        "Generate exactly {count} recipe(s).\n\
         {cuisine_rule}\n\
         {calorie_rule}\n\
         Ingredients available: {ingredients}\n\
         {shape}\n\
         Example recipe object: {{\"title\":\"<title>\",\"cuisine\":\"<cuisine>\",\
         \"ingredients\":[\"...\"],\"instructions\":[\"step\",\"step\"],\"time_minutes\":<num>,\
         \"macros\":{{\"calories\":<num>,\"protein\":<num>,\"carbs\":<num>,\"fat\":<num>}}}}",
        count = request.count,
        ingredients = request.ingredients.join(", "),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cuisine::KeywordClassifier;
    use crate::nutrition::Macros;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted backend: replays one outcome per call and counts calls.
    pub(crate) enum Script {
        Reply(String),
        Fail,
        Hang,
    }

    pub(crate) struct ScriptedBackend {
        script: Script,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(script: Script) -> Self {
            Self {
                script,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn reply(text: &str) -> Self {
            Self::new(Script::Reply(text.to_string()))
        }
    }

    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, CommonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Reply(text) => Ok(text.clone()),
                Script::Fail => Err(CommonError::Upstream("connection refused".to_string())),
                Script::Hang => std::future::pending().await,
            }
        }
    }

    pub(crate) fn recipe_json(title: &str, calories: f64, protein: f64) -> String {
        format!(
            r#"{{"title": "{title}", "ingredients": ["egg", "rice"],
                "instructions": ["1. Boil the rice for 12 min.", "2. Fry the egg on medium heat."],
                "macros": {{"calories": {calories}, "protein": {protein}, "carbs": 40, "fat": 12}}}}"#
        )
    }

    fn orchestrator(backend: ScriptedBackend) -> Orchestrator<ScriptedBackend, KeywordClassifier> {
        Orchestrator::new(backend, KeywordClassifier::default(), Duration::from_secs(5), 6)
    }

    fn request(count: usize) -> GenerationRequest {
        GenerationRequest {
            count,
            ..GenerationRequest::new(vec!["egg".into(), "rice".into()])
        }
    }

    #[tokio::test]
    async fn single_object_is_wrapped() {
        let gen = orchestrator(ScriptedBackend::reply(&recipe_json("Egg Rice", 450.0, 20.0)));
        let recipes = gen.generate(request(2)).await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].title, "Egg Rice");
        assert_eq!(recipes[0].macros, Macros::new(450.0, 20.0, 40.0, 12.0));
        assert_eq!(
            recipes[0].instructions,
            vec!["Boil the rice for 12 min.", "Fry the egg on medium heat."]
        );
    }

    #[tokio::test]
    async fn invalid_entries_are_dropped() {
        let body = format!(
            r#"{{"recipes": [{}, {{"title": "No Macros", "ingredients": ["egg"], "instructions": ["Cook."]}}, {}]}}"#,
            recipe_json("Egg Fried Rice", 520.0, 18.0),
            recipe_json("Rice Omelette", 480.0, 22.0),
        );
        let gen = orchestrator(ScriptedBackend::reply(&body));
        let titles: Vec<String> = gen
            .generate(request(3))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Egg Fried Rice", "Rice Omelette"]);
    }

    #[tokio::test]
    async fn results_truncate_to_count() {
        let body = format!(
            "[{}, {}, {}]",
            recipe_json("A", 100.0, 1.0),
            recipe_json("B", 100.0, 1.0),
            recipe_json("C", 100.0, 1.0)
        );
        let gen = orchestrator(ScriptedBackend::reply(&body));
        assert_eq!(gen.generate(request(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn garbage_is_generation_empty() {
        let gen = orchestrator(ScriptedBackend::reply("Sorry, I can't do that."));
        assert!(matches!(
            gen.generate(request(2)).await,
            Err(AppError::GenerationEmpty { received: 0 })
        ));

        let invalid_only = orchestrator(ScriptedBackend::reply(r#"{"recipes": [{"title": "x"}]}"#));
        assert!(matches!(
            invalid_only.generate(request(2)).await,
            Err(AppError::GenerationEmpty { received: 1 })
        ));
    }

    #[tokio::test]
    async fn backend_failure_is_unavailable() {
        let gen = orchestrator(ScriptedBackend::new(Script::Fail));
        assert!(matches!(
            gen.generate(request(2)).await,
            Err(AppError::GenerationUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_unavailable() {
        let gen = orchestrator(ScriptedBackend::new(Script::Hang));
        assert!(matches!(
            gen.generate(request(2)).await,
            Err(AppError::GenerationUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_backend() {
        let backend = ScriptedBackend::reply(&recipe_json("Egg Rice", 450.0, 20.0));
        let calls = backend.calls.clone();
        let gen = orchestrator(backend);
        let empty = GenerationRequest::new(vec![" ".into()]);
        assert!(matches!(gen.generate(empty).await, Err(AppError::InvalidRequest(_))));
        assert!(matches!(gen.generate(request(7)).await, Err(AppError::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cuisine_prefers_output_then_hint_then_title() {
        let body = format!(
            "[{}, {}]",
            recipe_json("Thai Basil Egg Rice", 500.0, 20.0),
            recipe_json("Plain Egg Rice", 500.0, 20.0)
        )
        .replacen("\"title\": \"Thai", "\"cuisine\": \"Fusion\", \"title\": \"Thai", 1);
        let gen = orchestrator(ScriptedBackend::reply(&body));
        let recipes = gen.generate(request(2)).await.unwrap();
        assert_eq!(recipes[0].cuisine.as_deref(), Some("Fusion"));
        assert_eq!(recipes[1].cuisine, None);

        let hinted = orchestrator(ScriptedBackend::reply(&recipe_json("Plain Egg Rice", 500.0, 20.0)));
        let mut req = request(1);
        req.cuisine = Some("Indian".into());
        assert_eq!(
            hinted.generate(req).await.unwrap()[0].cuisine.as_deref(),
            Some("Indian")
        );

        let inferred = orchestrator(ScriptedBackend::reply(&recipe_json("Korean Egg Rice", 500.0, 20.0)));
        assert_eq!(
            inferred.generate(request(1)).await.unwrap()[0].cuisine.as_deref(),
            Some("Korean")
        );
    }

    #[test]
    fn prompt_carries_rules_for_hint_and_cap() {
        let mut req = request(3);
        req.cuisine = Some("Thai".into());
        req.calorie_cap = Some(550.0);
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Generate exactly 3 recipe(s)."));
        assert!(prompt.contains("MUST be Thai cuisine"));
        assert!(prompt.contains("at or under 550 kcal"));
        assert!(prompt.contains("Ingredients available: egg, rice"));
        assert!(prompt.contains("\"recipes\""));

        let single = build_prompt(&request(1));
        assert!(single.contains("single recipe object"));
        assert!(single.contains("reasonable estimate"));
    }
}
