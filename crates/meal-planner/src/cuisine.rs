/// Cuisine inference for generated recipes that arrive without one.
///
/// The generation orchestrator only ever calls `classify`.
pub trait CuisineClassifier: Send + Sync {
    /// Best guess for the cuisine of a recipe titled `title`, or `None`.
    fn classify(&self, title: &str) -> Option<String>;
}

/// (keyword, label) pairs. Keywords are lowercase.
const DEFAULT_VOCABULARY: &[(&str, &str)] = &[
    ("indian", "Indian"),
    ("italian", "Italian"),
    ("mexican", "Mexican"),
    ("thai", "Thai"),
    ("chinese", "Chinese"),
    ("japanese", "Japanese"),
    ("korean", "Korean"),
    ("vietnamese", "Vietnamese"),
    ("mediterranean", "Mediterranean"),
    ("middle eastern", "Middle Eastern"),
    ("greek", "Greek"),
    ("french", "French"),
    ("spanish", "Spanish"),
    ("american", "American"),
];

/// The built-in heuristic: a case-insensitive substring scan of the title against a fixed
/// vocabulary.
pub struct KeywordClassifier {
    vocabulary: Vec<(String, String)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_VOCABULARY.iter().copied())
    }
}

impl KeywordClassifier {
    pub fn new<'a>(vocabulary: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            vocabulary: vocabulary
                .into_iter()
                .map(|(k, label)| (k.to_lowercase(), label.to_string()))
                .collect(),
        }
    }
}

impl CuisineClassifier for KeywordClassifier {
    /// The keyword appearing earliest in the title wins; at equal positions the longer one.
    fn classify(&self, title: &str) -> Option<String> {
        let lower = title.to_lowercase();
        self.vocabulary
            .iter()
            .filter_map(|(keyword, label)| lower.find(keyword.as_str()).map(|pos| (pos, keyword, label)))
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.len().cmp(&a.1.len())))
            .map(|(_, _, label)| label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        let c = KeywordClassifier::default();
        assert_eq!(c.classify("Thai-style Basil Tofu").as_deref(), Some("Thai"));
        assert_eq!(c.classify("quick ITALIAN frittata").as_deref(), Some("Italian"));
        assert_eq!(
            c.classify("Middle Eastern Chickpea Bowl").as_deref(),
            Some("Middle Eastern")
        );
    }

    #[test]
    fn earliest_keyword_wins() {
        let c = KeywordClassifier::default();
        assert_eq!(
            c.classify("Korean BBQ tacos, Mexican fusion").as_deref(),
            Some("Korean")
        );
    }

    #[test]
    fn no_keyword_leaves_cuisine_unset() {
        let c = KeywordClassifier::default();
        assert_eq!(c.classify("Egg Fried Rice"), None);
        assert_eq!(c.classify(""), None);
    }

    #[test]
    fn custom_vocabulary_replaces_default() {
        let c = KeywordClassifier::new([("bhurji", "Indian")]);
        assert_eq!(c.classify("Paneer Bhurji").as_deref(), Some("Indian"));
        assert_eq!(c.classify("Thai Curry"), None);
    }
}
