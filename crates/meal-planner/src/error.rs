use meal_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    #[error("seed corpus error: {0}")]
    Seed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The generation capability could not be reached or did not answer in time.
    #[error("recipe generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The capability answered, but nothing in the answer was a usable recipe.
    #[error("recipe generation returned no usable recipes ({received} candidates received)")]
    GenerationEmpty { received: usize },

    #[error("recipe not found: {0}")]
    NotFound(String),
}
