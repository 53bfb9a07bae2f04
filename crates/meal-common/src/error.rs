/// Infrastructure errors shared by the servers in this workspace.
///
/// These cover the collaborators that sit outside the meal-planning core (the Redis recipe
/// store and the upstream completion host). Server crates wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis unavailable")]
    RedisUnavailable,

    #[error("upstream completion failed: {0}")]
    Upstream(String),
}
