// Error taxonomy for the tracker core.
//
// Everything here is recoverable at the boundary that issued the request,
// except `Corrupt`: duplicated primary rows mean the cached score math is
// meaningless and the caller must stop.

use crate::ingest::Lifecycle;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Exact-title lookup matched no challenge.
    #[error("no challenge titled {0:?}")]
    ChallengeNotFound(String),

    /// Exact-title lookup matched more than one challenge. Titles are
    /// expected unique but not enforced at the data level.
    #[error("{count} challenges titled {title:?}")]
    AmbiguousChallengeMatch { title: String, count: usize },

    #[error("user {0} is already tracked")]
    DuplicateUser(i64),

    #[error("user {0} is not tracked")]
    UserNotFound(i64),

    /// Fatal invariant violation, e.g. multiple rows sharing a primary id.
    #[error("database corrupted: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// Remote source fetch or decode failure.
    #[error("remote source error: {0}")]
    Source(String),

    /// A remote solve timestamp that does not parse as `%Y-%m-%d %H:%M:%S`.
    #[error("invalid solve timestamp {0:?}")]
    InvalidDate(String),

    /// Command issued before the engine reached the required lifecycle state.
    #[error("tracker not ready (state: {0:?})")]
    NotReady(Lifecycle),
}

impl From<reqwest::Error> for TrackerError {
    fn from(e: reqwest::Error) -> Self {
        TrackerError::Source(e.to_string())
    }
}
