// Contracts with the external collaborators: the remote wargame platform
// (catalog + per-user solve history) and the notification sink that renders
// per-solve results. The core never formats user-facing text.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::Challenge;
use crate::error::TrackerError;
use crate::ingest::SolveEvent;

/// Timestamp format used by the remote platform for solve dates.
pub const SOLVE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One challenge as reported by the catalog source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChallenge {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    pub score: i64,
    pub category: String,
    #[serde(default)]
    pub difficulty: String,
}

/// One solve as reported by the solve source. Arrives in arbitrary order;
/// the ingestion engine sorts ascending by `solved_at` before applying.
#[derive(Debug, Clone)]
pub struct RawSolve {
    pub challenge_id: i64,
    pub solved_at: NaiveDateTime,
    pub title: String,
}

impl RawSolve {
    /// The ledger representation of the solve timestamp.
    pub fn date_string(&self) -> String {
        self.solved_at.format(SOLVE_DATE_FORMAT).to_string()
    }
}

/// Parse a remote solve timestamp.
pub fn parse_solve_date(raw: &str) -> Result<NaiveDateTime, TrackerError> {
    NaiveDateTime::parse_from_str(raw, SOLVE_DATE_FORMAT)
        .map_err(|_| TrackerError::InvalidDate(raw.to_string()))
}

/// Supplies the full current challenge catalog on demand.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<RawChallenge>, TrackerError>;
}

/// Supplies a user's full remote solve history on demand.
#[async_trait]
pub trait SolveSource: Send + Sync {
    async fn fetch_solves(&self, user_id: i64) -> Result<Vec<RawSolve>, TrackerError>;
}

/// Receives structured per-solve results and new-challenge announcements.
/// Rendering/display is entirely the sink's concern.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn solve_recorded(&self, event: &SolveEvent);
    async fn challenge_added(&self, challenge: &Challenge);
}

/// Default sink: structured logs only.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn solve_recorded(&self, event: &SolveEvent) {
        tracing::info!(
            user = %event.user.name,
            challenge = %event.challenge.title,
            points = event.challenge.score,
            first_blood = event.first_blood,
            overtaken = ?event.overtaken_names,
            completed_step = ?event.completed_step,
            "solve recorded"
        );
    }

    async fn challenge_added(&self, challenge: &Challenge) {
        tracing::info!(
            id = challenge.id,
            title = %challenge.title,
            category = %challenge.category,
            score = challenge.score,
            "new challenge available"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_solve_date_round_trip() {
        let dt = parse_solve_date("2026-08-20 14:03:59").unwrap();
        let solve = RawSolve {
            challenge_id: 1,
            solved_at: dt,
            title: "t".into(),
        };
        assert_eq!(solve.date_string(), "2026-08-20 14:03:59");
    }

    #[test]
    fn test_parse_solve_date_rejects_garbage() {
        assert!(matches!(
            parse_solve_date("20/08/2026"),
            Err(TrackerError::InvalidDate(_))
        ));
        assert!(parse_solve_date("").is_err());
    }
}
