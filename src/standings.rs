// Read-only derivation of leaderboards and statistics from the ledger and
// registry. Never mutates either.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;

use crate::db::{Challenge, Database, DayScore, SolverRow, User};
use crate::error::TrackerError;

/// Number of buffer days added to a trend window to simplify boundary
/// plotting for the renderer.
pub const TREND_BUFFER_DAYS: i64 = 2;
/// Maximum number of series returned by a trend query.
pub const TREND_MAX_USERS: usize = 10;

/// A user's standing within one challenge category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub total_challenges: i64,
    pub solved_by_user: i64,
    pub points_earned: i64,
    pub completion_rate_percent: i64,
}

/// One user's per-day cumulative point series over a trend window.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    pub user_id: i64,
    pub name: String,
    /// Cumulative points per day, oldest day first, zero-filled.
    pub cumulative: Vec<i64>,
    /// Final cumulative value over the window.
    pub total: i64,
}

/// Trend query result: the window plus the top user series.
#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    /// First day of the window (`YYYY-MM-DD`).
    pub start_day: String,
    /// Number of days in the window (requested days plus buffer).
    pub window_days: usize,
    pub series: Vec<TrendSeries>,
}

/// Who-solved lookup result.
#[derive(Debug, Clone, Serialize)]
pub struct WhoSolved {
    pub challenge: Challenge,
    pub solvers: Vec<SolverRow>,
}

pub struct Standings {
    db: Arc<Database>,
}

impl Standings {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All users ordered by score descending, ties by registration order.
    pub async fn global_scoreboard(&self) -> Result<Vec<User>, TrackerError> {
        self.db.list_users_by_score().await
    }

    /// Per-user points earned on the current calendar day. Users without
    /// solves today are excluded.
    pub async fn today_scoreboard(&self) -> Result<Vec<DayScore>, TrackerError> {
        self.scoreboard_for_day(Local::now().date_naive()).await
    }

    pub async fn scoreboard_for_day(&self, day: NaiveDate) -> Result<Vec<DayScore>, TrackerError> {
        self.db.day_scores(&day.format("%Y-%m-%d").to_string()).await
    }

    /// Per-day cumulative points over the trailing `n_days` (plus buffer
    /// days), top users only.
    pub async fn trend(&self, n_days: u32) -> Result<TrendReport, TrackerError> {
        self.trend_from(Local::now().date_naive(), n_days).await
    }

    pub async fn trend_from(
        &self,
        today: NaiveDate,
        n_days: u32,
    ) -> Result<TrendReport, TrackerError> {
        let window_days = n_days as i64 + TREND_BUFFER_DAYS;
        let start = today - Duration::days(window_days - 1);
        let start_str = start.format("%Y-%m-%d").to_string();

        let rows = self.db.daily_points_since(&start_str).await?;

        // Bucket points per user per day offset, zero-filled.
        let mut daily: HashMap<i64, (String, Vec<i64>)> = HashMap::new();
        for row in rows {
            let Ok(day) = NaiveDate::parse_from_str(&row.day, "%Y-%m-%d") else {
                return Err(TrackerError::Corrupt(format!(
                    "unparseable ledger date {:?}",
                    row.day
                )));
            };
            let offset = (day - start).num_days();
            if !(0..window_days).contains(&offset) {
                continue;
            }
            let entry = daily
                .entry(row.user_id)
                .or_insert_with(|| (row.name.clone(), vec![0; window_days as usize]));
            entry.1[offset as usize] += row.points;
        }

        let mut series: Vec<TrendSeries> = daily
            .into_iter()
            .map(|(user_id, (name, per_day))| {
                let mut cumulative = Vec::with_capacity(per_day.len());
                let mut running = 0;
                for points in per_day {
                    running += points;
                    cumulative.push(running);
                }
                TrendSeries {
                    user_id,
                    name,
                    total: running,
                    cumulative,
                }
            })
            .filter(|s| s.total > 0)
            .collect();

        series.sort_by_key(|s| (std::cmp::Reverse(s.total), s.user_id));
        series.truncate(TREND_MAX_USERS);

        Ok(TrendReport {
            start_day: start_str,
            window_days: window_days as usize,
            series,
        })
    }

    /// Per-category standing for one user, covering every category known to
    /// the catalog. Categories without solves report zeros.
    pub async fn category_stats(&self, user_id: i64) -> Result<Vec<CategoryStats>, TrackerError> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(TrackerError::UserNotFound(user_id));
        }

        let solved: HashMap<String, (i64, i64)> = self
            .db
            .user_category_stats(user_id)
            .await?
            .into_iter()
            .map(|row| (row.category, (row.solved, row.points)))
            .collect();

        let stats = self
            .db
            .category_totals()
            .await?
            .into_iter()
            .map(|cat| {
                let (solved_by_user, points_earned) =
                    solved.get(&cat.category).copied().unwrap_or((0, 0));
                let completion_rate_percent = if cat.total > 0 {
                    ((solved_by_user as f64 / cat.total as f64) * 100.0).round() as i64
                } else {
                    0
                };
                CategoryStats {
                    category: cat.category,
                    total_challenges: cat.total,
                    solved_by_user,
                    points_earned,
                    completion_rate_percent,
                }
            })
            .collect();

        Ok(stats)
    }

    /// Resolve a challenge by exact title and list everyone who solved it.
    /// Zero or multiple title matches are reportable conditions.
    pub async fn who_solved(&self, title: &str) -> Result<WhoSolved, TrackerError> {
        let mut matches = self.db.find_challenges_by_title(title).await?;
        match matches.len() {
            0 => Err(TrackerError::ChallengeNotFound(title.to_string())),
            1 => {
                let challenge = matches.remove(0);
                let solvers = self.db.solvers_of(challenge.id).await?;
                Ok(WhoSolved { challenge, solvers })
            }
            count => Err(TrackerError::AmbiguousChallengeMatch {
                title: title.to_string(),
                count,
            }),
        }
    }
}
