// Database access layer (SQLite via sqlx).
//
// Repository-style functions returning plain value structs. No live object
// graph: every read the ingestion/standings engines need is an explicit query.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::TrackerError;

/// A tracked community member. `score` is a cached aggregate kept equal to
/// the sum of the challenge scores of their recorded solves.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub score: i64,
}

/// A challenge known to the catalog. Immutable once created, except for
/// catalog-wide corrective title cleanup.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Challenge {
    pub id: i64,
    pub title: String,
    pub subtitle: String,
    pub score: i64,
    pub category: String,
    pub difficulty: String,
}

/// A solver of a specific challenge, for who-solved lookups.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SolverRow {
    pub name: String,
    pub date: String,
}

/// Per-user point total for a single calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DayScore {
    pub user_id: i64,
    pub name: String,
    pub points: i64,
}

/// Points a user earned on one calendar day (grouped ledger row).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyPoints {
    pub user_id: i64,
    pub name: String,
    pub day: String,
    pub points: i64,
}

/// Number of catalog challenges in one category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub total: i64,
}

/// A user's solved count and points within one category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategorySolved {
    pub category: String,
    pub solved: i64,
    pub points: i64,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, TrackerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenges (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                subtitle TEXT NOT NULL DEFAULT '',
                score INTEGER NOT NULL,
                category TEXT NOT NULL,
                difficulty TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS solves (
                user_id INTEGER NOT NULL REFERENCES users(id),
                challenge_id INTEGER NOT NULL REFERENCES challenges(id),
                date TEXT NOT NULL,
                PRIMARY KEY (user_id, challenge_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────────

    /// Register a new tracked user with a starting score of zero.
    pub async fn create_user(&self, id: i64, name: &str) -> Result<User, TrackerError> {
        if self.get_user(id).await?.is_some() {
            return Err(TrackerError::DuplicateUser(id));
        }
        let row = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, score) VALUES (?, ?, 0) RETURNING id, name, score",
        )
        .bind(id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Look up a user by id. More than one row for the same id is a fatal
    /// invariant violation.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, TrackerError> {
        let rows = sqlx::query_as::<_, User>("SELECT id, name, score FROM users WHERE id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.into_iter().next()),
            n => Err(TrackerError::Corrupt(format!(
                "{n} user rows share id {id}"
            ))),
        }
    }

    /// All tracked users, in registration (id) order.
    pub async fn list_users(&self) -> Result<Vec<User>, TrackerError> {
        let rows = sqlx::query_as::<_, User>("SELECT id, name, score FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// All tracked users by score descending; ties broken by id (stable).
    pub async fn list_users_by_score(&self) -> Result<Vec<User>, TrackerError> {
        let rows = sqlx::query_as::<_, User>(
            "SELECT id, name, score FROM users ORDER BY score DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Remove a user and all of their solves. Returns false when the user
    /// was not tracked.
    pub async fn delete_user(&self, id: i64) -> Result<bool, TrackerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM solves WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Challenges ────────────────────────────────────────────────────

    /// Insert a challenge if its id is not already present. Returns true
    /// when a row was actually inserted.
    pub async fn insert_challenge_if_absent(
        &self,
        challenge: &Challenge,
    ) -> Result<bool, TrackerError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO challenges (id, title, subtitle, score, category, difficulty) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(challenge.id)
        .bind(&challenge.title)
        .bind(&challenge.subtitle)
        .bind(challenge.score)
        .bind(&challenge.category)
        .bind(&challenge.difficulty)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_challenge(&self, id: i64) -> Result<Option<Challenge>, TrackerError> {
        let rows = sqlx::query_as::<_, Challenge>(
            "SELECT id, title, subtitle, score, category, difficulty FROM challenges WHERE id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.into_iter().next()),
            n => Err(TrackerError::Corrupt(format!(
                "{n} challenge rows share id {id}"
            ))),
        }
    }

    /// All challenges whose title matches exactly. Title uniqueness is not
    /// enforced at the data level, so this can return multiple rows.
    pub async fn find_challenges_by_title(
        &self,
        title: &str,
    ) -> Result<Vec<Challenge>, TrackerError> {
        let rows = sqlx::query_as::<_, Challenge>(
            "SELECT id, title, subtitle, score, category, difficulty FROM challenges WHERE title = ? ORDER BY id",
        )
        .bind(title)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Corrective text cleanup: rewrite title/subtitle when they differ.
    /// Returns true when the row changed.
    pub async fn update_challenge_text(
        &self,
        id: i64,
        title: &str,
        subtitle: &str,
    ) -> Result<bool, TrackerError> {
        let result = sqlx::query(
            "UPDATE challenges SET title = ?, subtitle = ? WHERE id = ? AND (title != ? OR subtitle != ?)",
        )
        .bind(title)
        .bind(subtitle)
        .bind(id)
        .bind(title)
        .bind(subtitle)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_challenges(&self) -> Result<i64, TrackerError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM challenges")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    // ── Solve ledger ──────────────────────────────────────────────────

    /// Challenge ids already recorded for this user. Existence of a ledger
    /// row is the source of truth for "already solved".
    pub async fn solved_challenge_ids(&self, user_id: i64) -> Result<Vec<i64>, TrackerError> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT challenge_id FROM solves WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Number of users who have solved this challenge.
    pub async fn count_solvers(&self, challenge_id: i64) -> Result<i64, TrackerError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM solves WHERE challenge_id = ?")
            .bind(challenge_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Commit one new solve: insert the ledger row and bump the user's
    /// cached score, atomically. One transaction per solve so an interrupted
    /// reconciliation keeps its committed prefix.
    pub async fn record_solve(
        &self,
        user_id: i64,
        challenge_id: i64,
        date: &str,
        points: i64,
    ) -> Result<(), TrackerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO solves (user_id, challenge_id, date) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(challenge_id)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET score = score + ? WHERE id = ?")
            .bind(points)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Everyone who solved the given challenge, oldest solve first.
    pub async fn solvers_of(&self, challenge_id: i64) -> Result<Vec<SolverRow>, TrackerError> {
        let rows = sqlx::query_as::<_, SolverRow>(
            r#"
            SELECT u.name AS name, s.date AS date
            FROM solves s JOIN users u ON u.id = s.user_id
            WHERE s.challenge_id = ?
            ORDER BY s.date, u.id
        "#,
        )
        .bind(challenge_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sum of challenge scores over a user's ledger rows. Audit companion to
    /// the cached `users.score` aggregate.
    pub async fn ledger_score(&self, user_id: i64) -> Result<i64, TrackerError> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(c.score), 0)
            FROM solves s JOIN challenges c ON c.id = s.challenge_id
            WHERE s.user_id = ?
        "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    // ── Standings queries ─────────────────────────────────────────────

    /// Per-user point totals for solves dated on one calendar day
    /// (`YYYY-MM-DD`), highest first. Users without solves that day are
    /// simply absent.
    pub async fn day_scores(&self, day: &str) -> Result<Vec<DayScore>, TrackerError> {
        let rows = sqlx::query_as::<_, DayScore>(
            r#"
            SELECT u.id AS user_id, u.name AS name, COALESCE(SUM(c.score), 0) AS points
            FROM solves s
            JOIN users u ON u.id = s.user_id
            JOIN challenges c ON c.id = s.challenge_id
            WHERE substr(s.date, 1, 10) = ?
            GROUP BY u.id
            ORDER BY points DESC, u.id
        "#,
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Points per (user, day) for solves dated on or after the given day.
    /// ISO date strings compare lexicographically, so a plain string range
    /// works.
    pub async fn daily_points_since(&self, day: &str) -> Result<Vec<DailyPoints>, TrackerError> {
        let rows = sqlx::query_as::<_, DailyPoints>(
            r#"
            SELECT u.id AS user_id, u.name AS name,
                   substr(s.date, 1, 10) AS day,
                   COALESCE(SUM(c.score), 0) AS points
            FROM solves s
            JOIN users u ON u.id = s.user_id
            JOIN challenges c ON c.id = s.challenge_id
            WHERE substr(s.date, 1, 10) >= ?
            GROUP BY u.id, day
            ORDER BY u.id, day
        "#,
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Number of catalog challenges per category, alphabetically.
    pub async fn category_totals(&self) -> Result<Vec<CategoryCount>, TrackerError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS total FROM challenges GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A user's solved count and points per category (categories without
    /// solves are absent; the standings engine zero-fills them).
    pub async fn user_category_stats(
        &self,
        user_id: i64,
    ) -> Result<Vec<CategorySolved>, TrackerError> {
        let rows = sqlx::query_as::<_, CategorySolved>(
            r#"
            SELECT c.category AS category,
                   COUNT(*) AS solved,
                   COALESCE(SUM(c.score), 0) AS points
            FROM solves s JOIN challenges c ON c.id = s.challenge_id
            WHERE s.user_id = ?
            GROUP BY c.category
            ORDER BY c.category
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
