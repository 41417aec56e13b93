// Solve ingestion: reconcile a user's authoritative remote solve history
// against the local ledger, applying exactly the new solves oldest-first.
//
// Each new solve is committed in its own transaction, so an interrupted run
// keeps its committed prefix and the next run resumes from the ledger alone.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::db::{Challenge, Database, User};
use crate::error::TrackerError;
use crate::metrics;
use crate::rank;
use crate::source::RawSolve;

/// Engine lifecycle, consulted by the command layer before accepting
/// reconciliation-dependent commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Uninitialized,
    CatalogLoaded,
    Ready,
}

/// Structured result for one newly recorded solve.
#[derive(Debug, Clone, Serialize)]
pub struct SolveEvent {
    /// User snapshot taken right after this solve's commit.
    pub user: User,
    pub challenge: Challenge,
    /// Closest user still above, and the point gap to reach them.
    /// None when the user is now the top scorer.
    pub next_user_name: Option<String>,
    pub points_to_next: Option<i64>,
    /// True iff this user is the first-ever recorded solver of the challenge.
    pub first_blood: bool,
    /// Users whose previously higher score this solve surpassed, ascending
    /// by their score.
    pub overtaken_names: Vec<String>,
    /// Milestone threshold crossed by this solve, if any.
    pub completed_step: Option<i64>,
}

/// Everything one reconciliation pass produced.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileOutcome {
    /// Per-solve results in processing (chronological) order.
    pub events: Vec<SolveEvent>,
    /// Challenge ids cited by remote solves but absent from the catalog.
    /// Those solves were not recorded and will be retried next run; the
    /// caller should trigger a catalog resync.
    pub unknown_challenges: Vec<i64>,
}

/// Reconciles remote solve histories against the ledger and keeps the user
/// registry consistent. One instance per process.
pub struct Reconciler {
    db: Arc<Database>,
    lifecycle: StdMutex<Lifecycle>,
    user_locks: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            lifecycle: StdMutex::new(Lifecycle::Uninitialized),
            user_locks: StdMutex::new(HashMap::new()),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().unwrap()
    }

    /// Advance to CatalogLoaded after the first successful catalog sync.
    pub fn mark_catalog_loaded(&self) {
        let mut state = self.lifecycle.lock().unwrap();
        if *state == Lifecycle::Uninitialized {
            *state = Lifecycle::CatalogLoaded;
        }
    }

    /// Advance to Ready after the first completed reconciliation pass.
    pub fn mark_ready(&self) {
        let mut state = self.lifecycle.lock().unwrap();
        *state = Lifecycle::Ready;
    }

    /// Fail with `NotReady` unless the engine has reached `required`.
    pub fn require(&self, required: Lifecycle) -> Result<(), TrackerError> {
        let state = self.lifecycle();
        if state >= required {
            Ok(())
        } else {
            Err(TrackerError::NotReady(state))
        }
    }

    // ── Registry operations ───────────────────────────────────────────

    /// Register a user for tracking. Their history is picked up by the next
    /// reconciliation pass (or a force-reconcile).
    pub async fn register_user(&self, id: i64, name: &str) -> Result<User, TrackerError> {
        let user = self.db.create_user(id, name).await?;
        metrics::TRACKED_USERS.inc();
        tracing::info!(id, name, "user registered");
        Ok(user)
    }

    /// Stop tracking a user, deleting their solves. Serialized against any
    /// in-flight reconciliation for the same user.
    pub async fn remove_user(&self, id: i64) -> Result<(), TrackerError> {
        let lock = self.user_lock(id);
        let _guard = lock.lock().await;

        if !self.db.delete_user(id).await? {
            return Err(TrackerError::UserNotFound(id));
        }
        self.user_locks.lock().unwrap().remove(&id);
        metrics::TRACKED_USERS.dec();
        tracing::info!(id, "user removed");
        Ok(())
    }

    // ── Reconciliation ────────────────────────────────────────────────

    /// Reconcile one user's full remote solve history against the ledger.
    ///
    /// New solves are applied oldest first: each commit mutates the cached
    /// score, and overtake results must reflect the score trajectory step by
    /// step rather than the end state. Idempotent: a second call with the
    /// same remote data derives an empty candidate set from the updated
    /// ledger and yields no events.
    pub async fn reconcile_user(
        &self,
        user_id: i64,
        remote_solves: &[RawSolve],
    ) -> Result<ReconcileOutcome, TrackerError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let timer = metrics::RECONCILE_DURATION_SECONDS.start_timer();
        let result = self.reconcile_locked(user_id, remote_solves).await;
        timer.observe_duration();

        match &result {
            Ok(outcome) => {
                metrics::RECONCILE_RUNS_TOTAL.with_label_values(&["ok"]).inc();
                if !outcome.events.is_empty() || !outcome.unknown_challenges.is_empty() {
                    tracing::info!(
                        user_id,
                        new_solves = outcome.events.len(),
                        unknown = outcome.unknown_challenges.len(),
                        "reconciliation applied changes"
                    );
                }
            }
            Err(e) => {
                metrics::RECONCILE_RUNS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(user_id, error = %e, "reconciliation failed");
            }
        }
        result
    }

    async fn reconcile_locked(
        &self,
        user_id: i64,
        remote_solves: &[RawSolve],
    ) -> Result<ReconcileOutcome, TrackerError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or(TrackerError::UserNotFound(user_id))?;

        let solved: HashSet<i64> = self
            .db
            .solved_challenge_ids(user_id)
            .await?
            .into_iter()
            .collect();

        // Candidates: remote solves not yet in the ledger, oldest first.
        // The remote list occasionally repeats an entry; keep the first.
        let mut candidates: Vec<&RawSolve> = remote_solves
            .iter()
            .filter(|s| !solved.contains(&s.challenge_id))
            .collect();
        candidates.sort_by_key(|s| (s.solved_at, s.challenge_id));
        let mut seen = HashSet::new();
        candidates.retain(|s| seen.insert(s.challenge_id));

        let mut outcome = ReconcileOutcome::default();
        let mut score = user.score;

        for solve in candidates {
            let challenge = match self.db.get_challenge(solve.challenge_id).await? {
                Some(c) => c,
                None => {
                    // Deferred, not fatal: the solve is not recorded and
                    // reappears as a candidate until the catalog knows the id.
                    tracing::warn!(
                        user_id,
                        challenge_id = solve.challenge_id,
                        title = %solve.title,
                        "solve cites unknown challenge, deferring"
                    );
                    outcome.unknown_challenges.push(solve.challenge_id);
                    continue;
                }
            };

            // Snapshot the other users' scores before this commit; the
            // overtake computation needs their pre-solve standings.
            let others: Vec<User> = self
                .db
                .list_users()
                .await?
                .into_iter()
                .filter(|u| u.id != user_id)
                .collect();

            let first_blood = self.db.count_solvers(challenge.id).await? == 0;

            let old_score = score;
            let new_score = old_score + challenge.score;
            let completed_step = rank::completed_step(old_score, new_score);

            self.db
                .record_solve(user_id, challenge.id, &solve.date_string(), challenge.score)
                .await?;
            metrics::SOLVES_RECORDED_TOTAL.inc();

            let overtaken_names = rank::overtaken(&others, old_score, new_score);
            let (next_user_name, points_to_next) = match rank::next_target(&others, new_score) {
                Some((name, gap)) => (Some(name), Some(gap)),
                None => (None, None),
            };

            outcome.events.push(SolveEvent {
                user: User {
                    id: user.id,
                    name: user.name.clone(),
                    score: new_score,
                },
                challenge,
                next_user_name,
                points_to_next,
                first_blood,
                overtaken_names,
                completed_step,
            });
            score = new_score;
        }

        Ok(outcome)
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap();
        locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
