// End-to-end reconciliation and standings behavior against an in-memory
// database: idempotence, ordering, score trajectory, first blood, milestone
// steps, overtakes and unknown-challenge deferral.

use std::sync::Arc;

use solvetrack_backend::db::{Challenge, Database};
use solvetrack_backend::ingest::Reconciler;
use solvetrack_backend::source::{parse_solve_date, RawSolve};
use solvetrack_backend::standings::Standings;

async fn test_db() -> Arc<Database> {
    Arc::new(Database::new("sqlite::memory:").await.unwrap())
}

async fn seed_challenge(db: &Database, id: i64, score: i64) {
    db.insert_challenge_if_absent(&Challenge {
        id,
        title: format!("chall {id}"),
        subtitle: String::new(),
        score,
        category: "Web".to_string(),
        difficulty: "easy".to_string(),
    })
    .await
    .unwrap();
}

fn solve(challenge_id: i64, at: &str) -> RawSolve {
    RawSolve {
        challenge_id,
        solved_at: parse_solve_date(at).unwrap(),
        title: format!("chall {challenge_id}"),
    }
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 10, 50).await;
    seed_challenge(&db, 11, 30).await;
    engine.register_user(1, "alice").await.unwrap();

    let remote = vec![
        solve(10, "2026-08-01 10:00:00"),
        solve(11, "2026-08-02 10:00:00"),
    ];

    let first = engine.reconcile_user(1, &remote).await.unwrap();
    assert_eq!(first.events.len(), 2);

    let second = engine.reconcile_user(1, &remote).await.unwrap();
    assert!(second.events.is_empty());
    assert!(second.unknown_challenges.is_empty());

    let alice = db.get_user(1).await.unwrap().unwrap();
    assert_eq!(alice.score, 80);
}

#[tokio::test]
async fn test_score_invariant_holds_after_reconciliation() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 10, 15).await;
    seed_challenge(&db, 11, 25).await;
    seed_challenge(&db, 12, 60).await;
    engine.register_user(1, "alice").await.unwrap();
    engine.register_user(2, "bob").await.unwrap();

    engine
        .reconcile_user(
            1,
            &[
                solve(10, "2026-08-01 10:00:00"),
                solve(12, "2026-08-03 10:00:00"),
            ],
        )
        .await
        .unwrap();
    engine
        .reconcile_user(2, &[solve(11, "2026-08-02 10:00:00")])
        .await
        .unwrap();

    for user in db.list_users().await.unwrap() {
        let cached = user.score;
        let derived = db.ledger_score(user.id).await.unwrap();
        assert_eq!(cached, derived, "score cache out of sync for {}", user.name);
    }
}

#[tokio::test]
async fn test_solves_applied_in_chronological_order() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 10, 50).await;
    seed_challenge(&db, 11, 30).await;
    seed_challenge(&db, 12, 70).await;
    engine.register_user(1, "alice").await.unwrap();

    // Remote reports newest-first; the engine must re-sort ascending
    let remote = vec![
        solve(12, "2026-08-03 10:00:00"),
        solve(10, "2026-08-01 10:00:00"),
        solve(11, "2026-08-02 10:00:00"),
    ];

    let outcome = engine.reconcile_user(1, &remote).await.unwrap();
    assert_eq!(outcome.events.len(), 3);

    let order: Vec<i64> = outcome.events.iter().map(|e| e.challenge.id).collect();
    assert_eq!(order, vec![10, 11, 12]);

    // Score trajectory reflected in each event's user snapshot
    let trajectory: Vec<i64> = outcome.events.iter().map(|e| e.user.score).collect();
    assert_eq!(trajectory, vec![50, 80, 150]);
}

#[tokio::test]
async fn test_first_blood_only_for_first_solver() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 10, 50).await;
    engine.register_user(1, "alice").await.unwrap();
    engine.register_user(2, "bob").await.unwrap();

    let outcome = engine
        .reconcile_user(1, &[solve(10, "2026-08-01 10:00:00")])
        .await
        .unwrap();
    assert!(outcome.events[0].first_blood);

    let outcome = engine
        .reconcile_user(2, &[solve(10, "2026-08-02 10:00:00")])
        .await
        .unwrap();
    assert!(!outcome.events[0].first_blood);
}

#[tokio::test]
async fn test_milestone_steps() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    // 80 -> 95: no boundary crossed. 95 -> 105: crosses 100.
    // 105 .. 950 via a big solve, then 950 -> 1050 crosses 1000.
    seed_challenge(&db, 10, 80).await;
    seed_challenge(&db, 11, 15).await;
    seed_challenge(&db, 12, 10).await;
    seed_challenge(&db, 13, 845).await;
    seed_challenge(&db, 14, 100).await;
    engine.register_user(1, "alice").await.unwrap();

    let remote = vec![
        solve(10, "2026-08-01 10:00:00"), // 0 -> 80
        solve(11, "2026-08-02 10:00:00"), // 80 -> 95
        solve(12, "2026-08-03 10:00:00"), // 95 -> 105
        solve(13, "2026-08-04 10:00:00"), // 105 -> 950
        solve(14, "2026-08-05 10:00:00"), // 950 -> 1050
    ];

    let outcome = engine.reconcile_user(1, &remote).await.unwrap();
    let steps: Vec<Option<i64>> = outcome
        .events
        .iter()
        .map(|e| e.completed_step)
        .collect();
    assert_eq!(steps, vec![None, None, Some(100), Some(900), Some(1000)]);
}

#[tokio::test]
async fn test_overtake_reports_passed_users_in_order() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 20, 100).await;
    seed_challenge(&db, 21, 120).await;
    seed_challenge(&db, 22, 130).await;
    seed_challenge(&db, 23, 40).await;

    engine.register_user(1, "A").await.unwrap();
    engine.register_user(2, "B").await.unwrap();
    engine.register_user(3, "C").await.unwrap();

    engine
        .reconcile_user(1, &[solve(20, "2026-08-01 10:00:00")])
        .await
        .unwrap();
    engine
        .reconcile_user(2, &[solve(21, "2026-08-01 11:00:00")])
        .await
        .unwrap();
    engine
        .reconcile_user(3, &[solve(22, "2026-08-01 12:00:00")])
        .await
        .unwrap();

    // A(100) solves a 40-point challenge: passes B(120) and C(130), now top
    let outcome = engine
        .reconcile_user(
            1,
            &[
                solve(20, "2026-08-01 10:00:00"),
                solve(23, "2026-08-02 10:00:00"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.events.len(), 1);
    let event = &outcome.events[0];
    assert_eq!(event.user.score, 140);
    assert_eq!(event.overtaken_names, vec!["B", "C"]);
    assert_eq!(event.next_user_name, None);
    assert_eq!(event.points_to_next, None);
}

#[tokio::test]
async fn test_next_target_reported_when_not_top() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 20, 30).await;
    seed_challenge(&db, 21, 200).await;

    engine.register_user(1, "A").await.unwrap();
    engine.register_user(2, "B").await.unwrap();

    engine
        .reconcile_user(2, &[solve(21, "2026-08-01 09:00:00")])
        .await
        .unwrap();

    let outcome = engine
        .reconcile_user(1, &[solve(20, "2026-08-01 10:00:00")])
        .await
        .unwrap();

    let event = &outcome.events[0];
    assert_eq!(event.next_user_name.as_deref(), Some("B"));
    assert_eq!(event.points_to_next, Some(170));
    assert!(event.overtaken_names.is_empty());
}

#[tokio::test]
async fn test_unknown_challenge_deferred_until_catalog_knows_it() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());

    seed_challenge(&db, 10, 50).await;
    engine.register_user(1, "alice").await.unwrap();

    let remote = vec![
        solve(10, "2026-08-01 10:00:00"),
        solve(9999, "2026-08-02 10:00:00"),
    ];

    let outcome = engine.reconcile_user(1, &remote).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.unknown_challenges, vec![9999]);

    // No ledger row was fabricated for the unknown challenge
    let alice = db.get_user(1).await.unwrap().unwrap();
    assert_eq!(alice.score, 50);
    assert_eq!(db.solved_challenge_ids(1).await.unwrap(), vec![10]);

    // Still a candidate on the next run
    let outcome = engine.reconcile_user(1, &remote).await.unwrap();
    assert!(outcome.events.is_empty());
    assert_eq!(outcome.unknown_challenges, vec![9999]);

    // Once the catalog learns about it, the solve lands
    seed_challenge(&db, 9999, 25).await;
    let outcome = engine.reconcile_user(1, &remote).await.unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].challenge.id, 9999);
    assert_eq!(db.get_user(1).await.unwrap().unwrap().score, 75);
}

#[tokio::test]
async fn test_removed_user_disappears_from_standings() {
    let db = test_db().await;
    let engine = Reconciler::new(db.clone());
    let standings = Standings::new(db.clone());

    seed_challenge(&db, 10, 50).await;
    engine.register_user(1, "alice").await.unwrap();
    engine.register_user(2, "bob").await.unwrap();
    engine
        .reconcile_user(1, &[solve(10, "2026-08-01 10:00:00")])
        .await
        .unwrap();

    engine.remove_user(1).await.unwrap();

    let board = standings.global_scoreboard().await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].name, "bob");

    // First blood is available again once the old ledger rows are gone
    let outcome = engine
        .reconcile_user(2, &[solve(10, "2026-08-03 10:00:00")])
        .await
        .unwrap();
    assert!(outcome.events[0].first_blood);
}
