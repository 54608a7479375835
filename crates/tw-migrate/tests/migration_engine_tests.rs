//! Integration tests for the migration engine against DuckDB.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tw_core::{Frame, FrameFormat, MigrationSet, MigrationStep, MigrationTarget, SqlValue};
use tw_db::{Database, DbError, DbResult, DuckDbBackend};
use tw_migrate::{Direction, Ledger, MigrateError, Migrator};

const TARGET: &str = "shop";

fn scenario_steps() -> MigrationSet {
    MigrationSet::new(vec![
        MigrationStep::new("A", "CREATE TABLE t (id INTEGER)", "DROP TABLE t"),
        MigrationStep::new(
            "B",
            "ALTER TABLE t ADD COLUMN x INTEGER",
            "ALTER TABLE t DROP COLUMN x",
        ),
    ])
    .unwrap()
}

fn numbered_steps(n: usize) -> MigrationSet {
    MigrationSet::new(
        (0..n)
            .map(|i| {
                MigrationStep::new(
                    format!("create_t{i}"),
                    format!("CREATE TABLE t{i} (id INTEGER)"),
                    format!("DROP TABLE t{i}"),
                )
            })
            .collect(),
    )
    .unwrap()
}

async fn table_exists(db: &dyn Database, name: &str) -> bool {
    let rows = db
        .query_rows(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            &[SqlValue::from(name)],
        )
        .await
        .unwrap();
    rows[0][0].as_i64() == Some(1)
}

async fn column_exists(db: &dyn Database, table: &str, column: &str) -> bool {
    let rows = db
        .query_rows(
            "SELECT COUNT(*) FROM information_schema.columns WHERE table_name = ? AND column_name = ?",
            &[SqlValue::from(table), SqlValue::from(column)],
        )
        .await
        .unwrap();
    rows[0][0].as_i64() == Some(1)
}

async fn ledger_index(db: &dyn Database) -> Option<i64> {
    Ledger::new(db)
        .read(TARGET)
        .await
        .unwrap()
        .map(|e| e.latest_index)
}

/// Worked example: -1 → 1 → 0 → 0.
#[tokio::test]
async fn test_scenario_forward_back_and_repeat() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = scenario_steps();
    let migrator = Migrator::new(&db, &steps, TARGET);
    let ledger = Ledger::new(&db);

    let outcome = migrator.migrate_to(&MigrationTarget::Index(1)).await.unwrap();
    assert_eq!(outcome.from_index, -1);
    assert_eq!(outcome.to_index, 1);
    let entry = ledger.read(TARGET).await.unwrap().unwrap();
    assert_eq!(entry.latest_index, 1);
    assert_eq!(entry.latest_name.as_deref(), Some("B"));
    let history = ledger.history(TARGET).await.unwrap();
    let summary: Vec<(&str, Direction)> = history
        .iter()
        .map(|r| (r.name.as_str(), r.direction))
        .collect();
    assert_eq!(summary, vec![("A", Direction::Up), ("B", Direction::Up)]);
    assert!(column_exists(&db, "t", "x").await);

    let outcome = migrator.migrate_to(&MigrationTarget::Index(0)).await.unwrap();
    assert_eq!(outcome.applied.len(), 1);
    let history = ledger.history(TARGET).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].name, "B");
    assert_eq!(history[2].direction, Direction::Down);
    assert_eq!(history[2].query, "ALTER TABLE t DROP COLUMN x");
    assert_eq!(ledger_index(&db).await, Some(0));
    assert!(table_exists(&db, "t").await);
    assert!(!column_exists(&db, "t", "x").await);

    let outcome = migrator.migrate_to(&MigrationTarget::Index(0)).await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(ledger.history(TARGET).await.unwrap().len(), 3);
}

/// Ledger index matches the audit log after every call.
#[tokio::test]
async fn test_ledger_consistent_with_audit_across_moves() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = numbered_steps(6);
    let migrator = Migrator::new(&db, &steps, TARGET);
    let ledger = Ledger::new(&db);

    for target in [3, 5, 1, -1, 4, 4, 0, 5, 2] {
        migrator
            .migrate_to(&MigrationTarget::Index(target))
            .await
            .unwrap();

        assert_eq!(ledger_index(&db).await, Some(target));
        let history = ledger.history(TARGET).await.unwrap();
        let ups = history.iter().filter(|r| r.direction == Direction::Up).count() as i64;
        let downs = history
            .iter()
            .filter(|r| r.direction == Direction::Down)
            .count() as i64;
        assert_eq!(ups - downs, target + 1, "after migrating to {target}");

        for i in 0..6 {
            assert_eq!(
                table_exists(&db, &format!("t{i}")).await,
                i <= target,
                "table t{i} after migrating to {target}"
            );
        }
    }
}

#[tokio::test]
async fn test_repeated_current_target_is_noop() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = numbered_steps(3);
    let migrator = Migrator::new(&db, &steps, TARGET);
    let ledger = Ledger::new(&db);

    migrator.migrate_to(&MigrationTarget::Latest).await.unwrap();
    let before = ledger.history(TARGET).await.unwrap();
    let entry_before = ledger.read(TARGET).await.unwrap();

    for _ in 0..2 {
        let outcome = migrator.migrate_to(&MigrationTarget::Latest).await.unwrap();
        assert!(outcome.is_noop());
    }
    assert_eq!(ledger.history(TARGET).await.unwrap(), before);
    assert_eq!(ledger.read(TARGET).await.unwrap(), entry_before);
}

#[tokio::test]
async fn test_failing_step_rolls_back_whole_delta() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = MigrationSet::new(vec![
        MigrationStep::new("a", "CREATE TABLE a (id INTEGER)", "DROP TABLE a"),
        MigrationStep::new("b", "CREATE TABLE b (id INTEGER)", "DROP TABLE b"),
        MigrationStep::new("c", "CREATE TABLE c (id INTEGER)", "DROP TABLE c"),
        MigrationStep::new("broken", "CREATE TABLE nope (id NOT_A_TYPE)", "SELECT 1"),
        MigrationStep::new("e", "CREATE TABLE e (id INTEGER)", "DROP TABLE e"),
    ])
    .unwrap();
    let migrator = Migrator::new(&db, &steps, TARGET);
    let ledger = Ledger::new(&db);

    migrator.migrate_to(&MigrationTarget::Index(1)).await.unwrap();
    let history_before = ledger.history(TARGET).await.unwrap();

    let err = migrator
        .migrate_to(&MigrationTarget::Latest)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Db(_)), "unexpected error: {err}");

    assert_eq!(ledger_index(&db).await, Some(1));
    assert_eq!(ledger.history(TARGET).await.unwrap(), history_before);
    assert!(table_exists(&db, "b").await);
    assert!(!table_exists(&db, "c").await, "step c must be rolled back");
    assert!(!table_exists(&db, "e").await);

    // The connection is usable again afterwards.
    migrator.migrate_to(&MigrationTarget::Index(2)).await.unwrap();
    assert_eq!(ledger_index(&db).await, Some(2));
}

#[tokio::test]
async fn test_failing_down_step_rolls_back_whole_delta() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = MigrationSet::new(vec![
        MigrationStep::new("a", "CREATE TABLE a (id INTEGER)", "DROP TABLE a"),
        MigrationStep::new("b", "CREATE TABLE b (id INTEGER)", "DROP TABLE missing_table"),
        MigrationStep::new("c", "CREATE TABLE c (id INTEGER)", "DROP TABLE c"),
        MigrationStep::new("d", "CREATE TABLE d (id INTEGER)", "DROP TABLE d"),
    ])
    .unwrap();
    let migrator = Migrator::new(&db, &steps, TARGET);
    let ledger = Ledger::new(&db);

    migrator.migrate_to(&MigrationTarget::Latest).await.unwrap();
    let history_before = ledger.history(TARGET).await.unwrap();
    assert_eq!(history_before.len(), 4);

    // d and c go down before b's down fails.
    let err = migrator
        .migrate_to(&MigrationTarget::Index(-1))
        .await
        .unwrap_err();
    assert!(
        matches!(err, MigrateError::Db(DbError::TableNotFound(_))),
        "unexpected error: {err}"
    );

    let entry = ledger.read(TARGET).await.unwrap().unwrap();
    assert_eq!(entry.latest_index, 3);
    assert_eq!(entry.latest_name.as_deref(), Some("d"));
    assert_eq!(ledger.history(TARGET).await.unwrap(), history_before);
    for table in ["a", "b", "c", "d"] {
        assert!(table_exists(&db, table).await, "table {table} must survive");
    }
}

#[tokio::test]
async fn test_first_run_failure_leaves_no_ledger() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = MigrationSet::new(vec![MigrationStep::new(
        "broken",
        "THIS IS NOT SQL",
        "SELECT 1",
    )])
    .unwrap();
    let migrator = Migrator::new(&db, &steps, TARGET);

    assert!(migrator.migrate_to(&MigrationTarget::Latest).await.is_err());
    assert!(!Ledger::new(&db).storage_exists().await.unwrap());
}

#[tokio::test]
async fn test_roll_back_everything() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = numbered_steps(3);
    let migrator = Migrator::new(&db, &steps, TARGET);

    migrator.migrate_to(&MigrationTarget::Latest).await.unwrap();
    let outcome = migrator.migrate_to(&MigrationTarget::Index(-1)).await.unwrap();
    let order: Vec<i64> = outcome.applied.iter().map(|s| s.index).collect();
    assert_eq!(order, vec![2, 1, 0]);

    let entry = Ledger::new(&db).read(TARGET).await.unwrap().unwrap();
    assert_eq!(entry.latest_index, -1);
    assert_eq!(entry.latest_name, None);
    assert!(!table_exists(&db, "t0").await);
}

#[tokio::test]
async fn test_migrate_by_name() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = numbered_steps(4);
    let migrator = Migrator::new(&db, &steps, TARGET);

    migrator
        .migrate_to(&MigrationTarget::Name("create_t2".into()))
        .await
        .unwrap();
    assert_eq!(ledger_index(&db).await, Some(2));
}

#[tokio::test]
async fn test_unknown_name_migrates_to_latest() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = scenario_steps();
    let migrator = Migrator::new(&db, &steps, TARGET);

    let outcome = migrator
        .migrate_to(&MigrationTarget::Name("no_such_step".into()))
        .await
        .unwrap();
    assert_eq!(outcome.to_index, 1);
    assert_eq!(ledger_index(&db).await, Some(1));
    assert!(column_exists(&db, "t", "x").await);
}

#[tokio::test]
async fn test_targets_are_tracked_independently() {
    let db = DuckDbBackend::in_memory().unwrap();
    let steps = MigrationSet::new(vec![MigrationStep::new("noop", "SELECT 1", "SELECT 1")]).unwrap();

    Migrator::new(&db, &steps, "alpha")
        .migrate_to(&MigrationTarget::Latest)
        .await
        .unwrap();

    let ledger = Ledger::new(&db);
    assert_eq!(ledger.read("alpha").await.unwrap().unwrap().latest_index, 0);
    assert_eq!(ledger.read("beta").await.unwrap(), None);
    assert!(ledger.history("beta").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_position_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.duckdb");
    let steps = numbered_steps(3);
    {
        let db = DuckDbBackend::from_path(&path).unwrap();
        Migrator::new(&db, &steps, TARGET)
            .migrate_to(&MigrationTarget::Index(1))
            .await
            .unwrap();
    }

    let db = DuckDbBackend::from_path(&path).unwrap();
    let status = Migrator::new(&db, &steps, TARGET).status().await.unwrap();
    assert_eq!(status.current_index, 1);
    assert_eq!(status.pending, 1);
    assert_eq!(Ledger::new(&db).history(TARGET).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ledger_ahead_of_configuration_fails() {
    let db = DuckDbBackend::in_memory().unwrap();
    let wide = numbered_steps(4);
    Migrator::new(&db, &wide, TARGET)
        .migrate_to(&MigrationTarget::Latest)
        .await
        .unwrap();

    let narrow = numbered_steps(2);
    let err = Migrator::new(&db, &narrow, TARGET)
        .migrate_to(&MigrationTarget::Latest)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::LedgerAhead { index: 3, .. }));
    assert_eq!(ledger_index(&db).await, Some(3));
}

/// Delegates to DuckDB but refuses to commit once armed.
struct CommitFailingDb {
    inner: DuckDbBackend,
    fail_commit: AtomicBool,
}

#[async_trait]
impl Database for CommitFailingDb {
    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.inner.execute_batch(sql).await
    }

    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.inner.execute_params(sql, params).await
    }

    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        self.inner.query_rows(sql, params).await
    }

    async fn begin(&self) -> DbResult<()> {
        self.inner.begin().await
    }

    async fn commit(&self) -> DbResult<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(DbError::TransactionError {
                operation: "COMMIT".to_string(),
                message: "injected".to_string(),
            });
        }
        self.inner.commit().await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.inner.rollback().await
    }

    fn stream_query(
        &self,
        sql: &str,
        format: FrameFormat,
        on_frame: &mut dyn FnMut(Frame) -> DbResult<()>,
    ) -> DbResult<()> {
        self.inner.stream_query(sql, format, on_frame)
    }

    fn db_type(&self) -> &'static str {
        "duckdb-commit-failing"
    }
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let db = CommitFailingDb {
        inner: DuckDbBackend::in_memory().unwrap(),
        fail_commit: AtomicBool::new(false),
    };
    let steps = numbered_steps(3);
    let migrator = Migrator::new(&db, &steps, TARGET);
    migrator.migrate_to(&MigrationTarget::Index(0)).await.unwrap();

    db.fail_commit.store(true, Ordering::SeqCst);
    let err = migrator
        .migrate_to(&MigrationTarget::Latest)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrateError::Db(DbError::TransactionError { .. })
    ));

    db.fail_commit.store(false, Ordering::SeqCst);
    assert_eq!(ledger_index(&db).await, Some(0));
    assert_eq!(Ledger::new(&db).history(TARGET).await.unwrap().len(), 1);
    assert!(!table_exists(&db, "t1").await);
}
