use runway::common::{MIGRATIONS_COLLECTION, Value};
use runway::doc;
use runway::errors::RunwayResult;
use runway::migration::{Migration, MigrationCommand, MigrationProcess};
use runway::store::memory::MemoryStore;
use runway::store::DocumentStore;
use runway_int_test::test_util::{
    cleanup, create_compensating_test_context, create_context, create_test_context,
    failing_command, run_test, TestContext,
};

fn seed_then_fail() -> Migration {
    Migration::new(
        2,
        "reshape_users",
        "",
        MigrationProcess::new()
            .command(MigrationCommand::create_collection("audit"))
            .command(MigrationCommand::insert_documents(
                "users",
                vec![doc! { "name": "carol" }],
            ))
            .command(failing_command())
            .command(MigrationCommand::add_field("users", "active", true))
            .command(MigrationCommand::rename_collection("users", "members")),
        MigrationProcess::new(),
    )
}

fn users() -> Migration {
    Migration::new(
        1,
        "create_users",
        "",
        MigrationProcess::new()
            .command(MigrationCommand::create_collection("users"))
            .command(MigrationCommand::insert_documents(
                "users",
                vec![doc! { "name": "alice" }, doc! { "name": "bob" }],
            )),
        MigrationProcess::new().command(MigrationCommand::drop_collection("users")),
    )
}

fn assert_rolled_back(ctx: TestContext) -> RunwayResult<()> {
    let before = ctx.store().find_all("users")?;
    let records = ctx.store().find_all(MIGRATIONS_COLLECTION)?;

    let outcome = ctx.runway().upgrade_all()?;
    assert_eq!(outcome.failed_at, Some(2));

    let store = ctx.store();
    assert!(!store.has_collection("audit")?);
    assert!(!store.has_collection("members")?);
    assert_eq!(store.find_all("users")?, before);
    assert_eq!(store.find_all(MIGRATIONS_COLLECTION)?, records);
    assert_eq!(ctx.runway().status()?.current_version, Some(1));
    Ok(())
}

#[test]
fn test_failed_migration_leaves_no_trace_natively() {
    run_test(
        || {
            let ctx = create_test_context(vec![users(), seed_then_fail()])?;
            ctx.runway().upgrade_one()?;
            Ok(ctx)
        },
        |ctx| {
            assert!(ctx.store().is_transactional());
            assert_rolled_back(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_failed_migration_leaves_no_trace_with_compensation() {
    run_test(
        || {
            let ctx = create_compensating_test_context(vec![users(), seed_then_fail()])?;
            ctx.runway().upgrade_one()?;
            Ok(ctx)
        },
        |ctx| {
            assert!(!ctx.store().is_transactional());
            assert_rolled_back(ctx)
        },
        cleanup,
    )
}

// each step depends on the previous one, so undoing them out of order
// would fail on a missing or taken collection name
fn chained() -> Migration {
    Migration::new(
        1,
        "chained",
        "",
        MigrationProcess::new()
            .command(MigrationCommand::create_collection("a"))
            .command(MigrationCommand::insert_documents("a", vec![doc! { "n": 1 }]))
            .command(MigrationCommand::rename_collection("a", "b"))
            .command(MigrationCommand::create_collection("a"))
            .command(MigrationCommand::rename_field("b", "n", "m"))
            .command(failing_command()),
        MigrationProcess::new(),
    )
}

fn backfill_score() -> Migration {
    Migration::new(
        2,
        "backfill_score",
        "",
        MigrationProcess::new().command(MigrationCommand::custom(
            "backfill",
            "score = len(name)",
            |ctx| {
                let store = ctx.store();
                for (id, mut user) in store.find_all("users")? {
                    let score = user.get_str("name")?.len() as i64;
                    user.put("score", score)?;
                    store.put("users", id, user)?;
                }
                Ok(())
            },
        )),
        MigrationProcess::new().command(MigrationCommand::delete_field("users", "score")),
    )
}

fn assert_backfilled(ctx: TestContext) -> RunwayResult<()> {
    ctx.runway().upgrade_all()?;
    let scores: Vec<Option<Value>> = ctx
        .store()
        .find_all("users")?
        .into_iter()
        .map(|(_, doc)| doc.get("score").cloned())
        .collect();
    assert_eq!(scores, vec![Some(Value::from(5i64)), Some(Value::from(3i64))]);

    ctx.runway().downgrade_one()?;
    assert!(ctx
        .store()
        .find_all("users")?
        .iter()
        .all(|(_, doc)| !doc.contains_key("score")));
    Ok(())
}

#[test]
fn test_compensation_undoes_in_reverse_order() {
    run_test(
        || create_context(MemoryStore::without_transactions(), vec![chained()], |b| b),
        |ctx| {
            let outcome = ctx.runway().upgrade_all()?;
            assert_eq!(outcome.failed_at, Some(1));

            let store = ctx.store();
            assert!(!store.has_collection("a")?);
            assert!(!store.has_collection("b")?);
            assert_eq!(ctx.runway().status()?.current_version, None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_custom_command_writes_through_native_scope() {
    run_test(
        || create_test_context(vec![users(), backfill_score()]),
        assert_backfilled,
        cleanup,
    )
}

#[test]
fn test_custom_command_writes_through_compensating_scope() {
    run_test(
        || create_compensating_test_context(vec![users(), backfill_score()]),
        assert_backfilled,
        cleanup,
    )
}
