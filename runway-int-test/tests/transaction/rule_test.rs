use parking_lot::Mutex;
use runway::errors::ErrorKind;
use runway::migration::{FnRule, Migration, MigrationCommand, MigrationProcess};
use runway::store::DocumentStore;
use runway_int_test::test_util::{cleanup, collection_migration, create_test_context, run_test};
use std::sync::Arc;

fn guarded(log: Arc<Mutex<Vec<&'static str>>>) -> Migration {
    let (exists_log, populated_log) = (log.clone(), log);
    let users_exist = FnRule::new("users_exist", move |ctx| {
        exists_log.lock().push("users_exist");
        Ok(!ctx.store().has_collection("c1")?)
    });
    let users_populated = FnRule::new("users_populated", move |ctx| {
        populated_log.lock().push("users_populated");
        Ok(ctx.store().find_all("c1")?.is_empty())
    })
    .depends_on(users_exist);

    Migration::new(
        2,
        "archive",
        "",
        MigrationProcess::new()
            .rule(users_populated)
            .command(MigrationCommand::create_collection("archive")),
        MigrationProcess::new().command(MigrationCommand::drop_collection("archive")),
    )
}

#[test]
fn test_rules_run_after_their_dependencies() {
    run_test(
        || create_test_context(vec![collection_migration(1)]),
        |ctx| {
            let log = Arc::new(Mutex::new(Vec::new()));
            let runway = ctx.reopen(
                vec![collection_migration(1), guarded(log.clone())],
                |b| b,
            )?;

            // c1 is created empty, so the dependent rule is broken
            let outcome = runway.upgrade_all()?;
            assert_eq!(outcome.completed, vec![1]);
            assert_eq!(outcome.failed_at, Some(2));
            let error = outcome.error.unwrap();
            assert_eq!(error.root_cause().kind(), &ErrorKind::BusinessRuleBroken);
            assert!(error.root_cause().message().contains("users_populated"));
            assert_eq!(*log.lock(), vec!["users_exist", "users_populated"]);
            assert!(!ctx.store().has_collection("archive")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rules_that_hold_let_the_migration_run() {
    run_test(
        || create_test_context(vec![collection_migration(1)]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            ctx.store().insert("c1", runway::doc! { "name": "alice" })?;

            let log = Arc::new(Mutex::new(Vec::new()));
            let runway = ctx.reopen(vec![collection_migration(1), guarded(log.clone())], |b| b)?;
            let outcome = runway.upgrade_all()?;
            assert_eq!(outcome.completed, vec![2]);
            assert!(ctx.store().has_collection("archive")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_irreversible_migration_cannot_be_reverted() {
    run_test(
        || {
            let one_way = Migration::new(
                1,
                "one_way",
                "",
                MigrationProcess::new().command(MigrationCommand::create_collection("kept")),
                MigrationProcess::new(),
            );
            create_test_context(vec![one_way])
        },
        |ctx| {
            ctx.runway().upgrade_all()?;
            let outcome = ctx.runway().downgrade_one()?;
            assert_eq!(outcome.failed_at, Some(1));
            assert_eq!(
                outcome.error.unwrap().kind(),
                &ErrorKind::IrreversibleMigration
            );
            assert!(ctx.store().has_collection("kept")?);
            assert_eq!(ctx.runway().status()?.current_version, Some(1));
            Ok(())
        },
        cleanup,
    )
}
