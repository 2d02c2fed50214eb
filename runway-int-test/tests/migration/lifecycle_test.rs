use runway::common::MIGRATIONS_COLLECTION;
use runway::errors::ErrorKind;
use runway::migration::Direction;
use runway::service::InvocationState;
use runway::store::{DocumentStore, HistoryQuery, Outcome};
use runway_int_test::test_util::{
    cleanup, collection_migration, create_test_context, failing_migration, run_test,
};

#[test]
fn test_upgrade_all_runs_in_version_order() {
    run_test(
        || create_test_context(vec![collection_migration(3), collection_migration(1), collection_migration(2)]),
        |ctx| {
            let outcome = ctx.runway().upgrade_all()?;
            assert!(outcome.is_success());
            assert_eq!(outcome.completed, vec![1, 2, 3]);
            assert_eq!(outcome.state, InvocationState::Committed);

            let store = ctx.store();
            for name in ["c1", "c2", "c3"] {
                assert!(store.has_collection(name)?);
            }

            assert_eq!(
                ctx.events(),
                vec![
                    "starting-upgrade 1",
                    "upgrade-succeeded 1",
                    "starting-upgrade 2",
                    "upgrade-succeeded 2",
                    "starting-upgrade 3",
                    "upgrade-succeeded 3",
                ]
            );

            let history = ctx.runway().history(&HistoryQuery::new())?;
            let versions: Vec<u64> = history.iter().map(|e| e.version).collect();
            assert_eq!(versions, vec![1, 2, 3]);
            assert!(history.iter().all(|e| e.outcome == Outcome::Success));
            assert!(history.iter().all(|e| e.session_id == history[0].session_id));

            let status = ctx.runway().status()?;
            assert_eq!(status.current_version, Some(3));
            assert!(status.pending.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_second_upgrade_is_a_noop() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(2)]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let store = ctx.store();
            let names = store.collection_names()?;
            let records = store.find_all(MIGRATIONS_COLLECTION)?;
            let events = ctx.events().len();

            let outcome = ctx.runway().upgrade_all()?;
            assert!(outcome.is_noop());
            assert_eq!(store.collection_names()?, names);
            assert_eq!(store.find_all(MIGRATIONS_COLLECTION)?, records);
            assert_eq!(ctx.events().len(), events);
            assert_eq!(ctx.runway().history(&HistoryQuery::new())?.len(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failure_halts_the_batch() {
    run_test(
        || {
            create_test_context(vec![
                collection_migration(1),
                failing_migration(2),
                collection_migration(3),
            ])
        },
        |ctx| {
            let outcome = ctx.runway().upgrade_all()?;
            assert_eq!(outcome.completed, vec![1]);
            assert_eq!(outcome.failed_at, Some(2));
            assert_eq!(outcome.state, InvocationState::Aborted);
            let error = outcome.error.clone().unwrap_or_else(|| panic!("missing error"));
            assert_eq!(error.kind(), &ErrorKind::ExecutionError);

            let store = ctx.store();
            assert!(store.has_collection("c1")?);
            assert!(!store.has_collection("c3")?);
            assert_eq!(ctx.runway().status()?.current_version, Some(1));

            assert_eq!(
                ctx.events(),
                vec![
                    "starting-upgrade 1",
                    "upgrade-succeeded 1",
                    "starting-upgrade 2",
                    "upgrade-failed 2",
                ]
            );

            let history = ctx.runway().history(&HistoryQuery::new())?;
            assert_eq!(history.len(), 2);
            assert_eq!(history[1].version, 2);
            assert_eq!(history[1].outcome, Outcome::Failure);
            assert!(history[1].error.is_some());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_downgrade_one_reverts_the_latest() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(2)]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let outcome = ctx.runway().downgrade_one()?;
            assert_eq!(outcome.direction, Direction::Downgrade);
            assert_eq!(outcome.completed, vec![2]);

            let store = ctx.store();
            assert!(!store.has_collection("c2")?);
            assert!(store.has_collection("c1")?);
            assert_eq!(ctx.runway().status()?.current_version, Some(1));

            let latest = ctx
                .runway()
                .history(&HistoryQuery::new().descending().limit(1))?;
            assert_eq!(latest[0].version, 2);
            assert_eq!(latest[0].direction, Direction::Downgrade);
            assert_eq!(latest[0].outcome, Outcome::Success);

            assert_eq!(
                &ctx.events()[4..],
                &["starting-downgrade 2".to_string(), "downgrade-succeeded 2".to_string()]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_downgrade_all_reverts_in_reverse_order() {
    run_test(
        || {
            create_test_context(vec![
                collection_migration(1),
                collection_migration(2),
                collection_migration(3),
            ])
        },
        |ctx| {
            ctx.runway().upgrade_all()?;
            let outcome = ctx.runway().downgrade_all(Some(2))?;
            assert_eq!(outcome.completed, vec![3, 2]);

            let outcome = ctx.runway().downgrade_all(None)?;
            assert_eq!(outcome.completed, vec![1]);
            assert_eq!(ctx.runway().status()?.current_version, None);
            assert!(ctx.runway().downgrade_one()?.is_noop());

            // reverted migrations can be applied again
            assert_eq!(ctx.runway().upgrade_all()?.completed, vec![1, 2, 3]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_history_is_filtered_by_time_window() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(2)]),
        |ctx| {
            ctx.runway().upgrade_one()?;
            let between = chrono::Utc::now();
            std::thread::sleep(std::time::Duration::from_millis(5));
            ctx.runway().upgrade_one()?;

            let before = ctx.runway().history(&HistoryQuery::new().end(between))?;
            assert_eq!(before.len(), 1);
            assert_eq!(before[0].version, 1);

            let after = ctx.runway().history(&HistoryQuery::new().start(between))?;
            assert_eq!(after.len(), 1);
            assert_eq!(after[0].version, 2);
            Ok(())
        },
        cleanup,
    )
}
