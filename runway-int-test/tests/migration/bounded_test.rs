use runway::common::CancellationToken;
use runway::errors::ErrorKind;
use runway::event::EventKind;
use runway_int_test::test_util::{cleanup, collection_migration, create_test_context, run_test};
use std::time::Duration;

fn four() -> Vec<runway::migration::Migration> {
    (1..=4).map(collection_migration).collect()
}

#[test]
fn test_upgrade_to_and_downgrade_to() {
    run_test(
        || create_test_context(four()),
        |ctx| {
            let runway = ctx.runway();
            assert_eq!(runway.upgrade_to(2)?.completed, vec![1, 2]);
            assert_eq!(runway.upgrade_to(4)?.completed, vec![3, 4]);

            assert_eq!(runway.downgrade_to(2)?.completed, vec![4, 3]);
            assert_eq!(runway.status()?.current_version, Some(2));

            assert_eq!(runway.downgrade_to(0)?.completed, vec![2, 1]);
            assert_eq!(runway.status()?.current_version, None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_bounds_must_be_reachable() {
    run_test(
        || create_test_context(four()),
        |ctx| {
            let runway = ctx.runway();
            let unknown = runway.upgrade_to(9).unwrap_err();
            assert_eq!(unknown.kind(), &ErrorKind::InvalidOperation);

            runway.upgrade_to(2)?;
            let applied = runway.upgrade_to(1).unwrap_err();
            assert_eq!(applied.kind(), &ErrorKind::InvalidOperation);

            let pending = runway.downgrade_to(3).unwrap_err();
            assert_eq!(pending.kind(), &ErrorKind::InvalidOperation);

            // rejected calls changed nothing
            assert_eq!(runway.status()?.applied, vec![1, 2]);
            assert!(ctx.events_of(EventKind::StartingDowngrade).is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_predicate_driven_runs() {
    run_test(
        || create_test_context(four()),
        |ctx| {
            let service = ctx.runway();
            let service = service.migration_service();

            let outcome = service.upgrade_while(|m| m.version() < 3)?;
            assert_eq!(outcome.completed, vec![1, 2]);

            let outcome = service.upgrade_while(|m| m.name() != "create_c4")?;
            assert_eq!(outcome.completed, vec![3]);

            let outcome = service.downgrade_while(|m| m.version() > 1)?;
            assert_eq!(outcome.completed, vec![3, 2]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_cancelled_token_runs_nothing() {
    run_test(
        || create_test_context(four()),
        |ctx| {
            let token = CancellationToken::new();
            token.cancel();
            let outcome = ctx.runway().migration_service().upgrade_all_with(&token)?;
            assert!(outcome.cancelled);
            assert!(outcome.completed.is_empty());
            assert!(outcome.is_success());
            assert!(ctx.events().is_empty());

            let expired = CancellationToken::with_timeout(Duration::ZERO);
            let outcome = ctx.runway().migration_service().upgrade_all_with(&expired)?;
            assert!(outcome.cancelled);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_cancel_from_handler_stops_after_current_migration() {
    run_test(
        || create_test_context(four()),
        |ctx| {
            let token = CancellationToken::new();
            let trigger = token.clone();
            ctx.runway()
                .event_manager()
                .subscribe(EventKind::UpgradeSucceeded, move |event| {
                    if event.version() == 2 {
                        trigger.cancel();
                    }
                    Ok(())
                });

            let outcome = ctx.runway().migration_service().upgrade_all_with(&token)?;
            assert!(outcome.cancelled);
            assert_eq!(outcome.completed, vec![1, 2]);
            assert_eq!(ctx.runway().status()?.pending, vec![3, 4]);

            // a fresh call picks up where the cancelled one stopped
            assert_eq!(ctx.runway().upgrade_all()?.completed, vec![3, 4]);
            Ok(())
        },
        cleanup,
    )
}
