use parking_lot::Mutex;
use runway::errors::ErrorKind;
use runway::event::{EventKind, MigrationEvent};
use runway::store::DocumentStore;
use runway_int_test::test_util::{
    cleanup, collection_migration, create_test_context, failing_migration, run_test,
};
use std::sync::Arc;

#[test]
fn test_failing_handler_does_not_affect_migration() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(2)]),
        |ctx| {
            let events = ctx.runway().event_manager();
            events.subscribe(EventKind::StartingUpgrade, |_| anyhow::bail!("handler refused"));
            events.subscribe(EventKind::UpgradeSucceeded, |event| {
                if event.version() == 1 {
                    panic!("handler panicked");
                }
                Ok(())
            });

            let outcome = ctx.runway().upgrade_all()?;
            assert!(outcome.is_success());
            assert_eq!(outcome.completed, vec![1, 2]);
            // the recording handler still saw every event
            assert_eq!(ctx.events_of(EventKind::UpgradeSucceeded).len(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_event_carries_the_error() {
    run_test(
        || create_test_context(vec![failing_migration(1)]),
        |ctx| {
            let seen = Arc::new(Mutex::new(None));
            let sink = seen.clone();
            ctx.runway()
                .event_manager()
                .subscribe(EventKind::UpgradeFailed, move |event| {
                    *sink.lock() = event.error().map(|e| e.kind().clone());
                    Ok(())
                });

            ctx.runway().upgrade_all()?;
            assert_eq!(*seen.lock(), Some(ErrorKind::ExecutionError));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_priorities_order_handlers() {
    run_test(
        || create_test_context(vec![collection_migration(1)]),
        |ctx| {
            let order = Arc::new(Mutex::new(Vec::new()));
            let events = ctx.runway().event_manager();
            for (label, priority) in [("late", Some(20)), ("plain", None), ("early", Some(10))] {
                let order = order.clone();
                let handler = move |_: &MigrationEvent| -> anyhow::Result<()> {
                    order.lock().push(label);
                    Ok(())
                };
                match priority {
                    Some(priority) => {
                        events.subscribe_with_priority(EventKind::UpgradeSucceeded, priority, handler)
                    }
                    None => events.subscribe(EventKind::UpgradeSucceeded, handler),
                };
            }

            ctx.runway().upgrade_one()?;
            assert_eq!(*order.lock(), vec!["early", "late", "plain"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unsubscribed_handler_is_not_called() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(2)]),
        |ctx| {
            let calls = Arc::new(Mutex::new(0));
            let counter = calls.clone();
            let events = ctx.runway().event_manager();
            let subscription = events.subscribe(EventKind::UpgradeSucceeded, move |_| {
                *counter.lock() += 1;
                Ok(())
            });

            ctx.runway().upgrade_one()?;
            assert!(events.unsubscribe(&subscription));
            ctx.runway().upgrade_one()?;

            assert_eq!(*calls.lock(), 1);
            assert!(!events.unsubscribe(&subscription));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_downgrade_failure_event() {
    run_test(
        || create_test_context(vec![collection_migration(1)]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            // c1 is already gone, so dropping it again fails
            ctx.store().drop_collection("c1")?;

            let outcome = ctx.runway().downgrade_one()?;
            assert_eq!(outcome.failed_at, Some(1));
            assert_eq!(
                &ctx.events()[2..],
                &["starting-downgrade 1".to_string(), "downgrade-failed 1".to_string()]
            );
            assert_eq!(ctx.runway().status()?.current_version, Some(1));
            Ok(())
        },
        cleanup,
    )
}
