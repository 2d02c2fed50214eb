use runway::common::{AdvisoryLock, MIGRATION_LOCK_NAME};
use runway::errors::ErrorKind;
use runway::migration::{Migration, MigrationCommand, MigrationProcess};
use runway::store::DocumentStore;
use runway_int_test::test_util::{cleanup, collection_migration, create_test_context, run_test};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

fn slow_migration(in_flight: Arc<InFlight>) -> Migration {
    Migration::new(
        1,
        "slow",
        "",
        MigrationProcess::new().command(MigrationCommand::custom("slow", "sleep 50ms", move |_| {
            let now = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
            in_flight.peak.fetch_max(now, Ordering::SeqCst);
            in_flight.runs.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            in_flight.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })),
        MigrationProcess::new().command(MigrationCommand::drop_collection("none")),
    )
}

#[test]
fn test_only_one_invocation_runs_at_a_time() {
    run_test(
        || create_test_context(Vec::new()),
        |ctx| {
            let in_flight = Arc::new(InFlight {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                runs: AtomicUsize::new(0),
            });
            let finished = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..2 {
                let runway = ctx.reopen(vec![slow_migration(in_flight.clone())], |b| b)?;
                let finished = finished.clone();
                handles.push(thread::spawn(move || {
                    let outcome = runway.upgrade_all();
                    finished.fetch_add(1, Ordering::SeqCst);
                    outcome
                }));
            }

            awaitility::at_most(Duration::from_secs(10))
                .until(|| finished.load(Ordering::SeqCst) == 2);

            let mut completed = Vec::new();
            for handle in handles {
                let outcome = handle.join().unwrap()?;
                assert!(outcome.is_success());
                completed.extend(outcome.completed);
            }

            // the second invocation found the version applied
            assert_eq!(completed, vec![1]);
            assert_eq!(in_flight.runs.load(Ordering::SeqCst), 1);
            assert_eq!(in_flight.peak.load(Ordering::SeqCst), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_held_lock_times_out() {
    run_test(
        || create_test_context(vec![collection_migration(1)]),
        |ctx| {
            let locks = ctx.locks();
            assert!(locks.try_acquire(MIGRATION_LOCK_NAME, "other-host", Duration::ZERO)?);

            let impatient = ctx.reopen(vec![collection_migration(1)], |b| {
                b.lock_timeout(Duration::from_millis(20))
            })?;
            let error = impatient.upgrade_all().unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::LockTimeout);

            // reads do not take the lock
            assert_eq!(impatient.status()?.pending, vec![1]);
            assert!(impatient.validate()?.is_valid());

            locks.release(MIGRATION_LOCK_NAME, "other-host")?;
            assert_eq!(impatient.upgrade_all()?.completed, vec![1]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_lock_is_released_after_failure() {
    run_test(
        || create_test_context(vec![collection_migration(1)]),
        |ctx| {
            let locks = ctx.locks();
            // c1 already exists, so the upgrade fails
            ctx.store().create_collection("c1")?;
            let outcome = ctx.runway().upgrade_all()?;
            assert_eq!(outcome.failed_at, Some(1));

            assert!(!locks.is_locked(MIGRATION_LOCK_NAME)?);
            Ok(())
        },
        cleanup,
    )
}
