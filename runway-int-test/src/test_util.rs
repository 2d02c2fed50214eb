use parking_lot::Mutex;
use runway::common::LockRegistry;
use runway::errors::{ErrorKind, RunwayError, RunwayResult};
use runway::event::EventKind;
use runway::migration::{Migration, MigrationCommand, MigrationProcess};
use runway::runway_builder::RunwayBuilder;
use runway::store::memory::MemoryStore;
use runway::Runway;
use std::sync::Arc;

/// Runs `test` on a context made by `before` and always runs `after`.
///
/// Panics with the failing stage and error so the test harness reports it.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> RunwayResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> RunwayResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> RunwayResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let result = std::panic::catch_unwind(|| {
        let ctx = before().map_err(|e| format!("Before run failed: {:?}", e))?;
        match test(ctx.clone()) {
            Ok(()) => after(ctx).map_err(|e| format!("After run failed: {:?}", e)),
            Err(e) => {
                let _ = after(ctx);
                Err(format!("Test failed: {:?}", e))
            }
        }
    });

    match result {
        Ok(Ok(())) => {}
        Ok(Err(message)) => panic!("{}", message),
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            panic!("Test panicked: {}", message);
        }
    }
}

/// A runway over a private in-memory store and lock table, with every
/// dispatched event recorded as `"<kind> <version>"`.
#[derive(Clone)]
pub struct TestContext {
    store: MemoryStore,
    locks: LockRegistry,
    runway: Runway,
    events: Arc<Mutex<Vec<String>>>,
}

impl TestContext {
    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }

    pub fn locks(&self) -> LockRegistry {
        self.locks.clone()
    }

    pub fn runway(&self) -> Runway {
        self.runway.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(kind.name()))
            .cloned()
            .collect()
    }

    /// Opens another runway over the same store and lock table, e.g. with
    /// edited migration definitions.
    pub fn reopen<F>(&self, migrations: Vec<Migration>, configure: F) -> RunwayResult<Runway>
    where
        F: FnOnce(RunwayBuilder) -> RunwayBuilder,
    {
        configure(
            Runway::builder()
                .in_memory(self.store.clone())
                .lock_provider(self.locks.clone())
                .migrations(migrations),
        )
        .open()
    }
}

pub fn create_test_context(migrations: Vec<Migration>) -> RunwayResult<TestContext> {
    create_context(MemoryStore::new(), migrations, |builder| builder)
}

/// Like [create_test_context] but the store has no native transactions.
pub fn create_compensating_test_context(migrations: Vec<Migration>) -> RunwayResult<TestContext> {
    create_context(MemoryStore::without_transactions(), migrations, |builder| builder)
}

pub fn create_context<F>(
    store: MemoryStore,
    migrations: Vec<Migration>,
    configure: F,
) -> RunwayResult<TestContext>
where
    F: FnOnce(RunwayBuilder) -> RunwayBuilder,
{
    let locks = LockRegistry::new();
    let runway = configure(
        Runway::builder()
            .app_name("int-test")
            .applied_by("int-test")
            .in_memory(store.clone())
            .lock_provider(locks.clone())
            .migrations(migrations),
    )
    .open()?;

    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let events = events.clone();
        runway.event_manager().subscribe(kind, move |event| {
            events
                .lock()
                .push(format!("{} {}", event.kind(), event.version()));
            Ok(())
        });
    }

    Ok(TestContext {
        store,
        locks,
        runway,
        events,
    })
}

pub fn cleanup(ctx: TestContext) -> RunwayResult<()> {
    for kind in EventKind::ALL {
        ctx.runway.event_manager().clear(kind);
    }
    Ok(())
}

/// Creates collection `c{version}` on upgrade and drops it on downgrade.
pub fn collection_migration(version: u64) -> Migration {
    let collection = format!("c{}", version);
    Migration::new(
        version,
        &format!("create_{}", collection),
        "",
        MigrationProcess::new().command(MigrationCommand::create_collection(&collection)),
        MigrationProcess::new().command(MigrationCommand::drop_collection(&collection)),
    )
}

/// A migration whose upgrade fails at its only command.
pub fn failing_migration(version: u64) -> Migration {
    Migration::new(
        version,
        "failing",
        "",
        MigrationProcess::new().command(failing_command()),
        MigrationProcess::new().command(failing_command()),
    )
}

pub fn failing_command() -> MigrationCommand {
    MigrationCommand::custom("fail", "always fails", |ctx| {
        Err(RunwayError::new(
            &format!("command of migration {} failed", ctx.version()),
            ErrorKind::BackendError,
        ))
    })
}
