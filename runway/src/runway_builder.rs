use crate::common::AdvisoryLock;
use crate::errors::{RunwayError, RunwayResult};
use crate::event::{EventKind, MigrationEvent};
use crate::migration::{CommandRegistry, Migration};
use crate::runway::Runway;
use crate::runway_config::RunwayConfig;
use crate::store::memory::{MemoryAuditLogJournal, MemoryMigrationRepository, MemoryStore};
use crate::store::{
    AuditLogJournal, AuditLogJournalProvider, MigrationRepository, MigrationRepositoryProvider,
    TargetStore, TargetStoreProvider,
};
use std::sync::Arc;
use std::time::Duration;

type PendingHandler = (
    EventKind,
    Option<u32>,
    Box<dyn Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync>,
);

/// Builder for creating and configuring a [Runway] engine.
///
/// `RunwayBuilder` provides a fluent API over [RunwayConfig]. Errors raised
/// by a setter are captured and the remaining calls are skipped; the first
/// one is returned from [RunwayBuilder::open].
///
/// # Examples
///
/// ```rust
/// use runway::migration::{Migration, MigrationCommand, MigrationProcess};
/// use runway::store::memory::MemoryStore;
/// use runway::Runway;
///
/// let create_users = Migration::new(
///     1,
///     "create_users",
///     "users collection",
///     MigrationProcess::new().command(MigrationCommand::create_collection("users")),
///     MigrationProcess::new().command(MigrationCommand::drop_collection("users")),
/// );
///
/// let runway = Runway::builder()
///     .app_name("billing")
///     .in_memory(MemoryStore::new())
///     .migration(create_users)
///     .open()
///     .unwrap();
///
/// let outcome = runway.upgrade_all().unwrap();
/// assert_eq!(outcome.completed, vec![1]);
/// ```
#[derive(Default)]
pub struct RunwayBuilder {
    error: Option<RunwayError>,
    config: RunwayConfig,
    handlers: Vec<PendingHandler>,
}

impl RunwayBuilder {
    pub fn new() -> Self {
        RunwayBuilder {
            error: None,
            config: RunwayConfig::new(),
            handlers: Vec::new(),
        }
    }

    pub fn app_name(self, name: &str) -> Self {
        self.apply(|config| config.set_app_name(name))
    }

    /// Sets the name of the advisory lock guarding the history.
    pub fn lock_name(self, name: &str) -> Self {
        self.apply(|config| config.set_lock_name(name))
    }

    /// Sets how long mutating calls wait for the lock before failing with
    /// `LockTimeout`.
    pub fn lock_timeout(self, timeout: Duration) -> Self {
        self.apply(|config| config.set_lock_timeout(timeout))
    }

    /// Lets migrations run while applied ones have drifted. Drift is then
    /// only logged as a warning.
    pub fn allow_drift(self, allow: bool) -> Self {
        self.apply(|config| config.set_allow_drift(allow))
    }

    /// Sets the tag stored in `applied_by` of new records.
    pub fn applied_by(self, applied_by: &str) -> Self {
        self.apply(|config| config.set_applied_by(applied_by))
    }

    /// Enables or disables the audit log. Enabled by default.
    pub fn auditlog(self, enabled: bool) -> Self {
        self.apply(|config| config.set_auditlog_enabled(enabled))
    }

    /// Returns the registry of the runway being built, so migrations read
    /// from data can be turned into commands before they are added.
    pub fn command_registry(&self) -> CommandRegistry {
        self.config.command_registry()
    }

    pub fn migration(self, migration: Migration) -> Self {
        self.apply(|config| config.add_migration(migration))
    }

    pub fn migrations<I: IntoIterator<Item = Migration>>(self, migrations: I) -> Self {
        self.apply(|config| {
            for migration in migrations {
                config.add_migration(migration)?;
            }
            Ok(())
        })
    }

    /// Sets the store the migrations run against.
    pub fn target_store<T: TargetStoreProvider + 'static>(self, store: T) -> Self {
        self.apply(|config| config.set_target_store(TargetStore::new(store)))
    }

    pub fn repository<T: MigrationRepositoryProvider + 'static>(self, repository: T) -> Self {
        self.apply(|config| config.set_repository(MigrationRepository::new(repository)))
    }

    pub fn journal<T: AuditLogJournalProvider + 'static>(self, journal: T) -> Self {
        self.apply(|config| config.set_journal(AuditLogJournal::new(journal)))
    }

    /// Replaces the process-wide lock registry.
    pub fn lock_provider<L: AdvisoryLock + 'static>(self, provider: L) -> Self {
        self.apply(|config| config.set_lock_provider(Arc::new(provider)))
    }

    /// Uses `store` as target store and keeps the history and the audit log
    /// in it too.
    pub fn in_memory(self, store: MemoryStore) -> Self {
        self.apply(|config| {
            config.set_target_store(TargetStore::new(store.clone()))?;
            config.set_repository(MigrationRepository::new(MemoryMigrationRepository::new(
                store.clone(),
            )))?;
            config.set_journal(AuditLogJournal::new(MemoryAuditLogJournal::new(store)))
        })
    }

    /// Registers an event handler on the engine being built.
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((kind, None, Box::new(handler)));
        self
    }

    /// Registers an event handler with a priority (lower runs first).
    pub fn on_with_priority<F>(mut self, kind: EventKind, priority: u32, handler: F) -> Self
    where
        F: Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((kind, Some(priority), Box::new(handler)));
        self
    }

    /// Validates the configuration and opens the engine.
    ///
    /// # Errors
    ///
    /// Returns the first error captured by a setter, `InvalidOperation` if
    /// a collaborator is missing, and `DuplicateVersion` or
    /// `IntegrityError` if the migration set is invalid.
    pub fn open(self) -> RunwayResult<Runway> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize()?;

        let runway = Runway::new(self.config);
        let events = runway.event_manager();
        for (kind, priority, handler) in self.handlers {
            match priority {
                Some(priority) => events.subscribe_with_priority(kind, priority, handler),
                None => events.subscribe(kind, handler),
            };
        }
        Ok(runway)
    }

    fn apply(mut self, set: impl FnOnce(&RunwayConfig) -> RunwayResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = set(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }
}
