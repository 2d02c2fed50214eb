use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::event::EventManager;
use crate::runway_builder::RunwayBuilder;
use crate::runway_config::RunwayConfig;
use crate::service::{
    MigrationOutcome, MigrationService, StatusReport, StatusService, ValidationReport,
    ValidationService,
};
use crate::store::{AuditLogEntry, HistoryQuery};
use std::sync::Arc;

/// A migration engine bound to one target store and one migration history.
///
/// `Runway` wires the configured collaborators into the services and is the
/// entry point for callers. It is cheap to clone; clones share the same
/// configuration, services and event handlers.
///
/// # Examples
///
/// ```rust
/// use runway::event::EventKind;
/// use runway::migration::{Migration, MigrationCommand, MigrationProcess};
/// use runway::store::memory::MemoryStore;
/// use runway::Runway;
///
/// let runway = Runway::builder()
///     .in_memory(MemoryStore::new())
///     .migration(Migration::new(
///         1,
///         "create_orders",
///         "",
///         MigrationProcess::new().command(MigrationCommand::create_collection("orders")),
///         MigrationProcess::new().command(MigrationCommand::drop_collection("orders")),
///     ))
///     .open()
///     .unwrap();
///
/// runway.event_manager().subscribe(EventKind::UpgradeSucceeded, |event| {
///     println!("applied {}", event);
///     Ok(())
/// });
///
/// runway.upgrade_all().unwrap();
/// assert_eq!(runway.status().unwrap().current_version, Some(1));
/// ```
#[derive(Clone)]
pub struct Runway {
    inner: Arc<RunwayInner>,
}

impl Runway {
    pub fn builder() -> RunwayBuilder {
        RunwayBuilder::new()
    }

    pub(crate) fn new(config: RunwayConfig) -> Self {
        Runway {
            inner: Arc::new(RunwayInner::new(config)),
        }
    }

    pub fn config(&self) -> RunwayConfig {
        self.inner.config.clone()
    }

    /// Returns the manager handlers subscribe to.
    pub fn event_manager(&self) -> EventManager {
        self.inner.events.clone()
    }

    /// Returns the service for every mutating operation, including the
    /// bounded, predicate-driven and cancellable variants.
    pub fn migration_service(&self) -> &MigrationService {
        &self.inner.migration_service
    }

    pub fn status_service(&self) -> &StatusService {
        &self.inner.status_service
    }

    pub fn validation_service(&self) -> &ValidationService {
        &self.inner.validation_service
    }

    pub fn upgrade_one(&self) -> RunwayResult<MigrationOutcome> {
        self.inner.migration_service.upgrade_one()
    }

    pub fn upgrade_all(&self) -> RunwayResult<MigrationOutcome> {
        self.inner.migration_service.upgrade_all()
    }

    pub fn upgrade_to(&self, version: u64) -> RunwayResult<MigrationOutcome> {
        self.inner.migration_service.upgrade_to(version)
    }

    pub fn downgrade_one(&self) -> RunwayResult<MigrationOutcome> {
        self.inner.migration_service.downgrade_one()
    }

    pub fn downgrade_all(&self, count: Option<usize>) -> RunwayResult<MigrationOutcome> {
        self.inner.migration_service.downgrade_all(count)
    }

    pub fn downgrade_to(&self, version: u64) -> RunwayResult<MigrationOutcome> {
        self.inner.migration_service.downgrade_to(version)
    }

    pub fn status(&self) -> RunwayResult<StatusReport> {
        self.inner.status_service.status()
    }

    pub fn is_up_to_date(&self, depth: Option<usize>) -> RunwayResult<bool> {
        self.inner.status_service.is_up_to_date(depth)
    }

    /// Accepts edited definitions of applied migrations by rewriting their
    /// persisted checksums. Returns the re-baselined versions.
    pub fn recalculate_checksums(&self) -> RunwayResult<Vec<u64>> {
        self.inner.migration_service.recalculate_checksums()
    }

    /// Runs the read-only integrity check.
    pub fn validate(&self) -> RunwayResult<ValidationReport> {
        self.inner.validation_service.check()
    }

    /// Reads the audit log.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` when audit logging is disabled.
    pub fn history(&self, query: &HistoryQuery) -> RunwayResult<Vec<AuditLogEntry>> {
        match self.inner.config.journal()? {
            Some(journal) => journal.history(query),
            None => {
                log::error!("Audit log is disabled for {}", self.inner.config.app_name());
                Err(RunwayError::new(
                    "Audit log is disabled; enable it to read the history",
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }
}

struct RunwayInner {
    config: RunwayConfig,
    events: EventManager,
    migration_service: MigrationService,
    status_service: StatusService,
    validation_service: ValidationService,
}

impl RunwayInner {
    fn new(config: RunwayConfig) -> Self {
        let events = EventManager::new();
        RunwayInner {
            migration_service: MigrationService::new(config.clone(), events.clone()),
            status_service: StatusService::new(config.clone()),
            validation_service: ValidationService::new(config.clone()),
            events,
            config,
        }
    }
}
