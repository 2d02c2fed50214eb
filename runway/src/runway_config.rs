//! Configuration management for a Runway engine.

use crate::common::{
    AdvisoryLock, LockRegistry, DEFAULT_APP_NAME, DEFAULT_LOCK_TIMEOUT, MIGRATION_LOCK_NAME,
};
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::migration::{CommandRegistry, Migration, VersioningService};
use crate::store::{AuditLogJournal, MigrationRepository, TargetStore};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Settings and collaborators of one Runway engine.
///
/// The configuration is filled in by a
/// [RunwayBuilder](crate::runway_builder::RunwayBuilder) and frozen when the
/// engine opens. Every setter fails with `InvalidOperation` after that.
///
/// # Examples
///
/// ```rust
/// use runway::runway_config::RunwayConfig;
///
/// let config = RunwayConfig::new();
/// config.set_app_name("billing").unwrap();
/// assert_eq!(config.app_name(), "billing");
/// ```
#[derive(Clone)]
pub struct RunwayConfig {
    /// The pointer to implementation. Clones share it.
    inner: Arc<RunwayConfigInner>,
}

impl Default for RunwayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RunwayConfig {
    pub fn new() -> Self {
        RunwayConfig {
            inner: Arc::new(RunwayConfigInner::new()),
        }
    }

    /// Returns the application name, used in logs and as lock owner prefix.
    pub fn app_name(&self) -> String {
        self.inner.app_name.read().clone()
    }

    pub fn set_app_name(&self, name: &str) -> RunwayResult<()> {
        self.inner.check_mutable("app name")?;
        if name.trim().is_empty() {
            log::error!("Application name cannot be empty");
            return Err(RunwayError::new(
                "Application name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        *self.inner.app_name.write() = name.to_string();
        Ok(())
    }

    /// Returns the name of the advisory lock guarding the history.
    pub fn lock_name(&self) -> String {
        self.inner.lock_name.read().clone()
    }

    pub fn set_lock_name(&self, name: &str) -> RunwayResult<()> {
        self.inner.check_mutable("lock name")?;
        if name.trim().is_empty() {
            log::error!("Lock name cannot be empty");
            return Err(RunwayError::new(
                "Lock name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        *self.inner.lock_name.write() = name.to_string();
        Ok(())
    }

    /// Returns how long a mutating call waits for the lock.
    pub fn lock_timeout(&self) -> Duration {
        *self.inner.lock_timeout.read()
    }

    pub fn set_lock_timeout(&self, timeout: Duration) -> RunwayResult<()> {
        self.inner.check_mutable("lock timeout")?;
        *self.inner.lock_timeout.write() = timeout;
        Ok(())
    }

    /// Returns `true` if migrations may run while applied ones have drifted.
    pub fn allow_drift(&self) -> bool {
        self.inner.allow_drift.load(Ordering::Relaxed)
    }

    pub fn set_allow_drift(&self, allow: bool) -> RunwayResult<()> {
        self.inner.check_mutable("drift override")?;
        self.inner.allow_drift.store(allow, Ordering::Relaxed);
        Ok(())
    }

    pub fn auditlog_enabled(&self) -> bool {
        self.inner.auditlog_enabled.load(Ordering::Relaxed)
    }

    pub fn set_auditlog_enabled(&self, enabled: bool) -> RunwayResult<()> {
        self.inner.check_mutable("audit log flag")?;
        self.inner.auditlog_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Returns the tag written to `applied_by` of new records.
    pub fn applied_by(&self) -> Option<String> {
        self.inner.applied_by.read().clone()
    }

    pub fn set_applied_by(&self, applied_by: &str) -> RunwayResult<()> {
        self.inner.check_mutable("applied-by tag")?;
        *self.inner.applied_by.write() = Some(applied_by.to_string());
        Ok(())
    }

    pub fn add_migration(&self, migration: Migration) -> RunwayResult<()> {
        self.inner.check_mutable("migration set")?;
        self.inner.migrations.write().push(migration);
        Ok(())
    }

    pub fn set_target_store(&self, store: TargetStore) -> RunwayResult<()> {
        self.inner.check_mutable("target store")?;
        set_once(&self.inner.store, store, "target store")
    }

    pub fn set_repository(&self, repository: MigrationRepository) -> RunwayResult<()> {
        self.inner.check_mutable("migration repository")?;
        set_once(&self.inner.repository, repository, "migration repository")
    }

    pub fn set_journal(&self, journal: AuditLogJournal) -> RunwayResult<()> {
        self.inner.check_mutable("audit log journal")?;
        set_once(&self.inner.journal, journal, "audit log journal")
    }

    pub fn set_lock_provider(&self, provider: Arc<dyn AdvisoryLock>) -> RunwayResult<()> {
        self.inner.check_mutable("lock provider")?;
        set_once(&self.inner.lock_provider, provider, "lock provider")
    }

    /// Returns the command registry discovery collaborators build commands from.
    pub fn command_registry(&self) -> CommandRegistry {
        self.inner.command_registry.clone()
    }

    /// Gets the configured target store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if no store is configured.
    pub fn target_store(&self) -> RunwayResult<TargetStore> {
        get_configured(&self.inner.store, "target store")
    }

    pub fn repository(&self) -> RunwayResult<MigrationRepository> {
        get_configured(&self.inner.repository, "migration repository")
    }

    /// Returns the journal, or `None` when audit logging is disabled.
    pub fn journal(&self) -> RunwayResult<Option<AuditLogJournal>> {
        if !self.auditlog_enabled() {
            return Ok(None);
        }
        get_configured(&self.inner.journal, "audit log journal").map(Some)
    }

    /// Returns the lock provider, the process-wide [LockRegistry] by default.
    pub fn lock_provider(&self) -> Arc<dyn AdvisoryLock> {
        match self.inner.lock_provider.get() {
            Some(provider) => provider.clone(),
            None => Arc::new(LockRegistry::global()),
        }
    }

    /// Returns the ordered discovery set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` before the configuration is initialized.
    pub fn versioning(&self) -> RunwayResult<Arc<VersioningService>> {
        get_configured(&self.inner.versioning, "versioning service")
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Validates the collaborators and freezes the configuration.
    pub(crate) fn initialize(&self) -> RunwayResult<()> {
        self.inner.initialize()
    }
}

/// Private implementation of [RunwayConfig].
struct RunwayConfigInner {
    configured: AtomicBool,
    app_name: RwLock<String>,
    lock_name: RwLock<String>,
    lock_timeout: RwLock<Duration>,
    allow_drift: AtomicBool,
    auditlog_enabled: AtomicBool,
    applied_by: RwLock<Option<String>>,
    migrations: RwLock<Vec<Migration>>,
    command_registry: CommandRegistry,
    store: OnceLock<TargetStore>,
    repository: OnceLock<MigrationRepository>,
    journal: OnceLock<AuditLogJournal>,
    lock_provider: OnceLock<Arc<dyn AdvisoryLock>>,
    versioning: OnceLock<Arc<VersioningService>>,
}

impl RunwayConfigInner {
    fn new() -> Self {
        RunwayConfigInner {
            configured: AtomicBool::new(false),
            app_name: RwLock::new(DEFAULT_APP_NAME.to_string()),
            lock_name: RwLock::new(MIGRATION_LOCK_NAME.to_string()),
            lock_timeout: RwLock::new(DEFAULT_LOCK_TIMEOUT),
            allow_drift: AtomicBool::new(false),
            auditlog_enabled: AtomicBool::new(true),
            applied_by: RwLock::new(None),
            migrations: RwLock::new(Vec::new()),
            command_registry: CommandRegistry::new(),
            store: OnceLock::new(),
            repository: OnceLock::new(),
            journal: OnceLock::new(),
            lock_provider: OnceLock::new(),
            versioning: OnceLock::new(),
        }
    }

    fn check_mutable(&self, setting: &str) -> RunwayResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("The {} cannot be changed after initialization", setting);
            return Err(RunwayError::new(
                &format!("The {} cannot be changed after initialization", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn initialize(&self) -> RunwayResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            return Err(RunwayError::new(
                "Runway configuration is already initialized",
                ErrorKind::InvalidOperation,
            ));
        }

        get_configured(&self.store, "target store")?;
        get_configured(&self.repository, "migration repository")?;
        if self.auditlog_enabled.load(Ordering::Relaxed) {
            get_configured(&self.journal, "audit log journal")?;
        }

        let migrations = std::mem::take(&mut *self.migrations.write());
        let count = migrations.len();
        let versioning = VersioningService::new(migrations)?;
        set_once(&self.versioning, Arc::new(versioning), "versioning service")?;

        self.configured.store(true, Ordering::Relaxed);
        log::debug!(
            "Initialized runway '{}' with {} migrations",
            self.app_name.read(),
            count
        );
        Ok(())
    }
}

fn set_once<T>(cell: &OnceLock<T>, value: T, what: &str) -> RunwayResult<()> {
    cell.set(value).map_err(|_| {
        log::error!("The {} is already configured", what);
        RunwayError::new(
            &format!("The {} is already configured", what),
            ErrorKind::InvalidOperation,
        )
    })
}

fn get_configured<T: Clone>(cell: &OnceLock<T>, what: &str) -> RunwayResult<T> {
    match cell.get() {
        Some(value) => Ok(value.clone()),
        None => {
            log::error!("No {} is configured", what);
            Err(RunwayError::new(
                &format!("No {} is configured", what),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}
