use crate::migration::{ChecksumService, Command, MigrationRule};
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Lowercase hex SHA-256 digest over a migration's command definitions.
pub type Checksum = String;

/// Direction in which a migration is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upgrade => "upgrade",
            Direction::Downgrade => "downgrade",
        }
    }

    /// Parses the persisted form written by [Direction::as_str].
    pub fn parse(value: &str) -> Option<Direction> {
        match value {
            "upgrade" => Some(Direction::Upgrade),
            "downgrade" => Some(Direction::Downgrade),
            _ => None,
        }
    }

    pub fn reverse(&self) -> Direction {
        match self {
            Direction::Upgrade => Direction::Downgrade,
            Direction::Downgrade => Direction::Upgrade,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One direction of a migration: the business rules that must hold and
/// the commands to run, both in declaration order.
///
/// A downgrade process without commands marks the migration irreversible.
#[derive(Clone, Default)]
pub struct MigrationProcess {
    commands: Vec<Arc<dyn Command>>,
    rules: Vec<Arc<dyn MigrationRule>>,
}

impl MigrationProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command to the process.
    pub fn command<C: Command + 'static>(mut self, command: C) -> Self {
        self.commands.push(Arc::new(command));
        self
    }

    /// Appends an already shared command, typically one built by a
    /// [CommandRegistry](crate::migration::CommandRegistry).
    pub fn shared_command(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    /// Appends a business rule checked before any command runs.
    pub fn rule<R: MigrationRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    pub fn rules(&self) -> &[Arc<dyn MigrationRule>] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Debug for MigrationProcess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationProcess")
            .field(
                "commands",
                &self.commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A versioned change-unit.
///
/// # Purpose
/// A `Migration` pairs an upgrade process with its inverse downgrade process
/// under a unique version. The checksum is computed once at construction
/// from the command definitions, so editing a definition after it was
/// applied shows up as drift.
///
/// # Status
/// The status fields (`is_applied`, `applied_at`, `applied_by`) describe the
/// persisted state the migration was last resolved against. Definitions
/// coming from discovery start out unapplied; the status services return
/// copies populated from the repository.
///
/// # Examples
///
/// ```rust
/// use runway::migration::{Migration, MigrationCommand, MigrationProcess};
///
/// let migration = Migration::new(
///     1,
///     "create_users",
///     "Creates the users collection",
///     MigrationProcess::new().command(MigrationCommand::create_collection("users")),
///     MigrationProcess::new().command(MigrationCommand::drop_collection("users")),
/// );
/// assert_eq!(migration.version(), 1);
/// assert!(migration.is_reversible());
/// assert_eq!(migration.checksum().len(), 64);
/// ```
#[derive(Clone)]
pub struct Migration {
    version: u64,
    name: String,
    description: String,
    upgrade: MigrationProcess,
    downgrade: MigrationProcess,
    checksum: Checksum,
    is_applied: bool,
    applied_at: Option<DateTime<Utc>>,
    applied_by: Option<String>,
}

impl Migration {
    pub fn new(
        version: u64,
        name: &str,
        description: &str,
        upgrade: MigrationProcess,
        downgrade: MigrationProcess,
    ) -> Self {
        let checksum = ChecksumService::compute_processes(&upgrade, &downgrade);
        Migration {
            version,
            name: name.to_string(),
            description: description.to_string(),
            upgrade,
            downgrade,
            checksum,
            is_applied: false,
            applied_at: None,
            applied_by: None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn upgrade(&self) -> &MigrationProcess {
        &self.upgrade
    }

    pub fn downgrade(&self) -> &MigrationProcess {
        &self.downgrade
    }

    /// Returns the process run for the given direction.
    pub fn process(&self, direction: Direction) -> &MigrationProcess {
        match direction {
            Direction::Upgrade => &self.upgrade,
            Direction::Downgrade => &self.downgrade,
        }
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Returns `false` when the migration has no downgrade commands.
    pub fn is_reversible(&self) -> bool {
        !self.downgrade.is_empty()
    }

    pub fn is_applied(&self) -> bool {
        self.is_applied
    }

    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        self.applied_at
    }

    pub fn applied_by(&self) -> Option<&str> {
        self.applied_by.as_deref()
    }

    /// Returns a copy carrying the given persisted status.
    pub(crate) fn with_status(
        &self,
        is_applied: bool,
        applied_at: Option<DateTime<Utc>>,
        applied_by: Option<String>,
    ) -> Migration {
        let mut migration = self.clone();
        migration.is_applied = is_applied;
        migration.applied_at = applied_at;
        migration.applied_by = applied_by;
        migration
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("checksum", &self.checksum)
            .field("is_applied", &self.is_applied)
            .field("upgrade", &self.upgrade)
            .field("downgrade", &self.downgrade)
            .finish()
    }
}

impl Display for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.version, self.name)
    }
}
