use crate::errors::RunwayError;
use crate::migration::{Direction, Migration};
use std::fmt::{Display, Formatter};

/// Lifecycle moments of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartingUpgrade,
    UpgradeSucceeded,
    UpgradeFailed,
    StartingDowngrade,
    DowngradeSucceeded,
    DowngradeFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::StartingUpgrade,
        EventKind::UpgradeSucceeded,
        EventKind::UpgradeFailed,
        EventKind::StartingDowngrade,
        EventKind::DowngradeSucceeded,
        EventKind::DowngradeFailed,
    ];

    pub fn starting(direction: Direction) -> Self {
        match direction {
            Direction::Upgrade => EventKind::StartingUpgrade,
            Direction::Downgrade => EventKind::StartingDowngrade,
        }
    }

    pub fn succeeded(direction: Direction) -> Self {
        match direction {
            Direction::Upgrade => EventKind::UpgradeSucceeded,
            Direction::Downgrade => EventKind::DowngradeSucceeded,
        }
    }

    pub fn failed(direction: Direction) -> Self {
        match direction {
            Direction::Upgrade => EventKind::UpgradeFailed,
            Direction::Downgrade => EventKind::DowngradeFailed,
        }
    }

    /// Returns the event name, e.g. `starting-upgrade`.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StartingUpgrade => "starting-upgrade",
            EventKind::UpgradeSucceeded => "upgrade-succeeded",
            EventKind::UpgradeFailed => "upgrade-failed",
            EventKind::StartingDowngrade => "starting-downgrade",
            EventKind::DowngradeSucceeded => "downgrade-succeeded",
            EventKind::DowngradeFailed => "downgrade-failed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn direction(&self) -> Direction {
        match self {
            EventKind::StartingUpgrade | EventKind::UpgradeSucceeded | EventKind::UpgradeFailed => {
                Direction::Upgrade
            }
            _ => Direction::Downgrade,
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A lifecycle moment of one migration, handed to event handlers.
///
/// Events are transient; the engine does not persist them.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationEvent {
    kind: EventKind,
    version: u64,
    name: String,
    error: Option<RunwayError>,
}

impl MigrationEvent {
    pub fn new(kind: EventKind, migration: &Migration, error: Option<RunwayError>) -> Self {
        MigrationEvent {
            kind,
            version: migration.version(),
            name: migration.name().to_string(),
            error,
        }
    }

    pub fn starting(migration: &Migration, direction: Direction) -> Self {
        Self::new(EventKind::starting(direction), migration, None)
    }

    pub fn succeeded(migration: &Migration, direction: Direction) -> Self {
        Self::new(EventKind::succeeded(direction), migration, None)
    }

    pub fn failed(migration: &Migration, direction: Direction, error: RunwayError) -> Self {
        Self::new(EventKind::failed(direction), migration, Some(error))
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    /// Returns the failure carried by `*-failed` events.
    pub fn error(&self) -> Option<&RunwayError> {
        self.error.as_ref()
    }
}

impl Display for MigrationEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.version, self.name)
    }
}
