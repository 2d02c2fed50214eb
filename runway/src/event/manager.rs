use crate::errors::{ErrorKind, RunwayError};
use crate::event::{EventKind, MigrationEvent};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Callback invoked for a [MigrationEvent].
pub type EventHandler = Arc<dyn Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle to a registered handler, used to unsubscribe it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberRef {
    kind: EventKind,
    id: u64,
}

impl SubscriberRef {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Result of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of handlers invoked.
    pub delivered: usize,
    /// One `HandlerError` per handler that returned an error or panicked.
    pub failures: Vec<RunwayError>,
}

struct Registration {
    id: u64,
    priority: Option<u32>,
    handler: EventHandler,
}

#[derive(Default)]
struct EventManagerInner {
    handlers: IndexMap<EventKind, Vec<Registration>>,
    next_id: u64,
}

/// Synchronous publish/subscribe for migration lifecycle events.
///
/// # Ordering
/// Handlers of one event kind run on the dispatching thread, one after the
/// other: first those registered with a priority (lower first, ties in
/// registration order), then the others in registration order. Nothing is
/// guaranteed across different kinds.
///
/// # Isolation
/// A handler that returns an error or panics is logged and skipped; the
/// remaining handlers still run and the migration outcome is unaffected.
/// Handlers are called without any internal lock held, so they may
/// subscribe or unsubscribe.
///
/// # Examples
///
/// ```rust
/// use runway::event::{EventKind, EventManager};
///
/// let manager = EventManager::new();
/// let subscriber = manager.subscribe(EventKind::UpgradeSucceeded, |event| {
///     println!("applied {}", event.version());
///     Ok(())
/// });
/// assert_eq!(manager.handler_count(EventKind::UpgradeSucceeded), 1);
/// assert!(manager.unsubscribe(&subscriber));
/// ```
#[derive(Clone, Default)]
pub struct EventManager {
    inner: Arc<RwLock<EventManagerInner>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriberRef
    where
        F: Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(kind, None, Arc::new(handler))
    }

    /// Registers a handler that runs before all handlers without priority.
    pub fn subscribe_with_priority<F>(&self, kind: EventKind, priority: u32, handler: F) -> SubscriberRef
    where
        F: Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(kind, Some(priority), Arc::new(handler))
    }

    /// Registers one handler for several event kinds.
    pub fn subscribe_all<F>(&self, kinds: &[EventKind], handler: F) -> Vec<SubscriberRef>
    where
        F: Fn(&MigrationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        kinds
            .iter()
            .map(|kind| self.register(*kind, None, handler.clone()))
            .collect()
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscriber: &SubscriberRef) -> bool {
        let mut inner = self.inner.write();
        match inner.handlers.get_mut(&subscriber.kind) {
            Some(registrations) => {
                let before = registrations.len();
                registrations.retain(|r| r.id != subscriber.id);
                registrations.len() != before
            }
            None => false,
        }
    }

    /// Removes every handler of `kind`.
    pub fn clear(&self, kind: EventKind) {
        self.inner.write().handlers.shift_remove(&kind);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner
            .read()
            .handlers
            .get(&kind)
            .map_or(0, |registrations| registrations.len())
    }

    /// Delivers `event` to the handlers of its kind.
    pub fn dispatch(&self, event: &MigrationEvent) -> DispatchReport {
        let handlers = self.ordered_handlers(event.kind());
        let mut report = DispatchReport::default();

        for handler in handlers {
            report.delivered += 1;
            let failure = match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(panic) => Some(format!("handler panicked: {}", panic_message(&panic))),
            };

            if let Some(message) = failure {
                log::error!("Event handler for {} failed: {}", event, message);
                report.failures.push(RunwayError::new(
                    &format!("Event handler for {} failed: {}", event, message),
                    ErrorKind::HandlerError,
                ));
            }
        }
        report
    }

    fn register(&self, kind: EventKind, priority: Option<u32>, handler: EventHandler) -> SubscriberRef {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.handlers.entry(kind).or_default().push(Registration {
            id,
            priority,
            handler,
        });
        log::debug!("Registered handler {} for {}", id, kind);
        SubscriberRef { kind, id }
    }

    fn ordered_handlers(&self, kind: EventKind) -> Vec<EventHandler> {
        let inner = self.inner.read();
        let registrations = match inner.handlers.get(&kind) {
            Some(registrations) => registrations,
            None => return Vec::new(),
        };

        let mut prioritized: Vec<&Registration> =
            registrations.iter().filter(|r| r.priority.is_some()).collect();
        // stable sort keeps registration order among equal priorities
        prioritized.sort_by_key(|r| r.priority);

        prioritized
            .into_iter()
            .chain(registrations.iter().filter(|r| r.priority.is_none()))
            .map(|r| r.handler.clone())
            .collect()
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
