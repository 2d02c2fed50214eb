use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

static GLOBAL_LOCKS: LazyLock<LockRegistry> = LazyLock::new(LockRegistry::new);

/// An advisory lock provider.
///
/// Implementations decide where the lock lives: [LockRegistry] keeps it in
/// the current process, an adapter for a shared database can keep it in a
/// lease document so that separate processes see it too. Locks are
/// identified by name and held by an owner tag; they are not reentrant.
pub trait AdvisoryLock: Send + Sync {
    /// Tries to take the named lock for `owner`, waiting at most `timeout`.
    /// Returns `Ok(false)` when the wait expired.
    fn try_acquire(&self, name: &str, owner: &str, timeout: Duration) -> RunwayResult<bool>;

    /// Releases the named lock held by `owner`.
    fn release(&self, name: &str, owner: &str) -> RunwayResult<()>;

    /// Returns `true` if someone currently holds the named lock.
    fn is_locked(&self, name: &str) -> RunwayResult<bool>;
}

/// Scoped ownership of an advisory lock.
///
/// The lock is released when the guard is dropped, so every exit path of
/// the holder (success, error, panic unwinding) gives it back.
pub struct LockGuard {
    provider: Arc<dyn AdvisoryLock>,
    name: String,
    owner: String,
    released: bool,
}

impl LockGuard {
    /// Acquires the named lock or fails with `LockTimeout`.
    pub fn acquire(
        provider: Arc<dyn AdvisoryLock>,
        name: &str,
        owner: &str,
        timeout: Duration,
    ) -> RunwayResult<LockGuard> {
        log::debug!("Acquiring lock '{}' for {} (timeout {:?})", name, owner, timeout);
        if !provider.try_acquire(name, owner, timeout)? {
            log::error!("Lock '{}' was not acquired within {:?}", name, timeout);
            return Err(RunwayError::new(
                &format!(
                    "Could not acquire lock '{}' within {:?}; another migration session holds it",
                    name, timeout
                ),
                ErrorKind::LockTimeout,
            ));
        }

        Ok(LockGuard {
            provider,
            name: name.to_string(),
            owner: owner.to_string(),
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Releases the lock now and reports a release failure to the caller.
    pub fn release(mut self) -> RunwayResult<()> {
        self.released = true;
        self.provider.release(&self.name, &self.owner)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.provider.release(&self.name, &self.owner) {
            log::warn!("Failed to release lock '{}': {}", self.name, e);
        }
    }
}

/// State of one named lock.
struct NamedLock {
    holder: Mutex<Option<String>>,
    freed: Condvar,
}

impl NamedLock {
    fn new() -> Self {
        NamedLock {
            holder: Mutex::new(None),
            freed: Condvar::new(),
        }
    }
}

/// In-process registry of named advisory locks.
///
/// Clones share the same lock table. [LockRegistry::global] returns the
/// process-wide registry, which is what engines use unless another
/// [AdvisoryLock] is configured; two engines in one process pointed at the
/// same history therefore exclude each other.
///
/// # Examples
///
/// ```
/// use runway::common::{AdvisoryLock, LockRegistry};
/// use std::time::Duration;
///
/// let registry = LockRegistry::new();
/// assert!(registry.try_acquire("history", "a", Duration::ZERO).unwrap());
/// assert!(!registry.try_acquire("history", "b", Duration::from_millis(10)).unwrap());
/// registry.release("history", "a").unwrap();
/// assert!(registry.try_acquire("history", "b", Duration::ZERO).unwrap());
/// ```
#[derive(Clone)]
pub struct LockRegistry {
    locks: Arc<DashMap<String, Arc<NamedLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        LockRegistry {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> LockRegistry {
        GLOBAL_LOCKS.clone()
    }

    /// Returns the number of named locks created so far.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn get_lock(&self, name: &str) -> Arc<NamedLock> {
        // the map guard is dropped before the caller waits on the lock
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(NamedLock::new()))
            .clone()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisoryLock for LockRegistry {
    fn try_acquire(&self, name: &str, owner: &str, timeout: Duration) -> RunwayResult<bool> {
        let lock = self.get_lock(name);
        // a timeout too large for an Instant waits without a deadline
        let deadline = Instant::now().checked_add(timeout);
        let mut holder = lock.holder.lock();

        if holder.as_deref() == Some(owner) {
            return Err(RunwayError::new(
                &format!("Lock '{}' is already held by {}", name, owner),
                ErrorKind::InvalidOperation,
            ));
        }

        while holder.is_some() {
            match deadline {
                Some(deadline) => {
                    if lock.freed.wait_until(&mut holder, deadline).timed_out()
                        && holder.is_some()
                    {
                        return Ok(false);
                    }
                }
                None => lock.freed.wait(&mut holder),
            }
        }

        *holder = Some(owner.to_string());
        Ok(true)
    }

    fn release(&self, name: &str, owner: &str) -> RunwayResult<()> {
        let lock = self.locks.get(name).map(|entry| entry.value().clone());
        let lock = lock.ok_or_else(|| {
            RunwayError::new(&format!("Lock '{}' does not exist", name), ErrorKind::NotFound)
        })?;

        let mut holder = lock.holder.lock();
        match holder.as_deref() {
            Some(current) if current == owner => {
                *holder = None;
                lock.freed.notify_one();
                Ok(())
            }
            Some(current) => Err(RunwayError::new(
                &format!("Lock '{}' is held by {}, not by {}", name, current, owner),
                ErrorKind::InvalidOperation,
            )),
            None => Err(RunwayError::new(
                &format!("Lock '{}' is not held", name),
                ErrorKind::InvalidOperation,
            )),
        }
    }

    fn is_locked(&self, name: &str) -> RunwayResult<bool> {
        let lock = self.locks.get(name).map(|entry| entry.value().clone());
        Ok(match lock {
            Some(lock) => lock.holder.lock().is_some(),
            None => false,
        })
    }
}
