//! Locking primitives with engine policy baked in: poisoning is an
//! invariant violation, and debug builds track the owning thread.

use std::{
    sync::{
        Condvar,
        Mutex as StdMutex,
        MutexGuard as StdMutexGuard,
    },
    time::Duration,
};

#[cfg(debug_assertions)]
use std::{
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
    thread,
};

#[cfg(debug_assertions)]
fn current_thread_token() -> u64 {
    // ThreadId has no stable integer form; hash the debug representation.
    use std::hash::{
        Hash,
        Hasher,
    };
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish() | 1
}

/// A mutex that treats poisoning as a fatal engine bug and, in debug
/// builds, can assert that the caller holds it.
#[derive(Debug, Default)]
pub struct Mutex<T> {
    inner: StdMutex<T>,
    #[cfg(debug_assertions)]
    owner: AtomicU64,
}

/// Guard returned by [`Mutex::lock`].
pub struct MutexGuard<'a, T> {
    inner: StdMutexGuard<'a, T>,
    #[cfg(debug_assertions)]
    owner: &'a AtomicU64,
}

impl<T> Mutex<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            inner: StdMutex::new(value),
            #[cfg(debug_assertions)]
            owner: AtomicU64::new(0),
        }
    }

    /// Acquire the lock.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let inner = self
            .inner
            .lock()
            .expect("engine mutex poisoned: a holder panicked");
        #[cfg(debug_assertions)]
        self.owner.store(current_thread_token(), Ordering::Relaxed);
        MutexGuard {
            inner,
            #[cfg(debug_assertions)]
            owner: &self.owner,
        }
    }

    /// Debug-assert that the current thread holds this mutex.
    pub fn assert_held_by_current_thread(&self) {
        #[cfg(debug_assertions)]
        debug_assert_eq!(
            self.owner.load(Ordering::Relaxed),
            current_thread_token(),
            "lock not held by this thread"
        );
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.store(0, Ordering::Relaxed);
    }
}

impl<T> std::ops::Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> std::ops::DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// An auto-reset event: `wait` blocks until one `signal`, consuming it.
#[derive(Debug, Default)]
pub struct Event {
    signaled: StdMutex<bool>,
    condvar: Condvar,
}

impl Event {
    /// A fresh, unsignaled event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake exactly one past or future waiter.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock().expect("event mutex poisoned");
        *signaled = true;
        drop(signaled);
        self.condvar.notify_one();
    }

    /// Block until signaled, then reset.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock().expect("event mutex poisoned");
        while !*signaled {
            signaled = self
                .condvar
                .wait(signaled)
                .expect("event mutex poisoned");
        }
        *signaled = false;
    }

    /// Block until signaled or the timeout elapses; reports whether the
    /// signal was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signaled = self.signaled.lock().expect("event mutex poisoned");
        let deadline = std::time::Instant::now() + timeout;
        while !*signaled {
            let now = std::time::Instant::now();
            let Some(remaining) = deadline.checked_duration_since(now).filter(|d| !d.is_zero())
            else {
                return false;
            };
            let (guard, result) = self
                .condvar
                .wait_timeout(signaled, remaining)
                .expect("event mutex poisoned");
            signaled = guard;
            if result.timed_out() && !*signaled {
                return false;
            }
        }
        *signaled = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_owner_is_tracked() {
        let mutex = Mutex::new(1);
        let guard = mutex.lock();
        mutex.assert_held_by_current_thread();
        drop(guard);
    }

    #[test]
    fn events_auto_reset() {
        let event = Event::new();
        event.signal();
        event.wait();
        assert!(!event.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn events_cross_threads() {
        let event = std::sync::Arc::new(Event::new());
        let signaler = {
            let event = std::sync::Arc::clone(&event);
            std::thread::spawn(move || event.signal())
        };
        event.wait();
        signaler.join().unwrap();
    }
}
