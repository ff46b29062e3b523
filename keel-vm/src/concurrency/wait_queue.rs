//! The wait/notify queue map, striped to keep contention local.
//!
//! A waiter re-reads the watched cell under its stripe lock, so a notify
//! that lands between the guest's comparison and the sleep is never
//! lost. Deadlines are absolute nanoseconds from an arbitrary engine
//! epoch; [`DEADLINE_INFINITE`] never times out.

use std::{
    collections::HashMap,
    sync::{
        atomic::Ordering,
        Arc,
        Condvar,
        Mutex,
        OnceLock,
    },
    time::{
        Duration,
        Instant,
    },
};

use super::{
    SharedMemory,
    WaitKey,
};
use crate::{
    Trap,
    TrapKind,
};

/// Deadline value meaning "wait forever".
pub const DEADLINE_INFINITE: u64 = u64::MAX;

/// Outcome of a wait, with the guest-visible encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum WaitResult {
    /// The waiter was woken by a notify.
    Woken = 0,
    /// The observed value did not match; the wait never slept.
    NotEqual = 1,
    /// The deadline passed.
    TimedOut = 2,
}

const STRIPE_COUNT: usize = 64;

#[derive(Default)]
struct Waiter {
    woken: Mutex<bool>,
    condvar: Condvar,
}

#[derive(Default)]
struct Stripe {
    waiters: Mutex<HashMap<WaitKey, Vec<Arc<Waiter>>>>,
}

pub(crate) struct QueueMap {
    stripes: Vec<Stripe>,
}

impl QueueMap {
    fn stripe(&self, key: &WaitKey) -> &Stripe {
        let index = (key.memory as u64 ^ key.address) as usize % STRIPE_COUNT;
        &self.stripes[index]
    }
}

pub(crate) fn queue_map() -> &'static QueueMap {
    static MAP: OnceLock<QueueMap> = OnceLock::new();
    MAP.get_or_init(|| QueueMap {
        stripes: (0..STRIPE_COUNT).map(|_| Stripe::default()).collect(),
    })
}

/// The engine epoch deadlines are measured from.
fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Now, in deadline nanoseconds.
pub(crate) fn now_ns() -> u64 {
    epoch().elapsed().as_nanos() as u64
}

fn wait_on(
    key: WaitKey,
    observed_matches: impl FnOnce() -> bool,
    deadline_ns: u64,
) -> WaitResult {
    let stripe = queue_map().stripe(&key);
    let waiter = Arc::new(Waiter::default());
    {
        let mut waiters = stripe.waiters.lock().expect("wait queue poisoned");
        // Re-read under the stripe lock: a concurrent write-then-notify
        // either changes the value here or finds us queued.
        if !observed_matches() {
            return WaitResult::NotEqual;
        }
        waiters.entry(key).or_default().push(Arc::clone(&waiter));
    }

    let mut woken = waiter.woken.lock().expect("waiter poisoned");
    loop {
        if *woken {
            return WaitResult::Woken;
        }
        if deadline_ns == DEADLINE_INFINITE {
            woken = waiter.condvar.wait(woken).expect("waiter poisoned");
            continue;
        }
        let now = now_ns();
        if now >= deadline_ns {
            break;
        }
        let (guard, _timeout) = waiter
            .condvar
            .wait_timeout(woken, Duration::from_nanos(deadline_ns - now))
            .expect("waiter poisoned");
        woken = guard;
    }
    let timed_out = !*woken;
    drop(woken);
    if timed_out {
        // Withdraw from the queue. A racing notify may already have
        // counted us among the woken; report the wake in that case.
        let mut waiters = stripe.waiters.lock().expect("wait queue poisoned");
        if *waiter.woken.lock().expect("waiter poisoned") {
            return WaitResult::Woken;
        }
        if let Some(queue) = waiters.get_mut(&key) {
            queue.retain(|entry| !Arc::ptr_eq(entry, &waiter));
            if queue.is_empty() {
                waiters.remove(&key);
            }
        }
        WaitResult::TimedOut
    } else {
        WaitResult::Woken
    }
}

/// `memory.atomic.wait32`.
pub fn wait32(
    memory: &SharedMemory,
    compartment: u32,
    addr: u32,
    offset: u32,
    expected: u32,
    deadline_ns: u64,
) -> Result<WaitResult, Trap> {
    if !memory.ty.shared {
        return Err(Trap::new(TrapKind::Unreachable).with_operand(addr));
    }
    let cell = memory.atomic_u32(addr, offset)?;
    let key = WaitKey {
        compartment,
        memory: memory.id,
        address: addr as u64 + offset as u64,
    };
    Ok(wait_on(
        key,
        || cell.load(Ordering::SeqCst) == expected,
        deadline_ns,
    ))
}

/// `memory.atomic.wait64`.
pub fn wait64(
    memory: &SharedMemory,
    compartment: u32,
    addr: u32,
    offset: u32,
    expected: u64,
    deadline_ns: u64,
) -> Result<WaitResult, Trap> {
    if !memory.ty.shared {
        return Err(Trap::new(TrapKind::Unreachable).with_operand(addr));
    }
    let cell = memory.atomic_u64(addr, offset)?;
    let key = WaitKey {
        compartment,
        memory: memory.id,
        address: addr as u64 + offset as u64,
    };
    Ok(wait_on(
        key,
        || cell.load(Ordering::SeqCst) == expected,
        deadline_ns,
    ))
}

/// `memory.atomic.notify`: wake at most `count` waiters; returns the
/// number woken.
pub fn notify(
    memory: &SharedMemory,
    compartment: u32,
    addr: u32,
    offset: u32,
    count: u32,
) -> Result<u32, Trap> {
    // Bounds apply even when nobody waits.
    memory.check(addr, offset, 4)?;
    let key = WaitKey {
        compartment,
        memory: memory.id,
        address: addr as u64 + offset as u64,
    };
    let stripe = queue_map().stripe(&key);
    let mut waiters = stripe.waiters.lock().expect("wait queue poisoned");
    let Some(queue) = waiters.get_mut(&key) else {
        return Ok(0);
    };
    let take = queue.len().min(count as usize);
    let woken: Vec<_> = queue.drain(..take).collect();
    if queue.is_empty() {
        waiters.remove(&key);
    }
    drop(waiters);
    for waiter in &woken {
        *waiter.woken.lock().expect("waiter poisoned") = true;
        waiter.condvar.notify_one();
    }
    Ok(woken.len() as u32)
}

#[cfg(test)]
mod tests {
    use keel_types::{
        Limits,
        MemoryType,
    };

    use super::*;
    use crate::runtime::memory::MemoryData;

    fn shared_memory() -> SharedMemory {
        Arc::new(
            MemoryData::new(
                MemoryType {
                    limits: Limits { min: 1, max: Some(1) },
                    shared: true,
                },
                7,
            )
            .unwrap(),
        )
    }

    #[test]
    fn mismatched_expectation_returns_not_equal() {
        let memory = shared_memory();
        let result = wait32(&memory, 0, 0, 0, 1234, DEADLINE_INFINITE).unwrap();
        assert_eq!(result, WaitResult::NotEqual);
    }

    #[test]
    fn timeout_elapses() {
        let memory = shared_memory();
        let deadline = now_ns() + 5_000_000; // 5ms
        let result = wait32(&memory, 0, 0, 0, 0, deadline).unwrap();
        assert_eq!(result, WaitResult::TimedOut);
    }

    #[test]
    fn notify_wakes_at_most_count() {
        let memory = shared_memory();
        let memory2 = Arc::clone(&memory);
        let memory3 = Arc::clone(&memory);

        let a = std::thread::spawn(move || {
            wait32(&memory2, 1, 16, 0, 0, DEADLINE_INFINITE).unwrap()
        });
        let b = std::thread::spawn(move || {
            wait32(&memory3, 1, 16, 0, 0, DEADLINE_INFINITE).unwrap()
        });

        // Give both a chance to park.
        std::thread::sleep(Duration::from_millis(50));
        let woken_first = notify(&memory, 1, 16, 0, 1).unwrap();
        assert_eq!(woken_first, 1);
        let woken_rest = notify(&memory, 1, 16, 0, 64).unwrap();
        assert_eq!(woken_rest, 1);

        assert_eq!(a.join().unwrap(), WaitResult::Woken);
        assert_eq!(b.join().unwrap(), WaitResult::Woken);
    }

    #[test]
    fn unshared_memory_rejects_waits() {
        let memory = Arc::new(
            MemoryData::new(
                MemoryType {
                    limits: Limits { min: 1, max: Some(1) },
                    shared: false,
                },
                8,
            )
            .unwrap(),
        );
        assert!(wait32(&memory, 0, 0, 0, 0, DEADLINE_INFINITE).is_err());
    }
}
