//! Concurrency primitives: the wait/notify queues behind
//! `memory.atomic.wait*`/`notify`, the fence, and the thread-spawn
//! extension.

mod wait_queue;

pub use wait_queue::{
    notify,
    wait32,
    wait64,
    WaitResult,
    DEADLINE_INFINITE,
};

pub(crate) use wait_queue::now_ns;

use std::sync::Arc;

use keel_types::{
    Value,
    ValueType,
};
use tracing::debug;

use crate::{
    exec,
    platform,
    runtime::{
        Compartment,
        Context,
        Function,
    },
    Trap,
    TrapKind,
};

/// A joinable guest thread started by [`spawn_thread`].
pub struct ThreadHandle {
    join: platform::JoinHandle<Result<i64, Trap>>,
    context: Context,
}

impl ThreadHandle {
    /// Wait for the guest thread; returns the entry function's result or
    /// the trap that killed it.
    pub fn join(self) -> Result<i64, Trap> {
        let result = self.join.join();
        drop(self.context);
        result
    }
}

/// Spawn a guest thread: a fresh context in `compartment` running `entry`
/// with `argument`. The entry must have type `[i32] -> [i64]`.
pub fn spawn_thread(
    compartment: &Compartment,
    entry: &Function,
    argument: i32,
) -> Result<ThreadHandle, Trap> {
    let expected_params: &[ValueType] = &[ValueType::I32];
    let expected_results: &[ValueType] = &[ValueType::I64];
    if entry.ty().params() != expected_params || entry.ty().results() != expected_results {
        return Err(Trap::new(TrapKind::IndirectCallSignatureMismatch));
    }
    let context = compartment.create_context();
    let thread_context = context.clone();
    let thread_entry = entry.clone();
    let name = format!("keel-guest-{}", entry.debug_name());
    debug!(compartment = compartment.id(), entry = entry.debug_name(), "guest thread spawned");
    let join = platform::spawn(&name, move || {
        let results = exec::invoke(&thread_context, &thread_entry, &[Value::from(argument)])?;
        Ok(results
            .first()
            .and_then(Value::i64)
            .expect("entry type checked to return one i64"))
    });
    Ok(ThreadHandle { join, context })
}

/// `atomic.fence`: a sequentially consistent two-way barrier.
pub fn fence() {
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}

/// Key of a wait queue: the compartment, the memory's compartment-wide
/// id, and the byte address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WaitKey {
    pub(crate) compartment: u32,
    pub(crate) memory: u32,
    pub(crate) address: u64,
}

/// Shared access for the executor: it holds the memory payload, not a
/// handle.
pub(crate) type SharedMemory = Arc<crate::runtime::memory::MemoryData>;
