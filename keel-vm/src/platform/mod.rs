//! The host abstraction layer: page-granular virtual memory, hardware
//! trap interception, mutexes and events, threads, and the system RNG.
//!
//! This module owns every `unsafe` block in the workspace.

mod memory;
mod mutex;
mod random;
mod signal;
mod thread;

pub use memory::{
    page_size,
    page_size_log2,
    Access,
    VirtualRegion,
};
pub use mutex::{
    Event,
    Mutex,
    MutexGuard,
};
pub use random::random_bytes;
pub use signal::{
    catch_hardware_traps,
    register_memory_region,
    unregister_memory_region,
    HardwareTrap,
};
pub use thread::{
    spawn,
    JoinHandle,
};
