//! Hardware trap interception.
//!
//! A process-wide signal handler translates access violations inside a
//! registered linear-memory reservation into out-of-bounds traps, and
//! integer fault signals into divide traps, delivering them to the
//! innermost [`catch_hardware_traps`] frame on the faulting thread via a
//! signal-safe long jump.
//!
//! The executor bounds-checks every guest access explicitly, so this
//! layer is the backstop behind the guard regions, not the primary bounds
//! mechanism. A fault outside any registered region is not ours: the
//! previous signal disposition is restored and the signal re-raised.

use crate::{
    Trap,
    TrapKind,
};

/// A fault the handler attributed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareTrap {
    /// Access violation inside a registered memory's reserved range.
    OutOfBoundsMemoryAccess {
        /// Id the region was registered under.
        memory_id: u32,
        /// Faulting offset relative to the region base.
        offset: usize,
    },
    /// An integer division fault.
    IntegerDivideByZeroOrOverflow,
}

impl HardwareTrap {
    fn into_trap(self) -> Trap {
        match self {
            Self::OutOfBoundsMemoryAccess { offset, .. } => {
                Trap::new(TrapKind::OutOfBoundsMemoryAccess)
                    .with_operand(offset as u64)
            }
            Self::IntegerDivideByZeroOrOverflow => {
                Trap::new(TrapKind::IntegerDivideByZeroOrOverflow)
            }
        }
    }
}

pub use sys::{
    catch_hardware_traps,
    register_memory_region,
    unregister_memory_region,
};

#[cfg(unix)]
mod sys {
    use std::{
        cell::Cell,
        io,
        mem,
        ptr,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Once,
        },
    };

    use super::HardwareTrap;
    use crate::Trap;

    /// Upper bound on concurrently registered memory reservations.
    const MAX_REGIONS: usize = 256;

    /// Lock-free region table: `(base, len, id + 1)` triples, zero when
    /// free. The signal handler only ever reads it.
    struct RegionSlot {
        base: AtomicUsize,
        len: AtomicUsize,
        tagged_id: AtomicUsize,
    }

    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY_SLOT: RegionSlot = RegionSlot {
        base: AtomicUsize::new(0),
        len: AtomicUsize::new(0),
        tagged_id: AtomicUsize::new(0),
    };

    static REGIONS: [RegionSlot; MAX_REGIONS] = [EMPTY_SLOT; MAX_REGIONS];

    /// Publish a memory reservation for fault attribution.
    pub fn register_memory_region(base: usize, len: usize, memory_id: u32) -> io::Result<()> {
        for slot in REGIONS.iter() {
            if slot
                .base
                .compare_exchange(0, base, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                slot.len.store(len, Ordering::Release);
                slot.tagged_id
                    .store(memory_id as usize + 1, Ordering::Release);
                return Ok(());
            }
        }
        Err(io::Error::from(io::ErrorKind::OutOfMemory))
    }

    /// Withdraw a reservation registered with [`register_memory_region`].
    pub fn unregister_memory_region(base: usize) {
        for slot in REGIONS.iter() {
            if slot.base.load(Ordering::Acquire) == base {
                slot.tagged_id.store(0, Ordering::Release);
                slot.len.store(0, Ordering::Release);
                slot.base.store(0, Ordering::Release);
                return;
            }
        }
    }

    fn find_region(address: usize) -> Option<(u32, usize)> {
        for slot in REGIONS.iter() {
            let base = slot.base.load(Ordering::Acquire);
            if base == 0 || address < base {
                continue;
            }
            let len = slot.len.load(Ordering::Acquire);
            let tagged = slot.tagged_id.load(Ordering::Acquire);
            if tagged != 0 && address - base < len {
                return Some(((tagged - 1) as u32, address - base));
            }
        }
        None
    }

    // The long-jump buffer. Oversized well past any libc's sigjmp_buf.
    #[repr(C, align(16))]
    struct JmpBuf([u64; 128]);

    #[cfg(target_os = "linux")]
    extern "C" {
        // glibc spells sigsetjmp as a macro over __sigsetjmp.
        fn __sigsetjmp(env: *mut JmpBuf, savemask: libc::c_int) -> libc::c_int;
        fn siglongjmp(env: *mut JmpBuf, val: libc::c_int) -> !;
    }

    #[cfg(target_os = "linux")]
    unsafe fn sigsetjmp(env: *mut JmpBuf, savemask: libc::c_int) -> libc::c_int {
        __sigsetjmp(env, savemask)
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    extern "C" {
        fn sigsetjmp(env: *mut JmpBuf, savemask: libc::c_int) -> libc::c_int;
        fn siglongjmp(env: *mut JmpBuf, val: libc::c_int) -> !;
    }

    /// Per-thread chain of active catch frames.
    struct CatchFrame {
        jmp: JmpBuf,
        trap: Cell<Option<HardwareTrap>>,
        prev: *mut CatchFrame,
    }

    thread_local! {
        static ACTIVE_FRAME: Cell<*mut CatchFrame> = const { Cell::new(ptr::null_mut()) };
    }

    fn install_handlers() {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            // SAFETY: standard sigaction installation; the handler only
            // touches signal-safe state.
            unsafe {
                let mut action: libc::sigaction = mem::zeroed();
                let handler: extern "C" fn(
                    libc::c_int,
                    *mut libc::siginfo_t,
                    *mut libc::c_void,
                ) = handle_signal;
                action.sa_sigaction = handler as usize;
                action.sa_flags = libc::SA_SIGINFO | libc::SA_NODEFER;
                libc::sigemptyset(&mut action.sa_mask);
                for signal in [libc::SIGSEGV, libc::SIGBUS, libc::SIGFPE] {
                    libc::sigaction(signal, &action, ptr::null_mut());
                }
            }
        });
    }

    extern "C" fn handle_signal(
        signal: libc::c_int,
        info: *mut libc::siginfo_t,
        _context: *mut libc::c_void,
    ) {
        let frame = ACTIVE_FRAME.with(Cell::get);
        let trap = match signal {
            libc::SIGFPE => Some(HardwareTrap::IntegerDivideByZeroOrOverflow),
            libc::SIGSEGV | libc::SIGBUS => {
                // SAFETY: si_addr is valid for these signals.
                #[cfg(target_os = "linux")]
                let address = unsafe { (*info).si_addr() } as usize;
                #[cfg(not(target_os = "linux"))]
                let address = unsafe { (*info).si_addr } as usize;
                find_region(address).map(|(memory_id, offset)| {
                    HardwareTrap::OutOfBoundsMemoryAccess { memory_id, offset }
                })
            }
            _ => None,
        };

        match (trap, frame.is_null()) {
            (Some(trap), false) => {
                // SAFETY: the frame pointer was published by the thread we
                // are interrupting and stays alive until it unpublishes it.
                unsafe {
                    (*frame).trap.set(Some(trap));
                    siglongjmp(&mut (*frame).jmp, 1);
                }
            }
            _ => {
                // Not our fault to handle: fall back to the default
                // disposition so the process crashes visibly.
                // SAFETY: resetting to SIG_DFL and re-raising is
                // signal-safe.
                unsafe {
                    let mut action: libc::sigaction = mem::zeroed();
                    action.sa_sigaction = libc::SIG_DFL;
                    libc::sigaction(signal, &action, ptr::null_mut());
                    libc::raise(signal);
                }
            }
        }
    }

    /// Run `body`, converting any hardware trap raised on this thread
    /// into the structured trap value.
    ///
    /// Frames nest: an inner catch shadows the outer one for the duration
    /// of the call.
    pub fn catch_hardware_traps<T>(
        body: impl FnOnce() -> Result<T, Trap>,
    ) -> Result<T, Trap> {
        install_handlers();

        let mut frame = CatchFrame {
            jmp: JmpBuf([0; 128]),
            trap: Cell::new(None),
            prev: ACTIVE_FRAME.with(Cell::get),
        };
        ACTIVE_FRAME.with(|active| active.set(&mut frame));

        // SAFETY: the buffer outlives every use; the non-local return
        // only skips engine frames that hold no locks (the executor
        // releases shared state before any access that could fault).
        let jumped = unsafe { sigsetjmp(&mut frame.jmp, 1) };
        let result = if jumped == 0 {
            body()
        } else {
            Err(frame
                .trap
                .take()
                .expect("long jump without a recorded trap")
                .into_trap())
        };
        ACTIVE_FRAME.with(|active| active.set(frame.prev));
        result
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::TrapKind;

        #[test]
        fn a_body_without_faults_passes_through() {
            let value = catch_hardware_traps(|| Ok::<_, Trap>(42)).unwrap();
            assert_eq!(value, 42);
        }

        #[test]
        fn faults_in_registered_regions_become_traps() {
            use crate::platform::{
                Access,
                VirtualRegion,
            };

            let region = VirtualRegion::reserve(crate::platform::page_size()).unwrap();
            let base = region.base().as_ptr() as usize;
            register_memory_region(base, region.len(), 9).unwrap();

            let result = catch_hardware_traps(|| {
                // Read a reserved-but-uncommitted page.
                // SAFETY: the fault is the point; the handler recovers.
                let value = unsafe { region.base().as_ptr().read_volatile() };
                let _ = value;
                Ok(())
            });
            unregister_memory_region(base);

            let trap = result.unwrap_err();
            assert_eq!(trap.kind, TrapKind::OutOfBoundsMemoryAccess);
            // The region stays usable afterwards.
            region.commit(0, crate::platform::page_size(), Access::ReadWrite).unwrap();
        }
    }
}

#[cfg(not(unix))]
mod sys {
    //! Without signal interception the explicit bounds checks are the
    //! only bounds mechanism; registration is a no-op and the catch
    //! wrapper is transparent.

    use std::io;

    use crate::Trap;

    /// No-op on this host.
    pub fn register_memory_region(_base: usize, _len: usize, _memory_id: u32) -> io::Result<()> {
        Ok(())
    }

    /// No-op on this host.
    pub fn unregister_memory_region(_base: usize) {}

    /// Transparent on this host.
    pub fn catch_hardware_traps<T>(
        body: impl FnOnce() -> Result<T, Trap>,
    ) -> Result<T, Trap> {
        body()
    }
}
