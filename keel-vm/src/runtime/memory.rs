//! Sandboxed linear memory.
//!
//! Every memory reserves address space for its declared maximum (or a
//! quasi-infinite range when unbounded) plus a guard region, commits only
//! the live pages, and publishes its reservation for hardware fault
//! attribution. All guest access goes through explicit bounds checks; the
//! guard region is the backstop for any constant-offset access a native
//! producer might emit without one.

use std::sync::atomic::{
    AtomicU16,
    AtomicU32,
    AtomicU64,
    AtomicU8,
    Ordering,
};

use keel_types::{
    consts::{
        MAX_MEMORY_PAGES,
        PAGE_SIZE,
    },
    MemoryType,
};
use tracing::debug;

use crate::{
    platform::{
        self,
        Access,
        VirtualRegion,
    },
    Trap,
    TrapKind,
};

/// Reservation used for memories without a declared maximum: 8 GiB of
/// address space, far past anything a 32-bit guest can address.
const QUASI_INFINITE_BYTES: u64 = 8 << 30;

/// Guard bytes past the reserved maximum: two pages of linear memory,
/// covering the largest constant offset plus access width emitted without
/// a preceding explicit check.
const GUARD_BYTES: u64 = 2 * PAGE_SIZE;

/// Payload of a memory object.
#[derive(Debug)]
pub(crate) struct MemoryData {
    pub(crate) ty: MemoryType,
    /// Compartment-wide small id, stable across compartment cloning.
    pub(crate) id: u32,
    region: VirtualRegion,
    current_pages: AtomicU64,
    /// Serializes growth; readers observe the page count atomically.
    grow_lock: platform::Mutex<()>,
}

impl MemoryData {
    pub(crate) fn new(ty: MemoryType, id: u32) -> Result<Self, Trap> {
        let reserve_bytes = ty
            .limits
            .max
            .map(|max| max * PAGE_SIZE)
            .unwrap_or(QUASI_INFINITE_BYTES)
            + GUARD_BYTES;
        let region = VirtualRegion::reserve(reserve_bytes as usize)
            .map_err(|_| Trap::new(TrapKind::OutOfMemory))?;

        let initial_bytes = page_aligned_bytes(ty.limits.min);
        if initial_bytes > 0 {
            region
                .commit(0, initial_bytes, Access::ReadWrite)
                .map_err(|_| Trap::new(TrapKind::OutOfMemory))?;
        }
        let _ = platform::register_memory_region(
            region.base().as_ptr() as usize,
            region.len(),
            id,
        );
        debug!(id, min = ty.limits.min, max = ?ty.limits.max, shared = ty.shared, "memory created");
        Ok(Self {
            ty,
            id,
            region,
            current_pages: AtomicU64::new(ty.limits.min),
            grow_lock: platform::Mutex::new(()),
        })
    }

    /// Current size in pages.
    pub(crate) fn pages(&self) -> u64 {
        self.current_pages.load(Ordering::Acquire)
    }

    /// Current size in bytes.
    pub(crate) fn byte_len(&self) -> u64 {
        self.pages() * PAGE_SIZE
    }

    /// Grow by `delta` pages. Returns the previous page count, or `None`
    /// when the limits forbid the growth (the guest sees `-1`). Host
    /// refusal to commit traps instead.
    pub(crate) fn grow(&self, delta: u64) -> Result<Option<u64>, Trap> {
        let _guard = self.grow_lock.lock();
        let current = self.pages();
        let Some(requested) = current.checked_add(delta) else {
            return Ok(None);
        };
        let max = self.ty.limits.max.unwrap_or(MAX_MEMORY_PAGES);
        if requested > max {
            return Ok(None);
        }
        if delta > 0 {
            self.region
                .commit(
                    page_aligned_bytes(current),
                    page_aligned_bytes(requested) - page_aligned_bytes(current),
                    Access::ReadWrite,
                )
                .map_err(|_| Trap::new(TrapKind::OutOfMemory))?;
        }
        self.current_pages.store(requested, Ordering::Release);
        debug!(id = self.id, from = current, to = requested, "memory grown");
        Ok(Some(current))
    }

    /// Bounds-check an access of `len` bytes at `addr + offset`; returns
    /// the effective byte address.
    pub(crate) fn check(&self, addr: u32, offset: u32, len: u64) -> Result<u64, Trap> {
        let effective = addr as u64 + offset as u64;
        if effective + len > self.byte_len() {
            return Err(Trap::new(TrapKind::OutOfBoundsMemoryAccess)
                .with_operand(effective));
        }
        Ok(effective)
    }

    fn ptr(&self, effective: u64) -> *mut u8 {
        // Callers have bounds-checked `effective` against the committed
        // length.
        // SAFETY: the offset stays inside this memory's reservation.
        unsafe { self.region.base().as_ptr().add(effective as usize) }
    }

    /// Read `out.len()` bytes at `addr + offset`.
    pub(crate) fn read(&self, addr: u32, offset: u32, out: &mut [u8]) -> Result<(), Trap> {
        let effective = self.check(addr, offset, out.len() as u64)?;
        // SAFETY: range checked; concurrent guest writes to shared memory
        // are guest-visible nondeterminism, not a host invariant.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr(effective), out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    /// Write `bytes` at `addr + offset`.
    pub(crate) fn write(&self, addr: u32, offset: u32, bytes: &[u8]) -> Result<(), Trap> {
        let effective = self.check(addr, offset, bytes.len() as u64)?;
        // SAFETY: as for read.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr(effective), bytes.len());
        }
        Ok(())
    }

    /// `memory.fill`.
    pub(crate) fn fill(&self, dst: u32, value: u8, len: u32) -> Result<(), Trap> {
        let effective = self.check(dst, 0, len as u64)?;
        // SAFETY: as for read.
        unsafe {
            std::ptr::write_bytes(self.ptr(effective), value, len as usize);
        }
        Ok(())
    }

    /// `memory.copy` within one memory; overlapping ranges copy as if
    /// buffered.
    pub(crate) fn copy_within(&self, dst: u32, src: u32, len: u32) -> Result<(), Trap> {
        let dst_eff = self.check(dst, 0, len as u64)?;
        let src_eff = self.check(src, 0, len as u64)?;
        // SAFETY: both ranges checked; copy handles overlap.
        unsafe {
            std::ptr::copy(self.ptr(src_eff), self.ptr(dst_eff), len as usize);
        }
        Ok(())
    }

    /// `memory.init` from a passive segment slice.
    pub(crate) fn init(&self, dst: u32, bytes: &[u8]) -> Result<(), Trap> {
        self.write(dst, 0, bytes)
    }

    /// An atomic view of a single byte at `addr + offset`.
    pub(crate) fn atomic_u8(&self, addr: u32, offset: u32) -> Result<&AtomicU8, Trap> {
        let effective = self.check(addr, offset, 1)?;
        // SAFETY: in-bounds and committed; AtomicU8 has the same layout
        // as u8.
        Ok(unsafe { &*(self.ptr(effective) as *const AtomicU8) })
    }

    /// An atomic view of two bytes at `addr + offset`.
    pub(crate) fn atomic_u16(&self, addr: u32, offset: u32) -> Result<&AtomicU16, Trap> {
        let effective = self.check(addr, offset, 2)?;
        debug_assert_eq!(effective % 2, 0);
        // SAFETY: as for atomic_u8, with alignment from validation.
        Ok(unsafe { &*(self.ptr(effective) as *const AtomicU16) })
    }

    /// A sequentially consistent 32-bit atomic view of `addr + offset`.
    /// The alignment requirement was enforced by validation.
    pub(crate) fn atomic_u32(&self, addr: u32, offset: u32) -> Result<&AtomicU32, Trap> {
        let effective = self.check(addr, offset, 4)?;
        debug_assert_eq!(effective % 4, 0);
        // SAFETY: in-bounds, aligned, and committed; AtomicU32 has the
        // same layout as u32.
        Ok(unsafe { &*(self.ptr(effective) as *const AtomicU32) })
    }

    /// As [`Self::atomic_u32`], for 64-bit accesses.
    pub(crate) fn atomic_u64(&self, addr: u32, offset: u32) -> Result<&AtomicU64, Trap> {
        let effective = self.check(addr, offset, 8)?;
        debug_assert_eq!(effective % 8, 0);
        // SAFETY: as for atomic_u32.
        Ok(unsafe { &*(self.ptr(effective) as *const AtomicU64) })
    }

    /// Raw base address, for fault-region bookkeeping.
    pub(crate) fn base_address(&self) -> usize {
        self.region.base().as_ptr() as usize
    }
}

impl Drop for MemoryData {
    fn drop(&mut self) {
        platform::unregister_memory_region(self.base_address());
    }
}

fn page_aligned_bytes(pages: u64) -> usize {
    // Linear-memory pages are at least as large as any host page size the
    // engine supports, so byte counts stay host-page-aligned.
    (pages * PAGE_SIZE) as usize
}

#[cfg(test)]
mod tests {
    use keel_types::Limits;

    use super::*;

    fn memory(min: u64, max: Option<u64>) -> MemoryData {
        MemoryData::new(
            MemoryType {
                limits: Limits { min, max },
                shared: false,
            },
            0,
        )
        .unwrap()
    }

    #[test]
    fn access_is_bounded_by_the_current_size() {
        let memory = memory(1, Some(2));
        memory.write(65532, 0, &[1, 2, 3, 4]).unwrap();
        let trap = memory.write(65533, 0, &[0; 4]).unwrap_err();
        assert_eq!(trap.kind, TrapKind::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn the_offset_participates_in_the_bounds_check() {
        let memory = memory(1, Some(1));
        let trap = memory.read(65535, 1, &mut [0]).unwrap_err();
        assert_eq!(trap.kind, TrapKind::OutOfBoundsMemoryAccess);
        assert_eq!(trap.operands[0], keel_types::Value::from(65536u64));
    }

    #[test]
    fn growth_commits_in_place_and_is_capped() {
        let memory = memory(1, Some(3));
        assert_eq!(memory.grow(1).unwrap(), Some(1));
        assert_eq!(memory.pages(), 2);
        memory.write(2 * 65536 - 1, 0, &[9]).unwrap();
        // Beyond the declared maximum: -1, not a trap.
        assert_eq!(memory.grow(2).unwrap(), None);
        assert_eq!(memory.pages(), 2);
    }

    #[test]
    fn grown_pages_read_zero() {
        let memory = memory(0, Some(1));
        assert_eq!(memory.grow(1).unwrap(), Some(0));
        let mut out = [0xff];
        memory.read(12345, 0, &mut out).unwrap();
        assert_eq!(out, [0]);
    }

    #[test]
    fn copy_handles_overlap() {
        let memory = memory(1, Some(1));
        memory.write(0, 0, &[1, 2, 3, 4]).unwrap();
        memory.copy_within(1, 0, 3).unwrap();
        let mut out = [0; 4];
        memory.read(0, 0, &mut out).unwrap();
        assert_eq!(out, [1, 1, 2, 3]);
    }
}
