//! Page-granular virtual memory: reservation without commitment, explicit
//! commit and protection changes, and guarded release on drop.

use std::{
    io,
    ptr::NonNull,
    sync::OnceLock,
};

/// Protection of a committed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Committed but inaccessible.
    None,
    /// Read-only.
    Read,
    /// Read-write.
    ReadWrite,
}

/// The host's page size in bytes. Always a power of two.
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(sys::query_page_size)
}

/// Log2 of [`page_size`].
pub fn page_size_log2() -> u32 {
    page_size().trailing_zeros()
}

/// A reserved range of address space.
///
/// Reservation claims addresses without backing them; pages become usable
/// only after [`VirtualRegion::commit`]. The whole range is released on
/// drop.
#[derive(Debug)]
pub struct VirtualRegion {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is a raw address range; all mutation goes through
// &self methods that the callers synchronize (memory growth is serialized
// under the per-memory mutex).
unsafe impl Send for VirtualRegion {}
// SAFETY: as above.
unsafe impl Sync for VirtualRegion {}

impl VirtualRegion {
    /// Reserve `len` bytes of address space, committed nowhere.
    pub fn reserve(len: usize) -> io::Result<Self> {
        let len = round_up_to_page(len);
        let base = sys::reserve(len, page_size())?;
        Ok(Self { base, len })
    }

    /// Reserve with an alignment stricter than the page size.
    pub fn reserve_aligned(len: usize, align_log2: u32) -> io::Result<Self> {
        let align = 1usize << align_log2;
        assert!(align >= page_size(), "alignment below page granularity");
        let len = round_up_to_page(len);
        let base = sys::reserve(len, align)?;
        Ok(Self { base, len })
    }

    /// Base address of the reservation.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Length of the reservation in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the reservation is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_range(&self, offset: usize, len: usize) {
        assert!(
            offset % page_size() == 0 && len % page_size() == 0,
            "sub-range not page-aligned"
        );
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "sub-range escapes the reservation"
        );
    }

    /// Commit `len` bytes at `offset` with the given access. Both must be
    /// page-aligned.
    pub fn commit(&self, offset: usize, len: usize, access: Access) -> io::Result<()> {
        self.check_range(offset, len);
        // SAFETY: the range is inside this reservation, checked above.
        unsafe { sys::commit(self.base.as_ptr().add(offset), len, access) }
    }

    /// Change the protection of an already committed range.
    pub fn set_access(&self, offset: usize, len: usize, access: Access) -> io::Result<()> {
        self.check_range(offset, len);
        // SAFETY: as for commit.
        unsafe { sys::set_access(self.base.as_ptr().add(offset), len, access) }
    }

    /// Return a committed range to reserved-only state, discarding its
    /// contents.
    pub fn decommit(&self, offset: usize, len: usize) -> io::Result<()> {
        self.check_range(offset, len);
        // SAFETY: as for commit.
        unsafe { sys::decommit(self.base.as_ptr().add(offset), len) }
    }
}

impl Drop for VirtualRegion {
    fn drop(&mut self) {
        // SAFETY: base/len are exactly the mapping created in reserve.
        unsafe { sys::release(self.base.as_ptr(), self.len) };
    }
}

fn round_up_to_page(len: usize) -> usize {
    let page = page_size();
    len.checked_add(page - 1).expect("reservation length overflow") & !(page - 1)
}

#[cfg(unix)]
mod sys {
    use std::{
        io,
        ptr::NonNull,
    };

    use super::Access;

    pub(super) fn query_page_size() -> usize {
        // SAFETY: sysconf is always safe to call.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        usize::try_from(raw).expect("host reported a nonsensical page size")
    }

    fn prot(access: Access) -> libc::c_int {
        match access {
            Access::None => libc::PROT_NONE,
            Access::Read => libc::PROT_READ,
            Access::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }

    pub(super) fn reserve(len: usize, align: usize) -> io::Result<NonNull<u8>> {
        // Over-reserve to guarantee an aligned base, then trim both ends.
        let padded = len.checked_add(align).expect("reservation length overflow");
        // SAFETY: anonymous PROT_NONE mapping; no existing memory touched.
        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                padded,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let raw = raw as usize;
        let aligned = raw.checked_add(align - 1).expect("address overflow") & !(align - 1);
        let lead = aligned - raw;
        let tail = padded - lead - len;
        // SAFETY: trimming unused sub-ranges of the mapping just created.
        unsafe {
            if lead > 0 {
                libc::munmap(raw as *mut libc::c_void, lead);
            }
            if tail > 0 {
                libc::munmap((aligned + len) as *mut libc::c_void, tail);
            }
        }
        Ok(NonNull::new(aligned as *mut u8).expect("mmap returned the null page"))
    }

    pub(super) unsafe fn commit(base: *mut u8, len: usize, access: Access) -> io::Result<()> {
        // On POSIX the reservation is already backed by the PROT_NONE
        // mapping; committing is a protection change.
        set_access(base, len, access)
    }

    pub(super) unsafe fn set_access(
        base: *mut u8,
        len: usize,
        access: Access,
    ) -> io::Result<()> {
        if libc::mprotect(base as *mut libc::c_void, len, prot(access)) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(super) unsafe fn decommit(base: *mut u8, len: usize) -> io::Result<()> {
        // Replace with a fresh PROT_NONE mapping so the pages are both
        // inaccessible and returned to the kernel.
        let raw = libc::mmap(
            base as *mut libc::c_void,
            len,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANON | libc::MAP_FIXED,
            -1,
            0,
        );
        if raw == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(super) unsafe fn release(base: *mut u8, len: usize) {
        libc::munmap(base as *mut libc::c_void, len);
    }
}

#[cfg(not(unix))]
mod sys {
    //! Portable fallback: a leak-free approximation over the global
    //! allocator. No guard-page trapping; bounds rely on the explicit
    //! checks in the executor.

    use std::{
        alloc::{
            alloc_zeroed,
            dealloc,
            Layout,
        },
        io,
        ptr::NonNull,
    };

    use super::Access;

    /// Allocation alignment used for every reservation, so that release
    /// can reconstruct the layout from the length alone.
    const RESERVE_ALIGN: usize = 65536;

    pub(super) fn query_page_size() -> usize {
        RESERVE_ALIGN
    }

    pub(super) fn reserve(len: usize, align: usize) -> io::Result<NonNull<u8>> {
        if align > RESERVE_ALIGN {
            return Err(io::Error::from(io::ErrorKind::Unsupported));
        }
        let layout = Layout::from_size_align(len.max(1), RESERVE_ALIGN)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        // SAFETY: layout is non-zero-sized.
        let raw = unsafe { alloc_zeroed(layout) };
        NonNull::new(raw).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    pub(super) unsafe fn commit(_: *mut u8, _: usize, _: Access) -> io::Result<()> {
        Ok(())
    }

    pub(super) unsafe fn set_access(_: *mut u8, _: usize, _: Access) -> io::Result<()> {
        Ok(())
    }

    pub(super) unsafe fn decommit(base: *mut u8, len: usize) -> io::Result<()> {
        std::ptr::write_bytes(base, 0, len);
        Ok(())
    }

    pub(super) unsafe fn release(base: *mut u8, len: usize) {
        let layout = Layout::from_size_align_unchecked(len.max(1), RESERVE_ALIGN);
        dealloc(base, layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_a_power_of_two() {
        assert!(page_size().is_power_of_two());
        assert_eq!(1usize << page_size_log2(), page_size());
    }

    #[test]
    fn committed_pages_are_readable_and_writable() {
        let region = VirtualRegion::reserve(page_size() * 4).unwrap();
        region.commit(0, page_size(), Access::ReadWrite).unwrap();
        // SAFETY: the first page was just committed read-write.
        unsafe {
            region.base().as_ptr().write(0xa5);
            assert_eq!(region.base().as_ptr().read(), 0xa5);
        }
    }

    #[cfg(unix)]
    #[test]
    fn aligned_reservations_respect_the_alignment() {
        let align_log2 = page_size_log2() + 4;
        let region = VirtualRegion::reserve_aligned(page_size(), align_log2).unwrap();
        assert_eq!(region.base().as_ptr() as usize % (1 << align_log2), 0);
    }

    #[test]
    fn decommit_discards_contents() {
        let region = VirtualRegion::reserve(page_size()).unwrap();
        region.commit(0, page_size(), Access::ReadWrite).unwrap();
        // SAFETY: committed above.
        unsafe { region.base().as_ptr().write(7) };
        region.decommit(0, page_size()).unwrap();
        region.commit(0, page_size(), Access::ReadWrite).unwrap();
        // SAFETY: recommitted above.
        unsafe { assert_eq!(region.base().as_ptr().read(), 0) };
    }
}
