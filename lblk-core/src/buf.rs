// vim: tw=80
//! I/O buffers suitable for direct transfers to and from a device

use crate::{types::*, util::page_size};
use std::{
    alloc::{self, Layout},
    fmt,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice,
};
use tracing::trace;

/// A zero-initialised, aligned, uniquely owned byte buffer.
///
/// The memory is released when the `DmaBuf` is dropped, so every path out of
/// a verification run frees its buffers.
pub struct DmaBuf {
    ptr: NonNull<u8>,
    layout: Layout,
}

// Safe because DmaBuf uniquely owns its allocation, just like a Box<[u8]>.
unsafe impl Send for DmaBuf {}
unsafe impl Sync for DmaBuf {}

impl DmaBuf {
    /// Allocate a page-aligned buffer of `nbytes` bytes.
    pub fn alloc(nbytes: usize) -> Result<Self> {
        Self::alloc_aligned(nbytes, page_size())
    }

    /// Allocate a buffer of `nbytes` bytes, aligned to `align`.
    ///
    /// `align` must be a power of two.
    pub fn alloc_aligned(nbytes: usize, align: usize) -> Result<Self> {
        let e = Error::AllocationFailed{nbytes};
        if nbytes == 0 {
            return Err(e);
        }
        let layout = Layout::from_size_align(nbytes, align)
            .map_err(|_| e.clone())?;
        // Safe because the layout has a nonzero size
        let p = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(p).ok_or(e)?;
        trace!(nbytes, align, "buf_alloc");
        Ok(DmaBuf{ptr, layout})
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }
}

impl AsRef<[u8]> for DmaBuf {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl AsMut<[u8]> for DmaBuf {
    fn as_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl Deref for DmaBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // Safe because ptr was allocated with exactly this size, was fully
        // initialised by alloc_zeroed, and is uniquely owned by self.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for DmaBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        // Safe for the same reasons as in deref
        unsafe {
            slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size())
        }
    }
}

impl Drop for DmaBuf {
    fn drop(&mut self) {
        trace!(nbytes = self.layout.size(), "buf_free");
        // Safe because ptr came from alloc_zeroed with the same layout
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl fmt::Debug for DmaBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaBuf")
            .field("ptr", &self.ptr)
            .field("nbytes", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}

// LCOV_EXCL_STOP
