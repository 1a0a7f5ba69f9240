//! Chunk memory for pools.
//!
//! A chunk is one contiguous region that a pool carves into objects. The
//! region comes from the first allocation method in a priority list that
//! succeeds: huge pages, then anonymous mappings, then the heap.

use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;
use std::str::FromStr;

use fabric_types::{Result, Status, StatusCode};
use serde::{Deserialize, Serialize};

pub const CACHE_LINE_SIZE: usize = 64;
pub const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Where chunk memory comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocMethod {
    /// Huge pages (`MAP_HUGETLB`). Linux only.
    Huge,
    /// Anonymous private mapping.
    Mmap,
    /// Global allocator.
    Heap,
}

impl fmt::Display for AllocMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocMethod::Huge => write!(f, "huge"),
            AllocMethod::Mmap => write!(f, "mmap"),
            AllocMethod::Heap => write!(f, "heap"),
        }
    }
}

impl FromStr for AllocMethod {
    type Err = Status;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huge" => Ok(AllocMethod::Huge),
            "mmap" => Ok(AllocMethod::Mmap),
            "heap" => Ok(AllocMethod::Heap),
            other => Err(Status::with_message(
                StatusCode::INVALID_ARG,
                format!("unknown allocation method '{}'", other),
            )),
        }
    }
}

/// Parse a comma separated priority list such as `"huge,mmap,heap"`.
pub fn parse_alloc_methods(list: &str) -> Result<Vec<AllocMethod>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// System page size.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

pub(crate) fn round_up(value: usize, granule: usize) -> usize {
    value.div_ceil(granule) * granule
}

/// An owned region of chunk memory.
pub struct Chunk {
    ptr: NonNull<u8>,
    len: usize,
    mapped_len: usize,
    align: usize,
    method: AllocMethod,
    key: Option<u64>,
}

// SAFETY: a chunk exclusively owns its region; the raw pointer is never
// shared outside the owning pool.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    /// Allocate `size` bytes aligned to `align`, trying `methods` in order.
    pub fn alloc(size: usize, align: usize, methods: &[AllocMethod]) -> Result<Chunk> {
        for &method in methods {
            match Self::alloc_with(size, align, method) {
                Ok(chunk) => return Ok(chunk),
                Err(err) => {
                    tracing::debug!(%method, size, "chunk allocation failed: {}", err);
                }
            }
        }
        Err(Status::with_message(
            StatusCode::NOT_ENOUGH_MEMORY,
            format!("failed to allocate a {} byte chunk with {:?}", size, methods),
        ))
    }

    /// Allocate with a single method.
    pub fn alloc_with(size: usize, align: usize, method: AllocMethod) -> Result<Chunk> {
        if size == 0 || !align.is_power_of_two() {
            return Err(Status::with_message(
                StatusCode::INVALID_ARG,
                format!("invalid chunk geometry: size={} align={}", size, align),
            ));
        }
        match method {
            AllocMethod::Huge => Self::alloc_huge(size, align),
            AllocMethod::Mmap => Self::alloc_mmap(size, align, page_size(), 0, AllocMethod::Mmap),
            AllocMethod::Heap => Self::alloc_heap(size, align),
        }
    }

    #[cfg(target_os = "linux")]
    fn alloc_huge(size: usize, align: usize) -> Result<Chunk> {
        Self::alloc_mmap(size, align, HUGE_PAGE_SIZE, libc::MAP_HUGETLB, AllocMethod::Huge)
    }

    #[cfg(not(target_os = "linux"))]
    fn alloc_huge(_size: usize, _align: usize) -> Result<Chunk> {
        Err(Status::with_message(
            StatusCode::NOT_IMPLEMENTED,
            "huge page chunks are only available on linux",
        ))
    }

    fn alloc_mmap(
        size: usize,
        align: usize,
        granule: usize,
        extra_flags: libc::c_int,
        method: AllocMethod,
    ) -> Result<Chunk> {
        if align > page_size() {
            return Err(Status::with_message(
                StatusCode::INVALID_ARG,
                format!("alignment {} exceeds page size", align),
            ));
        }
        let mapped_len = round_up(size, granule);
        // SAFETY: anonymous private mapping with no address hint; the result
        // is checked against MAP_FAILED before use.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | extra_flags,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error().into());
        }
        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| Status::with_message(StatusCode::OS_ERROR, "mmap returned null"))?;
        Ok(Chunk {
            ptr,
            len: size,
            mapped_len,
            align,
            method,
            key: None,
        })
    }

    fn alloc_heap(size: usize, align: usize) -> Result<Chunk> {
        let align = align.max(CACHE_LINE_SIZE);
        let layout = Layout::from_size_align(size, align)
            .map_err(|e| Status::with_message(StatusCode::INVALID_ARG, e.to_string()))?;
        // SAFETY: layout has a non-zero size (checked in alloc_with).
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| Status::new(StatusCode::NOT_ENOUGH_MEMORY))?;
        Ok(Chunk {
            ptr,
            len: size,
            mapped_len: size,
            align,
            method: AllocMethod::Heap,
            key: None,
        })
    }

    /// Start address of the usable region.
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Usable length in bytes (may be smaller than the underlying mapping).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn method(&self) -> AllocMethod {
        self.method
    }

    /// Memory registration key attached by the pool ops, if any.
    pub fn key(&self) -> Option<u64> {
        self.key
    }

    pub fn set_key(&mut self, key: Option<u64>) {
        self.key = key;
    }

    pub(crate) fn base_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .field("method", &self.method)
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        match self.method {
            AllocMethod::Heap => {
                // SAFETY: same size and alignment as the allocation in alloc_heap.
                unsafe {
                    let layout = Layout::from_size_align_unchecked(self.mapped_len, self.align);
                    std::alloc::dealloc(self.ptr.as_ptr(), layout);
                }
            }
            AllocMethod::Huge | AllocMethod::Mmap => {
                // SAFETY: ptr/mapped_len describe exactly the mapping created in alloc_mmap.
                let ret = unsafe {
                    libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.mapped_len)
                };
                if ret != 0 {
                    tracing::warn!(
                        "munmap of {} byte chunk failed: {}",
                        self.mapped_len,
                        std::io::Error::last_os_error()
                    );
                }
            }
        }
    }
}
