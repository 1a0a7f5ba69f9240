use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use fabric_types::{MpoolCode, Result, Status, StatusCode};
use parking_lot::Mutex;

use crate::chunk::{page_size, round_up, AllocMethod, Chunk, CACHE_LINE_SIZE};

/// Geometry of a memory pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpoolParams {
    pub name: String,
    /// Bytes per object.
    pub elem_size: usize,
    /// Offset inside each object that must land on an `alignment` boundary.
    pub align_offset: usize,
    pub alignment: usize,
    /// Objects added per growth step.
    pub elems_per_chunk: usize,
    /// Upper bound on the total number of objects; `None` is unbounded.
    pub max_elems: Option<usize>,
}

impl MpoolParams {
    pub fn new(name: impl Into<String>, elem_size: usize) -> Self {
        Self {
            name: name.into(),
            elem_size,
            align_offset: 0,
            alignment: CACHE_LINE_SIZE,
            elems_per_chunk: 128,
            max_elems: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(Status::with_message(
                MpoolCode::INVALID_PARAMS,
                format!("mpool '{}': {}", self.name, reason),
            ))
        };
        if self.elem_size == 0 {
            return fail("element size must be positive".into());
        }
        if self.align_offset > self.elem_size {
            return fail(format!(
                "align offset {} exceeds element size {}",
                self.align_offset, self.elem_size
            ));
        }
        if !self.alignment.is_power_of_two() || self.alignment > page_size() {
            return fail(format!("bad alignment {}", self.alignment));
        }
        if self.elems_per_chunk == 0 {
            return fail("elements per chunk must be positive".into());
        }
        if let Some(max) = self.max_elems {
            if max < self.elems_per_chunk {
                return fail(format!(
                    "max elements {} smaller than grow step {}",
                    max, self.elems_per_chunk
                ));
            }
        }
        Ok(())
    }

    /// Distance between consecutive objects in a chunk.
    pub fn stride(&self) -> usize {
        round_up(self.elem_size, self.alignment)
    }

    /// Leading pad so that `base + pad + align_offset` is aligned, given an
    /// aligned chunk base.
    pub fn head_pad(&self) -> usize {
        (self.alignment - self.align_offset % self.alignment) % self.alignment
    }
}

/// Hooks a pool calls while growing and shrinking.
pub trait MpoolOps: Send + Sync {
    fn chunk_alloc(&self, size: usize, align: usize) -> Result<Chunk> {
        Chunk::alloc(size, align, &[AllocMethod::Huge, AllocMethod::Heap])
    }

    fn chunk_release(&self, _chunk: &mut Chunk) {}

    /// Called once for every object carved from a fresh chunk.
    fn obj_init(&self, _chunk: &Chunk, _obj: &mut [u8]) {}

    fn obj_cleanup(&self, _obj: &mut [u8]) {}
}

/// Ops with every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultOps;

impl MpoolOps for DefaultOps {}

#[derive(Clone, Copy)]
struct ObjPtr(NonNull<u8>);

// SAFETY: an ObjPtr is owned either by the free queue or by exactly one MpoolObj.
unsafe impl Send for ObjPtr {}
unsafe impl Sync for ObjPtr {}

struct MpoolInner {
    params: MpoolParams,
    ops: Arc<dyn MpoolOps>,
    free: SegQueue<ObjPtr>,
    chunks: Mutex<Vec<Chunk>>,
    num_elems: AtomicUsize,
}

impl MpoolInner {
    fn grow(&self) -> Result<()> {
        let mut chunks = self.chunks.lock();
        if !self.free.is_empty() {
            return Ok(());
        }

        let total = self.num_elems.load(Ordering::Acquire);
        let count = match self.params.max_elems {
            Some(max) if total >= max => {
                return Err(Status::with_message(
                    MpoolCode::EXHAUSTED,
                    format!("mpool '{}' reached {} objects", self.params.name, max),
                ));
            }
            Some(max) => self.params.elems_per_chunk.min(max - total),
            None => self.params.elems_per_chunk,
        };

        let pad = self.params.head_pad();
        let stride = self.params.stride();
        let size = pad + count * stride;
        let mut chunk = self
            .ops
            .chunk_alloc(size, self.params.alignment)
            .map_err(|e| {
                Status::with_message(
                    MpoolCode::CHUNK_ALLOC_FAILED,
                    format!("mpool '{}': {}", self.params.name, e),
                )
            })?;
        if chunk.len() < size || chunk.addr() % self.params.alignment != 0 {
            let msg = format!(
                "mpool '{}': chunk {:?} does not fit {} bytes aligned to {}",
                self.params.name, chunk, size, self.params.alignment
            );
            self.ops.chunk_release(&mut chunk);
            return Err(Status::with_message(StatusCode::FOUND_BUG, msg));
        }

        let base = chunk.base_ptr().as_ptr();
        for i in 0..count {
            // SAFETY: pad + i * stride + elem_size <= size <= chunk.len().
            let ptr = unsafe { base.add(pad + i * stride) };
            let obj = unsafe { std::slice::from_raw_parts_mut(ptr, self.params.elem_size) };
            self.ops.obj_init(&chunk, obj);
            // SAFETY: derived from a non-null chunk base.
            self.free.push(ObjPtr(unsafe { NonNull::new_unchecked(ptr) }));
        }
        self.num_elems.fetch_add(count, Ordering::AcqRel);
        tracing::trace!(
            pool = %self.params.name,
            count,
            size,
            method = %chunk.method(),
            "mpool grew by one chunk"
        );
        chunks.push(chunk);
        Ok(())
    }
}

impl Drop for MpoolInner {
    fn drop(&mut self) {
        while let Some(ObjPtr(ptr)) = self.free.pop() {
            // SAFETY: no guards remain, so every object is back in the queue
            // and its chunk is still alive.
            let obj = unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.params.elem_size) };
            self.ops.obj_cleanup(obj);
        }
        for mut chunk in self.chunks.get_mut().drain(..) {
            self.ops.chunk_release(&mut chunk);
        }
    }
}

/// A pool of fixed-size objects carved from lazily allocated chunks.
pub struct MemPool {
    inner: Arc<MpoolInner>,
}

impl MemPool {
    pub fn new(params: MpoolParams, ops: Arc<dyn MpoolOps>) -> Result<Self> {
        params.validate()?;
        tracing::debug!(
            pool = %params.name,
            elem_size = params.elem_size,
            align_offset = params.align_offset,
            grow = params.elems_per_chunk,
            max = ?params.max_elems,
            "mpool created"
        );
        Ok(Self {
            inner: Arc::new(MpoolInner {
                params,
                ops,
                free: SegQueue::new(),
                chunks: Mutex::new(Vec::new()),
                num_elems: AtomicUsize::new(0),
            }),
        })
    }

    /// Take an object, growing the pool by one chunk if needed.
    pub fn get(&self) -> Result<MpoolObj> {
        loop {
            if let Some(ptr) = self.inner.free.pop() {
                return Ok(MpoolObj {
                    ptr,
                    pool: Arc::clone(&self.inner),
                });
            }
            self.inner.grow()?;
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.params.name
    }

    pub fn params(&self) -> &MpoolParams {
        &self.inner.params
    }

    pub fn num_elems(&self) -> usize {
        self.inner.num_elems.load(Ordering::Acquire)
    }

    pub fn num_free(&self) -> usize {
        self.inner.free.len()
    }

    pub fn num_chunks(&self) -> usize {
        self.inner.chunks.lock().len()
    }

    /// Objects currently held by callers.
    pub fn in_use(&self) -> usize {
        self.num_elems().saturating_sub(self.num_free())
    }

    /// Destroy the pool. Memory is released once the last outstanding object
    /// is returned.
    pub fn cleanup(self, leak_check: bool) {
        let outstanding = self.in_use();
        if leak_check && outstanding > 0 {
            tracing::warn!(
                pool = %self.name(),
                outstanding,
                "mpool destroyed with objects still in use"
            );
        }
        tracing::debug!(pool = %self.name(), chunks = self.num_chunks(), "mpool destroyed");
    }
}

impl std::fmt::Debug for MemPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemPool")
            .field("name", &self.name())
            .field("elems", &self.num_elems())
            .field("free", &self.num_free())
            .finish()
    }
}

/// An object taken from a [`MemPool`]. Returns to its pool on drop.
pub struct MpoolObj {
    ptr: ObjPtr,
    pool: Arc<MpoolInner>,
}

impl MpoolObj {
    pub fn addr(&self) -> usize {
        self.ptr.0.as_ptr() as usize
    }

    pub fn pool_name(&self) -> &str {
        &self.pool.params.name
    }
}

impl Deref for MpoolObj {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the object spans elem_size bytes and is owned by this guard.
        unsafe { std::slice::from_raw_parts(self.ptr.0.as_ptr(), self.pool.params.elem_size) }
    }
}

impl DerefMut for MpoolObj {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.0.as_ptr(), self.pool.params.elem_size) }
    }
}

impl Drop for MpoolObj {
    fn drop(&mut self) {
        self.pool.free.push(self.ptr);
    }
}

impl std::fmt::Debug for MpoolObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpoolObj")
            .field("pool", &self.pool_name())
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish()
    }
}
