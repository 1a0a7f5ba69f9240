//! Fixed-size object pools backed by chunked memory.
//!
//! Pools grow one chunk at a time up to an optional bound. Each object is
//! handed out as an [`MpoolObj`] guard that returns it to its pool on drop.

pub mod chunk;
pub mod mpool;

pub use chunk::{page_size, parse_alloc_methods, AllocMethod, Chunk, CACHE_LINE_SIZE, HUGE_PAGE_SIZE};
pub use mpool::{DefaultOps, MemPool, MpoolObj, MpoolOps, MpoolParams};
