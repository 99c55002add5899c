//! Reusable per-parse buffers.
//!
//! A parse needs two register stacks, a memo table and the frame-walk
//! stack. [`ContextPool`] keeps a bounded free list of them so concurrent
//! and repeated parses do not reallocate. A checked-out [`PooledBuffers`]
//! is owned by exactly one parse and goes back to the list when dropped.

use std::mem;
use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use weft_ir::{RuleId, Value};

use crate::memo::MemoTable;

/// Mutable storage of one parse.
#[derive(Debug, Default)]
pub struct Buffers {
    pub(crate) ints: Vec<i64>,
    pub(crate) objs: Vec<Value>,
    pub(crate) memo: MemoTable,
    /// Active frame-walk-guarded rules with their entry positions.
    pub(crate) walk: Vec<(RuleId, usize)>,
}

impl Buffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized outcomes currently held.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    pub(crate) fn reset(&mut self) {
        self.ints.clear();
        self.objs.clear();
        self.memo.clear();
        self.walk.clear();
    }
}

/// Lock-protected free list of [`Buffers`].
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<Buffers>>,
    capacity: usize,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextPool {
    /// Idle buffers kept unless configured otherwise.
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// A pool that keeps at most `capacity` idle buffers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Take buffers from the free list, or allocate fresh ones.
    pub fn acquire(&self) -> PooledBuffers<'_> {
        let buffers = self.free.lock().pop().unwrap_or_default();
        PooledBuffers {
            pool: self,
            buffers,
        }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut buffers: Buffers) {
        buffers.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(buffers);
        }
    }
}

/// Buffers checked out of a [`ContextPool`].
#[derive(Debug)]
pub struct PooledBuffers<'a> {
    pool: &'a ContextPool,
    buffers: Buffers,
}

impl Deref for PooledBuffers<'_> {
    type Target = Buffers;

    fn deref(&self) -> &Buffers {
        &self.buffers
    }
}

impl DerefMut for PooledBuffers<'_> {
    fn deref_mut(&mut self) -> &mut Buffers {
        &mut self.buffers
    }
}

impl Drop for PooledBuffers<'_> {
    fn drop(&mut self) {
        self.pool.release(mem::take(&mut self.buffers));
    }
}
