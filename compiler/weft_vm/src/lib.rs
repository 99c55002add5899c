//! Weft VM - matcher interpreter and parsing context.
//!
//! # Architecture
//!
//! - `exec/`: the interpreter. Runs one [`Program`](weft_bytecode::Program)
//!   against a [`ParseState`], with registers carved out of the state's
//!   integer and object stacks. Rule calls re-enter through the state.
//! - `state/`: [`ParseState`], the per-parse context. Owns the position,
//!   and wraps every rule call with the recursion guard, memoization and
//!   trace hooks.
//! - `memo/`: [`MemoMode`] and the memo table.
//! - `pool/`: [`ContextPool`], a free list of per-parse buffers.
//! - `trace.rs`: the [`TraceSink`] observer interface.
//!
//! # Concurrency
//!
//! Programs are immutable and shared. Everything mutable during a parse
//! lives in one [`ParseState`] and the [`Buffers`] it borrows, both owned
//! by the calling thread.

mod exec;
mod memo;
mod pool;
mod state;
mod trace;

pub use memo::{MemoMode, UnknownMemoMode};
pub use pool::{Buffers, ContextPool, PooledBuffers};
pub use state::{ParseState, ParseStats};
pub use trace::TraceSink;
