//! Weft rule compiler and rule cache.
//!
//! # Entry Points
//!
//! - [`RuleCache::get`]: the matcher for a rule, compiling it and every
//!   rule it reaches on first request. This is what the engine uses.
//! - [`Compiler::compile`]: one rule to one [`Program`](weft_bytecode::Program),
//!   with callees supplied by a [`Resolve`] implementation.
//!
//! # Architecture
//!
//! - `compiler/primitives.rs`: literals, character classes, regexes,
//!   numbers and the zero-width primitives.
//! - `compiler/compositors.rs`: sequence, alternative, repeat, optional,
//!   look-ahead, not, surround and capture, each expressed as calls to
//!   child matchers.
//! - `cache/`: the identity-keyed cache with placeholders for cycles and
//!   recursion-guard assignment.

mod cache;
mod compiler;

use thiserror::Error;
use weft_ir::{EngineFault, GrammarError};

pub use cache::{RuleCache, GUARD_BITS};
pub use compiler::{Compiler, Resolve};

/// Why a rule could not be compiled.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Fault(#[from] EngineFault),
}
