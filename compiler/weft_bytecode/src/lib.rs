//! Weft matcher IR.
//!
//! Every grammar rule is compiled into a [`Program`]: a flat list of
//! [`Op`]s over two banks of frame-local registers, integer slots and
//! object slots, with jumps addressed by [`Label`].
//!
//! - **Integer slots** ([`IntSlot`]) hold positions, counters, peeked
//!   characters and unboxed scalar results (`Char`, `Int`).
//! - **Object slots** ([`ObjSlot`]) hold [`Value`](weft_ir::Value)s.
//!   Scalars cross into this bank only through an explicit [`Op::Box`].
//!
//! A program calls other rules through [`Op::Call`], which names a
//! [`Matcher`]: a handle that may be created before its program exists.
//! That is how cyclic grammars compile. The cache hands out the handle of
//! a rule still being compiled and fills it once the body is done.
//!
//! Programs are immutable once built and carry no per-parse state, so one
//! program is shared by every concurrent parse.

mod builder;
mod matcher;
mod op;
mod program;

pub use builder::ProgramBuilder;
pub use matcher::Matcher;
pub use op::{CalleeIdx, Cond, ConstIdx, IntSlot, Label, Native, ObjSlot, Op, Operand, ScalarKind, Slot};
pub use program::{Const, Program, RecursionCheck, Ret};
