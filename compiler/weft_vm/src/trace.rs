//! Parse observers.

use std::ops::Range;

use weft_ir::{RuleId, Value};

/// Observer of rule entry and exit.
///
/// Calls are synchronous and strictly nested: every `push` is matched by
/// exactly one `pop`, innermost first. Rules flagged
/// [`TRACE_IGNORED`](weft_ir::RuleFlags::TRACE_IGNORED) are not reported,
/// and neither are memo hits or recursion cuts, which never enter the
/// rule. Without a sink the engine makes no trace calls at all.
pub trait TraceSink {
    /// A rule starts matching. `name` is the slot the caller writes the
    /// result to, when there is one.
    fn push(&mut self, rule: RuleId, name: Option<&str>);

    /// The most recently pushed rule finished. `span` is the input it
    /// consumed (empty on failure); `value` is its boxed result.
    fn pop(&mut self, rule: RuleId, success: bool, value: Option<&Value>, span: Range<usize>);
}
