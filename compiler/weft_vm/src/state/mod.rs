//! The parsing context.
//!
//! [`ParseState`] is the single mutable object of a parse. Programs read
//! and move the position through it, and every rule call goes through
//! [`ParseState::call`], which applies, in order:
//!
//! 1. the left-recursion guard: re-entering a guarded rule at the position
//!    it is already active at fails without running it;
//! 2. memoization of concrete rules;
//! 3. the trace sink's `push`;
//! 4. the callee's program, on a fresh register frame;
//! 5. position rollback on failure, `pop`, and recording the outcome.
//!
//! # Recursion mask
//!
//! Active guarded rules only matter at the position they were entered at,
//! and positions never decrease down the call stack. The mask therefore
//! tracks just the innermost position: entering a guarded rule at a new
//! position starts a fresh mask, and leaving restores the previous one.

use std::ops::Range;

use tracing::trace;
use weft_bytecode::{Matcher, Program, RecursionCheck, Ret};
use weft_ir::{EngineFault, ObjectModel, RuleId, Value};
use weft_stack::ensure_sufficient_stack;

use crate::exec;
use crate::memo::{MemoEntry, MemoKey, MemoMode};
use crate::{Buffers, TraceSink};

/// Counters collected over one parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Rule calls, including those answered from the memo table.
    pub calls: u64,
    pub memo_hits: u64,
    /// Calls refused by the left-recursion guard.
    pub recursion_cuts: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Guard {
    mask: u64,
    position: usize,
}

/// Per-parse context: input, position, guard, memo and trace hooks.
pub struct ParseState<'p> {
    text: &'p str,
    pos: usize,
    model: &'p dyn ObjectModel,
    user: Value,
    trace: Option<&'p mut dyn TraceSink>,
    memo_mode: MemoMode,
    pub(crate) buf: &'p mut Buffers,
    guard: Guard,
    furthest: usize,
    stats: ParseStats,
}

impl<'p> ParseState<'p> {
    /// A context at the start of `text`. `buf` is cleared first.
    pub fn new(text: &'p str, model: &'p dyn ObjectModel, buf: &'p mut Buffers) -> Self {
        buf.reset();
        Self {
            text,
            pos: 0,
            model,
            user: Value::Null,
            trace: None,
            memo_mode: MemoMode::default(),
            buf,
            guard: Guard::default(),
            furthest: 0,
            stats: ParseStats::default(),
        }
    }

    #[must_use]
    pub fn with_memo(mut self, mode: MemoMode) -> Self {
        self.memo_mode = mode;
        self
    }

    #[must_use]
    pub fn with_trace(mut self, sink: &'p mut dyn TraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    /// The value produced by `UserObject` rules.
    #[must_use]
    pub fn with_user(mut self, user: Value) -> Self {
        self.user = user;
        self
    }

    #[inline]
    pub fn text(&self) -> &'p str {
        self.text
    }

    /// Current byte offset.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Furthest byte offset any matcher examined.
    #[inline]
    pub fn furthest(&self) -> usize {
        self.furthest
    }

    #[inline]
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    #[inline]
    pub fn memo_mode(&self) -> MemoMode {
        self.memo_mode
    }

    /// Match `matcher` at the current position.
    ///
    /// `Some` on success, with the boxed result (`Null` for rules that
    /// produce nothing); `None` on failure, with the position unchanged.
    pub fn match_rule(&mut self, matcher: &Matcher) -> Result<Option<Value>, EngineFault> {
        let output = matcher.program()?.output().clone();
        Ok(self
            .call(matcher, None)?
            .map(|ret| ret.into_value(&output).unwrap_or(Value::Null)))
    }

    /// Run one rule call with guard, memo and trace handling.
    pub(crate) fn call(
        &mut self,
        matcher: &Matcher,
        name: Option<&str>,
    ) -> Result<Option<Ret>, EngineFault> {
        let program = matcher.program()?;
        let rule = program.rule();
        let check = program.recursion();
        let start = self.pos;
        self.stats.calls += 1;

        if self.is_reentry(check, rule, start) {
            self.stats.recursion_cuts += 1;
            trace!(rule = program.name(), pos = start, "left recursion cut");
            return Ok(None);
        }

        let key = self.memo_key(program, start);
        let hit = key.and_then(|key| self.buf.memo.get(&key).cloned());
        if let Some(hit) = hit {
            self.stats.memo_hits += 1;
            trace!(rule = program.name(), pos = start, "memo hit");
            return Ok(match hit {
                MemoEntry::Success { end, ret } => {
                    self.pos = end;
                    Some(ret)
                }
                MemoEntry::Failure => None,
            });
        }

        let traced = program.is_traced();
        if traced {
            if let Some(sink) = self.trace.as_deref_mut() {
                sink.push(rule, name);
            }
        }

        let saved = self.enter(check, rule, start);
        let outcome = ensure_sufficient_stack(|| exec::run(program, self));
        self.leave(check, saved);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(fault) => {
                // Close the frame so the sink stays balanced.
                if traced {
                    self.report_pop(program, None, start..start);
                }
                return Err(fault);
            }
        };
        if outcome.is_none() {
            self.pos = start;
        }

        if traced {
            self.report_pop(program, outcome.as_ref(), start..self.pos);
        }
        if let Some(key) = key {
            let entry = match &outcome {
                Some(ret) => MemoEntry::Success {
                    end: self.pos,
                    ret: ret.clone(),
                },
                None => MemoEntry::Failure,
            };
            self.buf.memo.record(key, entry);
        }
        Ok(outcome)
    }

    fn report_pop(&mut self, program: &Program, outcome: Option<&Ret>, span: Range<usize>) {
        let Some(sink) = self.trace.as_deref_mut() else {
            return;
        };
        let value = outcome.and_then(|ret| ret.clone().into_value(program.output()));
        sink.pop(program.rule(), outcome.is_some(), value.as_ref(), span);
    }

    // ── Recursion guard ─────────────────────────────────────────

    fn is_reentry(&self, check: RecursionCheck, rule: RuleId, pos: usize) -> bool {
        match check {
            RecursionCheck::None => false,
            RecursionCheck::Bit(bit) => {
                self.guard.position == pos && self.guard.mask & bit_mask(bit) != 0
            }
            RecursionCheck::Walk => self
                .buf
                .walk
                .iter()
                .rev()
                .take_while(|(_, at)| *at == pos)
                .any(|(active, _)| *active == rule),
        }
    }

    fn enter(&mut self, check: RecursionCheck, rule: RuleId, pos: usize) -> Guard {
        let saved = self.guard;
        match check {
            RecursionCheck::None => {}
            RecursionCheck::Bit(bit) => {
                if self.guard.position != pos {
                    self.guard = Guard {
                        mask: 0,
                        position: pos,
                    };
                }
                self.guard.mask |= bit_mask(bit);
            }
            RecursionCheck::Walk => self.buf.walk.push((rule, pos)),
        }
        saved
    }

    fn leave(&mut self, check: RecursionCheck, saved: Guard) {
        self.guard = saved;
        if check == RecursionCheck::Walk {
            self.buf.walk.pop();
        }
    }

    fn memo_key(&self, program: &Program, pos: usize) -> Option<MemoKey> {
        if !program.is_concrete() {
            return None;
        }
        let mask = match self.memo_mode {
            MemoMode::Off => return None,
            MemoMode::Aggressive => 0,
            MemoMode::Precise if self.guard.position == pos => self.guard.mask,
            MemoMode::Precise => 0,
        };
        Some(MemoKey {
            rule: program.rule(),
            pos,
            mask,
        })
    }

    // ── Cursor ──────────────────────────────────────────────────

    /// Input from the current position on.
    #[inline]
    pub(crate) fn rest(&self) -> &'p str {
        self.text.get(self.pos..).unwrap_or_default()
    }

    /// The next character, without consuming it.
    pub(crate) fn peek(&mut self) -> Option<char> {
        self.furthest = self.furthest.max(self.pos);
        self.rest().chars().next()
    }

    /// Consume up to `chars` characters.
    pub(crate) fn advance_chars(&mut self, chars: u32) {
        let rest = self.rest();
        let bytes: usize = rest
            .chars()
            .take(usize::try_from(chars).unwrap_or(usize::MAX))
            .map(char::len_utf8)
            .sum();
        self.advance_bytes(bytes);
    }

    /// Consume `bytes` bytes. Callers pass lengths of matched text, so the
    /// new position stays on a character boundary.
    pub(crate) fn advance_bytes(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.text.len());
        self.furthest = self.furthest.max(self.pos);
    }

    /// Move to `pos` if it is a character boundary of the input.
    pub(crate) fn seek(&mut self, pos: usize) -> bool {
        let ok = self.text.is_char_boundary(pos);
        if ok {
            self.pos = pos;
        }
        ok
    }

    #[inline]
    pub(crate) fn model(&self) -> &'p dyn ObjectModel {
        self.model
    }

    #[inline]
    pub(crate) fn user(&self) -> &Value {
        &self.user
    }
}

#[inline]
fn bit_mask(bit: u8) -> u64 {
    1u64.checked_shl(u32::from(bit)).unwrap_or(0)
}
