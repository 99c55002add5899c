//! Leaf rules: literals, character classes, regexes, numbers and the
//! zero-width primitives.
//!
//! None of these call other rules. Those that fail after consuming input
//! restore the entry position themselves, so every program honours the
//! "fail without consuming" half of the matching contract.

use regex::Regex;
use weft_bytecode::{Cond, IntSlot, Label, Native, Op, Slot};
use weft_ir::{GrammarError, NumberKind, Value};

use super::{char_code, RuleCx};
use crate::CompileError;

impl RuleCx {
    // ── Literal ─────────────────────────────────────────────────

    /// `text`, one character at a time; case-insensitive literals compare
    /// folded text instead.
    pub(super) fn literal(
        &mut self,
        text: &str,
        ignore_case: bool,
    ) -> Result<Option<Slot>, CompileError> {
        if text.is_empty() {
            return Err(GrammarError::EmptyLiteral {
                rule: self.name.clone(),
            }
            .into());
        }
        if ignore_case {
            return Ok(self.folded_literal(text));
        }

        let start = self.b.save_pos();
        let fail = self.b.new_label();
        let c = self.b.int_slot();
        for ch in text.chars() {
            self.b.emit(Op::PeekChar { dst: c });
            self.b.jump_if(Cond::Ne, c, char_code(ch), fail);
            self.b.emit(Op::Advance { chars: 1 });
        }
        let out = self.b.obj_slot();
        self.b.load_value(out, Value::str(text));
        self.b.ret(true);
        self.fail_tail(fail, Some(start));
        Ok(Some(Slot::Obj(out)))
    }

    fn folded_literal(&mut self, text: &str) -> Option<Slot> {
        let start = self.b.save_pos();
        let fail = self.b.new_label();
        let ok = self.b.new_label();

        let count = self.b.int_slot();
        self.b.emit(Op::LoadImm {
            dst: count,
            value: i64::try_from(text.chars().count()).unwrap_or(i64::MAX),
        });
        let got = self.b.obj_slot();
        self.b
            .invoke(Native::TakeChars, &[Slot::Int(count)], Some(Slot::Obj(got)), fail);
        let folded = self.b.obj_slot();
        self.b
            .invoke(Native::FoldCase, &[Slot::Obj(got)], Some(Slot::Obj(folded)), fail);
        let want = self.b.obj_slot();
        self.b.load_value(want, Value::str(text.to_lowercase()));
        self.b.emit(Op::JumpIfObjEq {
            a: folded,
            b: want,
            target: ok,
        });
        self.fail_tail(fail, Some(start));
        self.b.mark(ok);
        self.b.ret(true);
        Some(Slot::Obj(got))
    }

    // ── Character classes ───────────────────────────────────────

    pub(super) fn char_range(
        &mut self,
        ranges: &[(char, char)],
        negated: bool,
    ) -> Result<Option<Slot>, CompileError> {
        if ranges.is_empty() {
            return Err(self.empty_set());
        }
        if let Some(&(lo, hi)) = ranges.iter().find(|(lo, hi)| lo > hi) {
            return Err(GrammarError::InvalidCharRange {
                rule: self.name.clone(),
                lo,
                hi,
            }
            .into());
        }

        Ok(self.char_class(negated, |cx, c, hit| {
            for &(lo, hi) in ranges {
                let next = cx.b.new_label();
                cx.b.jump_if(Cond::Lt, c, char_code(lo), next);
                cx.b.jump_if(Cond::Le, c, char_code(hi), hit);
                cx.b.mark(next);
            }
        }))
    }

    pub(super) fn char_set(
        &mut self,
        chars: &[char],
        negated: bool,
    ) -> Result<Option<Slot>, CompileError> {
        if chars.is_empty() {
            return Err(self.empty_set());
        }
        Ok(self.char_class(negated, |cx, c, hit| {
            for &ch in chars {
                cx.b.jump_if(Cond::Eq, c, char_code(ch), hit);
            }
        }))
    }

    fn empty_set(&self) -> CompileError {
        GrammarError::EmptyCharSet {
            rule: self.name.clone(),
        }
        .into()
    }

    /// One character, tested by `tests` which jumps to `hit` on membership.
    /// End of input never matches, negated or not. The peeked character is
    /// the (unboxed) result.
    fn char_class(
        &mut self,
        negated: bool,
        tests: impl FnOnce(&mut Self, IntSlot, Label),
    ) -> Option<Slot> {
        let fail = self.b.new_label();
        let hit = self.b.new_label();
        let c = self.b.int_slot();
        self.b.emit(Op::PeekChar { dst: c });
        self.b.jump_if(Cond::Lt, c, 0, fail);
        tests(self, c, hit);
        if negated {
            self.b.emit(Op::Advance { chars: 1 });
            self.b.ret(true);
            self.b.mark(hit);
        } else {
            self.b.jump(fail);
            self.b.mark(hit);
            self.b.emit(Op::Advance { chars: 1 });
            self.b.ret(true);
        }
        self.fail_tail(fail, None);
        Some(Slot::Int(c))
    }

    // ── Regex and number ────────────────────────────────────────

    pub(super) fn regex(&mut self, pattern: &str) -> Result<Option<Slot>, CompileError> {
        let anchored = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
            GrammarError::InvalidRegex {
                rule: self.name.clone(),
                message: e.to_string(),
            }
        })?;
        let index = self.b.regex_const(anchored);
        Ok(self.native(Native::MatchRegex(index)))
    }

    pub(super) fn number(&mut self, kind: NumberKind) -> Option<Slot> {
        self.native(Native::ParseNumber(kind))
    }

    pub(super) fn user_object(&mut self) -> Option<Slot> {
        self.native(Native::UserObject)
    }

    /// A single argument-less native producing the rule's result.
    fn native(&mut self, native: Native) -> Option<Slot> {
        let fail = self.b.new_label();
        let out = self.result_slot();
        self.b.invoke(native, &[], out, fail);
        self.b.ret(true);
        self.fail_tail(fail, None);
        out
    }

    // ── Zero-width and layout primitives ────────────────────────

    /// Zero or more of space, tab, line feed, carriage return. Never fails.
    pub(super) fn whitespace(&mut self) -> Option<Slot> {
        let top = self.b.new_label();
        let skip = self.b.new_label();
        let c = self.b.int_slot();
        self.b.mark(top);
        self.b.emit(Op::PeekChar { dst: c });
        for ch in [' ', '\t', '\n', '\r'] {
            self.b.jump_if(Cond::Eq, c, char_code(ch), skip);
        }
        self.b.ret(true);
        self.b.mark(skip);
        self.b.emit(Op::Advance { chars: 1 });
        self.b.jump(top);
        None
    }

    /// `\r\n`, `\n`, `\r`, or end of input (which consumes nothing).
    pub(super) fn eol(&mut self) -> Option<Slot> {
        let ok = self.b.new_label();
        let lf = self.b.new_label();
        let cr = self.b.new_label();
        let c = self.b.int_slot();
        self.b.emit(Op::PeekChar { dst: c });
        self.b.jump_if(Cond::Lt, c, 0, ok);
        self.b.jump_if(Cond::Eq, c, char_code('\n'), lf);
        self.b.jump_if(Cond::Eq, c, char_code('\r'), cr);
        self.b.ret(false);

        self.b.mark(lf);
        self.b.emit(Op::Advance { chars: 1 });
        self.b.ret(true);

        self.b.mark(cr);
        self.b.emit(Op::Advance { chars: 1 });
        self.b.emit(Op::PeekChar { dst: c });
        self.b.jump_if(Cond::Ne, c, char_code('\n'), ok);
        self.b.emit(Op::Advance { chars: 1 });

        self.b.mark(ok);
        self.b.ret(true);
        None
    }

    pub(super) fn eoi(&mut self) -> Option<Slot> {
        let fail = self.b.new_label();
        let c = self.b.int_slot();
        self.b.emit(Op::PeekChar { dst: c });
        self.b.jump_if(Cond::Ge, c, 0, fail);
        self.b.ret(true);
        self.fail_tail(fail, None);
        None
    }

    /// The current byte offset, as an unboxed integer.
    pub(super) fn location(&mut self) -> Option<Slot> {
        let at = self.b.save_pos();
        self.b.ret(true);
        Some(Slot::Int(at))
    }
}
