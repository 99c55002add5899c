//! Composite rules.
//!
//! Each compositor emits calls to its children's matchers and the control
//! flow around them. Atomicity comes from saving the entry position and
//! restoring it on every failure path; a failed child has already restored
//! its own position, so only progress made by earlier children needs
//! undoing.

use weft_bytecode::{Cond, Op, Slot};
use weft_ir::{Collect, GrammarError, Name, OutputType, Part, Rule, RuleId, Value};

use super::{Compiler, RuleCx};
use crate::CompileError;

impl Compiler<'_> {
    // ── Sequence ────────────────────────────────────────────────

    /// Children in order with optional separators between them. A typed
    /// sequence constructs its object first and writes each named part as
    /// it matches; any failure rolls back to the entry position.
    pub(super) fn sequence(
        &mut self,
        cx: &mut RuleCx,
        ty: Option<&Name>,
        parts: &[Part],
        separator: Option<RuleId>,
    ) -> Result<Option<Slot>, CompileError> {
        self.check_sequence(cx, ty, parts)?;

        let start = cx.b.save_pos();
        let fail = cx.b.new_label();
        let obj = ty.map(|ty| {
            let dst = cx.b.obj_slot();
            cx.b.emit(Op::Construct {
                dst,
                ty: ty.clone(),
            });
            dst
        });

        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                if let Some(sep) = separator {
                    self.call_void(cx, sep, None, fail)?;
                }
            }
            match (&part.name, obj) {
                (Some(field), Some(obj)) => {
                    let src = self.call_object(cx, part.rule, Some(field.clone()), fail)?;
                    cx.b.emit(Op::SetField {
                        obj,
                        field: field.clone(),
                        src,
                    });
                }
                _ => self.call_void(cx, part.rule, part.name.clone(), fail)?,
            }
        }

        cx.b.ret(true);
        cx.fail_tail(fail, Some(start));
        Ok(obj.map(Slot::Obj))
    }

    fn check_sequence(
        &self,
        cx: &RuleCx,
        ty: Option<&Name>,
        parts: &[Part],
    ) -> Result<(), GrammarError> {
        let slots = match ty {
            Some(ty) => {
                let slots = self.model.slots(ty).ok_or_else(|| GrammarError::UnknownType {
                    rule: cx.name.clone(),
                    ty: ty.to_string(),
                })?;
                if !self.model.is_concrete(ty) {
                    return Err(GrammarError::AbstractType {
                        rule: cx.name.clone(),
                        ty: ty.to_string(),
                    });
                }
                Some((ty, slots))
            }
            None => None,
        };

        for part in parts {
            let Some(field) = &part.name else { continue };
            let Some((ty, slots)) = slots else {
                return Err(GrammarError::UntypedNamedPart {
                    rule: cx.name.clone(),
                    slot: field.to_string(),
                });
            };
            if !slots.contains(field) {
                return Err(GrammarError::UnknownSlot {
                    rule: cx.name.clone(),
                    ty: ty.to_string(),
                    slot: field.to_string(),
                });
            }
            if self.output_of(part.rule).is_void() {
                return Err(GrammarError::VoidSlot {
                    rule: cx.name.clone(),
                    slot: field.to_string(),
                });
            }
        }
        Ok(())
    }

    // ── Alternative ─────────────────────────────────────────────

    /// Candidates in declaration order from the same position; the first
    /// success wins.
    pub(super) fn alternative(
        &mut self,
        cx: &mut RuleCx,
        base: Option<&Name>,
        candidates: &[RuleId],
    ) -> Result<Option<Slot>, CompileError> {
        if candidates.is_empty() {
            return Err(GrammarError::EmptyAlternative {
                rule: cx.name.clone(),
            }
            .into());
        }
        if let Some(base) = base {
            self.check_implementers(cx, base, candidates)?;
        }

        let result = cx.result_slot();
        let done = cx.b.new_label();
        for &candidate in candidates {
            let next = cx.b.new_label();
            self.call_into(cx, candidate, result, next)?;
            cx.b.jump(done);
            cx.b.mark(next);
        }
        cx.b.ret(false);
        cx.b.mark(done);
        cx.b.ret(true);
        Ok(result)
    }

    /// Every candidate must produce an object of a concrete type that
    /// implements `base`. A nested alternative over an implementing base
    /// is accepted as well; its own candidates were checked when it was
    /// compiled.
    fn check_implementers(
        &self,
        cx: &RuleCx,
        base: &Name,
        candidates: &[RuleId],
    ) -> Result<(), GrammarError> {
        if self.model.slots(base).is_none() {
            return Err(GrammarError::UnknownType {
                rule: cx.name.clone(),
                ty: base.to_string(),
            });
        }
        for &candidate in candidates {
            let nested = matches!(
                self.grammar.get(candidate).map(|def| &def.rule),
                Some(Rule::Alternative { base: Some(_), .. })
            );
            let accepted = match self.output_of(candidate) {
                OutputType::Object(ty) => {
                    self.model.implements(&ty, base) && (nested || self.model.is_concrete(&ty))
                }
                _ => false,
            };
            if !accepted {
                return Err(GrammarError::NotAnImplementer {
                    rule: cx.name.clone(),
                    candidate: self.display(candidate),
                    base: base.to_string(),
                });
            }
        }
        Ok(())
    }

    // ── Repeat ──────────────────────────────────────────────────

    /// `element ([separator] element)*` up to `max` times.
    ///
    /// A separator is only kept when an element follows it. An element that
    /// matches without consuming anything ends the loop and the repeat
    /// succeeds whatever `min` is, since the same empty match would recur.
    pub(super) fn repeat(
        &mut self,
        cx: &mut RuleCx,
        element: RuleId,
        separator: Option<RuleId>,
        min: u32,
        max: Option<u32>,
        collect: Collect,
    ) -> Result<Option<Slot>, CompileError> {
        if let Some(max) = max.filter(|&max| max < min) {
            return Err(GrammarError::InvalidRepeatBounds {
                rule: cx.name.clone(),
                min,
                max,
            }
            .into());
        }
        let element_ty = self.output_of(element);
        if collect == Collect::Text
            && !matches!(element_ty, OutputType::Text | OutputType::Char)
        {
            return Err(GrammarError::TextRepeatElement {
                rule: cx.name.clone(),
                found: element_ty.to_string(),
            }
            .into());
        }

        let start = cx.b.save_pos();
        let fail = cx.b.new_label();
        let top = cx.b.new_label();
        let first = cx.b.new_label();
        let rollback = cx.b.new_label();
        let done = cx.b.new_label();
        let accept = cx.b.new_label();

        let count = cx.b.int_slot();
        cx.b.emit(Op::LoadImm {
            dst: count,
            value: 0,
        });
        let acc = match collect {
            Collect::Text => {
                let dst = cx.b.obj_slot();
                cx.b.emit(Op::TextNew { dst });
                Some(dst)
            }
            Collect::List if element_ty.is_void() => None,
            Collect::List => {
                let dst = cx.b.obj_slot();
                cx.b.emit(Op::ListNew { dst });
                Some(dst)
            }
        };

        cx.b.mark(top);
        if let Some(max) = max {
            cx.b.jump_if(Cond::Ge, count, i64::from(max), done);
        }
        let iter = cx.b.save_pos();
        if let Some(sep) = separator {
            cx.b.jump_if(Cond::Eq, count, 0, first);
            self.call_void(cx, sep, None, done)?;
        }
        cx.b.mark(first);

        match (collect, acc) {
            (Collect::Text, Some(text)) => match self.call_natural(cx, element, None, rollback)? {
                Some(Slot::Int(item)) => cx.b.emit(Op::TextPushChar { text, item }),
                Some(Slot::Obj(item)) => cx.b.emit(Op::TextPush { text, item }),
                None => {}
            },
            (_, Some(list)) => {
                let item = self.call_object(cx, element, None, rollback)?;
                cx.b.emit(Op::ListPush { list, item });
            }
            (_, None) => self.call_void(cx, element, None, rollback)?,
        }
        cx.b.emit(Op::AddImm {
            dst: count,
            value: 1,
        });
        let after = cx.b.save_pos();
        cx.b.jump_if_slot(Cond::Eq, after, iter, accept);
        cx.b.jump(top);

        cx.b.mark(rollback);
        cx.b.restore_pos(iter);
        cx.b.mark(done);
        if min > 0 {
            cx.b.jump_if(Cond::Lt, count, i64::from(min), fail);
        }
        cx.b.mark(accept);
        cx.b.ret(true);
        cx.fail_tail(fail, Some(start));
        Ok(acc.map(Slot::Obj))
    }

    // ── Optional ────────────────────────────────────────────────

    /// Child or its default. Never fails.
    pub(super) fn optional(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
    ) -> Result<Option<Slot>, CompileError> {
        let result = cx.result_slot();
        let absent = cx.b.new_label();
        let done = cx.b.new_label();
        self.call_into(cx, child, result, absent)?;
        cx.b.jump(done);

        cx.b.mark(absent);
        if let Some(Slot::Obj(dst)) = result {
            match cx.output {
                OutputType::Text => cx.b.load_value(dst, Value::str("")),
                OutputType::List => cx.b.emit(Op::ListNew { dst }),
                _ => cx.b.load_value(dst, Value::Null),
            }
        }
        cx.b.mark(done);
        cx.b.ret(true);
        Ok(result)
    }

    // ── Zero-width assertions ───────────────────────────────────

    pub(super) fn look_ahead(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
    ) -> Result<Option<Slot>, CompileError> {
        let start = cx.b.save_pos();
        let fail = cx.b.new_label();
        self.call_void(cx, child, None, fail)?;
        cx.b.restore_pos(start);
        cx.b.ret(true);
        cx.fail_tail(fail, None);
        Ok(None)
    }

    pub(super) fn not(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
    ) -> Result<Option<Slot>, CompileError> {
        let start = cx.b.save_pos();
        let ok = cx.b.new_label();
        self.call_void(cx, child, None, ok)?;
        cx.b.restore_pos(start);
        cx.b.ret(false);
        cx.b.mark(ok);
        cx.b.ret(true);
        Ok(None)
    }

    // ── Surround and capture ────────────────────────────────────

    /// `prefix inner suffix`; without a suffix the prefix closes as well.
    pub(super) fn surround(
        &mut self,
        cx: &mut RuleCx,
        prefix: RuleId,
        inner: RuleId,
        suffix: Option<RuleId>,
    ) -> Result<Option<Slot>, CompileError> {
        let start = cx.b.save_pos();
        let fail = cx.b.new_label();
        let result = cx.result_slot();
        self.call_void(cx, prefix, None, fail)?;
        self.call_into(cx, inner, result, fail)?;
        self.call_void(cx, suffix.unwrap_or(prefix), None, fail)?;
        cx.b.ret(true);
        cx.fail_tail(fail, Some(start));
        Ok(result)
    }

    /// The exact text consumed by `child`.
    pub(super) fn capture(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
    ) -> Result<Option<Slot>, CompileError> {
        let start = cx.b.save_pos();
        let fail = cx.b.new_label();
        self.call_void(cx, child, None, fail)?;
        let out = cx.b.obj_slot();
        cx.b.emit(Op::Slice { dst: out, start });
        cx.b.ret(true);
        cx.fail_tail(fail, None);
        Ok(Some(Slot::Obj(out)))
    }
}
