//! Rule → program compilation.
//!
//! One [`Compiler::compile`] call emits the program of one rule. Children
//! are never inlined: every child is reached through an [`Op::Call`] to its
//! own matcher, obtained from the [`Resolve`] implementation. That keeps
//! rule identity (and with it memoization and recursion guarding) intact,
//! and lets a cycle compile against an unfilled handle.
//!
//! # Slot conventions
//!
//! A rule's result lives in an integer slot when its output type is a
//! scalar and in an object slot otherwise. Calls write the callee's result
//! into a slot of the callee's own bank; when the caller needs an object
//! (a sequence field, a list element, a widened alternative) it boxes the
//! integer explicitly with [`Op::Box`].

mod compositors;
mod primitives;

use std::sync::Arc;

use weft_bytecode::{IntSlot, Label, Matcher, ObjSlot, Op, Program, ProgramBuilder, ScalarKind, Slot};
use weft_ir::{
    EngineFault, Grammar, GrammarError, Name, ObjectModel, OutputType, Rule, RuleFlags, RuleId,
    Value,
};

use crate::CompileError;

/// Supplies the matcher of a callee.
///
/// The returned handle may still be unfilled when the callee is part of a
/// cycle that is being compiled.
pub trait Resolve {
    fn resolve(&mut self, rule: RuleId) -> Result<Arc<Matcher>, CompileError>;
}

/// Compiles rules of one grammar against one object model.
pub struct Compiler<'a> {
    grammar: &'a Grammar,
    model: &'a dyn ObjectModel,
    resolver: &'a mut dyn Resolve,
}

impl<'a> Compiler<'a> {
    pub fn new(
        grammar: &'a Grammar,
        model: &'a dyn ObjectModel,
        resolver: &'a mut dyn Resolve,
    ) -> Self {
        Self {
            grammar,
            model,
            resolver,
        }
    }

    /// Compile the program of `rule`.
    ///
    /// Semantic checks that need the object model (types, slots,
    /// implementers) run here, so a malformed rule is reported the first
    /// time it is compiled.
    pub fn compile(&mut self, rule: RuleId) -> Result<Program, CompileError> {
        let grammar = self.grammar;
        let name = grammar.display_name(rule);
        let def = grammar.get(rule).ok_or_else(|| GrammarError::UnknownRule {
            rule: name.clone(),
            target: rule,
        })?;
        let output = self.output_of(rule);

        let mut cx = RuleCx {
            b: ProgramBuilder::new(rule, name.clone()),
            name,
            output: output.clone(),
        };
        let result = match &def.rule {
            Rule::Literal { text, ignore_case } => cx.literal(text, *ignore_case)?,
            Rule::CharRange { ranges, negated } => cx.char_range(ranges, *negated)?,
            Rule::CharSet { chars, negated } => cx.char_set(chars, *negated)?,
            Rule::Regex(pattern) => cx.regex(pattern)?,
            Rule::Number(kind) => cx.number(*kind),
            Rule::Whitespace => cx.whitespace(),
            Rule::Eol => cx.eol(),
            Rule::Eoi => cx.eoi(),
            Rule::UserObject => cx.user_object(),
            Rule::Location => cx.location(),
            Rule::Sequence {
                ty,
                parts,
                separator,
            } => self.sequence(&mut cx, ty.as_ref(), parts, *separator)?,
            Rule::Alternative { base, candidates } => {
                self.alternative(&mut cx, base.as_ref(), candidates)?
            }
            Rule::Repeat {
                element,
                separator,
                min,
                max,
                collect,
            } => self.repeat(&mut cx, *element, *separator, *min, *max, *collect)?,
            Rule::Optional(child) => self.optional(&mut cx, *child)?,
            Rule::LookAhead(child) => self.look_ahead(&mut cx, *child)?,
            Rule::Not(child) => self.not(&mut cx, *child)?,
            Rule::Surround {
                prefix,
                inner,
                suffix,
            } => self.surround(&mut cx, *prefix, *inner, *suffix)?,
            Rule::Capture(child) => self.capture(&mut cx, *child)?,
        };

        let traced = !def.flags.contains(RuleFlags::TRACE_IGNORED);
        Ok(cx.b.finish(output, result, def.rule.is_concrete(), traced)?)
    }

    fn output_of(&self, rule: RuleId) -> OutputType {
        self.grammar
            .output_type(rule)
            .cloned()
            .unwrap_or(OutputType::Any)
    }

    fn display(&self, rule: RuleId) -> String {
        self.grammar.display_name(rule)
    }

    // ── Calls ───────────────────────────────────────────────────

    /// Call `child` for its match only.
    fn call_void(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
        name: Option<Name>,
        on_fail: Label,
    ) -> Result<(), CompileError> {
        let matcher = self.resolver.resolve(child)?;
        cx.b.call(&matcher, name, None, on_fail);
        Ok(())
    }

    /// Call `child` into a fresh slot of its own bank. `None` for void
    /// children.
    fn call_natural(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
        name: Option<Name>,
        on_fail: Label,
    ) -> Result<Option<Slot>, CompileError> {
        let matcher = self.resolver.resolve(child)?;
        let dst = cx.b.slot_for(&self.output_of(child));
        cx.b.call(&matcher, name, dst, on_fail);
        Ok(dst)
    }

    /// Call `child` and leave its value boxed in a fresh object slot.
    /// Void children produce `Null`.
    fn call_object(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
        name: Option<Name>,
        on_fail: Label,
    ) -> Result<ObjSlot, CompileError> {
        let ty = self.output_of(child);
        match self.call_natural(cx, child, name, on_fail)? {
            Some(Slot::Obj(obj)) => Ok(obj),
            Some(Slot::Int(raw)) => {
                let obj = cx.b.obj_slot();
                cx.b.emit(Op::Box {
                    dst: obj,
                    src: raw,
                    kind: scalar_kind(&ty),
                });
                Ok(obj)
            }
            None => {
                let obj = cx.b.obj_slot();
                cx.b.load_value(obj, Value::Null);
                Ok(obj)
            }
        }
    }

    /// Call `child` so that its value ends up in `dst`, boxing or
    /// defaulting as the banks require.
    fn call_into(
        &mut self,
        cx: &mut RuleCx,
        child: RuleId,
        dst: Option<Slot>,
        on_fail: Label,
    ) -> Result<(), CompileError> {
        let ty = self.output_of(child);
        match dst {
            None => self.call_void(cx, child, None, on_fail),
            Some(Slot::Int(raw)) => {
                if !ty.is_scalar() {
                    return Err(EngineFault::ScalarExpected {
                        program: cx.name.clone(),
                        found: ty.to_string(),
                    }
                    .into());
                }
                let matcher = self.resolver.resolve(child)?;
                cx.b.call(&matcher, None, Some(Slot::Int(raw)), on_fail);
                Ok(())
            }
            Some(Slot::Obj(obj)) if ty.is_void() => {
                self.call_void(cx, child, None, on_fail)?;
                cx.b.load_value(obj, Value::Null);
                Ok(())
            }
            Some(Slot::Obj(obj)) if ty.is_scalar() => {
                let matcher = self.resolver.resolve(child)?;
                let raw = cx.b.int_slot();
                cx.b.call(&matcher, None, Some(Slot::Int(raw)), on_fail);
                cx.b.emit(Op::Box {
                    dst: obj,
                    src: raw,
                    kind: scalar_kind(&ty),
                });
                Ok(())
            }
            Some(Slot::Obj(obj)) => {
                let matcher = self.resolver.resolve(child)?;
                cx.b.call(&matcher, None, Some(Slot::Obj(obj)), on_fail);
                Ok(())
            }
        }
    }
}

/// Per-rule emission state.
pub(crate) struct RuleCx {
    pub(crate) b: ProgramBuilder,
    /// Display name of the rule, for diagnostics.
    pub(crate) name: String,
    pub(crate) output: OutputType,
}

impl RuleCx {
    /// Emit the shared failure tail: restore the entry position (when one
    /// was saved) and fail.
    fn fail_tail(&mut self, fail: Label, start: Option<IntSlot>) {
        self.b.mark(fail);
        if let Some(start) = start {
            self.b.restore_pos(start);
        }
        self.b.ret(false);
    }

    fn result_slot(&mut self) -> Option<Slot> {
        let output = self.output.clone();
        self.b.slot_for(&output)
    }
}

fn scalar_kind(ty: &OutputType) -> ScalarKind {
    match ty {
        OutputType::Char => ScalarKind::Char,
        _ => ScalarKind::Int,
    }
}

/// Register encoding of a character.
fn char_code(c: char) -> i64 {
    i64::from(u32::from(c))
}

#[cfg(test)]
mod tests;
