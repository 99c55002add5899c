//! The matcher interpreter.
//!
//! One [`run`] executes one program to its `Return`. Registers are a
//! window of the state's integer and object stacks, sized from the
//! program's slot counts on entry and released on exit; a nested rule call
//! stacks its own window above. Every register access is bounds-checked
//! against the program, so a malformed program surfaces as an
//! [`EngineFault`] rather than touching a caller's registers.

mod natives;

use std::mem;
use std::sync::Arc;

use weft_bytecode::{IntSlot, ObjSlot, Op, Operand, Program, Ret, Slot};
use weft_ir::{EngineFault, Value};

use crate::ParseState;

/// Run `program` at the current position.
///
/// `Some` with the program's result on success, `None` on failure.
pub(crate) fn run(
    program: &Program,
    state: &mut ParseState<'_>,
) -> Result<Option<Ret>, EngineFault> {
    let frame = Frame::enter(program, state);
    let outcome = frame.interpret(state);
    frame.leave(state);
    outcome
}

/// Register window of one running program.
struct Frame<'a> {
    program: &'a Program,
    ints: usize,
    objs: usize,
}

impl<'a> Frame<'a> {
    fn enter(program: &'a Program, state: &mut ParseState<'_>) -> Self {
        let buf = &mut *state.buf;
        let ints = buf.ints.len();
        let objs = buf.objs.len();
        buf.ints.resize(ints + program.int_slots(), 0);
        buf.objs.resize(objs + program.obj_slots(), Value::Null);
        Self {
            program,
            ints,
            objs,
        }
    }

    fn leave(&self, state: &mut ParseState<'_>) {
        state.buf.ints.truncate(self.ints);
        state.buf.objs.truncate(self.objs);
    }

    fn interpret(&self, state: &mut ParseState<'_>) -> Result<Option<Ret>, EngineFault> {
        let program = self.program;
        let mut pc = 0;
        loop {
            let op = program.op(pc)?;
            pc += 1;
            match op {
                // ── Control ─────────────────────────────────────
                Op::Jump { target } => pc = program.target(*target)?,
                Op::JumpIf { cond, a, b, target } => {
                    let a = self.int(state, *a)?;
                    let b = match b {
                        Operand::Slot(slot) => self.int(state, *slot)?,
                        Operand::Imm(value) => *value,
                    };
                    if cond.holds(a, b) {
                        pc = program.target(*target)?;
                    }
                }
                Op::JumpIfObjEq { a, b, target } => {
                    if self.obj(state, *a)? == self.obj(state, *b)? {
                        pc = program.target(*target)?;
                    }
                }
                Op::Return { success: false } => return Ok(None),
                Op::Return { success: true } => return self.result(state).map(Some),

                // ── Integers and position ───────────────────────
                Op::LoadImm { dst, value } => self.set_int(state, *dst, *value)?,
                Op::AddImm { dst, value } => {
                    let current = self.int(state, *dst)?;
                    self.set_int(state, *dst, current.wrapping_add(*value))?;
                }
                Op::SavePos { dst } => {
                    let pos = i64::try_from(state.pos()).unwrap_or(i64::MAX);
                    self.set_int(state, *dst, pos)?;
                }
                Op::RestorePos { src } => {
                    let pos = self.position(state, *src)?;
                    if !state.seek(pos) {
                        return Err(self.bad_position(pos));
                    }
                }
                Op::PeekChar { dst } => {
                    let c = state.peek().map_or(-1, |c| i64::from(u32::from(c)));
                    self.set_int(state, *dst, c)?;
                }
                Op::Advance { chars } => state.advance_chars(*chars),

                // ── Objects ─────────────────────────────────────
                Op::LoadConst { dst, index } => {
                    let value = program.value_const(*index)?.clone();
                    *self.obj_mut(state, *dst)? = value;
                }
                Op::Construct { dst, ty } => {
                    let value =
                        state
                            .model()
                            .construct(ty)
                            .ok_or_else(|| EngineFault::ConstructFailed {
                                program: program.name().to_string(),
                                ty: ty.to_string(),
                            })?;
                    *self.obj_mut(state, *dst)? = value;
                }
                Op::SetField { obj, field, src } => {
                    let value = self.take_obj(state, *src)?;
                    let model = state.model();
                    model.write_slot(self.obj_mut(state, *obj)?, field, value)?;
                }
                Op::Box { dst, src, kind } => {
                    let raw = self.int(state, *src)?;
                    let value = kind
                        .box_value(raw)
                        .ok_or_else(|| self.scalar_fault(format!("invalid char code {raw}")))?;
                    *self.obj_mut(state, *dst)? = value;
                }
                Op::ListNew { dst } => *self.obj_mut(state, *dst)? = Value::list(Vec::new()),
                Op::ListPush { list, item } => {
                    let item = self.take_obj(state, *item)?;
                    match self.obj_mut(state, *list)? {
                        Value::List(items) => Arc::make_mut(items).push(item),
                        other => return Err(self.kind_fault("list", other.type_name())),
                    }
                }
                Op::TextNew { dst } => *self.obj_mut(state, *dst)? = Value::Str(String::new()),
                Op::TextPush { text, item } => {
                    let item = self.take_obj(state, *item)?;
                    let Value::Str(text) = self.obj_mut(state, *text)? else {
                        return Err(self.kind_fault("str", "non-text accumulator"));
                    };
                    match item {
                        Value::Str(s) => text.push_str(&s),
                        Value::Char(c) => text.push(c),
                        other => return Err(self.kind_fault("str", other.type_name())),
                    }
                }
                Op::TextPushChar { text, item } => {
                    let raw = self.int(state, *item)?;
                    let c = u32::try_from(raw)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.scalar_fault(format!("invalid char code {raw}")))?;
                    match self.obj_mut(state, *text)? {
                        Value::Str(text) => text.push(c),
                        other => return Err(self.kind_fault("str", other.type_name())),
                    }
                }
                Op::Slice { dst, start } => {
                    let start = self.position(state, *start)?;
                    let text = state
                        .text()
                        .get(start..state.pos())
                        .ok_or_else(|| self.bad_position(start))?;
                    *self.obj_mut(state, *dst)? = Value::str(text);
                }

                // ── Calls ───────────────────────────────────────
                Op::Invoke {
                    native,
                    args,
                    dst,
                    on_fail,
                } => match natives::invoke(*native, args, self, state)? {
                    Some(value) => self.store_value(state, *dst, value)?,
                    None => pc = program.target(*on_fail)?,
                },
                Op::Call {
                    callee,
                    name,
                    dst,
                    on_fail,
                } => {
                    let callee = program.callee(*callee)?;
                    match state.call(&callee, name.as_deref())? {
                        Some(ret) => self.store_ret(state, *dst, ret)?,
                        None => pc = program.target(*on_fail)?,
                    }
                }
            }
        }
    }

    fn result(&self, state: &mut ParseState<'_>) -> Result<Ret, EngineFault> {
        Ok(match self.program.result() {
            None => Ret::Void,
            Some(Slot::Int(slot)) => Ret::Int(self.int(state, slot)?),
            Some(Slot::Obj(slot)) => Ret::Obj(self.take_obj(state, slot)?),
        })
    }

    // ── Registers ───────────────────────────────────────────────

    fn int_index(&self, slot: IntSlot) -> Result<usize, EngineFault> {
        let len = self.program.int_slots();
        if slot.index() < len {
            Ok(self.ints + slot.index())
        } else {
            Err(self.slot_fault("int", slot.raw(), len))
        }
    }

    fn obj_index(&self, slot: ObjSlot) -> Result<usize, EngineFault> {
        let len = self.program.obj_slots();
        if slot.index() < len {
            Ok(self.objs + slot.index())
        } else {
            Err(self.slot_fault("obj", slot.raw(), len))
        }
    }

    fn int(&self, state: &ParseState<'_>, slot: IntSlot) -> Result<i64, EngineFault> {
        let index = self.int_index(slot)?;
        Ok(state.buf.ints[index])
    }

    fn set_int(
        &self,
        state: &mut ParseState<'_>,
        slot: IntSlot,
        value: i64,
    ) -> Result<(), EngineFault> {
        let index = self.int_index(slot)?;
        state.buf.ints[index] = value;
        Ok(())
    }

    fn obj<'s>(&self, state: &'s ParseState<'_>, slot: ObjSlot) -> Result<&'s Value, EngineFault> {
        let index = self.obj_index(slot)?;
        Ok(&state.buf.objs[index])
    }

    fn obj_mut<'s>(
        &self,
        state: &'s mut ParseState<'_>,
        slot: ObjSlot,
    ) -> Result<&'s mut Value, EngineFault> {
        let index = self.obj_index(slot)?;
        Ok(&mut state.buf.objs[index])
    }

    /// Move a value out of its register, leaving `Null`.
    fn take_obj(&self, state: &mut ParseState<'_>, slot: ObjSlot) -> Result<Value, EngineFault> {
        Ok(mem::take(self.obj_mut(state, slot)?))
    }

    /// Read a register holding a saved position.
    fn position(&self, state: &ParseState<'_>, slot: IntSlot) -> Result<usize, EngineFault> {
        let raw = self.int(state, slot)?;
        usize::try_from(raw).map_err(|_| EngineFault::BadPosition {
            program: self.program.name().to_string(),
            pos: raw,
        })
    }

    /// Store a native's result. Integer destinations take scalars unboxed.
    fn store_value(
        &self,
        state: &mut ParseState<'_>,
        dst: Option<Slot>,
        value: Value,
    ) -> Result<(), EngineFault> {
        match dst {
            None => Ok(()),
            Some(Slot::Obj(slot)) => {
                *self.obj_mut(state, slot)? = value;
                Ok(())
            }
            Some(Slot::Int(slot)) => {
                let raw = match value {
                    Value::Int(n) => n,
                    Value::Char(c) => i64::from(u32::from(c)),
                    Value::Bool(b) => i64::from(b),
                    other => return Err(self.scalar_fault(other.type_name().to_string())),
                };
                self.set_int(state, slot, raw)
            }
        }
    }

    /// Store a callee's result. The banks must agree.
    fn store_ret(
        &self,
        state: &mut ParseState<'_>,
        dst: Option<Slot>,
        ret: Ret,
    ) -> Result<(), EngineFault> {
        match (dst, ret) {
            (None, _) => Ok(()),
            (Some(Slot::Int(slot)), Ret::Int(raw)) => self.set_int(state, slot, raw),
            (Some(Slot::Obj(slot)), Ret::Obj(value)) => {
                *self.obj_mut(state, slot)? = value;
                Ok(())
            }
            (Some(Slot::Int(_)), Ret::Obj(value)) => {
                Err(self.scalar_fault(value.type_name().to_string()))
            }
            (Some(Slot::Int(_)), Ret::Void) => Err(self.scalar_fault("nothing".to_string())),
            (Some(Slot::Obj(_)), Ret::Int(_)) => Err(self.kind_fault("object", "int")),
            (Some(Slot::Obj(_)), Ret::Void) => Err(self.kind_fault("object", "nothing")),
        }
    }

    // ── Faults ──────────────────────────────────────────────────

    fn slot_fault(&self, kind: &'static str, index: u16, len: usize) -> EngineFault {
        EngineFault::SlotOutOfRange {
            program: self.program.name().to_string(),
            kind,
            index,
            len,
        }
    }

    fn scalar_fault(&self, found: String) -> EngineFault {
        EngineFault::ScalarExpected {
            program: self.program.name().to_string(),
            found,
        }
    }

    fn kind_fault(&self, expected: &'static str, found: &'static str) -> EngineFault {
        EngineFault::ValueKind {
            program: self.program.name().to_string(),
            expected,
            found,
        }
    }

    fn bad_position(&self, pos: usize) -> EngineFault {
        EngineFault::BadPosition {
            program: self.program.name().to_string(),
            pos: i64::try_from(pos).unwrap_or(i64::MAX),
        }
    }
}
