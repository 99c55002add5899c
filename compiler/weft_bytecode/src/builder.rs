//! Program construction.

use std::sync::{Arc, Weak};

use regex::Regex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use weft_ir::{EngineFault, Name, OutputType, RuleId, Value};

use crate::{
    CalleeIdx, Cond, Const, ConstIdx, IntSlot, Label, Matcher, Native, ObjSlot, Op, Operand,
    Program, RecursionCheck, Slot,
};

/// Builder for one in-progress [`Program`].
///
/// Emission is linear: ops are appended in order, labels are allocated up
/// front with [`new_label`](Self::new_label) and placed with
/// [`mark`](Self::mark) at the current end of the op list. Slot, constant
/// and callee tables grow as needed. [`finish`](Self::finish) checks that
/// every label was placed exactly once and freezes the result.
pub struct ProgramBuilder {
    name: String,
    rule: RuleId,
    ops: Vec<Op>,
    labels: Vec<Option<usize>>,
    int_slots: usize,
    obj_slots: usize,
    consts: Vec<Const>,
    callees: Vec<Weak<Matcher>>,
    callee_index: FxHashMap<RuleId, CalleeIdx>,
    /// First structural error, reported by `finish`.
    fault: Option<EngineFault>,
}

impl ProgramBuilder {
    pub fn new(rule: RuleId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rule,
            ops: Vec::new(),
            labels: Vec::new(),
            int_slots: 0,
            obj_slots: 0,
            consts: Vec::new(),
            callees: Vec::new(),
            callee_index: FxHashMap::default(),
            fault: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Slots ───────────────────────────────────────────────────

    pub fn int_slot(&mut self) -> IntSlot {
        let slot = IntSlot::new(self.index(self.int_slots, "int slot"));
        self.int_slots += 1;
        slot
    }

    pub fn obj_slot(&mut self) -> ObjSlot {
        let slot = ObjSlot::new(self.index(self.obj_slots, "object slot"));
        self.obj_slots += 1;
        slot
    }

    /// Fresh slot in the bank matching a value of type `ty`: integer for
    /// scalars, object otherwise. `None` for void.
    pub fn slot_for(&mut self, ty: &OutputType) -> Option<Slot> {
        if ty.is_void() {
            None
        } else if ty.is_scalar() {
            Some(Slot::Int(self.int_slot()))
        } else {
            Some(Slot::Obj(self.obj_slot()))
        }
    }

    /// Table index `i` as stored in an op. An index past `u16::MAX`
    /// records a fault for `finish` and yields a placeholder.
    fn index(&mut self, i: usize, table: &'static str) -> u16 {
        match u16::try_from(i) {
            Ok(index) => index,
            Err(_) => {
                self.fault.get_or_insert(EngineFault::ProgramTooLarge {
                    program: self.name.clone(),
                    table,
                });
                u16::MAX
            }
        }
    }

    // ── Labels ──────────────────────────────────────────────────

    #[expect(
        clippy::cast_possible_truncation,
        reason = "label counts never exceed u32"
    )]
    pub fn new_label(&mut self) -> Label {
        let label = Label::new(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Place `label` at the next op to be emitted.
    pub fn mark(&mut self, label: Label) {
        let pc = self.ops.len();
        match self.labels.get_mut(label.index()) {
            Some(at @ None) => *at = Some(pc),
            Some(Some(_)) | None => {
                self.fault.get_or_insert(EngineFault::LabelMarkedTwice {
                    program: self.name.clone(),
                    label: label.raw(),
                });
            }
        }
    }

    // ── Tables ──────────────────────────────────────────────────

    /// Add a value constant, reusing an equal one.
    pub fn value_const(&mut self, value: Value) -> ConstIdx {
        let existing = self
            .consts
            .iter()
            .position(|c| matches!(c, Const::Value(v) if *v == value));
        let index = existing.unwrap_or_else(|| {
            self.consts.push(Const::Value(value));
            self.consts.len() - 1
        });
        ConstIdx::new(self.index(index, "constant"))
    }

    pub fn regex_const(&mut self, regex: Regex) -> ConstIdx {
        self.consts.push(Const::Regex(regex));
        ConstIdx::new(self.index(self.consts.len() - 1, "constant"))
    }

    /// Register a callee. Each rule gets one entry however often it is
    /// called.
    pub fn callee(&mut self, matcher: &Arc<Matcher>) -> CalleeIdx {
        if let Some(&index) = self.callee_index.get(&matcher.rule()) {
            return index;
        }
        let index = CalleeIdx::new(self.index(self.callees.len(), "callee"));
        self.callees.push(Arc::downgrade(matcher));
        self.callee_index.insert(matcher.rule(), index);
        index
    }

    // ── Emission ────────────────────────────────────────────────

    pub fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn jump(&mut self, target: Label) {
        self.emit(Op::Jump { target });
    }

    pub fn jump_if(&mut self, cond: Cond, a: IntSlot, b: i64, target: Label) {
        self.emit(Op::JumpIf {
            cond,
            a,
            b: Operand::Imm(b),
            target,
        });
    }

    pub fn jump_if_slot(&mut self, cond: Cond, a: IntSlot, b: IntSlot, target: Label) {
        self.emit(Op::JumpIf {
            cond,
            a,
            b: Operand::Slot(b),
            target,
        });
    }

    pub fn ret(&mut self, success: bool) {
        self.emit(Op::Return { success });
    }

    pub fn save_pos(&mut self) -> IntSlot {
        let dst = self.int_slot();
        self.emit(Op::SavePos { dst });
        dst
    }

    pub fn restore_pos(&mut self, src: IntSlot) {
        self.emit(Op::RestorePos { src });
    }

    /// Load a value constant into `dst`.
    pub fn load_value(&mut self, dst: ObjSlot, value: Value) {
        let index = self.value_const(value);
        self.emit(Op::LoadConst { dst, index });
    }

    pub fn call(
        &mut self,
        callee: &Arc<Matcher>,
        name: Option<Name>,
        dst: Option<Slot>,
        on_fail: Label,
    ) {
        let callee = self.callee(callee);
        self.emit(Op::Call {
            callee,
            name,
            dst,
            on_fail,
        });
    }

    pub fn invoke(&mut self, native: Native, args: &[Slot], dst: Option<Slot>, on_fail: Label) {
        debug_assert_eq!(args.len(), native.arity(), "arity of {native}");
        self.emit(Op::Invoke {
            native,
            args: SmallVec::from_slice(args),
            dst,
            on_fail,
        });
    }

    // ── Finish ──────────────────────────────────────────────────

    /// Freeze the program.
    ///
    /// Fails if a label was marked twice, referenced but never marked, or
    /// placed past the last op, or if a slot or constant table outgrew its
    /// `u16` index.
    pub fn finish(
        self,
        output: OutputType,
        result: Option<Slot>,
        concrete: bool,
        traced: bool,
    ) -> Result<Program, EngineFault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        let too_large = |table| EngineFault::ProgramTooLarge {
            program: self.name.clone(),
            table,
        };
        let int_slots = u16::try_from(self.int_slots).map_err(|_| too_large("int slot"))?;
        let obj_slots = u16::try_from(self.obj_slots).map_err(|_| too_large("object slot"))?;

        let mut labels = Vec::with_capacity(self.labels.len());
        for (i, at) in self.labels.iter().enumerate() {
            let unmarked = || EngineFault::UnmarkedLabel {
                program: self.name.clone(),
                label: label_u32(i),
            };
            match at {
                Some(pc) if *pc < self.ops.len() => labels.push(*pc),
                Some(pc) => {
                    return Err(EngineFault::PcOutOfBounds {
                        program: self.name.clone(),
                        pc: *pc,
                    })
                }
                // Allocated but never used is harmless; referenced and
                // never placed is a compiler bug.
                None if self.ops.iter().any(|op| op.target().is_some_and(|t| t.index() == i)) => {
                    return Err(unmarked());
                }
                None => labels.push(usize::MAX),
            }
        }

        Ok(Program {
            name: self.name,
            rule: self.rule,
            ops: self.ops,
            labels,
            int_slots,
            obj_slots,
            consts: self.consts,
            callees: self.callees,
            output,
            result,
            concrete,
            traced,
            recursion: RecursionCheck::None,
        })
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "label counts never exceed u32"
)]
fn label_u32(i: usize) -> u32 {
    i as u32
}
