//! Compiled programs.

use std::fmt;
use std::sync::{Arc, Weak};

use regex::Regex;
use weft_ir::{EngineFault, OutputType, RuleId, Value};

use crate::{CalleeIdx, ConstIdx, Label, Matcher, Op, Slot};

/// Entry in a program's constant table.
#[derive(Clone, Debug)]
pub enum Const {
    Value(Value),
    /// Pattern anchored at its start (`^(?:…)`).
    Regex(Regex),
}

/// How the engine guards a rule against re-entry at the same position.
///
/// Only rules that close a cycle in the rule graph are guarded; every
/// cycle contains at least one of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecursionCheck {
    /// Not part of a detected cycle.
    #[default]
    None,
    /// Tracked by one bit of the recursion mask.
    Bit(u8),
    /// Bit budget exhausted: tracked by walking the active frames.
    Walk,
}

/// Outcome value of a successful program run.
///
/// Scalars stay unboxed across calls; they are boxed only when written
/// into an object (or handed to the caller of the whole parse).
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Ret {
    #[default]
    Void,
    Int(i64),
    Obj(Value),
}

impl Ret {
    /// Box the result according to the producing rule's output type.
    ///
    /// `Void` yields `None`. An integer whose rule produces `Char` but which
    /// is not a valid scalar value also yields `None`.
    pub fn into_value(self, output: &OutputType) -> Option<Value> {
        match self {
            Ret::Void => None,
            Ret::Obj(value) => Some(value),
            Ret::Int(raw) if matches!(output, OutputType::Char) => u32::try_from(raw)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char),
            Ret::Int(raw) => Some(Value::Int(raw)),
        }
    }
}

/// The executable form of one rule.
///
/// Stateless: registers live in the engine's per-parse frames, so a
/// program is freely shared between threads.
#[derive(Debug)]
pub struct Program {
    pub(crate) name: String,
    pub(crate) rule: RuleId,
    pub(crate) ops: Vec<Op>,
    /// Program counter of each label.
    pub(crate) labels: Vec<usize>,
    pub(crate) int_slots: u16,
    pub(crate) obj_slots: u16,
    pub(crate) consts: Vec<Const>,
    /// Callees. Weak so that cyclic grammars do not leak; the rule cache
    /// owns every matcher.
    pub(crate) callees: Vec<Weak<Matcher>>,
    pub(crate) output: OutputType,
    pub(crate) result: Option<Slot>,
    pub(crate) concrete: bool,
    pub(crate) traced: bool,
    pub(crate) recursion: RecursionCheck,
}

impl Program {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[inline]
    pub fn int_slots(&self) -> usize {
        usize::from(self.int_slots)
    }

    #[inline]
    pub fn obj_slots(&self) -> usize {
        usize::from(self.obj_slots)
    }

    #[inline]
    pub fn output(&self) -> &OutputType {
        &self.output
    }

    /// Slot holding the value on success, `None` for void rules.
    #[inline]
    pub fn result(&self) -> Option<Slot> {
        self.result
    }

    /// Whether the rule gets its own memoization scope.
    #[inline]
    pub fn is_concrete(&self) -> bool {
        self.concrete
    }

    /// Whether entry and exit are reported to the trace sink.
    #[inline]
    pub fn is_traced(&self) -> bool {
        self.traced
    }

    #[inline]
    pub fn recursion(&self) -> RecursionCheck {
        self.recursion
    }

    /// Set the recursion guard. The cache decides this once the whole
    /// cycle containing the rule has been seen.
    pub fn set_recursion(&mut self, check: RecursionCheck) {
        self.recursion = check;
    }

    /// Fetch the op at `pc`.
    #[inline]
    pub fn op(&self, pc: usize) -> Result<&Op, EngineFault> {
        self.ops.get(pc).ok_or_else(|| EngineFault::PcOutOfBounds {
            program: self.name.clone(),
            pc,
        })
    }

    /// Resolve a label to its program counter.
    #[inline]
    pub fn target(&self, label: Label) -> Result<usize, EngineFault> {
        self.labels
            .get(label.index())
            .copied()
            .ok_or_else(|| EngineFault::UnmarkedLabel {
                program: self.name.clone(),
                label: label.raw(),
            })
    }

    /// Fetch a value constant.
    pub fn value_const(&self, index: ConstIdx) -> Result<&Value, EngineFault> {
        match self.consts.get(index.index()) {
            Some(Const::Value(value)) => Ok(value),
            _ => Err(self.const_fault(index, "value")),
        }
    }

    /// Fetch a regex constant.
    pub fn regex_const(&self, index: ConstIdx) -> Result<&Regex, EngineFault> {
        match self.consts.get(index.index()) {
            Some(Const::Regex(re)) => Ok(re),
            _ => Err(self.const_fault(index, "regex")),
        }
    }

    fn const_fault(&self, index: ConstIdx, expected: &'static str) -> EngineFault {
        EngineFault::ConstantKind {
            program: self.name.clone(),
            index: index.raw(),
            expected,
        }
    }

    /// Resolve a callee.
    ///
    /// Fails if the callee was dropped or its program was never filled in.
    pub fn callee(&self, index: CalleeIdx) -> Result<Arc<Matcher>, EngineFault> {
        self.callees
            .get(index.index())
            .and_then(Weak::upgrade)
            .ok_or(EngineFault::UnresolvedSubroutine { rule: self.rule })
    }

    /// Rules called by this program, in callee-table order.
    pub fn callee_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.callees
            .iter()
            .filter_map(Weak::upgrade)
            .map(|m| m.rule())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "program {} ({}) -> {} [int {}, obj {}]",
            self.name, self.rule, self.output, self.int_slots, self.obj_slots
        )?;
        if let Some(result) = self.result {
            write!(f, " result {result}")?;
        }
        match self.recursion {
            RecursionCheck::None => {}
            RecursionCheck::Bit(bit) => write!(f, " guard bit {bit}")?,
            RecursionCheck::Walk => f.write_str(" guard walk")?,
        }
        writeln!(f)?;
        for (pc, op) in self.ops.iter().enumerate() {
            for (label, _) in self.labels.iter().enumerate().filter(|(_, at)| **at == pc) {
                writeln!(f, "L{label}:")?;
            }
            writeln!(f, "  {pc:>3}: {op}")?;
        }
        Ok(())
    }
}
