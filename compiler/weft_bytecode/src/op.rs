//! Instruction set.
//!
//! # Ops
//!
//! | group     | ops |
//! |-----------|-----|
//! | control   | `Jump`, `JumpIf`, `JumpIfObjEq`, `Return` |
//! | integers  | `LoadImm`, `AddImm`, `SavePos`, `RestorePos`, `PeekChar`, `Advance` |
//! | objects   | `LoadConst`, `Construct`, `SetField`, `Box`, `ListNew`, `ListPush`, `TextNew`, `TextPush`, `TextPushChar`, `Slice` |
//! | calls     | `Invoke` (native helper), `Call` (another rule) |
//!
//! Both call ops carry an `on_fail` label: a failed call leaves its
//! destination untouched and transfers control there.

use std::fmt;

use smallvec::SmallVec;
use weft_ir::{Name, NumberKind, Value};

// ── Index newtypes ──────────────────────────────────────────────────

/// Defines a `u16` index newtype with `new`/`raw`/`index` and a short
/// `Display` prefix.
macro_rules! define_index {
    ($($(#[$meta:meta])* $name:ident => $prefix:literal),* $(,)?) => { $(
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u16);

        impl $name {
            #[inline]
            pub const fn new(raw: u16) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u16 {
                self.0
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    )* };
}

define_index!(
    /// Integer register within one program frame.
    IntSlot => "i",
    /// Object register within one program frame.
    ObjSlot => "o",
    /// Index into a program's constant table.
    ConstIdx => "k",
    /// Index into a program's callee table.
    CalleeIdx => "r",
);

/// Jump target within one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Label(u32);

impl Label {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A register of either bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Int(IntSlot),
    Obj(ObjSlot),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Int(s) => write!(f, "{s}"),
            Slot::Obj(s) => write!(f, "{s}"),
        }
    }
}

// ── Operands ────────────────────────────────────────────────────────

/// Integer comparison for [`Op::JumpIf`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cond {
    #[inline]
    pub fn holds(self, a: i64, b: i64) -> bool {
        match self {
            Cond::Eq => a == b,
            Cond::Ne => a != b,
            Cond::Lt => a < b,
            Cond::Le => a <= b,
            Cond::Gt => a > b,
            Cond::Ge => a >= b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Cond::Eq => "==",
            Cond::Ne => "!=",
            Cond::Lt => "<",
            Cond::Le => "<=",
            Cond::Gt => ">",
            Cond::Ge => ">=",
        }
    }
}

/// Right-hand side of an integer comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Slot(IntSlot),
    Imm(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Slot(s) => write!(f, "{s}"),
            Operand::Imm(n) => write!(f, "{n}"),
        }
    }
}

/// How an unboxed integer is interpreted when it is boxed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Char,
    Int,
}

impl ScalarKind {
    /// Box a raw register value. `None` if a char register does not hold
    /// a valid scalar value.
    pub fn box_value(self, raw: i64) -> Option<Value> {
        match self {
            ScalarKind::Int => Some(Value::Int(raw)),
            ScalarKind::Char => u32::try_from(raw)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char),
        }
    }
}

/// Helpers reachable through [`Op::Invoke`].
///
/// Natives see the input at the current position and their arguments as
/// boxed values; integer arguments are boxed by the engine at the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Native {
    /// Match the regex constant at the current position; produce the text.
    MatchRegex(ConstIdx),
    /// Match a number literal; produce `Int` or `Float`.
    ParseNumber(NumberKind),
    /// `(count)`: consume exactly `count` characters; produce the text.
    TakeChars,
    /// `(text)`: lower-case the text. Consumes nothing.
    FoldCase,
    /// Produce the ambient user object. Consumes nothing.
    UserObject,
}

impl Native {
    /// Number of arguments the native expects.
    pub fn arity(self) -> usize {
        match self {
            Native::TakeChars | Native::FoldCase => 1,
            Native::MatchRegex(_) | Native::ParseNumber(_) | Native::UserObject => 0,
        }
    }
}

impl fmt::Display for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::MatchRegex(k) => write!(f, "match_regex[{k}]"),
            Native::ParseNumber(kind) => write!(f, "parse_number[{kind:?}]"),
            Native::TakeChars => f.write_str("take_chars"),
            Native::FoldCase => f.write_str("fold_case"),
            Native::UserObject => f.write_str("user_object"),
        }
    }
}

// ── Ops ─────────────────────────────────────────────────────────────

/// One matcher instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    // ── Control ─────────────────────────────────────────────────
    Jump {
        target: Label,
    },
    /// Jump when `a <cond> b`.
    JumpIf {
        cond: Cond,
        a: IntSlot,
        b: Operand,
        target: Label,
    },
    /// Jump when two object slots hold equal values.
    JumpIfObjEq {
        a: ObjSlot,
        b: ObjSlot,
        target: Label,
    },
    /// Leave the program. On success the result slot, if any, is the
    /// program's value.
    Return {
        success: bool,
    },

    // ── Integers and position ───────────────────────────────────
    LoadImm {
        dst: IntSlot,
        value: i64,
    },
    AddImm {
        dst: IntSlot,
        value: i64,
    },
    /// Copy the input position into `dst`.
    SavePos {
        dst: IntSlot,
    },
    /// Move the input position back to `src`.
    RestorePos {
        src: IntSlot,
    },
    /// Load the character at the current position, or `-1` at end of input.
    PeekChar {
        dst: IntSlot,
    },
    /// Move forward over `chars` characters.
    Advance {
        chars: u32,
    },

    // ── Objects ─────────────────────────────────────────────────
    /// Load a constant value (the program's global slots).
    LoadConst {
        dst: ObjSlot,
        index: ConstIdx,
    },
    /// Create an empty instance of `ty` through the object model.
    Construct {
        dst: ObjSlot,
        ty: Name,
    },
    /// Write `src` into slot `field` of `obj` through the object model.
    /// `src` is left empty.
    SetField {
        obj: ObjSlot,
        field: Name,
        src: ObjSlot,
    },
    Box {
        dst: ObjSlot,
        src: IntSlot,
        kind: ScalarKind,
    },
    ListNew {
        dst: ObjSlot,
    },
    /// Append `item` to the list in `list`. `item` is left empty.
    ListPush {
        list: ObjSlot,
        item: ObjSlot,
    },
    TextNew {
        dst: ObjSlot,
    },
    TextPush {
        text: ObjSlot,
        item: ObjSlot,
    },
    TextPushChar {
        text: ObjSlot,
        item: IntSlot,
    },
    /// Input text from position `start` to the current position.
    Slice {
        dst: ObjSlot,
        start: IntSlot,
    },

    // ── Calls ───────────────────────────────────────────────────
    Invoke {
        native: Native,
        args: SmallVec<[Slot; 2]>,
        dst: Option<Slot>,
        on_fail: Label,
    },
    /// Match another rule through the parsing context. `name` is the
    /// sequence part being matched, reported to the trace sink.
    Call {
        callee: CalleeIdx,
        name: Option<Name>,
        dst: Option<Slot>,
        on_fail: Label,
    },
}

impl Op {
    /// The label this op may transfer control to, if any.
    pub fn target(&self) -> Option<Label> {
        match self {
            Op::Jump { target } | Op::JumpIf { target, .. } | Op::JumpIfObjEq { target, .. } => {
                Some(*target)
            }
            Op::Invoke { on_fail, .. } | Op::Call { on_fail, .. } => Some(*on_fail),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn dst(f: &mut fmt::Formatter<'_>, dst: Option<Slot>) -> fmt::Result {
            match dst {
                Some(slot) => write!(f, "{slot} = "),
                None => Ok(()),
            }
        }

        match self {
            Op::Jump { target } => write!(f, "jump {target}"),
            Op::JumpIf { cond, a, b, target } => {
                write!(f, "jump_if {a} {} {b} -> {target}", cond.symbol())
            }
            Op::JumpIfObjEq { a, b, target } => write!(f, "jump_if_obj_eq {a} {b} -> {target}"),
            Op::Return { success } => {
                f.write_str(if *success { "return ok" } else { "return fail" })
            }
            Op::LoadImm { dst, value } => write!(f, "{dst} = {value}"),
            Op::AddImm { dst, value } => write!(f, "{dst} += {value}"),
            Op::SavePos { dst } => write!(f, "{dst} = pos"),
            Op::RestorePos { src } => write!(f, "pos = {src}"),
            Op::PeekChar { dst } => write!(f, "{dst} = peek"),
            Op::Advance { chars } => write!(f, "advance {chars}"),
            Op::LoadConst { dst, index } => write!(f, "{dst} = {index}"),
            Op::Construct { dst, ty } => write!(f, "{dst} = new {ty}"),
            Op::SetField { obj, field, src } => write!(f, "{obj}.{field} = {src}"),
            Op::Box { dst, src, kind } => write!(f, "{dst} = box[{kind:?}] {src}"),
            Op::ListNew { dst } => write!(f, "{dst} = []"),
            Op::ListPush { list, item } => write!(f, "{list} push {item}"),
            Op::TextNew { dst } => write!(f, "{dst} = \"\""),
            Op::TextPush { text, item } => write!(f, "{text} append {item}"),
            Op::TextPushChar { text, item } => write!(f, "{text} append_char {item}"),
            Op::Slice { dst, start } => write!(f, "{dst} = text[{start}..pos]"),
            Op::Invoke {
                native,
                args,
                dst: d,
                on_fail,
            } => {
                dst(f, *d)?;
                write!(f, "invoke {native}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ") else {on_fail}")
            }
            Op::Call {
                callee,
                name,
                dst: d,
                on_fail,
            } => {
                dst(f, *d)?;
                write!(f, "call {callee}")?;
                if let Some(name) = name {
                    write!(f, " as {name}")?;
                }
                write!(f, " else {on_fail}")
            }
        }
    }
}
