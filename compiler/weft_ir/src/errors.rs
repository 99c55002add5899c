//! Fatal error classes shared by the compiler and the virtual machine.
//!
//! # Taxonomy
//!
//! - [`GrammarError`]: a malformed rule declaration. Raised once, the first
//!   time the offending rule is compiled, and cached so it is never retried.
//! - [`EngineFault`]: a broken invariant inside the compiler or the engine
//!   (bad slot index, unresolved subroutine, unmarked label). Always a bug.
//!
//! Parse failure is deliberately absent: a rule that does not match is the
//! `false` branch of the matching contract and never allocates an error.

use thiserror::Error;

use crate::RuleId;

/// Malformed grammar, detected when a rule is first compiled.
///
/// `rule` fields carry the display name of the offending rule (its declared
/// name, or `kind#id` for anonymous rules).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule `{rule}` references unknown rule {target}")]
    UnknownRule { rule: String, target: RuleId },

    #[error("rule `{rule}` was declared but never defined")]
    UndefinedRule { rule: String },

    #[error("rule name `{name}` is declared more than once")]
    DuplicateRuleName { name: String },

    #[error("rule `{rule}`: literal must not be empty")]
    EmptyLiteral { rule: String },

    #[error("rule `{rule}`: character set is empty")]
    EmptyCharSet { rule: String },

    #[error("rule `{rule}`: character range {lo:?}..={hi:?} is inverted")]
    InvalidCharRange { rule: String, lo: char, hi: char },

    #[error("rule `{rule}`: invalid regex: {message}")]
    InvalidRegex { rule: String, message: String },

    #[error("rule `{rule}`: output type `{ty}` is not known to the object model")]
    UnknownType { rule: String, ty: String },

    #[error("rule `{rule}`: output type `{ty}` is abstract and cannot be constructed")]
    AbstractType { rule: String, ty: String },

    #[error("rule `{rule}`: type `{ty}` has no slot named `{slot}`")]
    UnknownSlot {
        rule: String,
        ty: String,
        slot: String,
    },

    #[error("rule `{rule}`: part `{slot}` produces no value")]
    VoidSlot { rule: String, slot: String },

    #[error("rule `{rule}`: named part `{slot}` requires a typed sequence")]
    UntypedNamedPart { rule: String, slot: String },

    #[error("rule `{rule}`: alternative has no candidates")]
    EmptyAlternative { rule: String },

    #[error("rule `{rule}`: candidate `{candidate}` is not a concrete implementer of `{base}`")]
    NotAnImplementer {
        rule: String,
        candidate: String,
        base: String,
    },

    #[error("rule `{rule}`: repeat bounds min={min} max={max} are invalid")]
    InvalidRepeatBounds { rule: String, min: u32, max: u32 },

    #[error("rule `{rule}`: text repetition element produces {found}, expected text or char")]
    TextRepeatElement { rule: String, found: String },
}

/// Internal invariant violation in the compiler or the engine.
///
/// Never a recoverable parse outcome. The engine returns these through
/// `Result` so the top-level caller sees them.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineFault {
    #[error("internal engine fault: {kind} slot {index} out of range in `{program}` (size {len})")]
    SlotOutOfRange {
        program: String,
        kind: &'static str,
        index: u16,
        len: usize,
    },

    #[error("internal engine fault: program counter {pc} out of bounds in `{program}`")]
    PcOutOfBounds { program: String, pc: usize },

    #[error("internal engine fault: subroutine for rule {rule} was never resolved")]
    UnresolvedSubroutine { rule: RuleId },

    #[error("internal engine fault: label L{label} in `{program}` was never marked")]
    UnmarkedLabel { program: String, label: u32 },

    #[error("internal engine fault: label L{label} in `{program}` was marked twice")]
    LabelMarkedTwice { program: String, label: u32 },

    #[error("internal engine fault: matcher for rule {rule} was filled twice")]
    PlaceholderFilledTwice { rule: RuleId },

    #[error("internal engine fault: `{program}` expected a scalar value, found {found}")]
    ScalarExpected { program: String, found: String },

    #[error("internal engine fault: constant {index} in `{program}` is not a {expected}")]
    ConstantKind {
        program: String,
        index: u16,
        expected: &'static str,
    },

    #[error("internal engine fault: object model refused to construct `{ty}` in `{program}`")]
    ConstructFailed { program: String, ty: String },

    #[error("internal engine fault: `{program}` expected a {expected} value, found {found}")]
    ValueKind {
        program: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("internal engine fault: position {pos} in `{program}` is not a character boundary of the input")]
    BadPosition { program: String, pos: i64 },

    #[error("internal engine fault: `{program}` has more than 65535 {table} entries")]
    ProgramTooLarge {
        program: String,
        table: &'static str,
    },

    #[error("internal engine fault: {0}")]
    SlotWrite(#[from] SlotError),
}

/// Rejected slot write reported by an [`ObjectModel`](crate::ObjectModel).
///
/// The compiler validates every slot it writes, so at parse time this can
/// only surface as an [`EngineFault::SlotWrite`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cannot write slot `{slot}` on `{ty}`")]
pub struct SlotError {
    pub ty: String,
    pub slot: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_error_messages_name_the_rule() {
        let err = GrammarError::EmptyCharSet {
            rule: "Digit".to_string(),
        };
        assert_eq!(err.to_string(), "rule `Digit`: character set is empty");

        let err = GrammarError::UnknownRule {
            rule: "Expr".to_string(),
            target: RuleId::new(9),
        };
        assert_eq!(err.to_string(), "rule `Expr` references unknown rule #9");
    }

    #[test]
    fn slot_error_converts_into_fault() {
        let fault: EngineFault = SlotError {
            ty: "Pair".to_string(),
            slot: "left".to_string(),
        }
        .into();
        assert_eq!(
            fault.to_string(),
            "internal engine fault: cannot write slot `left` on `Pair`"
        );
    }
}
