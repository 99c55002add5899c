//! Declared output types and their inference.
//!
//! Every rule has one output type, fixed for the lifetime of the grammar.
//! The compiler uses it to choose slot kinds (scalars live unboxed in
//! integer slots) and to validate compositions (a named sequence part must
//! produce a value, a text repetition must produce text).
//!
//! # Inference
//!
//! Types are computed by monotone fixpoint iteration over the rule graph.
//! Each rule starts unknown; every round recomputes each rule from its
//! children and joins the result into what it already had. Types only
//! climb the lattice (`Int`/`Float` → `Number` → `Any`, anything else →
//! `Any`), so iteration terminates. Rules that stay unknown (a cycle with
//! no base case) end up as `Any`.

use std::fmt;

use crate::{Collect, Name, NumberKind, Rule, RuleDef};

/// Declared value type of a rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// Matches without producing a value.
    Void,
    Char,
    Int,
    Float,
    /// `Int` or `Float`.
    Number,
    Text,
    List,
    /// An object of the named type (or an implementer of it).
    Object(Name),
    Any,
}

impl OutputType {
    /// Whether values of this type live unboxed in integer slots.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(self, OutputType::Char | OutputType::Int)
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, OutputType::Void)
    }

    /// Least upper bound of two types.
    pub fn join(&self, other: &OutputType) -> OutputType {
        use OutputType::{Any, Float, Int, Number};
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (Int | Float | Number, Int | Float | Number) => Number,
            _ => Any,
        }
    }

    /// Type of `Optional(child)`. The absent case must be representable, so
    /// scalars and numbers widen to `Any` (`Null` when absent).
    fn optional(&self) -> OutputType {
        match self {
            OutputType::Void => OutputType::Void,
            OutputType::Text => OutputType::Text,
            OutputType::List => OutputType::List,
            OutputType::Object(ty) => OutputType::Object(ty.clone()),
            OutputType::Char
            | OutputType::Int
            | OutputType::Float
            | OutputType::Number
            | OutputType::Any => OutputType::Any,
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Void => f.write_str("void"),
            OutputType::Char => f.write_str("char"),
            OutputType::Int => f.write_str("int"),
            OutputType::Float => f.write_str("float"),
            OutputType::Number => f.write_str("number"),
            OutputType::Text => f.write_str("text"),
            OutputType::List => f.write_str("list"),
            OutputType::Object(ty) => write!(f, "object `{ty}`"),
            OutputType::Any => f.write_str("any"),
        }
    }
}

/// Infer the output type of every rule.
///
/// Child ids must already be validated against `rules.len()`.
pub(crate) fn infer_outputs(rules: &[RuleDef]) -> Vec<OutputType> {
    let mut types: Vec<Option<OutputType>> = vec![None; rules.len()];
    loop {
        let mut changed = false;
        for (i, def) in rules.iter().enumerate() {
            let Some(next) = step(&def.rule, &types) else {
                continue;
            };
            let joined = match &types[i] {
                Some(prev) => prev.join(&next),
                None => next,
            };
            if types[i].as_ref() != Some(&joined) {
                types[i] = Some(joined);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    types
        .into_iter()
        .map(|t| t.unwrap_or(OutputType::Any))
        .collect()
}

/// Compute one rule's type from the current child estimates.
/// `None` means "not known yet".
fn step(rule: &Rule, types: &[Option<OutputType>]) -> Option<OutputType> {
    let of = |id: crate::RuleId| types.get(id.index()).cloned().flatten();
    match rule {
        Rule::Literal { .. } | Rule::Regex(_) | Rule::Capture(_) => Some(OutputType::Text),
        Rule::CharRange { .. } | Rule::CharSet { .. } => Some(OutputType::Char),
        Rule::Number(NumberKind::Integer) | Rule::Location => Some(OutputType::Int),
        Rule::Number(NumberKind::Float) => Some(OutputType::Float),
        Rule::Number(NumberKind::Any) => Some(OutputType::Number),
        Rule::Whitespace | Rule::Eol | Rule::Eoi | Rule::LookAhead(_) | Rule::Not(_) => {
            Some(OutputType::Void)
        }
        Rule::UserObject => Some(OutputType::Any),
        Rule::Sequence { ty, .. } => Some(match ty {
            Some(ty) => OutputType::Object(ty.clone()),
            None => OutputType::Void,
        }),
        Rule::Alternative { base, candidates } => match base {
            Some(base) => Some(OutputType::Object(base.clone())),
            None if candidates.is_empty() => Some(OutputType::Void),
            None => candidates
                .iter()
                .filter_map(|c| of(*c))
                .reduce(|acc, t| acc.join(&t)),
        },
        Rule::Repeat {
            element, collect, ..
        } => match collect {
            Collect::Text => Some(OutputType::Text),
            Collect::List => of(*element).map(|t| {
                if t.is_void() {
                    OutputType::Void
                } else {
                    OutputType::List
                }
            }),
        },
        Rule::Optional(child) => of(*child).map(|t| t.optional()),
        Rule::Surround { inner, .. } => of(*inner),
    }
}

#[cfg(test)]
mod tests;
