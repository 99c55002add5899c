//! Grammar rule nodes and the rule arena.
//!
//! A [`Grammar`] is an arena of [`RuleDef`]s indexed by [`RuleId`]. Every
//! rule gets its identity before its body exists, which is what makes cyclic
//! grammars expressible:
//!
//! ```text
//! let mut g = Grammar::builder();
//! let expr = g.declare("Expr");            // identity only
//! let num = g.rule("Num", Rule::number(NumberKind::Integer));
//! let plus = g.literal("+");
//! let add = g.add(Rule::sequence(None, vec![Part::unnamed(expr), Part::unnamed(plus), Part::unnamed(num)]));
//! g.define(expr, Rule::alternative(vec![add, num]));
//! let grammar = g.build()?;
//! ```
//!
//! Rule identity is the memoization and compilation key: two structurally
//! identical rules with different ids are different rules.

use std::fmt;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::output::infer_outputs;
use crate::{GrammarError, Name, OutputType};

// ── Identity ────────────────────────────────────────────────────────

/// Stable identity of a rule within one [`Grammar`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct RuleId(u32);

impl RuleId {
    /// Create a rule ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Rule nodes ──────────────────────────────────────────────────────

/// Which numbers a [`Rule::Number`] accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NumberKind {
    /// Optional sign and digits. Produces `Int`.
    Integer,
    /// Integer part, optional fraction and exponent. Produces `Float`.
    Float,
    /// Either; produces `Int` when there is no fraction or exponent.
    #[default]
    Any,
}

/// How a [`Rule::Repeat`] accumulates its elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Collect {
    /// A list of element values.
    #[default]
    List,
    /// Concatenated text of `Text`/`Char` elements.
    Text,
}

/// One child of a [`Rule::Sequence`].
///
/// A named part writes its value into the slot of the same name on the
/// sequence's output object. An unnamed part must still match but
/// contributes nothing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Part {
    pub name: Option<Name>,
    pub rule: RuleId,
}

impl Part {
    pub fn named(name: impl Into<Name>, rule: RuleId) -> Self {
        Self {
            name: Some(name.into()),
            rule,
        }
    }

    pub fn unnamed(rule: RuleId) -> Self {
        Self { name: None, rule }
    }
}

/// Declarative description of one grammar construct.
///
/// Immutable once the grammar is built. Children are referenced by
/// [`RuleId`], never by value, so the rule graph may contain cycles.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Exact text, optionally case-insensitive. Produces the matched text.
    Literal { text: String, ignore_case: bool },
    /// One character inside (or, negated, outside) any of the ranges.
    CharRange {
        ranges: Vec<(char, char)>,
        negated: bool,
    },
    /// One character from (or, negated, not from) the set.
    CharSet { chars: Vec<char>, negated: bool },
    /// Regular expression anchored at the current position.
    Regex(String),
    /// Children in order, optionally separated. Produces an object of
    /// type `ty` when given, otherwise nothing.
    Sequence {
        ty: Option<Name>,
        parts: Vec<Part>,
        separator: Option<RuleId>,
    },
    /// First matching candidate, in declaration order. When `base` is
    /// given, every candidate must produce a concrete implementer of it.
    Alternative {
        base: Option<Name>,
        candidates: Vec<RuleId>,
    },
    /// `element ([separator] element)*`, bounded by `min` and `max`.
    Repeat {
        element: RuleId,
        separator: Option<RuleId>,
        min: u32,
        max: Option<u32>,
        collect: Collect,
    },
    /// Child or nothing; never fails.
    Optional(RuleId),
    /// Succeeds iff the child matches; consumes nothing.
    LookAhead(RuleId),
    /// Succeeds iff the child fails; consumes nothing.
    Not(RuleId),
    /// `prefix inner suffix`, where a missing suffix reuses the prefix.
    Surround {
        prefix: RuleId,
        inner: RuleId,
        suffix: Option<RuleId>,
    },
    /// Child, producing the exact text it consumed.
    Capture(RuleId),
    Number(NumberKind),
    /// Zero or more of space, tab, carriage return, line feed.
    Whitespace,
    /// `\r\n`, `\n`, `\r`, or end of input.
    Eol,
    /// End of input.
    Eoi,
    /// The ambient user object supplied to the parse call.
    UserObject,
    /// The current byte offset.
    Location,
}

impl Rule {
    pub fn literal(text: impl Into<String>) -> Self {
        Rule::Literal {
            text: text.into(),
            ignore_case: false,
        }
    }

    pub fn keyword(text: impl Into<String>) -> Self {
        Rule::Literal {
            text: text.into(),
            ignore_case: true,
        }
    }

    pub fn char_range(ranges: impl IntoIterator<Item = (char, char)>) -> Self {
        Rule::CharRange {
            ranges: ranges.into_iter().collect(),
            negated: false,
        }
    }

    pub fn char_set(chars: &str) -> Self {
        Rule::CharSet {
            chars: chars.chars().collect(),
            negated: false,
        }
    }

    pub fn none_of(chars: &str) -> Self {
        Rule::CharSet {
            chars: chars.chars().collect(),
            negated: true,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Rule::Regex(pattern.into())
    }

    pub fn sequence(ty: Option<&str>, parts: Vec<Part>) -> Self {
        Rule::Sequence {
            ty: ty.map(Name::from),
            parts,
            separator: None,
        }
    }

    pub fn alternative(candidates: Vec<RuleId>) -> Self {
        Rule::Alternative {
            base: None,
            candidates,
        }
    }

    pub fn alternative_of(base: &str, candidates: Vec<RuleId>) -> Self {
        Rule::Alternative {
            base: Some(Name::from(base)),
            candidates,
        }
    }

    pub fn repeat(element: RuleId, min: u32, max: Option<u32>) -> Self {
        Rule::Repeat {
            element,
            separator: None,
            min,
            max,
            collect: Collect::List,
        }
    }

    pub fn many(element: RuleId) -> Self {
        Self::repeat(element, 0, None)
    }

    pub fn many1(element: RuleId) -> Self {
        Self::repeat(element, 1, None)
    }

    pub fn number(kind: NumberKind) -> Self {
        Rule::Number(kind)
    }

    pub fn surround(fence: RuleId, inner: RuleId) -> Self {
        Rule::Surround {
            prefix: fence,
            inner,
            suffix: None,
        }
    }

    pub fn between(prefix: RuleId, inner: RuleId, suffix: RuleId) -> Self {
        Rule::Surround {
            prefix,
            inner,
            suffix: Some(suffix),
        }
    }

    /// Set the separator of a `Sequence` or `Repeat`. Other rules are
    /// returned unchanged.
    #[must_use]
    pub fn with_separator(mut self, sep: RuleId) -> Self {
        if let Rule::Sequence { separator, .. } | Rule::Repeat { separator, .. } = &mut self {
            *separator = Some(sep);
        }
        self
    }

    /// Switch a `Repeat` to text concatenation.
    #[must_use]
    pub fn collect_text(mut self) -> Self {
        if let Rule::Repeat { collect, .. } = &mut self {
            *collect = Collect::Text;
        }
        self
    }

    /// Short, stable name of the rule kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Rule::Literal { .. } => "literal",
            Rule::CharRange { .. } => "char-range",
            Rule::CharSet { .. } => "char-set",
            Rule::Regex(_) => "regex",
            Rule::Sequence { .. } => "sequence",
            Rule::Alternative { .. } => "alternative",
            Rule::Repeat { .. } => "repeat",
            Rule::Optional(_) => "optional",
            Rule::LookAhead(_) => "look-ahead",
            Rule::Not(_) => "not",
            Rule::Surround { .. } => "surround",
            Rule::Capture(_) => "capture",
            Rule::Number(_) => "number",
            Rule::Whitespace => "whitespace",
            Rule::Eol => "eol",
            Rule::Eoi => "eoi",
            Rule::UserObject => "user-object",
            Rule::Location => "location",
        }
    }

    /// All rules referenced by this rule, in declaration order.
    pub fn children(&self) -> Vec<RuleId> {
        match self {
            Rule::Sequence {
                parts, separator, ..
            } => parts
                .iter()
                .map(|p| p.rule)
                .chain(separator.iter().copied())
                .collect(),
            Rule::Alternative { candidates, .. } => candidates.clone(),
            Rule::Repeat {
                element, separator, ..
            } => std::iter::once(*element)
                .chain(separator.iter().copied())
                .collect(),
            Rule::Optional(c) | Rule::LookAhead(c) | Rule::Not(c) | Rule::Capture(c) => vec![*c],
            Rule::Surround {
                prefix,
                inner,
                suffix,
            } => [*prefix, *inner]
                .into_iter()
                .chain(suffix.iter().copied())
                .collect(),
            Rule::Literal { .. }
            | Rule::CharRange { .. }
            | Rule::CharSet { .. }
            | Rule::Regex(_)
            | Rule::Number(_)
            | Rule::Whitespace
            | Rule::Eol
            | Rule::Eoi
            | Rule::UserObject
            | Rule::Location => Vec::new(),
        }
    }

    /// Whether the rule establishes its own memoization scope.
    ///
    /// Pass-through wrappers (`Optional`, `Alternative`, `LookAhead`, `Not`)
    /// only relay their children's outcomes, which are memoized on their
    /// own; caching the wrapper as well would duplicate every entry.
    pub fn is_concrete(&self) -> bool {
        !matches!(
            self,
            Rule::Optional(_) | Rule::Alternative { .. } | Rule::LookAhead(_) | Rule::Not(_)
        )
    }
}

bitflags! {
    /// Per-rule behaviour switches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u8 {
        /// Do not report this rule to the trace sink. Its children are
        /// still reported.
        const TRACE_IGNORED = 1 << 0;
    }
}

/// A rule together with its declaration metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDef {
    pub name: Option<Name>,
    pub rule: Rule,
    pub flags: RuleFlags,
}

// ── Grammar ─────────────────────────────────────────────────────────

/// Immutable arena of rules with their inferred output types.
#[derive(Clone, Debug)]
pub struct Grammar {
    rules: Vec<RuleDef>,
    names: FxHashMap<Name, RuleId>,
    outputs: Vec<OutputType>,
}

impl Grammar {
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule definition. `None` for ids from another grammar.
    #[inline]
    pub fn get(&self, id: RuleId) -> Option<&RuleDef> {
        self.rules.get(id.index())
    }

    /// Find a rule by its declared name.
    pub fn lookup(&self, name: &str) -> Option<RuleId> {
        self.names.get(name).copied()
    }

    /// Declared output type of a rule.
    pub fn output_type(&self, id: RuleId) -> Option<&OutputType> {
        self.outputs.get(id.index())
    }

    /// Declared name of a rule, or `kind#id` for anonymous rules.
    pub fn display_name(&self, id: RuleId) -> String {
        match self.get(id) {
            Some(RuleDef {
                name: Some(name), ..
            }) => name.to_string(),
            Some(def) => format!("{}{}", def.rule.kind_name(), id),
            None => format!("unknown{id}"),
        }
    }

    /// Iterate over all rule ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        (0..self.rules.len()).map(|i| RuleId::new(rule_index(i)))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "rule arenas never exceed u32 entries"
)]
fn rule_index(i: usize) -> u32 {
    i as u32
}

// ── Builder ─────────────────────────────────────────────────────────

struct PendingRule {
    name: Option<Name>,
    rule: Option<Rule>,
    flags: RuleFlags,
}

/// Incremental construction of a [`Grammar`].
///
/// Identities are handed out immediately; bodies may be supplied later with
/// [`define`](Self::define). Validation of references and names happens in
/// [`build`](Self::build). Semantic checks that need the object model
/// (types, slots, implementers) happen when a rule is first compiled.
pub struct GrammarBuilder {
    rules: Vec<PendingRule>,
    names: FxHashMap<Name, RuleId>,
    duplicate: Option<Name>,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            names: FxHashMap::default(),
            duplicate: None,
        }
    }

    fn push(&mut self, name: Option<Name>, rule: Option<Rule>) -> RuleId {
        let id = RuleId::new(rule_index(self.rules.len()));
        if let Some(name) = &name {
            if self.names.insert(name.clone(), id).is_some() && self.duplicate.is_none() {
                self.duplicate = Some(name.clone());
            }
        }
        self.rules.push(PendingRule {
            name,
            rule,
            flags: RuleFlags::empty(),
        });
        id
    }

    /// Reserve an identity for a named rule whose body comes later.
    pub fn declare(&mut self, name: impl Into<Name>) -> RuleId {
        self.push(Some(name.into()), None)
    }

    /// Supply the body of a previously declared rule.
    ///
    /// Defining a rule twice replaces the earlier body.
    pub fn define(&mut self, id: RuleId, rule: Rule) -> RuleId {
        match self.rules.get_mut(id.index()) {
            Some(pending) => pending.rule = Some(rule),
            None => debug_assert!(false, "define() called with foreign rule id {id}"),
        }
        id
    }

    /// Add an anonymous rule.
    pub fn add(&mut self, rule: Rule) -> RuleId {
        self.push(None, Some(rule))
    }

    /// Add a named rule.
    pub fn rule(&mut self, name: impl Into<Name>, rule: Rule) -> RuleId {
        self.push(Some(name.into()), Some(rule))
    }

    /// Add an anonymous exact-text literal.
    pub fn literal(&mut self, text: &str) -> RuleId {
        self.add(Rule::literal(text))
    }

    /// Replace the flags of a rule.
    pub fn set_flags(&mut self, id: RuleId, flags: RuleFlags) -> RuleId {
        if let Some(pending) = self.rules.get_mut(id.index()) {
            pending.flags = flags;
        }
        id
    }

    /// Validate references and names, then infer output types.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        if let Some(name) = self.duplicate {
            return Err(GrammarError::DuplicateRuleName {
                name: name.to_string(),
            });
        }

        let len = self.rules.len();
        let mut rules = Vec::with_capacity(len);
        for (i, pending) in self.rules.into_iter().enumerate() {
            let display = || match &pending.name {
                Some(name) => name.to_string(),
                None => format!("rule#{i}"),
            };
            let Some(rule) = pending.rule else {
                return Err(GrammarError::UndefinedRule { rule: display() });
            };
            if let Some(target) = rule.children().into_iter().find(|c| c.index() >= len) {
                return Err(GrammarError::UnknownRule {
                    rule: display(),
                    target,
                });
            }
            rules.push(RuleDef {
                name: pending.name,
                rule,
                flags: pending.flags,
            });
        }

        let outputs = infer_outputs(&rules);
        Ok(Grammar {
            rules,
            names: self.names,
            outputs,
        })
    }
}
