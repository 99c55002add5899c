//! Forward-declarable rule handles.

use std::fmt;
use std::sync::OnceLock;

use weft_ir::{EngineFault, RuleId};

use crate::Program;

/// Handle to the compiled form of one rule.
///
/// Created empty when compilation of the rule begins, so that rules inside
/// a cycle can call it before its program exists, and filled exactly once
/// when compilation completes. After that it is immutable and read without
/// locking.
pub struct Matcher {
    rule: RuleId,
    name: String,
    program: OnceLock<Program>,
}

impl Matcher {
    /// An unfilled handle for `rule`.
    pub fn declare(rule: RuleId, name: impl Into<String>) -> Self {
        Self {
            rule,
            name: name.into(),
            program: OnceLock::new(),
        }
    }

    #[inline]
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.program.get().is_some()
    }

    /// Fill the handle with its program.
    pub fn resolve(&self, program: Program) -> Result<(), EngineFault> {
        self.program
            .set(program)
            .map_err(|_| EngineFault::PlaceholderFilledTwice { rule: self.rule })
    }

    /// The rule's program.
    #[inline]
    pub fn program(&self) -> Result<&Program, EngineFault> {
        self.program
            .get()
            .ok_or(EngineFault::UnresolvedSubroutine { rule: self.rule })
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("rule", &self.rule)
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
