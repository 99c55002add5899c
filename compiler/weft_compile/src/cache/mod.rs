//! Identity-keyed rule cache.
//!
//! Maps each [`RuleId`] of one grammar to its compiled [`Matcher`]. A miss
//! compiles the requested rule and every rule it reaches in a single
//! session; cycles are closed with unfilled placeholder handles that are
//! filled once the rule they stand for finishes compiling.
//!
//! # Locking
//!
//! Lookups of compiled rules take a read lock only. Compilation is
//! serialized by the state mutex: one session at a time, holding the lock
//! from the first miss until every reached rule is published (or the
//! session failed). Lock order is always `state` before `ready`.
//!
//! # Recursion guards
//!
//! A placeholder handed out for a rule that is still compiling proves the
//! rule closes a cycle. That rule receives a recursion guard: one of
//! [`GUARD_BITS`] mask bits while they last, a frame walk after that.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;
use weft_bytecode::{Matcher, RecursionCheck};
use weft_ir::{Grammar, ObjectModel, RuleId};
use weft_stack::ensure_sufficient_stack;

use crate::{CompileError, Compiler, Resolve};

/// Number of distinct rules that can be guarded by a mask bit.
pub const GUARD_BITS: u8 = 64;

/// Compiled matchers of one grammar.
pub struct RuleCache {
    grammar: Arc<Grammar>,
    model: Arc<dyn ObjectModel>,
    /// Published matchers. Owns every matcher; programs refer to their
    /// callees weakly.
    ready: RwLock<FxHashMap<RuleId, Arc<Matcher>>>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    /// Rules that failed to compile. Never retried.
    failed: FxHashMap<RuleId, CompileError>,
    /// Guards assigned so far. Stable across sessions, so a rule
    /// recompiled after a failed session keeps its bit.
    guards: FxHashMap<RuleId, RecursionCheck>,
    next_bit: u8,
}

impl RuleCache {
    pub fn new(grammar: Arc<Grammar>, model: Arc<dyn ObjectModel>) -> Self {
        Self {
            grammar,
            model,
            ready: RwLock::new(FxHashMap::default()),
            state: Mutex::new(CacheState::default()),
        }
    }

    #[inline]
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    #[inline]
    pub fn model(&self) -> &Arc<dyn ObjectModel> {
        &self.model
    }

    /// The matcher of `rule`, compiling it on first request.
    ///
    /// A rule that failed once fails with the same error on every later
    /// request.
    pub fn get(&self, rule: RuleId) -> Result<Arc<Matcher>, CompileError> {
        if let Some(matcher) = self.ready.read().get(&rule) {
            return Ok(Arc::clone(matcher));
        }

        let mut state = self.state.lock();
        // Another session may have finished while we waited.
        if let Some(matcher) = self.ready.read().get(&rule) {
            return Ok(Arc::clone(matcher));
        }
        if let Some(error) = state.failed.get(&rule) {
            return Err(error.clone());
        }

        let mut session = Session {
            cache: self,
            state: &mut *state,
            in_progress: FxHashMap::default(),
            done: FxHashMap::default(),
        };
        let result = session.resolve(rule);
        let done = session.done;
        if result.is_ok() {
            self.ready.write().extend(done);
        }
        result
    }

    /// Number of published matchers.
    pub fn len(&self) -> usize {
        self.ready.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.read().is_empty()
    }

    pub fn is_compiled(&self, rule: RuleId) -> bool {
        self.ready.read().contains_key(&rule)
    }

    /// Guard assigned to `rule`, if it closes a cycle.
    pub fn guard(&self, rule: RuleId) -> RecursionCheck {
        self.state
            .lock()
            .guards
            .get(&rule)
            .copied()
            .unwrap_or_default()
    }
}

/// One compile-or-fetch operation.
///
/// Matchers compiled here stay private to the session until it completes.
/// When any rule fails, everything compiled in the session is discarded:
/// those programs may hold placeholders for the failed rule.
struct Session<'c> {
    cache: &'c RuleCache,
    state: &'c mut CacheState,
    in_progress: FxHashMap<RuleId, Arc<Matcher>>,
    done: FxHashMap<RuleId, Arc<Matcher>>,
}

impl Session<'_> {
    fn guard(&mut self, rule: RuleId) -> RecursionCheck {
        let state = &mut *self.state;
        *state.guards.entry(rule).or_insert_with(|| {
            if state.next_bit < GUARD_BITS {
                let bit = state.next_bit;
                state.next_bit += 1;
                RecursionCheck::Bit(bit)
            } else {
                RecursionCheck::Walk
            }
        })
    }
}

impl Resolve for Session<'_> {
    fn resolve(&mut self, rule: RuleId) -> Result<Arc<Matcher>, CompileError> {
        if let Some(matcher) = self.cache.ready.read().get(&rule) {
            return Ok(Arc::clone(matcher));
        }
        if let Some(matcher) = self.done.get(&rule) {
            return Ok(Arc::clone(matcher));
        }
        if let Some(error) = self.state.failed.get(&rule) {
            return Err(error.clone());
        }
        if let Some(placeholder) = self.in_progress.get(&rule).cloned() {
            let guard = self.guard(rule);
            debug!(rule = placeholder.name(), ?guard, "cycle placeholder");
            return Ok(placeholder);
        }

        let cache = self.cache;
        let matcher = Arc::new(Matcher::declare(rule, cache.grammar.display_name(rule)));
        self.in_progress.insert(rule, Arc::clone(&matcher));
        let compiled = ensure_sufficient_stack(|| {
            Compiler::new(&cache.grammar, &*cache.model, self).compile(rule)
        });
        self.in_progress.remove(&rule);

        match compiled {
            Ok(mut program) => {
                if let Some(&guard) = self.state.guards.get(&rule) {
                    program.set_recursion(guard);
                }
                debug!(
                    rule = matcher.name(),
                    ops = program.ops().len(),
                    int_slots = program.int_slots(),
                    obj_slots = program.obj_slots(),
                    "compiled rule"
                );
                matcher.resolve(program)?;
                self.done.insert(rule, Arc::clone(&matcher));
                Ok(matcher)
            }
            Err(error) => {
                self.state.failed.insert(rule, error.clone());
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests;
