//! Memoization.
//!
//! Outcomes of concrete rules are cached per parse, keyed by rule and
//! start position. In [`MemoMode::Precise`] the key also carries the
//! recursion mask active at that position: a rule entered while some
//! left-recursive rule is being cut may fail where it would otherwise
//! succeed, and that outcome must not leak into other contexts.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use thiserror::Error;
use weft_bytecode::Ret;
use weft_ir::RuleId;

/// How rule outcomes are cached within one parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoMode {
    /// No caching. Exponential on some grammars.
    Off,
    /// Keyed by rule, position and the active recursion mask.
    #[default]
    Precise,
    /// Keyed by rule and position only. Faster, but may replay an outcome
    /// computed under a different recursion context, so some left-recursive
    /// grammars parse differently than with `Precise`.
    Aggressive,
}

impl MemoMode {
    pub const ALL: [MemoMode; 3] = [MemoMode::Off, MemoMode::Precise, MemoMode::Aggressive];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoMode::Off => "off",
            MemoMode::Precise => "precise",
            MemoMode::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for MemoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown memo mode `{0}` (expected off, precise or aggressive)")]
pub struct UnknownMemoMode(pub String);

/// Case-insensitive, surrounding whitespace ignored.
impl FromStr for MemoMode {
    type Err = UnknownMemoMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| UnknownMemoMode(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    pub(crate) rule: RuleId,
    pub(crate) pos: usize,
    pub(crate) mask: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum MemoEntry {
    Success { end: usize, ret: Ret },
    Failure,
}

/// Outcomes recorded during one parse.
#[derive(Debug, Default)]
pub(crate) struct MemoTable {
    entries: FxHashMap<MemoKey, MemoEntry>,
}

/// Entries kept allocated between parses.
const RETAINED_CAPACITY: usize = 1 << 14;

impl MemoTable {
    #[inline]
    pub(crate) fn get(&self, key: &MemoKey) -> Option<&MemoEntry> {
        self.entries.get(key)
    }

    #[inline]
    pub(crate) fn record(&mut self, key: MemoKey, entry: MemoEntry) {
        self.entries.insert(key, entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Forget everything, keeping a bounded allocation for reuse.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.entries.shrink_to(RETAINED_CAPACITY);
    }
}

#[cfg(test)]
mod tests;
