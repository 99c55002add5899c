//! The parse entry points.
//!
//! A [`Parser`] owns the compiled matchers of one entry rule and a pool of
//! per-parse buffers. It is `Send + Sync`; concurrent parses share the
//! matchers and each draw their own buffers.

mod builder;

use std::sync::Arc;

use tracing::{error, trace};
use weft_bytecode::Matcher;
use weft_compile::RuleCache;
use weft_ir::{EngineFault, Grammar, RuleId, Value};
use weft_vm::{ContextPool, MemoMode, ParseState, ParseStats, TraceSink};

pub use builder::ParserBuilder;

use crate::{Error, FromValue, ParseError, Result};

/// A compiled grammar, ready to parse from one entry rule.
pub struct Parser {
    /// Owns every matcher reachable from `entry`; callees only hold weak
    /// references to each other.
    cache: RuleCache,
    entry: Arc<Matcher>,
    name: String,
    pool: ContextPool,
    memo: MemoMode,
    require_end: bool,
}

/// Raw outcome of one run of the entry rule.
struct Run {
    value: Option<Value>,
    end: usize,
    furthest: usize,
    stats: ParseStats,
}

impl Parser {
    pub fn builder(grammar: impl Into<Arc<Grammar>>, entry: RuleId) -> ParserBuilder {
        ParserBuilder::new(grammar.into(), entry)
    }

    pub fn grammar(&self) -> &Grammar {
        self.cache.grammar()
    }

    pub fn entry(&self) -> RuleId {
        self.entry.rule()
    }

    pub fn memo_mode(&self) -> MemoMode {
        self.memo
    }

    /// Number of rules compiled for this parser.
    pub fn compiled_rules(&self) -> usize {
        self.cache.len()
    }

    /// Parse `text` from the start.
    ///
    /// Fails with [`ParseError::NoMatch`] when the entry rule does not
    /// match, and with [`ParseError::TrailingInput`] when it matches only a
    /// prefix of a parser built with `require_end(true)`.
    pub fn parse(&self, text: &str) -> Result<Value> {
        self.parse_with(text, None, Value::Null)
            .map(|(value, _)| value)
    }

    /// Like [`parse`](Self::parse), but a parse failure is `Ok(None)`.
    /// Grammar errors and engine faults are still errors.
    pub fn try_parse(&self, text: &str) -> Result<Option<Value>> {
        Ok(self
            .try_parse_with(text, None, Value::Null)?
            .map(|(value, _)| value))
    }

    /// Parse and convert the result.
    pub fn parse_as<T: FromValue>(&self, text: &str) -> Result<T> {
        T::from_value(self.parse(text)?)
    }

    pub fn try_parse_as<T: FromValue>(&self, text: &str) -> Result<Option<T>> {
        self.try_parse(text)?.map(T::from_value).transpose()
    }

    /// Parse with a trace sink and a user object, also returning the
    /// parse statistics.
    ///
    /// `user` is what `UserObject` rules produce.
    pub fn parse_with(
        &self,
        text: &str,
        trace: Option<&mut dyn TraceSink>,
        user: Value,
    ) -> Result<(Value, ParseStats)> {
        let run = self.run(text, trace, user)?;
        let stats = run.stats;
        Ok((self.accept(run, text.len())?, stats))
    }

    /// [`parse_with`](Self::parse_with) with parse failures as `Ok(None)`.
    pub fn try_parse_with(
        &self,
        text: &str,
        trace: Option<&mut dyn TraceSink>,
        user: Value,
    ) -> Result<Option<(Value, ParseStats)>> {
        match self.parse_with(text, trace, user) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(Error::Parse(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn run(
        &self,
        text: &str,
        trace: Option<&mut dyn TraceSink>,
        user: Value,
    ) -> Result<Run, EngineFault> {
        trace!(entry = %self.name, len = text.len(), "parse");
        let mut buffers = self.pool.acquire();
        let mut state = ParseState::new(text, &**self.cache.model(), &mut buffers)
            .with_memo(self.memo)
            .with_user(user);
        if let Some(sink) = trace {
            state = state.with_trace(sink);
        }
        let value = state.match_rule(&self.entry).inspect_err(|fault| {
            error!(entry = %self.name, %fault, "engine fault");
        })?;
        Ok(Run {
            value,
            end: state.pos(),
            furthest: state.furthest(),
            stats: state.stats(),
        })
    }

    fn accept(&self, run: Run, len: usize) -> Result<Value, ParseError> {
        match run.value {
            None => Err(ParseError::NoMatch {
                rule: self.name.clone(),
                furthest: run.furthest,
            }),
            Some(_) if self.require_end && run.end < len => Err(ParseError::TrailingInput {
                rule: self.name.clone(),
                end: run.end,
            }),
            Some(value) => Ok(value),
        }
    }
}
