//! `ParserBuilder` for configuring a [`Parser`].

use std::sync::Arc;

use tracing::debug;
use weft_compile::RuleCache;
use weft_ir::{Grammar, ObjectModel, RecordModel, RuleId};
use weft_vm::{ContextPool, MemoMode};

use super::Parser;
use crate::Result;

/// Builder for [`Parser`].
///
/// Defaults: an empty [`RecordModel`], [`MemoMode::Precise`], prefix
/// matches accepted, and a context pool of [`ContextPool::DEFAULT_CAPACITY`]
/// idle buffers.
pub struct ParserBuilder {
    grammar: Arc<Grammar>,
    entry: RuleId,
    model: Option<Arc<dyn ObjectModel>>,
    memo: MemoMode,
    require_end: bool,
    pool_capacity: usize,
}

impl ParserBuilder {
    pub(super) fn new(grammar: Arc<Grammar>, entry: RuleId) -> Self {
        Self {
            grammar,
            entry,
            model: None,
            memo: MemoMode::default(),
            require_end: false,
            pool_capacity: ContextPool::DEFAULT_CAPACITY,
        }
    }

    /// Set the object model used to construct typed sequence results.
    #[must_use]
    pub fn object_model(mut self, model: Arc<dyn ObjectModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the memoization mode.
    ///
    /// [`MemoMode::Aggressive`] ignores the left-recursion guard when
    /// keying results and can return wrong answers for recursive grammars.
    #[must_use]
    pub fn memo(mut self, mode: MemoMode) -> Self {
        self.memo = mode;
        self
    }

    /// Require the entry rule to consume the whole input.
    #[must_use]
    pub fn require_end(mut self, require: bool) -> Self {
        self.require_end = require;
        self
    }

    /// Maximum number of idle per-parse buffers kept for reuse.
    #[must_use]
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Compile the entry rule and everything it reaches.
    ///
    /// Grammar errors surface here rather than on the first parse.
    pub fn build(self) -> Result<Parser> {
        let model = self
            .model
            .unwrap_or_else(|| Arc::new(RecordModel::new()));
        let cache = RuleCache::new(Arc::clone(&self.grammar), model);
        let entry = cache.get(self.entry)?;
        let name = self.grammar.display_name(self.entry);
        debug!(
            entry = %name,
            rules = cache.len(),
            memo = %self.memo,
            "parser ready"
        );
        Ok(Parser {
            cache,
            entry,
            name,
            pool: ContextPool::with_capacity(self.pool_capacity),
            memo: self.memo,
            require_end: self.require_end,
        })
    }
}
