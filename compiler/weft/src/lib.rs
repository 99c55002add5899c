//! Weft - a declarative parser generator.
//!
//! Grammars are built as a graph of rule nodes, compiled lazily into
//! matcher programs, and run on a backtracking virtual machine with
//! memoization and a left-recursion guard.
//!
//! # Usage
//!
//! ```
//! use weft::{Grammar, NumberKind, Parser, Part, Rule, Value};
//!
//! let mut b = Grammar::builder();
//! let num = b.rule("Num", Rule::number(NumberKind::Integer));
//! let comma = b.literal(",");
//! let list = b.rule("List", Rule::many1(num).with_separator(comma));
//! let grammar = b.build()?;
//!
//! let parser = Parser::builder(grammar, list).require_end(true).build()?;
//! let values: Vec<i64> = parser.parse_as("1,2,3")?;
//! assert_eq!(values, [1, 2, 3]);
//! assert!(parser.try_parse("1,,2")?.is_none());
//! # Ok::<(), weft::Error>(())
//! ```
//!
//! # Crates
//!
//! - `weft_ir`: rule nodes, output types, values, the object model.
//! - `weft_bytecode`: the matcher instruction set and programs.
//! - `weft_compile`: rule-to-program compilation and the rule cache.
//! - `weft_vm`: the interpreter and the parsing context.
//!
//! # Tracing
//!
//! Diagnostics go through `tracing`. Call [`init_tracing`] and set
//! `RUST_LOG=weft_compile=debug` to see rules as they are compiled, or
//! `RUST_LOG=weft_vm=trace` for memo hits and recursion cuts.

mod convert;
mod error;
mod parser;

use std::sync::Once;

pub use convert::FromValue;
pub use error::{Error, ParseError, Result};
pub use parser::{Parser, ParserBuilder};

pub use weft_compile::CompileError;
pub use weft_ir::{
    Collect, EngineFault, Grammar, GrammarBuilder, GrammarError, Name, Node, NumberKind,
    ObjectModel, OutputType, Part, RecordModel, Rule, RuleFlags, RuleId, SlotError, Value,
};
pub use weft_vm::{MemoMode, ParseStats, TraceSink, UnknownMemoMode};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            // Another subscriber may already be installed by the host.
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init();
        }
    });
}
