//! Weft IR - grammar rule nodes and parse values.
//!
//! This crate holds everything the compiler and the virtual machine agree on
//! without depending on each other:
//!
//! - **Rule arena** ([`Grammar`], [`GrammarBuilder`], [`Rule`], [`RuleId`]):
//!   declarative rule nodes with stable identities. Identities are assigned
//!   up front so cyclic grammars can refer to rules before they are defined.
//!
//! - **Output types** ([`OutputType`]): the declared value type of every
//!   rule, inferred once per grammar by fixpoint iteration over the rule
//!   graph.
//!
//! - **Values** ([`Value`], [`Node`]): the typed tree a successful parse
//!   produces.
//!
//! - **Object model** ([`ObjectModel`], [`RecordModel`]): the capability the
//!   core uses to construct output objects and write their slots. The core
//!   never inspects type metadata directly.
//!
//! - **Errors** ([`GrammarError`], [`EngineFault`]): the two fatal error
//!   classes. Ordinary parse failure is not an error; it is the `false`
//!   branch of every matcher.

mod errors;
mod grammar;
mod model;
mod output;
mod value;

use std::sync::Arc;

pub use errors::{EngineFault, GrammarError, SlotError};
pub use grammar::{
    Collect, Grammar, GrammarBuilder, NumberKind, Part, Rule, RuleDef, RuleFlags, RuleId,
};
pub use model::{ObjectModel, RecordModel};
pub use output::OutputType;
pub use value::{Node, Value};

/// Shared, immutable identifier for type names and slot names.
pub type Name = Arc<str>;
