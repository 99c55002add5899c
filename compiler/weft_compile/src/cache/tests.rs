#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rayon::prelude::*;
use weft_bytecode::RecursionCheck;
use weft_ir::{Grammar, GrammarBuilder, GrammarError, Part, RecordModel, Rule, RuleId};

use super::{RuleCache, GUARD_BITS};
use crate::CompileError;

fn cache(f: impl FnOnce(&mut GrammarBuilder)) -> RuleCache {
    let mut b = Grammar::builder();
    f(&mut b);
    RuleCache::new(Arc::new(b.build().unwrap()), Arc::new(RecordModel::new()))
}

fn id(cache: &RuleCache, name: &str) -> RuleId {
    cache.grammar().lookup(name).unwrap()
}

#[test]
fn first_request_compiles_everything_reachable() {
    let cache = cache(|b| {
        let a = b.literal("a");
        let c = b.literal("c");
        b.rule("Pair", Rule::sequence(None, vec![Part::unnamed(a), Part::unnamed(c)]));
        b.rule("Unrelated", Rule::Eoi);
    });
    assert!(cache.is_empty());

    let pair = id(&cache, "Pair");
    cache.get(pair).unwrap();
    assert_eq!(cache.len(), 3);
    assert!(cache.is_compiled(RuleId::new(0)));
    assert!(cache.is_compiled(RuleId::new(1)));
    assert!(!cache.is_compiled(id(&cache, "Unrelated")));
}

#[test]
fn repeated_requests_share_one_matcher() {
    let cache = cache(|b| {
        b.rule("A", Rule::literal("a"));
    });
    let a = id(&cache, "A");
    let first = cache.get(a).unwrap();
    let second = cache.get(a).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn self_reference_is_closed_with_a_guarded_placeholder() {
    let cache = cache(|b| {
        let expr = b.declare("Expr");
        let plus = b.literal("+");
        let num = b.rule("Num", Rule::char_range([('0', '9')]));
        let sum = b.add(Rule::sequence(
            None,
            vec![Part::unnamed(expr), Part::unnamed(plus), Part::unnamed(num)],
        ));
        b.define(expr, Rule::alternative(vec![sum, num]));
    });
    let expr = id(&cache, "Expr");
    let matcher = cache.get(expr).unwrap();

    assert!(matcher.is_resolved());
    let program = matcher.program().unwrap();
    assert_eq!(program.recursion(), RecursionCheck::Bit(0));
    assert_eq!(cache.guard(expr), RecursionCheck::Bit(0));
    assert_eq!(cache.guard(id(&cache, "Num")), RecursionCheck::None);

    // The placeholder the inner sequence called is the published matcher.
    let sum = cache.get(RuleId::new(3)).unwrap();
    let callee = sum
        .program()
        .unwrap()
        .callee(weft_bytecode::CalleeIdx::new(0))
        .unwrap();
    assert!(Arc::ptr_eq(&callee, &matcher));
}

#[test]
fn only_the_rule_closing_a_cycle_is_guarded() {
    let cache = cache(|b| {
        let a = b.declare("A");
        let bb = b.declare("B");
        let x = b.literal("x");
        b.define(a, Rule::alternative(vec![bb, x]));
        b.define(bb, Rule::Optional(a));
    });
    let a = id(&cache, "A");
    let b = id(&cache, "B");
    cache.get(a).unwrap();

    assert_eq!(cache.guard(a), RecursionCheck::Bit(0));
    assert_eq!(cache.guard(b), RecursionCheck::None);
    assert!(cache.get(b).unwrap().is_resolved());
}

#[test]
fn guards_fall_back_to_frame_walks_when_bits_run_out() {
    let count = usize::from(GUARD_BITS) + 2;
    let cache = cache(|b| {
        for i in 0..count {
            let r = b.declare(format!("R{i}"));
            b.define(r, Rule::Optional(r));
        }
    });

    for i in 0..count {
        let rule = id(&cache, &format!("R{i}"));
        let program_guard = cache.get(rule).unwrap().program().unwrap().recursion();
        let expected = match u8::try_from(i) {
            Ok(bit) if bit < GUARD_BITS => RecursionCheck::Bit(bit),
            _ => RecursionCheck::Walk,
        };
        assert_eq!(program_guard, expected, "rule R{i}");
    }
}

#[test]
fn failures_are_cached_and_discard_the_session() {
    let cache = cache(|b| {
        let ok = b.rule("Ok", Rule::literal("a"));
        let bad = b.rule("Bad", Rule::literal(""));
        b.rule("Both", Rule::sequence(None, vec![Part::unnamed(ok), Part::unnamed(bad)]));
    });
    let both = id(&cache, "Both");
    let expected = CompileError::Grammar(GrammarError::EmptyLiteral {
        rule: "Bad".to_string(),
    });

    assert_eq!(cache.get(both).unwrap_err(), expected);
    assert_eq!(cache.get(both).unwrap_err(), expected);
    assert_eq!(cache.get(id(&cache, "Bad")).unwrap_err(), expected);

    // Compiled in the failed session, so not published; compiles on its own.
    let ok = id(&cache, "Ok");
    assert!(!cache.is_compiled(ok));
    assert!(cache.get(ok).is_ok());
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_requests_agree() {
    let cache = cache(|b| {
        let list = b.declare("List");
        let open = b.literal("(");
        let close = b.literal(")");
        let items = b.add(Rule::many(list));
        b.define(list, Rule::between(open, items, close));
    });
    let list = id(&cache, "List");

    let matchers: Vec<_> = (0..32)
        .into_par_iter()
        .map(|_| cache.get(list).unwrap())
        .collect();
    assert!(matchers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(cache.len(), 4);
}
