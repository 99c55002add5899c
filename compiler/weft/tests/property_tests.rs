//! Property-based tests for the matching contract.
//!
//! 1. Literals match exactly themselves and never a strict prefix.
//! 2. A sequence that fails part-way consumes nothing.
//! 3. Alternatives prefer the first listed candidate.
//! 4. Repeat bounds hold for every input length.
//! 5. Memoization never changes an outcome.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use weft::{Grammar, GrammarBuilder, MemoMode, Parser, Part, Rule, RuleId, Value};

fn parser(memo: MemoMode, f: impl FnOnce(&mut GrammarBuilder) -> RuleId) -> Parser {
    let mut b = Grammar::builder();
    let entry = f(&mut b);
    Parser::builder(b.build().unwrap(), entry)
        .memo(memo)
        .build()
        .unwrap()
}

/// Everything `entry` consumed, as text.
fn consumed(b: &mut GrammarBuilder, entry: RuleId) -> RuleId {
    b.add(Rule::Capture(entry))
}

// -- Strategies --

fn literal_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 +ßλ字]{1,12}").expect("valid regex")
}

fn ambiguous_input() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ab(),]{0,14}").expect("valid regex")
}

/// `S := '(' L ')' | '(' ')' | 'a' 'b'? | 'b'`, `L := S (',' S)*`.
///
/// Heavily backtracking: both parenthesized branches re-parse from the
/// same `(`.
fn nested_grammar(memo: MemoMode) -> Parser {
    parser(memo, |b| {
        let s = b.declare("S");
        let open = b.literal("(");
        let close = b.literal(")");
        let comma = b.literal(",");
        let a = b.literal("a");
        let bee = b.literal("b");
        let list = b.rule("L", Rule::many1(s).with_separator(comma));
        let group = b.add(Rule::sequence(
            None,
            vec![Part::unnamed(open), Part::unnamed(list), Part::unnamed(close)],
        ));
        let unit = b.add(Rule::sequence(
            None,
            vec![Part::unnamed(open), Part::unnamed(close)],
        ));
        let maybe_b = b.add(Rule::Optional(bee));
        let ab = b.add(Rule::sequence(
            None,
            vec![Part::unnamed(a), Part::unnamed(maybe_b)],
        ));
        b.define(s, Rule::alternative(vec![group, unit, ab, bee]));
        let many = b.rule("Doc", Rule::many(s));
        consumed(b, many)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn literal_matches_itself_and_no_prefix(text in literal_strategy()) {
        let p = parser(MemoMode::Precise, |b| b.rule("L", Rule::literal(text.as_str())));
        prop_assert_eq!(p.parse(&text).unwrap(), Value::str(text.as_str()));

        let chars: Vec<char> = text.chars().collect();
        for cut in 0..chars.len() {
            let prefix: String = chars[..cut].iter().collect();
            prop_assert_eq!(p.try_parse(&prefix).unwrap(), None);
        }
    }

    #[test]
    fn failed_sequence_consumes_nothing(
        first in "[a-m]{1,6}",
        second in "[n-z]{1,6}",
        tail in "[0-9]{0,6}",
    ) {
        // `(first second) | .*`: when the sequence fails after `first`,
        // the fallback must still see the whole input.
        let p = parser(MemoMode::Precise, |b| {
            let a = b.literal(&first);
            let c = b.literal(&second);
            let seq = b.add(Rule::sequence(None, vec![Part::unnamed(a), Part::unnamed(c)]));
            let rest = b.add(Rule::regex("(?s).*"));
            b.rule("S", Rule::alternative(vec![seq, rest]))
        });
        let input = format!("{first}{tail}");
        prop_assert_eq!(p.parse(&input).unwrap(), Value::str(input.as_str()));
    }

    #[test]
    fn first_listed_candidate_wins(head in "[a-z]{1,5}", more in "[a-z]{1,5}") {
        let long = format!("{head}{more}");
        let pick = |order_long_first: bool| {
            parser(MemoMode::Precise, |b| {
                let l = b.literal(&long);
                let h = b.literal(&head);
                let candidates = if order_long_first { vec![l, h] } else { vec![h, l] };
                b.rule("S", Rule::alternative(candidates))
            })
            .parse(&long)
            .unwrap()
        };
        prop_assert_eq!(pick(true), Value::str(long.as_str()));
        prop_assert_eq!(pick(false), Value::str(head.as_str()));
    }

    #[test]
    fn repeat_respects_its_bounds(digits in "[0-9]{0,9}") {
        let p = parser(MemoMode::Precise, |b| {
            let digit = b.add(Rule::char_range([('0', '9')]));
            let rep = b.add(Rule::repeat(digit, 2, Some(4)));
            consumed(b, rep)
        });
        let n = digits.len();
        let expected = (n >= 2).then(|| Value::str(&digits[..n.min(4)]));
        prop_assert_eq!(p.try_parse(&digits).unwrap(), expected);
    }

    #[test]
    fn memo_modes_agree(input in ambiguous_input()) {
        let results: Vec<_> = MemoMode::ALL
            .iter()
            .map(|&mode| nested_grammar(mode).try_parse(&input).unwrap())
            .collect();
        prop_assert_eq!(&results[0], &results[1]);
        prop_assert_eq!(&results[1], &results[2]);
    }
}

#[test]
fn repeat_bounds_on_fixed_inputs() {
    let p = parser(MemoMode::Precise, |b| {
        let digit = b.add(Rule::char_range([('0', '9')]));
        let rep = b.add(Rule::repeat(digit, 2, Some(4)));
        consumed(b, rep)
    });
    assert_eq!(p.parse("123456").unwrap(), Value::str("1234"));
    assert_eq!(p.try_parse("1").unwrap(), None);
    assert_eq!(p.try_parse("").unwrap(), None);
}

#[test]
fn empty_element_match_satisfies_the_minimum() {
    // `('a'?){2,3}`: the element never fails, so neither does the repeat.
    let p = parser(MemoMode::Precise, |b| {
        let a = b.literal("a");
        let maybe_a = b.add(Rule::Optional(a));
        let rep = b.add(Rule::repeat(maybe_a, 2, Some(3)));
        consumed(b, rep)
    });
    assert_eq!(p.try_parse("").unwrap(), Some(Value::str("")));
    assert_eq!(p.try_parse("b").unwrap(), Some(Value::str("")));
    assert_eq!(p.try_parse("a").unwrap(), Some(Value::str("a")));
    assert_eq!(p.try_parse("aaaa").unwrap(), Some(Value::str("aaa")));
}

#[test]
fn memo_saves_work_on_the_nested_grammar() {
    let text = "((a,b),(ab,()))";
    let (off, off_stats) = nested_grammar(MemoMode::Off)
        .parse_with(text, None, Value::Null)
        .unwrap();
    let (on, on_stats) = nested_grammar(MemoMode::Precise)
        .parse_with(text, None, Value::Null)
        .unwrap();
    assert_eq!(off, on);
    assert_eq!(on, Value::str(text));
    assert!(on_stats.memo_hits > 0);
    assert!(on_stats.calls <= off_stats.calls);
    assert_eq!(off_stats.memo_hits, 0);
}
