#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use crate::{Grammar, NumberKind, OutputType, Part, Rule};

#[test]
fn join_widens_numbers_then_everything_else() {
    assert_eq!(OutputType::Int.join(&OutputType::Int), OutputType::Int);
    assert_eq!(OutputType::Int.join(&OutputType::Float), OutputType::Number);
    assert_eq!(OutputType::Number.join(&OutputType::Float), OutputType::Number);
    assert_eq!(OutputType::Text.join(&OutputType::Char), OutputType::Any);
    assert_eq!(OutputType::Void.join(&OutputType::Text), OutputType::Any);
}

#[test]
fn scalars_are_char_and_int() {
    assert!(OutputType::Char.is_scalar());
    assert!(OutputType::Int.is_scalar());
    assert!(!OutputType::Float.is_scalar());
    assert!(!OutputType::Text.is_scalar());
}

#[test]
fn primitive_outputs() {
    let mut g = Grammar::builder();
    let lit = g.literal("a");
    let digit = g.add(Rule::char_range([('0', '9')]));
    let int = g.add(Rule::number(NumberKind::Integer));
    let num = g.add(Rule::number(NumberKind::Any));
    let ws = g.add(Rule::Whitespace);
    let loc = g.add(Rule::Location);
    let grammar = g.build().unwrap();

    assert_eq!(grammar.output_type(lit), Some(&OutputType::Text));
    assert_eq!(grammar.output_type(digit), Some(&OutputType::Char));
    assert_eq!(grammar.output_type(int), Some(&OutputType::Int));
    assert_eq!(grammar.output_type(num), Some(&OutputType::Number));
    assert_eq!(grammar.output_type(ws), Some(&OutputType::Void));
    assert_eq!(grammar.output_type(loc), Some(&OutputType::Int));
}

#[test]
fn composite_outputs() {
    let mut g = Grammar::builder();
    let digit = g.add(Rule::char_range([('0', '9')]));
    let digits = g.add(Rule::many1(digit));
    let text = g.add(Rule::many1(digit).collect_text());
    let opt_digit = g.add(Rule::Optional(digit));
    let opt_text = g.add(Rule::Optional(text));
    let pair = g.add(Rule::sequence(Some("Pair"), vec![Part::named("a", digit)]));
    let untyped = g.add(Rule::sequence(None, vec![Part::unnamed(digit)]));
    let not = g.add(Rule::Not(digit));
    let grammar = g.build().unwrap();

    assert_eq!(grammar.output_type(digits), Some(&OutputType::List));
    assert_eq!(grammar.output_type(text), Some(&OutputType::Text));
    assert_eq!(grammar.output_type(opt_digit), Some(&OutputType::Any));
    assert_eq!(grammar.output_type(opt_text), Some(&OutputType::Text));
    assert_eq!(
        grammar.output_type(pair),
        Some(&OutputType::Object("Pair".into()))
    );
    assert_eq!(grammar.output_type(untyped), Some(&OutputType::Void));
    assert_eq!(grammar.output_type(not), Some(&OutputType::Void));
}

#[test]
fn alternative_joins_candidates() {
    let mut g = Grammar::builder();
    let int = g.add(Rule::number(NumberKind::Integer));
    let float = g.add(Rule::number(NumberKind::Float));
    let lit = g.literal("x");
    let nums = g.add(Rule::alternative(vec![int, float]));
    let mixed = g.add(Rule::alternative(vec![int, lit]));
    let based = g.add(Rule::alternative_of("Expr", vec![lit]));
    let grammar = g.build().unwrap();

    assert_eq!(grammar.output_type(nums), Some(&OutputType::Number));
    assert_eq!(grammar.output_type(mixed), Some(&OutputType::Any));
    assert_eq!(
        grammar.output_type(based),
        Some(&OutputType::Object("Expr".into()))
    );
}

#[test]
fn cyclic_rules_converge() {
    // Expr := Expr '+' Num | Num, with an untyped sequence: the alternative
    // joins void and int.
    let mut g = Grammar::builder();
    let expr = g.declare("Expr");
    let num = g.add(Rule::number(NumberKind::Integer));
    let plus = g.literal("+");
    let add = g.add(Rule::sequence(
        Some("Add"),
        vec![Part::named("l", expr), Part::unnamed(plus), Part::named("r", num)],
    ));
    g.define(expr, Rule::alternative(vec![add, num]));
    let grammar = g.build().unwrap();
    assert_eq!(grammar.output_type(expr), Some(&OutputType::Any));

    // A pure cycle with no base case stays unknown and becomes Any.
    let mut g = Grammar::builder();
    let a = g.declare("A");
    g.define(a, Rule::alternative(vec![a]));
    let grammar = g.build().unwrap();
    assert_eq!(grammar.output_type(a), Some(&OutputType::Any));
}

#[test]
fn display_is_readable() {
    assert_eq!(OutputType::Object("Pair".into()).to_string(), "object `Pair`");
    assert_eq!(OutputType::Void.to_string(), "void");
}
