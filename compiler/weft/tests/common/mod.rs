//! Shared grammars for the integration tests.

#![allow(dead_code, reason = "each test binary uses a subset")]

use std::sync::Arc;

use weft::{Grammar, MemoMode, Node, NumberKind, Parser, Part, RecordModel, Rule, Value};

/// A JSON subset: objects, arrays, strings without escapes, and numbers.
///
/// Objects parse to `Object { members }` of `Member { key, value }`,
/// arrays to `Array { items }`.
pub fn json_parser(memo: MemoMode) -> Parser {
    let mut b = Grammar::builder();
    let value = b.declare("Value");

    let ws = b.rule("Ws", Rule::Whitespace);
    let comma = {
        let raw = b.literal(",");
        b.rule(
            "Comma",
            Rule::sequence(
                None,
                vec![Part::unnamed(ws), Part::unnamed(raw), Part::unnamed(ws)],
            ),
        )
    };

    let quote = b.literal("\"");
    let str_char = b.add(Rule::none_of("\""));
    let body = b.rule("StrBody", Rule::many(str_char).collect_text());
    let string = b.rule("Str", Rule::surround(quote, body));
    let number = b.rule("Num", Rule::number(NumberKind::Any));

    let open_bracket = b.literal("[");
    let close_bracket = b.literal("]");
    let items = b.rule("Items", Rule::many(value).with_separator(comma));
    let array = b.rule(
        "Array",
        Rule::sequence(
            Some("Array"),
            vec![
                Part::unnamed(open_bracket),
                Part::named("items", items),
                Part::unnamed(close_bracket),
            ],
        )
        .with_separator(ws),
    );

    let colon = b.literal(":");
    let member = b.rule(
        "Member",
        Rule::sequence(
            Some("Member"),
            vec![
                Part::named("key", string),
                Part::unnamed(colon),
                Part::named("value", value),
            ],
        )
        .with_separator(ws),
    );
    let open_brace = b.literal("{");
    let close_brace = b.literal("}");
    let members = b.rule("Members", Rule::many(member).with_separator(comma));
    let object = b.rule(
        "Object",
        Rule::sequence(
            Some("Object"),
            vec![
                Part::unnamed(open_brace),
                Part::named("members", members),
                Part::unnamed(close_brace),
            ],
        )
        .with_separator(ws),
    );

    b.define(value, Rule::alternative(vec![object, array, string, number]));
    let grammar = b.build().unwrap();

    let model = RecordModel::new()
        .record("Object", ["members"])
        .record("Member", ["key", "value"])
        .record("Array", ["items"]);
    Parser::builder(grammar, value)
        .object_model(Arc::new(model))
        .memo(memo)
        .require_end(true)
        .build()
        .unwrap()
}

pub fn array(items: Vec<Value>) -> Value {
    Value::node(Node::new("Array").with("items", Value::list(items)))
}

pub fn object(members: Vec<(&str, Value)>) -> Value {
    let members = members
        .into_iter()
        .map(|(key, value)| {
            Value::node(
                Node::new("Member")
                    .with("key", Value::str(key))
                    .with("value", value),
            )
        })
        .collect();
    Value::node(Node::new("Object").with("members", Value::list(members)))
}
