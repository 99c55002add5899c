#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;
use weft_bytecode::{Matcher, ObjSlot, Op, Operand, Program, Slot};
use weft_ir::{
    Grammar, GrammarBuilder, GrammarError, NumberKind, OutputType, Part, RecordModel, Rule,
    RuleFlags, RuleId,
};

use super::{Compiler, Resolve};
use crate::CompileError;

/// Hands out unfilled matchers and remembers what was asked for.
#[derive(Default)]
struct Stubs {
    matchers: FxHashMap<RuleId, Arc<Matcher>>,
    requested: Vec<RuleId>,
}

impl Resolve for Stubs {
    fn resolve(&mut self, rule: RuleId) -> Result<Arc<Matcher>, CompileError> {
        self.requested.push(rule);
        let matcher = self
            .matchers
            .entry(rule)
            .or_insert_with(|| Arc::new(Matcher::declare(rule, format!("stub{rule}"))));
        Ok(Arc::clone(matcher))
    }
}

fn json_model() -> RecordModel {
    RecordModel::new()
        .abstract_type("Json")
        .record("Member", ["key", "value"])
        .record("Object", ["members"])
        .with_base("Object", "Json")
        .record("Array", ["items"])
        .with_base("Array", "Json")
}

fn build(f: impl FnOnce(&mut GrammarBuilder) -> RuleId) -> (Grammar, RuleId) {
    let mut b = Grammar::builder();
    let entry = f(&mut b);
    (b.build().unwrap(), entry)
}

fn compile_with(
    grammar: &Grammar,
    rule: RuleId,
    stubs: &mut Stubs,
) -> Result<Program, CompileError> {
    let model = json_model();
    Compiler::new(grammar, &model, stubs).compile(rule)
}

fn compile(grammar: &Grammar, rule: RuleId) -> Result<Program, CompileError> {
    compile_with(grammar, rule, &mut Stubs::default())
}

fn grammar_error(grammar: &Grammar, rule: RuleId) -> GrammarError {
    match compile(grammar, rule) {
        Err(CompileError::Grammar(e)) => e,
        other => panic!("expected a grammar error, got {other:?}"),
    }
}

fn has_op(program: &Program, pred: impl Fn(&Op) -> bool) -> bool {
    program.ops().iter().any(pred)
}

// ── Primitives ──────────────────────────────────────────────────

#[test]
fn literal_compiles_to_a_peek_chain() {
    let (g, lit) = build(|b| b.literal("ab"));
    let program = compile(&g, lit).unwrap();

    assert_eq!(
        program.to_string(),
        "program literal#0 (#0) -> text [int 2, obj 1] result o0\n\
         \x20   0: i0 = pos\n\
         \x20   1: i1 = peek\n\
         \x20   2: jump_if i1 != 97 -> L0\n\
         \x20   3: advance 1\n\
         \x20   4: i1 = peek\n\
         \x20   5: jump_if i1 != 98 -> L0\n\
         \x20   6: advance 1\n\
         \x20   7: o0 = k0\n\
         \x20   8: return ok\n\
         L0:\n\
         \x20   9: pos = i0\n\
         \x20  10: return fail\n"
    );
    assert!(program.is_concrete());
    assert!(program.is_traced());
}

#[test]
fn empty_literal_is_rejected() {
    let (g, lit) = build(|b| b.rule("Nothing", Rule::literal("")));
    assert_eq!(
        grammar_error(&g, lit),
        GrammarError::EmptyLiteral {
            rule: "Nothing".to_string()
        }
    );
}

#[test]
fn case_insensitive_literal_folds_before_comparing() {
    let (g, kw) = build(|b| b.add(Rule::keyword("Select")));
    let program = compile(&g, kw).unwrap();
    assert!(has_op(&program, |op| matches!(op, Op::JumpIfObjEq { .. })));
    assert_eq!(program.result(), Some(Slot::Obj(ObjSlot::new(0))));
}

#[test]
fn character_class_errors() {
    let (g, set) = build(|b| {
        b.rule(
            "Set",
            Rule::CharSet {
                chars: Vec::new(),
                negated: false,
            },
        )
    });
    assert_eq!(
        grammar_error(&g, set),
        GrammarError::EmptyCharSet {
            rule: "Set".to_string()
        }
    );

    let (g, range) = build(|b| b.rule("Range", Rule::char_range([('a', 'f'), ('z', 'a')])));
    assert_eq!(
        grammar_error(&g, range),
        GrammarError::InvalidCharRange {
            rule: "Range".to_string(),
            lo: 'z',
            hi: 'a',
        }
    );
}

#[test]
fn character_class_result_is_unboxed() {
    let (g, digit) = build(|b| b.add(Rule::char_range([('0', '9')])));
    let program = compile(&g, digit).unwrap();
    assert_eq!(program.output(), &OutputType::Char);
    assert!(matches!(program.result(), Some(Slot::Int(_))));
    assert_eq!(program.obj_slots(), 0);
}

#[test]
fn invalid_regex_is_a_grammar_error() {
    let (g, re) = build(|b| b.rule("Broken", Rule::regex("(")));
    assert!(matches!(
        grammar_error(&g, re),
        GrammarError::InvalidRegex { rule, .. } if rule == "Broken"
    ));
}

#[test]
fn layout_primitives_are_void() {
    for rule in [Rule::Whitespace, Rule::Eol, Rule::Eoi] {
        let (g, id) = build(|b| b.add(rule));
        let program = compile(&g, id).unwrap();
        assert_eq!(program.result(), None);
        assert_eq!(program.output(), &OutputType::Void);
    }
}

// ── Sequence ────────────────────────────────────────────────────

#[test]
fn typed_sequence_constructs_and_writes_named_parts() {
    let mut stubs = Stubs::default();
    let (g, member) = build(|b| {
        let key = b.add(Rule::regex("[a-z]+"));
        let colon = b.literal(":");
        let value = b.add(Rule::number(NumberKind::Integer));
        b.rule(
            "Member",
            Rule::sequence(
                Some("Member"),
                vec![
                    Part::named("key", key),
                    Part::unnamed(colon),
                    Part::named("value", value),
                ],
            ),
        )
    });
    let program = compile_with(&g, member, &mut stubs).unwrap();

    assert_eq!(program.output(), &OutputType::Object("Member".into()));
    assert!(has_op(&program, |op| matches!(op, Op::Construct { ty, .. } if &**ty == "Member")));
    let fields: Vec<&str> = program
        .ops()
        .iter()
        .filter_map(|op| match op {
            Op::SetField { field, .. } => Some(&**field),
            _ => None,
        })
        .collect();
    assert_eq!(fields, ["key", "value"]);
    // The integer value is boxed before it is written.
    assert!(has_op(&program, |op| matches!(op, Op::Box { .. })));
    assert_eq!(
        program.callee_rules().collect::<Vec<_>>(),
        [RuleId::new(0), RuleId::new(1), RuleId::new(2)]
    );
}

#[test]
fn separators_are_called_between_parts_only() {
    let mut stubs = Stubs::default();
    let (g, seq) = build(|b| {
        let a = b.literal("a");
        let c = b.literal("c");
        let ws = b.add(Rule::Whitespace);
        b.add(Rule::sequence(None, vec![Part::unnamed(a), Part::unnamed(c)]).with_separator(ws))
    });
    compile_with(&g, seq, &mut stubs).unwrap();
    assert_eq!(
        stubs.requested,
        [RuleId::new(0), RuleId::new(2), RuleId::new(1)]
    );
}

#[test]
fn sequence_type_errors() {
    let (g, seq) = build(|b| {
        let a = b.literal("a");
        b.rule("S", Rule::sequence(Some("Missing"), vec![Part::unnamed(a)]))
    });
    assert_eq!(
        grammar_error(&g, seq),
        GrammarError::UnknownType {
            rule: "S".to_string(),
            ty: "Missing".to_string(),
        }
    );

    let (g, seq) = build(|b| {
        let a = b.literal("a");
        b.rule("S", Rule::sequence(Some("Json"), vec![Part::unnamed(a)]))
    });
    assert_eq!(
        grammar_error(&g, seq),
        GrammarError::AbstractType {
            rule: "S".to_string(),
            ty: "Json".to_string(),
        }
    );
}

#[test]
fn sequence_slot_errors() {
    let (g, seq) = build(|b| {
        let a = b.literal("a");
        b.rule("S", Rule::sequence(Some("Member"), vec![Part::named("nope", a)]))
    });
    assert_eq!(
        grammar_error(&g, seq),
        GrammarError::UnknownSlot {
            rule: "S".to_string(),
            ty: "Member".to_string(),
            slot: "nope".to_string(),
        }
    );

    let (g, seq) = build(|b| {
        let ws = b.add(Rule::Whitespace);
        b.rule("S", Rule::sequence(Some("Member"), vec![Part::named("key", ws)]))
    });
    assert_eq!(
        grammar_error(&g, seq),
        GrammarError::VoidSlot {
            rule: "S".to_string(),
            slot: "key".to_string(),
        }
    );

    let (g, seq) = build(|b| {
        let a = b.literal("a");
        b.rule("S", Rule::sequence(None, vec![Part::named("key", a)]))
    });
    assert_eq!(
        grammar_error(&g, seq),
        GrammarError::UntypedNamedPart {
            rule: "S".to_string(),
            slot: "key".to_string(),
        }
    );
}

// ── Alternative ─────────────────────────────────────────────────

#[test]
fn alternative_tries_candidates_in_declaration_order() {
    let mut stubs = Stubs::default();
    let (g, alt) = build(|b| {
        let x = b.literal("x");
        let y = b.literal("y");
        let z = b.literal("z");
        b.add(Rule::alternative(vec![z, x, y]))
    });
    let program = compile_with(&g, alt, &mut stubs).unwrap();
    assert_eq!(
        stubs.requested,
        [RuleId::new(2), RuleId::new(0), RuleId::new(1)]
    );
    assert!(!program.is_concrete());
}

#[test]
fn scalar_candidates_are_boxed_into_a_widened_result() {
    let (g, alt) = build(|b| {
        let digit = b.add(Rule::char_range([('0', '9')]));
        let word = b.add(Rule::regex("[a-z]+"));
        b.add(Rule::alternative(vec![digit, word]))
    });
    let program = compile(&g, alt).unwrap();
    assert_eq!(program.output(), &OutputType::Any);
    assert!(matches!(program.result(), Some(Slot::Obj(_))));
    assert!(has_op(&program, |op| matches!(op, Op::Box { .. })));
}

#[test]
fn alternative_errors() {
    let (g, alt) = build(|b| b.rule("A", Rule::alternative(Vec::new())));
    assert_eq!(
        grammar_error(&g, alt),
        GrammarError::EmptyAlternative {
            rule: "A".to_string()
        }
    );

    let (g, alt) = build(|b| {
        let text = b.rule("Word", Rule::regex("[a-z]+"));
        b.rule("A", Rule::alternative_of("Json", vec![text]))
    });
    assert_eq!(
        grammar_error(&g, alt),
        GrammarError::NotAnImplementer {
            rule: "A".to_string(),
            candidate: "Word".to_string(),
            base: "Json".to_string(),
        }
    );

    let (g, alt) = build(|b| {
        let a = b.literal("a");
        let member = b.rule(
            "Member",
            Rule::sequence(Some("Member"), vec![Part::unnamed(a)]),
        );
        b.rule("A", Rule::alternative_of("Json", vec![member]))
    });
    assert!(matches!(
        grammar_error(&g, alt),
        GrammarError::NotAnImplementer { candidate, .. } if candidate == "Member"
    ));
}

#[test]
fn nested_alternatives_over_a_base_are_accepted() {
    let (g, outer) = build(|b| {
        let a = b.literal("[]");
        let array = b.add(Rule::sequence(Some("Array"), vec![Part::unnamed(a)]));
        let o = b.literal("{}");
        let object = b.add(Rule::sequence(Some("Object"), vec![Part::unnamed(o)]));
        let inner = b.add(Rule::alternative_of("Json", vec![array]));
        b.add(Rule::alternative_of("Json", vec![inner, object]))
    });
    let program = compile(&g, outer).unwrap();
    assert_eq!(program.output(), &OutputType::Object("Json".into()));
}

// ── Repeat ──────────────────────────────────────────────────────

#[test]
fn repeat_errors() {
    let (g, rep) = build(|b| {
        let a = b.literal("a");
        b.rule("R", Rule::repeat(a, 3, Some(2)))
    });
    assert_eq!(
        grammar_error(&g, rep),
        GrammarError::InvalidRepeatBounds {
            rule: "R".to_string(),
            min: 3,
            max: 2,
        }
    );

    let (g, rep) = build(|b| {
        let n = b.add(Rule::number(NumberKind::Integer));
        b.rule("R", Rule::many(n).collect_text())
    });
    assert_eq!(
        grammar_error(&g, rep),
        GrammarError::TextRepeatElement {
            rule: "R".to_string(),
            found: "int".to_string(),
        }
    );
}

#[test]
fn repeat_collects_into_a_list_and_stops_on_zero_width() {
    let (g, rep) = build(|b| {
        let n = b.add(Rule::number(NumberKind::Integer));
        b.add(Rule::repeat(n, 1, Some(4)))
    });
    let program = compile(&g, rep).unwrap();
    assert_eq!(program.output(), &OutputType::List);
    assert!(has_op(&program, |op| matches!(op, Op::ListPush { .. })));
    // Progress check: position after an element compared against the
    // position before it.
    assert!(has_op(&program, |op| matches!(
        op,
        Op::JumpIf {
            b: Operand::Slot(_),
            ..
        }
    )));
    // Bound checks for max and min.
    assert!(has_op(&program, |op| matches!(
        op,
        Op::JumpIf {
            b: Operand::Imm(4),
            ..
        }
    )));
}

#[test]
fn text_repeat_appends_characters_unboxed() {
    let (g, rep) = build(|b| {
        let c = b.add(Rule::char_range([('a', 'z')]));
        b.add(Rule::many1(c).collect_text())
    });
    let program = compile(&g, rep).unwrap();
    assert_eq!(program.output(), &OutputType::Text);
    assert!(has_op(&program, |op| matches!(op, Op::TextPushChar { .. })));
    assert!(!has_op(&program, |op| matches!(op, Op::Box { .. })));
}

#[test]
fn repeat_of_void_elements_produces_nothing() {
    let (g, rep) = build(|b| {
        let eol = b.add(Rule::Eol);
        b.add(Rule::many(eol))
    });
    let program = compile(&g, rep).unwrap();
    assert_eq!(program.output(), &OutputType::Void);
    assert_eq!(program.result(), None);
}

// ── Wrappers ────────────────────────────────────────────────────

#[test]
fn optional_defaults_follow_the_output_type() {
    let (g, opt) = build(|b| {
        let word = b.add(Rule::regex("[a-z]+"));
        b.add(Rule::Optional(word))
    });
    let program = compile(&g, opt).unwrap();
    assert_eq!(program.output(), &OutputType::Text);
    assert!(!program.is_concrete());
    // Never fails.
    assert!(!has_op(&program, |op| matches!(op, Op::Return { success: false })));

    let (g, opt) = build(|b| {
        let n = b.add(Rule::number(NumberKind::Integer));
        let list = b.add(Rule::many(n));
        b.add(Rule::Optional(list))
    });
    let program = compile(&g, opt).unwrap();
    assert!(has_op(&program, |op| matches!(op, Op::ListNew { .. })));
}

#[test]
fn assertions_consume_nothing() {
    for wrap in [Rule::LookAhead as fn(RuleId) -> Rule, Rule::Not] {
        let (g, id) = build(|b| {
            let a = b.literal("a");
            b.add(wrap(a))
        });
        let program = compile(&g, id).unwrap();
        assert!(has_op(&program, |op| matches!(op, Op::RestorePos { .. })));
        assert_eq!(program.result(), None);
        assert!(!program.is_concrete());
    }
}

#[test]
fn surround_reuses_the_prefix_as_suffix() {
    let mut stubs = Stubs::default();
    let (g, quoted) = build(|b| {
        let quote = b.literal("\"");
        let body = b.add(Rule::regex("[^\"]*"));
        b.add(Rule::surround(quote, body))
    });
    let program = compile_with(&g, quoted, &mut stubs).unwrap();
    assert_eq!(
        stubs.requested,
        [RuleId::new(0), RuleId::new(1), RuleId::new(0)]
    );
    assert_eq!(program.output(), &OutputType::Text);
}

#[test]
fn capture_slices_the_consumed_text() {
    let (g, cap) = build(|b| {
        let ws = b.add(Rule::Whitespace);
        b.add(Rule::Capture(ws))
    });
    let program = compile(&g, cap).unwrap();
    assert_eq!(program.output(), &OutputType::Text);
    assert!(has_op(&program, |op| matches!(op, Op::Slice { .. })));
}

#[test]
fn trace_ignored_rules_are_not_traced() {
    let (g, ws) = build(|b| {
        let ws = b.rule("Ws", Rule::Whitespace);
        b.set_flags(ws, RuleFlags::TRACE_IGNORED)
    });
    assert!(!compile(&g, ws).unwrap().is_traced());
}

#[test]
fn children_are_reached_through_unfilled_handles() {
    let mut stubs = Stubs::default();
    let (g, list) = build(|b| {
        let list = b.declare("List");
        let open = b.literal("(");
        let close = b.literal(")");
        let items = b.add(Rule::many(list));
        b.define(list, Rule::between(open, items, close))
    });
    let program = compile_with(&g, list, &mut stubs).unwrap();
    assert!(stubs.matchers.values().all(|m| !m.is_resolved()));
    assert_eq!(program.callee_rules().count(), 3);
}
