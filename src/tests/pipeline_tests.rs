//! Integration tests for the full emission pipeline.
//!
//! The generated program is JavaScript, so these tests assert on the
//! structure of the emitted source rather than executing it.

use proptest::prelude::*;

use crate::pipeline::detect_grammar_warnings;
use crate::{generate_parser, ClassPart, Expr, Grammar, Rule};

fn lit(value: &str) -> Expr {
    Expr::Literal {
        value: value.to_string(),
    }
}

fn labeled(label: &str, expr: Expr) -> Expr {
    Expr::Labeled {
        label: label.to_string(),
        expression: Box::new(expr),
    }
}

fn choice(alternatives: Vec<Expr>) -> Expr {
    Expr::Choice { alternatives }
}

fn seq(elements: Vec<Expr>) -> Expr {
    Expr::Sequence { elements }
}

/// `start = "abc"`, the simplest complete grammar.
fn literal_grammar() -> Grammar {
    Grammar::new("start", vec![Rule::new("start", lit("abc"))])
}

#[test]
fn test_generate_parser_emits_shell() {
    let source = generate_parser(&literal_grammar()).unwrap();

    assert!(source.starts_with("(function(){"), "self-invoking wrapper");
    assert!(source.ends_with("})()"), "self-invoking wrapper");
    assert!(source.contains("parse: function(input, startRule) {"));
    assert!(source.contains(r#""start": parse_start"#), "rule table entry");
    assert!(source.contains(r#"startRule = "start";"#), "default start rule");
    assert!(source.contains(
        r#"throw new Error("Invalid rule name: " + quote(startRule) + ".");"#
    ));
    assert!(source.contains("var pos = 0;"));
    assert!(source.contains("var reportMatchFailures = true;"));
    assert!(source.contains("var rightmostMatchFailuresPos = 0;"));
    assert!(source.contains("var rightmostMatchFailuresExpected = [];"));
    assert!(source.contains("var cache = {};"));
    assert!(source.contains("toSource: function() { return this._source; }"));
    assert!(source.contains("result.SyntaxError = function(message, line, column) {"));
    assert!(source.contains("result.SyntaxError.prototype = Error.prototype;"));
}

#[test]
fn test_parse_failure_check_covers_unconsumed_input() {
    let source = generate_parser(&literal_grammar()).unwrap();
    assert!(
        source.contains("if (result === null || pos !== input.length) {"),
        "a dangling tail is a syntax error too"
    );
    assert!(source.contains("throw new this.SyntaxError("));
    assert!(source.contains("buildErrorMessage(),"));
    assert!(source.contains("errorPosition.line,"));
    assert!(source.contains("errorPosition.column"));
}

#[test]
fn test_runtime_helpers_are_inlined() {
    let source = generate_parser(&literal_grammar()).unwrap();
    for helper in [
        "function padLeft(input, padding, length) {",
        "function escape(ch) {",
        "function quote(s) {",
        "function matchFailed(failure) {",
        "function buildErrorMessage() {",
        "function computeErrorPosition() {",
    ] {
        assert!(source.contains(helper), "missing helper: {}", helper);
    }
}

#[test]
fn test_match_failed_keeps_rightmost_failures_only() {
    let source = generate_parser(&literal_grammar()).unwrap();
    assert!(source.contains("if (pos < rightmostMatchFailuresPos) {"));
    assert!(source.contains("if (pos > rightmostMatchFailuresPos) {"));
    assert!(source.contains("rightmostMatchFailuresExpected = [];"));
    assert!(source.contains("rightmostMatchFailuresExpected.push(failure);"));
}

#[test]
fn test_error_message_aggregation_shape() {
    let source = generate_parser(&literal_grammar()).unwrap();
    assert!(source.contains("failuresExpected.sort();"));
    assert!(
        source.contains("if (failuresExpected[i] !== lastFailure) {"),
        "adjacent duplicates collapse after sorting"
    );
    assert!(source.contains("return 'end of input';"));
    assert!(source.contains("+ ' or '"));
    assert!(source.contains("var actualPos = Math.max(pos, rightmostMatchFailuresPos);"));
    assert!(source.contains("return 'Expected ' + expected + ' but ' + actual + ' found.';"));
}

#[test]
fn test_error_position_recognizes_all_line_breaks() {
    let source = generate_parser(&literal_grammar()).unwrap();
    assert!(source.contains(r"if (ch === '\n') {"));
    assert!(source.contains(r"} else if (ch === '\r' || ch === '\u2028' || ch === '\u2029') {"));
    assert!(
        source.contains("if (!seenCR) { line++; }"),
        "the \\n of a \\r\\n pair must not advance the line again"
    );
}

#[test]
fn test_single_literal_scenario() {
    let source = generate_parser(&literal_grammar()).unwrap();
    assert!(source.contains(r#"if (input.substr(pos, 3) === "abc") {"#));
    assert!(source.contains("function parse_start() {"));
}

#[test]
fn test_ordered_choice_scenario() {
    // start = "a" / "ab" — the first alternative must be attempted first,
    // even though the second is longer.
    let grammar = Grammar::new(
        "start",
        vec![Rule::new("start", choice(vec![lit("a"), lit("ab")]))],
    );
    let source = generate_parser(&grammar).unwrap();

    let first = source
        .find(r#"input.substr(pos, 1) === "a""#)
        .expect("first alternative");
    let second = source
        .find(r#"input.substr(pos, 2) === "ab""#)
        .expect("second alternative");
    assert!(first < second, "alternatives must keep grammar order");
}

#[test]
fn test_repetition_scenario() {
    // start = "a"*
    let grammar = Grammar::new(
        "start",
        vec![Rule::new(
            "start",
            Expr::ZeroOrMore {
                expression: Box::new(lit("a")),
            },
        )],
    );
    let source = generate_parser(&grammar).unwrap();
    assert!(source.contains("var result0 = [];"));
    assert!(source.contains("while (result1 !== null) {"));
    assert!(source.contains("result0.push(result1);"));
}

#[test]
fn test_class_scenario_reports_raw_text() {
    // start = [a-z]+
    let grammar = Grammar::new(
        "start",
        vec![Rule::new(
            "start",
            Expr::OneOrMore {
                expression: Box::new(Expr::Class {
                    parts: vec![ClassPart::Range('a', 'z')],
                    inverted: false,
                    raw_text: "[a-z]".to_string(),
                }),
            },
        )],
    );
    let source = generate_parser(&grammar).unwrap();
    assert!(source.contains("/^[a-z]/"));
    assert!(
        source.contains(r#"matchFailed("[a-z]");"#),
        "failed class matches report the class source text"
    );
}

#[test]
fn test_action_with_labels_scenario() {
    // start = a:"x" b:"y" { return a + b; }
    let grammar = Grammar::new(
        "start",
        vec![Rule::new(
            "start",
            Expr::Action {
                expression: Box::new(seq(vec![
                    labeled("a", lit("x")),
                    labeled("b", lit("y")),
                ])),
                code: "return a + b;".to_string(),
            },
        )],
    );
    let source = generate_parser(&grammar).unwrap();
    assert!(
        source.contains("(function(a, b) {return a + b;})(result1[0], result1[1])"),
        "{}",
        source
    );
}

#[test]
fn test_every_rule_is_memoized() {
    let grammar = Grammar::new(
        "sum",
        vec![
            Rule::new(
                "sum",
                seq(vec![
                    Expr::RuleRef { name: "num".to_string() },
                    lit("+"),
                    Expr::RuleRef { name: "num".to_string() },
                ]),
            ),
            Rule::new(
                "num",
                Expr::OneOrMore {
                    expression: Box::new(Expr::Class {
                        parts: vec![ClassPart::Range('0', '9')],
                        inverted: false,
                        raw_text: "[0-9]".to_string(),
                    }),
                },
            ),
        ],
    );
    let source = generate_parser(&grammar).unwrap();

    assert_eq!(
        source.matches("var cacheKey = ").count(),
        2,
        "one cache check per rule"
    );
    assert!(source.contains(r#"var cacheKey = "sum@" + pos;"#));
    assert!(source.contains(r#"var cacheKey = "num@" + pos;"#));
    assert_eq!(source.matches("cache[cacheKey] = {").count(), 2);
    assert_eq!(
        source.matches(" = parse_num();").count(),
        2,
        "both references delegate to the memoized rule function"
    );
}

#[test]
fn test_display_name_masks_rule_internals() {
    let grammar = Grammar::new(
        "int",
        vec![Rule::with_display_name(
            "int",
            "integer",
            Expr::OneOrMore {
                expression: Box::new(Expr::Class {
                    parts: vec![ClassPart::Range('0', '9')],
                    inverted: false,
                    raw_text: "[0-9]".to_string(),
                }),
            },
        )],
    );
    let source = generate_parser(&grammar).unwrap();
    assert!(source.contains(r#"matchFailed("integer");"#));
    assert!(source.contains("var savedReportMatchFailures = reportMatchFailures;"));
}

#[test]
fn test_rule_table_and_definitions_are_sorted() {
    let grammar = Grammar::new(
        "zeta",
        vec![
            Rule::new("zeta", Expr::RuleRef { name: "alpha".to_string() }),
            Rule::new("mid", lit("m")),
            Rule::new("alpha", lit("a")),
        ],
    );
    let source = generate_parser(&grammar).unwrap();

    let table_alpha = source.find(r#""alpha": parse_alpha"#).unwrap();
    let table_mid = source.find(r#""mid": parse_mid"#).unwrap();
    let table_zeta = source.find(r#""zeta": parse_zeta"#).unwrap();
    assert!(table_alpha < table_mid && table_mid < table_zeta);

    let def_alpha = source.find("function parse_alpha() {").unwrap();
    let def_mid = source.find("function parse_mid() {").unwrap();
    let def_zeta = source.find("function parse_zeta() {").unwrap();
    assert!(def_alpha < def_mid && def_mid < def_zeta);
}

#[test]
fn test_initializer_is_inlined_before_parsing_starts() {
    let mut grammar = literal_grammar();
    grammar.initializer = Some("var depth = 0;".to_string());
    let source = generate_parser(&grammar).unwrap();

    let initializer = source.find("var depth = 0;").expect("initializer inlined");
    let invocation = source
        .find("var result = parseFunctions[startRule]();")
        .expect("start rule invocation");
    assert!(
        initializer < invocation,
        "initializer runs before parsing begins"
    );
}

#[test]
fn test_emission_is_deterministic_across_runs() {
    let grammar = literal_grammar();
    assert_eq!(
        generate_parser(&grammar).unwrap(),
        generate_parser(&grammar).unwrap()
    );
}

#[test]
fn test_emission_ignores_rule_insertion_order() {
    let rules = vec![
        Rule::new("alpha", lit("a")),
        Rule::new("beta", lit("b")),
        Rule::new("gamma", lit("c")),
    ];
    let mut reversed = rules.clone();
    reversed.reverse();

    let forward = generate_parser(&Grammar::new("alpha", rules)).unwrap();
    let backward = generate_parser(&Grammar::new("alpha", reversed)).unwrap();
    assert_eq!(forward, backward, "rule map order must not reach the output");
}

#[test]
fn test_warnings_flag_missing_rules() {
    let grammar = Grammar::new(
        "start",
        vec![Rule::new("top", Expr::RuleRef { name: "missing".to_string() })],
    );
    let warnings = detect_grammar_warnings(&grammar);
    assert_eq!(
        warnings,
        vec![
            "start rule \"start\" is not defined in the grammar".to_string(),
            "rule \"top\" references undefined rule \"missing\"".to_string(),
        ]
    );
}

#[test]
fn test_well_formed_grammar_has_no_warnings() {
    assert!(detect_grammar_warnings(&literal_grammar()).is_empty());
}

// ── Property tests ─────────────────────────────────────────────────────────

/// Strategy producing small random expressions over a brace-free literal
/// alphabet.
fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        "[a-z]{1,3}".prop_map(|value| Expr::Literal { value }),
        Just(Expr::Any),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3)
                .prop_map(|alternatives| Expr::Choice { alternatives }),
            prop::collection::vec(inner.clone(), 1..3)
                .prop_map(|elements| Expr::Sequence { elements }),
            inner.clone().prop_map(|e| Expr::Optional {
                expression: Box::new(e)
            }),
            inner.prop_map(|e| Expr::ZeroOrMore {
                expression: Box::new(e)
            }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_emission_is_deterministic(exprs in prop::collection::vec(arb_expr(), 1..4)) {
        let rules: Vec<Rule> = exprs
            .into_iter()
            .enumerate()
            .map(|(i, e)| Rule::new(format!("r{}", i), e))
            .collect();
        let grammar = Grammar::new("r0", rules);

        let first = generate_parser(&grammar).unwrap();
        let second = generate_parser(&grammar).unwrap();
        prop_assert_eq!(&first, &second);

        // No fragment may leave a dangling block behind.
        prop_assert_eq!(first.matches('{').count(), first.matches('}').count());
    }
}
