//! Recognizer fragment emission — one emitter per PEG operator.
//!
//! Every fragment obeys the same positional contract: executed against the
//! ambient `pos` and `input` of the emitted parser, it either advances
//! `pos` past the consumed input and binds the caller-supplied result
//! variable to a non-null value, or leaves `pos` as it was on entry
//! (restoring from a saved variable where needed) and binds the result
//! variable to `null`. Ordered choice, backtracking, greedy repetition,
//! and lookahead are all obtained by composing contract-honoring
//! fragments.
//!
//! Generated structure per rule:
//! - `parse_<name>()` — packrat cache check, body fragment, cache store
//! - display-name rules additionally mask internal failure reporting and
//!   report the display name itself on failure

use crate::template::{self, push_char_escape, quote_js_string};
use crate::uid::UidTable;
use crate::{ClassPart, CodegenError, Expr, Rule};

/// Emits rule functions and expression fragments.
///
/// Holds the identifier allocator; fresh local identifiers are drawn from
/// it while walking a rule body, and it is reset at the start of every
/// rule so grammar edits never cascade renames across unrelated rules.
#[derive(Debug, Default)]
pub struct FragmentWriter {
    pub(crate) uids: UidTable,
}

impl FragmentWriter {
    /// Create a writer with a fresh identifier allocator.
    pub fn new() -> Self {
        FragmentWriter::default()
    }

    /// Emit the complete `parse_<name>` function for one rule.
    ///
    /// The function checks the packrat cache under the key
    /// `"<name>@" + pos`, runs the body fragment on a miss, stores
    /// `{nextPos, result}`, and returns the result. Rules with a display
    /// name clear `reportMatchFailures` around the body and report the
    /// display name itself when the body fails.
    pub fn write_rule(&mut self, rule: &Rule) -> Result<String, CodegenError> {
        self.uids.reset();
        let result_var = self.uids.next("result");
        let body = self.emit(&rule.expression, &result_var)?;

        let (set_report_failures, restore_report_failures, report_failure) =
            match &rule.display_name {
                Some(display_name) => {
                    let set = template::format(
                        &[
                            "var savedReportMatchFailures = reportMatchFailures;",
                            "reportMatchFailures = false;",
                        ],
                        &[],
                    )?;
                    let restore = "reportMatchFailures = savedReportMatchFailures;".to_string();
                    let report = template::format(
                        &[
                            "if (reportMatchFailures && ${result} === null) {",
                            "  matchFailed(${displayName|string});",
                            "}",
                        ],
                        &[("result", result_var.as_str()), ("displayName", display_name)],
                    )?;
                    (set, restore, report)
                },
                None => (String::new(), String::new(), String::new()),
            };

        let cache_key_prefix = format!("{}@", rule.name);
        template::format(
            &[
                "function parse_${name}() {",
                "  var cacheKey = ${cacheKeyPrefix|string} + pos;",
                "  var cachedResult = cache[cacheKey];",
                "  if (cachedResult) {",
                "    pos = cachedResult.nextPos;",
                "    return cachedResult.result;",
                "  }",
                "  ",
                "  ${setReportMatchFailuresCode}",
                "  ${code}",
                "  ${restoreReportMatchFailuresCode}",
                "  ${reportMatchFailureCode}",
                "  ",
                "  cache[cacheKey] = {",
                "    nextPos: pos,",
                "    result:  ${result}",
                "  };",
                "  return ${result};",
                "}",
            ],
            &[
                ("name", rule.name.as_str()),
                ("cacheKeyPrefix", cache_key_prefix.as_str()),
                ("setReportMatchFailuresCode", set_report_failures.as_str()),
                ("code", body.as_str()),
                ("restoreReportMatchFailuresCode", restore_report_failures.as_str()),
                ("reportMatchFailureCode", report_failure.as_str()),
                ("result", result_var.as_str()),
            ],
        )
    }

    /// Emit the recognizer fragment for one expression, bound to
    /// `result_var`.
    ///
    /// This is the visitor seam of the emitter: dispatch on the
    /// expression's kind is an exhaustive match, so adding an operator
    /// without an emitter is a compile error.
    pub fn emit(&mut self, expr: &Expr, result_var: &str) -> Result<String, CodegenError> {
        match expr {
            Expr::Choice { alternatives } => self.emit_choice(alternatives, result_var),
            Expr::Sequence { elements } => self.emit_sequence(elements, result_var),
            Expr::Labeled { expression, .. } => self.emit(expression, result_var),
            Expr::SimpleAnd { expression } => self.emit_simple_and(expression, result_var),
            Expr::SimpleNot { expression } => self.emit_simple_not(expression, result_var),
            Expr::SemanticAnd { code } => self.emit_semantic_and(code, result_var),
            Expr::SemanticNot { code } => self.emit_semantic_not(code, result_var),
            Expr::Optional { expression } => self.emit_optional(expression, result_var),
            Expr::ZeroOrMore { expression } => self.emit_zero_or_more(expression, result_var),
            Expr::OneOrMore { expression } => self.emit_one_or_more(expression, result_var),
            Expr::Action { expression, code } => self.emit_action(expression, code, result_var),
            Expr::RuleRef { name } => self.emit_rule_ref(name, result_var),
            Expr::Literal { value } => self.emit_literal(value, result_var),
            Expr::Any => self.emit_any(result_var),
            Expr::Class { parts, inverted, raw_text } => {
                self.emit_class(parts, *inverted, raw_text, result_var)
            },
        }
    }

    // ── Composite operators ────────────────────────────────────────────────

    /// Ordered choice, unfolded right to left into an if/else chain so the
    /// alternatives evaluate left to right with first-match-wins
    /// short-circuiting.
    fn emit_choice(
        &mut self,
        alternatives: &[Expr],
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let mut code = template::format(&["var ${result} = null;"], &[("result", result_var)])?;

        for alternative in alternatives.iter().rev() {
            let alternative_var = self.uids.next("result");
            let alternative_code = self.emit(alternative, &alternative_var)?;
            let wrapped = template::format(
                &[
                    "${alternativeCode}",
                    "if (${alternativeResult} !== null) {",
                    "  var ${result} = ${alternativeResult};",
                    "} else {",
                    "  ${code}",
                    "}",
                ],
                &[
                    ("alternativeCode", alternative_code.as_str()),
                    ("alternativeResult", alternative_var.as_str()),
                    ("result", result_var),
                    ("code", code.as_str()),
                ],
            )?;
            code = wrapped;
        }

        Ok(code)
    }

    /// Sequence, unfolded right to left: each element nests in the success
    /// branch of the one before it. On full success the result is the
    /// array of element results; on any failure `pos` is restored to the
    /// saved entry position.
    fn emit_sequence(
        &mut self,
        elements: &[Expr],
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let saved_pos_var = self.uids.next("savedPos");
        let element_vars: Vec<String> =
            elements.iter().map(|_| self.uids.next("result")).collect();

        let element_list = element_vars.join(", ");
        let mut code = template::format(
            &["var ${result} = [${elements}];"],
            &[("result", result_var), ("elements", element_list.as_str())],
        )?;

        for (element, element_var) in elements.iter().zip(&element_vars).rev() {
            let element_code = self.emit(element, element_var)?;
            let wrapped = template::format(
                &[
                    "${elementCode}",
                    "if (${elementResult} !== null) {",
                    "  ${code}",
                    "} else {",
                    "  var ${result} = null;",
                    "  pos = ${savedPos};",
                    "}",
                ],
                &[
                    ("elementCode", element_code.as_str()),
                    ("elementResult", element_var.as_str()),
                    ("code", code.as_str()),
                    ("result", result_var),
                    ("savedPos", saved_pos_var.as_str()),
                ],
            )?;
            code = wrapped;
        }

        template::format(
            &["var ${savedPos} = pos;", "${code}"],
            &[("savedPos", saved_pos_var.as_str()), ("code", code.as_str())],
        )
    }

    // ── Predicates ─────────────────────────────────────────────────────────

    /// `&e`: match without consuming. Failure reporting is disabled for
    /// the looked-ahead expression; its failures are positions the parser
    /// never commits to.
    fn emit_simple_and(
        &mut self,
        expression: &Expr,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let saved_pos_var = self.uids.next("savedPos");
        let saved_report_var = self.uids.next("savedReportMatchFailures");
        let expression_var = self.uids.next("result");
        let expression_code = self.emit(expression, &expression_var)?;

        template::format(
            &[
                "var ${savedPos} = pos;",
                "var ${savedReportMatchFailures} = reportMatchFailures;",
                "reportMatchFailures = false;",
                "${expressionCode}",
                "reportMatchFailures = ${savedReportMatchFailures};",
                "if (${expressionResult} !== null) {",
                "  var ${result} = '';",
                "  pos = ${savedPos};",
                "} else {",
                "  var ${result} = null;",
                "}",
            ],
            &[
                ("savedPos", saved_pos_var.as_str()),
                ("savedReportMatchFailures", saved_report_var.as_str()),
                ("expressionCode", expression_code.as_str()),
                ("expressionResult", expression_var.as_str()),
                ("result", result_var),
            ],
        )
    }

    /// `!e`: succeed iff the expression fails, consuming nothing.
    fn emit_simple_not(
        &mut self,
        expression: &Expr,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let saved_pos_var = self.uids.next("savedPos");
        let saved_report_var = self.uids.next("savedReportMatchFailures");
        let expression_var = self.uids.next("result");
        let expression_code = self.emit(expression, &expression_var)?;

        template::format(
            &[
                "var ${savedPos} = pos;",
                "var ${savedReportMatchFailures} = reportMatchFailures;",
                "reportMatchFailures = false;",
                "${expressionCode}",
                "reportMatchFailures = ${savedReportMatchFailures};",
                "if (${expressionResult} === null) {",
                "  var ${result} = '';",
                "} else {",
                "  var ${result} = null;",
                "  pos = ${savedPos};",
                "}",
            ],
            &[
                ("savedPos", saved_pos_var.as_str()),
                ("savedReportMatchFailures", saved_report_var.as_str()),
                ("expressionCode", expression_code.as_str()),
                ("expressionResult", expression_var.as_str()),
                ("result", result_var),
            ],
        )
    }

    /// `&{…}`: user predicate, truthy succeeds. Consumes nothing.
    fn emit_semantic_and(&mut self, code: &str, result_var: &str) -> Result<String, CodegenError> {
        template::format(
            &["var ${result} = (function() {${code}})() ? '' : null;"],
            &[("result", result_var), ("code", code)],
        )
    }

    /// `!{…}`: user predicate, falsy succeeds. Consumes nothing.
    fn emit_semantic_not(&mut self, code: &str, result_var: &str) -> Result<String, CodegenError> {
        template::format(
            &["var ${result} = (function() {${code}})() ? null : '';"],
            &[("result", result_var), ("code", code)],
        )
    }

    // ── Repetition ─────────────────────────────────────────────────────────

    /// `e?`: the expression's result, or the empty string. Always
    /// succeeds.
    fn emit_optional(
        &mut self,
        expression: &Expr,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let expression_var = self.uids.next("result");
        let expression_code = self.emit(expression, &expression_var)?;

        template::format(
            &[
                "${expressionCode}",
                "var ${result} = ${expressionResult} !== null ? ${expressionResult} : '';",
            ],
            &[
                ("expressionCode", expression_code.as_str()),
                ("expressionResult", expression_var.as_str()),
                ("result", result_var),
            ],
        )
    }

    /// `e*`: greedy, never backtracks into committed repetitions. Always
    /// succeeds with the array of results.
    fn emit_zero_or_more(
        &mut self,
        expression: &Expr,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let expression_var = self.uids.next("result");
        let expression_code = self.emit(expression, &expression_var)?;

        template::format(
            &[
                "var ${result} = [];",
                "${expressionCode}",
                "while (${expressionResult} !== null) {",
                "  ${result}.push(${expressionResult});",
                "  ${expressionCode}",
                "}",
            ],
            &[
                ("result", result_var),
                ("expressionCode", expression_code.as_str()),
                ("expressionResult", expression_var.as_str()),
            ],
        )
    }

    /// `e+`: like `e*` but the first repetition must match.
    fn emit_one_or_more(
        &mut self,
        expression: &Expr,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let expression_var = self.uids.next("result");
        let expression_code = self.emit(expression, &expression_var)?;

        template::format(
            &[
                "${expressionCode}",
                "if (${expressionResult} !== null) {",
                "  var ${result} = [];",
                "  while (${expressionResult} !== null) {",
                "    ${result}.push(${expressionResult});",
                "    ${expressionCode}",
                "  }",
                "} else {",
                "  var ${result} = null;",
                "}",
            ],
            &[
                ("expressionCode", expression_code.as_str()),
                ("expressionResult", expression_var.as_str()),
                ("result", result_var),
            ],
        )
    }

    // ── Actions and references ─────────────────────────────────────────────

    /// Action: run the expression, and on success call the user code with
    /// the labeled sub-results as arguments.
    ///
    /// A direct child sequence contributes one parameter per labeled
    /// element (bound to the element's slot in the result array); a
    /// directly labeled child contributes a single parameter bound to the
    /// whole result. Anything else gets no parameters. Labeled predicate
    /// results arrive as `''`, which is distinct from `null` on purpose.
    fn emit_action(
        &mut self,
        expression: &Expr,
        code: &str,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let expression_var = self.uids.next("result");
        let expression_code = self.emit(expression, &expression_var)?;

        let mut formal_params = Vec::new();
        let mut actual_params = Vec::new();
        match expression {
            Expr::Sequence { elements } => {
                for (i, element) in elements.iter().enumerate() {
                    if let Expr::Labeled { label, .. } = element {
                        formal_params.push(label.clone());
                        actual_params.push(format!("{}[{}]", expression_var, i));
                    }
                }
            },
            Expr::Labeled { label, .. } => {
                formal_params.push(label.clone());
                actual_params.push(expression_var.clone());
            },
            _ => {},
        }

        let formal_list = formal_params.join(", ");
        let actual_list = actual_params.join(", ");
        template::format(
            &[
                "${expressionCode}",
                "var ${result} = ${expressionResult} !== null",
                "  ? (function(${formalParams}) {${actionCode}})(${actualParams})",
                "  : null;",
            ],
            &[
                ("expressionCode", expression_code.as_str()),
                ("expressionResult", expression_var.as_str()),
                ("result", result_var),
                ("formalParams", formal_list.as_str()),
                ("actionCode", code),
                ("actualParams", actual_list.as_str()),
            ],
        )
    }

    /// Rule reference: delegate to the referenced rule's parse function.
    /// The referenced rule does its own failure reporting.
    fn emit_rule_ref(&mut self, name: &str, result_var: &str) -> Result<String, CodegenError> {
        template::format(
            &["var ${result} = parse_${name}();"],
            &[("result", result_var), ("name", name)],
        )
    }

    // ── Terminals ──────────────────────────────────────────────────────────

    /// Exact string match. The reported expectation is the quoted literal
    /// text.
    fn emit_literal(&mut self, value: &str, result_var: &str) -> Result<String, CodegenError> {
        // Lengths are in the emitted language's UTF-16 code units.
        let length = value.encode_utf16().count().to_string();
        let value_quoted = quote_js_string(value);

        template::format(
            &[
                "if (input.substr(pos, ${length}) === ${value|string}) {",
                "  var ${result} = ${value|string};",
                "  pos += ${length};",
                "} else {",
                "  var ${result} = null;",
                "  if (reportMatchFailures) {",
                "    matchFailed(${valueQuoted|string});",
                "  }",
                "}",
            ],
            &[
                ("result", result_var),
                ("value", value),
                ("valueQuoted", value_quoted.as_str()),
                ("length", length.as_str()),
            ],
        )
    }

    /// Any single character.
    fn emit_any(&mut self, result_var: &str) -> Result<String, CodegenError> {
        template::format(
            &[
                "if (input.length > pos) {",
                "  var ${result} = input.charAt(pos);",
                "  pos++;",
                "} else {",
                "  var ${result} = null;",
                "  if (reportMatchFailures) {",
                "    matchFailed('any character');",
                "  }",
                "}",
            ],
            &[("result", result_var)],
        )
    }

    /// Character class, compiled to an anchored regex over the input tail.
    /// The reported expectation is the class's original source text.
    fn emit_class(
        &mut self,
        parts: &[ClassPart],
        inverted: bool,
        raw_text: &str,
        result_var: &str,
    ) -> Result<String, CodegenError> {
        let regexp = if parts.is_empty() {
            // Some dialects reject the bare [] and [^] forms, so empty
            // classes compile to equivalents: never-match and match-any.
            if inverted {
                r"/^[\S\s]/".to_string()
            } else {
                "/^(?!)/".to_string()
            }
        } else {
            let mut body = String::new();
            for part in parts {
                match part {
                    ClassPart::Single(ch) => push_class_char(&mut body, *ch),
                    ClassPart::Range(lo, hi) => {
                        push_class_char(&mut body, *lo);
                        body.push('-');
                        push_class_char(&mut body, *hi);
                    },
                }
            }
            format!("/^[{}{}]/", if inverted { "^" } else { "" }, body)
        };

        template::format(
            &[
                "if (input.substr(pos).match(${regexp}) !== null) {",
                "  var ${result} = input.charAt(pos);",
                "  pos++;",
                "} else {",
                "  var ${result} = null;",
                "  if (reportMatchFailures) {",
                "    matchFailed(${rawText|string});",
                "  }",
                "}",
            ],
            &[
                ("regexp", regexp.as_str()),
                ("result", result_var),
                ("rawText", raw_text),
            ],
        )
    }
}

/// Escape one character for use inside an emitted regex character class.
///
/// Class metacharacters are backslash-escaped, common controls use their
/// named escapes, and remaining controls and everything at or above 0x80
/// use the same numeric escapes as string quoting, so class text stays
/// canonical across emissions.
fn push_class_char(out: &mut String, ch: char) {
    match ch {
        '\\' | '/' | ']' | '^' | '-' => {
            out.push('\\');
            out.push(ch);
        },
        '\0' => out.push_str("\\0"),
        '\t' => out.push_str("\\t"),
        '\n' => out.push_str("\\n"),
        '\x0B' => out.push_str("\\v"),
        '\x0C' => out.push_str("\\f"),
        '\r' => out.push_str("\\r"),
        c if (c as u32) < 0x20 || (c as u32) >= 0x80 => push_char_escape(out, c),
        c => out.push(c),
    }
}
