//! Pipeline for parser code emission.
//!
//! Stages:
//! 1. **Diagnose**: run the advisory grammar-warning pass (stderr only).
//! 2. **Emit rules**: sort the rule set by name and emit one packrat parse
//!    function per rule.
//! 3. **Assemble**: wrap the rule functions in the parser-object shell —
//!    the sorted dispatch table, the `parse(input, startRule)` entry point
//!    with invocation-scoped state, the inline runtime helpers, the user
//!    initializer, and the `SyntaxError` type.
//!
//! Sorting in stage 2 and 3 is what makes emission deterministic: the rule
//! map's iteration order never reaches the output.
//!
//! ```text
//! Grammar ──→ [Diagnose] ──→ [Emit rules] ──→ [Assemble] ──→ String
//!             warnings       parse_* defs     shell + table
//! ```

use crate::dump;
use crate::fragment::FragmentWriter;
use crate::template;
use crate::{CodegenError, Expr, Grammar};

/// Run the full pipeline: diagnose, emit every rule, assemble the shell.
///
/// This is the worker behind [`crate::generate_parser`]. On success the
/// generated source is also handed to the debug dump (a no-op unless
/// `PEGTAIL_DUMP_JS` is set).
pub fn run_pipeline(grammar: &Grammar) -> Result<String, CodegenError> {
    for warning in detect_grammar_warnings(grammar) {
        eprintln!("warning: {}", warning);
    }

    let source = assemble_parser(grammar)?;
    dump::maybe_dump(&source, &grammar.start_rule);
    Ok(source)
}

// ══════════════════════════════════════════════════════════════════════════════
// Assembly
// ══════════════════════════════════════════════════════════════════════════════

fn assemble_parser(grammar: &Grammar) -> Result<String, CodegenError> {
    let mut names: Vec<&str> = grammar.rules.keys().map(String::as_str).collect();
    names.sort_unstable();

    let mut table_items = Vec::with_capacity(names.len());
    for name in &names {
        table_items.push(template::format(
            &["${name|string}: parse_${name}"],
            &[("name", *name)],
        )?);
    }
    let parse_function_table_items = table_items.join(",\n");

    let mut writer = FragmentWriter::new();
    let mut definitions = Vec::with_capacity(names.len());
    for name in &names {
        definitions.push(writer.write_rule(&grammar.rules[*name])?);
    }
    let parse_function_definitions = definitions.join("\n\n");

    let initializer_code = grammar.initializer.as_deref().unwrap_or("");

    template::format(
        &[
            "(function(){",
            "  /* Generated by PegTaIL. */",
            "  ",
            "  var result = {",
            "    /*",
            "     * Parses the input and returns a value explicitly or implicitly",
            "     * specified by the grammar. Throws |SyntaxError| when the input",
            "     * does not match, carrying the failure position and the set of",
            "     * expected inputs at that position.",
            "     */",
            "    parse: function(input, startRule) {",
            "      var parseFunctions = {",
            "        ${parseFunctionTableItems}",
            "      };",
            "      ",
            "      if (startRule !== undefined) {",
            "        if (parseFunctions[startRule] === undefined) {",
            r#"          throw new Error("Invalid rule name: " + quote(startRule) + ".");"#,
            "        }",
            "      } else {",
            "        startRule = ${startRule|string};",
            "      }",
            "      ",
            "      var pos = 0;",
            "      var reportMatchFailures = true;",
            "      var rightmostMatchFailuresPos = 0;",
            "      var rightmostMatchFailuresExpected = [];",
            "      var cache = {};",
            "      ",
            "      function padLeft(input, padding, length) {",
            "        var result = input;",
            "        ",
            "        var padLength = length - input.length;",
            "        for (var i = 0; i < padLength; i++) {",
            "          result = padding + result;",
            "        }",
            "        ",
            "        return result;",
            "      }",
            "      ",
            "      function escape(ch) {",
            "        var charCode = ch.charCodeAt(0);",
            "        ",
            "        if (charCode <= 0xFF) {",
            "          var escapeChar = 'x';",
            "          var length = 2;",
            "        } else {",
            "          var escapeChar = 'u';",
            "          var length = 4;",
            "        }",
            "        ",
            r"        return '\\' + escapeChar + padLeft(charCode.toString(16).toUpperCase(), '0', length);",
            "      }",
            "      ",
            "      function quote(s) {",
            "        /*",
            "         * Everything the string-literal grammar forbids literally, plus",
            "         * all code units at or above 0x80, is emitted escaped so the",
            "         * message survives any output encoding.",
            "         */",
            r#"        return '"' + s"#,
            r"          .replace(/\\/g, '\\\\')",
            r#"          .replace(/"/g, '\\"')"#,
            r"          .replace(/\r/g, '\\r')",
            r"          .replace(/\n/g, '\\n')",
            r"          .replace(/[\x80-\uFFFF]/g, escape)",
            r#"          + '"';"#,
            "      }",
            "      ",
            "      function matchFailed(failure) {",
            "        if (pos < rightmostMatchFailuresPos) {",
            "          return;",
            "        }",
            "        ",
            "        if (pos > rightmostMatchFailuresPos) {",
            "          rightmostMatchFailuresPos = pos;",
            "          rightmostMatchFailuresExpected = [];",
            "        }",
            "        ",
            "        rightmostMatchFailuresExpected.push(failure);",
            "      }",
            "      ",
            "      ${parseFunctionDefinitions}",
            "      ",
            "      function buildErrorMessage() {",
            "        function buildExpected(failuresExpected) {",
            "          failuresExpected.sort();",
            "          ",
            "          var lastFailure = null;",
            "          var failuresExpectedUnique = [];",
            "          for (var i = 0; i < failuresExpected.length; i++) {",
            "            if (failuresExpected[i] !== lastFailure) {",
            "              failuresExpectedUnique.push(failuresExpected[i]);",
            "              lastFailure = failuresExpected[i];",
            "            }",
            "          }",
            "          ",
            "          switch (failuresExpectedUnique.length) {",
            "            case 0:",
            "              return 'end of input';",
            "            case 1:",
            "              return failuresExpectedUnique[0];",
            "            default:",
            "              return failuresExpectedUnique.slice(0, failuresExpectedUnique.length - 1).join(', ')",
            "                + ' or '",
            "                + failuresExpectedUnique[failuresExpectedUnique.length - 1];",
            "          }",
            "        }",
            "        ",
            "        var expected = buildExpected(rightmostMatchFailuresExpected);",
            "        var actualPos = Math.max(pos, rightmostMatchFailuresPos);",
            "        var actual = actualPos < input.length",
            "          ? quote(input.charAt(actualPos))",
            "          : 'end of input';",
            "        ",
            "        return 'Expected ' + expected + ' but ' + actual + ' found.';",
            "      }",
            "      ",
            "      function computeErrorPosition() {",
            "        /*",
            r"         * A line break is \n, \r, \u2028 or \u2029; \r\n counts as a",
            "         * single break.",
            "         */",
            "        var line = 1;",
            "        var column = 1;",
            "        var seenCR = false;",
            "        ",
            "        for (var i = 0; i < rightmostMatchFailuresPos; i++) {",
            "          var ch = input.charAt(i);",
            r"          if (ch === '\n') {",
            "            if (!seenCR) { line++; }",
            "            column = 1;",
            "            seenCR = false;",
            r"          } else if (ch === '\r' || ch === '\u2028' || ch === '\u2029') {",
            "            line++;",
            "            column = 1;",
            "            seenCR = true;",
            "          } else {",
            "            column++;",
            "            seenCR = false;",
            "          }",
            "        }",
            "        ",
            "        return { line: line, column: column };",
            "      }",
            "      ",
            "      ${initializerCode}",
            "      ",
            "      var result = parseFunctions[startRule]();",
            "      ",
            "      /*",
            "       * The parse succeeded only if the start rule produced a value",
            "       * and the whole input was consumed.",
            "       */",
            "      if (result === null || pos !== input.length) {",
            "        var errorPosition = computeErrorPosition();",
            "        throw new this.SyntaxError(",
            "          buildErrorMessage(),",
            "          errorPosition.line,",
            "          errorPosition.column",
            "        );",
            "      }",
            "      ",
            "      return result;",
            "    },",
            "    ",
            "    /* Returns the parser source code. */",
            "    toSource: function() { return this._source; }",
            "  };",
            "  ",
            "  /* Thrown when a parser encounters a syntax error. */",
            "  ",
            "  result.SyntaxError = function(message, line, column) {",
            "    this.name = 'SyntaxError';",
            "    this.message = message;",
            "    this.line = line;",
            "    this.column = column;",
            "  };",
            "  ",
            "  result.SyntaxError.prototype = Error.prototype;",
            "  ",
            "  return result;",
            "})()",
        ],
        &[
            ("parseFunctionTableItems", parse_function_table_items.as_str()),
            ("startRule", grammar.start_rule.as_str()),
            ("parseFunctionDefinitions", parse_function_definitions.as_str()),
            ("initializerCode", initializer_code),
        ],
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// Grammar warnings
// ══════════════════════════════════════════════════════════════════════════════

/// Detect grammar-level problems worth surfacing to the developer.
///
/// The emitter does not validate its input — producers guarantee a
/// well-formed AST — so these are advisory only and never abort emission.
/// Currently detected: a start rule missing from the rule table, and
/// references to undefined rules.
pub fn detect_grammar_warnings(grammar: &Grammar) -> Vec<String> {
    let mut warnings = Vec::new();

    if !grammar.rules.contains_key(&grammar.start_rule) {
        warnings.push(format!(
            "start rule \"{}\" is not defined in the grammar",
            grammar.start_rule
        ));
    }

    let mut names: Vec<&str> = grammar.rules.keys().map(String::as_str).collect();
    names.sort_unstable();
    for name in names {
        collect_undefined_refs(&grammar.rules[name].expression, grammar, name, &mut warnings);
    }

    warnings
}

fn collect_undefined_refs(
    expr: &Expr,
    grammar: &Grammar,
    rule_name: &str,
    warnings: &mut Vec<String>,
) {
    match expr {
        Expr::RuleRef { name } => {
            if !grammar.rules.contains_key(name) {
                warnings.push(format!(
                    "rule \"{}\" references undefined rule \"{}\"",
                    rule_name, name
                ));
            }
        },
        Expr::Choice { alternatives } => {
            for alternative in alternatives {
                collect_undefined_refs(alternative, grammar, rule_name, warnings);
            }
        },
        Expr::Sequence { elements } => {
            for element in elements {
                collect_undefined_refs(element, grammar, rule_name, warnings);
            }
        },
        Expr::Labeled { expression, .. }
        | Expr::SimpleAnd { expression }
        | Expr::SimpleNot { expression }
        | Expr::Optional { expression }
        | Expr::ZeroOrMore { expression }
        | Expr::OneOrMore { expression }
        | Expr::Action { expression, .. } => {
            collect_undefined_refs(expression, grammar, rule_name, warnings);
        },
        Expr::SemanticAnd { .. }
        | Expr::SemanticNot { .. }
        | Expr::Literal { .. }
        | Expr::Any
        | Expr::Class { .. } => {},
    }
}
