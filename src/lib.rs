//! # PegTaIL — Packrat Parser Generator
//!
//! PegTaIL is the code-emission core of a PEG (Parsing Expression Grammar)
//! compiler. Given a validated grammar AST, it produces the complete source
//! text of a self-contained recursive-descent packrat parser in JavaScript.
//! The generated parser, run against an input string, either returns a
//! semantic value or throws a `SyntaxError` carrying line/column and the
//! aggregated set of expected inputs at the rightmost failure position.
//!
//! ## Architecture
//!
//! ```text
//! Grammar AST
//!      │
//!      ▼
//!  ┌──────────────────────────────────────────┐
//!  │            PegTaIL crate                 │
//!  │                                          │
//!  │  1. Fragment emission (per operator):    │
//!  │     choice / sequence / lookahead /      │
//!  │     repetition / action / literal /      │
//!  │     any / class                          │
//!  │                                          │
//!  │  2. Rule emission:                       │
//!  │     packrat cache + display-name         │
//!  │     failure masking                      │
//!  │                                          │
//!  │  3. Pipeline:                            │
//!  │     sorted rule table → parser shell     │
//!  │     → inline runtime helpers             │
//!  │     → SyntaxError / toSource             │
//!  └──────────────────────────────────────────┘
//!      │
//!      ▼
//!   String (JavaScript source code)
//! ```
//!
//! Every emitted recognizer fragment obeys one positional contract: run
//! against the ambient `pos` and `input` of the generated parser, it either
//! advances `pos` past the consumed input and binds its result variable to a
//! non-null value, or leaves `pos` as it was on entry and binds the result
//! variable to `null`. Ordered-choice backtracking, greedy repetition, and
//! lookahead predicates all fall out of composing fragments that honor this
//! contract.
//!
//! Code generation is string-based throughout: fragments are composed with a
//! small template engine ([`template::format`]) that interpolates named
//! variables and re-indents multi-line substitutions, so the emitted program
//! stays readable and re-emits byte-identically across runs.

pub mod fragment;
pub mod pipeline;
pub mod template;
pub mod uid;

mod dump;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while emitting parser code.
///
/// Both variants indicate a bug in the emitter itself — a code template and
/// its variable mapping out of sync — never a problem with the input
/// grammar. They are fatal to code generation and are not recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// A `${name}` reference with no binding in the template's variable map.
    #[error("undefined variable in code template: {0}")]
    UndefinedVariable(String),

    /// A `${name|filter}` reference naming a filter the engine does not know.
    #[error("unrecognized filter in code template: {0}")]
    UnrecognizedFilter(String),
}

/// A parsing expression grammar.
///
/// This is the input to the emitter, produced by the grammar parser and
/// validator (external collaborators). The emitter assumes the AST is
/// well-formed and does not validate it; see
/// [`pipeline::detect_grammar_warnings`] for the advisory checks that are
/// run anyway.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar {
    /// User code executed once before parsing begins, verbatim. `None`
    /// when the grammar has no initializer block.
    pub initializer: Option<String>,
    /// Name of the default entry rule, used when the generated parser's
    /// `parse` is called without an explicit start rule.
    pub start_rule: String,
    /// All rules, keyed by name. Iteration order carries no meaning; the
    /// emitter sorts wherever ordering is visible in the output.
    pub rules: HashMap<String, Rule>,
}

impl Grammar {
    /// Assemble a grammar from a start-rule name and a list of rules.
    ///
    /// Convenience for tests and benchmarks — the real producer hands the
    /// full structure over directly.
    pub fn new(start_rule: impl Into<String>, rules: Vec<Rule>) -> Self {
        Grammar {
            initializer: None,
            start_rule: start_rule.into(),
            rules: rules.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }
}

/// A single grammar rule.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    /// Rule name; also names the emitted `parse_<name>` function.
    pub name: String,
    /// Optional human-readable label. When present, parse failures inside
    /// the rule surface as a single "expected <display name>" instead of
    /// the rule's internal expectations.
    pub display_name: Option<String>,
    /// The rule body.
    pub expression: Expr,
}

impl Rule {
    /// Construct a rule with no display name.
    pub fn new(name: impl Into<String>, expression: Expr) -> Self {
        Rule {
            name: name.into(),
            display_name: None,
            expression,
        }
    }

    /// Construct a rule with a human-readable display name.
    pub fn with_display_name(
        name: impl Into<String>,
        display_name: impl Into<String>,
        expression: Expr,
    ) -> Self {
        Rule {
            name: name.into(),
            display_name: Some(display_name.into()),
            expression,
        }
    }
}

/// A parsing expression. One variant per PEG operator.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    /// Ordered choice. Alternatives are tried left to right; the first
    /// match wins and later alternatives are never attempted.
    Choice {
        /// The alternatives, in priority order.
        alternatives: Vec<Expr>,
    },
    /// All elements must match in order. The result is the array of
    /// element results.
    Sequence {
        /// The elements, in match order.
        elements: Vec<Expr>,
    },
    /// Binds a sub-result to a name visible to an enclosing action.
    Labeled {
        /// The binding name, used as a formal parameter of the action.
        label: String,
        /// The labeled expression.
        expression: Box<Expr>,
    },
    /// Syntactic and-predicate (`&e`): succeeds iff the expression
    /// matches, consuming nothing either way.
    SimpleAnd {
        /// The looked-ahead expression.
        expression: Box<Expr>,
    },
    /// Syntactic not-predicate (`!e`): succeeds iff the expression does
    /// not match, consuming nothing either way.
    SimpleNot {
        /// The looked-ahead expression.
        expression: Box<Expr>,
    },
    /// Semantic and-predicate (`&{…}`): user code returning a boolean.
    /// Truthy succeeds; nothing is consumed.
    SemanticAnd {
        /// The predicate body, verbatim.
        code: String,
    },
    /// Semantic not-predicate (`!{…}`): user code returning a boolean.
    /// Falsy succeeds; nothing is consumed.
    SemanticNot {
        /// The predicate body, verbatim.
        code: String,
    },
    /// Matches the expression or the empty string; always succeeds.
    Optional {
        /// The optional expression.
        expression: Box<Expr>,
    },
    /// Greedy repetition, zero or more times; always succeeds.
    ZeroOrMore {
        /// The repeated expression.
        expression: Box<Expr>,
    },
    /// Greedy repetition, one or more times.
    OneOrMore {
        /// The repeated expression.
        expression: Box<Expr>,
    },
    /// Succeeds iff the expression does; transforms the result through
    /// user code. Labels inside a direct child sequence (or a directly
    /// labeled child) become the code's formal parameters.
    Action {
        /// The wrapped expression.
        expression: Box<Expr>,
        /// The action body, verbatim.
        code: String,
    },
    /// Invokes another rule's parse function.
    RuleRef {
        /// The referenced rule's name.
        name: String,
    },
    /// Matches an exact string.
    Literal {
        /// The text to match.
        value: String,
    },
    /// Matches any single character.
    Any,
    /// A character class.
    Class {
        /// Ordered single characters and inclusive ranges.
        parts: Vec<ClassPart>,
        /// Whether the class is inverted (`[^…]`).
        inverted: bool,
        /// The source representation of the class, reported verbatim in
        /// "expected" messages.
        raw_text: String,
    },
}

/// One element of a character class: a single character or an inclusive
/// range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClassPart {
    /// A single character.
    Single(char),
    /// An inclusive range, low to high.
    Range(char, char),
}

/// Generate a complete packrat parser for a grammar.
///
/// This is the main entry point. Returns the full JavaScript source of the
/// parser object, containing:
/// - one `parse_<rule>` function per grammar rule, packrat-memoized
/// - the `parse(input, startRule)` entry point with invocation-scoped state
/// - inline runtime helpers (`quote`, `matchFailed`, error-message and
///   error-position construction)
/// - the `SyntaxError` constructor and `toSource()`
///
/// Internally delegates to [`pipeline::run_pipeline`], which sorts the rule
/// set, emits each rule, assembles the shell, and runs the diagnostics
/// passes.
#[inline]
pub fn generate_parser(grammar: &Grammar) -> Result<String, CodegenError> {
    pipeline::run_pipeline(grammar)
}
