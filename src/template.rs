//! Code templates — variable interpolation, filters, re-indentation.
//!
//! The emitter builds the generated program out of line-oriented string
//! templates. [`format`] joins template parts with newlines, substitutes
//! `${NAME}` and `${NAME|FILTER}` references from a variable mapping, and
//! re-indents multi-line substitutions so a fragment inherits the
//! indentation of the template line it occupies.
//!
//! Substitution is single-pass: substituted values are never rescanned, so
//! user code containing `${` passes through untouched.

use std::fmt::Write;

use crate::CodegenError;

// ══════════════════════════════════════════════════════════════════════════════
// Formatting
// ══════════════════════════════════════════════════════════════════════════════

/// Format template parts into one block of code.
///
/// Each part is interpolated against `vars`, then re-indented: if the part
/// spans multiple lines, the leading whitespace of its first line is
/// prepended to every subsequent line. Finally all parts are joined with
/// single newlines.
///
/// Interpolation recognizes `${NAME}` and `${NAME|FILTER}` where `NAME` and
/// `FILTER` are identifiers (`[A-Za-z_][A-Za-z0-9_]*`). The only filter is
/// `string`, which quotes the value as a JavaScript string literal. A
/// reference to an unbound name fails with
/// [`CodegenError::UndefinedVariable`]; an unknown filter fails with
/// [`CodegenError::UnrecognizedFilter`]. Malformed references (no closing
/// brace, non-identifier name) are not references and pass through
/// verbatim.
pub fn format(parts: &[&str], vars: &[(&str, &str)]) -> Result<String, CodegenError> {
    let mut formatted = Vec::with_capacity(parts.len());
    for part in parts {
        let interpolated = interpolate(part, vars)?;
        formatted.push(reindent(&interpolated));
    }
    Ok(formatted.join("\n"))
}

/// A recognized `${NAME}` or `${NAME|FILTER}` reference at the start of a
/// slice, with its total source length.
struct Reference<'a> {
    name: &'a str,
    filter: Option<&'a str>,
    len: usize,
}

fn interpolate(part: &str, vars: &[(&str, &str)]) -> Result<String, CodegenError> {
    let mut out = String::with_capacity(part.len());
    let mut rest = part;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match scan_reference(&rest[start..]) {
            Some(reference) => {
                let value = lookup(vars, reference.name)?;
                match reference.filter {
                    None => out.push_str(value),
                    Some("string") => out.push_str(&quote_js_string(value)),
                    Some(other) => {
                        return Err(CodegenError::UnrecognizedFilter(other.to_string()));
                    },
                }
                rest = &rest[start + reference.len..];
            },
            None => {
                // Not a well-formed reference; emit the marker and move on.
                out.push_str("${");
                rest = &rest[start + 2..];
            },
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup<'a>(vars: &[(&str, &'a str)], name: &str) -> Result<&'a str, CodegenError> {
    vars.iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| CodegenError::UndefinedVariable(name.to_string()))
}

/// Scan a reference at the start of `s` (which begins with `${`).
fn scan_reference(s: &str) -> Option<Reference<'_>> {
    let body = &s[2..];
    let name_len = ident_len(body)?;
    let (name, after_name) = body.split_at(name_len);

    if let Some(after_pipe) = after_name.strip_prefix('|') {
        let filter_len = ident_len(after_pipe)?;
        let (filter, after_filter) = after_pipe.split_at(filter_len);
        if !after_filter.starts_with('}') {
            return None;
        }
        Some(Reference {
            name,
            filter: Some(filter),
            len: 2 + name_len + 1 + filter_len + 1,
        })
    } else if after_name.starts_with('}') {
        Some(Reference {
            name,
            filter: None,
            len: 2 + name_len + 1,
        })
    } else {
        None
    }
}

/// Length of the identifier at the start of `s`, or `None` if there isn't
/// one.
fn ident_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || !(bytes[0].is_ascii_alphabetic() || bytes[0] == b'_') {
        return None;
    }
    let mut len = 1;
    while len < bytes.len() && (bytes[len].is_ascii_alphanumeric() || bytes[len] == b'_') {
        len += 1;
    }
    Some(len)
}

/// Prepend the leading whitespace of the first line to every subsequent
/// line, so multi-line substitutions line up under the template line that
/// produced them. Single-line parts are returned unchanged.
fn reindent(part: &str) -> String {
    if !part.contains('\n') {
        return part.to_string();
    }

    let prefix: String = part
        .chars()
        .take_while(|c| c.is_whitespace() && *c != '\n')
        .collect();

    let mut lines = part.split('\n');
    let mut out = String::with_capacity(part.len() * 2);
    out.push_str(lines.next().unwrap_or(""));
    for line in lines {
        out.push('\n');
        out.push_str(&prefix);
        out.push_str(line);
    }
    out
}

// ══════════════════════════════════════════════════════════════════════════════
// JavaScript string escaping
// ══════════════════════════════════════════════════════════════════════════════

/// Quote a string as a JavaScript double-quoted literal.
///
/// Backslash, the closing quote, carriage return and line feed get their
/// named escapes; every code unit at or above 0x80 becomes a numeric
/// `\xHH` (≤ 0xFF) or `\uHHHH` escape with uppercase hex digits.
/// Characters outside the Basic Multilingual Plane are emitted as their
/// UTF-16 surrogate pair, matching the string model of the emitted
/// parser's language.
pub fn quote_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c if (c as u32) < 0x80 => out.push(c),
            c => push_char_escape(&mut out, c),
        }
    }
    out.push('"');
    out
}

/// Append the numeric escape(s) for a character: one `\xHH`/`\uHHHH` per
/// UTF-16 code unit.
pub(crate) fn push_char_escape(out: &mut String, ch: char) {
    let mut units = [0u16; 2];
    for unit in ch.encode_utf16(&mut units) {
        push_unit_escape(out, *unit);
    }
}

/// Append the numeric escape for a single UTF-16 code unit.
pub(crate) fn push_unit_escape(out: &mut String, unit: u16) {
    if unit <= 0xFF {
        write!(out, "\\x{:02X}", unit).unwrap();
    } else {
        write!(out, "\\u{:04X}", unit).unwrap();
    }
}
