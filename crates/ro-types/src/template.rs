//! Selection templates with positional placeholders.
//!
//! Templates follow the Python format-string subset that supercut files are
//! written in: `{0}`, `{1}` for explicit positions, `{}` for auto-numbered
//! positions, and `{{` / `}}` for literal braces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in function names understood by expression evaluators; never columns.
pub const BUILTIN_FUNCTIONS: &[&str] = &["abs", "sqrt", "log", "exp", "pow", "min", "max"];

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(usize),
}

/// A parsed selection template such as `"m_eff > {0} && met > {1}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SelectionTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl SelectionTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self, String> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut auto_index = 0usize;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => field.push(ch),
                            None => return Err(format!("unterminated placeholder in `{source}`")),
                        }
                    }
                    let field = field.trim();
                    let index = if field.is_empty() {
                        let index = auto_index;
                        auto_index += 1;
                        index
                    } else {
                        field
                            .parse::<usize>()
                            .map_err(|_| format!("unsupported placeholder `{{{field}}}`"))?
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(index));
                }
                '}' => return Err(format!("single `}}` in `{source}`")),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of pivot values the template needs (highest index + 1).
    pub fn arity(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(i) => Some(i + 1),
                Segment::Literal(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Substitute pivot values into the placeholders.
    ///
    /// Callers guarantee `pivot.len() >= self.arity()`; supercut loading
    /// rejects templates that violate it.
    pub fn render(&self, pivot: &[f64]) -> String {
        let mut out = String::with_capacity(self.source.len() + 8 * pivot.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(i) => match pivot.get(*i) {
                    Some(v) => out.push_str(&format_pivot(*v)),
                    None => out.push_str("nan"),
                },
            }
        }
        out
    }

    /// Column names the template references, placeholders excluded.
    pub fn variables(&self) -> Vec<String> {
        let stripped: String = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(_) => " ",
            })
            .collect();
        expression_variables(&stripped)
    }
}

impl TryFrom<String> for SelectionTemplate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SelectionTemplate> for String {
    fn from(template: SelectionTemplate) -> Self {
        template.source
    }
}

impl fmt::Display for SelectionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Canonical text form of a pivot value (shortest round-trip decimal).
///
/// Used both when rendering selections and when hashing cuts, so the two
/// can never disagree.
pub fn format_pivot(value: f64) -> String {
    format!("{value}")
}

/// Identifiers in `expression` that name columns, in first-seen order.
///
/// Numeric literals (including exponents) and calls to [`BUILTIN_FUNCTIONS`]
/// are skipped.
pub fn expression_variables(expression: &str) -> Vec<String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || chars[i] == '.'
                    || chars[i] == 'e'
                    || chars[i] == 'E'
                    || ((chars[i] == '+' || chars[i] == '-')
                        && i > start
                        && (chars[i - 1] == 'e' || chars[i - 1] == 'E')))
            {
                i += 1;
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let is_call = j < chars.len() && chars[j] == '(';
            if !(is_call && BUILTIN_FUNCTIONS.contains(&name.as_str())) && !names.contains(&name) {
                names.push(name);
            }
        } else {
            i += 1;
        }
    }

    names
}
