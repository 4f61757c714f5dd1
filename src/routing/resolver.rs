//! Argument name resolution.
//!
//! # Responsibilities
//! - Describe a target function's declared parameter list (`Signature`)
//! - Recover the declared name of the parameter at a given position
//!
//! # Design Decisions
//! - Signatures are either listed explicitly or parsed from Rust source text
//!   (usually produced by the `signature!` macro)
//! - Receivers (`self`, `&self`, ...) are not counted as positions
//! - Destructuring and other non-identifier patterns resolve to an error
//!   instead of a guessed name

use thiserror::Error;

use crate::routing::handler::TargetFn;

/// Error type for parameter name resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no parameter list found in signature")]
    NoParameterList,

    #[error("function {0} has no declared signature")]
    MissingSignature(String),

    #[error("parameter index {index} out of range (function declares {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("parameter {index} uses unsupported pattern `{pattern}`")]
    UnsupportedPattern { index: usize, pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Param {
    Named(String),
    Unsupported(String),
}

/// Declared parameter list of a target function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Result<Vec<Param>, ResolveError>,
}

/// Build a [`Signature`] from a Rust function signature written inline.
///
/// ```
/// let sig = route_registry::signature!(fn get_ping(pong_message: Option<String>));
/// assert_eq!(sig.name_at(0).unwrap(), "pong_message");
/// ```
#[macro_export]
macro_rules! signature {
    ($($sig:tt)*) => {
        $crate::routing::resolver::Signature::parse(stringify!($($sig)*))
    };
}

impl Signature {
    /// Signature from explicit parameter names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: Ok(names.into_iter().map(|n| Param::Named(n.into())).collect()),
        }
    }

    /// Parse a textual function signature such as `fn get_echo(echo: String) -> String`.
    ///
    /// Never fails outright; an unparsable signature reports its error when
    /// a name is requested.
    pub fn parse(text: &str) -> Self {
        Self {
            params: parse_params(text),
        }
    }

    /// Number of declared (non-receiver) parameters.
    pub fn len(&self) -> usize {
        self.params.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Parameter count of a signature that parsed; `None` when it did not.
    pub fn declared_len(&self) -> Option<usize> {
        self.params.as_ref().ok().map(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared name of the parameter at `index`.
    pub fn name_at(&self, index: usize) -> Result<&str, ResolveError> {
        let params = self.params.as_ref().map_err(Clone::clone)?;
        match params.get(index) {
            Some(Param::Named(name)) => Ok(name),
            Some(Param::Unsupported(pattern)) => Err(ResolveError::UnsupportedPattern {
                index,
                pattern: pattern.clone(),
            }),
            None => Err(ResolveError::IndexOutOfRange {
                index,
                len: params.len(),
            }),
        }
    }
}

/// Resolve the declared name of `target`'s parameter at `index`.
pub fn resolve_parameter_name(target: &TargetFn, index: usize) -> Result<String, ResolveError> {
    let signature = target
        .signature()
        .ok_or_else(|| ResolveError::MissingSignature(target.name().to_string()))?;
    signature.name_at(index).map(str::to_owned)
}

fn parse_params(text: &str) -> Result<Vec<Param>, ResolveError> {
    let text = strip_comments(text);
    let open = find_list_open(&text).ok_or(ResolveError::NoParameterList)?;
    let close = find_matching_close(&text, open).ok_or(ResolveError::NoParameterList)?;

    Ok(split_top_level(&text[open + 1..close], ',')
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| !is_receiver(p))
        .map(classify)
        .collect())
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map(|i| &after[i..]).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map(|i| &after[i + 2..]).unwrap_or("");
            out.push(' ');
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

/// Opening parenthesis of the parameter list: the first `(` outside generics.
fn find_list_open(text: &str) -> Option<usize> {
    let mut angle = 0i32;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        match c {
            '<' => angle += 1,
            '>' if prev != '-' => angle -= 1,
            '(' if angle <= 0 => return Some(i),
            _ => {}
        }
        prev = c;
    }
    None
}

fn find_matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` where no bracket of any kind is open.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '>' if prev != '-' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(&text[start..]);
    parts
}

fn pattern_of(decl: &str) -> &str {
    let pattern = split_top_level(decl, ':')[0];
    pattern.split('=').next().unwrap_or(pattern).trim()
}

fn is_receiver(decl: &str) -> bool {
    let words: Vec<&str> = pattern_of(decl)
        .split(|c: char| c.is_whitespace() || c == '&')
        .filter(|w| !w.is_empty() && *w != "mut" && !w.starts_with('\''))
        .collect();
    words == ["self"]
}

fn classify(decl: &str) -> Param {
    let pattern = pattern_of(decl);
    let ident = pattern
        .strip_prefix("mut")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim)
        .unwrap_or(pattern);
    let ident = ident.strip_prefix("r#").unwrap_or(ident);

    if is_identifier(ident) {
        Param::Named(ident.to_string())
    } else {
        Param::Unsupported(pattern.to_string())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
    starts_ok && s != "_" && chars.all(|c| c.is_alphanumeric() || c == '_')
}
