//! Version-insensitive path forms.
//!
//! A path like `/usr/lib64/libfoo.so.1.2.3` is turned into
//! `/usr/lib64/libfoo.so.?.?.?` so that the same library matches across a
//! soname bump.  Numeric `.`-separated tokens are replaced one character
//! per `?`, which keeps the token width significant: `1` and `10` stay
//! distinct.  A `?` is never numeric, so the result is a fixed point.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Tokens that look like a version component.
const NUMERIC_PATTERN: &str = "^[0-9_-]+$";
/// Directory name that is never tokenized.
const LIB64: &str = "lib64";
const WILDCARD: char = '?';
/// Tokens containing this are kept verbatim.
pub const DEBUG_MARKER: &str = "debug";

static NUMERIC_RE: Lazy<Option<Regex>> = Lazy::new(|| match Regex::new(NUMERIC_PATTERN) {
    Ok(r) => Some(r),
    Err(e) => {
        tracing::warn!("compiling {NUMERIC_PATTERN}: {e}");
        None
    }
});

fn is_numeric(token: &str) -> bool {
    match NUMERIC_RE.as_ref() {
        Some(re) => re.is_match(token),
        None => {
            !token.is_empty()
                && token
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '_' || c == '-')
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    /// Kept as is.
    Literal(&'a str),
    /// Replaced by this many wildcards.
    Generic(usize),
}

fn classify<'a>(token: &'a str, ignore: Option<&str>, debug_marker: &str) -> Token<'a> {
    if Some(token) == ignore {
        return Token::Literal(token);
    }
    if !debug_marker.is_empty() && token.contains(debug_marker) {
        return Token::Literal(token);
    }
    if is_numeric(token) {
        Token::Generic(token.chars().count())
    } else {
        Token::Literal(token)
    }
}

fn generalize_component(component: &str, ignore: Option<&str>, debug_marker: &str) -> String {
    let mut r = String::with_capacity(component.len());
    for (i, token) in component.split('.').enumerate() {
        if i > 0 {
            r.push('.');
        }
        match classify(token, ignore, debug_marker) {
            Token::Literal(s) => r.push_str(s),
            Token::Generic(n) => r.extend(std::iter::repeat(WILDCARD).take(n)),
        }
    }
    r
}

/// Replace numeric tokens of `path` with wildcards.  `ignore` names one
/// token (usually the build architecture) that is always kept.
pub fn generalize(path: &str, ignore: Option<&str>) -> String {
    generalize_with_marker(path, ignore, DEBUG_MARKER)
}

/// Like [`generalize`] with a custom marker for tokens to keep verbatim.
pub fn generalize_with_marker(path: &str, ignore: Option<&str>, debug_marker: &str) -> String {
    let components: Vec<&str> = path.split('/').collect();
    let last = components.len().saturating_sub(1);
    let mut r: Vec<Cow<str>> = Vec::with_capacity(components.len());
    for (i, component) in components.iter().enumerate() {
        // Directory components: the numeric test is subsumed by the lib64
        // comparison, so in practice only a literal `lib64` is left alone.
        let tokenize = i == last || is_numeric(component) || *component != LIB64;
        if tokenize {
            r.push(Cow::Owned(generalize_component(
                component,
                ignore,
                debug_marker,
            )));
        } else {
            r.push(Cow::Borrowed(component));
        }
    }
    r.join("/")
}
