//! Offset-preserving lexical helpers shared by the query scanners

use std::sync::LazyLock;

use regex::Regex;

/// Bare identifier. Leading digits never start a match, so numeric literals are skipped.
pub(crate) static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*").unwrap());

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

/// Words that are never column or table references
const KEYWORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CROSS", "DESC",
    "DISTINCT", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FROM", "FULL", "GLOB", "GROUP",
    "HAVING", "ILIKE", "IN", "INNER", "INTERSECT", "IS", "JOIN", "LEFT", "LIKE", "LIMIT",
    "NATURAL", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "RIGHT", "SELECT", "SOME",
    "THEN", "TRUE", "UNION", "USING", "WHEN", "WHERE", "WITH",
];

/// Join-type words that may be captured in place of a table name
pub(crate) const JOIN_MODIFIERS: &[&str] = &["INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL"];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Blank out string literals and comments while keeping every byte offset intact.
///
/// Quote characters of string literals are kept so that a literal still reads
/// as a value (`'   '`). Comments are replaced entirely.
pub(crate) fn mask_literals(sql: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Literal,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(sql.len());
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '\'' => {
                    state = State::Literal;
                    out.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::Literal => {
                if c == '\'' {
                    state = State::Code;
                    out.push(c);
                } else {
                    blank(&mut out, c);
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push(c);
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }

    out
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat(' ').take(c.len_utf8()));
    }
}

/// Parenthesis depth in effect at each byte of `text`
pub(crate) fn depth_map(text: &str) -> Vec<u32> {
    let mut depths = Vec::with_capacity(text.len());
    let mut depth = 0u32;
    for b in text.bytes() {
        match b {
            b'(' => {
                depths.push(depth);
                depth += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                depths.push(depth);
            }
            _ => depths.push(depth),
        }
    }
    depths
}

/// Split `text` on top-level commas, yielding each part with its offset
pub(crate) fn split_top_level(text: &str) -> Vec<(usize, &str)> {
    let depths = depth_map(text);
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        if b == b',' && depths[i] == 0 {
            parts.push((start, &text[start..i]));
            start = i + 1;
        }
    }
    parts.push((start, &text[start..]));
    parts
}

/// Whitespace-delimited tokens with their offsets
pub(crate) fn tokens(text: &str) -> impl Iterator<Item = (usize, &str)> {
    TOKEN.find_iter(text).map(|m| (m.start(), m.as_str()))
}

/// The identifier immediately before the end of `text`, if any
pub(crate) fn trailing_word(text: &str) -> Option<&str> {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map(|(i, _)| i)?;
    Some(&text[start..])
}

/// Strip identifier quoting and statement punctuation from a table token
pub(crate) fn clean_name(token: &str) -> &str {
    token
        .trim_end_matches([';', ',', ')'])
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
}
