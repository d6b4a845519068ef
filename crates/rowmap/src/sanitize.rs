//! Inline-SQL sanitizer.
//!
//! Applied only to raw SQL strings handed directly to the engine.
//! Registry-loaded queries are trusted and never sanitized.

use std::collections::HashSet;
use thiserror::Error as ThisError;

///
/// SanitizeError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SanitizeError {
    #[error("multiple SQL statements are not permitted in inline SQL")]
    MultipleStatements,

    #[error("SQL verb '{verb}' is not permitted; allowed: {}", allowed.join(", "))]
    DisallowedVerb { verb: String, allowed: Vec<String> },
}

///
/// SqlSanitizer
///
/// Configurable checks for inline SQL. String literals (single-quoted,
/// `''` escapes) are never altered by any check.
///

#[derive(Clone, Debug)]
pub struct SqlSanitizer {
    /// Strip `--` line comments and `/* */` block comments.
    pub strip_comments: bool,

    /// Reject SQL containing a statement-terminating `;` followed by more
    /// content (prevents stacking such as `SELECT 1; DROP TABLE users`).
    pub block_multiple_statements: bool,

    /// When set, only statements whose leading keyword is in this set are
    /// permitted. `None` means no restriction.
    pub allowed_verbs: Option<HashSet<String>>,
}

impl Default for SqlSanitizer {
    fn default() -> Self {
        Self {
            strip_comments: true,
            block_multiple_statements: true,
            allowed_verbs: None,
        }
    }
}

impl SqlSanitizer {
    /// Restrict inline SQL to the given leading verbs (case-insensitive).
    #[must_use]
    pub fn with_allowed_verbs<I, V>(mut self, verbs: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.allowed_verbs = Some(verbs.into_iter().map(|v| v.into().to_uppercase()).collect());
        self
    }

    /// Apply all configured checks and return the (cleaned) SQL.
    pub fn sanitize(&self, sql: &str) -> Result<String, SanitizeError> {
        let sql = if self.strip_comments {
            strip_comments(sql)
        } else {
            sql.to_string()
        };

        if self.block_multiple_statements {
            check_single_statement(&sql)?;
        }
        if let Some(allowed) = &self.allowed_verbs {
            check_verb(&sql, allowed)?;
        }

        Ok(sql)
    }
}

///
/// Token
///
/// Literal-aware segmentation of a SQL string.
///

enum Token<'a> {
    StringLiteral(&'a str),
    Code(&'a str),
}

fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if i > last {
                tokens.push(Token::Code(&sql[last..i]));
            }
            let start = i;
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        i += 2; // '' escape
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            tokens.push(Token::StringLiteral(&sql[start..i]));
            last = i;
        } else {
            i += 1;
        }
    }

    if last < bytes.len() {
        tokens.push(Token::Code(&sql[last..]));
    }

    tokens
}

/// Remove comments from code segments, leaving string literals intact.
fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for token in tokenize(sql) {
        match token {
            Token::StringLiteral(literal) => out.push_str(literal),
            Token::Code(code) => strip_comments_in_code(code, &mut out),
        }
    }
    out
}

fn strip_comments_in_code(code: &str, out: &mut String) {
    let bytes = code.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'-' && i + 1 < bytes.len() && bytes[i + 1] == b'-' {
            match code[i..].find('\n') {
                Some(offset) => {
                    out.push('\n');
                    i += offset + 1;
                }
                None => break,
            }
        } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            match code[i + 2..].find("*/") {
                Some(offset) => {
                    out.push(' ');
                    i += offset + 4;
                }
                None => break,
            }
        } else {
            let ch_len = code[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&code[i..i + ch_len]);
            i += ch_len;
        }
    }
}

/// Reject a `;` followed by non-whitespace content outside literals.
fn check_single_statement(sql: &str) -> Result<(), SanitizeError> {
    for token in tokenize(sql) {
        let Token::Code(code) = token else { continue };
        for (position, _) in code.match_indices(';') {
            if !code[position + 1..].trim().is_empty() {
                return Err(SanitizeError::MultipleStatements);
            }
        }
    }
    Ok(())
}

/// Reject a leading keyword outside the allow-list.
fn check_verb(sql: &str, allowed: &HashSet<String>) -> Result<(), SanitizeError> {
    let verb: String = sql
        .trim_start()
        .chars()
        .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
        .collect();
    if verb.is_empty() {
        return Ok(());
    }

    let verb = verb.to_uppercase();
    if !allowed.contains(&verb) {
        let mut allowed: Vec<String> = allowed.iter().cloned().collect();
        allowed.sort_unstable();
        return Err(SanitizeError::DisallowedVerb { verb, allowed });
    }
    Ok(())
}

///
/// TESTS
///
