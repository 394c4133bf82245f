//! SQL extraction and read-only validation.
//!
//! Model responses arrive as free text, often wrapped in fenced code
//! blocks and sometimes containing more than one statement. Extraction
//! strips the fences and keeps the first statement; validation then
//! enforces the read-only, single-statement contract. The two stages are
//! deliberately separate so the rules stay unit-testable independently of
//! extraction quirks.
//!
//! Validation rules, in order (first failure wins):
//!
//! 1. the statement is non-empty after trimming;
//! 2. no statement separator appears outside string literals, except a
//!    trailing terminator;
//! 3. the first keyword is `SELECT` (case-insensitive, after
//!    whitespace/comment stripping);
//! 4. no deny-listed mutation/DDL keyword appears as a whole word outside
//!    string literals.

/// Keywords rejected anywhere in a statement, as whole words outside
/// string literals.
const DENIED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "TRUNCATE", "ATTACH",
    "DETACH", "PRAGMA", "VACUUM", "REINDEX",
];

/// A violated validation rule.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{rule}: {detail}")]
pub struct SqlGuardError {
    /// Stable rule name, surfaced in API errors.
    pub rule: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

impl SqlGuardError {
    fn new(rule: &'static str, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// Extract a single SQL statement from raw model text.
///
/// Strips surrounding fenced code-block markers and, when several
/// statements are present, keeps the first (including its terminator).
#[must_use]
pub fn extract(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = rest.strip_prefix("sql").unwrap_or(rest);
        text = text.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }

    let scan = scan_statement(text);
    match scan.semicolons.first() {
        Some(&idx) => text[..=idx].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Validate an extracted statement against the read-only rules.
pub fn validate(sql: &str) -> Result<(), SqlGuardError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(SqlGuardError::new(
            "empty_statement",
            "no SQL statement found in the model response",
        ));
    }

    let scan = scan_statement(trimmed);

    for &idx in &scan.semicolons {
        if !trimmed[idx + 1..].trim().is_empty() {
            return Err(SqlGuardError::new(
                "multiple_statements",
                "statement separator found outside a string literal",
            ));
        }
    }

    match scan.words.first() {
        Some(first) if first.eq_ignore_ascii_case("SELECT") => {}
        Some(first) => {
            return Err(SqlGuardError::new(
                "not_a_select",
                format!("statement begins with {first}, only SELECT is allowed"),
            ));
        }
        None => {
            return Err(SqlGuardError::new(
                "not_a_select",
                "statement has no leading keyword",
            ));
        }
    }

    for word in &scan.words {
        let upper = word.to_ascii_uppercase();
        if DENIED_KEYWORDS.contains(&upper.as_str()) {
            return Err(SqlGuardError::new(
                "denied_keyword",
                format!("keyword {upper} is not allowed in read-only queries"),
            ));
        }
    }

    Ok(())
}

/// Extract and validate in one step.
pub fn extract_and_validate(raw: &str) -> Result<String, SqlGuardError> {
    let sql = extract(raw);
    validate(&sql)?;
    Ok(sql)
}

/// Word tokens and separator positions found outside string literals and
/// comments.
struct StatementScan {
    words: Vec<String>,
    /// Byte offsets of `;` characters outside literals and comments.
    semicolons: Vec<usize>,
}

fn scan_statement(sql: &str) -> StatementScan {
    #[derive(PartialEq)]
    enum Mode {
        Code,
        SingleQuote,
        DoubleQuote,
        LineComment,
        BlockComment,
    }

    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let mut mode = Mode::Code;
    let mut words = Vec::new();
    let mut word = String::new();
    let mut semicolons = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let (idx, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, n)| n);

        match mode {
            Mode::Code => {
                if c.is_alphanumeric() || c == '_' {
                    word.push(c);
                } else {
                    if !word.is_empty() {
                        words.push(std::mem::take(&mut word));
                    }
                    match c {
                        '\'' => mode = Mode::SingleQuote,
                        '"' => mode = Mode::DoubleQuote,
                        '-' if next == Some('-') => {
                            mode = Mode::LineComment;
                            i += 1;
                        }
                        '/' if next == Some('*') => {
                            mode = Mode::BlockComment;
                            i += 1;
                        }
                        ';' => semicolons.push(idx),
                        _ => {}
                    }
                }
            }
            Mode::SingleQuote => {
                if c == '\'' {
                    // '' is an escaped quote inside the literal
                    if next == Some('\'') {
                        i += 1;
                    } else {
                        mode = Mode::Code;
                    }
                }
            }
            Mode::DoubleQuote => {
                if c == '"' {
                    mode = Mode::Code;
                }
            }
            Mode::LineComment => {
                if c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    mode = Mode::Code;
                    i += 1;
                }
            }
        }
        i += 1;
    }
    if !word.is_empty() {
        words.push(word);
    }

    StatementScan { words, semicolons }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_code_blocks() {
        assert_eq!(
            extract("```sql\nSELECT * FROM users;\n```"),
            "SELECT * FROM users;"
        );
        assert_eq!(extract("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(extract("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn keeps_first_statement_only() {
        assert_eq!(
            extract("SELECT id FROM users; SELECT name FROM users;"),
            "SELECT id FROM users;"
        );
    }

    #[test]
    fn semicolon_inside_literal_does_not_split() {
        let sql = "SELECT * FROM logs WHERE line = 'a;b' LIMIT 1";
        assert_eq!(extract(sql), sql);
    }

    #[test]
    fn valid_select_passes() {
        assert!(validate("SELECT * FROM users;").is_ok());
        assert!(validate("select name from users where id = 1").is_ok());
        assert!(validate("-- recent signups\nSELECT * FROM users").is_ok());
    }

    #[test]
    fn empty_statement_is_rejected() {
        let err = validate("   ").unwrap_err();
        assert_eq!(err.rule, "empty_statement");
    }

    #[test]
    fn trailing_terminator_is_allowed() {
        assert!(validate("SELECT 1;").is_ok());
    }

    #[test]
    fn embedded_separator_is_rejected() {
        let err = validate("SELECT 1; SELECT 2").unwrap_err();
        assert_eq!(err.rule, "multiple_statements");
    }

    #[test]
    fn non_select_is_rejected() {
        let err = validate("DELETE FROM users;").unwrap_err();
        assert_eq!(err.rule, "not_a_select");

        let err = validate("WITH t AS (SELECT 1) SELECT * FROM t").unwrap_err();
        assert_eq!(err.rule, "not_a_select");
    }

    #[test]
    fn denied_keywords_are_rejected_as_whole_words() {
        for sql in [
            "SELECT * FROM users WHERE id IN (DELETE FROM users)",
            "SELECT 1 UNION SELECT name FROM sqlite_master; DROP TABLE users",
            "SELECT * FROM t PRAGMA table_info(t)",
        ] {
            assert!(validate(sql).is_err(), "expected rejection: {sql}");
        }
    }

    #[test]
    fn denied_keyword_inside_literal_is_allowed() {
        assert!(validate("SELECT * FROM notes WHERE body = 'please drop me a line'").is_ok());
        assert!(validate("SELECT 'insert update delete' AS words").is_ok());
    }

    #[test]
    fn keyword_as_substring_is_allowed() {
        // "created_at" contains CREATE but is a single word
        assert!(validate("SELECT created_at FROM users").is_ok());
        assert!(validate("SELECT * FROM updates_log").is_ok());
    }

    #[test]
    fn keyword_in_comment_is_ignored() {
        assert!(validate("SELECT 1 -- drop table users\n").is_ok());
        assert!(validate("SELECT 1 /* insert */").is_ok());
    }

    #[test]
    fn extract_and_validate_round_trip() {
        let sql = extract_and_validate("```sql\nSELECT * FROM users;\n```").unwrap();
        assert_eq!(sql, "SELECT * FROM users;");

        let err = extract_and_validate("DELETE FROM users;").unwrap_err();
        assert_eq!(err.rule, "not_a_select");
    }
}
