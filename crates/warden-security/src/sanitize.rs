//! Input sanitization and pattern-based validation
//!
//! HTML-escaping, email/phone/identifier format checks, and heuristic
//! SQL-injection / XSS pattern matching. The heuristics are defense in
//! depth for logging and early rejection; they are NOT an injection
//! firewall and must never be relied on as a security boundary.

use crate::password::PasswordPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum length accepted for an email address (RFC 5321 path limit)
const MAX_EMAIL_LENGTH: usize = 254;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .expect("email pattern is valid")
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 \-()]{5,19}$").expect("phone pattern is valid"))
}

fn personnel_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9\-]{3,20}$").expect("personnel id pattern is valid"))
}

fn sql_patterns() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)\b(select|insert|update|delete|drop|union|exec|execute|truncate|alter)\b",
            r"(--|;|/\*|\*/)",
            r"(?i)\b(or|and)\b\s+[\w'\x22]+\s*=\s*[\w'\x22]+",
            r"(?i)'\s*(or|and)\s",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("sql pattern is valid"))
        .collect()
    })
}

fn xss_patterns() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)<\s*script",
            r"(?i)javascript:",
            r"(?i)vbscript:",
            r"(?i)\bon\w+\s*=",
            r"(?i)<\s*iframe",
            r"(?i)eval\s*\(",
            r"(?i)expression\s*\(",
            r"(?i)data:text/html",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("xss pattern is valid"))
        .collect()
    })
}

/// Trim and HTML-escape an input string.
///
/// The output contains no unescaped `<`, `>`, `"`, `'`, `/`, or `&`
/// characters, so it is safe to embed in markup text or quoted attributes.
pub fn sanitize_input(input: &str) -> String {
    html_escape::encode_quoted_attribute(input.trim())
        .replace('/', "&#x2F;")
}

/// Validate an email address: non-empty, bounded length, `local@domain.tld`.
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email address is required".to_string());
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(format!(
            "Email address must be at most {} characters",
            MAX_EMAIL_LENGTH
        ));
    }
    if !email_regex().is_match(email) {
        return Err("Email address format is invalid".to_string());
    }
    Ok(())
}

/// Heuristic check for SQL-injection-shaped input. Defense in depth only.
pub fn looks_like_sql_injection(input: &str) -> bool {
    sql_patterns().iter().any(|re| re.is_match(input))
}

/// Heuristic check for XSS-shaped input. Defense in depth only.
pub fn looks_like_xss(input: &str) -> bool {
    xss_patterns().iter().any(|re| re.is_match(input))
}

/// Kind of input being validated, selects the applicable rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Email,
    Password,
    Text,
    Phone,
    PersonnelId,
}

/// Result of validating one input value
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    /// The value to use downstream. Sanitized for every kind except
    /// passwords, which are returned verbatim: a password must reach the
    /// hasher exactly as typed, never HTML-escaped.
    pub value: String,

    /// All rule violations found, human-readable
    pub errors: Vec<String>,
}

impl ValidatedInput {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validator dispatching on [`InputKind`]
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    policy: PasswordPolicy,
}

impl InputValidator {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    /// Validate and sanitize a single input value.
    pub fn validate(&self, input: &str, kind: InputKind) -> ValidatedInput {
        match kind {
            InputKind::Email => {
                let mut errors = Vec::new();
                if let Err(e) = validate_email(input) {
                    errors.push(e);
                }
                ValidatedInput {
                    value: sanitize_input(input),
                    errors,
                }
            }
            InputKind::Password => ValidatedInput {
                value: input.to_string(),
                errors: self.policy.validate(input),
            },
            InputKind::Text => {
                let mut errors = Vec::new();
                if looks_like_sql_injection(input) {
                    errors.push("Input contains disallowed SQL-like content".to_string());
                }
                if looks_like_xss(input) {
                    errors.push("Input contains disallowed markup content".to_string());
                }
                ValidatedInput {
                    value: sanitize_input(input),
                    errors,
                }
            }
            InputKind::Phone => {
                let trimmed = input.trim();
                let mut errors = Vec::new();
                if !phone_regex().is_match(trimmed) {
                    errors.push("Phone number format is invalid".to_string());
                }
                ValidatedInput {
                    value: sanitize_input(input),
                    errors,
                }
            }
            InputKind::PersonnelId => {
                let trimmed = input.trim();
                let mut errors = Vec::new();
                if !personnel_id_regex().is_match(trimmed) {
                    errors.push(
                        "Personnel ID must be 3-20 letters, digits, or hyphens".to_string(),
                    );
                }
                ValidatedInput {
                    value: sanitize_input(input),
                    errors,
                }
            }
        }
    }
}
