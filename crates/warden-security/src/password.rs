//! Password strength policy
//!
//! Unlike a fail-fast validator, [`PasswordPolicy::validate`] collects every
//! violated rule so the caller can show the full list at once.

use serde::{Deserialize, Serialize};

/// Special characters accepted for the "special character" rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Passwords rejected outright regardless of composition
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "qwerty123",
    "abc12345",
    "iloveyou",
    "welcome1",
    "letmein1",
];

/// Password composition policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum password length
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Maximum password length
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Require at least one uppercase letter
    #[serde(default = "default_true")]
    pub require_uppercase: bool,

    /// Require at least one lowercase letter
    #[serde(default = "default_true")]
    pub require_lowercase: bool,

    /// Require at least one digit
    #[serde(default = "default_true")]
    pub require_digit: bool,

    /// Require at least one character from [`SPECIAL_CHARACTERS`]
    #[serde(default = "default_true")]
    pub require_special: bool,

    /// Reject passwords from the common-password deny list
    #[serde(default = "default_true")]
    pub reject_common: bool,
}

fn default_min_length() -> usize {
    8
}
fn default_max_length() -> usize {
    128
}
fn default_true() -> bool {
    true
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            reject_common: true,
        }
    }
}

impl PasswordPolicy {
    /// Validate a password, returning every violated rule.
    ///
    /// An empty vector means the password satisfies the policy.
    pub fn validate(&self, password: &str) -> Vec<String> {
        let mut errors = Vec::new();

        if password.len() < self.min_length {
            errors.push(format!(
                "Password must be at least {} characters long",
                self.min_length
            ));
        }
        if password.len() > self.max_length {
            errors.push(format!(
                "Password must be at most {} characters long",
                self.max_length
            ));
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one number".to_string());
        }
        if self.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            errors.push("Password must contain at least one special character".to_string());
        }
        if self.reject_common
            && COMMON_PASSWORDS
                .iter()
                .any(|p| p.eq_ignore_ascii_case(password))
        {
            errors.push("Password is too common".to_string());
        }

        errors
    }

    /// Validate the policy itself
    pub fn check(&self) -> Result<(), String> {
        if self.min_length == 0 {
            return Err("Password min_length must be at least 1".to_string());
        }
        if self.min_length > self.max_length {
            return Err("Password min_length cannot be greater than max_length".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_only_password_reports_exactly_missing_classes() {
        let policy = PasswordPolicy::default();
        let errors = policy.validate("abcdefgh");
        assert_eq!(errors.len(), 3, "got: {:?}", errors);
        assert!(errors.iter().any(|e| e.contains("uppercase")));
        assert!(errors.iter().any(|e| e.contains("number")));
        assert!(errors.iter().any(|e| e.contains("special")));
    }

    #[test]
    fn compliant_password_passes() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("Str0ng!pass").is_empty());
    }

    #[test]
    fn short_password_collects_all_violations() {
        let policy = PasswordPolicy::default();
        let errors = policy.validate("ab");
        assert!(errors.iter().any(|e| e.contains("at least 8")));
        assert!(errors.len() >= 4);
    }

    #[test]
    fn overlong_password_rejected() {
        let policy = PasswordPolicy::default();
        let long = format!("Aa1!{}", "x".repeat(130));
        let errors = policy.validate(&long);
        assert!(errors.iter().any(|e| e.contains("at most 128")));
    }

    #[test]
    fn common_passwords_rejected_case_insensitively() {
        let policy = PasswordPolicy {
            require_uppercase: false,
            require_special: false,
            ..PasswordPolicy::default()
        };
        assert!(policy
            .validate("Password123")
            .iter()
            .any(|e| e.contains("too common")));
    }

    #[test]
    fn policy_bounds_are_checked() {
        let policy = PasswordPolicy {
            min_length: 20,
            max_length: 10,
            ..PasswordPolicy::default()
        };
        assert!(policy.check().is_err());
        assert!(PasswordPolicy::default().check().is_ok());
    }
}
