//! Core identity types and the identity-provider seam

use crate::AuthResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// Coarse tier gating access to sensitive views
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
}

impl SecurityLevel {
    /// Derive the level from role and account flags: admin is high, an
    /// outstanding password change forces low, everything else is medium.
    pub fn for_user(user: &User) -> Self {
        if user.role == Role::Admin {
            SecurityLevel::High
        } else if user.must_change_password {
            SecurityLevel::Low
        } else {
            SecurityLevel::Medium
        }
    }

    /// Whether this level satisfies a required minimum (actual >= required)
    pub fn meets(self, required: SecurityLevel) -> bool {
        self >= required
    }
}

/// Authenticated identity record, owned by the identity backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub must_change_password: bool,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Live authenticated session, mirrored into durable storage for resumption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub session_id: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
    pub requires_password_change: bool,
    pub security_level: SecurityLevel,
    pub last_activity: DateTime<Utc>,
}

impl AuthSession {
    /// A session is expired once `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of a successful authentication
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub requires_password_change: bool,
}

/// Identity backend seam.
///
/// Implementations must return [`crate::AuthError::InvalidCredentials`] for
/// both unknown accounts and wrong passwords so callers cannot distinguish
/// whether an email is registered.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify credentials and return the account on success
    async fn authenticate(&self, email: &str, password: &str) -> AuthResult<AuthOutcome>;

    /// Change the password for an account, verifying the current one
    async fn change_password(&self, uid: &str, current: &str, new: &str) -> AuthResult<()>;

    /// Provider name for logging and identification
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, must_change: bool) -> User {
        User {
            uid: "u-1".to_string(),
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            role,
            must_change_password: must_change,
        }
    }

    #[test]
    fn security_level_derivation() {
        assert_eq!(SecurityLevel::for_user(&user(Role::Admin, false)), SecurityLevel::High);
        assert_eq!(SecurityLevel::for_user(&user(Role::Admin, true)), SecurityLevel::High);
        assert_eq!(SecurityLevel::for_user(&user(Role::User, true)), SecurityLevel::Low);
        assert_eq!(SecurityLevel::for_user(&user(Role::User, false)), SecurityLevel::Medium);
    }

    #[test]
    fn level_ordering_and_meets() {
        assert!(SecurityLevel::High.meets(SecurityLevel::Low));
        assert!(SecurityLevel::High.meets(SecurityLevel::High));
        assert!(SecurityLevel::Medium.meets(SecurityLevel::Low));
        assert!(!SecurityLevel::Low.meets(SecurityLevel::Medium));
        assert!(!SecurityLevel::Medium.meets(SecurityLevel::High));
        // required=low always passes
        for level in [SecurityLevel::Low, SecurityLevel::Medium, SecurityLevel::High] {
            assert!(level.meets(SecurityLevel::Low));
        }
    }

    #[test]
    fn session_expiry_boundary() {
        let now = Utc::now();
        let session = AuthSession {
            session_id: "s".to_string(),
            user: user(Role::User, false),
            expires_at: now,
            requires_password_change: false,
            security_level: SecurityLevel::Medium,
            last_activity: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::seconds(1)));
    }
}
