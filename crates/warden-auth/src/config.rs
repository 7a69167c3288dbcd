//! Authentication configuration types

use serde::{Deserialize, Serialize};
use warden_security::{PasswordPolicy, RateLimitConfig};

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Session lifecycle
    pub session: SessionConfig,

    /// Account lockout policy
    pub lockout: LockoutConfig,

    /// Login rate limiting (keyed by client fingerprint, not by account)
    pub rate_limit: RateLimitConfig,

    /// Password policy for new passwords
    pub password: PasswordPolicy,

    /// Security gate and threat monitoring
    pub gate: GateConfig,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Standard session lifetime in seconds
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,

    /// Session lifetime when "remember me" is requested
    #[serde(default = "default_remember_me")]
    pub remember_me_seconds: u64,

    /// Periodic session validity check cadence
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    /// Heartbeat cadence while authenticated
    #[serde(default = "default_heartbeat")]
    pub heartbeat_seconds: u64,

    /// Minimal password length accepted at login time. Deliberately looser
    /// than the creation policy so legacy-password accounts can still sign
    /// in and be forced through a password change.
    #[serde(default = "default_login_min_password")]
    pub login_min_password_length: usize,
}

/// Account lockout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lockout
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lockout duration in seconds
    #[serde(default = "default_lockout_duration")]
    pub duration_seconds: u64,
}

/// Security gate and threat monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Rolling window for the navigation-burst heuristic
    #[serde(default = "default_navigation_window")]
    pub navigation_window_seconds: u64,

    /// Navigations inside the window that count as a burst
    #[serde(default = "default_navigation_burst")]
    pub navigation_burst_limit: usize,

    /// Cap on the durably stored navigation history
    #[serde(default = "default_navigation_history")]
    pub navigation_history_limit: usize,

    /// Rolling window for the permission-failure heuristic
    #[serde(default = "default_permission_window")]
    pub permission_failure_window_seconds: u64,

    /// Permission failures inside the window that count as a threat
    #[serde(default = "default_permission_limit")]
    pub permission_failure_limit: usize,

    /// Threat scan cadence
    #[serde(default = "default_scan_interval")]
    pub threat_scan_interval_seconds: u64,

    /// Integrity token rotation cadence
    #[serde(default = "default_integrity_rotation")]
    pub integrity_rotation_seconds: u64,

    /// User-agent substrings treated as automation signatures
    #[serde(default = "default_bot_signatures")]
    pub bot_signatures: Vec<String>,

    /// Route the guard redirects unauthenticated users to
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_session_timeout() -> u64 {
    30 * 60
}
fn default_remember_me() -> u64 {
    7 * 24 * 60 * 60
}
fn default_check_interval() -> u64 {
    60
}
fn default_heartbeat() -> u64 {
    5 * 60
}
fn default_login_min_password() -> usize {
    6
}
fn default_max_attempts() -> u32 {
    5
}
fn default_lockout_duration() -> u64 {
    15 * 60
}
fn default_navigation_window() -> u64 {
    10
}
fn default_navigation_burst() -> usize {
    10
}
fn default_navigation_history() -> usize {
    50
}
fn default_permission_window() -> u64 {
    5 * 60
}
fn default_permission_limit() -> usize {
    5
}
fn default_scan_interval() -> u64 {
    30
}
fn default_integrity_rotation() -> u64 {
    60 * 60
}
fn default_bot_signatures() -> Vec<String> {
    [
        "headlesschrome",
        "phantomjs",
        "selenium",
        "puppeteer",
        "playwright",
        "bot",
        "crawler",
        "spider",
        "curl",
        "wget",
        "python-requests",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_login_path() -> String {
    "/login".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_session_timeout(),
            remember_me_seconds: default_remember_me(),
            check_interval_seconds: default_check_interval(),
            heartbeat_seconds: default_heartbeat(),
            login_min_password_length: default_login_min_password(),
        }
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            duration_seconds: default_lockout_duration(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            navigation_window_seconds: default_navigation_window(),
            navigation_burst_limit: default_navigation_burst(),
            navigation_history_limit: default_navigation_history(),
            permission_failure_window_seconds: default_permission_window(),
            permission_failure_limit: default_permission_limit(),
            threat_scan_interval_seconds: default_scan_interval(),
            integrity_rotation_seconds: default_integrity_rotation(),
            bot_signatures: default_bot_signatures(),
            login_path: default_login_path(),
        }
    }
}

impl AuthConfig {
    /// Relaxed settings for local development
    pub fn development() -> Self {
        let mut config = Self::default();
        config.password.require_special = false;
        config.lockout.duration_seconds = 60;
        config
    }

    /// Strict settings for production
    pub fn production() -> Self {
        let mut config = Self::default();
        config.password.min_length = 12;
        config.session.timeout_seconds = 15 * 60;
        config.lockout.duration_seconds = 30 * 60;
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.session.timeout_seconds == 0 {
            return Err("session.timeout_seconds must be at least 1".to_string());
        }
        if self.session.remember_me_seconds < self.session.timeout_seconds {
            return Err(
                "session.remember_me_seconds cannot be shorter than the standard timeout"
                    .to_string(),
            );
        }
        if self.session.check_interval_seconds == 0 || self.session.heartbeat_seconds == 0 {
            return Err("session monitor cadences must be at least 1 second".to_string());
        }
        if self.lockout.max_attempts == 0 {
            return Err("lockout.max_attempts must be at least 1".to_string());
        }
        if self.lockout.duration_seconds == 0 {
            return Err("lockout.duration_seconds must be at least 1".to_string());
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0 {
            return Err("rate_limit values must be at least 1".to_string());
        }
        if self.gate.navigation_burst_limit == 0 || self.gate.permission_failure_limit == 0 {
            return Err("gate thresholds must be at least 1".to_string());
        }
        self.password.check()?;
        Ok(())
    }
}
