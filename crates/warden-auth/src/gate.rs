//! Security gate and threat monitor
//!
//! The gate runs an ordered checklist against the current auth state before
//! a protected view renders. Alongside it a background monitor watches for
//! automation signatures, navigation bursts, repeated permission failures,
//! and tampering with the durable integrity token; a critical finding forces
//! a logout.

use crate::controller::AuthController;
use crate::scheduler::TimerSet;
use crate::traits::{Role, SecurityLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use warden_security::{crypto, EventDraft, EventKind, Severity};

const NAVIGATION_KEY: &str = "warden.nav";
const PERMISSION_FAILURE_KEY: &str = "warden.permfail";
const INTEGRITY_KEY: &str = "warden.integrity";

/// Outcome of one gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
}

/// One named check with its outcome
#[derive(Debug, Clone, Serialize)]
pub struct SecurityCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub severity: Severity,
}

impl SecurityCheck {
    fn pass(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            message: String::new(),
            severity: Severity::Low,
        }
    }

    fn fail(name: &'static str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            message: message.into(),
            severity,
        }
    }

    fn warning(name: &'static str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            name,
            status: CheckStatus::Warning,
            message: message.into(),
            severity,
        }
    }
}

/// Full checklist result for one gate evaluation
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub checks: Vec<SecurityCheck>,
}

impl GateDecision {
    /// Access is allowed unless a check failed at high or critical
    /// severity. Warnings never block.
    pub fn allowed(&self) -> bool {
        !self
            .checks
            .iter()
            .any(|c| c.status == CheckStatus::Fail && c.severity >= Severity::High)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SecurityCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SecurityCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warning)
    }
}

/// Requirements a protected view declares
#[derive(Debug, Clone, Default)]
pub struct GatePolicy {
    /// Roles allowed through; empty means any authenticated role
    pub allowed_roles: Vec<Role>,
    /// Permissions the user must hold, all of them
    pub required_permissions: Vec<String>,
    /// Minimum security level
    pub minimum_level: Option<SecurityLevel>,
    /// Block access while a forced password change is outstanding
    pub enforce_password_change: bool,
}

impl GatePolicy {
    pub fn new() -> Self {
        Self {
            enforce_password_change: true,
            ..Self::default()
        }
    }

    pub fn allow_role(mut self, role: Role) -> Self {
        self.allowed_roles.push(role);
        self
    }

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    pub fn minimum_level(mut self, level: SecurityLevel) -> Self {
        self.minimum_level = Some(level);
        self
    }

    pub fn skip_password_change_check(mut self) -> Self {
        self.enforce_password_change = false;
        self
    }
}

/// Detected threat category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    RapidNavigation,
    RepeatedPermissionFailures,
    AutomationUserAgent,
    TamperEvidence,
}

/// One threat finding from a monitor scan
#[derive(Debug, Clone)]
pub struct Threat {
    pub kind: ThreatKind,
    pub severity: Severity,
    pub details: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimestampedEntry {
    at: DateTime<Utc>,
    label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IntegrityToken {
    token: String,
    rotated_at: DateTime<Utc>,
}

/// Checklist gate plus threat monitor over one [`AuthController`]
pub struct SecurityGate {
    controller: Arc<AuthController>,
    integrity: Mutex<IntegrityToken>,
    timers: TimerSet,
}

impl std::fmt::Debug for SecurityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityGate").finish_non_exhaustive()
    }
}

impl SecurityGate {
    /// Build a gate and mint the initial integrity token
    pub fn new(controller: Arc<AuthController>) -> Self {
        let token = IntegrityToken {
            token: crypto::generate_csrf_token(),
            rotated_at: controller.services().clock.now(),
        };
        let gate = Self {
            controller,
            integrity: Mutex::new(token.clone()),
            timers: TimerSet::new(),
        };
        gate.write_integrity(&token);
        gate
    }

    pub fn controller(&self) -> &Arc<AuthController> {
        &self.controller
    }

    /// Run the full checklist against the current state
    pub fn evaluate(&self, policy: &GatePolicy) -> GateDecision {
        let state = self.controller.state();
        let services = self.controller.services();
        let now = services.clock.now();
        let mut checks = Vec::new();

        checks.push(if state.is_authenticated {
            SecurityCheck::pass("authenticated")
        } else {
            SecurityCheck::fail("authenticated", "not signed in", Severity::High)
        });

        let session = self
            .controller
            .active_session_id()
            .and_then(|id| services.sessions.get_session(&id));
        checks.push(match &session {
            Some(_) => SecurityCheck::pass("session_registered"),
            None => SecurityCheck::fail(
                "session_registered",
                "no live session in the registry",
                Severity::High,
            ),
        });
        checks.push(match &session {
            Some(s) if s.is_expired(now) => {
                SecurityCheck::fail("session_fresh", "session has expired", Severity::High)
            }
            _ => SecurityCheck::pass("session_fresh"),
        });

        checks.push(if state.is_locked {
            SecurityCheck::fail("account_unlocked", "account is locked", Severity::High)
        } else {
            SecurityCheck::pass("account_unlocked")
        });

        checks.push(match &state.user {
            Some(user)
                if policy.allowed_roles.is_empty()
                    || policy.allowed_roles.contains(&user.role) =>
            {
                SecurityCheck::pass("role_allowed")
            }
            Some(user) => SecurityCheck::fail(
                "role_allowed",
                format!("role '{}' is not permitted here", user.role),
                Severity::High,
            ),
            None => SecurityCheck::fail("role_allowed", "no user", Severity::High),
        });

        checks.push(match (policy.minimum_level, state.security_level) {
            (Some(required), Some(actual)) if !actual.meets(required) => SecurityCheck::fail(
                "security_level",
                format!("level {:?} does not meet required {:?}", actual, required),
                Severity::High,
            ),
            (Some(_), None) => {
                SecurityCheck::fail("security_level", "no security level", Severity::High)
            }
            _ => SecurityCheck::pass("security_level"),
        });

        let missing: Vec<&String> = policy
            .required_permissions
            .iter()
            .filter(|p| !self.controller.has_permission(p))
            .collect();
        if missing.is_empty() {
            checks.push(SecurityCheck::pass("permissions"));
        } else {
            for permission in &missing {
                self.record_permission_denied(permission.as_str());
            }
            checks.push(SecurityCheck::fail(
                "permissions",
                format!(
                    "missing permissions: {}",
                    missing
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                Severity::High,
            ));
        }

        checks.push(
            if policy.enforce_password_change && state.requires_password_change {
                SecurityCheck::fail(
                    "password_current",
                    "a password change is required before continuing",
                    Severity::High,
                )
            } else {
                SecurityCheck::pass("password_current")
            },
        );

        checks.push(if self.controller.environment().is_secure_transport() {
            SecurityCheck::pass("secure_transport")
        } else {
            SecurityCheck::warning(
                "secure_transport",
                "connection is not using https",
                Severity::Medium,
            )
        });

        let environment = self.controller.environment();
        checks.push(if environment.storage_available && environment.crypto_available {
            SecurityCheck::pass("client_capabilities")
        } else {
            SecurityCheck::warning(
                "client_capabilities",
                "storage or crypto APIs unavailable",
                Severity::Medium,
            )
        });

        checks.push(if state.rate_limit_remaining > 0 {
            SecurityCheck::pass("rate_limit")
        } else {
            SecurityCheck::fail("rate_limit", "request quota exhausted", Severity::High)
        });

        checks.push(match self.automation_signature() {
            Some(signature) => SecurityCheck::warning(
                "user_agent",
                format!("automation signature '{}' in user agent", signature),
                Severity::High,
            ),
            None => SecurityCheck::pass("user_agent"),
        });

        let decision = GateDecision { checks };
        if !decision.allowed() {
            let failed: Vec<&str> = decision.failures().map(|c| c.name).collect();
            services.audit.record(
                EventDraft::new(
                    EventKind::SuspiciousActivity,
                    Severity::High,
                    format!("gate denied access: {}", failed.join(", ")),
                )
                .user_agent(self.controller.environment().user_agent.clone()),
            );
        }
        decision
    }

    /// Record a navigation into the bounded durable history
    pub fn record_navigation(&self, path: &str) {
        let limit = self.controller.config().gate.navigation_history_limit;
        self.append_entry(NAVIGATION_KEY, path, limit);
    }

    /// Record a denied permission; recent repeats become a threat finding
    pub fn record_permission_denied(&self, permission: &str) {
        let limit = self.controller.config().gate.navigation_history_limit;
        self.append_entry(PERMISSION_FAILURE_KEY, permission, limit);
        self.controller.services().audit.record(
            EventDraft::new(
                EventKind::PermissionDenied,
                Severity::Medium,
                format!("permission '{}' denied", permission),
            )
            .user_agent(self.controller.environment().user_agent.clone()),
        );
    }

    /// One monitor pass. Rotates the integrity token when due and returns
    /// every current finding without acting on it.
    pub fn scan(&self) -> Vec<Threat> {
        let config = &self.controller.config().gate;
        let now = self.controller.services().clock.now();
        let mut threats = Vec::new();

        let nav_window = chrono::Duration::seconds(config.navigation_window_seconds as i64);
        let recent_nav = self.count_recent(NAVIGATION_KEY, now, nav_window);
        if recent_nav >= config.navigation_burst_limit {
            threats.push(Threat {
                kind: ThreatKind::RapidNavigation,
                severity: Severity::High,
                details: format!(
                    "{} navigations in {}s",
                    recent_nav, config.navigation_window_seconds
                ),
            });
        }

        let perm_window =
            chrono::Duration::seconds(config.permission_failure_window_seconds as i64);
        let recent_denied = self.count_recent(PERMISSION_FAILURE_KEY, now, perm_window);
        if recent_denied >= config.permission_failure_limit {
            threats.push(Threat {
                kind: ThreatKind::RepeatedPermissionFailures,
                severity: Severity::High,
                details: format!(
                    "{} permission failures in {}s",
                    recent_denied, config.permission_failure_window_seconds
                ),
            });
        }

        if let Some(signature) = self.automation_signature() {
            threats.push(Threat {
                kind: ThreatKind::AutomationUserAgent,
                severity: Severity::High,
                details: format!("user agent matches '{}'", signature),
            });
        }

        if let Some(threat) = self.check_integrity(now) {
            threats.push(threat);
        }

        threats
    }

    /// One monitor pass with consequences: findings are audited and a
    /// critical finding forces a logout.
    pub fn scan_and_enforce(&self) -> Vec<Threat> {
        let threats = self.scan();
        let mut force_logout = false;
        for threat in &threats {
            self.controller.services().audit.record(
                EventDraft::new(
                    EventKind::SuspiciousActivity,
                    threat.severity,
                    format!("{:?}: {}", threat.kind, threat.details),
                )
                .user_agent(self.controller.environment().user_agent.clone()),
            );
            if threat.severity == Severity::Critical {
                force_logout = true;
            }
        }
        if force_logout {
            tracing::warn!("critical threat detected, forcing logout");
            self.controller.logout();
        }
        threats
    }

    /// Start the periodic threat scan
    pub fn start_monitoring(self: &Arc<Self>) {
        let interval =
            Duration::from_secs(self.controller.config().gate.threat_scan_interval_seconds);
        let weak = Arc::downgrade(self);
        self.timers.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(gate) = weak.upgrade() else {
                    break;
                };
                gate.scan_and_enforce();
            }
        });
    }

    pub fn stop_monitoring(&self) {
        self.timers.abort_all();
    }

    fn automation_signature(&self) -> Option<String> {
        let user_agent = self.controller.environment().user_agent.to_lowercase();
        if user_agent.is_empty() {
            return None;
        }
        self.controller
            .config()
            .gate
            .bot_signatures
            .iter()
            .find(|sig| user_agent.contains(sig.as_str()))
            .cloned()
    }

    /// Verify the durable integrity token matches the one in memory, then
    /// rotate it when its age exceeds the rotation cadence. A mismatch or
    /// an unreadable store is tamper evidence.
    fn check_integrity(&self, now: DateTime<Utc>) -> Option<Threat> {
        let store = &self.controller.services().store;
        let expected = {
            self.integrity
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        };

        let stored = match store.get(INTEGRITY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<IntegrityToken>(&raw) {
                Ok(token) => Some(token),
                Err(_) => None,
            },
            Ok(None) => None,
            Err(e) => {
                return Some(Threat {
                    kind: ThreatKind::TamperEvidence,
                    severity: Severity::Critical,
                    details: format!("integrity token unreadable: {}", e),
                });
            }
        };

        match stored {
            Some(token) if token.token == expected.token => {
                let rotation = chrono::Duration::seconds(
                    self.controller.config().gate.integrity_rotation_seconds as i64,
                );
                if now - expected.rotated_at >= rotation {
                    self.rotate_integrity(now);
                }
                None
            }
            _ => Some(Threat {
                kind: ThreatKind::TamperEvidence,
                severity: Severity::Critical,
                details: "integrity token missing or altered".to_string(),
            }),
        }
    }

    fn rotate_integrity(&self, now: DateTime<Utc>) {
        let token = IntegrityToken {
            token: crypto::generate_csrf_token(),
            rotated_at: now,
        };
        *self
            .integrity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token.clone();
        self.write_integrity(&token);
    }

    fn write_integrity(&self, token: &IntegrityToken) {
        match serde_json::to_string(token) {
            Ok(json) => {
                if let Err(e) = self.controller.services().store.set(INTEGRITY_KEY, &json) {
                    tracing::warn!(error = %e, "failed to persist integrity token");
                }
            }
            Err(e) => tracing::warn!(error = %e, "integrity token serialization failed"),
        }
    }

    fn append_entry(&self, key: &str, label: &str, limit: usize) {
        let store = &self.controller.services().store;
        let mut entries: Vec<TimestampedEntry> = match store.get(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => Vec::new(),
        };
        entries.push(TimestampedEntry {
            at: self.controller.services().clock.now(),
            label: label.to_string(),
        });
        if entries.len() > limit {
            let excess = entries.len() - limit;
            entries.drain(..excess);
        }
        match serde_json::to_string(&entries) {
            Ok(json) => {
                if let Err(e) = store.set(key, &json) {
                    tracing::warn!(error = %e, key, "failed to persist history");
                }
            }
            Err(e) => tracing::warn!(error = %e, key, "history serialization failed"),
        }
    }

    fn count_recent(&self, key: &str, now: DateTime<Utc>, window: chrono::Duration) -> usize {
        let entries: Vec<TimestampedEntry> = match self.controller.services().store.get(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => Vec::new(),
        };
        let cutoff = now - window;
        entries.iter().filter(|e| e.at > cutoff).count()
    }
}

/// Route decision produced by [`RouteGuard::check_route`]
#[derive(Debug, Clone)]
pub enum RouteDecision {
    Allow,
    RedirectToLogin { to: String },
    Deny(GateDecision),
}

/// Per-navigation guard in front of the gate.
///
/// Unauthenticated and locked-out visitors are redirected to the login
/// route without running the full checklist; everyone else gets a gate
/// evaluation.
pub struct RouteGuard {
    gate: Arc<SecurityGate>,
}

impl RouteGuard {
    pub fn new(gate: Arc<SecurityGate>) -> Self {
        Self { gate }
    }

    pub fn check_route(&self, path: &str, policy: &GatePolicy) -> RouteDecision {
        self.gate.record_navigation(path);

        let state = self.gate.controller().state();
        let login_path = self.gate.controller().config().gate.login_path.clone();
        if path == login_path {
            return RouteDecision::Allow;
        }
        if !state.is_authenticated || state.is_locked {
            return RouteDecision::RedirectToLogin { to: login_path };
        }

        let decision = self.gate.evaluate(policy);
        if decision.allowed() {
            RouteDecision::Allow
        } else {
            RouteDecision::Deny(decision)
        }
    }
}
