//! Authentication controller
//!
//! Single owner of client-side auth state: the login/logout/password-change
//! state machine, per-account lockout bookkeeping, fingerprint-keyed rate
//! limiting, and durable session resumption. Observers subscribe to a watch
//! channel and receive a full [`AuthState`] snapshot on every transition.

use crate::config::AuthConfig;
use crate::session::SessionManager;
use crate::scheduler::TimerSet;
use crate::traits::{AuthSession, IdentityProvider, SecurityLevel, User};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use warden_security::{
    crypto, validate_email, AuditLog, ClientEnvironment, Clock, EventDraft, EventKind,
    KeyValueStore, RateLimiter, Severity,
};

const SESSION_KEY: &str = "warden.session";
const LOCKOUT_KEY: &str = "warden.lockouts";
const ATTEMPTS_KEY: &str = "warden.attempts";

/// Login form payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Observable snapshot of the authentication state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub login_attempts: u32,
    pub is_locked: bool,
    pub lockout_remaining_seconds: i64,
    pub rate_limit_remaining: u32,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub requires_password_change: bool,
    pub security_level: Option<SecurityLevel>,
}

impl AuthState {
    fn signed_out(rate_limit_remaining: u32) -> Self {
        Self {
            is_authenticated: false,
            user: None,
            is_loading: false,
            error: None,
            login_attempts: 0,
            is_locked: false,
            lockout_remaining_seconds: 0,
            rate_limit_remaining,
            session_expires_at: None,
            requires_password_change: false,
            security_level: None,
        }
    }
}

/// Shared service handles the controller composes over
#[derive(Clone)]
pub struct AuthServices {
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionManager>,
    pub limiter: Arc<RateLimiter>,
    pub audit: Arc<AuditLog>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// Per-account failure counters and active lockouts, mirrored durably so a
/// reload does not reset a lockout.
#[derive(Debug, Default)]
struct AccountBook {
    attempts: HashMap<String, u32>,
    lockouts: HashMap<String, DateTime<Utc>>,
}

/// Client-side authentication controller
pub struct AuthController {
    config: AuthConfig,
    services: AuthServices,
    environment: ClientEnvironment,
    state_tx: Arc<watch::Sender<AuthState>>,
    accounts: Arc<Mutex<AccountBook>>,
    active_session: Arc<Mutex<Option<String>>>,
    timers: TimerSet,
}

impl std::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthController")
            .field("provider", &self.services.identity.provider_name())
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthController {
    pub fn new(config: AuthConfig, services: AuthServices, environment: ClientEnvironment) -> Self {
        let initial = AuthState::signed_out(config.rate_limit.max_requests);
        let (state_tx, _) = watch::channel(initial);
        let controller = Self {
            config,
            services,
            environment,
            state_tx: Arc::new(state_tx),
            accounts: Arc::new(Mutex::new(AccountBook::default())),
            active_session: Arc::new(Mutex::new(None)),
            timers: TimerSet::new(),
        };
        controller.restore_account_book();
        controller
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Current state snapshot
    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Clear a displayed error without touching anything else
    pub fn clear_error(&self) {
        self.state_tx.send_modify(|s| s.error = None);
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn services(&self) -> &AuthServices {
        &self.services
    }

    pub fn environment(&self) -> &ClientEnvironment {
        &self.environment
    }

    /// ID of the live session, if any
    pub fn active_session_id(&self) -> Option<String> {
        self.active_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attempt a login.
    ///
    /// Order of checks: rate limit (keyed by client fingerprint), input
    /// validation, account lockout, then the identity backend. Each failed
    /// backend attempt advances the lockout counter; hitting the limit locks
    /// the account for the configured duration.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<AuthSession> {
        self.state_tx.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = self.login_inner(request).await;
        if let Err(err) = &result {
            let message = err.to_string();
            self.state_tx.send_modify(|s| {
                s.is_loading = false;
                s.error = Some(message);
            });
        }
        result
    }

    async fn login_inner(&self, request: LoginRequest) -> AuthResult<AuthSession> {
        let fingerprint = self.environment.fingerprint();
        let max_requests = self.config.rate_limit.max_requests;

        if !self.services.limiter.is_allowed(&fingerprint, max_requests) {
            let retry_after = self.retry_after(&fingerprint);
            self.services.audit.record(
                EventDraft::new(
                    EventKind::LoginAttempt,
                    Severity::Medium,
                    "login attempt rejected by rate limiter",
                )
                .user_agent(self.environment.user_agent.clone()),
            );
            self.state_tx.send_modify(|s| s.rate_limit_remaining = 0);
            return Err(AuthError::RateLimited {
                retry_after_seconds: retry_after,
            });
        }
        let remaining = self
            .services
            .limiter
            .remaining_requests(&fingerprint, max_requests);
        self.state_tx
            .send_modify(|s| s.rate_limit_remaining = remaining);

        let email = request.email.trim().to_lowercase();
        let mut violations = Vec::new();
        if let Err(message) = validate_email(&email) {
            violations.push(message);
        }
        if request.password.len() < self.config.session.login_min_password_length {
            violations.push(format!(
                "Password must be at least {} characters",
                self.config.session.login_min_password_length
            ));
        }
        if !violations.is_empty() {
            return Err(AuthError::Validation {
                messages: violations,
            });
        }

        self.check_lockout(&email)?;

        let outcome = match self
            .services
            .identity
            .authenticate(&email, &request.password)
            .await
        {
            Ok(outcome) => outcome,
            Err(AuthError::InvalidCredentials) => {
                return Err(self.record_failed_attempt(&email));
            }
            Err(err) => {
                self.services.audit.record(
                    EventDraft::new(
                        EventKind::LoginFailure,
                        Severity::High,
                        format!("identity backend error: {}", err),
                    )
                    .email(email.clone())
                    .user_agent(self.environment.user_agent.clone()),
                );
                return Err(err);
            }
        };

        self.clear_failures(&email);

        let now = self.services.clock.now();
        let lifetime = if request.remember_me {
            self.config.session.remember_me_seconds
        } else {
            self.config.session.timeout_seconds
        };
        let session = AuthSession {
            session_id: crypto::generate_session_id(self.services.clock.as_ref()),
            user: outcome.user.clone(),
            expires_at: now + chrono::Duration::seconds(lifetime as i64),
            requires_password_change: outcome.requires_password_change,
            security_level: SecurityLevel::for_user(&outcome.user),
            last_activity: now,
        };

        self.services.sessions.create_session(session.clone());
        self.persist_session(&session);
        *self
            .active_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session.session_id.clone());

        self.services.audit.record(
            EventDraft::new(EventKind::LoginSuccess, Severity::Low, "login succeeded")
                .user_id(outcome.user.uid.clone())
                .email(email)
                .user_agent(self.environment.user_agent.clone()),
        );
        tracing::info!(uid = %outcome.user.uid, provider = self.services.identity.provider_name(), "login succeeded");

        let state_session = session.clone();
        self.state_tx.send_modify(move |s| {
            s.is_authenticated = true;
            s.user = Some(state_session.user.clone());
            s.is_loading = false;
            s.error = None;
            s.login_attempts = 0;
            s.is_locked = false;
            s.lockout_remaining_seconds = 0;
            s.session_expires_at = Some(state_session.expires_at);
            s.requires_password_change = state_session.requires_password_change;
            s.security_level = Some(state_session.security_level);
        });

        Ok(session)
    }

    /// End the active session. Idempotent: a second call is a no-op.
    pub fn logout(&self) {
        let previous = self
            .active_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(session_id) = previous {
            let user_id = self
                .services
                .sessions
                .get_session(&session_id)
                .map(|s| s.user.uid);
            self.services.sessions.destroy_session(&session_id);
            if let Err(e) = self.services.store.remove(SESSION_KEY) {
                tracing::warn!(error = %e, "failed to remove persisted session");
            }
            let mut draft = EventDraft::new(EventKind::Logout, Severity::Low, "logout")
                .user_agent(self.environment.user_agent.clone());
            if let Some(uid) = user_id {
                draft = draft.user_id(uid);
            }
            self.services.audit.record(draft);
        }

        let remaining = self.state_tx.borrow().rate_limit_remaining;
        self.state_tx
            .send_replace(AuthState::signed_out(remaining));
    }

    /// Verify the active session is still live and refresh its activity.
    ///
    /// Returns `false` (after forcing a logout) when there is no session,
    /// the registry dropped it, or its absolute expiry has passed.
    pub fn check_session(&self) -> bool {
        let Some(session_id) = self.active_session_id() else {
            if self.state_tx.borrow().is_authenticated {
                self.logout();
            }
            return false;
        };

        let Some(session) = self.services.sessions.get_session(&session_id) else {
            tracing::info!("session no longer registered, signing out");
            self.logout();
            return false;
        };

        if session.is_expired(self.services.clock.now()) {
            tracing::info!(session_id = %session_id, "session expired, signing out");
            self.logout();
            self.state_tx.send_modify(|s| {
                s.error = Some(AuthError::SessionExpired.to_string());
            });
            return false;
        }

        self.persist_session(&session);
        self.state_tx
            .send_modify(|s| s.session_expires_at = Some(session.expires_at));
        true
    }

    /// Resume a persisted session after a reload. Returns whether a live
    /// session was restored.
    pub fn restore_session(&self) -> bool {
        let raw = match self.services.store.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "persisted session unreadable");
                return false;
            }
        };
        let session: AuthSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "persisted session corrupt, discarding");
                if let Err(e) = self.services.store.remove(SESSION_KEY) {
                    tracing::warn!(error = %e, "failed to discard corrupt session");
                }
                return false;
            }
        };

        if session.is_expired(self.services.clock.now()) {
            if let Err(e) = self.services.store.remove(SESSION_KEY) {
                tracing::warn!(error = %e, "failed to discard expired session");
            }
            return false;
        }

        self.services.sessions.create_session(session.clone());
        *self
            .active_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session.session_id.clone());

        self.state_tx.send_modify(move |s| {
            s.is_authenticated = true;
            s.user = Some(session.user.clone());
            s.session_expires_at = Some(session.expires_at);
            s.requires_password_change = session.requires_password_change;
            s.security_level = Some(session.security_level);
        });
        true
    }

    /// Change the signed-in user's password.
    ///
    /// The new password must match its confirmation, satisfy the creation
    /// policy in full, and differ from the current one. On success any
    /// outstanding forced-change flag is cleared.
    pub async fn change_password(
        &self,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> AuthResult<()> {
        let (session_id, user) = {
            let state = self.state_tx.borrow();
            match (&state.user, self.active_session_id()) {
                (Some(user), Some(id)) if state.is_authenticated => (id, user.clone()),
                _ => return Err(AuthError::access_denied("not signed in")),
            }
        };

        let mut violations = Vec::new();
        if new != confirm {
            violations.push("Passwords do not match".to_string());
        }
        violations.extend(self.config.password.validate(new));
        if new == current {
            violations.push("New password must be different from the current password".to_string());
        }
        if !violations.is_empty() {
            return Err(AuthError::Validation {
                messages: violations,
            });
        }

        self.services
            .identity
            .change_password(&user.uid, current, new)
            .await?;

        self.services.sessions.update_session(&session_id, |s| {
            s.requires_password_change = false;
            s.user.must_change_password = false;
            s.security_level = SecurityLevel::for_user(&s.user);
        });
        if let Some(session) = self.services.sessions.get_session(&session_id) {
            self.persist_session(&session);
        }

        self.services.audit.record(
            EventDraft::new(EventKind::PasswordChange, Severity::Medium, "password changed")
                .user_id(user.uid.clone())
                .email(user.email.clone()),
        );
        tracing::info!(uid = %user.uid, "password changed");

        self.state_tx.send_modify(|s| {
            s.requires_password_change = false;
            if let Some(u) = &mut s.user {
                u.must_change_password = false;
                s.security_level = Some(SecurityLevel::for_user(u));
            }
        });
        Ok(())
    }

    /// Coarse permission check: admins hold every permission, other
    /// authenticated users hold read-only ones.
    pub fn has_permission(&self, permission: &str) -> bool {
        let state = self.state_tx.borrow();
        if !state.is_authenticated {
            return false;
        }
        match &state.user {
            Some(user) if user.is_admin() => true,
            Some(_) => matches!(permission, "read" | "view"),
            None => false,
        }
    }

    /// Start the periodic session check and the authenticated heartbeat.
    /// Tasks hold weak references and stop once the controller is dropped.
    pub fn start_monitors(self: &Arc<Self>) {
        let check_interval = Duration::from_secs(self.config.session.check_interval_seconds);
        let weak: Weak<Self> = Arc::downgrade(self);
        self.timers.spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if controller.state_tx.borrow().is_authenticated {
                    controller.check_session();
                }
            }
        });

        let heartbeat = Duration::from_secs(self.config.session.heartbeat_seconds);
        let weak: Weak<Self> = Arc::downgrade(self);
        self.timers.spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if !controller.state_tx.borrow().is_authenticated {
                    continue;
                }
                if let Some(id) = controller.active_session_id() {
                    // get_session refreshes last_activity and the idle timer
                    if let Some(session) = controller.services.sessions.get_session(&id) {
                        controller.persist_session(&session);
                    }
                }
            }
        });
    }

    /// Stop all background monitors
    pub fn stop_monitors(&self) {
        self.timers.abort_all();
    }

    fn retry_after(&self, fingerprint: &str) -> i64 {
        let now = self.services.clock.now();
        self.services
            .limiter
            .reset_time(fingerprint)
            .map(|reset| (reset - now).num_seconds().max(1))
            .unwrap_or(self.config.rate_limit.window_seconds as i64)
    }

    /// Lazy lockout check: an elapsed lockout is cleared on the next
    /// attempt even if the auto-clear timer never fired.
    fn check_lockout(&self, email: &str) -> AuthResult<()> {
        let now = self.services.clock.now();
        let mut book = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(until) = book.lockouts.get(email).copied() {
            if until <= now {
                book.lockouts.remove(email);
                book.attempts.remove(email);
                drop(book);
                self.persist_account_book();
                self.state_tx.send_modify(|s| {
                    s.is_locked = false;
                    s.lockout_remaining_seconds = 0;
                    s.login_attempts = 0;
                });
                return Ok(());
            }
            let remaining = (until - now).num_seconds().max(1);
            drop(book);
            self.state_tx.send_modify(|s| {
                s.is_locked = true;
                s.lockout_remaining_seconds = remaining;
            });
            return Err(AuthError::AccountLocked {
                retry_after_seconds: remaining,
            });
        }
        Ok(())
    }

    fn record_failed_attempt(&self, email: &str) -> AuthError {
        let now = self.services.clock.now();
        let max_attempts = self.config.lockout.max_attempts;
        let duration = chrono::Duration::seconds(self.config.lockout.duration_seconds as i64);

        let (attempts, locked_until) = {
            let mut book = self
                .accounts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let attempts = book.attempts.entry(email.to_string()).or_insert(0);
            *attempts += 1;
            let attempts = *attempts;
            let locked_until = if attempts >= max_attempts {
                let until = now + duration;
                book.lockouts.insert(email.to_string(), until);
                Some(until)
            } else {
                None
            };
            (attempts, locked_until)
        };
        self.persist_account_book();

        if let Some(until) = locked_until {
            self.services.audit.record(
                EventDraft::new(
                    EventKind::AccountLocked,
                    Severity::High,
                    format!("account locked after {} failed attempts", attempts),
                )
                .email(email.to_string())
                .user_agent(self.environment.user_agent.clone()),
            );
            tracing::warn!(email = %email, attempts, "account locked");

            let remaining = (until - now).num_seconds().max(1);
            self.state_tx.send_modify(|s| {
                s.login_attempts = attempts;
                s.is_locked = true;
                s.lockout_remaining_seconds = remaining;
            });
            self.schedule_lockout_clear(email.to_string());
            AuthError::AccountLocked {
                retry_after_seconds: remaining,
            }
        } else {
            self.services.audit.record(
                EventDraft::new(
                    EventKind::LoginFailure,
                    Severity::Medium,
                    format!("failed login attempt {} of {}", attempts, max_attempts),
                )
                .email(email.to_string())
                .user_agent(self.environment.user_agent.clone()),
            );
            self.state_tx.send_modify(|s| s.login_attempts = attempts);
            AuthError::InvalidCredentials
        }
    }

    /// Best-effort timer mirroring the lazy expiry in [`Self::check_lockout`].
    /// The clock, not the sleep, decides whether the lockout has elapsed, so
    /// the timer can never clear a lockout early.
    fn schedule_lockout_clear(&self, email: String) {
        let duration = Duration::from_secs(self.config.lockout.duration_seconds);
        let accounts = Arc::clone(&self.accounts);
        let state_tx = Arc::clone(&self.state_tx);
        let clock = Arc::clone(&self.services.clock);
        self.timers.spawn(async move {
            tokio::time::sleep(duration).await;
            let mut book = accounts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if book.lockouts.get(&email).is_some_and(|u| *u <= clock.now()) {
                book.lockouts.remove(&email);
                book.attempts.remove(&email);
                drop(book);
                state_tx.send_modify(|s| {
                    s.is_locked = false;
                    s.lockout_remaining_seconds = 0;
                    s.login_attempts = 0;
                });
            }
        });
    }

    fn clear_failures(&self, email: &str) {
        let mut book = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let had_entries = book.attempts.remove(email).is_some()
            | book.lockouts.remove(email).is_some();
        drop(book);
        if had_entries {
            self.persist_account_book();
        }
    }

    fn persist_session(&self, session: &AuthSession) {
        match serde_json::to_string(session) {
            Ok(json) => {
                if let Err(e) = self.services.store.set(SESSION_KEY, &json) {
                    tracing::warn!(error = %e, "failed to persist session");
                }
            }
            Err(e) => tracing::warn!(error = %e, "session serialization failed"),
        }
    }

    fn persist_account_book(&self) {
        let (attempts, lockouts) = {
            let book = self
                .accounts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            (book.attempts.clone(), book.lockouts.clone())
        };
        for (key, json) in [
            (ATTEMPTS_KEY, serde_json::to_string(&attempts)),
            (LOCKOUT_KEY, serde_json::to_string(&lockouts)),
        ] {
            match json {
                Ok(json) => {
                    if let Err(e) = self.services.store.set(key, &json) {
                        tracing::warn!(error = %e, key, "failed to persist account book");
                    }
                }
                Err(e) => tracing::warn!(error = %e, key, "account book serialization failed"),
            }
        }
    }

    fn restore_account_book(&self) {
        let mut book = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Ok(Some(raw)) = self.services.store.get(ATTEMPTS_KEY) {
            if let Ok(attempts) = serde_json::from_str(&raw) {
                book.attempts = attempts;
            }
        }
        if let Ok(Some(raw)) = self.services.store.get(LOCKOUT_KEY) {
            if let Ok(lockouts) = serde_json::from_str(&raw) {
                book.lockouts = lockouts;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockIdentityProvider;
    use crate::traits::Role;
    use warden_security::{AuditConfig, EventFilter, ManualClock, MemoryStore};

    fn harness() -> (Arc<AuthController>, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::new());
        let config = AuthConfig::default();
        let services = AuthServices {
            identity: Arc::new(MockIdentityProvider::seeded().with_latency(Duration::ZERO)),
            sessions: Arc::new(SessionManager::new(
                config.session.timeout_seconds,
                clock.clone() as Arc<dyn Clock>,
            )),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit.window_seconds,
                clock.clone() as Arc<dyn Clock>,
            )),
            audit: Arc::new(AuditLog::new(
                &AuditConfig::default(),
                clock.clone() as Arc<dyn Clock>,
            )),
            store: store.clone(),
            clock: clock.clone() as Arc<dyn Clock>,
        };
        let controller = Arc::new(AuthController::new(
            config,
            services,
            ClientEnvironment::default(),
        ));
        (controller, clock, store)
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            remember_me: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_login_updates_state_and_persists() {
        let (controller, _clock, store) = harness();
        let session = controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();

        let state = controller.state();
        assert!(state.is_authenticated);
        assert_eq!(state.user.as_ref().map(|u| u.role), Some(Role::User));
        assert_eq!(state.security_level, Some(SecurityLevel::Medium));
        assert_eq!(state.login_attempts, 0);
        assert!(!state.is_loading);

        let raw = store.get(SESSION_KEY).unwrap().unwrap();
        let persisted: AuthSession = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.session_id, session.session_id);
    }

    #[tokio::test(start_paused = true)]
    async fn email_is_normalized_before_authentication() {
        let (controller, _clock, _store) = harness();
        let session = controller
            .login(login("  USER@PDF.gov.mm ", "user123"))
            .await
            .unwrap();
        assert_eq!(session.user.email, "user@pdf.gov.mm");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_is_rejected_before_the_backend() {
        let (controller, _clock, _store) = harness();
        let err = controller
            .login(login("not-an-email", "short"))
            .await
            .unwrap_err();
        match err {
            AuthError::Validation { messages } => assert_eq!(messages.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
        // No counter advance for pre-backend rejections
        assert_eq!(controller.state().login_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_lock_the_account() {
        let (controller, _clock, _store) = harness();
        let max = controller.config().lockout.max_attempts;

        for attempt in 1..max {
            let err = controller
                .login(login("user@pdf.gov.mm", "wrong-password"))
                .await
                .unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
            assert_eq!(controller.state().login_attempts, attempt);
        }

        let err = controller
            .login(login("user@pdf.gov.mm", "wrong-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));
        assert!(controller.state().is_locked);

        // Even the right password is refused while locked
        let err = controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn lockout_expires_lazily_with_the_clock() {
        let (controller, clock, _store) = harness();
        for _ in 0..controller.config().lockout.max_attempts {
            let _ = controller
                .login(login("user@pdf.gov.mm", "wrong-password"))
                .await;
        }
        assert!(controller.state().is_locked);

        clock.advance(chrono::Duration::seconds(
            controller.config().lockout.duration_seconds as i64 + 1,
        ));
        let session = controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        assert_eq!(session.user.email, "user@pdf.gov.mm");
        assert!(!controller.state().is_locked);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_timer_defers_to_the_domain_clock() {
        let (controller, clock, _store) = harness();
        for _ in 0..controller.config().lockout.max_attempts {
            let _ = controller
                .login(login("user@pdf.gov.mm", "wrong-password"))
                .await;
        }
        assert!(controller.state().is_locked);

        // The timer fires, but the clock says the lockout has not elapsed;
        // the account must stay locked.
        tokio::time::sleep(Duration::from_secs(
            controller.config().lockout.duration_seconds + 1,
        ))
        .await;
        assert!(controller.state().is_locked);
        let err = controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));

        clock.advance(chrono::Duration::seconds(
            controller.config().lockout.duration_seconds as i64 + 1,
        ));
        assert!(controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn lockout_survives_a_reload() {
        let (controller, _clock, store) = harness();
        for _ in 0..controller.config().lockout.max_attempts {
            let _ = controller
                .login(login("user@pdf.gov.mm", "wrong-password"))
                .await;
        }

        // Fresh controller over the same store sees the lockout
        let services = controller.services().clone();
        drop(controller);
        let reloaded = AuthController::new(
            AuthConfig::default(),
            AuthServices {
                store: store.clone(),
                ..services
            },
            ClientEnvironment::default(),
        );
        let err = reloaded
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_throttles_by_fingerprint() {
        let (controller, _clock, _store) = harness();
        let max = controller.config().rate_limit.max_requests;
        // Burn the whole window on validation failures (they still consume quota)
        for _ in 0..max {
            let _ = controller.login(login("bad", "short")).await;
        }
        let err = controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { .. }));
        assert_eq!(controller.state().rate_limit_remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_is_idempotent() {
        let (controller, _clock, store) = harness();
        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        controller.logout();
        controller.logout();

        assert!(!controller.state().is_authenticated);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        // Only one logout event despite two calls
        let logouts = controller.services().audit.events(&EventFilter {
            kind: Some(EventKind::Logout),
            ..EventFilter::default()
        });
        assert_eq!(logouts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_check_forces_logout() {
        let (controller, clock, _store) = harness();
        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        assert!(controller.check_session());

        clock.advance(chrono::Duration::seconds(
            controller.config().session.timeout_seconds as i64 + 1,
        ));
        assert!(!controller.check_session());
        let state = controller.state();
        assert!(!state.is_authenticated);
        assert_eq!(state.error, Some(AuthError::SessionExpired.to_string()));

        // Repeated checks stay false without further transitions
        assert!(!controller.check_session());
    }

    #[tokio::test(start_paused = true)]
    async fn session_restores_after_reload() {
        let (controller, _clock, store) = harness();
        let session = controller
            .login(login("admin@pdf.gov.mm", "admin123"))
            .await
            .unwrap();

        let services = controller.services().clone();
        drop(controller);
        let reloaded = AuthController::new(
            AuthConfig::default(),
            AuthServices {
                store: store.clone(),
                ..services
            },
            ClientEnvironment::default(),
        );
        assert!(reloaded.restore_session());
        let state = reloaded.state();
        assert!(state.is_authenticated);
        assert_eq!(state.security_level, Some(SecurityLevel::High));
        assert_eq!(reloaded.active_session_id(), Some(session.session_id));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_discards_an_expired_session() {
        let (controller, clock, store) = harness();
        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        clock.advance(chrono::Duration::days(1));

        let services = controller.services().clone();
        drop(controller);
        let reloaded = AuthController::new(
            AuthConfig::default(),
            services,
            ClientEnvironment::default(),
        );
        assert!(!reloaded.restore_session());
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn remember_me_extends_the_session() {
        let (controller, _clock, _store) = harness();
        let short = controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        controller.logout();
        let long = controller
            .login(LoginRequest {
                remember_me: true,
                ..login("user@pdf.gov.mm", "user123")
            })
            .await
            .unwrap();
        assert!(long.expires_at > short.expires_at);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_password_forces_change_then_clears() {
        let (controller, _clock, _store) = harness();
        controller
            .login(login("admin@pdf.gov.mm", "pdf2024"))
            .await
            .unwrap();
        let state = controller.state();
        assert!(state.requires_password_change);

        controller
            .change_password("pdf2024", "N3w!Secret9", "N3w!Secret9")
            .await
            .unwrap();
        let state = controller.state();
        assert!(!state.requires_password_change);
        assert_eq!(
            state.user.map(|u| u.must_change_password),
            Some(false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn change_password_collects_every_violation() {
        let (controller, _clock, _store) = harness();
        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();

        let err = controller
            .change_password("user123", "user123", "different")
            .await
            .unwrap_err();
        let AuthError::Validation { messages } = err else {
            panic!("expected validation error");
        };
        // Mismatched confirmation, policy violations, and same-as-current
        assert!(messages.contains(&"Passwords do not match".to_string()));
        assert!(messages
            .iter()
            .any(|m| m == "New password must be different from the current password"));
        assert!(messages.len() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn change_password_requires_authentication() {
        let (controller, _clock, _store) = harness();
        let err = controller
            .change_password("a", "N3w!Secret9", "N3w!Secret9")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn permissions_follow_role() {
        let (controller, _clock, _store) = harness();
        assert!(!controller.has_permission("read"));

        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        assert!(controller.has_permission("read"));
        assert!(controller.has_permission("view"));
        assert!(!controller.has_permission("delete"));

        controller.logout();
        controller
            .login(login("admin@pdf.gov.mm", "admin123"))
            .await
            .unwrap();
        assert!(controller.has_permission("delete"));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_subscribers_observe_transitions() {
        let (controller, _clock, _store) = harness();
        let mut rx = controller.subscribe();
        assert!(!rx.borrow().is_authenticated);

        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_signs_out_an_expired_session() {
        let (controller, clock, _store) = harness();
        controller
            .login(login("user@pdf.gov.mm", "user123"))
            .await
            .unwrap();
        controller.start_monitors();

        clock.advance(chrono::Duration::seconds(
            controller.config().session.timeout_seconds as i64 + 1,
        ));
        tokio::time::sleep(Duration::from_secs(
            controller.config().session.check_interval_seconds + 1,
        ))
        .await;
        assert!(!controller.state().is_authenticated);
        controller.stop_monitors();
    }
}
