//! # warden-auth: client-session security core
//!
//! The stateful half of warden: login/logout/password-change state machine,
//! per-account lockout, session lifecycle with sliding expiration, and the
//! security gate that runs an ordered checklist on every navigation.
//!
//! Everything here enforces policy on the client side only. There is no
//! server-side authorization behind it; the [`traits::IdentityProvider`]
//! seam is where a real backend plugs in.

pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod hash;
pub mod providers;
pub mod scheduler;
pub mod session;
pub mod traits;

// Error handling
pub use error::AuthError;

// Core types
pub use traits::{AuthOutcome, AuthSession, IdentityProvider, Role, SecurityLevel, User};

// Configuration
pub use config::{AuthConfig, GateConfig, LockoutConfig, SessionConfig};

// Services
pub use controller::{AuthController, AuthServices, AuthState, LoginRequest};
pub use gate::{
    CheckStatus, GateDecision, GatePolicy, RouteDecision, RouteGuard, SecurityCheck, SecurityGate,
    Threat, ThreatKind,
};
pub use hash::{Argon2Hasher, PasswordHasher};
pub use providers::mock::MockIdentityProvider;
pub use scheduler::TimerSet;
pub use session::SessionManager;

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
