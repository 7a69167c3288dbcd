//! Identity provider implementations

pub mod mock;

pub use mock::MockIdentityProvider;
