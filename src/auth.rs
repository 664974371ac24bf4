//! Credential pair, redacted secrets, and cache key derivation.

pub mod cache_key;
pub mod credential;
pub mod secret;

pub use cache_key::*;
pub use credential::*;
pub use secret::*;
