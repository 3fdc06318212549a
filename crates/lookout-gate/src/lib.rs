//! Authorization of inbound requests against a [`SecurityPolicy`].
//!
//! [`authorize`] runs three checks in order (SSL, IP allowlist, password) and
//! stops at the first failure. The [`DenyReason`] is for server-side logs
//! only; callers must not reveal it to the client.

mod credentials;
mod ip_mask;
mod policy;

pub use credentials::{constant_time_eq, generate_public_key, PasswordHash};
pub use ip_mask::IpMask;
pub use policy::{authorize, Decision, DenyReason, SecurityPolicy, DEFAULT_HEADERS_LIMIT};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("invalid IP mask {mask:?}")]
    InvalidIpMask { mask: String },

    #[error("password hash must be 64 lowercase hex characters")]
    InvalidPasswordHash,

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("failed to gather randomness: {0}")]
    Random(String),
}
