use std::fmt;
use std::net::IpAddr;

use lookout_proto::{ClientHello, InboundRequest};

use crate::credentials::PasswordHash;
use crate::ip_mask::IpMask;

pub const DEFAULT_HEADERS_LIMIT: usize = 4096;

/// Immutable security settings of a connector.
#[derive(Clone, Debug)]
pub struct SecurityPolicy {
    password: Option<PasswordHash>,
    ssl_only: bool,
    ip_masks: Vec<IpMask>,
    headers_limit: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            password: None,
            ssl_only: false,
            ip_masks: Vec::new(),
            headers_limit: DEFAULT_HEADERS_LIMIT,
        }
    }
}

impl SecurityPolicy {
    pub fn with_password(mut self, password: PasswordHash) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_ssl_only(mut self, ssl_only: bool) -> Self {
        self.ssl_only = ssl_only;
        self
    }

    pub fn with_ip_masks(mut self, masks: Vec<IpMask>) -> Self {
        self.ip_masks = masks;
        self
    }

    pub fn with_headers_limit(mut self, limit: usize) -> Self {
        self.headers_limit = limit;
        self
    }

    pub fn password(&self) -> Option<&PasswordHash> {
        self.password.as_ref()
    }

    pub fn ssl_only(&self) -> bool {
        self.ssl_only
    }

    pub fn ip_masks(&self) -> &[IpMask] {
        &self.ip_masks
    }

    pub fn headers_limit(&self) -> usize {
        self.headers_limit
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenyReason {
    SslRequired,
    IpNotAllowed { addr: Option<IpAddr> },
    MissingCredentials,
    BadCredentials,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::SslRequired => f.write_str("request is not encrypted"),
            DenyReason::IpNotAllowed { addr: Some(addr) } => {
                write!(f, "address {addr} matches no allowed mask")
            }
            DenyReason::IpNotAllowed { addr: None } => f.write_str("remote address unknown"),
            DenyReason::MissingCredentials => f.write_str("client sent no credentials"),
            DenyReason::BadCredentials => f.write_str("client credentials do not match"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Checks `request` against `policy`: SSL first, then the IP allowlist,
/// then the password credential carried by `hello`.
pub fn authorize(
    request: &(impl InboundRequest + ?Sized),
    hello: Option<&ClientHello>,
    policy: &SecurityPolicy,
) -> Decision {
    let decision = check(request, hello, policy);
    if let Decision::Deny(reason) = &decision {
        tracing::debug!(target: "lookout.gate", %reason, "request denied");
    }
    decision
}

fn check(
    request: &(impl InboundRequest + ?Sized),
    hello: Option<&ClientHello>,
    policy: &SecurityPolicy,
) -> Decision {
    if policy.ssl_only && !request.is_secure() {
        return Decision::Deny(DenyReason::SslRequired);
    }

    if !policy.ip_masks.is_empty() {
        let addr = request.remote_addr();
        let allowed = addr.is_some_and(|addr| policy.ip_masks.iter().any(|m| m.matches(addr)));
        if !allowed {
            return Decision::Deny(DenyReason::IpNotAllowed { addr });
        }
    }

    if let Some(password) = &policy.password {
        let Some(auth) = hello.and_then(|hello| hello.auth.as_ref()) else {
            return Decision::Deny(DenyReason::MissingCredentials);
        };
        if !password.verify_client(auth) {
            return Decision::Deny(DenyReason::BadCredentials);
        }
    }

    Decision::Allow
}
