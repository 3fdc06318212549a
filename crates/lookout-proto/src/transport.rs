use std::net::IpAddr;

use crate::{CLIENT_COOKIE, CLIENT_HEADER, EVAL_HEADER};

/// Read access to the parts of an inbound request the connector inspects.
pub trait InboundRequest {
    /// Header lookup; names compare case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;
    fn cookie(&self, name: &str) -> Option<&str>;
    fn remote_addr(&self) -> Option<IpAddr>;
    /// True when the request arrived over an encrypted transport.
    fn is_secure(&self) -> bool;
}

/// The response side: the connector reads the status and adds one header.
pub trait OutboundResponse {
    fn status(&self) -> u16;
    fn set_header(&mut self, name: &str, value: String);
}

pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Client presence marker: the header wins over the cookie.
pub fn client_marker(request: &(impl InboundRequest + ?Sized)) -> Option<&str> {
    request
        .header(CLIENT_HEADER)
        .or_else(|| request.cookie(CLIENT_COOKIE))
        .filter(|marker| !marker.trim().is_empty())
}

pub fn eval_marker(request: &(impl InboundRequest + ?Sized)) -> Option<&str> {
    request
        .header(EVAL_HEADER)
        .filter(|marker| !marker.trim().is_empty())
}

/// Owned request description for hosts without their own request type, and
/// for tests.
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    remote_addr: Option<IpAddr>,
    secure: bool,
}

impl RequestInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

impl InboundRequest for RequestInfo {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Explicit cookies first, then any `Cookie` request header.
    fn cookie(&self, name: &str) -> Option<&str> {
        if let Some((_, value)) = self.cookies.iter().find(|(key, _)| key == name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, value)| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim_matches('"'))
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    fn is_secure(&self) -> bool {
        self.secure
    }
}

/// Status plus headers set on the way out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl OutboundResponse for ResponseHead {
    fn status(&self) -> u16 {
        self.status
    }

    fn set_header(&mut self, name: &str, value: String) {
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, slot)) => *slot = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }
}
