use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::GateError;

/// Allowlist entry such as `192.168.*.*`, `10.2.12*.*` or `fe80:*`.
///
/// Masks and addresses are split into segments on `.` and `:`; a `*` inside a
/// segment matches any run of characters. The lone mask `*` matches every
/// address. Otherwise the segment counts must agree.
#[derive(Clone, PartialEq, Eq)]
pub struct IpMask {
    pattern: String,
    segments: Vec<String>,
}

impl IpMask {
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, addr: IpAddr) -> bool {
        if self.pattern == "*" {
            return true;
        }
        let addr = match addr {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };
        let text = addr.to_string();
        let parts: Vec<&str> = text.split(['.', ':']).collect();
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(&parts)
                .all(|(mask, part)| glob_match(mask, part))
    }
}

impl FromStr for IpMask {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pattern = s.trim().to_ascii_lowercase();
        let valid_chars = pattern
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || matches!(b, b'.' | b':' | b'*'));
        if pattern.is_empty() || !valid_chars {
            return Err(GateError::InvalidIpMask {
                mask: s.to_string(),
            });
        }
        let segments = pattern.split(['.', ':']).map(str::to_string).collect();
        Ok(Self { pattern, segments })
    }
}

impl fmt::Debug for IpMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IpMask({})", self.pattern)
    }
}

impl fmt::Display for IpMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// `*` matches any (possibly empty) run; everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&b| b == b'*')
}
