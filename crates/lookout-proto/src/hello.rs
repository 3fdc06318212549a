use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::{MAX_MARKER_BYTES, PROTOCOL_VERSION};

pub const MAX_SESSION_LEN: usize = 128;

/// Session tokens double as postponed-storage keys, so they are restricted to
/// `[A-Za-z0-9_.-]{1,128}`.
pub fn is_valid_session_token(token: &str) -> bool {
    (1..=MAX_SESSION_LEN).contains(&token.len())
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Client credentials: a nonce chosen by the client and the token derived
/// from it and the password hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAuth {
    pub public_key: String,
    pub token: String,
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuth")
            .field("public_key", &self.public_key)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Presence marker sent by an inspection client on every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    pub protocol: u32,
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ClientAuth>,
}

impl ClientHello {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            session: session.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, public_key: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth = Some(ClientAuth {
            public_key: public_key.into(),
            token: token.into(),
        });
        self
    }

    /// Decodes and validates a marker taken from a header or cookie.
    pub fn decode(marker: &str) -> Result<Self, ProtoError> {
        let marker = marker.trim();
        if marker.len() > MAX_MARKER_BYTES {
            return Err(ProtoError::TooLarge {
                len: marker.len(),
                limit: MAX_MARKER_BYTES,
            });
        }
        let bytes = general_purpose::STANDARD.decode(marker)?;
        let hello: ClientHello = serde_json::from_slice(&bytes)?;
        if hello.protocol != PROTOCOL_VERSION {
            return Err(ProtoError::UnsupportedProtocol {
                found: hello.protocol,
                expected: PROTOCOL_VERSION,
            });
        }
        if !is_valid_session_token(&hello.session) {
            return Err(ProtoError::InvalidSession);
        }
        Ok(hello)
    }

    pub fn encode(&self) -> Result<String, ProtoError> {
        Ok(general_purpose::STANDARD.encode(serde_json::to_vec(self)?))
    }
}
