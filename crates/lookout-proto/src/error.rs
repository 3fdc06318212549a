use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("payload is {len} bytes, limit is {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported protocol version {found} (expected {expected})")]
    UnsupportedProtocol { found: u32, expected: u32 },

    #[error("invalid session token")]
    InvalidSession,

    #[error("expected {expected} packet, found {found}")]
    UnexpectedPacket {
        expected: &'static str,
        found: &'static str,
    },
}
