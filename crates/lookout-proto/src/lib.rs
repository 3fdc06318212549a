//! Wire types shared by the connector and inspection clients.
//!
//! Everything that crosses the transport is JSON wrapped in standard base64:
//! - the client presence marker ([`ClientHello`]) in the `X-Lookout-Client`
//!   header or the `lookout-client` cookie,
//! - an evaluation request in the `X-Lookout-Eval` header,
//! - the [`ResponseFrame`] in the `X-Lookout` response header.

mod error;
mod frame;
mod hello;
mod packet;
mod trace;
mod transport;

pub use error::ProtoError;
pub use frame::{pack, FrameStatus, Packed, ResponseFrame, MIN_HEADERS_LIMIT};
pub use hello::{is_valid_session_token, ClientAuth, ClientHello, MAX_SESSION_LEN};
pub use packet::{
    tags_from_label, DiagnosticPacket, ErrorEvent, EvalRequest, EvalResult, ExceptionEvent,
    PostponedEntry, Severity, SourceLocation, ValueDump,
};
pub use trace::{parse_backtrace, TraceCall};
pub use transport::{
    client_marker, eval_marker, is_redirect, InboundRequest, OutboundResponse, RequestInfo,
    ResponseHead,
};

/// Version of the JSON shapes in this crate. Clients announce it in their
/// hello; frames echo it.
pub const PROTOCOL_VERSION: u32 = 1;

pub const CLIENT_HEADER: &str = "X-Lookout-Client";
pub const CLIENT_COOKIE: &str = "lookout-client";
pub const EVAL_HEADER: &str = "X-Lookout-Eval";
pub const RESPONSE_HEADER: &str = "X-Lookout";

/// Largest inbound marker accepted before decoding (base64 text, in bytes).
pub const MAX_MARKER_BYTES: usize = 16 * 1024;

/// Largest evaluation request accepted before decoding.
pub const MAX_EVAL_BYTES: usize = 256 * 1024;
