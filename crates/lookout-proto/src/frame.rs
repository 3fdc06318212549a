use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::packet::DiagnosticPacket;
use crate::PROTOCOL_VERSION;

/// Smallest headers limit that fits an empty frame plus one size marker
/// for an unlocated packet.
pub const MIN_HEADERS_LIMIT: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameStatus {
    Ok,
    /// The connector is switched off; the client should stop expecting data.
    Disabled,
    /// Everything from this response was held back for the next request.
    Postponed,
}

/// Payload of the `X-Lookout` response header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    pub protocol: u32,
    pub status: FrameStatus,
    pub eval_enabled: bool,
    pub ssl_only: bool,
    /// Packets held in storage for the next request of this session.
    pub pending: usize,
    pub packets: Vec<DiagnosticPacket>,
}

impl ResponseFrame {
    pub fn new(status: FrameStatus) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            status,
            eval_enabled: false,
            ssl_only: false,
            pending: 0,
            packets: Vec::new(),
        }
    }

    pub fn with_flags(mut self, eval_enabled: bool, ssl_only: bool) -> Self {
        self.eval_enabled = eval_enabled;
        self.ssl_only = ssl_only;
        self
    }

    pub fn encode(&self) -> Result<String, ProtoError> {
        Ok(general_purpose::STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(header: &str) -> Result<Self, ProtoError> {
        let bytes = general_purpose::STANDARD.decode(header.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Result of fitting packets into one header.
#[derive(Debug)]
pub struct Packed {
    pub frame: ResponseFrame,
    /// Packets that did not fit, in emission order. Never interleaved with
    /// the packets in `frame`: once one packet spills, all later ones do.
    pub overflow: Vec<DiagnosticPacket>,
    /// Packets too large for any frame under this limit, even as a size
    /// marker.
    pub oversized: Vec<DiagnosticPacket>,
    /// How many packets in `frame` and `overflow` are size markers.
    pub shrunk: usize,
}

fn base64_len(json_len: usize) -> usize {
    json_len.div_ceil(3) * 4
}

/// Greedily fills `frame` with `packets` so that its encoded header value
/// stays within `limit` bytes. Packets are never split; one that cannot fit
/// an empty frame is replaced by its [`DiagnosticPacket::size_marker`].
pub fn pack(
    mut frame: ResponseFrame,
    packets: Vec<DiagnosticPacket>,
    limit: usize,
) -> Result<Packed, ProtoError> {
    // Sized with the largest `pending` the frame can end up carrying.
    frame.packets.clear();
    frame.pending = packets.len();
    let base = serde_json::to_vec(&frame)?.len();

    let mut used = base;
    let mut included = Vec::new();
    let mut overflow = Vec::new();
    let mut oversized = Vec::new();
    let mut shrunk = 0;
    for mut packet in packets {
        let mut len = packet.encoded_len()?;
        if base64_len(base + len) > limit {
            let marker = packet.size_marker(len);
            let marker_len = marker.encoded_len()?;
            if base64_len(base + marker_len) > limit {
                oversized.push(packet);
                continue;
            }
            packet = marker;
            len = marker_len;
            shrunk += 1;
        }
        let separator = usize::from(!included.is_empty());
        if overflow.is_empty() && base64_len(used + separator + len) <= limit {
            used += separator + len;
            included.push(packet);
        } else {
            overflow.push(packet);
        }
    }

    frame.pending = overflow.len();
    frame.packets = included;
    Ok(Packed {
        frame,
        overflow,
        oversized,
        shrunk,
    })
}
