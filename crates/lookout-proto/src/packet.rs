use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use lookout_dump::{SerializedValue, TruncationReason};
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::trace::TraceCall;
use crate::MAX_EVAL_BYTES;

/// Longest free-text field kept in a size marker.
const MARKER_TEXT_CHARS: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Notice,
    Deprecated,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Drops `base` from the front of the file path when it is a prefix at a
    /// path component boundary.
    pub fn strip_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches(['/', '\\']);
        if base.is_empty() {
            return self;
        }
        if let Some(rest) = self.file.strip_prefix(base) {
            if rest.starts_with(['/', '\\']) {
                self.file = rest.trim_start_matches(['/', '\\']).to_string();
            }
        }
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Splits a dot separated group label such as `"sql.slow"` into tags.
pub fn tags_from_label(label: &str) -> Vec<String> {
    label
        .split('.')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub severity: Severity,
    pub message: SerializedValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionEvent {
    pub class: String,
    pub message: SerializedValue,
    /// Messages of the `source()` chain, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueDump {
    pub value: SerializedValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResult {
    pub job_id: String,
    pub value: SerializedValue,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRequest {
    pub job_id: String,
    pub code: String,
    pub signature: String,
}

impl fmt::Debug for EvalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalRequest")
            .field("job_id", &self.job_id)
            .field("code_len", &self.code.len())
            .field("signature_present", &!self.signature.is_empty())
            .finish()
    }
}

impl EvalRequest {
    /// Decodes the `X-Lookout-Eval` header. The header carries a whole
    /// [`DiagnosticPacket`]; anything but an eval request is rejected.
    pub fn decode(header: &str) -> Result<Self, ProtoError> {
        let header = header.trim();
        if header.len() > MAX_EVAL_BYTES {
            return Err(ProtoError::TooLarge {
                len: header.len(),
                limit: MAX_EVAL_BYTES,
            });
        }
        let bytes = general_purpose::STANDARD.decode(header)?;
        match serde_json::from_slice::<DiagnosticPacket>(&bytes)? {
            DiagnosticPacket::EvalRequest(request) => Ok(request),
            other => Err(ProtoError::UnexpectedPacket {
                expected: "evalRequest",
                found: other.kind(),
            }),
        }
    }

    pub fn encode(&self) -> Result<String, ProtoError> {
        let packet = DiagnosticPacket::EvalRequest(self.clone());
        Ok(general_purpose::STANDARD.encode(serde_json::to_vec(&packet)?))
    }
}

/// One unit of diagnostic output. Packets are delivered in the order they
/// were emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiagnosticPacket {
    ErrorEvent(ErrorEvent),
    ExceptionEvent(ExceptionEvent),
    ValueDump(ValueDump),
    EvalResult(EvalResult),
    EvalRequest(EvalRequest),
}

impl DiagnosticPacket {
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosticPacket::ErrorEvent(_) => "errorEvent",
            DiagnosticPacket::ExceptionEvent(_) => "exceptionEvent",
            DiagnosticPacket::ValueDump(_) => "valueDump",
            DiagnosticPacket::EvalResult(_) => "evalResult",
            DiagnosticPacket::EvalRequest(_) => "evalRequest",
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            DiagnosticPacket::ErrorEvent(event) => event.location.as_ref(),
            DiagnosticPacket::ExceptionEvent(event) => event.location.as_ref(),
            DiagnosticPacket::ValueDump(dump) => dump.location.as_ref(),
            DiagnosticPacket::EvalResult(_) | DiagnosticPacket::EvalRequest(_) => None,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            DiagnosticPacket::ErrorEvent(event) => &event.tags,
            DiagnosticPacket::ExceptionEvent(event) => &event.tags,
            DiagnosticPacket::ValueDump(dump) => &dump.tags,
            DiagnosticPacket::EvalResult(_) | DiagnosticPacket::EvalRequest(_) => &[],
        }
    }

    /// Length of the compact JSON encoding.
    pub fn encoded_len(&self) -> Result<usize, ProtoError> {
        Ok(serde_json::to_vec(self)?.len())
    }

    /// Stand-in for a packet whose `encoded_len` bytes cannot fit a frame.
    ///
    /// The payload becomes a `dumpSize` truncation marker and traces are
    /// dropped. Location and tags survive so the client can still place it.
    pub fn size_marker(&self, encoded_len: usize) -> DiagnosticPacket {
        let marker = SerializedValue::Truncated {
            reason: TruncationReason::DumpSize,
            summary: format!("{} of {encoded_len} bytes", self.kind()),
        };
        match self {
            DiagnosticPacket::ErrorEvent(event) => DiagnosticPacket::ErrorEvent(ErrorEvent {
                severity: event.severity,
                message: marker,
                location: event.location.clone(),
                trace: Vec::new(),
                tags: event.tags.clone(),
            }),
            DiagnosticPacket::ExceptionEvent(event) => {
                DiagnosticPacket::ExceptionEvent(ExceptionEvent {
                    class: clip(&event.class),
                    message: marker,
                    causes: Vec::new(),
                    location: event.location.clone(),
                    trace: Vec::new(),
                    tags: event.tags.clone(),
                })
            }
            DiagnosticPacket::ValueDump(dump) => DiagnosticPacket::ValueDump(ValueDump {
                value: marker,
                location: dump.location.clone(),
                trace: Vec::new(),
                tags: dump.tags.clone(),
            }),
            DiagnosticPacket::EvalResult(result) => DiagnosticPacket::EvalResult(EvalResult {
                job_id: result.job_id.clone(),
                value: marker,
                output: String::new(),
                duration_ms: result.duration_ms,
                failure: result.failure.as_deref().map(clip),
            }),
            DiagnosticPacket::EvalRequest(request) => {
                DiagnosticPacket::EvalRequest(request.clone())
            }
        }
    }
}

fn clip(text: &str) -> String {
    text.chars().take(MARKER_TEXT_CHARS).collect()
}

impl From<ErrorEvent> for DiagnosticPacket {
    fn from(event: ErrorEvent) -> Self {
        DiagnosticPacket::ErrorEvent(event)
    }
}

impl From<ExceptionEvent> for DiagnosticPacket {
    fn from(event: ExceptionEvent) -> Self {
        DiagnosticPacket::ExceptionEvent(event)
    }
}

impl From<ValueDump> for DiagnosticPacket {
    fn from(dump: ValueDump) -> Self {
        DiagnosticPacket::ValueDump(dump)
    }
}

impl From<EvalResult> for DiagnosticPacket {
    fn from(result: EvalResult) -> Self {
        DiagnosticPacket::EvalResult(result)
    }
}

/// Packets held in postponed storage for one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostponedEntry {
    pub packets: Vec<DiagnosticPacket>,
}

impl PostponedEntry {
    pub fn new(packets: Vec<DiagnosticPacket>) -> Self {
        Self { packets }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
