use std::backtrace::Backtrace;
use std::collections::HashSet;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lookout_dump::{Dumper, Introspect, SerializedValue, Value, ValueArena};
use lookout_gate::{authorize, SecurityPolicy};
use lookout_proto::{
    client_marker, is_redirect, pack, parse_backtrace, tags_from_label, ClientHello,
    DiagnosticPacket, FrameStatus, InboundRequest, OutboundResponse, PostponedEntry,
    ResponseFrame, SourceLocation, TraceCall, ValueDump, RESPONSE_HEADER,
};
use lookout_storage::PostponeStorage;

use crate::builder::ConnectorBuilder;
use crate::eval::{EvalDispatcher, EvalJob, EvalState};

/// Process-wide connector state. Build it once, share it behind an `Arc`
/// and call [`Connector::begin`] for every inbound request.
pub struct Connector {
    pub(crate) policy: SecurityPolicy,
    pub(crate) dumper: Dumper,
    pub(crate) storage: Arc<dyn PostponeStorage>,
    pub(crate) eval: Option<EvalDispatcher>,
    pub(crate) sources_base_path: Option<String>,
    pub(crate) detect_trace_and_source: bool,
    pub(crate) disabled: AtomicBool,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("policy", &self.policy)
            .field("dumper", &self.dumper)
            .field("eval_enabled", &self.eval.is_some())
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}

impl Connector {
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::new()
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn dumper(&self) -> &Dumper {
        &self.dumper
    }

    pub fn eval_enabled(&self) -> bool {
        self.eval.is_some()
    }

    /// True when the request carries a valid client marker and passes the
    /// security checks. Has no side effects.
    pub fn is_active_client(&self, request: &(impl InboundRequest + ?Sized)) -> bool {
        self.client(request).is_some()
    }

    /// Makes the connector inert for the rest of the process. Active clients
    /// are told so through a `disabled` frame.
    pub fn disable(&self) {
        if !self.disabled.swap(true, Ordering::SeqCst) {
            tracing::info!(target: "lookout.connector", "connector disabled");
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// Starts handling one request. When an evaluation request is present
    /// and allowed, it runs here and its result becomes the first packet.
    pub fn begin(&self, request: &(impl InboundRequest + ?Sized)) -> RequestScope<'_> {
        let session = self.client(request).map(|hello| hello.session);
        let mut scope = RequestScope {
            connector: self,
            session,
            queue: Vec::new(),
            reported: HashSet::new(),
            eval_state: EvalState::Idle,
        };

        if let (Some(dispatcher), Some(session)) = (&self.eval, scope.session.clone()) {
            if !self.is_disabled() {
                if let Some(job) = dispatcher.accept(request, &session) {
                    scope.run_eval(dispatcher, job);
                }
            }
        }
        scope
    }

    fn client(&self, request: &(impl InboundRequest + ?Sized)) -> Option<ClientHello> {
        let marker = client_marker(request)?;
        let hello = match ClientHello::decode(marker) {
            Ok(hello) => hello,
            Err(err) => {
                tracing::debug!(target: "lookout.connector", error = %err, "ignoring malformed client marker");
                return None;
            }
        };
        authorize(request, Some(&hello), &self.policy)
            .is_allowed()
            .then_some(hello)
    }

    pub(crate) fn locate(&self, file: &str, line: u32) -> SourceLocation {
        let location = SourceLocation::new(file, line);
        match &self.sources_base_path {
            Some(base) => location.strip_base(base),
            None => location,
        }
    }

    pub(crate) fn strip_trace(&self, trace: Vec<TraceCall>) -> Vec<TraceCall> {
        trace
            .into_iter()
            .map(|mut call| {
                if let Some(file) = call.file.take() {
                    call.file = Some(self.locate(&file, call.line.unwrap_or(0)).file);
                }
                call
            })
            .collect()
    }

    pub(crate) fn capture_trace(&self) -> Vec<TraceCall> {
        self.strip_trace(parse_backtrace(&Backtrace::force_capture().to_string()))
    }

    fn frame(&self, status: FrameStatus) -> ResponseFrame {
        ResponseFrame::new(status).with_flags(self.eval.is_some(), self.policy.ssl_only())
    }

    fn take_postponed(&self, session: &str) -> Vec<DiagnosticPacket> {
        let bytes = match self.storage.take_and_clear(session) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(target: "lookout.connector", error = %err, "postponed storage unavailable; pending packets lost");
                return Vec::new();
            }
        };
        match PostponedEntry::from_bytes(&bytes) {
            Ok(entry) => entry.packets,
            Err(err) => {
                tracing::warn!(target: "lookout.connector", error = %err, "discarding unreadable postponed entry");
                Vec::new()
            }
        }
    }

    /// Stores `packets` for the next request of `session`. Returns how many
    /// were stored; on failure they are dropped.
    fn postpone(&self, session: &str, packets: Vec<DiagnosticPacket>) -> usize {
        let count = packets.len();
        let stored = PostponedEntry::new(packets)
            .to_bytes()
            .map_err(|err| err.to_string())
            .and_then(|bytes| {
                self.storage
                    .put(session, &bytes)
                    .map_err(|err| err.to_string())
            });
        match stored {
            Ok(()) => {
                tracing::debug!(target: "lookout.connector", count, "packets postponed");
                count
            }
            Err(error) => {
                tracing::warn!(target: "lookout.connector", %error, count, "failed to postpone packets; dropping them");
                0
            }
        }
    }
}

/// Per-request state: the active client session, queued packets and the
/// evaluation job, if any.
pub struct RequestScope<'c> {
    connector: &'c Connector,
    session: Option<String>,
    queue: Vec<DiagnosticPacket>,
    reported: HashSet<SourceLocation>,
    eval_state: EvalState,
}

impl std::fmt::Debug for RequestScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("session", &self.session)
            .field("queued", &self.queue.len())
            .field("eval_state", &self.eval_state)
            .finish_non_exhaustive()
    }
}

impl<'c> RequestScope<'c> {
    pub fn connector(&self) -> &'c Connector {
        self.connector
    }

    /// Session token of the active client, if the request has one.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Whether emitted packets will be delivered.
    pub fn is_active(&self) -> bool {
        self.session.is_some() && !self.connector.is_disabled()
    }

    pub fn eval_state(&self) -> EvalState {
        self.eval_state
    }

    pub fn queued(&self) -> &[DiagnosticPacket] {
        &self.queue
    }

    /// Queues a packet. A no-op when no client is active.
    pub fn emit(&mut self, packet: impl Into<DiagnosticPacket>) {
        if !self.is_active() {
            return;
        }
        self.queue.push(packet.into());
    }

    pub fn dump<T: Introspect + ?Sized>(&self, value: &T) -> SerializedValue {
        self.connector.dumper.dump_value(value)
    }

    /// Dumps `value` and queues it as a [`ValueDump`] tagged by the
    /// dot-separated `label`.
    #[track_caller]
    pub fn debug<T: Introspect + ?Sized>(&mut self, value: &T, label: &str) {
        if !self.is_active() {
            return;
        }
        let dumped = self.dump(value);
        self.push_dump(dumped, label, Location::caller());
    }

    /// Like [`RequestScope::debug`] for values already described in an
    /// arena, which is how shared and cyclic structures are dumped.
    #[track_caller]
    pub fn debug_in(&mut self, arena: &ValueArena, value: &Value, label: &str) {
        if !self.is_active() {
            return;
        }
        let dumped = self.connector.dumper.dump(arena, value);
        self.push_dump(dumped, label, Location::caller());
    }

    fn push_dump(&mut self, value: SerializedValue, label: &str, caller: &Location<'_>) {
        let (location, trace) = if self.connector.detect_trace_and_source {
            (
                Some(self.connector.locate(caller.file(), caller.line())),
                self.connector.capture_trace(),
            )
        } else {
            (None, Vec::new())
        };
        self.emit(ValueDump {
            value,
            location,
            trace,
            tags: tags_from_label(label),
        });
    }

    /// Records `location` as reported; false when it already was.
    pub(crate) fn first_report_at(&mut self, location: &SourceLocation) -> bool {
        self.reported.insert(location.clone())
    }

    fn run_eval(&mut self, dispatcher: &EvalDispatcher, mut job: EvalJob) {
        self.eval_state = job.state();
        let result = dispatcher.execute(&mut job, &self.connector.dumper);
        self.eval_state = job.state();
        self.emit(result);
        self.eval_state = EvalState::Idle;
    }

    /// Writes queued packets into `response`, after any packets postponed by
    /// an earlier request of the same session.
    ///
    /// Redirects postpone everything; otherwise packets that do not fit the
    /// headers limit are stored for the next request. Nothing here can fail
    /// the response: storage problems drop packets and log a warning.
    pub fn finish(self, response: &mut (impl OutboundResponse + ?Sized)) {
        let Some(session) = self.session else {
            return;
        };
        let connector = self.connector;

        if connector.is_disabled() {
            write_frame(response, &connector.frame(FrameStatus::Disabled));
            return;
        }

        let mut packets = connector.take_postponed(&session);
        packets.extend(self.queue);

        if is_redirect(response.status()) {
            let mut frame = connector.frame(FrameStatus::Postponed);
            if !packets.is_empty() {
                frame.pending = connector.postpone(&session, packets);
            }
            write_frame(response, &frame);
            return;
        }

        let packed = match pack(
            connector.frame(FrameStatus::Ok),
            packets,
            connector.policy.headers_limit(),
        ) {
            Ok(packed) => packed,
            Err(err) => {
                tracing::warn!(target: "lookout.connector", error = %err, "failed to frame packets; dropping them");
                return;
            }
        };

        if packed.shrunk > 0 {
            tracing::debug!(
                target: "lookout.connector",
                count = packed.shrunk,
                limit = connector.policy.headers_limit(),
                "replaced packets larger than the headers limit with size markers"
            );
        }
        if !packed.oversized.is_empty() {
            tracing::warn!(
                target: "lookout.connector",
                count = packed.oversized.len(),
                limit = connector.policy.headers_limit(),
                "dropping packets whose size marker exceeds the headers limit"
            );
        }

        let mut frame = packed.frame;
        if !packed.overflow.is_empty() {
            frame.pending = connector.postpone(&session, packed.overflow);
        }
        write_frame(response, &frame);
    }
}

fn write_frame(response: &mut (impl OutboundResponse + ?Sized), frame: &ResponseFrame) {
    match frame.encode() {
        Ok(header) => response.set_header(RESPONSE_HEADER, header),
        Err(err) => {
            tracing::warn!(target: "lookout.connector", error = %err, "failed to encode response frame");
        }
    }
}
