use std::any::Any;

use lookout_proto::{ErrorEvent, ExceptionEvent, Severity, SourceLocation, TraceCall};

use crate::connector::RequestScope;
use crate::eval::panic_message;

/// A non-fatal problem observed by the host (a failed assertion, a
/// recoverable I/O error, a deprecated call, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorReport {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub trace: Vec<TraceCall>,
}

impl ErrorReport {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
            trace: Vec::new(),
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation::new(file, line));
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceCall>) -> Self {
        self.trace = trace;
        self
    }
}

/// An error value that escaped request handling.
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionReport {
    pub class: String,
    pub message: String,
    /// Messages of the `source()` chain, outermost first.
    pub causes: Vec<String>,
    pub location: Option<SourceLocation>,
    pub trace: Vec<TraceCall>,
}

impl ExceptionReport {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            causes: Vec::new(),
            location: None,
            trace: Vec::new(),
        }
    }

    /// Builds a report from `error`, using its type name as the class.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            class: std::any::type_name::<E>().to_owned(),
            message: error.to_string(),
            causes,
            location: None,
            trace: Vec::new(),
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation::new(file, line));
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceCall>) -> Self {
        self.trace = trace;
        self
    }
}

/// Registration point the host calls when it observes an error. The core
/// does not install any hooks itself.
pub trait ErrorSink {
    fn on_error(&self, scope: &mut RequestScope<'_>, report: ErrorReport);

    fn on_exception(&self, scope: &mut RequestScope<'_>, report: ExceptionReport);

    /// For hosts that isolate request handling with `catch_unwind`.
    fn on_panic(
        &self,
        scope: &mut RequestScope<'_>,
        payload: &(dyn Any + Send),
        location: Option<SourceLocation>,
    ) {
        let mut report = ExceptionReport::new("panic", panic_message(payload));
        report.location = location;
        self.on_exception(scope, report);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerOptions {
    pub handle_errors: bool,
    pub handle_exceptions: bool,
    /// Report an error only once per request for each file and line.
    pub ignore_repeated_source: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            handle_errors: true,
            handle_exceptions: true,
            ignore_repeated_source: false,
        }
    }
}

/// Turns host error reports into packets on the request scope.
#[derive(Clone, Debug, Default)]
pub struct Handler {
    options: HandlerOptions,
}

impl Handler {
    pub fn new(options: HandlerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> HandlerOptions {
        self.options
    }
}

impl ErrorSink for Handler {
    fn on_error(&self, scope: &mut RequestScope<'_>, report: ErrorReport) {
        if !self.options.handle_errors || !scope.is_active() {
            return;
        }
        let connector = scope.connector();
        let location = report
            .location
            .map(|location| connector.locate(&location.file, location.line));
        if self.options.ignore_repeated_source {
            if let Some(location) = &location {
                if !scope.first_report_at(location) {
                    tracing::trace!(target: "lookout.connector", %location, "skipping repeated error");
                    return;
                }
            }
        }
        let message = scope.dump(report.message.as_str());
        scope.emit(ErrorEvent {
            severity: report.severity,
            message,
            location,
            trace: connector.strip_trace(report.trace),
            tags: vec![report.severity.as_str().to_owned()],
        });
    }

    fn on_exception(&self, scope: &mut RequestScope<'_>, report: ExceptionReport) {
        if !self.options.handle_exceptions || !scope.is_active() {
            return;
        }
        let connector = scope.connector();
        let location = report
            .location
            .map(|location| connector.locate(&location.file, location.line));
        let message = scope.dump(report.message.as_str());
        scope.emit(ExceptionEvent {
            class: report.class,
            message,
            causes: report.causes,
            location,
            trace: connector.strip_trace(report.trace),
            tags: Vec::new(),
        });
    }
}
