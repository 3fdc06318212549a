use std::panic::{catch_unwind, AssertUnwindSafe};

use lookout_connector::{
    Connector, ErrorReport, ErrorSink, ExceptionReport, Handler, HandlerOptions,
};
use lookout_proto::{DiagnosticPacket, Severity, SourceLocation, TraceCall};

use crate::suite::support::client_request;

fn connector() -> Connector {
    let mut builder = Connector::builder();
    builder.set_sources_base_path("/srv/app");
    builder.build().unwrap()
}

#[test]
fn errors_carry_severity_location_and_trace() {
    let connector = connector();
    let mut scope = connector.begin(&client_request("s"));
    let report = ErrorReport::new(Severity::Warning, "slow query")
        .at("/srv/app/src/db.rs", 40)
        .with_trace(vec![TraceCall::new("app::db::run").at("/srv/app/src/db.rs", 40)]);
    Handler::default().on_error(&mut scope, report);

    let [DiagnosticPacket::ErrorEvent(event)] = scope.queued() else {
        panic!("expected one error event");
    };
    assert_eq!(event.severity, Severity::Warning);
    assert_eq!(event.message.as_str(), Some("slow query"));
    assert_eq!(event.location, Some(SourceLocation::new("src/db.rs", 40)));
    assert_eq!(event.trace[0].file.as_deref(), Some("src/db.rs"));
    assert_eq!(event.tags, vec!["warning"]);
}

#[test]
fn repeated_sources_are_reported_once_per_request() {
    let connector = connector();
    let handler = Handler::new(HandlerOptions {
        ignore_repeated_source: true,
        ..HandlerOptions::default()
    });

    let mut scope = connector.begin(&client_request("s"));
    for _ in 0..3 {
        handler.on_error(&mut scope, ErrorReport::new(Severity::Notice, "loop").at("a.rs", 1));
    }
    handler.on_error(&mut scope, ErrorReport::new(Severity::Notice, "other").at("a.rs", 2));
    assert_eq!(scope.queued().len(), 2);

    // A new request starts with a clean slate.
    let mut scope = connector.begin(&client_request("s"));
    handler.on_error(&mut scope, ErrorReport::new(Severity::Notice, "loop").at("a.rs", 1));
    assert_eq!(scope.queued().len(), 1);
}

#[test]
fn error_and_exception_handling_are_independent() {
    let connector = connector();
    let handler = Handler::new(HandlerOptions {
        handle_errors: false,
        ..HandlerOptions::default()
    });

    let mut scope = connector.begin(&client_request("s"));
    handler.on_error(&mut scope, ErrorReport::new(Severity::Error, "ignored"));
    handler.on_exception(&mut scope, ExceptionReport::new("io::Error", "kept"));
    let [DiagnosticPacket::ExceptionEvent(event)] = scope.queued() else {
        panic!("expected only the exception");
    };
    assert_eq!(event.class, "io::Error");

    let handler = Handler::new(HandlerOptions {
        handle_exceptions: false,
        ..HandlerOptions::default()
    });
    let mut scope = connector.begin(&client_request("s"));
    handler.on_exception(&mut scope, ExceptionReport::new("io::Error", "ignored"));
    assert!(scope.queued().is_empty());
}

#[test]
fn exceptions_keep_their_cause_chain() {
    let connector = connector();
    let mut scope = connector.begin(&client_request("s"));
    let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml missing");
    let outer = std::io::Error::other(inner);
    Handler::default().on_exception(
        &mut scope,
        ExceptionReport::from_error(&outer).at("/srv/app/src/main.rs", 9),
    );

    let [DiagnosticPacket::ExceptionEvent(event)] = scope.queued() else {
        panic!("expected an exception event");
    };
    assert_eq!(event.message.as_str(), Some("config.toml missing"));
    assert!(event.class.contains("io"), "{}", event.class);
    assert_eq!(event.location, Some(SourceLocation::new("src/main.rs", 9)));
}

#[test]
fn panics_are_reported_as_exceptions() {
    let connector = connector();
    let mut scope = connector.begin(&client_request("s"));
    let payload = catch_unwind(AssertUnwindSafe(|| panic!("index out of bounds"))).unwrap_err();
    Handler::default().on_panic(&mut scope, payload.as_ref(), None);

    let [DiagnosticPacket::ExceptionEvent(event)] = scope.queued() else {
        panic!("expected an exception event");
    };
    assert_eq!(event.class, "panic");
    assert_eq!(event.message.as_str(), Some("index out of bounds"));
}

#[test]
fn inactive_requests_get_nothing() {
    let connector = connector();
    let mut scope = connector.begin(&lookout_proto::RequestInfo::new());
    Handler::default().on_error(&mut scope, ErrorReport::new(Severity::Fatal, "x"));
    assert!(scope.queued().is_empty());
}
