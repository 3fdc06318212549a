use lookout_dump::SerializedValue;
use lookout_proto::{
    ClientHello, DiagnosticPacket, ErrorEvent, EvalResult, FrameStatus, ResponseFrame, Severity,
    SourceLocation, TraceCall,
};
use serde_json::json;

#[test]
fn client_hello_json_shape() {
    let hello = ClientHello::new("abc").with_auth("nonce-1", "f00d");
    assert_eq!(
        serde_json::to_value(&hello).unwrap(),
        json!({
            "protocol": 1,
            "session": "abc",
            "auth": {"publicKey": "nonce-1", "token": "f00d"}
        })
    );
}

#[test]
fn error_event_json_shape() {
    let packet: DiagnosticPacket = ErrorEvent {
        severity: Severity::Warning,
        message: SerializedValue::string("disk almost full"),
        location: Some(SourceLocation::new("src/disk.rs", 12)),
        trace: vec![TraceCall::new("app::disk::check").at("src/disk.rs", 12)],
        tags: vec!["disk".into()],
    }
    .into();
    assert_eq!(
        serde_json::to_value(&packet).unwrap(),
        json!({
            "type": "errorEvent",
            "severity": "warning",
            "message": {"type": "string", "value": "disk almost full"},
            "location": {"file": "src/disk.rs", "line": 12},
            "trace": [{"call": "app::disk::check", "file": "src/disk.rs", "line": 12}],
            "tags": ["disk"]
        })
    );
}

#[test]
fn eval_result_frame_json_shape() {
    let mut frame = ResponseFrame::new(FrameStatus::Ok).with_flags(true, false);
    frame.packets.push(
        EvalResult {
            job_id: "7".into(),
            value: SerializedValue::Int { value: 2 },
            output: String::new(),
            duration_ms: 3,
            failure: None,
        }
        .into(),
    );
    assert_eq!(
        serde_json::to_value(&frame).unwrap(),
        json!({
            "protocol": 1,
            "status": "ok",
            "evalEnabled": true,
            "sslOnly": false,
            "pending": 0,
            "packets": [{
                "type": "evalResult",
                "jobId": "7",
                "value": {"type": "int", "value": 2},
                "durationMs": 3
            }]
        })
    );
}
