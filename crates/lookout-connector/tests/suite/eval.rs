use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lookout_connector::{Connector, ConnectorError, EvalContext, EvalError, EvalSandbox, EvalState};
use lookout_dump::{SerializedValue, Value};
use lookout_gate::PasswordHash;
use lookout_proto::{DiagnosticPacket, EvalRequest, RequestInfo, ResponseHead, EVAL_HEADER};

use crate::suite::support::{authed_request, client_request, frame_of};

struct Calculator {
    runs: Arc<AtomicUsize>,
}

impl EvalSandbox for Calculator {
    fn execute(&self, code: &str, cx: &mut EvalContext) -> Result<Value, EvalError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let (a, b) = code
            .split_once('+')
            .ok_or_else(|| format!("cannot evaluate `{code}`"))?;
        let sum = a.trim().parse::<i64>()? + b.trim().parse::<i64>()?;
        cx.print("computed");
        Ok(Value::Int(sum))
    }
}

fn eval_connector() -> (Connector, PasswordHash, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut builder = Connector::builder();
    builder.set_password("open sesame").unwrap();
    builder
        .start_eval_requests_listener(Arc::new(Calculator { runs: runs.clone() }))
        .unwrap();
    let password = PasswordHash::derive("open sesame").unwrap();
    (builder.build().unwrap(), password, runs)
}

fn with_eval(request: RequestInfo, password: &PasswordHash, job_id: &str, code: &str) -> RequestInfo {
    let eval = EvalRequest {
        job_id: job_id.into(),
        code: code.into(),
        signature: password.sign_eval(code),
    };
    request.with_header(EVAL_HEADER, eval.encode().unwrap())
}

#[test]
fn eval_result_is_delivered_in_the_same_response() {
    let (connector, password, runs) = eval_connector();
    let request = with_eval(authed_request("s", &password), &password, "job-7", "40 + 2");

    let mut scope = connector.begin(&request);
    assert_eq!(scope.eval_state(), EvalState::Idle);
    scope.debug("after eval", "");
    let mut response = ResponseHead::new(200);
    scope.finish(&mut response);

    let frame = frame_of(&response);
    assert!(frame.eval_enabled);
    let DiagnosticPacket::EvalResult(result) = &frame.packets[0] else {
        panic!("eval result should come first: {:?}", frame.packets);
    };
    assert_eq!(result.job_id, "job-7");
    assert_eq!(result.value, SerializedValue::Int { value: 42 });
    assert_eq!(result.output, "computed");
    assert_eq!(result.failure, None);
    assert_eq!(frame.packets.len(), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_code_still_answers_the_job() {
    let (connector, password, _) = eval_connector();
    let request = with_eval(authed_request("s", &password), &password, "job-8", "nonsense");

    let scope = connector.begin(&request);
    let [DiagnosticPacket::EvalResult(result)] = scope.queued() else {
        panic!("expected one eval result");
    };
    assert_eq!(result.job_id, "job-8");
    assert_eq!(result.failure.as_deref(), Some("cannot evaluate `nonsense`"));
}

#[test]
fn unauthenticated_or_unsigned_requests_never_run() {
    let (connector, password, runs) = eval_connector();

    // No client credentials: the client is not active at all.
    let request = with_eval(client_request("s"), &password, "j", "1 + 1");
    assert!(!connector.is_active_client(&request));
    assert!(connector.begin(&request).queued().is_empty());

    // Valid client, signature made with another password.
    let other = PasswordHash::derive("guess").unwrap();
    let request = with_eval(authed_request("s", &password), &other, "j", "1 + 1");
    assert!(connector.begin(&request).queued().is_empty());

    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn eval_listener_without_password_fails_before_any_request() {
    let mut builder = Connector::builder();
    let sandbox = Arc::new(Calculator {
        runs: Arc::new(AtomicUsize::new(0)),
    });
    assert!(matches!(
        builder.start_eval_requests_listener(sandbox),
        Err(ConnectorError::EvalRequiresPassword)
    ));
    assert!(!builder.build().unwrap().eval_enabled());
}
