use std::sync::Arc;

use lookout_config::{ConfigError, ConfigValidationError, LookoutConfig};
use lookout_connector::{bootstrap, ConnectorError, EvalContext, EvalError, EvalSandbox};
use lookout_dump::Value;
use lookout_proto::{FrameStatus, ResponseHead};

use crate::suite::support::{client_request, dumped_strings, frame_of};

fn sandbox() -> Arc<dyn EvalSandbox> {
    Arc::new(|_: &str, _: &mut EvalContext| -> Result<Value, EvalError> { Ok(Value::Null) })
}

#[test]
fn eval_without_password_is_rejected_by_validation() {
    let config = LookoutConfig::load_from_str("eval_enabled = true").unwrap();
    let err = bootstrap(&config, Some(sandbox())).unwrap_err();
    let ConnectorError::Config(ConfigError::Invalid(errors)) = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(errors, vec![ConfigValidationError::EvalRequiresPassword]);
}

#[test]
fn eval_needs_a_sandbox() {
    let config =
        LookoutConfig::load_from_str("eval_enabled = true\npassword = \"pw\"").unwrap();
    assert!(matches!(
        bootstrap(&config, None),
        Err(ConnectorError::EvalSandboxMissing)
    ));
    let ready = bootstrap(&config, Some(sandbox())).unwrap();
    assert!(ready.connector.eval_enabled());
}

#[test]
fn disabled_config_yields_a_disabled_connector() {
    let config = LookoutConfig::load_from_str("enabled = false").unwrap();
    let ready = bootstrap(&config, None).unwrap();
    assert!(ready.connector.is_disabled());

    let mut scope = ready.connector.begin(&client_request("s"));
    scope.debug("dropped", "");
    let mut response = ResponseHead::new(200);
    scope.finish(&mut response);
    let frame = frame_of(&response);
    assert_eq!(frame.status, FrameStatus::Disabled);
    assert!(frame.packets.is_empty());
}

#[test]
fn file_storage_carries_packets_between_connectors() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!(
        "[storage]\nbackend = \"file\"\npath = {:?}\n",
        dir.path().display().to_string()
    );
    let config = LookoutConfig::load_from_str(&text).unwrap();

    // Two bootstraps stand in for two worker processes sharing the directory.
    let first = bootstrap(&config, None).unwrap();
    let second = bootstrap(&config, None).unwrap();

    let mut scope = first.connector.begin(&client_request("visitor"));
    scope.debug("from worker one", "");
    scope.finish(&mut ResponseHead::new(307));

    let scope = second.connector.begin(&client_request("visitor"));
    let mut response = ResponseHead::new(200);
    scope.finish(&mut response);
    assert_eq!(
        dumped_strings(&frame_of(&response).packets),
        vec!["from worker one"]
    );
}

#[test]
fn handler_options_follow_the_config() {
    let config = LookoutConfig::load_from_str(
        "handle_errors = false\nignore_repeated_errors = true\n",
    )
    .unwrap();
    let options = bootstrap(&config, None).unwrap().handler.options();
    assert!(!options.handle_errors);
    assert!(options.handle_exceptions);
    assert!(options.ignore_repeated_source);
}
