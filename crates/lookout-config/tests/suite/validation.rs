use lookout_config::{ConfigError, ConfigValidationError, LookoutConfig};

#[test]
fn every_problem_is_reported_at_once() {
    let text = r#"
eval_enabled = true
headers_limit = 10
ip_masks = ["10.0.0.*", "not-an-ip"]
server_encoding = "nope"

[dumper]
items_count_limit = 0

[logging]
level = "lookout=loud"
"#;
    let config = LookoutConfig::load_from_str(text).unwrap();
    let err = config.validate().unwrap_err();
    let ConfigError::Invalid(errors) = err else {
        panic!("expected validation failure");
    };
    assert_eq!(
        errors,
        vec![
            ConfigValidationError::UnknownEncoding {
                label: "nope".into()
            },
            ConfigValidationError::HeadersLimitTooSmall { value: 10, min: 512 },
            ConfigValidationError::EvalRequiresPassword,
            ConfigValidationError::InvalidIpMask { index: 1 },
            ConfigValidationError::ZeroLimit {
                field: "dumper.items_count_limit"
            },
            ConfigValidationError::InvalidLoggingLevel,
        ]
    );
}

#[test]
fn empty_password_is_rejected() {
    let config = LookoutConfig::load_from_str(r#"password = """#).unwrap();
    assert_eq!(
        config.validation_errors(),
        vec![ConfigValidationError::EmptyPassword]
    );
}
