use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("unknown configuration option `{name}`")]
    UnknownOption { name: String },
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ConfigValidationError>),
}

fn join(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

/// A semantic problem found after the document parsed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("eval_enabled requires a password")]
    EvalRequiresPassword,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("ip_masks[{index}] is not a valid IP mask")]
    InvalidIpMask { index: usize },
    #[error("server_encoding `{label}` is not a known encoding label")]
    UnknownEncoding { label: String },
    #[error("headers_limit {value} is below the minimum of {min}")]
    HeadersLimitTooSmall { value: usize, min: usize },
    #[error("dumper.level_limit {value} is above the maximum of {max}")]
    LevelLimitTooLarge { value: usize, max: usize },
    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },
    #[error("logging.level is not a valid filter directive")]
    InvalidLoggingLevel,
}

/// Redacts quoted scalars from parser diagnostics; they may be secrets.
pub(crate) fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED: OnceLock<Option<Regex>> = OnceLock::new();
    static SINGLE_QUOTED: OnceLock<Option<Regex>> = OnceLock::new();

    let mut out = message.to_owned();
    if let Some(re) = QUOTED.get_or_init(|| Regex::new(r#""(?:\\.|[^"\\])*""#).ok()) {
        out = re.replace_all(&out, r#""<redacted>""#).into_owned();
    }
    if let Some(re) = SINGLE_QUOTED.get_or_init(|| Regex::new(r"'(?:\\.|[^'\\])*'").ok()) {
        out = re.replace_all(&out, "'<redacted>'").into_owned();
    }
    out
}
