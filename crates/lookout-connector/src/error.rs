use lookout_config::ConfigError;
use lookout_gate::GateError;
use lookout_storage::StorageError;
use thiserror::Error;

/// Configuration problems found while building a [`crate::Connector`].
///
/// These stop the connector from being created; they never reach a request.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("the evaluation listener requires a password")]
    EvalRequiresPassword,

    #[error("eval_enabled is set but no evaluation sandbox was provided")]
    EvalSandboxMissing,

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("unknown server encoding `{label}`")]
    UnknownEncoding { label: String },

    #[error("headers limit {value} is below the minimum of {min}")]
    HeadersLimitTooSmall { value: usize, min: usize },

    #[error("dump level limit {value} is above the maximum of {max}")]
    LevelLimitTooLarge { value: usize, max: usize },

    #[error("failed to open postponed storage: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
