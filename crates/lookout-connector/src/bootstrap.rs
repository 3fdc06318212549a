use std::sync::Arc;

use lookout_config::{LookoutConfig, StorageBackend};
use lookout_storage::{FileStorage, MemoryStorage, PostponeStorage};

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::eval::EvalSandbox;
use crate::handler::{Handler, HandlerOptions};

/// A connector and handler configured from one [`LookoutConfig`].
#[derive(Debug)]
pub struct Bootstrap {
    pub connector: Arc<Connector>,
    pub handler: Handler,
}

/// Validates `config` and builds the connector it describes.
///
/// `sandbox` is required when `eval_enabled` is set. A config with
/// `enabled = false` still yields a connector, but a disabled one, so that
/// active clients learn the feature is off.
pub fn bootstrap(
    config: &LookoutConfig,
    sandbox: Option<Arc<dyn EvalSandbox>>,
) -> Result<Bootstrap, ConnectorError> {
    config.validate()?;

    let mut builder = Connector::builder();
    if let Some(password) = &config.password {
        builder.set_password(password.expose())?;
    }
    builder
        .set_allowed_ip_masks(config.ip_masks.iter().cloned())
        .set_headers_limit(config.headers_limit)
        .set_dumper_limits(config.dumper.limits())
        .set_detect_callbacks(config.dumper.detect_callbacks)
        .set_detect_trace_and_source(config.detect_trace_and_source)
        .set_storage(open_storage(config)?);
    if config.ssl_only {
        builder.enable_ssl_only_mode();
    }
    if let Some(base) = &config.sources_base_path {
        builder.set_sources_base_path(base.to_string_lossy());
    }
    if let Some(label) = &config.server_encoding {
        builder.set_server_encoding(label.as_str());
    }
    if config.eval_enabled {
        let sandbox = sandbox.ok_or(ConnectorError::EvalSandboxMissing)?;
        builder.start_eval_requests_listener(sandbox)?;
    }

    let connector = builder.build()?;
    if !config.enabled {
        connector.disable();
    }

    let handler = Handler::new(HandlerOptions {
        handle_errors: config.handle_errors,
        handle_exceptions: config.handle_exceptions,
        ignore_repeated_source: config.ignore_repeated_errors,
    });

    Ok(Bootstrap {
        connector: Arc::new(connector),
        handler,
    })
}

fn open_storage(config: &LookoutConfig) -> Result<Arc<dyn PostponeStorage>, ConnectorError> {
    let limits = config.storage.limits();
    Ok(match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new(limits)),
        StorageBackend::File => {
            let path = config.storage.resolved_path();
            tracing::debug!(target: "lookout.connector", path = %path.display(), "using file storage");
            Arc::new(FileStorage::new(path, limits)?)
        }
    })
}
