use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use lookout_dump::{Dumper, DumperLimits, MAX_LEVEL_LIMIT};
use lookout_gate::{IpMask, PasswordHash, SecurityPolicy, DEFAULT_HEADERS_LIMIT};
use lookout_proto::MIN_HEADERS_LIMIT;
use lookout_storage::{MemoryStorage, PostponeStorage, StorageLimits};

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::eval::{EvalDispatcher, EvalSandbox};

/// Collects connector settings. Settings cannot change once
/// [`ConnectorBuilder::build`] has produced a [`Connector`].
pub struct ConnectorBuilder {
    password: Option<PasswordHash>,
    ip_masks: Vec<String>,
    ssl_only: bool,
    headers_limit: usize,
    sources_base_path: Option<String>,
    server_encoding: Option<String>,
    dumper_limits: DumperLimits,
    detect_callbacks: bool,
    detect_trace_and_source: bool,
    eval: Option<Arc<dyn EvalSandbox>>,
    storage: Option<Arc<dyn PostponeStorage>>,
}

impl Default for ConnectorBuilder {
    fn default() -> Self {
        Self {
            password: None,
            ip_masks: Vec::new(),
            ssl_only: false,
            headers_limit: DEFAULT_HEADERS_LIMIT,
            sources_base_path: None,
            server_encoding: None,
            dumper_limits: DumperLimits::default(),
            detect_callbacks: true,
            detect_trace_and_source: false,
            eval: None,
            storage: None,
        }
    }
}

impl ConnectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the salted hash of `password` is kept.
    pub fn set_password(&mut self, password: &str) -> Result<&mut Self, ConnectorError> {
        self.password = Some(PasswordHash::derive(password)?);
        Ok(self)
    }

    pub fn set_password_hash(&mut self, hash: PasswordHash) -> &mut Self {
        self.password = Some(hash);
        self
    }

    /// Masks such as `192.168.*.*`; validated by [`ConnectorBuilder::build`].
    pub fn set_allowed_ip_masks<I, S>(&mut self, masks: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ip_masks = masks.into_iter().map(Into::into).collect();
        self
    }

    pub fn enable_ssl_only_mode(&mut self) -> &mut Self {
        self.ssl_only = true;
        self
    }

    pub fn set_headers_limit(&mut self, limit: usize) -> &mut Self {
        self.headers_limit = limit;
        self
    }

    pub fn set_sources_base_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.sources_base_path = Some(path.into());
        self
    }

    /// WHATWG label of the encoding used for byte strings, e.g. `cp1251`.
    pub fn set_server_encoding(&mut self, label: impl Into<String>) -> &mut Self {
        self.server_encoding = Some(label.into());
        self
    }

    pub fn set_dumper_limits(&mut self, limits: DumperLimits) -> &mut Self {
        self.dumper_limits = limits;
        self
    }

    pub fn set_detect_callbacks(&mut self, detect: bool) -> &mut Self {
        self.detect_callbacks = detect;
        self
    }

    pub fn set_detect_trace_and_source(&mut self, detect: bool) -> &mut Self {
        self.detect_trace_and_source = detect;
        self
    }

    /// Defaults to an in-memory store with default limits.
    pub fn set_storage(&mut self, storage: Arc<dyn PostponeStorage>) -> &mut Self {
        self.storage = Some(storage);
        self
    }

    /// Enables the evaluation channel. A password must be set first.
    pub fn start_eval_requests_listener(
        &mut self,
        sandbox: Arc<dyn EvalSandbox>,
    ) -> Result<&mut Self, ConnectorError> {
        if self.password.is_none() {
            return Err(ConnectorError::EvalRequiresPassword);
        }
        self.eval = Some(sandbox);
        Ok(self)
    }

    pub fn build(self) -> Result<Connector, ConnectorError> {
        if self.headers_limit < MIN_HEADERS_LIMIT {
            return Err(ConnectorError::HeadersLimitTooSmall {
                value: self.headers_limit,
                min: MIN_HEADERS_LIMIT,
            });
        }

        if self.dumper_limits.level_limit > MAX_LEVEL_LIMIT {
            return Err(ConnectorError::LevelLimitTooLarge {
                value: self.dumper_limits.level_limit,
                max: MAX_LEVEL_LIMIT,
            });
        }

        let encoding = match self.server_encoding.as_deref() {
            Some(label) => encoding_rs::Encoding::for_label(label.trim().as_bytes()).ok_or_else(
                || ConnectorError::UnknownEncoding {
                    label: label.to_owned(),
                },
            )?,
            None => encoding_rs::UTF_8,
        };

        let ip_masks = self
            .ip_masks
            .iter()
            .map(|mask| mask.parse::<IpMask>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut policy = SecurityPolicy::default()
            .with_ssl_only(self.ssl_only)
            .with_ip_masks(ip_masks)
            .with_headers_limit(self.headers_limit);
        if let Some(password) = self.password.clone() {
            policy = policy.with_password(password);
        }

        let eval = match (self.eval, self.password) {
            (Some(sandbox), Some(password)) => Some(EvalDispatcher::new(sandbox, password)),
            (Some(_), None) => return Err(ConnectorError::EvalRequiresPassword),
            (None, _) => None,
        };

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new(StorageLimits::default())));

        let dumper = Dumper::new(self.dumper_limits)
            .with_detect_callbacks(self.detect_callbacks)
            .with_encoding(encoding);

        tracing::debug!(
            target: "lookout.connector",
            ssl_only = policy.ssl_only(),
            ip_masks = policy.ip_masks().len(),
            password = policy.password().is_some(),
            eval = eval.is_some(),
            encoding = encoding.name(),
            "connector built"
        );

        Ok(Connector {
            policy,
            dumper,
            storage,
            eval,
            sources_base_path: self.sources_base_path,
            detect_trace_and_source: self.detect_trace_and_source,
            disabled: AtomicBool::new(false),
        })
    }
}
