use lookout_dump::MAX_LEVEL_LIMIT;
use lookout_gate::IpMask;
use lookout_proto::MIN_HEADERS_LIMIT;

use crate::{ConfigError, ConfigValidationError, LookoutConfig};

impl LookoutConfig {
    /// Every semantic problem in the configuration, in field order.
    pub fn validation_errors(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if let Some(label) = self.server_encoding.as_deref() {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                errors.push(ConfigValidationError::UnknownEncoding {
                    label: label.to_owned(),
                });
            }
        }

        if self.headers_limit < MIN_HEADERS_LIMIT {
            errors.push(ConfigValidationError::HeadersLimitTooSmall {
                value: self.headers_limit,
                min: MIN_HEADERS_LIMIT,
            });
        }

        match &self.password {
            Some(password) if password.expose().is_empty() => {
                errors.push(ConfigValidationError::EmptyPassword);
            }
            None if self.eval_enabled => errors.push(ConfigValidationError::EvalRequiresPassword),
            _ => {}
        }

        for (index, mask) in self.ip_masks.iter().enumerate() {
            if mask.parse::<IpMask>().is_err() {
                errors.push(ConfigValidationError::InvalidIpMask { index });
            }
        }

        if self.dumper.level_limit > MAX_LEVEL_LIMIT {
            errors.push(ConfigValidationError::LevelLimitTooLarge {
                value: self.dumper.level_limit,
                max: MAX_LEVEL_LIMIT,
            });
        }

        let zero_checks = [
            ("dumper.items_count_limit", self.dumper.items_count_limit),
            ("dumper.item_size_limit", self.dumper.item_size_limit),
            ("dumper.dump_size_limit", self.dumper.dump_size_limit),
            ("storage.max_entries", self.storage.max_entries),
        ];
        for (field, value) in zero_checks {
            if value == 0 {
                errors.push(ConfigValidationError::ZeroLimit { field });
            }
        }
        if self.storage.ttl_secs == 0 {
            errors.push(ConfigValidationError::ZeroLimit {
                field: "storage.ttl_secs",
            });
        }

        if !self.logging.level_is_valid() {
            errors.push(ConfigValidationError::InvalidLoggingLevel);
        }

        errors
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(target: "lookout.config", count = errors.len(), "config rejected");
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Resolved `server_encoding`, UTF-8 when unset or unknown.
    pub fn encoding(&self) -> &'static encoding_rs::Encoding {
        self.server_encoding
            .as_deref()
            .and_then(|label| encoding_rs::Encoding::for_label(label.trim().as_bytes()))
            .unwrap_or(encoding_rs::UTF_8)
    }
}
