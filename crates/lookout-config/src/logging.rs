use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Once};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::writer::TestWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives: a bare level such as `debug`, or per-target
    /// rules such as `lookout.gate=debug,info`. Blank means `info`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// One JSON object per event instead of the human format.
    #[serde(default)]
    pub json: bool,

    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Also append events to this file. An unopenable file is reported once
    /// and skipped.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub file: Option<PathBuf>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

static TRACING_INIT: Once = Once::new();

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn directives(&self) -> &str {
        match self.level.trim() {
            "" => "info",
            level => level,
        }
    }

    pub(crate) fn level_is_valid(&self) -> bool {
        EnvFilter::try_new(self.directives()).is_ok()
    }

    /// The configured directives with `RUST_LOG` appended, so the
    /// environment wins for targets both mention. An unparsable `RUST_LOG`
    /// is ignored.
    pub fn env_filter(&self) -> EnvFilter {
        let configured = self.directives();
        let from_env = std::env::var("RUST_LOG").unwrap_or_default();
        let from_env = from_env.trim();

        if !from_env.is_empty() {
            if let Ok(filter) = EnvFilter::try_new(format!("{configured},{from_env}")) {
                return filter;
            }
        }
        EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn sink<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        if self.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

/// Installs the global subscriber: one fmt layer per enabled sink behind a
/// shared [`EnvFilter`]. Only the first call does anything, and a subscriber
/// the host already installed is left in place.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let mut sinks: Vec<BoxedLayer> = Vec::new();
        if config.stderr {
            // Debug builds route through libtest's capture.
            sinks.push(if cfg!(debug_assertions) {
                config.sink(TestWriter::with_stderr())
            } else {
                config.sink(io::stderr)
            });
        }

        let mut unopened = None;
        if let Some(path) = &config.file {
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => sinks.push(config.sink(Arc::new(file))),
                Err(err) => unopened = Some((path, err)),
            }
        }

        let subscriber = tracing_subscriber::registry()
            .with(sinks)
            .with(config.env_filter());
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return;
        }
        if let Some((path, err)) = unopened {
            tracing::warn!(
                target: "lookout.config",
                path = %path.display(),
                error = %err,
                "log file unavailable; logging to the remaining sinks"
            );
        }
    });
}
