//! Subscriber construction.

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Builds and installs the global subscriber.
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps logging state alive; drop it at the end of `main`.
#[derive(Debug)]
pub struct LoggerGuard {
    _root_span: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    /// Builder from a configuration.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the filter directive without installing anything.
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.config.level)))
    }

    /// Build and install the subscriber. Output goes to stderr.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        let registry = Registry::default().with(filter);
        let ansi = self.config.ansi;
        let target = self.config.target;

        let installed = match self.config.format {
            Format::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_ansi(ansi)
                        .with_target(target)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            Format::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_ansi(ansi)
                        .with_target(target)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            Format::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(target)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };
        installed.map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        let root_span = self
            .config
            .service
            .as_deref()
            .map(|service| tracing::info_span!("app", service).entered());
        Ok(LoggerGuard {
            _root_span: root_span,
        })
    }
}

/// Install a subscriber configured from the environment.
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::from_env())
}

/// Install a subscriber from `config`.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_filter_before_installing() {
        let builder = LoggerBuilder::from_config(Config::default().with_level("execwatch=loudest"));
        assert!(matches!(builder.build(), Err(LogError::Filter(_))));
    }

    #[test]
    fn accepts_directive_lists() {
        let builder = LoggerBuilder::from_config(
            Config::default().with_level("warn,execwatch_poller=debug"),
        );
        assert!(builder.filter().is_ok());
    }

    #[test]
    fn second_install_fails() {
        let first = init_with(Config::default().with_format(Format::Json));
        let second = init_with(Config::default());
        assert!(first.is_ok());
        assert!(matches!(second, Err(LogError::AlreadyInitialized(_))));
    }
}
