//! Logger configuration and presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "EXECWATCH_LOG";
/// Environment variable holding the output format.
pub const LOG_FORMAT_ENV: &str = "EXECWATCH_LOG_FORMAT";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, human oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(LogError::UnknownFormat(s.to_owned())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `EnvFilter` directive, e.g. `info` or `execwatch_poller=debug,warn`.
    pub level: String,
    /// Output format.
    pub format: Format,
    /// Colored output.
    pub ansi: bool,
    /// Include the event target.
    pub target: bool,
    /// Service name recorded on a root span, if any.
    pub service: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: Format::Compact,
            ansi: true,
            target: false,
            service: None,
        }
    }
}

impl Config {
    /// Configuration from `EXECWATCH_LOG` (falling back to `RUST_LOG`) and
    /// `EXECWATCH_LOG_FORMAT`. Unknown formats fall back to compact.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = lookup(LOG_ENV).or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format.parse().unwrap_or_default();
        }
        if lookup("NO_COLOR").is_some_and(|value| !value.is_empty()) {
            config.ansi = false;
        }
        config
    }

    /// Development configuration (pretty, debug level).
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_owned(),
            format: Format::Pretty,
            target: true,
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level, no colors).
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_owned(),
            format: Format::Json,
            ansi: false,
            target: true,
            ..Self::default()
        }
    }

    /// Set the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Record `service` on a root span.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn env_prefers_own_variable() {
        let config = Config::from_lookup(lookup(&[
            ("EXECWATCH_LOG", "execwatch_poller=trace"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(config.level, "execwatch_poller=trace");
    }

    #[test]
    fn env_falls_back_to_rust_log() {
        let config = Config::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, Format::Compact);
    }

    #[test]
    fn env_without_variables_is_default() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn no_color_disables_ansi() {
        let config = Config::from_lookup(lookup(&[("NO_COLOR", "1")]));
        assert!(!config.ansi);
    }

    #[rstest]
    #[case("json", Format::Json)]
    #[case("PRETTY", Format::Pretty)]
    #[case(" compact ", Format::Compact)]
    #[case("logfmt", Format::Compact)]
    fn env_format(#[case] raw: &str, #[case] expected: Format) {
        let config = Config::from_lookup(lookup(&[("EXECWATCH_LOG_FORMAT", raw)]));
        assert_eq!(config.format, expected);
    }

    #[test]
    fn unknown_format_is_an_error_when_parsed_directly() {
        assert_eq!(
            "xml".parse::<Format>(),
            Err(LogError::UnknownFormat("xml".into()))
        );
    }

    #[test]
    fn presets() {
        let dev = Config::development();
        assert_eq!(dev.format, Format::Pretty);
        assert_eq!(dev.level, "debug");

        let prod = Config::production();
        assert_eq!(prod.format, Format::Json);
        assert!(!prod.ansi);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: Config = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config.format, Format::Json);
        assert_eq!(config.level, "info");
    }
}
