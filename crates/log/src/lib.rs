#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # execwatch log
//!
//! Logging bootstrap shared by execwatch binaries: a `tracing-subscriber`
//! registry with an `EnvFilter` and a pretty, compact or JSON formatter.
//!
//! ```rust,ignore
//! let _guard = execwatch_log::init()?;          // EXECWATCH_LOG / RUST_LOG
//! let _guard = execwatch_log::init_with(Config::production())?;
//! ```
//!
//! Libraries only emit `tracing` events; installing a subscriber is up to
//! the binary.

pub mod builder;
pub mod config;
pub mod error;

pub use builder::{LoggerBuilder, LoggerGuard, init, init_with};
pub use config::{Config, Format, LOG_ENV, LOG_FORMAT_ENV};
pub use error::{LogError, LogResult};
