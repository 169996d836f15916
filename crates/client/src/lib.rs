#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # execwatch client
//!
//! The read side of execution tracking:
//!
//! - [`RequestContext`]: base URL, tenant and token passed explicitly into
//!   every fetch
//! - [`ContextStore`]: owns the current context across login, tenant switch
//!   and logout
//! - [`StatusFetcher`]: the fetch seam the poller drives
//! - [`HttpStatusFetcher`]: the reqwest implementation
//!
//! Fetchers never retry; retry policy belongs to the poller.

pub mod config;
pub mod context;
pub mod error;
pub mod fetcher;
pub mod http;

pub use config::ClientConfig;
pub use context::{ContextStore, RequestContext};
pub use error::{BoxError, ClientError, FetchError};
pub use fetcher::StatusFetcher;
pub use http::HttpStatusFetcher;
