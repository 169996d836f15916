#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # execwatch status
//!
//! The data model shared by every execwatch crate:
//!
//! - [`ExecutionStatus`]: the closed set of remote job states, plus a
//!   catch-all for values the server may add later
//! - [`ExecutionRecord`]: one status snapshot with its opaque payload
//! - [`classify`]: total mapping from a status to a [`StatusDescriptor`]
//!
//! Nothing in here performs I/O; the fetcher lives in `execwatch-client` and
//! the scheduling logic in `execwatch-poller`.

pub mod descriptor;
pub mod record;
pub mod status;

pub use descriptor::{Category, StatusDescriptor, classify, classify_str};
pub use record::{ExecutionRecord, any_list_active};
pub use status::ExecutionStatus;
