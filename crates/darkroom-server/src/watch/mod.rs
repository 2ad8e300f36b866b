//! Watch lifecycle: registration against the remote drive and renewal
//! before expiry.

pub mod registry;
pub mod renewer;

pub use registry::{WatchError, WatchRegistry};
pub use renewer::{RenewalFailure, RenewalSummary, WatchRenewer};
