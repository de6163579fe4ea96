pub mod frames;
pub mod regenerate;
pub mod session;
pub mod video;

use std::time::Duration;

/// How often background jobs are polled for progress.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(500);
