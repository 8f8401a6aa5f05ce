// API endpoint handlers

use tokio::time::Duration;

pub mod forward;
pub mod tokens;

/// Request-scoped deadline applied by both handlers, independent of any
/// caller-supplied deadline.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
