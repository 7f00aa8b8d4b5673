//! Utility modules.

pub mod duration;
pub mod timeout;

pub use duration::parse_secs;
pub use timeout::{Deadline, TimeoutExt};
