//! Session-level accounting: repetition events and aggregate statistics.

mod event;
mod stats;

pub use event::RepEvent;
pub use stats::{RangeOfMotion, SessionAggregator, SessionStats};
