//! Progress fan-out.
//!
//! Workers publish job snapshots; any number of observers subscribe. Producers
//! never block: a subscriber that falls behind the channel capacity is dropped
//! and its subscription ends.

mod reporter;

pub use reporter::{ProgressEvent, ProgressReporter, ProgressSubscription, DEFAULT_CAPACITY};
