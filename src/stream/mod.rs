//! Authenticated push-stream client for the exchange's personal events.
//!
//! One long-lived connection per master account. Frames are decoded, order
//! and stop-order frames are stitched together by the correlator, and the
//! resulting events are emitted over a channel consumed by a single driver
//! task.

mod client;
mod correlate;
mod events;

pub use client::*;
pub use events::*;

pub(crate) use correlate::Correlator;
