//! Signed per-account client for the MEXC futures private API.

mod client;
mod sign;
mod types;

pub use client::*;
pub use sign::*;
pub use types::*;
