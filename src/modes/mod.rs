//! Ingest-mode drivers: the push-stream mode and the browser-mirror mode,
//! plus the opaque-token registry the mirror ingress authenticates with.

mod mirror;
mod token;
mod websocket;

pub use mirror::*;
pub use token::*;
pub use websocket::*;
