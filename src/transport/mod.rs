//! Query Transport
//!
//! Serves the query engine over TCP:
//!
//! - **Mux**: many logical streams over one connection, with keepalive
//!   pings and bounded per-stream buffers
//! - **Frame**: COBS-stuffed bincode messages ending in `0x00`
//! - **Messages**: `QueryRequest` / `QueryResponse`
//! - **Server / Client**: one request and one response per stream
//!
//! A caller that closes or resets its stream before the answer arrives
//! cancels the evaluation; other streams on the session are unaffected.

mod client;
mod error;
pub mod frame;
mod messages;
pub mod mux;
mod server;

pub use client::QueryClient;
pub use error::{TransportError, TransportResult};
pub use frame::{read_message, write_message, MessageDecoder};
pub use messages::{QueryRequest, QueryResponse};
pub use mux::{Role, Session, SessionConfig, Stream};
pub use server::QueryServer;
