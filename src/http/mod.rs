//! HTTP dispatch and transmission.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, trace, timeout)
//!     → handler.rs (ReplyHandler mutates a Reply)
//!     → Reply::finish
//!     → writer.rs (ChannelWriter → streaming axum Response)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod server;
pub mod writer;

pub use handler::ReplyHandler;
pub use request::{RequestIdExt, UuidRequestId, REQUEST_ID_KEY, X_REQUEST_ID};
pub use server::HttpServer;
pub use writer::{ChannelWriter, PendingResponse, ResponseWriter};
