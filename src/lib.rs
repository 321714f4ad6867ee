//! Per-request response builder with a single atomic commit.
//!
//! Handlers accumulate status, headers, cookies, data and a render strategy on
//! a [`Reply`] in any order; dispatch commits it once with [`Reply::finish`].

pub mod config;
pub mod http;
pub mod observability;
pub mod render;
pub mod reply;

pub use config::{ReplyDefaults, ServerConfig};
pub use http::{HttpServer, ReplyHandler, ResponseWriter};
pub use render::{Render, RenderError, RenderRegistry};
pub use reply::{Context, Outcome, PathFragment, Reply, RequestParam};
