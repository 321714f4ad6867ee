//! Render strategies.
//!
//! # Data Flow
//! ```text
//! Reply::with(data)
//!     → active Render (default from ReplyDefaults, or Reply::render_with)
//!     → BodyReader (AsyncRead)
//!     → copied into the ResponseWriter by Reply::finish
//!
//! On render error:
//!     → status forced to 500
//!     → FALLBACK (text.rs) renders "render error: ..."
//! ```
//!
//! # Design Decisions
//! - A render is called at most once per commit and never sees headers
//! - `Ok(None)` is a broken render, not a normal failure
//! - The fallback has no dependency on any other render

pub mod json;
pub mod text;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderValue;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncRead;

pub use json::JsonRender;
pub use text::{TextRender, FALLBACK};

/// Readable, closable byte stream produced by a render. Dropping it releases it.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// Errors a render can report for a given value.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The render cannot encode this kind of value.
    #[error("{render} render cannot encode {kind}")]
    Unsupported { render: &'static str, kind: &'static str },

    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Any other failure reported by a third-party render.
    #[error("{0}")]
    Other(String),
}

/// Result of rendering one value.
///
/// `Ok(None)` means the render claimed success without producing a stream.
pub type RenderResult = Result<Option<BodyReader>, RenderError>;

/// Turns response data into a byte stream.
pub trait Render: Send + Sync {
    /// Render `data` into a readable stream.
    fn render(&self, data: &Value) -> RenderResult;

    /// Content type advertised for successfully rendered bodies.
    fn content_type(&self) -> Option<HeaderValue> {
        None
    }

    /// Short name used in logs and the registry.
    fn name(&self) -> &'static str;
}

/// Human-readable name of a JSON value's kind.
pub(crate) fn kind_of(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Renders addressable by name, used to resolve `render.default` from config.
#[derive(Clone, Default)]
pub struct RenderRegistry {
    renders: HashMap<String, Arc<dyn Render>>,
}

impl RenderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `text` and `json` renders.
    pub fn with_defaults(pretty_json: bool) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextRender));
        registry.register(Arc::new(JsonRender::new(pretty_json)));
        registry
    }

    /// Register a render under its own name, replacing any previous one.
    pub fn register(&mut self, render: Arc<dyn Render>) {
        self.renders.insert(render.name().to_string(), render);
    }

    /// Look up a render by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Render>> {
        self.renders.get(name).cloned()
    }

    /// Names of all registered renders, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.renders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for RenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRegistry")
            .field("renders", &self.names())
            .finish()
    }
}
