//! Runtime defaults every reply is built from.

use std::fmt;
use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::schema::ServerConfig;
use crate::render::{Render, RenderRegistry, TextRender};
use crate::reply::Context;

/// Default render, root context and copy size handed to `Reply::new`.
///
/// Cheap to clone; shared by all requests of a server.
#[derive(Clone)]
pub struct ReplyDefaults {
    default_render: Arc<dyn Render>,
    root_context: Context,
    chunk_size: usize,
}

impl ReplyDefaults {
    pub fn new(default_render: Arc<dyn Render>) -> Self {
        Self {
            default_render,
            root_context: Context::background(),
            chunk_size: 8 * 1024,
        }
    }

    /// Resolve `render.default` through `renders`.
    pub fn from_config(
        config: &ServerConfig,
        renders: &RenderRegistry,
    ) -> Result<Self, ConfigError> {
        let render = renders
            .get(&config.render.default)
            .ok_or_else(|| ConfigError::UnknownRender(config.render.default.clone()))?;
        Ok(Self::new(render).with_chunk_size(config.response.chunk_size))
    }

    pub fn with_root_context(mut self, context: Context) -> Self {
        self.root_context = context;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn default_render(&self) -> Arc<dyn Render> {
        self.default_render.clone()
    }

    pub fn root_context(&self) -> &Context {
        &self.root_context
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for ReplyDefaults {
    fn default() -> Self {
        Self::new(Arc::new(TextRender))
    }
}

impl fmt::Debug for ReplyDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyDefaults")
            .field("default_render", &self.default_render.name())
            .field("root_context", &self.root_context)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
