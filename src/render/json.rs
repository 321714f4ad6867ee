//! JSON render.

use std::io::Cursor;

use axum::http::HeaderValue;
use serde_json::Value;

use super::{Render, RenderResult};

/// Encodes any value as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRender {
    pretty: bool,
}

impl JsonRender {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Render for JsonRender {
    fn render(&self, data: &Value) -> RenderResult {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(data)?
        } else {
            serde_json::to_vec(data)?
        };
        Ok(Some(Box::new(Cursor::new(bytes))))
    }

    fn content_type(&self) -> Option<HeaderValue> {
        Some(HeaderValue::from_static("application/json"))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
