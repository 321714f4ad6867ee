//! Plain-text render, also used as the fallback when another render fails.

use std::io::Cursor;

use axum::http::HeaderValue;
use serde_json::Value;

use super::{kind_of, Render, RenderError, RenderResult};

/// Always-available render used by `Reply::finish` after a render error.
pub static FALLBACK: TextRender = TextRender;

/// Renders scalar values as UTF-8 text.
///
/// Strings are written verbatim, `null` as an empty body, numbers and
/// booleans as their JSON text. Arrays and objects are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRender;

impl Render for TextRender {
    fn render(&self, data: &Value) -> RenderResult {
        let text = match data {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(_) | Value::Number(_) => data.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(RenderError::Unsupported {
                    render: self.name(),
                    kind: kind_of(data),
                });
            }
        };
        Ok(Some(Box::new(Cursor::new(text.into_bytes()))))
    }

    fn content_type(&self) -> Option<HeaderValue> {
        Some(HeaderValue::from_static("text/plain; charset=utf-8"))
    }

    fn name(&self) -> &'static str {
        "text"
    }
}
