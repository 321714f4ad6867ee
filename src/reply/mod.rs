//! Per-request response builder.
//!
//! # Data Flow
//! ```text
//! dispatch (http/server.rs)
//!     → Reply::new(request, writer, defaults)
//!     → handler mutates status / headers / cookies / data / render
//!     → Reply::finish()
//!          fold cookies into Set-Cookie
//!          render data (fallback text on error, status forced to 500)
//!          write_head(status)
//!          copy body → ResponseWriter
//! ```
//!
//! # Design Decisions
//! - Setters never fail; unusable header names or values are logged and skipped
//! - Headers live in the writer, so host-side header changes are visible here
//! - Cookies stay out of the header map until commit
//! - `finish` consumes the reply, so a second commit cannot be expressed
//! - The reply context derives from the configured root context only; the
//!   inbound request's cancellation is not propagated into it

pub mod context;
pub mod fragment;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{
        header::{AsHeaderName, CONTENT_TYPE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderName, HeaderValue, Request, StatusCode,
    },
};
use bytes::BytesMut;
use cookie::Cookie;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::config::ReplyDefaults;
use crate::http::writer::{Detached, ResponseWriter};
use crate::observability::metrics;
use crate::render::{BodyReader, Render, RenderError, FALLBACK};

pub use context::Context;
pub use fragment::{PathFragment, RequestParam};

/// How a commit ended.
#[derive(Debug)]
pub enum Outcome {
    /// Head and full body were written.
    Written { status: StatusCode, bytes: u64 },
    /// Head was written but the body copy failed part way.
    Incomplete {
        status: StatusCode,
        bytes: u64,
        error: io::Error,
    },
    /// Adapter mode: nothing was written by the reply.
    Delegated,
    /// No usable body stream; nothing was written.
    Aborted,
}

impl Outcome {
    /// Status written to the client, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Written { status, .. } | Outcome::Incomplete { status, .. } => Some(*status),
            Outcome::Delegated | Outcome::Aborted => None,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Written { .. } => "written",
            Outcome::Incomplete { .. } => "incomplete",
            Outcome::Delegated => "delegated",
            Outcome::Aborted => "aborted",
        }
    }
}

/// Response state accumulated by a handler and committed once.
pub struct Reply {
    status: StatusCode,
    data: Option<Value>,
    cookies: Vec<Cookie<'static>>,
    render: Arc<dyn Render>,
    request: Request<Body>,
    writer: Box<dyn ResponseWriter>,
    writer_wrapped: bool,
    adapter_mode: bool,
    path_fragment: Option<PathFragment>,
    context: Context,
    chunk_size: usize,
}

impl Reply {
    /// Create the reply for one dispatched request.
    pub fn new(
        request: Request<Body>,
        writer: Box<dyn ResponseWriter>,
        defaults: &ReplyDefaults,
    ) -> Self {
        Self {
            status: StatusCode::OK,
            data: None,
            cookies: Vec::new(),
            render: defaults.default_render(),
            request,
            writer,
            writer_wrapped: false,
            adapter_mode: false,
            path_fragment: None,
            context: defaults.root_context().child(),
            chunk_size: defaults.chunk_size(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Queue a cookie; it becomes a `Set-Cookie` header at commit.
    pub fn add_cookie(&mut self, cookie: Cookie<'static>) -> &mut Self {
        self.cookies.push(cookie);
        self
    }

    /// Cookies queued so far, in insertion order.
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Replace all values of a header.
    pub fn set_header<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        if let Some((name, value)) = header_pair(key, value) {
            self.writer.headers_mut().insert(name, value);
        }
        self
    }

    /// Append a value to a header.
    pub fn add_header<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        if let Some((name, value)) = header_pair(key, value) {
            self.writer.headers_mut().append(name, value);
        }
        self
    }

    /// Remove every value of a header.
    pub fn del_header<K: AsHeaderName>(&mut self, key: K) -> &mut Self {
        self.writer.headers_mut().remove(key);
        self
    }

    /// First value of a header.
    pub fn header<K: AsHeaderName>(&self, key: K) -> Option<&HeaderValue> {
        self.writer.headers().get(key)
    }

    pub fn headers(&self) -> &HeaderMap {
        self.writer.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    /// Set `Location` and the status together.
    ///
    /// If `url` is not a valid header value neither is changed.
    pub fn redirect(&mut self, status: StatusCode, url: &str) -> &mut Self {
        match HeaderValue::try_from(url) {
            Ok(location) => {
                self.writer.headers_mut().insert(LOCATION, location);
                self.status = status;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Ignoring redirect to invalid location");
            }
        }
        self
    }

    /// Set the value to render. Does not touch the active render.
    pub fn with(&mut self, data: impl Into<Value>) -> &mut Self {
        self.data = Some(data.into());
        self
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Override the render for this reply. `None` keeps the current one.
    pub fn render_with(&mut self, render: impl Into<Option<Arc<dyn Render>>>) -> &mut Self {
        if let Some(render) = render.into() {
            self.render = render;
        }
        self
    }

    pub fn active_render(&self) -> &dyn Render {
        self.render.as_ref()
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn writer(&self) -> &dyn ResponseWriter {
        self.writer.as_ref()
    }

    pub fn writer_mut(&mut self) -> &mut dyn ResponseWriter {
        self.writer.as_mut()
    }

    /// Wrap the response writer, e.g. with an encoding layer.
    ///
    /// `wrap` receives the current writer; the writer it returns should
    /// expose the inner writer's headers. Call at most once, before commit.
    pub fn wrap_writer<F>(&mut self, wrap: F) -> &mut Self
    where
        F: FnOnce(Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter>,
    {
        if self.writer_wrapped {
            tracing::warn!("Response writer wrapped more than once");
        }
        let inner = std::mem::replace(&mut self.writer, Box::new(Detached::new()));
        self.writer = wrap(inner);
        self.writer_wrapped = true;
        self
    }

    /// Hand all writing to the handler; `finish` then does nothing.
    pub fn set_adapter_mode(&mut self, adapter: bool) -> &mut Self {
        self.adapter_mode = adapter;
        self
    }

    pub fn is_adapter_mode(&self) -> bool {
        self.adapter_mode
    }

    /// Route parameters, `None` until the first insertion.
    pub fn path_fragment(&self) -> Option<&PathFragment> {
        self.path_fragment.as_ref()
    }

    pub fn add_path_fragment(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.path_fragment
            .get_or_insert_with(PathFragment::new)
            .insert(key.into(), RequestParam::new(value));
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Layer `key → value` over the current context.
    pub fn set_context<T>(&mut self, key: impl Into<String>, value: T) -> &mut Self
    where
        T: std::any::Any + Send + Sync,
    {
        self.context = self.context.with_value(key, value);
        self
    }

    /// Render and write the response.
    ///
    /// Render errors become a 500 with a plain-text description; they are
    /// logged, never returned.
    pub async fn finish(self) -> Outcome {
        let started = Instant::now();
        let outcome = self.commit().await;
        metrics::record_commit(&outcome, started);
        outcome
    }

    async fn commit(mut self) -> Outcome {
        if self.adapter_mode {
            return Outcome::Delegated;
        }

        self.fold_cookies();
        let data = self.data.take().unwrap_or_else(|| Value::String(String::new()));

        let reader = match self.render.render(&data) {
            Ok(Some(reader)) => {
                if let Some(content_type) = self.render.content_type() {
                    self.writer
                        .headers_mut()
                        .entry(CONTENT_TYPE)
                        .or_insert(content_type);
                }
                reader
            }
            Ok(None) => {
                tracing::error!(render = self.render.name(), "Render returned no body");
                return Outcome::Aborted;
            }
            Err(err) => match self.render_fallback(&err) {
                Some(reader) => reader,
                None => return Outcome::Aborted,
            },
        };

        let status = self.status;
        self.writer.write_head(status);

        match copy_body(reader, self.writer.as_mut(), self.chunk_size).await {
            Ok(bytes) => Outcome::Written { status, bytes },
            Err((bytes, error)) => {
                tracing::warn!(
                    status = %status,
                    bytes,
                    error = %error,
                    "Response body copy interrupted"
                );
                Outcome::Incomplete { status, bytes, error }
            }
        }
    }

    fn fold_cookies(&mut self) {
        let headers = self.writer.headers_mut();
        for cookie in &self.cookies {
            match HeaderValue::try_from(cookie.encoded().to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(
                        cookie = %cookie.name(),
                        error = %e,
                        "Dropping unencodable cookie"
                    );
                }
            }
        }
    }

    fn render_fallback(&mut self, err: &RenderError) -> Option<BodyReader> {
        tracing::error!(render = self.render.name(), error = %err, "Render error");
        self.status = StatusCode::INTERNAL_SERVER_ERROR;

        let message = Value::String(format!("render error: {err}"));
        match FALLBACK.render(&message) {
            Ok(Some(reader)) => {
                if let Some(content_type) = FALLBACK.content_type() {
                    self.writer.headers_mut().insert(CONTENT_TYPE, content_type);
                }
                Some(reader)
            }
            Ok(None) => {
                tracing::error!("Fallback render returned no body");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Fallback render failed");
                None
            }
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("data", &self.data)
            .field("headers", self.writer.headers())
            .field("cookies", &self.cookies.len())
            .field("render", &self.render.name())
            .field("adapter_mode", &self.adapter_mode)
            .field("path_fragment", &self.path_fragment)
            .field("context", &self.context)
            .finish()
    }
}

fn header_pair<K, V>(key: K, value: V) -> Option<(HeaderName, HeaderValue)>
where
    K: TryInto<HeaderName>,
    K::Error: fmt::Display,
    V: TryInto<HeaderValue>,
    V::Error: fmt::Display,
{
    let name = match key.try_into() {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid header name");
            return None;
        }
    };
    match value.try_into() {
        Ok(value) => Some((name, value)),
        Err(e) => {
            tracing::warn!(header = %name, error = %e, "Ignoring invalid header value");
            None
        }
    }
}

/// Copy `reader` into `writer`. The reader is released on every return path.
async fn copy_body(
    mut reader: BodyReader,
    writer: &mut dyn ResponseWriter,
    chunk_size: usize,
) -> Result<u64, (u64, io::Error)> {
    let chunk_size = chunk_size.max(1);
    let mut buf = BytesMut::with_capacity(chunk_size);
    let mut written = 0u64;
    loop {
        buf.reserve(chunk_size);
        let n = match reader.read_buf(&mut buf).await {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) => return Err((written, e)),
        };
        if let Err(e) = writer.write(buf.split().freeze()).await {
            return Err((written, e));
        }
        written += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::writer::ChannelWriter;
    use crate::render::{JsonRender, RenderResult, TextRender};
    use axum::response::Response;
    use serde_json::json;

    fn reply_with(defaults: &ReplyDefaults) -> (Reply, crate::http::writer::PendingResponse) {
        let (writer, pending) = ChannelWriter::new(8);
        let request = Request::builder().uri("/items/42").body(Body::empty()).unwrap();
        (Reply::new(request, Box::new(writer), defaults), pending)
    }

    fn reply() -> (Reply, crate::http::writer::PendingResponse) {
        reply_with(&ReplyDefaults::default())
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Records what it was asked to render.
    struct Recording {
        seen: std::sync::Mutex<Vec<Value>>,
    }

    impl Render for Recording {
        fn render(&self, data: &Value) -> RenderResult {
            self.seen.lock().unwrap().push(data.clone());
            TextRender.render(data)
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Yields `abc`, then fails; flags when the reader is dropped.
    struct Failing {
        dropped: Arc<std::sync::atomic::AtomicBool>,
    }

    struct FailingReader {
        sent: bool,
        dropped: Arc<std::sync::atomic::AtomicBool>,
    }

    impl tokio::io::AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(io::Error::other("boom")));
            }
            self.sent = true;
            buf.put_slice(b"abc");
            std::task::Poll::Ready(Ok(()))
        }
    }

    impl Drop for FailingReader {
        fn drop(&mut self) {
            self.dropped.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl Render for Failing {
        fn render(&self, _data: &Value) -> RenderResult {
            Ok(Some(Box::new(FailingReader {
                sent: false,
                dropped: self.dropped.clone(),
            })))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct NoBody;

    impl Render for NoBody {
        fn render(&self, _data: &Value) -> RenderResult {
            Ok(None)
        }

        fn name(&self) -> &'static str {
            "no-body"
        }
    }

    #[test]
    fn test_defaults() {
        let (reply, _pending) = reply();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(reply.data().is_none());
        assert!(reply.headers().is_empty());
        assert_eq!(reply.active_render().name(), "text");
        assert!(!reply.is_adapter_mode());
        assert_eq!(reply.request().uri().path(), "/items/42");
    }

    #[test]
    fn test_header_operations_apply_in_order() {
        let (mut reply, _pending) = reply();
        reply
            .add_header("x-a", "1")
            .add_header("x-a", "2")
            .set_header("x-b", "keep")
            .add_header("x-c", "gone");
        assert_eq!(reply.headers().get_all("x-a").iter().count(), 2);
        assert_eq!(reply.header("x-a").unwrap(), "1");

        reply.set_header("x-a", "3").del_header("x-c");
        let values: Vec<_> = reply.headers().get_all("x-a").iter().collect();
        assert_eq!(values, vec!["3"]);
        assert!(reply.header("x-c").is_none());
        assert_eq!(reply.header("x-b").unwrap(), "keep");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let (mut reply, _pending) = reply();
        reply.set_header("bad header", "v").set_header("x-ok", "line\nbreak");
        assert!(reply.headers().is_empty());
    }

    #[test]
    fn test_cookies_stay_out_of_headers_before_commit() {
        let (mut reply, _pending) = reply();
        reply.add_cookie(Cookie::new("session", "abc"));
        assert!(reply.header(SET_COOKIE).is_none());
        assert!(reply.header(SET_COOKIE).is_none());
        assert_eq!(reply.cookies().len(), 1);
    }

    #[tokio::test]
    async fn test_cookies_fold_in_order() {
        let (mut reply, pending) = reply();
        reply
            .add_cookie(Cookie::new("first", "1"))
            .add_cookie(Cookie::build(("second", "2")).path("/").http_only(true).build());
        let outcome = reply.finish().await;
        assert!(matches!(outcome, Outcome::Written { .. }));

        let response = pending.into_response().await;
        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["first=1", "second=2; HttpOnly; Path=/"]);
    }

    #[test]
    fn test_redirect_sets_both() {
        let (mut reply, _pending) = reply();
        reply.redirect(StatusCode::FOUND, "/x");
        assert_eq!(reply.status(), StatusCode::FOUND);
        assert_eq!(reply.header(LOCATION).unwrap(), "/x");
    }

    #[test]
    fn test_redirect_invalid_url_changes_nothing() {
        let (mut reply, _pending) = reply();
        reply.redirect(StatusCode::FOUND, "/x\r\nInjected: 1");
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(reply.header(LOCATION).is_none());
    }

    #[test]
    fn test_data_and_render_are_independent() {
        let (mut reply, _pending) = reply();
        reply.with("payload");
        reply.render_with(Arc::new(JsonRender::default()) as Arc<dyn Render>);
        assert_eq!(reply.data(), Some(&json!("payload")));

        reply.with(json!({"k": 1}));
        assert_eq!(reply.active_render().name(), "json");
    }

    #[test]
    fn test_render_override_none_is_noop() {
        let (mut reply, _pending) = reply();
        reply.render_with(Arc::new(JsonRender::default()) as Arc<dyn Render>);
        reply.render_with(None::<Arc<dyn Render>>);
        assert_eq!(reply.active_render().name(), "json");
    }

    #[tokio::test]
    async fn test_render_failure_becomes_500() {
        let (mut reply, pending) = reply();
        reply
            .set_status(StatusCode::CREATED)
            .set_header(CONTENT_TYPE, "application/json")
            .with(json!({"not": "text"}));

        let outcome = reply.finish().await;
        assert_eq!(outcome.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(
            body_of(response).await,
            "render error: text render cannot encode an object"
        );
    }

    #[tokio::test]
    async fn test_absent_data_renders_empty_string() {
        let recording = Arc::new(Recording {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let (mut reply, pending) = reply();
        reply.render_with(recording.clone() as Arc<dyn Render>);

        let outcome = reply.finish().await;
        assert!(matches!(outcome, Outcome::Written { bytes: 0, .. }));
        assert_eq!(*recording.seen.lock().unwrap(), vec![json!("")]);
        assert_eq!(body_of(pending.into_response().await).await, "");
    }

    #[tokio::test]
    async fn test_render_without_body_aborts() {
        let (mut reply, pending) = reply();
        reply
            .set_status(StatusCode::ACCEPTED)
            .render_with(Arc::new(NoBody) as Arc<dyn Render>);

        let outcome = reply.finish().await;
        assert!(matches!(outcome, Outcome::Aborted));
        // The writer was never asked for a head; dropping it yields the implicit 200.
        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "");
    }

    #[tokio::test]
    async fn test_content_type_defaults_from_render() {
        let defaults = ReplyDefaults::new(Arc::new(JsonRender::default()));
        let (mut reply, pending) = reply_with(&defaults);
        reply.with(json!({"id": 42}));
        reply.finish().await;

        let response = pending.into_response().await;
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_of(response).await, r#"{"id":42}"#);
    }

    #[tokio::test]
    async fn test_explicit_content_type_wins() {
        let (mut reply, pending) = reply();
        reply.set_header(CONTENT_TYPE, "text/html").with("<p>hi</p>");
        reply.finish().await;

        let response = pending.into_response().await;
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn test_small_chunks_copy_whole_body() {
        let defaults = ReplyDefaults::default().with_chunk_size(3);
        let (mut reply, pending) = reply_with(&defaults);
        reply.with("abcdefghij");

        // Drain concurrently so the bounded body channel never stalls the copy.
        let response = tokio::spawn(pending.into_response());
        let outcome = reply.finish().await;
        assert!(matches!(outcome, Outcome::Written { bytes: 10, .. }));
        assert_eq!(body_of(response.await.unwrap()).await, "abcdefghij");
    }

    #[tokio::test]
    async fn test_read_error_mid_copy_releases_reader() {
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (mut reply, pending) = reply();
        reply.render_with(Arc::new(Failing {
            dropped: dropped.clone(),
        }) as Arc<dyn Render>);

        let outcome = reply.finish().await;
        match outcome {
            Outcome::Incomplete { status, bytes, error } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(bytes, 3);
                assert_eq!(error.kind(), io::ErrorKind::Other);
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));

        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_gone_is_broken_pipe() {
        let (mut reply, pending) = reply();
        reply.with("nobody is listening");
        drop(pending);

        let outcome = reply.finish().await;
        match outcome {
            Outcome::Incomplete { bytes, error, .. } => {
                assert_eq!(bytes, 0);
                assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn test_context_layers() {
        let (mut reply, _pending) = reply();
        reply.set_context("a", 1_i32).set_context("b", 2_i32);
        assert_eq!(reply.context().get::<i32>("a"), Some(&1));
        assert_eq!(reply.context().get::<i32>("b"), Some(&2));
        assert!(reply.request().extensions().is_empty());
    }

    #[test]
    fn test_context_not_shared_between_replies() {
        let defaults = ReplyDefaults::default();
        let (mut first, _p1) = reply_with(&defaults);
        let (second, _p2) = reply_with(&defaults);
        first.set_context("user", "alice");
        assert!(!second.context().contains_key("user"));
        assert!(!defaults.root_context().contains_key("user"));
    }

    #[test]
    fn test_path_fragment_absent_until_added() {
        let (mut reply, _pending) = reply();
        assert!(reply.path_fragment().is_none());

        reply.add_path_fragment("id", "42");
        let fragment = reply.path_fragment().unwrap();
        assert_eq!(fragment.len(), 1);
        assert_eq!(fragment["id"], "42");
    }
}
