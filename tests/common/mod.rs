//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use tower::ServiceExt;

use reply_builder::ResponseWriter;

/// Send one request through a router without a socket.
pub async fn send(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Writer wrapper counting what passes through it.
pub struct CountingWriter {
    inner: Box<dyn ResponseWriter>,
    pub heads: Arc<AtomicUsize>,
    pub writes: Arc<AtomicUsize>,
}

impl CountingWriter {
    pub fn wrap(
        inner: Box<dyn ResponseWriter>,
        heads: Arc<AtomicUsize>,
        writes: Arc<AtomicUsize>,
    ) -> Self {
        Self { inner, heads, writes }
    }
}

#[async_trait]
impl ResponseWriter for CountingWriter {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_head(&mut self, status: StatusCode) {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.inner.write_head(status);
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(chunk).await
    }
}
