//! Outbound transmission channel.
//!
//! # Responsibilities
//! - Own the response header map (the reply mutates it in place)
//! - Send the status line exactly once
//! - Carry body chunks to hyper as they are written
//!
//! # Design Decisions
//! - Headers are frozen when the head is sent
//! - A body write before `write_head` implies 200
//! - The body channel is bounded; a dropped client surfaces as `BrokenPipe`

use std::io;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::stream;
use tokio::sync::{mpsc, oneshot};

/// Default number of body chunks buffered between the reply and hyper.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Where a committed reply writes its head and body.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Headers that will be sent with the head.
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the status line and current headers. Later calls are ignored.
    fn write_head(&mut self, status: StatusCode);

    /// Write one body chunk.
    async fn write(&mut self, chunk: Bytes) -> io::Result<()>;
}

/// Status line and headers as sent to the client.
struct Head {
    status: StatusCode,
    headers: HeaderMap,
}

/// Writer feeding an axum [`Response`] through channels.
pub struct ChannelWriter {
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelWriter {
    /// Create a writer and the response it feeds.
    pub fn new(capacity: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        let writer = Self {
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx,
        };
        (writer, PendingResponse { head_rx, body_rx })
    }

    /// Whether the head has been sent.
    pub fn head_written(&self) -> bool {
        self.head_tx.is_none()
    }

    fn send_head(&mut self, status: StatusCode) {
        if let Some(tx) = self.head_tx.take() {
            let headers = self.headers.clone();
            // Receiver gone means the request was dropped; the body write will report it.
            let _ = tx.send(Head { status, headers });
        }
    }
}

#[async_trait]
impl ResponseWriter for ChannelWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        if self.head_written() {
            tracing::warn!(status = %status, "Superfluous write_head ignored");
            return;
        }
        self.send_head(status);
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        if !self.head_written() {
            self.send_head(StatusCode::OK);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.body_tx
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        if std::thread::panicking() {
            // Leave the head unsent so the pending response turns into a 500.
            self.head_tx.take();
            return;
        }
        if !self.head_written() {
            self.send_head(StatusCode::OK);
        }
    }
}

/// The axum response a [`ChannelWriter`] is producing.
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body_rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl PendingResponse {
    /// Wait for the head, then return a response streaming the body.
    pub async fn into_response(self) -> Response {
        let Head { status, headers } = match self.head_rx.await {
            Ok(head) => head,
            Err(_) => {
                tracing::error!("Response writer dropped without a head");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let body = stream::unfold(self.body_rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Stand-in held by a reply while its writer is being wrapped.
pub(crate) struct Detached {
    headers: HeaderMap,
}

impl Detached {
    pub(crate) fn new() -> Self {
        Self { headers: HeaderMap::new() }
    }
}

#[async_trait]
impl ResponseWriter for Detached {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, _status: StatusCode) {}

    async fn write(&mut self, _chunk: Bytes) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "writer is being replaced"))
    }
}
