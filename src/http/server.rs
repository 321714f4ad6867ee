//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router from registered reply handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Build one Reply per request, run the handler, commit the reply
//! - Stream the committed body back through hyper
//! - Cancel the root context on shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::PathRejection, Path, Request, State},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::config::{ReplyDefaults, ServerConfig};
use crate::http::handler::ReplyHandler;
use crate::http::request::{
    propagate_request_id_layer, set_request_id_layer, RequestIdExt, REQUEST_ID_KEY,
};
use crate::http::writer::ChannelWriter;
use crate::observability::metrics;
use crate::reply::Reply;

/// State shared by every route.
#[derive(Clone)]
struct AppState {
    defaults: ReplyDefaults,
    channel_capacity: usize,
}

/// HTTP server dispatching requests to reply handlers.
pub struct HttpServer {
    config: ServerConfig,
    defaults: ReplyDefaults,
    routes: Vec<(String, Arc<dyn ReplyHandler>)>,
    shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a server with no routes.
    ///
    /// The root context of `defaults` is cancelled when the server shuts down.
    pub fn new(config: ServerConfig, defaults: ReplyDefaults) -> Self {
        metrics::set_enabled(config.observability.metrics_enabled);
        let shutdown = defaults.root_context().cancellation_token().clone();
        Self {
            config,
            defaults,
            routes: Vec::new(),
            shutdown,
        }
    }

    /// Register `handler` for every method on `path` (axum syntax, e.g. `/users/{id}`).
    pub fn route(mut self, path: impl Into<String>, handler: impl ReplyHandler) -> Self {
        let handler: Arc<dyn ReplyHandler> = Arc::new(handler);
        self.routes.push((path.into(), handler));
        self
    }

    /// Token that stops `run` when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let state = AppState {
            defaults: self.defaults,
            channel_capacity: self.config.response.channel_capacity,
        };

        let mut router = Router::new();
        for (path, handler) in self.routes {
            router = router.route(
                &path,
                any(
                    move |State(state): State<AppState>,
                          params: Result<Path<HashMap<String, String>>, PathRejection>,
                          request: Request| {
                        let handler = handler.clone();
                        async move { dispatch(state, handler, params, request).await }
                    },
                ),
            );
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    self.config.timeouts.request_secs,
                ))),
        )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.len(),
            "HTTP server starting"
        );

        let shutdown = self.shutdown.clone();
        let router = self.into_router();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build, handle and commit one reply.
///
/// The handler and commit run in their own task so the body can stream
/// while hyper is already sending the head. The task is not cancelled when
/// the request future is dropped (client gone, timeout response).
async fn dispatch(
    state: AppState,
    handler: Arc<dyn ReplyHandler>,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    request: Request,
) -> Response {
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Dispatching request"
    );

    let (writer, pending) = ChannelWriter::new(state.channel_capacity);
    let mut reply = Reply::new(request, Box::new(writer), &state.defaults);
    reply.set_context(REQUEST_ID_KEY, request_id.clone());
    if let Ok(Path(params)) = params {
        for (name, value) in params {
            reply.add_path_fragment(name, value);
        }
    }

    tokio::spawn(
        async move {
            handler.handle(&mut reply).await;
            let outcome = reply.finish().await;
            tracing::debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                outcome = outcome.label(),
                status = ?outcome.status(),
                "Reply committed"
            );
        }
        .instrument(tracing::Span::current()),
    );

    pending.into_response().await
}

/// Wait for Ctrl+C or an explicit cancel, then cancel the root context.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => tracing::info!("Shutdown requested"),
    }
    token.cancel();
}
