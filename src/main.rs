//! Demo server for the reply builder.
//!
//! ```text
//!   request ─▶ axum router ─▶ dispatch ─▶ Reply ─▶ handler
//!                                           │
//!                                           ▼
//!   response ◀─ ChannelWriter ◀─ render ◀─ finish
//! ```
//!
//! Routes:
//! - `/`            plain text greeting
//! - `/users/{id}`  JSON built from the path fragment
//! - `/login`       sets cookies and redirects to `/`
//! - `/broken`      data the text render rejects (500 with fallback body)
//! - `/raw`         adapter mode, writes straight to the response writer

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;
use clap::Parser;
use cookie::Cookie;
use futures_util::future::BoxFuture;
use serde_json::json;
use tokio::net::TcpListener;

use reply_builder::config::{load_config, ReplyDefaults, ServerConfig};
use reply_builder::http::{HttpServer, REQUEST_ID_KEY};
use reply_builder::observability::logging::init_logging;
use reply_builder::render::{JsonRender, Render, RenderRegistry};
use reply_builder::Reply;

#[derive(Parser)]
#[command(name = "reply-server")]
#[command(about = "Demo HTTP server built on the reply builder", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn index(reply: &mut Reply) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        reply.with("hello from reply-server\n");
    })
}

fn user(reply: &mut Reply) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let id = reply
            .path_fragment()
            .and_then(|fragment| fragment.get("id"))
            .and_then(|id| id.parse::<u64>().ok());
        let request_id = reply.context().get::<String>(REQUEST_ID_KEY).cloned();

        match id {
            Some(id) => {
                reply.with(json!({ "id": id, "request_id": request_id }));
            }
            None => {
                reply
                    .set_status(StatusCode::BAD_REQUEST)
                    .with(json!({ "error": "id must be a number" }));
            }
        }
        reply.render_with(Arc::new(JsonRender::new(true)) as Arc<dyn Render>);
    })
}

fn login(reply: &mut Reply) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        reply
            .add_cookie(Cookie::build(("session", "demo")).path("/").http_only(true).build())
            .add_cookie(Cookie::new("theme", "dark"))
            .redirect(StatusCode::SEE_OTHER, "/");
    })
}

fn broken(reply: &mut Reply) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        reply.with(json!(["text", "cannot", "render", "this"]));
    })
}

fn raw(reply: &mut Reply) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        reply.set_adapter_mode(true);
        let writer = reply.writer_mut();
        writer.write_head(StatusCode::ACCEPTED);
        if let Err(e) = writer.write(Bytes::from_static(b"written by the handler\n")).await {
            tracing::warn!(error = %e, "Raw write failed");
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path, &RenderRegistry::with_defaults(false))?,
        None => ServerConfig::default(),
    };
    let renders = RenderRegistry::with_defaults(config.render.pretty_json);

    init_logging(&config.observability.log_level);
    tracing::info!("reply-server v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        default_render = %config.render.default,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let defaults = ReplyDefaults::from_config(&config, &renders)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, defaults)
        .route("/", index)
        .route("/users/{id}", user)
        .route("/login", login)
        .route("/broken", broken)
        .route("/raw", raw);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
