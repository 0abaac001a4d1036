//! Serves files from the working directory with range support.
//!
//! ```text
//! cargo run --example serve
//! curl -H 'Range: bytes=0-99' 'http://127.0.0.1:3000/file?path=movie.mp4'
//! ```

use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use media_range::{serve_file, ServeConfig};

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
}

async fn get_file(
    State(config): State<ServeConfig>,
    Query(q): Query<FileRequest>,
    headers: HeaderMap,
) -> impl IntoResponse {
    serve_file(&q.path, &headers, &config).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,media_range=debug")))
        .init();

    let config: ServeConfig = match std::env::args().nth(1) {
        Some(json) => serde_json::from_str(&json)?,
        None => ServeConfig::default(),
    };

    let router = Router::new()
        .route("/file", get(get_file))
        .with_state(config);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving media");
    axum::serve(listener, router).await?;
    Ok(())
}
