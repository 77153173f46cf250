//! Self-hosted media gallery server: browse, search, thumbnails and SSE
//! over the `gallery-core` indexing pipeline.
//!
//! Authentication, rate limiting and TLS termination are external
//! collaborators (a reverse proxy and an auth middleware upstream of this
//! process); this binary owns the routing, caching and background-task
//! wiring around `gallery-core` only.

mod config;
mod errors;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Args;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_server=debug,gallery_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::load();
    let host = args.host.clone();
    let port = args.port;
    let cors_origins = args.cors_allowed_origins.clone();
    let config = args.into_gallery_config();

    let (state, watcher) = AppState::new(config).await?;

    tokio::spawn(watcher.run());
    tokio::spawn(gallery_core::thumbnail::run_event_bridge(state.thumbnails.clone(), state.events.clone()));

    let app = create_app(state, &cors_origins);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "starting gallery server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    };

    routes::create_api_router(state.clone())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
