use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use casgate::config::CasSetup;
use casgate::gate::RequireLoginLayer;
use casgate::server::GateState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let cas_host = std::env::var("CASGATE_CAS_HOST").unwrap_or_else(|_| "cas.example.edu".to_string());
    let cas_version = std::env::var("CASGATE_CAS_VERSION").unwrap_or_else(|_| "3".to_string());
    let http_port = std::env::var("CASGATE_HTTP_PORT").unwrap_or_else(|_| "8088".to_string());
    info!(
        target: "casgate",
        "casgate starting: RUST_LOG='{}', cas_host={}, cas_version={}, http_port={}",
        rust_log, cas_host, cas_version, http_port
    );

    let state = CasSetup::new(cas_host, cas_version).build()?;

    let protected = Router::new()
        .route("/private", get(private))
        .layer(RequireLoginLayer::new(state.clone()))
        .with_state(state.clone());
    let app = Router::new()
        .route("/", get(|| async { "casgate ok" }))
        .merge(state.router())
        .merge(protected);

    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn private(State(state): State<GateState>, headers: HeaderMap) -> String {
    match state.identity(&headers) {
        Some(identity) => format!("hello, {}", identity.user),
        None => "hello, stranger".to_string(),
    }
}
