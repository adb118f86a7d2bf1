use relayhub::adapters::UpstreamService;
use relayhub::limiter::RateLimiter;
use relayhub::{api, config, logging};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();
    let service = Arc::new(UpstreamService::from_config(config));
    let limiter = Arc::new(RateLimiter::from_config(config));
    let app = api::create_router(service, limiter);

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    let port = config.server_port.unwrap_or(3000);
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .map(|listener| (listener, port))
}
