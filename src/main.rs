use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use media_ops_service::config::{AppConfig, LogFormat};
use media_ops_service::handlers::RequestHandler;
use media_ops_service::utils::format_file_size;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env();
    init_tracing(config.log_format);

    let addr: SocketAddr = config.server_address().parse()?;
    info!("Starting server at {}", addr);
    info!("- Image routes under /image-operation, document routes under /pdf-operation");
    info!(
        "- Max upload size: {}, max files per request: {}",
        format_file_size(config.limits.max_upload_size),
        config.limits.max_files
    );
    info!("- Request timeout: {}s", config.server.timeout_seconds);

    let handler = Arc::new(RequestHandler::new(&config));
    let make_svc = make_service_fn(move |_conn| {
        let handler = Arc::clone(&handler);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let handler = Arc::clone(&handler);
                async move { handler.handle_http_request(req).await }
            }))
        }
    });

    let server = Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown_signal());

    info!("Server running on http://{}", addr);
    if let Err(e) = server.await {
        error!(error = %e, "server error");
    }

    Ok(())
}
