use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::redis::{Client, RedisClient};
use crate::router;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let redis_client = match RedisClient::new(
        config.redis_url.clone(),
        Duration::from_millis(config.redis_timeout_ms),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(
                "Failed to create Redis client for URL {}: {}",
                config.redis_url,
                e
            );
            return;
        }
    };

    serve_with_client(redis_client, config, listener, shutdown).await
}

/// Runs the service over an already-built storage client.
pub async fn serve_with_client<R, F>(
    redis: Arc<R>,
    config: Config,
    listener: TcpListener,
    shutdown: F,
) where
    R: Client + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router::router(redis, config);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("could not read listener address: {}", e),
    }

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    {
        tracing::error!("server error: {}", e);
    }
}
