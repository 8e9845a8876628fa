use std::sync::Arc;

use dotenvy::dotenv;
use order_store::infrastructure::kv::KvStore;
use order_store::infrastructure::redis_store::RedisStore;
use order_store::{build_server, AppState, Settings};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let settings = Settings::from_env().map_err(std::io::Error::other)?;

    let store = RedisStore::connect(&settings.redis_url)
        .await
        .map_err(std::io::Error::other)?;
    store.ping().await.map_err(|e| {
        log::error!("failed to reach redis at {}: {}", settings.redis_url, e);
        std::io::Error::other(e)
    })?;

    log::info!(
        "Starting server at http://{}:{}",
        settings.host,
        settings.port
    );

    let state = AppState::new(Arc::new(store), settings.request_timeout);
    build_server(
        state,
        &settings.host,
        settings.port,
        settings.shutdown_timeout_secs,
    )?
    .await
}
