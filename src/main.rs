// src/main.rs
use log::{error, info, warn};

use stockplace::api;
use stockplace::config::AppConfig;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let allocator_config = app_config.allocator.allocator_config();

    info!("🚀 Storage allocator starting...");
    if let Err(err) = api::start_api_server(api_config, allocator_config).await {
        error!("❌ API server terminated with an error: {}", err);
        std::process::exit(1);
    }
}
