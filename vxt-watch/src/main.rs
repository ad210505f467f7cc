use dotenv::dotenv;
use std::sync::Arc;
use vxt_watch::AppState;
use vxt_watch::channels::start_discord_listener;
use vxt_watch::config::Config;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    // Bad settings or a missing token must stop us before connecting
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Startup configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(config.settings));

    if let Err(e) = start_discord_listener(&config.discord_token, state).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
