use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::{self, HistoryConfig, SpotifyConfig},
    error,
    management::{SnapshotStore, TokenManager},
    spotify::SpotifyClient,
};

pub fn spotify_config() -> SpotifyConfig {
    match SpotifyConfig::from_env() {
        Ok(c) => c,
        Err(e) => error!("Invalid Spotify configuration: {}", e),
    }
}

pub fn history_config() -> HistoryConfig {
    match HistoryConfig::from_env() {
        Ok(c) => c,
        Err(e) => error!("Invalid history configuration: {}", e),
    }
}

pub async fn open_store(history: &HistoryConfig) -> SnapshotStore {
    match SnapshotStore::open(config::data_dir(), &history.account, history.store_options()).await
    {
        Ok(store) => store,
        Err(e) => error!("Cannot open listening history store. Err: {}", e),
    }
}

pub async fn client() -> SpotifyClient {
    let config = spotify_config();
    let tokens = match TokenManager::load(config::token_path()).await {
        Ok(t) => t,
        Err(e) => {
            error!(
                "Failed to load token. Please run sporlstats auth\n Error: {}",
                e
            );
        }
    };

    SpotifyClient::new(config, tokens)
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
