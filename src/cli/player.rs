use chrono::Local;
use tabled::Table;

use super::context;
use crate::{
    error, info, spotify,
    types::RecentTableRow,
    utils::format_duration,
    warning,
};

/// Shows the track that is playing right now.
pub async fn current() {
    let mut client = context::client().await;

    match spotify::player::currently_playing(&mut client).await {
        Ok(Some(playing)) => match playing.item {
            Some(track) => {
                let state = if playing.is_playing { "Now playing" } else { "Paused" };
                info!("{}: {} by {}", state, track.name, track.artist_names());
                if let Some(album) = &track.album {
                    info!("Album: {}", album.name);
                }
                info!(
                    "Progress: {} / {}",
                    format_duration(playing.progress_ms.unwrap_or_default()),
                    format_duration(track.duration_ms)
                );
            }
            None => info!("Something is playing, but it is not a track."),
        },
        Ok(None) => info!("Nothing is playing right now."),
        Err(e) => error!("Failed to fetch current track. Err: {}", e),
    }
}

/// Lists the most recently played tracks, newest first.
pub async fn recent(limit: u32) {
    let mut client = context::client().await;
    let pb = context::spinner("Fetching recently played tracks...");

    let response = match spotify::player::recently_played(&mut client, limit, None).await {
        Ok(r) => r,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to fetch recently played tracks. Err: {}", e);
        }
    };
    pb.finish_and_clear();

    if response.items.is_empty() {
        warning!("No recently played tracks.");
        return;
    }

    let rows: Vec<RecentTableRow> = response
        .items
        .iter()
        .map(|item| RecentTableRow {
            played_at: item
                .played_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            track: item.track.name.clone(),
            artists: item.track.artist_names(),
            duration: format_duration(item.track.duration_ms),
        })
        .collect();

    println!("{}", Table::new(rows));
}
