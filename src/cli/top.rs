use tabled::Table;

use super::context;
use crate::{
    error, info, spotify,
    types::{TimeRange, TopArtistTableRow, TopTrackTableRow},
    warning,
};

fn popularity(value: Option<u32>) -> String {
    value.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
}

pub async fn top_tracks(range: TimeRange, limit: u32) {
    let mut client = context::client().await;
    let pb = context::spinner("Fetching top tracks...");
    let tracks = spotify::top::top_tracks(&mut client, range, limit).await;
    pb.finish_and_clear();

    let tracks = match tracks {
        Ok(t) => t,
        Err(e) => error!("Failed to fetch top tracks. Err: {}", e),
    };
    if tracks.is_empty() {
        warning!("No top tracks for {}.", range.label());
        return;
    }

    info!("Top tracks ({})", range.label());
    let rows: Vec<TopTrackTableRow> = tracks
        .iter()
        .enumerate()
        .map(|(i, t)| TopTrackTableRow {
            rank: i + 1,
            track: t.name.clone(),
            artists: t.artist_names(),
            popularity: popularity(t.popularity),
        })
        .collect();

    println!("{}", Table::new(rows));
}

pub async fn top_artists(range: TimeRange, limit: u32) {
    let mut client = context::client().await;
    let pb = context::spinner("Fetching top artists...");
    let artists = spotify::top::top_artists(&mut client, range, limit).await;
    pb.finish_and_clear();

    let artists = match artists {
        Ok(a) => a,
        Err(e) => error!("Failed to fetch top artists. Err: {}", e),
    };
    if artists.is_empty() {
        warning!("No top artists for {}.", range.label());
        return;
    }

    info!("Top artists ({})", range.label());
    let rows: Vec<TopArtistTableRow> = artists
        .into_iter()
        .enumerate()
        .map(|(i, a)| TopArtistTableRow {
            rank: i + 1,
            name: a.name,
            genres: a.genres.into_iter().take(3).collect::<Vec<_>>().join(","),
            popularity: popularity(a.popularity),
        })
        .collect();

    println!("{}", Table::new(rows));
}
