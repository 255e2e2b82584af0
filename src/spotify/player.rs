use super::{SpotifyClient, SpotifyError, artists, features};
use crate::{
    analysis::ListeningEvent,
    monitor::PlaySource,
    types::{CurrentlyPlayingResponse, RecentlyPlayedResponse},
};

/// Upper bound of the `limit` parameter of the recently played endpoint.
pub const MAX_RECENT_LIMIT: u32 = 50;

/// `after` is a unix timestamp in milliseconds; only plays after it are
/// returned.
pub async fn recently_played(
    client: &mut SpotifyClient,
    limit: u32,
    after: Option<i64>,
) -> Result<RecentlyPlayedResponse, SpotifyError> {
    let mut query = vec![("limit", limit.clamp(1, MAX_RECENT_LIMIT).to_string())];
    if let Some(after) = after {
        query.push(("after", after.to_string()));
    }

    let response = client
        .get::<RecentlyPlayedResponse>("/me/player/recently-played", &query)
        .await?;

    Ok(response.unwrap_or(RecentlyPlayedResponse {
        items: Vec::new(),
        cursors: None,
    }))
}

/// `None` when nothing is playing.
pub async fn currently_playing(
    client: &mut SpotifyClient,
) -> Result<Option<CurrentlyPlayingResponse>, SpotifyError> {
    client
        .get::<CurrentlyPlayingResponse>("/me/player/currently-playing", &[])
        .await
}

/// Recently played tracks as listening events, oldest first, with audio
/// features and artist genres attached where Spotify has them.
pub async fn fetch_recent_events(
    client: &mut SpotifyClient,
    after: Option<i64>,
) -> Result<Vec<ListeningEvent>, SpotifyError> {
    let response = recently_played(client, MAX_RECENT_LIMIT, after).await?;
    let mut events: Vec<ListeningEvent> = response
        .items
        .iter()
        .filter_map(|item| item.to_event())
        .collect();

    if events.is_empty() {
        return Ok(events);
    }

    let mut track_ids: Vec<String> = events.iter().map(|e| e.track_id.clone()).collect();
    track_ids.sort();
    track_ids.dedup();

    let features = features::audio_features(client, &track_ids).await?;
    for event in events.iter_mut() {
        if let Some(map) = features.get(&event.track_id) {
            event.audio_features = Some(map.clone());
        }
    }

    let mut artist_ids: Vec<String> = events
        .iter()
        .flat_map(|e| e.artist_ids.iter().cloned())
        .collect();
    artist_ids.sort();
    artist_ids.dedup();

    let genres = artists::artist_genres(client, &artist_ids).await?;
    for event in events.iter_mut() {
        let mut event_genres: Vec<String> = Vec::new();
        for genre in event.artist_ids.iter().filter_map(|id| genres.get(id)).flatten() {
            if !event_genres.contains(genre) {
                event_genres.push(genre.clone());
            }
        }
        event.genres = event_genres;
    }

    events.sort_by_key(|e| e.played_at);
    Ok(events)
}

/// Polls the recently played endpoint, remembering the newest play seen so
/// every poll only asks for what is new.
pub struct RecentlyPlayedSource {
    client: SpotifyClient,
    after: Option<i64>,
}

impl RecentlyPlayedSource {
    pub fn new(client: SpotifyClient, after: Option<i64>) -> Self {
        Self { client, after }
    }
}

impl PlaySource for RecentlyPlayedSource {
    async fn poll(&mut self) -> crate::Res<Vec<ListeningEvent>> {
        let events = fetch_recent_events(&mut self.client, self.after).await?;
        if let Some(newest) = events.last() {
            self.after = Some(newest.played_at.timestamp_millis());
        }
        Ok(events)
    }
}
