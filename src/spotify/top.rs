use super::{SpotifyClient, SpotifyError};
use crate::types::{ArtistObject, TimeRange, TopArtistsResponse, TopTracksResponse, TrackObject};

/// Upper bound of the `limit` parameter of the top items endpoints.
pub const MAX_LIMIT: u32 = 50;

pub async fn top_tracks(
    client: &mut SpotifyClient,
    range: TimeRange,
    limit: u32,
) -> Result<Vec<TrackObject>, SpotifyError> {
    let query = [
        ("time_range", range.as_str().to_string()),
        ("limit", limit.clamp(1, MAX_LIMIT).to_string()),
    ];
    let response = client
        .get::<TopTracksResponse>("/me/top/tracks", &query)
        .await?;

    Ok(response.map(|r| r.items).unwrap_or_default())
}

pub async fn top_artists(
    client: &mut SpotifyClient,
    range: TimeRange,
    limit: u32,
) -> Result<Vec<ArtistObject>, SpotifyError> {
    let query = [
        ("time_range", range.as_str().to_string()),
        ("limit", limit.clamp(1, MAX_LIMIT).to_string()),
    ];
    let response = client
        .get::<TopArtistsResponse>("/me/top/artists", &query)
        .await?;

    Ok(response.map(|r| r.items).unwrap_or_default())
}
