use std::collections::HashMap;

use reqwest::StatusCode;

use super::{SpotifyClient, SpotifyError};
use crate::types::SeveralArtistsResponse;

/// Maximum ids per `GET /artists` request.
pub const BATCH_SIZE: usize = 50;

/// Genres of the given artists, keyed by artist id.
///
/// Artists Spotify has no genres for map to an empty list. Like audio
/// features, a denied endpoint (403 or 404) just means no genre data.
pub async fn artist_genres(
    client: &mut SpotifyClient,
    artist_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, SpotifyError> {
    let mut genres = HashMap::new();

    for batch in artist_ids.chunks(BATCH_SIZE) {
        let query = [("ids", batch.join(","))];
        let response = match client.get::<SeveralArtistsResponse>("/artists", &query).await {
            Ok(response) => response,
            Err(SpotifyError::Status(StatusCode::FORBIDDEN | StatusCode::NOT_FOUND)) => {
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e),
        };

        for artist in response.into_iter().flat_map(|r| r.artists).flatten() {
            genres.insert(artist.id, artist.genres);
        }
    }

    Ok(genres)
}
