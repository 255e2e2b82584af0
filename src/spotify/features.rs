use std::collections::HashMap;

use reqwest::StatusCode;

use super::{SpotifyClient, SpotifyError};
use crate::{analysis::FeatureMap, types::AudioFeaturesResponse};

/// Maximum ids per `GET /audio-features` request.
pub const BATCH_SIZE: usize = 100;

/// Fetches audio features for the given track ids, keyed by track id.
///
/// Tracks without analysis are left out. Applications without access to the
/// endpoint get 403 or 404; that yields an empty map, since missing features
/// are an expected condition for the analysis.
pub async fn audio_features(
    client: &mut SpotifyClient,
    track_ids: &[String],
) -> Result<HashMap<String, FeatureMap>, SpotifyError> {
    let mut features = HashMap::new();

    for batch in track_ids.chunks(BATCH_SIZE) {
        let query = [("ids", batch.join(","))];
        let response = match client
            .get::<AudioFeaturesResponse>("/audio-features", &query)
            .await
        {
            Ok(response) => response,
            Err(SpotifyError::Status(StatusCode::FORBIDDEN | StatusCode::NOT_FOUND)) => {
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e),
        };

        for item in response.into_iter().flat_map(|r| r.audio_features).flatten() {
            features.insert(item.id.clone(), item.to_feature_map());
        }
    }

    Ok(features)
}
