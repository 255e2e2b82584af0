use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::analysis::{FeatureMap, ListeningEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

#[derive(Debug, Clone)]
pub struct PkceToken {
    pub code_verifier: String,
    pub token: Option<Token>,
}

/// Raw body of the token endpoint. Refresh responses may omit the refresh
/// token and the scope.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumObject {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackObject {
    /// Local files have no id.
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub duration_ms: u64,
    pub popularity: Option<u32>,
    pub album: Option<AlbumObject>,
}

impl TrackObject {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursors {
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistoryItem {
    pub track: TrackObject,
    pub played_at: DateTime<Utc>,
}

impl PlayHistoryItem {
    /// Converts the item to a listening event. Items without a track id
    /// cannot be recorded and yield `None`.
    pub fn to_event(&self) -> Option<ListeningEvent> {
        let track_id = self.track.id.clone()?;
        let (artist_ids, artist_names) = self
            .track
            .artists
            .iter()
            .filter_map(|a| a.id.clone().map(|id| (id, a.name.clone())))
            .unzip();

        Some(
            ListeningEvent::new(track_id, artist_ids, self.played_at)
                .with_names(self.track.name.clone(), artist_names),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistoryItem>,
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentlyPlayingResponse {
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    /// Missing for ads and podcasts.
    pub item: Option<TrackObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopTracksResponse {
    pub items: Vec<TrackObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopArtistsResponse {
    pub items: Vec<ArtistObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeveralArtistsResponse {
    pub artists: Vec<Option<ArtistObject>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub speechiness: f64,
    pub liveness: f64,
    pub tempo: f64,
}

impl AudioFeatures {
    pub fn to_feature_map(&self) -> FeatureMap {
        FeatureMap::from([
            ("acousticness".to_string(), self.acousticness),
            ("danceability".to_string(), self.danceability),
            ("energy".to_string(), self.energy),
            ("instrumentalness".to_string(), self.instrumentalness),
            ("liveness".to_string(), self.liveness),
            ("speechiness".to_string(), self.speechiness),
            ("tempo".to_string(), self.tempo),
            ("valence".to_string(), self.valence),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeaturesResponse {
    /// `null` entries for tracks without analysis.
    pub audio_features: Vec<Option<AudioFeatures>>,
}

/// Period of the Spotify top items endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeRange {
    #[value(name = "short")]
    ShortTerm,
    #[value(name = "medium")]
    MediumTerm,
    #[value(name = "long")]
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "Last 4 Weeks",
            TimeRange::MediumTerm => "Last 6 Months",
            TimeRange::LongTerm => "All Time",
        }
    }
}

#[derive(Tabled)]
pub struct RecentTableRow {
    pub played_at: String,
    pub track: String,
    pub artists: String,
    pub duration: String,
}

#[derive(Tabled)]
pub struct TopTrackTableRow {
    pub rank: usize,
    pub track: String,
    pub artists: String,
    pub popularity: String,
}

#[derive(Tabled)]
pub struct TopArtistTableRow {
    pub rank: usize,
    pub name: String,
    pub genres: String,
    pub popularity: String,
}

#[derive(Tabled)]
pub struct SnapshotTableRow {
    pub window: String,
    pub plays: usize,
    pub artists: usize,
    pub diversity: String,
    pub discovery: usize,
    pub genres: String,
    pub mood: String,
}

#[derive(Tabled)]
pub struct EvolutionTableRow {
    pub period: String,
    pub changes: String,
    pub tags: String,
}

#[derive(Tabled)]
pub struct HistoryTableRow {
    pub played_at: String,
    pub track: String,
    pub artists: String,
    pub features: String,
}
