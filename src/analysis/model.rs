use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Audio feature name to value, e.g. `energy -> 0.71`.
pub type FeatureMap = BTreeMap<String, f64>;

/// A single recorded play of a track.
///
/// Events are immutable once appended to the store. `track_name` and
/// `artist_names` are display-only and never take part in metrics or
/// de-duplication. `genres` is the union of the genres of the credited
/// artists at the time of the play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningEvent {
    pub track_id: String,
    pub artist_ids: Vec<String>,
    pub played_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_features: Option<FeatureMap>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub track_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artist_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
}

impl ListeningEvent {
    pub fn new(
        track_id: impl Into<String>,
        artist_ids: Vec<String>,
        played_at: DateTime<Utc>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            artist_ids,
            played_at,
            audio_features: None,
            track_name: String::new(),
            artist_names: Vec::new(),
            genres: Vec::new(),
        }
    }

    pub fn with_audio_features(mut self, features: FeatureMap) -> Self {
        self.audio_features = Some(features);
        self
    }

    pub fn with_names(mut self, track_name: impl Into<String>, artist_names: Vec<String>) -> Self {
        self.track_name = track_name.into();
        self.artist_names = artist_names;
        self
    }

    pub fn with_genres(mut self, genres: Vec<String>) -> Self {
        self.genres = genres;
        self
    }

    /// Whether this event contributes to mood. An empty feature map does not.
    pub fn has_audio_features(&self) -> bool {
        self.audio_features.as_ref().is_some_and(|f| !f.is_empty())
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(rename = "window_start")]
    pub start: DateTime<Utc>,
    #[serde(rename = "window_end")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "window must start before it ends");
        Self { start, end }
    }

    /// False for empty or inverted windows, which can still come from
    /// deserialized data or struct literals.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `self` ends no later than `other` starts.
    pub fn precedes(&self, other: &TimeWindow) -> bool {
        self.end <= other.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Averaged audio features of a window.
///
/// `Unavailable` means no event in the window carried audio features. It is
/// never rendered or compared as a zero vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "vector")]
pub enum Mood {
    #[serde(rename = "available")]
    Present(FeatureMap),
    #[serde(rename = "unavailable")]
    Unavailable,
}

impl Mood {
    pub fn is_available(&self) -> bool {
        matches!(self, Mood::Present(_))
    }

    pub fn vector(&self) -> Option<&FeatureMap> {
        match self {
            Mood::Present(vector) => Some(vector),
            Mood::Unavailable => None,
        }
    }
}

/// Qualitative mood derived from averaged audio features.
///
/// Declaration order is the tie-break order when two scores are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLabel {
    Energetic,
    Happy,
    Chill,
    Melancholic,
    Danceable,
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MoodLabel::Energetic => "energetic",
            MoodLabel::Happy => "happy",
            MoodLabel::Chill => "chill",
            MoodLabel::Melancholic => "melancholic",
            MoodLabel::Danceable => "danceable",
        };
        f.write_str(label)
    }
}

/// Computed metric summary for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(flatten)]
    pub window: TimeWindow,
    pub event_count: usize,
    pub distinct_artists: usize,
    pub diversity_score: f64,
    pub mood: Mood,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_mood: Option<MoodLabel>,
    pub discovery_count: usize,
    pub top_artist_ids: Vec<String>,
    #[serde(default)]
    pub distinct_genres: usize,
    #[serde(default)]
    pub genre_diversity: f64,
    /// Share of genre credits held by the most played genre, 0..1.
    #[serde(default)]
    pub top_genre_share: f64,
    #[serde(default)]
    pub top_genres: Vec<String>,
}

impl MetricSnapshot {
    /// Whether any event of the window carried genres.
    pub fn has_genres(&self) -> bool {
        self.distinct_genres > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvolutionTag {
    #[serde(rename = "more diverse")]
    MoreDiverse,
    #[serde(rename = "less diverse")]
    LessDiverse,
    #[serde(rename = "more discovery")]
    MoreDiscovery,
    #[serde(rename = "less discovery")]
    LessDiscovery,
    #[serde(rename = "new top artist")]
    NewTopArtist,
    #[serde(rename = "broader genres")]
    BroaderGenres,
    #[serde(rename = "narrower genres")]
    NarrowerGenres,
    #[serde(rename = "new top genre")]
    NewTopGenre,
    #[serde(rename = "new primary mood")]
    NewPrimaryMood,
    #[serde(rename = "more energetic")]
    MoreEnergetic,
    #[serde(rename = "calmer")]
    Calmer,
    #[serde(rename = "happier")]
    Happier,
    #[serde(rename = "more melancholic")]
    MoreMelancholic,
}

impl EvolutionTag {
    pub fn is_mood_related(&self) -> bool {
        matches!(
            self,
            EvolutionTag::NewPrimaryMood
                | EvolutionTag::MoreEnergetic
                | EvolutionTag::Calmer
                | EvolutionTag::Happier
                | EvolutionTag::MoreMelancholic
        )
    }

    pub fn is_genre_related(&self) -> bool {
        matches!(
            self,
            EvolutionTag::BroaderGenres | EvolutionTag::NarrowerGenres | EvolutionTag::NewTopGenre
        )
    }
}

impl fmt::Display for EvolutionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EvolutionTag::MoreDiverse => "more diverse",
            EvolutionTag::LessDiverse => "less diverse",
            EvolutionTag::MoreDiscovery => "more discovery",
            EvolutionTag::LessDiscovery => "less discovery",
            EvolutionTag::NewTopArtist => "new top artist",
            EvolutionTag::BroaderGenres => "broader genres",
            EvolutionTag::NarrowerGenres => "narrower genres",
            EvolutionTag::NewTopGenre => "new top genre",
            EvolutionTag::NewPrimaryMood => "new primary mood",
            EvolutionTag::MoreEnergetic => "more energetic",
            EvolutionTag::Calmer => "calmer",
            EvolutionTag::Happier => "happier",
            EvolutionTag::MoreMelancholic => "more melancholic",
        };
        f.write_str(label)
    }
}

/// Comparison of two adjacent snapshots, baseline earlier than comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    #[serde(rename = "baseline_snapshot")]
    pub baseline: MetricSnapshot,
    #[serde(rename = "comparison_snapshot")]
    pub comparison: MetricSnapshot,
    pub deltas: BTreeMap<String, f64>,
    pub narrative_tags: BTreeSet<EvolutionTag>,
}
