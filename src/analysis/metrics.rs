//! Pure metric functions over a window of listening events.
//!
//! Nothing in here touches the store or the network. Every function takes the
//! events of one window (and, for discovery, the artists already known before
//! it) and returns a value.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::model::{FeatureMap, ListeningEvent, MetricSnapshot, Mood, MoodLabel, TimeWindow};

/// Number of artists kept in `MetricSnapshot::top_artist_ids` by default.
pub const DEFAULT_TOP_ARTISTS: usize = 5;

/// Normalized Shannon entropy of the artist-frequency distribution.
///
/// Every artist credit of every event counts once. The entropy is divided by
/// `ln(distinct_artists)`, so a window where every artist is played equally
/// often scores 1.0. Fewer than two distinct artists always score 0.
pub fn diversity(events: &[ListeningEvent]) -> f64 {
    normalized_entropy(&artist_counts(events))
}

/// Normalized Shannon entropy of the genre distribution, with the same rules
/// as [`diversity`]. A genre counts once per event.
pub fn genre_diversity(events: &[ListeningEvent]) -> f64 {
    normalized_entropy(&genre_counts(events))
}

/// Genres ordered by how many plays carried them, ties broken by first
/// appearance, together with the share of all genre credits each one holds.
pub fn top_genres(events: &[ListeningEvent], limit: usize) -> Vec<(String, f64)> {
    let counts = genre_counts(events);
    let total = counts.values().sum::<usize>() as f64;

    ranked(events.iter().flat_map(event_genres), limit)
        .into_iter()
        .map(|id| {
            let share = counts.get(id.as_str()).copied().unwrap_or_default() as f64 / total;
            (id, share)
        })
        .collect()
}

/// Averages each audio feature over the events that carry it.
///
/// Returns `Mood::Unavailable` if and only if no event has a non-empty
/// feature map. Non-finite values are ignored.
pub fn mood(events: &[ListeningEvent]) -> Mood {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut carriers = 0;

    for features in events
        .iter()
        .filter(|e| e.has_audio_features())
        .filter_map(|e| e.audio_features.as_ref())
    {
        carriers += 1;
        for (name, value) in features {
            if !value.is_finite() {
                continue;
            }
            let entry = sums.entry(name.as_str()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    if carriers == 0 {
        return Mood::Unavailable;
    }

    Mood::Present(
        sums.into_iter()
            .map(|(name, (sum, n))| (name.to_string(), sum / n as f64))
            .collect(),
    )
}

/// Number of distinct artists in the window that are not in `known_before`.
///
/// An artist counts once per window no matter how often it is played.
pub fn discovery(events: &[ListeningEvent], known_before: &HashSet<String>) -> usize {
    events
        .iter()
        .flat_map(|e| e.artist_ids.iter())
        .filter(|id| !known_before.contains(*id))
        .map(String::as_str)
        .collect::<HashSet<&str>>()
        .len()
}

/// Artist ids ordered by play count, ties broken by first appearance.
pub fn top_artists(events: &[ListeningEvent], limit: usize) -> Vec<String> {
    ranked(events.iter().flat_map(|e| e.artist_ids.iter()), limit)
}

/// Mood scores on a 0-100 scale derived from an averaged feature vector.
///
/// A score is only present when the features it is built from are present.
pub fn mood_scores(vector: &FeatureMap) -> BTreeMap<MoodLabel, f64> {
    let feature = |name: &str| vector.get(name).copied();
    let mut scores = BTreeMap::new();

    if let Some(energy) = feature("energy") {
        scores.insert(MoodLabel::Energetic, energy * 100.0);
    }
    if let Some(valence) = feature("valence") {
        scores.insert(MoodLabel::Happy, valence * 100.0);
        scores.insert(MoodLabel::Melancholic, (1.0 - valence) * 100.0);
    }
    if let Some(acousticness) = feature("acousticness") {
        scores.insert(MoodLabel::Chill, acousticness * 100.0);
    }
    if let Some(danceability) = feature("danceability") {
        scores.insert(MoodLabel::Danceable, danceability * 100.0);
    }

    scores
}

/// Highest scoring mood label. Equal scores resolve to the earlier label.
pub fn primary_mood(mood: &Mood) -> Option<MoodLabel> {
    let vector = mood.vector()?;
    mood_scores(vector)
        .into_iter()
        .fold(None, |best: Option<(MoodLabel, f64)>, (label, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((label, score)),
        })
        .map(|(label, _)| label)
}

/// Builds the snapshot of one window from its events.
pub fn snapshot(
    window: TimeWindow,
    events: &[ListeningEvent],
    known_before: &HashSet<String>,
    top_limit: usize,
) -> MetricSnapshot {
    let mood = mood(events);
    let genres = top_genres(events, top_limit.max(1));
    MetricSnapshot {
        window,
        event_count: events.len(),
        distinct_artists: artist_counts(events).len(),
        diversity_score: diversity(events),
        primary_mood: primary_mood(&mood),
        mood,
        discovery_count: discovery(events, known_before),
        top_artist_ids: top_artists(events, top_limit),
        distinct_genres: genre_counts(events).len(),
        genre_diversity: genre_diversity(events),
        top_genre_share: genres.first().map(|(_, share)| *share).unwrap_or_default(),
        top_genres: genres.into_iter().take(top_limit).map(|(genre, _)| genre).collect(),
    }
}

fn artist_counts(events: &[ListeningEvent]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for id in events.iter().flat_map(|e| e.artist_ids.iter()) {
        *counts.entry(id.as_str()).or_insert(0) += 1;
    }
    counts
}

fn genre_counts(events: &[ListeningEvent]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for genre in events.iter().flat_map(event_genres) {
        *counts.entry(genre.as_str()).or_insert(0) += 1;
    }
    counts
}

// Distinct genres of one event, in first-seen order.
fn event_genres(event: &ListeningEvent) -> impl Iterator<Item = &String> {
    event
        .genres
        .iter()
        .enumerate()
        .filter(move |(i, genre)| !event.genres[..*i].contains(*genre))
        .map(|(_, genre)| genre)
}

fn normalized_entropy(counts: &HashMap<&str, usize>) -> f64 {
    let distinct = counts.len();
    if distinct < 2 {
        return 0.0;
    }

    let total = counts.values().sum::<usize>() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.ln()
        })
        .sum();

    (entropy / (distinct as f64).ln()).clamp(0.0, 1.0)
}

// Ids by count descending, ties broken by first appearance.
fn ranked<'a>(ids: impl Iterator<Item = &'a String>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, id) in ids.enumerate() {
        counts.entry(id.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (a_count, a_first)), (_, (b_count, b_first))| {
        b_count.cmp(a_count).then(a_first.cmp(b_first))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(id, _)| id.to_string())
        .collect()
}
