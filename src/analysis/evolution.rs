use std::collections::{BTreeMap, BTreeSet};

use super::{
    AnalysisError,
    model::{EvolutionReport, EvolutionTag, MetricSnapshot},
};

/// Minimum change in diversity score that earns a diversity tag.
pub const DIVERSITY_SHIFT: f64 = 0.1;
/// Minimum change in an averaged mood feature that earns a mood tag.
pub const MOOD_SHIFT: f64 = 0.1;
/// Minimum change in genre diversity that earns a genre tag.
pub const GENRE_SHIFT: f64 = 0.1;

/// Compares two snapshots, `baseline` being the earlier one.
///
/// Deltas are `comparison - baseline`. Mood deltas and mood tags only appear
/// when both snapshots have mood data; the same goes for genres.
///
/// # Errors
///
/// `AnalysisError::IncompatibleWindows` when the windows overlap, either
/// window is empty or inverted, or the comparison window does not come after
/// the baseline window.
pub fn compare(
    baseline: &MetricSnapshot,
    comparison: &MetricSnapshot,
) -> Result<EvolutionReport, AnalysisError> {
    if !baseline.window.is_valid()
        || !comparison.window.is_valid()
        || !baseline.window.precedes(&comparison.window)
    {
        return Err(AnalysisError::IncompatibleWindows {
            baseline: baseline.window,
            comparison: comparison.window,
        });
    }

    let mut deltas = BTreeMap::new();
    let mut tags = BTreeSet::new();

    let diversity = comparison.diversity_score - baseline.diversity_score;
    deltas.insert("diversity_score".to_string(), diversity);
    if diversity > DIVERSITY_SHIFT {
        tags.insert(EvolutionTag::MoreDiverse);
    } else if diversity < -DIVERSITY_SHIFT {
        tags.insert(EvolutionTag::LessDiverse);
    }

    let discovery = comparison.discovery_count as f64 - baseline.discovery_count as f64;
    deltas.insert("discovery_count".to_string(), discovery);
    if discovery > 0.0 {
        tags.insert(EvolutionTag::MoreDiscovery);
    } else if discovery < 0.0 {
        tags.insert(EvolutionTag::LessDiscovery);
    }

    deltas.insert(
        "event_count".to_string(),
        comparison.event_count as f64 - baseline.event_count as f64,
    );
    deltas.insert(
        "distinct_artists".to_string(),
        comparison.distinct_artists as f64 - baseline.distinct_artists as f64,
    );

    if let (Some(before), Some(after)) = (
        baseline.top_artist_ids.first(),
        comparison.top_artist_ids.first(),
    ) {
        if before != after {
            tags.insert(EvolutionTag::NewTopArtist);
        }
    }

    if baseline.has_genres() && comparison.has_genres() {
        let genre_diversity = comparison.genre_diversity - baseline.genre_diversity;
        deltas.insert("genre_diversity".to_string(), genre_diversity);
        deltas.insert(
            "distinct_genres".to_string(),
            comparison.distinct_genres as f64 - baseline.distinct_genres as f64,
        );
        deltas.insert(
            "top_genre_share".to_string(),
            comparison.top_genre_share - baseline.top_genre_share,
        );

        if genre_diversity > GENRE_SHIFT {
            tags.insert(EvolutionTag::BroaderGenres);
        } else if genre_diversity < -GENRE_SHIFT {
            tags.insert(EvolutionTag::NarrowerGenres);
        }

        if baseline.top_genres.first() != comparison.top_genres.first() {
            tags.insert(EvolutionTag::NewTopGenre);
        }
    }

    if let (Some(before), Some(after)) = (baseline.mood.vector(), comparison.mood.vector()) {
        for (dimension, value) in after {
            if let Some(previous) = before.get(dimension) {
                deltas.insert(format!("mood.{dimension}"), value - previous);
            }
        }

        if baseline.primary_mood.is_some()
            && comparison.primary_mood.is_some()
            && baseline.primary_mood != comparison.primary_mood
        {
            tags.insert(EvolutionTag::NewPrimaryMood);
        }

        match deltas.get("mood.energy") {
            Some(d) if *d > MOOD_SHIFT => {
                tags.insert(EvolutionTag::MoreEnergetic);
            }
            Some(d) if *d < -MOOD_SHIFT => {
                tags.insert(EvolutionTag::Calmer);
            }
            _ => {}
        }

        match deltas.get("mood.valence") {
            Some(d) if *d > MOOD_SHIFT => {
                tags.insert(EvolutionTag::Happier);
            }
            Some(d) if *d < -MOOD_SHIFT => {
                tags.insert(EvolutionTag::MoreMelancholic);
            }
            _ => {}
        }
    }

    Ok(EvolutionReport {
        baseline: baseline.clone(),
        comparison: comparison.clone(),
        deltas,
        narrative_tags: tags,
    })
}
