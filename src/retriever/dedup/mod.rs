
use std::collections::HashSet;

/// Similarity between two chunk texts, in `[0, 1]`
pub trait Deduplicator: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f32;
}

/// Jaccard similarity of lowercase whitespace-separated token sets
///
/// Cheap stand-in for semantic overlap. Two texts without tokens score 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TokenJaccard;

impl Deduplicator for TokenJaccard {
    #[inline]
    fn similarity(&self, a: &str, b: &str) -> f32 {
        let set_a = token_set(a);
        let set_b = token_set(b);
        if set_a.is_empty() && set_b.is_empty() {
            return 0.0;
        }

        let intersection = set_a.intersection(&set_b).count();
        let union = set_a.union(&set_b).count();
        intersection as f32 / union as f32
    }
}

#[inline]
pub fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Drop items too similar to an earlier kept item
///
/// `items` must already be in ascending-distance order, so the closer of two
/// near-duplicates is the one kept.
#[inline]
pub fn suppress_near_duplicates<T, F>(
    items: Vec<T>,
    text: F,
    deduplicator: &dyn Deduplicator,
    threshold: f32,
) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let candidate = text(&item);
        let duplicate = kept
            .iter()
            .any(|existing| deduplicator.similarity(candidate, text(existing)) > threshold);
        if !duplicate {
            kept.push(item);
        }
    }
    kept
}
