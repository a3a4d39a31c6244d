//! Token-set text similarity used to rank past feedback.
//!
//! Case-folded whitespace tokens, collapsed into sets, compared with the
//! Jaccard index. No stemming, weighting or embeddings: callers only see
//! the [`TextSimilarity`] trait, so a stronger measure can be swapped in.

use std::collections::HashSet;

/// A symmetric similarity measure over short strings, valued in `[0, 1]`.
pub trait TextSimilarity
{
    fn similarity(
        &self,
        a: &str,
        b: &str,
    ) -> f64;
}

/// Jaccard similarity over lowercase whitespace-token sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaccard;

impl TextSimilarity for Jaccard
{
    fn similarity(
        &self,
        a: &str,
        b: &str,
    ) -> f64
    {
        similarity(a, b)
    }
}

/// Case-fold and split on whitespace; duplicates collapse.
fn token_set(text: &str) -> HashSet<String>
{
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// `|A ∩ B| / |A ∪ B|` over token sets; 0 when either side is empty.
pub fn similarity(
    a: &str,
    b: &str,
) -> f64
{
    let left = token_set(a);
    let right = token_set(b);

    if left.is_empty() || right.is_empty()
    {
        return 0.0;
    }

    let intersection = left
        .intersection(&right)
        .count();
    let union = left.len() + right.len() - intersection;

    intersection as f64 / union as f64
}
