//! Vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Threshold-filtered similarity ranking over labelled embeddings

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank labelled embeddings by cosine similarity to a query embedding.
///
/// Only items scoring strictly above `threshold` are kept. Results are
/// sorted by descending similarity; equal scores keep input order.
pub fn rank_above<'a, K>(
    items: impl IntoIterator<Item = (&'a K, &'a [f32])>,
    query: &[f32],
    threshold: f32,
) -> Vec<(&'a K, f32)>
where
    K: ?Sized + 'a,
{
    let mut scored: Vec<(&K, f32)> = items
        .into_iter()
        .filter_map(|(label, embedding)| {
            let sim = cosine_similarity(embedding, query);
            (sim > threshold).then_some((label, sim))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
