//! Deterministic-under-fixed-RNG selection helpers.
//!
//! Every helper consumes exactly one `f64` draw in `[0, 1)`. A draw of 0
//! always picks the first candidate, so a zero source replays the most
//! likely path.

use rand::Rng;

/// Index in `0..len` chosen uniformly, or `None` for an empty range.
pub fn pick_uniform<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let draw: f64 = rng.gen();
    Some(((draw * len as f64) as usize).min(len - 1))
}

/// Index chosen with probability proportional to its weight.
///
/// Non-finite and non-positive weights count as zero; if nothing has weight
/// the choice falls back to uniform.
pub fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let usable = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f64 = weights.iter().map(|w| usable(*w)).sum();
    if total <= 0.0 {
        return pick_uniform(rng, weights.len());
    }

    let draw: f64 = rng.gen();
    let target = draw * total;
    let mut cumulative = 0.0;
    let mut last_usable = None;
    for (i, weight) in weights.iter().enumerate() {
        let weight = usable(*weight);
        if weight == 0.0 {
            continue;
        }
        cumulative += weight;
        last_usable = Some(i);
        if target < cumulative {
            return Some(i);
        }
    }
    // Rounding can leave target == total; the last usable index owns that edge.
    last_usable
}

/// Order candidates heaviest first, ties by key, then sample by weight.
///
/// This is the single tie-breaking rule used by generation: equal learned
/// counts are separated by overlay weight, equal weights by key order, and
/// the draw decides among what remains.
pub fn pick_ranked<'a, R: Rng + ?Sized, T>(
    rng: &mut R,
    mut candidates: Vec<(&'a str, f64, T)>,
) -> Option<T> {
    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    let weights: Vec<f64> = candidates.iter().map(|c| c.1).collect();
    let index = pick_weighted(rng, &weights)?;
    candidates.into_iter().nth(index).map(|c| c.2)
}
