/// `q`-th percentile (0..=100) with linear interpolation between order
/// statistics, matching numpy's default `linear` method bit for bit.
///
/// Returns `None` for an empty sequence; any NaN input yields NaN.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    if values.iter().any(|v| v.is_nan()) {
        return Some(f64::NAN);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let virtual_index = (n - 1) as f64 * (q / 100.0);
    let lower = (virtual_index.floor() as usize).min(n - 1);
    let upper = (lower + 1).min(n - 1);
    let gamma = virtual_index - lower as f64;

    Some(lerp(sorted[lower], sorted[upper], gamma))
}

// Interpolate from whichever end is closer, as numpy does, so that t = 1 hits `b` exactly.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

/// Frame indices whose score is strictly below `threshold`, in frame order.
pub fn select_below(scores: &[f64], frame_indices: &[u64], threshold: f64) -> Vec<u64> {
    scores
        .iter()
        .zip(frame_indices)
        .filter(|(&score, _)| score < threshold)
        .map(|(_, &index)| index)
        .collect()
}
