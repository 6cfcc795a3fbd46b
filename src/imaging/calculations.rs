//! Pure calculation functions for 8-bit intensity mappings.
//!
//! Every transform in this crate is a per-sample lookup table over `0..=255`.
//! The functions here build those tables from histograms and are testable
//! without any images.

/// Number of distinct 8-bit sample values.
pub const LEVELS: usize = 256;

/// Largest 8-bit sample value.
pub const MAX_VALUE: u8 = u8::MAX;

/// A lookup table mapping each input level to an output level.
pub type Lut = [u8; LEVELS];

/// Count occurrences of each level.
pub fn histogram<I>(samples: I) -> [u64; LEVELS]
where
    I: IntoIterator<Item = u8>,
{
    let mut hist = [0u64; LEVELS];
    for s in samples {
        hist[s as usize] += 1;
    }
    hist
}

/// Histogram equalization table for one channel.
///
/// Maps each level through the channel's cumulative distribution, normalized
/// so the lowest occupied level becomes 0 and the highest becomes 255:
///
/// ```text
/// lut[v] = round((cdf[v] - cdf_min) / (total - cdf_min) * 255)
/// ```
///
/// A channel holding a single level maps that level to 255 (its CDF is 1).
/// An empty histogram yields the identity table.
pub fn equalization_lut(hist: &[u64; LEVELS]) -> Lut {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return identity_lut();
    }

    let cdf_min = hist.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let span = (total - cdf_min) as f64;

    let mut lut = [0u8; LEVELS];
    let mut cumulative = 0u64;
    for (level, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[level] = if span == 0.0 {
            MAX_VALUE
        } else {
            let scaled = cumulative.saturating_sub(cdf_min) as f64 / span * 255.0;
            scaled.round().clamp(0.0, 255.0) as u8
        };
    }
    lut
}

/// Percentile (0–100) of the samples summarized by `hist`.
///
/// Interpolates linearly between the two nearest order statistics.
/// Returns `None` for an empty histogram.
pub fn percentile(hist: &[u64; LEVELS], pct: f64) -> Option<f64> {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return None;
    }
    let rank = pct.clamp(0.0, 100.0) * (total - 1) as f64 / 100.0;
    let lo_rank = rank.floor() as u64;
    let hi_rank = rank.ceil() as u64;
    let lo = level_at_rank(hist, lo_rank) as f64;
    let hi = level_at_rank(hist, hi_rank) as f64;
    Some(lo + (hi - lo) * (rank - lo_rank as f64))
}

/// The level of the `rank`-th smallest sample (0-based).
fn level_at_rank(hist: &[u64; LEVELS], rank: u64) -> u8 {
    let mut cumulative = 0u64;
    for (level, &count) in hist.iter().enumerate() {
        cumulative += count;
        if cumulative > rank {
            return level as u8;
        }
    }
    MAX_VALUE
}

/// Linear rescale table: `low` maps to 0, `high` maps to 255, values outside are clipped.
///
/// Returns `None` when the range is empty (`high <= low`); there is nothing to stretch.
pub fn stretch_lut(low: f64, high: f64) -> Option<Lut> {
    if high <= low {
        return None;
    }
    let mut lut = [0u8; LEVELS];
    for (level, out) in lut.iter_mut().enumerate() {
        let t = ((level as f64 - low) / (high - low)).clamp(0.0, 1.0);
        *out = (t * 255.0).round() as u8;
    }
    Some(lut)
}

/// Logarithmic brightening curve: `255 * log2(1 + v / 255)`.
///
/// Fixes 0 and 255, lifts everything in between, and is monotonic.
pub fn log_lut() -> Lut {
    let mut lut = [0u8; LEVELS];
    for (level, out) in lut.iter_mut().enumerate() {
        let v = level as f64 / 255.0;
        *out = (255.0 * (1.0 + v).log2()).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Photographic negative: `255 - v`.
pub fn invert_lut() -> Lut {
    let mut lut = [0u8; LEVELS];
    for (level, out) in lut.iter_mut().enumerate() {
        *out = MAX_VALUE - level as u8;
    }
    lut
}

pub fn identity_lut() -> Lut {
    let mut lut = [0u8; LEVELS];
    for (level, out) in lut.iter_mut().enumerate() {
        *out = level as u8;
    }
    lut
}
