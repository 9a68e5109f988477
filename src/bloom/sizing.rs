//! Bin sizing for the interleaved filters.
//!
//! For `n` elements, `k` hash functions and a target false-positive rate
//! `p`, the smallest bin that keeps `(1 - e^(-kn/m))^k <= p` is
//!
//! ```text
//! m = -k * n / ln(1 - p^(1/k))
//! ```
//!
//! When one user bin is split across `t` technical bins, a query hits if
//! ANY of the `t` bins reports a false positive, so each bin must meet the
//! stricter rate `p_t = 1 - (1 - p)^(1/t)`. The correction table stores the
//! resulting size ratio per split count.

/// Smallest bin ever allocated. Empty bins are legal, they just need a size.
pub const MIN_BIN_SIZE_IN_BITS: usize = 64;

/// Bits needed by one bin holding `elements` fingerprints.
pub fn bin_size_in_bits(fpr: f64, hash_count: usize, elements: usize) -> usize {
    if elements == 0 {
        return MIN_BIN_SIZE_IN_BITS;
    }

    let k = hash_count as f64;
    let denominator = (1.0 - (fpr.ln() / k).exp()).ln();
    let bits = (-(elements as f64) * k / denominator).ceil() as usize;
    bits.max(MIN_BIN_SIZE_IN_BITS)
}

/// Size multipliers indexed by split count, for splits up to `max_split`.
///
/// Entries 0 and 1 are 1.0; the table never decreases.
pub fn fpr_correction(fpr: f64, hash_count: usize, max_split: usize) -> Vec<f64> {
    let k = hash_count as f64;
    let base = (1.0 - (fpr.ln() / k).exp()).ln();
    let log_keep = (-fpr).ln_1p();

    let mut correction = vec![1.0; max_split.max(1) + 1];
    for (split, entry) in correction.iter_mut().enumerate().skip(2) {
        // p_t = 1 - (1 - p)^(1/t)
        let split_fpr = -(log_keep / split as f64).exp_m1();
        let split_log = (1.0 - (split_fpr.ln() / k).exp()).ln();
        *entry = base / split_log;
    }
    correction
}
