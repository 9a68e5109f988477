use std::time::{Duration, Instant};

use crate::bloom::{BinStripe, InterleavedBloomFilter, split_bin_offset};
use crate::build::data::BuildData;
use crate::build::extract::stream_fingerprints;
use crate::build::tree::UserBinRecord;
use crate::error::Result;
use crate::types::{Fingerprint, FingerprintSet, UserBinIndex};

/// Fingerprints buffered between the source and the filter on the
/// streaming path.
const STREAM_BATCH: usize = 4096;

/// Insert `fingerprints` into `[first_bin, first_bin + bin_count)`.
///
/// With more than one bin every fingerprint goes to exactly one of them,
/// chosen by [`split_bin_offset`].
pub(crate) fn insert_into_ibf(
    fingerprints: &FingerprintSet,
    bin_count: usize,
    first_bin: usize,
    ibf: &mut InterleavedBloomFilter,
    data: &BuildData<'_>,
) {
    let start = Instant::now();
    if bin_count == 1 {
        for &value in fingerprints {
            ibf.emplace(value, first_bin);
        }
    } else {
        for &value in fingerprints {
            ibf.emplace(value, first_bin + split_bin_offset(value, bin_count));
        }
    }
    data.timers.fill_ibf.add(start.elapsed());
}

/// Stream a single-bin user bin into `record.first_bin` without collecting
/// its fingerprint set. Only valid where nothing has to be propagated.
pub(crate) fn insert_streamed(
    data: &BuildData<'_>,
    record: &UserBinRecord,
    ibf: &mut InterleavedBloomFilter,
) -> Result<()> {
    let bin = record.first_bin;
    let mut batch = Vec::with_capacity(STREAM_BATCH);
    let mut fill_in_source = Duration::ZERO;
    let in_source = stream_fingerprints(data, record, &mut |value| {
        batch.push(value);
        if batch.len() == STREAM_BATCH {
            fill_in_source += emplace_batch(&mut batch, bin, ibf);
        }
    })?;
    let fill_after = emplace_batch(&mut batch, bin, ibf);

    data.timers.user_bin_io.add(in_source.saturating_sub(fill_in_source));
    data.timers.fill_ibf.add(fill_in_source + fill_after);
    Ok(())
}

fn emplace_batch(
    batch: &mut Vec<Fingerprint>,
    bin: usize,
    ibf: &mut InterleavedBloomFilter,
) -> Duration {
    let start = Instant::now();
    for &value in batch.iter() {
        ibf.emplace(value, bin);
    }
    batch.clear();
    start.elapsed()
}

/// Single-bin insertion through a stripe writer, used while siblings are
/// filling other stripes of the same filter.
pub(crate) fn insert_into_stripe(
    fingerprints: &FingerprintSet,
    bin: usize,
    stripe: &mut BinStripe<'_>,
    data: &BuildData<'_>,
) {
    let start = Instant::now();
    for &value in fingerprints {
        stripe.emplace(value, bin);
    }
    data.timers.fill_ibf.add(start.elapsed());
}

/// Union `fingerprints` into the accumulator the parent will see.
///
/// An empty parent simply takes over the set, leaving `fingerprints` empty.
pub(crate) fn update_parent_fingerprints(
    parent: &mut FingerprintSet,
    fingerprints: &mut FingerprintSet,
    data: &BuildData<'_>,
) {
    let start = Instant::now();
    if parent.is_empty() {
        std::mem::swap(parent, fingerprints);
    } else {
        parent.extend(fingerprints.iter().copied());
    }
    data.timers.merge_fingerprints.add(start.elapsed());
}

/// Point every bin of `record` at its user bin.
pub(crate) fn update_user_bins(links: &mut [Option<UserBinIndex>], record: &UserBinRecord) {
    links[record.first_bin..record.first_bin + record.bin_count].fill(Some(record.user_bin));
}
