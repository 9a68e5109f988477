use std::time::Instant;

use log::debug;

use crate::bloom::InterleavedBloomFilter;
use crate::bloom::sizing::bin_size_in_bits;
use crate::build::data::BuildData;
use crate::build::insert::{insert_into_ibf, update_parent_fingerprints};
use crate::build::tree::NodeData;
use crate::types::FingerprintSet;

/// Allocate the filter of one node and fill its max bin.
///
/// All bins get the size the max bin needs: `fingerprints` spread over
/// `number_of_bins` bins, corrected for the split. Unless this is the root,
/// `fingerprints` are then handed to `parent_fingerprints`.
pub(crate) fn construct_ibf(
    parent_fingerprints: &mut FingerprintSet,
    fingerprints: &mut FingerprintSet,
    number_of_bins: usize,
    node: &NodeData,
    data: &BuildData<'_>,
    is_root: bool,
) -> InterleavedBloomFilter {
    let per_bin = fingerprints.len().div_ceil(number_of_bins);
    let bin_bits = bin_size_in_bits(data.config.fpr(), data.config.hash_count(), per_bin) as f64;
    let bin_size = (bin_bits * data.fpr_correction[number_of_bins]).ceil() as usize;

    let start = Instant::now();
    let mut ibf =
        InterleavedBloomFilter::new(node.technical_bin_count, bin_size, data.config.hash_count());
    data.timers.index_allocation.add(start.elapsed());
    debug!(
        "allocated {} bins of {} bits for {} fingerprints in max bin {}",
        node.technical_bin_count,
        bin_size,
        fingerprints.len(),
        node.max_bin_index
    );

    insert_into_ibf(fingerprints, number_of_bins, node.max_bin_index, &mut ibf, data);
    if !is_root {
        update_parent_fingerprints(parent_fingerprints, fingerprints, data);
    }

    ibf
}
