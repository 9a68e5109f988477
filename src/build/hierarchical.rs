use log::debug;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::bloom::{BINS_PER_STRIPE, BinStripe, InterleavedBloomFilter};
use crate::build::construct::construct_ibf;
use crate::build::data::BuildData;
use crate::build::extract::extract_fingerprints;
use crate::build::insert::{
    insert_into_ibf, insert_into_stripe, insert_streamed, update_parent_fingerprints,
    update_user_bins,
};
use crate::build::tree::{NodeData, NodeId, UserBinRecord};
use crate::error::{Error, Result};
use crate::types::{FingerprintSet, SlotPosition};

/// Build the filter of `node_id` and, recursively, of everything below it.
///
/// Returns the slot the filter was stored in, together with every
/// fingerprint inserted anywhere in the subtree. The root returns an empty
/// set: nothing above it would consume it.
///
/// Order of work for one node:
/// 1. reserve a slot
/// 2. gather the max bin's fingerprints, either by building the favourite
///    child or by reading the max record
/// 3. size and allocate the filter from the max bin (`construct_ibf`)
/// 4. build the remaining merged children (in parallel at the root only)
/// 5. insert the remaining user bins
/// 6. store the filter and its links
pub(crate) fn hierarchical_build(
    data: &BuildData<'_>,
    node_id: NodeId,
    is_root: bool,
) -> Result<(SlotPosition, FingerprintSet)> {
    let node = data.tree.node(node_id);
    let ibf_pos = data.request_slot()?;

    let mut child_links = vec![None; node.technical_bin_count];
    let mut user_bin_links = vec![None; node.technical_bin_count];
    let mut parent_fingerprints = FingerprintSet::default();

    let (mut fingerprints, max_bin_tbs) = match node.favourite_child {
        Some(favourite) => {
            let (child_pos, child_fingerprints) = hierarchical_build(data, favourite, false)?;
            child_links[node.max_bin_index] = Some(child_pos);
            (child_fingerprints, 1)
        }
        None => {
            let record = max_record(node, node_id)?;
            let mut fingerprints = FingerprintSet::default();
            extract_fingerprints(&mut fingerprints, data, record)?;
            update_user_bins(&mut user_bin_links, record);
            (fingerprints, record.bin_count)
        }
    };

    let mut ibf = construct_ibf(
        &mut parent_fingerprints,
        &mut fingerprints,
        max_bin_tbs,
        node,
        data,
        is_root,
    );
    // Release the max bin before descending into the siblings
    fingerprints = FingerprintSet::default();

    loop_over_children(
        &mut parent_fingerprints,
        &mut ibf,
        &mut child_links,
        node,
        data,
        is_root,
    )?;

    // Without a favourite child the first record is the max bin, already inserted
    let start = if node.favourite_child.is_some() { 0 } else { 1 };
    for record in &node.remaining_records[start..] {
        if is_root && record.bin_count == 1 {
            // Nothing to split and nothing to propagate
            insert_streamed(data, record, &mut ibf)?;
        } else {
            extract_fingerprints(&mut fingerprints, data, record)?;
            insert_into_ibf(&fingerprints, record.bin_count, record.first_bin, &mut ibf, data);
            if !is_root {
                update_parent_fingerprints(&mut parent_fingerprints, &mut fingerprints, data);
            }
        }
        update_user_bins(&mut user_bin_links, record);
        fingerprints.clear();
    }

    debug!(
        "node {node_id} -> slot {ibf_pos}: {} technical bins, {} merged, {} user bins",
        node.technical_bin_count,
        node.children.len(),
        node.remaining_records.len()
    );
    data.store_slot(ibf_pos, ibf, child_links, user_bin_links)?;

    Ok((ibf_pos, parent_fingerprints))
}

/// Write access to one stripe of the node's filter and the matching links.
struct StripeSlot<'a> {
    bins: BinStripe<'a>,
    child_links: &'a mut [Option<SlotPosition>],
}

/// Build every merged child except the favourite one and insert each
/// child's fingerprints into its bin of `ibf`.
///
/// At the root this fans out over a pool of `threads` workers, visiting the
/// children in random order so that workers rarely queue on the same stripe.
/// Below the root everything runs on the calling thread, which keeps the
/// total thread count at `threads` no matter how deep the tree is.
fn loop_over_children(
    parent_fingerprints: &mut FingerprintSet,
    ibf: &mut InterleavedBloomFilter,
    child_links: &mut [Option<SlotPosition>],
    node: &NodeData,
    data: &BuildData<'_>,
    is_root: bool,
) -> Result<()> {
    let mut children: Vec<NodeId> = node
        .children
        .iter()
        .copied()
        .filter(|&child| Some(child) != node.favourite_child)
        .collect();
    if children.is_empty() {
        return Ok(());
    }

    let stripes: Vec<Mutex<StripeSlot<'_>>> = ibf
        .stripes_mut()
        .into_iter()
        .zip(child_links.chunks_mut(BINS_PER_STRIPE))
        .map(|(bins, child_links)| Mutex::new(StripeSlot { bins, child_links }))
        .collect();
    let parent = Mutex::new(parent_fingerprints);

    let worker = |&child: &NodeId| -> Result<()> {
        let (child_pos, mut fingerprints) = hierarchical_build(data, child, false)?;
        let bin = data.tree.node(child).parent_bin_index;

        let mut stripe = stripes[bin / BINS_PER_STRIPE].lock();
        stripe.child_links[bin % BINS_PER_STRIPE] = Some(child_pos);
        insert_into_stripe(&fingerprints, bin, &mut stripe.bins, data);
        if !is_root {
            let mut parent = parent.lock();
            update_parent_fingerprints(&mut **parent, &mut fingerprints, data);
        }
        Ok(())
    };

    let threads = data.config.threads();
    if is_root && threads > 1 {
        children.shuffle(&mut rand::thread_rng());
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        pool.install(|| children.par_iter().try_for_each(worker))
    } else {
        children.iter().try_for_each(worker)
    }
}

fn max_record(node: &NodeData, node_id: NodeId) -> Result<&UserBinRecord> {
    node.remaining_records.first().ok_or_else(|| {
        Error::InvalidLayout(format!("node {node_id} has neither a favourite child nor user bins"))
    })
}
