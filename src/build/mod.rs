//! Turning a layout into a populated hierarchy of interleaved filters.
//!
//! The tree is built depth-first. Every node's filter is sized by its
//! fullest bin, so the max bin is resolved first; fingerprints then flow
//! upward so that each merged bin of a parent contains the union of its
//! whole subtree.

mod construct;
pub(crate) mod data;
mod extract;
mod hierarchical;
mod insert;
pub mod tree;

use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::hibf::HierarchicalInterleavedBloomFilter;
use crate::layout::Layout;

pub use data::BuildStats;
pub use tree::{BuildTree, NodeData, NodeId, UserBinRecord};

/// Build the HIBF described by `layout`.
pub fn build(layout: &Layout, config: &Config) -> Result<HierarchicalInterleavedBloomFilter> {
    let (hibf, stats) = build_with_stats(layout, config)?;
    info!(
        "build times: io {:?}, fill {:?}, merge {:?}, alloc {:?}",
        stats.user_bin_io, stats.fill_ibf, stats.merge_fingerprints, stats.index_allocation
    );
    Ok(hibf)
}

/// Like [`build`], also returning per-phase timings.
pub fn build_with_stats(
    layout: &Layout,
    config: &Config,
) -> Result<(HierarchicalInterleavedBloomFilter, BuildStats)> {
    config.options().validate()?;
    let tree = BuildTree::from_layout(layout)?;
    build_from_tree(&tree, config)
}

/// Build from an already validated tree.
pub fn build_from_tree(
    tree: &BuildTree,
    config: &Config,
) -> Result<(HierarchicalInterleavedBloomFilter, BuildStats)> {
    info!(
        "building {} filters for {} user bins with {} thread(s)",
        tree.len(),
        tree.nodes().iter().map(|n| n.remaining_records.len()).sum::<usize>(),
        config.threads()
    );

    let data = data::BuildData::new(config, tree);
    let (root_pos, _) = hierarchical::hierarchical_build(&data, tree.root(), true)?;
    debug_assert_eq!(root_pos, 0);

    let stats = data.stats();
    let hibf = data.into_hibf()?;
    info!("built {} filters", hibf.len());
    Ok((hibf, stats))
}
