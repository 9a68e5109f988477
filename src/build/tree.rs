use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::types::UserBinIndex;

/// Index of a node in the [`BuildTree`] arena.
pub type NodeId = usize;

/// A user bin stored directly in one node's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBinRecord {
    pub user_bin: UserBinIndex,
    /// First technical bin inside the node's filter.
    pub first_bin: usize,
    /// Contiguous technical bins the user bin is split across.
    pub bin_count: usize,
}

/// Everything the builder needs to know about one filter of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub parent: Option<NodeId>,
    /// Lower-level filters, one per merged bin of this node.
    pub children: Vec<NodeId>,
    /// Bin of the parent's filter this whole subtree occupies. 0 for the root.
    pub parent_bin_index: usize,
    /// Fullest technical bin of this node's own filter.
    pub max_bin_index: usize,
    pub technical_bin_count: usize,
    /// Child stored at `max_bin_index`, if the fullest bin is a merged bin.
    pub favourite_child: Option<NodeId>,
    /// User bins stored directly in this node. Without a favourite child the
    /// record at `max_bin_index` comes first.
    pub remaining_records: Vec<UserBinRecord>,
}

impl NodeData {
    fn new(parent: Option<NodeId>, parent_bin_index: usize, max_bin_index: usize) -> Self {
        NodeData {
            parent,
            children: Vec::new(),
            parent_bin_index,
            max_bin_index,
            technical_bin_count: 0,
            favourite_child: None,
            remaining_records: Vec::new(),
        }
    }

    /// Technical bins occupied by direct records and merged children.
    /// Equals `technical_bin_count` for every node of a valid tree.
    pub fn occupied_bins(&self) -> usize {
        self.remaining_records.iter().map(|r| r.bin_count).sum::<usize>() + self.children.len()
    }
}

/// Arena of filter nodes derived from a [`Layout`]. The root is node 0.
///
/// ```text
///                  node 0 (top level, 4 bins)
///          ┌─────────┬────────┴────────┬──────────┐
///        bin 0     bin 1             bin 2      bin 3
///       user bin   node 1            node 2     user bin
///                 (3 bins)          (5 bins)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTree {
    nodes: Vec<NodeData>,
}

impl BuildTree {
    /// Derive and validate the tree.
    ///
    /// Fails on orphan or duplicate merged bins, orphan records, empty
    /// nodes, technical bins that are covered twice or not at all, and
    /// max bins that hold neither a merged bin nor the start of a record.
    pub fn from_layout(layout: &Layout) -> Result<Self> {
        let mut nodes = vec![NodeData::new(None, 0, layout.top_level_max_bin_id)];
        let mut by_path: FxHashMap<&[usize], NodeId> = FxHashMap::default();
        by_path.insert(&[], 0);

        // Parents before children
        let mut max_bins: Vec<_> = layout.max_bins.iter().collect();
        max_bins.sort_by_key(|mb| mb.previous_tb_indices.len());

        for max_bin in max_bins {
            let path = max_bin.previous_tb_indices.as_slice();
            let Some((&bin, parent_path)) = path.split_last() else {
                return Err(Error::InvalidLayout("merged bin with empty path".into()));
            };
            let parent = *by_path.get(parent_path).ok_or_else(|| {
                Error::InvalidLayout(format!("merged bin {path:?} has no parent filter"))
            })?;

            let id = nodes.len();
            if by_path.insert(path, id).is_some() {
                return Err(Error::InvalidLayout(format!("merged bin {path:?} listed twice")));
            }
            nodes.push(NodeData::new(Some(parent), bin, max_bin.id));
            nodes[parent].children.push(id);
        }

        for user_bin in &layout.user_bins {
            let path = user_bin.previous_tb_indices.as_slice();
            let node = *by_path.get(path).ok_or_else(|| {
                Error::InvalidLayout(format!(
                    "user bin {} is stored below unknown merged bin {path:?}",
                    user_bin.idx
                ))
            })?;
            nodes[node].remaining_records.push(UserBinRecord {
                user_bin: user_bin.idx,
                first_bin: user_bin.storage_tb_id,
                bin_count: user_bin.number_of_technical_bins,
            });
        }

        for id in 0..nodes.len() {
            let favourite_child = nodes[id]
                .children
                .iter()
                .copied()
                .find(|&child| nodes[child].parent_bin_index == nodes[id].max_bin_index);
            let parent_bins: Vec<usize> = nodes[id]
                .children
                .iter()
                .map(|&child| nodes[child].parent_bin_index)
                .collect();
            finalize_node(id, &mut nodes[id], favourite_child, &parent_bins)?;
        }

        Ok(BuildTree { nodes })
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[NodeData] {
        &self.nodes
    }

    /// Number of filters the hierarchy will contain.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Largest split of any record, at least 1.
    pub fn max_split(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.remaining_records.iter().map(|r| r.bin_count))
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

/// Size the node, check bin coverage and put the max record first.
///
/// Coverage is checked on the sorted bin ranges, so the cost depends on the
/// number of records and never on the bin indices themselves.
fn finalize_node(
    id: NodeId,
    node: &mut NodeData,
    favourite_child: Option<NodeId>,
    child_bins: &[usize],
) -> Result<()> {
    let overflow = |bin: usize| {
        Error::InvalidLayout(format!("technical bin range at {bin} of node {id} overflows"))
    };
    let mut ranges = Vec::with_capacity(node.remaining_records.len() + child_bins.len());
    for record in &node.remaining_records {
        if record.bin_count == 0 {
            return Err(Error::InvalidLayout(format!(
                "user bin {} of node {id} occupies 0 technical bins",
                record.user_bin
            )));
        }
        let end = record
            .first_bin
            .checked_add(record.bin_count)
            .ok_or_else(|| overflow(record.first_bin))?;
        ranges.push((record.first_bin, end));
    }
    for &bin in child_bins {
        ranges.push((bin, bin.checked_add(1).ok_or_else(|| overflow(bin))?));
    }
    ranges.sort_unstable();

    // Ranges must tile [0, technical_bin_count) without gaps or overlaps
    let mut next = 0;
    for (start, end) in ranges {
        if start < next {
            return Err(Error::InvalidLayout(format!(
                "technical bin {start} of node {id} is assigned twice"
            )));
        }
        if start > next {
            return Err(Error::InvalidLayout(format!(
                "technical bin {next} of node {id} is never assigned"
            )));
        }
        next = end;
    }
    node.technical_bin_count = next;
    if node.technical_bin_count == 0 {
        return Err(Error::InvalidLayout(format!("filter of node {id} is empty")));
    }

    node.favourite_child = favourite_child;
    if favourite_child.is_none() {
        let max_bin = node.max_bin_index;
        let pos = node
            .remaining_records
            .iter()
            .position(|r| r.first_bin == max_bin)
            .ok_or_else(|| {
                Error::InvalidLayout(format!(
                    "max bin {max_bin} of node {id} holds neither a merged bin nor the start of a user bin"
                ))
            })?;
        let record = node.remaining_records.remove(pos);
        node.remaining_records.insert(0, record);
    }

    Ok(())
}
