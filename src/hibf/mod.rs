pub mod serialize;

use crate::bloom::InterleavedBloomFilter;
use crate::types::{SlotPosition, UserBinIndex};

/// The finished index: one interleaved filter per layout node, addressed by
/// slot position, plus two link tables with one entry per technical bin.
///
/// For slot `s` and bin `b` at most one link is set:
/// - `child_link(s, b)`: the slot of the lower-level filter merged into `b`
/// - `user_bin_link(s, b)`: the user bin stored (possibly split) in `b`
///
/// Slot 0 is the top-level filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchicalInterleavedBloomFilter {
    filters: Vec<InterleavedBloomFilter>,
    child_links: Vec<Vec<Option<SlotPosition>>>,
    user_bin_links: Vec<Vec<Option<UserBinIndex>>>,
}

impl HierarchicalInterleavedBloomFilter {
    pub(crate) fn with_capacity(slots: usize) -> Self {
        HierarchicalInterleavedBloomFilter {
            filters: Vec::with_capacity(slots),
            child_links: Vec::with_capacity(slots),
            user_bin_links: Vec::with_capacity(slots),
        }
    }

    pub(crate) fn push(
        &mut self,
        ibf: InterleavedBloomFilter,
        child_links: Vec<Option<SlotPosition>>,
        user_bin_links: Vec<Option<UserBinIndex>>,
    ) {
        debug_assert_eq!(ibf.bin_count(), child_links.len());
        debug_assert_eq!(ibf.bin_count(), user_bin_links.len());
        self.filters.push(ibf);
        self.child_links.push(child_links);
        self.user_bin_links.push(user_bin_links);
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn root(&self) -> SlotPosition {
        0
    }

    pub fn filters(&self) -> &[InterleavedBloomFilter] {
        &self.filters
    }

    pub fn filter(&self, slot: SlotPosition) -> &InterleavedBloomFilter {
        &self.filters[slot]
    }

    /// Child slot per technical bin of `slot`.
    pub fn child_links(&self, slot: SlotPosition) -> &[Option<SlotPosition>] {
        &self.child_links[slot]
    }

    /// User bin per technical bin of `slot`.
    pub fn user_bin_links(&self, slot: SlotPosition) -> &[Option<UserBinIndex>] {
        &self.user_bin_links[slot]
    }

    pub fn child_link(&self, slot: SlotPosition, bin: usize) -> Option<SlotPosition> {
        self.child_links[slot][bin]
    }

    pub fn user_bin_link(&self, slot: SlotPosition, bin: usize) -> Option<UserBinIndex> {
        self.user_bin_links[slot][bin]
    }
}
