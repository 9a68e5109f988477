use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::bloom::InterleavedBloomFilter;
use crate::bloom::sizing::fpr_correction;
use crate::build::tree::BuildTree;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hibf::HierarchicalInterleavedBloomFilter;
use crate::types::{SlotPosition, UserBinIndex};

/// Wall time summed over all workers.
#[derive(Debug, Default)]
pub struct ConcurrentTimer {
    nanos: AtomicU64,
}

impl ConcurrentTimer {
    pub fn add(&self, elapsed: Duration) {
        self.nanos.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Time spent per build phase, summed over all workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Fingerprint source calls.
    pub user_bin_io: Duration,
    /// Filter insertion.
    pub fill_ibf: Duration,
    /// Unions into parent accumulators.
    pub merge_fingerprints: Duration,
    /// Filter allocation.
    pub index_allocation: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct BuildTimers {
    pub user_bin_io: ConcurrentTimer,
    pub fill_ibf: ConcurrentTimer,
    pub merge_fingerprints: ConcurrentTimer,
    pub index_allocation: ConcurrentTimer,
}

impl BuildTimers {
    fn snapshot(&self) -> BuildStats {
        BuildStats {
            user_bin_io: self.user_bin_io.total(),
            fill_ibf: self.fill_ibf.total(),
            merge_fingerprints: self.merge_fingerprints.total(),
            index_allocation: self.index_allocation.total(),
        }
    }
}

/// A finished filter with its per-bin links, waiting to be moved into the
/// output structure.
struct FinishedSlot {
    ibf: InterleavedBloomFilter,
    child_links: Vec<Option<SlotPosition>>,
    user_bin_links: Vec<Option<UserBinIndex>>,
}

/// Shared state of one build invocation.
///
/// Passed by reference through every recursive call. Slot positions are
/// handed out by an atomic counter; each slot is filled exactly once by the
/// worker that owns the node.
pub(crate) struct BuildData<'a> {
    pub config: &'a Config,
    pub tree: &'a BuildTree,
    /// Size multiplier per split count.
    pub fpr_correction: Vec<f64>,
    pub timers: BuildTimers,
    next_slot: AtomicUsize,
    slots: Vec<Mutex<Option<FinishedSlot>>>,
}

impl<'a> BuildData<'a> {
    pub fn new(config: &'a Config, tree: &'a BuildTree) -> Self {
        BuildData {
            config,
            tree,
            fpr_correction: fpr_correction(config.fpr(), config.hash_count(), tree.max_split()),
            timers: BuildTimers::default(),
            next_slot: AtomicUsize::new(0),
            slots: (0..tree.len()).map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Reserve the output position of the node whose build starts now.
    pub fn request_slot(&self) -> Result<SlotPosition> {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        if slot >= self.slots.len() {
            return Err(Error::Corruption(format!(
                "slot {slot} requested but the tree has {} nodes",
                self.slots.len()
            )));
        }
        Ok(slot)
    }

    /// Move a finished filter into its slot.
    pub fn store_slot(
        &self,
        slot: SlotPosition,
        ibf: InterleavedBloomFilter,
        child_links: Vec<Option<SlotPosition>>,
        user_bin_links: Vec<Option<UserBinIndex>>,
    ) -> Result<()> {
        let mut entry = self.slots[slot].lock();
        if entry.is_some() {
            return Err(Error::Corruption(format!("slot {slot} written twice")));
        }
        *entry = Some(FinishedSlot {
            ibf,
            child_links,
            user_bin_links,
        });
        Ok(())
    }

    pub fn stats(&self) -> BuildStats {
        self.timers.snapshot()
    }

    /// Assemble the output once every slot is filled.
    pub fn into_hibf(self) -> Result<HierarchicalInterleavedBloomFilter> {
        let mut hibf = HierarchicalInterleavedBloomFilter::with_capacity(self.slots.len());
        for (slot, entry) in self.slots.into_iter().enumerate() {
            let finished = entry
                .into_inner()
                .ok_or_else(|| Error::Corruption(format!("slot {slot} was never built")))?;
            hibf.push(finished.ibf, finished.child_links, finished.user_bin_links);
        }
        Ok(hibf)
    }
}
