use rustc_hash::FxHashSet;

/// A k-mer (or minimiser) hash: the unit of set membership.
pub type Fingerprint = u64;

/// Accumulator for the fingerprints of one user bin or one whole subtree.
///
/// Fingerprints are already well-mixed hashes, so the cheap Fx hasher is
/// enough here.
pub type FingerprintSet = FxHashSet<Fingerprint>;

/// Index of a filter inside the finished HIBF. The root always gets 0.
pub type SlotPosition = usize;

/// Index of a user bin (dataset) as handed to the fingerprint source.
pub type UserBinIndex = usize;
