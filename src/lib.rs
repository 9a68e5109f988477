//! # Hierarchical Interleaved Bloom Filter
//!
//! Approximate membership queries over thousands of k-mer sets at once
//! ("which datasets probably contain this k-mer?").
//!
//! ## Core idea
//! An Interleaved Bloom Filter (IBF) packs one Bloom filter per dataset
//! side by side, but every bin must be as large as the largest dataset.
//! The HIBF fixes this by merging many small datasets into one bin of a
//! top-level IBF and indexing them again, individually, in a lower-level
//! IBF. Very large datasets are split across several bins instead.
//!
//! This crate turns a precomputed layout (which dataset goes where) into
//! the populated hierarchy.

pub mod bloom;
pub mod build;
pub mod config;
pub mod error;
pub mod hibf;
pub mod layout;
pub mod source;
pub mod types;

// Public re-exports for the top-level API
pub use bloom::InterleavedBloomFilter;
pub use build::{BuildStats, build, build_with_stats};
pub use config::{Config, FingerprintSource, Options};
pub use error::{Error, Result};
pub use hibf::HierarchicalInterleavedBloomFilter;
pub use layout::Layout;
