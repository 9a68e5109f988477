pub mod parser;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;

/// Assignment of user bins to a tree of interleaved filters, as produced by
/// the partitioning stage.
///
/// Technical bins are addressed by their path from the top-level filter:
/// `[2, 5]` is bin 5 of the lower-level filter that lives in bin 2 of the
/// top-level filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Fullest technical bin of the top-level filter.
    pub top_level_max_bin_id: usize,
    /// One entry per merged bin, i.e. per lower-level filter.
    pub max_bins: Vec<MaxBin>,
    /// One entry per user bin.
    pub user_bins: Vec<UserBin>,
}

/// A merged bin: a technical bin whose content is a whole lower-level filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxBin {
    /// Path of the merged bin from the top-level filter (never empty).
    pub previous_tb_indices: Vec<usize>,
    /// Fullest technical bin of the lower-level filter.
    pub id: usize,
}

/// Placement of one user bin (dataset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBin {
    /// Path of merged bins leading to the filter that stores this user bin.
    /// Empty for user bins stored in the top-level filter.
    pub previous_tb_indices: Vec<usize>,
    /// First technical bin inside that filter.
    pub storage_tb_id: usize,
    /// Number of contiguous technical bins the user bin is split across.
    pub number_of_technical_bins: usize,
    /// User bin index handed to the fingerprint source.
    pub idx: usize,
}

impl Layout {
    /// Read and parse a layout file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        parser::parse_layout(BufReader::new(file))
    }
}
