//! Parser for the textual layout format.
//!
//! ```text
//! ##CONFIG ...                        (any "##" line, skipped)
//! #HIGH_LEVEL_IBF max_bin_id:0
//! #MERGED_BIN_2 max_bin_id:1
//! #MERGED_BIN_2;1 max_bin_id:0
//! #FILES	BIN_INDICES	NUMBER_OF_BINS
//! 0	0	2
//! 1	2;0	1;3
//! 2	2;1;0	1;1;1
//! ```
//!
//! A record lists the user bin index, the path of technical bins down to the
//! filter storing it, and how many bins it occupies at every level. Merged
//! levels always occupy exactly one bin.

use std::io::BufRead;

use crate::error::{Error, Result};
use crate::layout::{Layout, MaxBin, UserBin};

const CONFIG_PREFIX: &str = "##";
const HIGH_LEVEL_PREFIX: &str = "#HIGH_LEVEL_IBF ";
const MERGED_BIN_PREFIX: &str = "#MERGED_BIN_";
const MAX_BIN_ID: &str = "max_bin_id:";
const FILES_SENTINEL: &str = "#FILES";

/// Parse a complete layout. Any malformed line is fatal.
pub fn parse_layout<R: BufRead>(reader: R) -> Result<Layout> {
    let mut lines = reader.lines().enumerate();
    let mut next_line = move || -> Result<Option<(usize, String)>> {
        match lines.next() {
            Some((i, line)) => Ok(Some((i + 1, line?))),
            None => Ok(None),
        }
    };

    // High-level header, after any config lines
    let top_level_max_bin_id = loop {
        match next_line()? {
            Some((_, line)) if line.starts_with(CONFIG_PREFIX) => continue,
            Some((n, line)) => break parse_high_level(&line).map_err(|msg| invalid(n, msg))?,
            None => return Err(Error::InvalidLayout("empty layout".into())),
        }
    };

    // Merged bins until the sentinel
    let mut max_bins = Vec::new();
    loop {
        match next_line()? {
            Some((_, line)) if line.starts_with(FILES_SENTINEL) => break,
            Some((n, line)) => max_bins.push(parse_merged_bin(&line).map_err(|msg| invalid(n, msg))?),
            None => {
                return Err(Error::InvalidLayout(format!(
                    "missing {FILES_SENTINEL} line after header"
                )));
            }
        }
    }

    let mut user_bins = Vec::new();
    while let Some((n, line)) = next_line()? {
        if line.trim().is_empty() {
            continue;
        }
        user_bins.push(parse_user_bin(&line).map_err(|msg| invalid(n, msg))?);
    }

    Ok(Layout {
        top_level_max_bin_id,
        max_bins,
        user_bins,
    })
}

fn invalid(line_no: usize, msg: String) -> Error {
    Error::InvalidLayout(format!("line {line_no}: {msg}"))
}

fn parse_high_level(line: &str) -> std::result::Result<usize, String> {
    let rest = line
        .strip_prefix(HIGH_LEVEL_PREFIX)
        .ok_or_else(|| format!("expected {HIGH_LEVEL_PREFIX:?} header, got {line:?}"))?;
    parse_max_bin_id(rest)
}

fn parse_merged_bin(line: &str) -> std::result::Result<MaxBin, String> {
    let rest = line
        .strip_prefix(MERGED_BIN_PREFIX)
        .ok_or_else(|| format!("expected {MERGED_BIN_PREFIX:?} header, got {line:?}"))?;
    let (indices, rest) = rest
        .split_once(' ')
        .ok_or_else(|| format!("missing {MAX_BIN_ID:?} in {line:?}"))?;

    Ok(MaxBin {
        previous_tb_indices: parse_indices(indices)?,
        id: parse_max_bin_id(rest)?,
    })
}

fn parse_max_bin_id(field: &str) -> std::result::Result<usize, String> {
    let value = field
        .trim()
        .strip_prefix(MAX_BIN_ID)
        .ok_or_else(|| format!("expected {MAX_BIN_ID:?}, got {field:?}"))?;
    value
        .parse()
        .map_err(|e| format!("bad max bin id {value:?}: {e}"))
}

fn parse_indices(field: &str) -> std::result::Result<Vec<usize>, String> {
    field
        .split(';')
        .map(|token| {
            token
                .parse::<usize>()
                .map_err(|e| format!("bad bin index {token:?} in {field:?}: {e}"))
        })
        .collect()
}

fn parse_user_bin(line: &str) -> std::result::Result<UserBin, String> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
    let [idx, bins, counts] = fields.as_slice() else {
        return Err(format!("expected 3 tab-separated fields, got {}", fields.len()));
    };

    let idx = idx
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("bad user bin index {idx:?}: {e}"))?;
    let mut bins = parse_indices(bins)?;
    let mut counts = parse_indices(counts)?;

    if bins.len() != counts.len() {
        return Err(format!(
            "{} bin indices but {} bin counts",
            bins.len(),
            counts.len()
        ));
    }
    // split() always yields at least one token, so both are non-empty here
    let storage_tb_id = bins.pop().unwrap_or_default();
    let number_of_technical_bins = counts.pop().unwrap_or_default();
    if number_of_technical_bins == 0 {
        return Err("user bin occupies 0 technical bins".into());
    }
    if let Some(level) = counts.iter().position(|&c| c != 1) {
        return Err(format!(
            "merged level {level} occupies {} bins, expected 1",
            counts[level]
        ));
    }

    Ok(UserBin {
        previous_tb_indices: bins,
        storage_tb_id,
        number_of_technical_bins,
        idx,
    })
}
