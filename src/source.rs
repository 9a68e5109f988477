use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::FingerprintSource;
use crate::error::Result;
use crate::types::Fingerprint;

/// Fingerprint source backed by one text file per user bin.
///
/// User bin `i` reads `paths[i]`, which holds whitespace-separated decimal
/// fingerprints. Unknown indices and unparsable tokens are IO errors so
/// that the build aborts instead of indexing a partial set.
pub fn file_source(paths: Vec<PathBuf>) -> FingerprintSource {
    Arc::new(move |user_bin: usize, sink: &mut dyn FnMut(Fingerprint)| {
        let path = paths.get(user_bin).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no fingerprint file for user bin {user_bin}"),
            )
        })?;
        read_fingerprints(path, sink)
    })
}

/// Read a dataset list: one fingerprint file path per non-empty line.
/// Relative paths are resolved against the list's directory.
pub fn read_dataset_list(list: &Path) -> Result<Vec<PathBuf>> {
    let contents = fs::read_to_string(list)?;
    let base = list.parent().unwrap_or_else(|| Path::new(""));
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| base.join(line))
        .collect())
}

fn read_fingerprints(path: &Path, sink: &mut dyn FnMut(Fingerprint)) -> io::Result<()> {
    let contents = fs::read_to_string(path)?;
    for token in contents.split_ascii_whitespace() {
        let value = token.parse::<Fingerprint>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: bad fingerprint {token:?}: {e}", path.display()),
            )
        })?;
        sink(value);
    }
    Ok(())
}
