use std::time::{Duration, Instant};

use log::trace;

use crate::build::data::BuildData;
use crate::build::tree::UserBinRecord;
use crate::error::{Error, Result};
use crate::types::{Fingerprint, FingerprintSet};

/// Add the fingerprints of one user bin to `target`.
///
/// The content is not validated; whatever the source yields is indexed.
pub(crate) fn extract_fingerprints(
    target: &mut FingerprintSet,
    data: &BuildData<'_>,
    record: &UserBinRecord,
) -> Result<()> {
    let elapsed = stream_fingerprints(data, record, &mut |value| {
        target.insert(value);
    })?;
    data.timers.user_bin_io.add(elapsed);
    Ok(())
}

/// Feed the fingerprints of one user bin straight into `sink`.
///
/// Returns the time spent inside the source, sink included. The caller
/// decides which timers it is charged to.
pub(crate) fn stream_fingerprints(
    data: &BuildData<'_>,
    record: &UserBinRecord,
    sink: &mut dyn FnMut(Fingerprint),
) -> Result<Duration> {
    let start = Instant::now();
    (data.config.source())(record.user_bin, sink).map_err(|source| Error::Extraction {
        user_bin: record.user_bin,
        source,
    })?;
    trace!("read user bin {}", record.user_bin);
    Ok(start.elapsed())
}
