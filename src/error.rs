use std::fmt;
use std::io;

/// Unified error type for layout parsing, configuration and index building.
#[derive(Debug)]
pub enum Error {
    /// IO error from layout, fingerprint or index files.
    Io(io::Error),
    /// A serialized index failed its integrity checks, or the build left the
    /// output in an inconsistent state (slot written twice or never).
    Corruption(String),
    /// Options outside their legal range, or an unreadable config file.
    InvalidConfig(String),
    /// Malformed layout text or a layout that violates the tree invariants.
    InvalidLayout(String),
    /// The fingerprint source failed for one user bin. Fatal for the build:
    /// a partial fingerprint set would silently break the FPR guarantee.
    Extraction { user_bin: usize, source: io::Error },
    /// The worker pool could not be created.
    ThreadPool(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Corruption(msg) => write!(f, "Corruption: {msg}"),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {msg}"),
            Error::InvalidLayout(msg) => write!(f, "Invalid layout: {msg}"),
            Error::Extraction { user_bin, source } => {
                write!(f, "Fingerprint extraction failed for user bin {user_bin}: {source}")
            }
            Error::ThreadPool(msg) => write!(f, "Thread pool error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Extraction { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
