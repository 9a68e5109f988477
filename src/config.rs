use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{Fingerprint, UserBinIndex};

/// Callback that streams the fingerprints of one user bin into a sink.
///
/// Called concurrently from several workers for different user bins, hence
/// `Send + Sync`. Any error aborts the whole build.
pub type FingerprintSource =
    Arc<dyn Fn(UserBinIndex, &mut dyn FnMut(Fingerprint)) -> io::Result<()> + Send + Sync>;

/// Numeric build options, loadable from a TOML file.
///
/// ```toml
/// maximum_false_positive_rate = 0.05
/// number_of_hash_functions = 2
/// threads = 8
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Target false-positive rate of a single user bin, in (0, 1).
    pub maximum_false_positive_rate: f64,
    /// Hash functions per filter.
    pub number_of_hash_functions: usize,
    /// Worker threads used for the top-level fan-out.
    pub threads: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            maximum_false_positive_rate: 0.05,
            number_of_hash_functions: 2,
            threads: 1,
        }
    }
}

impl Options {
    /// Parse options from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let options: Options =
            toml::from_str(contents).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the sizing formulas cannot work with.
    pub fn validate(&self) -> Result<()> {
        let fpr = self.maximum_false_positive_rate;
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "maximum_false_positive_rate must be in (0, 1), got {fpr}"
            )));
        }
        if self.number_of_hash_functions == 0 {
            return Err(Error::InvalidConfig(
                "number_of_hash_functions must be at least 1".into(),
            ));
        }
        if self.threads == 0 {
            return Err(Error::InvalidConfig("threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Everything a build needs besides the layout.
#[derive(Clone)]
pub struct Config {
    options: Options,
    source: FingerprintSource,
}

impl Config {
    /// Validate `options` and pair them with the fingerprint source.
    pub fn new<F>(options: Options, source: F) -> Result<Self>
    where
        F: Fn(UserBinIndex, &mut dyn FnMut(Fingerprint)) -> io::Result<()> + Send + Sync + 'static,
    {
        Self::with_source(options, Arc::new(source))
    }

    /// Like [`Config::new`] for an already shared source.
    pub fn with_source(options: Options, source: FingerprintSource) -> Result<Self> {
        options.validate()?;
        Ok(Config { options, source })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn fpr(&self) -> f64 {
        self.options.maximum_false_positive_rate
    }

    pub fn hash_count(&self) -> usize {
        self.options.number_of_hash_functions
    }

    pub fn threads(&self) -> usize {
        self.options.threads
    }

    pub fn source(&self) -> &FingerprintSource {
        &self.source
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
