//! Conversion configuration.
//!
//! [`ConvertConfig`] holds everything [`crate::convert`] needs beyond the
//! source and destination paths: the BIDS entities naming the recording and
//! the behavioural switches of the original command-line tool.
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration for one MFF → BIDS conversion.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use egi2bids::ConvertConfig;
///
/// let cfg = ConvertConfig {
///     subject: "01".into(),
///     session: "preop".into(),
///     task:    "rest".into(),
///     run:     Some(1),
///     ..ConvertConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// BIDS subject label (`sub-<subject>`), alphanumeric.
    pub subject: String,

    /// BIDS session label (`ses-<session>`), alphanumeric.
    pub session: String,

    /// BIDS task label (`task-<task>`), alphanumeric.
    pub task: String,

    /// Optional run index (`run-<nn>`, zero-padded to two digits).
    pub run: Option<u32>,

    /// Event-id mapping from symbolic label to integer code.
    ///
    /// When `None` and a stimulus channel is present, a mapping is
    /// synthesized per observed code as `"Unknown_<code>" -> code`.
    /// A supplied mapping is passed through as-is.
    pub event_id: Option<BTreeMap<String, i64>>,

    /// Copy the resolved source bundle into `<root>/sourcedata/`.
    pub save_source: bool,

    /// Permit overwriting existing output, including saved source data.
    ///
    /// With `save_source` and `overwrite = false`, a pre-existing source
    /// destination aborts the conversion before anything is written.
    pub overwrite: bool,

    /// Power-line frequency annotation in Hz.
    ///
    /// Default: `50.0` (European mains).
    pub line_freq: f64,

    /// Directory archives are extracted into.
    ///
    /// `None` creates a scoped temporary directory that is removed on all
    /// exit paths.  Supplying a directory keeps the extracted bundle around
    /// after the conversion.
    pub working_dir: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            subject:     String::new(),
            session:     String::new(),
            task:        String::new(),
            run:         None,
            event_id:    None,
            save_source: false,
            overwrite:   false,
            line_freq:   50.0,
            working_dir: None,
        }
    }
}
