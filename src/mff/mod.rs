//! Native EGI MFF bundle reader.
//!
//! An MFF recording is a directory ("bundle") of XML metadata plus
//! block-structured binary signal files.  This module reads the subset a
//! BIDS conversion needs; it is not a general MFF library.
//!
//! # Quick start
//! ```no_run
//! use egi2bids::mff::open_raw;
//!
//! let raw = open_raw("data/recording.mff").unwrap();
//! println!("{} channels @ {} Hz", raw.ch_names.len(), raw.sfreq);
//! ```
pub mod events;
pub mod info;
pub mod raw;
pub mod signal;

// Re-export the most commonly used items.
pub use events::{build_stim_channel, code_ids, read_event_track, read_event_tracks, MffEvent};
pub use info::{read_file_info, read_sensor_layout, FileInfo, Sensor};
pub use raw::{open_raw, RawMff};
pub use signal::{read_signal_file, write_signal_file};
