//! High-level MFF bundle reader.
//!
//! # Algorithm
//! 1. Locate the bundle directory (`info.xml` beside the caller's path, or
//!    one level down under `Contents/`).
//! 2. Parse `info.xml` for the record time.
//! 3. Decode `signal1.bin` into `[n_chan, n_times]` and the sampling rate.
//! 4. Label channels from `sensorLayout.xml` (positional fallback on
//!    mismatch).
//! 5. Fold `Events_*.xml` tracks into an appended `STI 014` channel.
//!
//! EEG samples are converted from the amplifier's microvolts to volts; the
//! stimulus channel keeps raw integer codes.
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{DateTime, FixedOffset};
use ndarray::Array2;
use tracing::{info, warn};

use super::events::read_event_tracks;
use super::info::{read_file_info, read_sensor_layout};
use super::signal::read_signal_file;
use crate::events::STIM_CHANNEL;

const MICRO: f64 = 1e-6;

/// A loaded MFF recording, fully preloaded.
#[derive(Debug, Clone)]
pub struct RawMff {
    /// Channel labels in raw order; the stimulus channel (if any) is last.
    pub ch_names:  Vec<String>,
    /// `[n_chan, n_times]`; EEG rows in volts, stimulus row in code units.
    pub data:      Array2<f64>,
    /// Sampling rate in Hz.
    pub sfreq:     f64,
    /// Power-line frequency annotation in Hz (set by the converter).
    pub line_freq: Option<f64>,
    /// Acquisition start time.
    pub meas_date: Option<DateTime<FixedOffset>>,
    /// Number of data (non-stimulus) channels.
    pub n_eeg:     usize,
}

impl RawMff {
    /// Total number of time points.
    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Total duration in seconds.
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    /// Raw index of the channel named `name`, if present.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Labels of the data (non-stimulus) channels.
    pub fn eeg_ch_names(&self) -> &[String] {
        &self.ch_names[..self.n_eeg]
    }
}

/// Open an MFF bundle directory and preload its data.
pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<RawMff> {
    let bundle = locate_bundle(path.as_ref())?;
    info!("loading MFF bundle {}", bundle.display());

    let file_info = read_file_info(&bundle.join("info.xml"))?;

    let (mut data, sfreq) = read_signal_file(&bundle.join("signal1.bin"))?;
    data.mapv_inplace(|v| v * MICRO);
    let n_eeg = data.nrows();

    let mut ch_names = channel_labels(&bundle, n_eeg)?;

    // Event tracks → one combined trigger channel appended after the data.
    let events = read_event_tracks(&bundle)?;
    if !events.is_empty() {
        let Some(record_time) = file_info.record_time else {
            bail!("bundle has event tracks but info.xml carries no recordTime");
        };
        let stim =
            super::events::build_stim_channel(&events, record_time, sfreq, data.ncols());
        let mut with_stim = Array2::<f64>::zeros((n_eeg + 1, data.ncols()));
        with_stim
            .slice_mut(ndarray::s![..n_eeg, ..])
            .assign(&data);
        for (t, &v) in stim.iter().enumerate() {
            with_stim[[n_eeg, t]] = v;
        }
        data = with_stim;
        ch_names.push(STIM_CHANNEL.to_string());
        info!("{} events folded into '{STIM_CHANNEL}'", events.len());
    }

    Ok(RawMff {
        ch_names,
        data,
        sfreq,
        line_freq: None,
        meas_date: file_info.record_time,
        n_eeg,
    })
}

/// Accept either the bundle root or a directory whose `Contents/` holds it.
fn locate_bundle(path: &Path) -> Result<PathBuf> {
    if path.join("info.xml").is_file() {
        return Ok(path.to_path_buf());
    }
    let contents = path.join("Contents");
    if contents.join("info.xml").is_file() {
        return Ok(contents);
    }
    bail!(
        "{} is not an MFF bundle (no info.xml at the root or under Contents/)",
        path.display()
    );
}

/// Channel labels from `sensorLayout.xml`, falling back to "1".."n".
fn channel_labels(bundle: &Path, n_chan: usize) -> Result<Vec<String>> {
    let layout_path = bundle.join("sensorLayout.xml");
    if layout_path.is_file() {
        let labels: Vec<String> = read_sensor_layout(&layout_path)?
            .iter()
            .filter(|s| s.is_data_channel())
            .map(|s| s.label())
            .collect();
        if labels.len() == n_chan {
            return Ok(labels);
        }
        warn!(
            "sensorLayout.xml lists {} data sensors but signal1.bin has {n_chan} \
             channels; falling back to positional labels",
            labels.len()
        );
    }
    Ok((1..=n_chan).map(|i| i.to_string()).collect())
}
