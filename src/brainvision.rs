//! BrainVision triplet writer (`.vhdr` / `.vmrk` / `.eeg`).
//!
//! The target encoding for the converted recording: an INI-style text header,
//! a marker file, and multiplexed IEEE float-32 little-endian samples in
//! microvolts.  Stimulus events are written as `Stimulus` markers (and to
//! `events.tsv` by the caller); the trigger channel itself is not part of the
//! data file.
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use ndarray::ArrayView2;

use crate::events::{label_for, StimEvent};

const VOLT_TO_MICROVOLT: f64 = 1e6;

/// Write the full triplet next to `vhdr_path` (same stem, `.vmrk`/`.eeg`).
///
/// * `data` — `[n_chan, n_times]` in volts, one row per entry of `ch_names`.
/// * `events` / `event_id` — markers for the `.vmrk` file; pass an empty
///   slice when the recording has no stimulus channel.
pub fn write_brainvision(
    vhdr_path: &Path,
    ch_names: &[String],
    data: ArrayView2<'_, f64>,
    sfreq: f64,
    meas_date: Option<DateTime<FixedOffset>>,
    events: &[StimEvent],
    event_id: &BTreeMap<String, i64>,
) -> Result<()> {
    if ch_names.len() != data.nrows() {
        bail!(
            "{} channel names for {} data rows",
            ch_names.len(),
            data.nrows()
        );
    }
    if sfreq <= 0.0 {
        bail!("non-positive sampling rate {sfreq}");
    }
    let eeg_path = vhdr_path.with_extension("eeg");
    let vmrk_path = vhdr_path.with_extension("vmrk");
    if let Some(parent) = vhdr_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }

    write_vhdr(vhdr_path, &eeg_path, &vmrk_path, ch_names, sfreq)?;
    write_vmrk(&vmrk_path, &eeg_path, meas_date, events, event_id)?;
    write_eeg(&eeg_path, data)?;
    Ok(())
}

fn base_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("non-UTF-8 file name {}", path.display()))
}

fn write_vhdr(
    path: &Path,
    eeg_path: &Path,
    vmrk_path: &Path,
    ch_names: &[String],
    sfreq: f64,
) -> Result<()> {
    let mut header = String::new();
    let _ = writeln!(header, "Brain Vision Data Exchange Header File Version 1.0");
    let _ = writeln!(header, "; Written by egi2bids");
    let _ = writeln!(header);
    let _ = writeln!(header, "[Common Infos]");
    let _ = writeln!(header, "Codepage=UTF-8");
    let _ = writeln!(header, "DataFile={}", base_name(eeg_path)?);
    let _ = writeln!(header, "MarkerFile={}", base_name(vmrk_path)?);
    let _ = writeln!(header, "DataFormat=BINARY");
    let _ = writeln!(header, "DataOrientation=MULTIPLEXED");
    let _ = writeln!(header, "NumberOfChannels={}", ch_names.len());
    // Sampling interval in microseconds.
    let _ = writeln!(header, "SamplingInterval={}", 1e6 / sfreq);
    let _ = writeln!(header);
    let _ = writeln!(header, "[Binary Infos]");
    let _ = writeln!(header, "BinaryFormat=IEEE_FLOAT_32");
    let _ = writeln!(header);
    let _ = writeln!(header, "[Channel Infos]");
    let _ = writeln!(header, "; Ch<nr>=<name>,<ref>,<resolution>,<unit>");
    for (i, name) in ch_names.iter().enumerate() {
        // Commas in names must be escaped per the exchange format.
        let escaped = name.replace(',', "\\,");
        let _ = writeln!(header, "Ch{}={escaped},,1,\u{b5}V", i + 1);
    }
    let _ = writeln!(header);
    let _ = writeln!(header, "[Comment]");
    let _ = writeln!(header, "Sampling Rate [Hz]: {sfreq}");
    std::fs::write(path, header).with_context(|| format!("write {}", path.display()))
}

fn write_vmrk(
    path: &Path,
    eeg_path: &Path,
    meas_date: Option<DateTime<FixedOffset>>,
    events: &[StimEvent],
    event_id: &BTreeMap<String, i64>,
) -> Result<()> {
    let mut out = String::new();
    let _ = writeln!(out, "Brain Vision Data Exchange Marker File, Version 1.0");
    let _ = writeln!(out);
    let _ = writeln!(out, "[Common Infos]");
    let _ = writeln!(out, "Codepage=UTF-8");
    let _ = writeln!(out, "DataFile={}", base_name(eeg_path)?);
    let _ = writeln!(out);
    let _ = writeln!(out, "[Marker Infos]");
    let _ = writeln!(
        out,
        "; Mk<nr>=<type>,<description>,<position>,<points>,<channel>"
    );
    // Marker positions are 1-based sample indices.
    let date = meas_date
        .map(|d| d.format("%Y%m%d%H%M%S%6f").to_string())
        .unwrap_or_else(|| "0".repeat(20));
    let _ = writeln!(out, "Mk1=New Segment,,1,1,0,{date}");
    for (i, event) in events.iter().enumerate() {
        let _ = writeln!(
            out,
            "Mk{}=Stimulus,{},{},{},0",
            i + 2,
            label_for(event_id, event.code),
            event.sample + 1,
            event.duration.max(1)
        );
    }
    std::fs::write(path, out).with_context(|| format!("write {}", path.display()))
}

/// Multiplexed float-32 LE samples: `t0c0 t0c1 … t0cN t1c0 …`, microvolts.
fn write_eeg(path: &Path, data: ArrayView2<'_, f64>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for t in 0..data.ncols() {
        for c in 0..data.nrows() {
            let uv = (data[[c, t]] * VOLT_TO_MICROVOLT) as f32;
            w.write_all(&uv.to_le_bytes())?;
        }
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn triplet_is_written_and_consistent() {
        let tmp = tempfile::tempdir().unwrap();
        let vhdr = tmp.path().join("sub-01_task-t_eeg.vhdr");
        let ch_names = vec!["Fp1".to_string(), "Cz".to_string()];
        let data = Array2::from_shape_fn((2, 5), |(c, t)| (c + t) as f64 * 1e-6);

        let events = vec![StimEvent { sample: 2, duration: 1, prev: 0, code: 1 }];
        let mut event_id = BTreeMap::new();
        event_id.insert("Unknown_1".to_string(), 1_i64);

        write_brainvision(&vhdr, &ch_names, data.view(), 250.0, None, &events, &event_id)
            .unwrap();

        let header = std::fs::read_to_string(&vhdr).unwrap();
        assert!(header.contains("NumberOfChannels=2"));
        assert!(header.contains("SamplingInterval=4000"));
        assert!(header.contains("Ch1=Fp1,,1,\u{b5}V"));
        assert!(header.contains("DataFile=sub-01_task-t_eeg.eeg"));

        let markers =
            std::fs::read_to_string(tmp.path().join("sub-01_task-t_eeg.vmrk")).unwrap();
        assert!(markers.contains("Mk1=New Segment"));
        assert!(markers.contains("Mk2=Stimulus,Unknown_1,3,1,0"));

        let bytes = std::fs::read(tmp.path().join("sub-01_task-t_eeg.eeg")).unwrap();
        assert_eq!(bytes.len(), 2 * 5 * 4);
        // First stored sample: channel 0 at t=0, in microvolts.
        let first = f32::from_le_bytes(bytes[..4].try_into().unwrap());
        approx::assert_abs_diff_eq!(first, 0.0, epsilon = 1e-6);
        // Channel 1 at t=0 is 1 µV.
        let second = f32::from_le_bytes(bytes[4..8].try_into().unwrap());
        approx::assert_abs_diff_eq!(second, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn channel_count_mismatch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let vhdr = tmp.path().join("x.vhdr");
        let data = Array2::<f64>::zeros((2, 4));
        let err = write_brainvision(
            &vhdr,
            &["only-one".to_string()],
            data.view(),
            250.0,
            None,
            &[],
            &BTreeMap::new(),
        );
        assert!(err.is_err());
    }
}
