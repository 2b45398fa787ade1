//! # egi2bids — EGI/MFF → BIDS conversion in pure Rust
//!
//! `egi2bids` converts EEG recordings in EGI's MFF format (optionally
//! archived as `.zip` or `.tar`) into a BIDS directory tree: channels are
//! renamed from the amplifier's positional labels to canonical 10-20 names,
//! stimulus events are detected on the trigger channel, and the signal is
//! re-encoded as BrainVision with the JSON/TSV metadata BIDS expects.
//!
//! ## Pipeline overview
//!
//! ```text
//! recording.{mff,tar,zip}
//!   │
//!   ├─ archive::resolve_source()   extract + locate the MFF bundle
//!   ├─ mff::open_raw()             native MFF reader (signal blocks + XML)
//!   ├─ rename::rename_channels()   positional → 10-20 labels (HydroCel 256)
//!   ├─ events::find_events()       trigger-channel transitions
//!   └─ write
//!        ├─ brainvision            sub-…_eeg.{vhdr,vmrk,eeg}
//!        ├─ bids sidecar           sub-…_eeg.json  (fixed acquisition fields)
//!        ├─ bids TSVs              …_channels.tsv, …_events.tsv
//!        ├─ dataset description    dataset_description.json
//!        └─ sourcedata/ (optional) copy of the original bundle
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use egi2bids::{convert, ConvertConfig};
//! use std::path::Path;
//!
//! let cfg = ConvertConfig {
//!     subject: "01".into(),
//!     session: "preop".into(),
//!     task:    "rest".into(),
//!     ..ConvertConfig::default()
//! };
//! let root = convert(Path::new("rec.zip"), Path::new("bids"), &cfg).unwrap();
//! println!("BIDS dataset at {}", root.display());
//! ```
//!
//! Each stage is also exposed as a standalone module for callers that need
//! only part of the pipeline (e.g. reading an MFF bundle without writing).

pub mod archive;
pub mod bids;
pub mod brainvision;
pub mod config;
pub mod events;
pub mod mff;
pub mod rename;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `egi2bids::Foo` without having to know the internal module layout.

// archive
pub use archive::{resolve_source, SUPPORTED_EXTENSIONS};

// bids
pub use bids::{
    copy_source_tree, fixed_sidecar_fields, make_dataset_description,
    update_sidecar_json, write_channels_tsv, write_events_tsv, write_json,
    BidsPath, DatasetDescription, EegSidecar, BIDS_VERSION,
};

// brainvision
pub use brainvision::write_brainvision;

// config
pub use config::ConvertConfig;

// events
pub use events::{auto_event_id, find_events, StimEvent, STIM_CHANNEL};

// mff — bundle reader
pub use mff::{open_raw, RawMff};

// rename
pub use rename::{rename_channels, CH_NAMES_EGI};

/// Convert one MFF recording into a BIDS dataset under `bids_root`.
///
/// This is the main entry point for the `egi2bids` library.  It chains all
/// conversion steps in the order of the module-level pipeline diagram and
/// returns `bids_root` on success.
///
/// # Arguments
///
/// * `source`    – `.mff` bundle directory, or a `.tar`/`.zip` archive of one.
/// * `bids_root` – Destination dataset root; created as needed.
/// * `cfg`       – Entities and switches (see [`ConvertConfig`]).
///
/// # Errors
///
/// Fails without retry or rollback when:
/// * the source extension is unsupported or an archive holds no `Contents`
///   folder ([`resolve_source`]);
/// * the bundle cannot be decoded ([`mff::open_raw`]);
/// * output for this recording already exists and `cfg.overwrite` is false —
///   including pre-existing `sourcedata/`, which is checked *before* any
///   output write.
pub fn convert(source: &Path, bids_root: &Path, cfg: &ConvertConfig) -> Result<PathBuf> {
    info!("processing {}", source.display());

    // Scoped working directory: dropped (and removed) on every exit path.
    let mut tmp_guard: Option<tempfile::TempDir> = None;
    let workdir = match &cfg.working_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create working directory {}", dir.display()))?;
            dir.clone()
        }
        None => {
            let tmp = tempfile::Builder::new()
                .suffix(".mff")
                .tempdir()
                .context("create temporary working directory")?;
            let path = tmp.path().to_path_buf();
            tmp_guard = Some(tmp);
            path
        }
    };

    let mff_source = resolve_source(source, &workdir)?;

    let eeg_path = BidsPath::new(bids_root, &cfg.subject, &cfg.session, &cfg.task, cfg.run)?;
    let json_path = eeg_path.with_extension(".json");

    // Collision checks come before any load or write.
    let source_dest = if cfg.save_source {
        let source_root = bids_root.join("sourcedata");
        let ext = mff_source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mff")
            .to_string();
        let dest = eeg_path.with_root(&source_root).fpath().with_extension(ext);
        if dest.exists() && !cfg.overwrite {
            bail!(
                "cannot write source data: {} already exists but overwrite is false",
                dest.display()
            );
        }
        Some(dest)
    } else {
        None
    };
    let vhdr = eeg_path.fpath();
    if vhdr.exists() && !cfg.overwrite {
        bail!(
            "output {} already exists but overwrite is false",
            vhdr.display()
        );
    }

    // Load, annotate, rename.
    let mut raw = mff::open_raw(&mff_source)?;
    raw.line_freq = Some(cfg.line_freq);
    rename_channels(&mut raw);

    // Stimulus events.  No trigger channel → no events, no mapping.
    let (events, event_id) = match find_events(&raw, STIM_CHANNEL) {
        Some(events) => {
            // TODO: when the caller supplies a mapping, check it covers the
            // observed codes instead of passing it through blindly.
            let event_id = cfg
                .event_id
                .clone()
                .unwrap_or_else(|| auto_event_id(&events));
            (events, event_id)
        }
        None => (Vec::new(), BTreeMap::new()),
    };

    // Re-encode the data channels as BrainVision.
    let eeg_data = raw.data.slice(ndarray::s![..raw.n_eeg, ..]);
    write_brainvision(
        &vhdr,
        raw.eeg_ch_names(),
        eeg_data,
        raw.sfreq,
        raw.meas_date,
        &events,
        &event_id,
    )?;
    info!("wrote {}", vhdr.display());

    // TSVs next to the recording.
    write_channels_tsv(
        &eeg_path.with_suffix("channels", ".tsv").fpath(),
        raw.eeg_ch_names(),
        raw.sfreq,
    )?;
    if !events.is_empty() {
        write_events_tsv(
            &eeg_path.with_suffix("events", ".tsv").fpath(),
            &events,
            &event_id,
            raw.sfreq,
        )?;
    }

    // Sidecar: recording-derived fields, then the fixed acquisition fields.
    write_json(
        &json_path.fpath(),
        &EegSidecar {
            task_name:             cfg.task.clone(),
            sampling_frequency:    raw.sfreq,
            power_line_frequency:  raw.line_freq,
            eeg_channel_count:     raw.n_eeg,
            trigger_channel_count: raw.ch_names.len() - raw.n_eeg,
            recording_duration:    raw.duration_secs(),
            recording_type:        "continuous".to_string(),
        },
    )?;
    update_sidecar_json(&json_path.fpath(), &fixed_sidecar_fields())?;

    let dataset_name = bids_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset");
    make_dataset_description(bids_root, dataset_name, "raw")?;

    if let Some(dest) = source_dest {
        copy_source_tree(&mff_source, &dest, cfg.overwrite)?;
    }

    drop(tmp_guard);
    Ok(bids_root.to_path_buf())
}
