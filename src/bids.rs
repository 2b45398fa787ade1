//! BIDS output layout: entity-based paths and the metadata files that
//! accompany the recording.
//!
//! Only the pieces this converter emits are modelled — EEG datatype paths,
//! the EEG JSON sidecar, `dataset_description.json`, `channels.tsv`,
//! `events.tsv` and the `sourcedata/` mirror.  Schema validation is out of
//! scope; run the official BIDS validator on the output tree for that.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// BIDS specification version written to `dataset_description.json`.
pub const BIDS_VERSION: &str = "1.8.0";

// ── Path descriptor ───────────────────────────────────────────────────────

/// A BIDS path: root + entities, resolving to one file in the tree.
///
/// Mirrors the subset of `BIDSPath` the converter uses.  Entity order in the
/// basename is fixed: `sub`, `ses`, `task`, `run`.
#[derive(Debug, Clone)]
pub struct BidsPath {
    pub root:      PathBuf,
    pub subject:   String,
    pub session:   String,
    pub task:      String,
    pub run:       Option<u32>,
    pub datatype:  String,
    pub suffix:    String,
    pub extension: String,
}

impl BidsPath {
    /// EEG path under `root`.
    ///
    /// # Errors
    ///
    /// Entity labels must be non-empty and alphanumeric (BIDS forbids the
    /// entity separators `-` and `_` inside labels).
    pub fn new(
        root: &Path,
        subject: &str,
        session: &str,
        task: &str,
        run: Option<u32>,
    ) -> Result<Self> {
        for (entity, label) in [("subject", subject), ("session", session), ("task", task)] {
            if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric()) {
                bail!("invalid {entity} label '{label}': must be non-empty alphanumeric");
            }
        }
        Ok(BidsPath {
            root:      root.to_path_buf(),
            subject:   subject.to_string(),
            session:   session.to_string(),
            task:      task.to_string(),
            run,
            datatype:  "eeg".to_string(),
            suffix:    "eeg".to_string(),
            extension: ".vhdr".to_string(),
        })
    }

    /// Copy with a different extension (the `BIDSPath.copy().update()` idiom).
    pub fn with_extension(&self, extension: &str) -> Self {
        let mut p = self.clone();
        p.extension = extension.to_string();
        p
    }

    /// Copy with a different suffix and extension (`channels.tsv`,
    /// `events.tsv`, …).
    pub fn with_suffix(&self, suffix: &str, extension: &str) -> Self {
        let mut p = self.clone();
        p.suffix = suffix.to_string();
        p.extension = extension.to_string();
        p
    }

    /// Copy re-rooted elsewhere (used for the `sourcedata/` mirror).
    pub fn with_root(&self, root: &Path) -> Self {
        let mut p = self.clone();
        p.root = root.to_path_buf();
        p
    }

    /// `sub-<x>_ses-<y>_task-<z>[_run-<nn>]_<suffix><ext>`.
    pub fn basename(&self) -> String {
        let mut name = format!(
            "sub-{}_ses-{}_task-{}",
            self.subject, self.session, self.task
        );
        if let Some(run) = self.run {
            name.push_str(&format!("_run-{run:02}"));
        }
        name.push_str(&format!("_{}{}", self.suffix, self.extension));
        name
    }

    /// `root/sub-<x>/ses-<y>/<datatype>/`.
    pub fn directory(&self) -> PathBuf {
        self.root
            .join(format!("sub-{}", self.subject))
            .join(format!("ses-{}", self.session))
            .join(&self.datatype)
    }

    /// Full path of the file this descriptor names.
    pub fn fpath(&self) -> PathBuf {
        self.directory().join(self.basename())
    }
}

// ── EEG sidecar ───────────────────────────────────────────────────────────

/// Recording-derived fields of the EEG JSON sidecar.
///
/// Fixed acquisition-site fields are merged in afterwards via
/// [`update_sidecar_json`], mirroring the write-then-update flow of
/// `write_raw_bids` + `update_sidecar_json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EegSidecar {
    pub task_name:             String,
    pub sampling_frequency:    f64,
    #[serde(rename = "PowerLineFrequency")]
    pub power_line_frequency:  Option<f64>,
    #[serde(rename = "EEGChannelCount")]
    pub eeg_channel_count:     usize,
    pub trigger_channel_count: usize,
    pub recording_duration:    f64,
    pub recording_type:        String,
}

/// Fixed acquisition metadata merged into every sidecar.
pub fn fixed_sidecar_fields() -> serde_json::Map<String, serde_json::Value> {
    let value = serde_json::json!({
        "Manufacturer": "EGI",
        "EEGReference": "Cz",
        "InstitutionName": "Fondation Campus Biotech Geneva",
        "InstitutionalDepartmentName":
            "Human Neuroscience Platform - MEEG-BCI Facility",
        "DeviceSerialNumber": "HNP_GES400",
        "CapManufacturer": "EGI",
        "CapManufacturersModelName": "HydroCel GSN 256",
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("json! object literal"),
    }
}

/// Serialize `value` as pretty JSON at `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("write {}", path.display()))
}

/// Merge `fields` into the JSON object at `path`, read-modify-write.
pub fn update_sidecar_json(
    path: &Path,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read sidecar {}", path.display()))?;
    let mut sidecar: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&text)
            .with_context(|| format!("parse sidecar {}", path.display()))?;
    for (key, value) in fields {
        sidecar.insert(key.clone(), value.clone());
    }
    write_json(path, &sidecar)
}

// ── Dataset description ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetDescription {
    pub name:         String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    pub dataset_type: String,
}

/// Write `dataset_description.json` at `root` unless one already exists.
pub fn make_dataset_description(root: &Path, name: &str, dataset_type: &str) -> Result<()> {
    let path = root.join("dataset_description.json");
    if path.exists() {
        return Ok(());
    }
    write_json(
        &path,
        &DatasetDescription {
            name:         name.to_string(),
            bids_version: BIDS_VERSION.to_string(),
            dataset_type: dataset_type.to_string(),
        },
    )
}

// ── TSV writers ───────────────────────────────────────────────────────────

/// Write `channels.tsv`: one row per written channel, EEG first.
pub fn write_channels_tsv(
    path: &Path,
    ch_names: &[String],
    sfreq: f64,
) -> Result<()> {
    let mut out = String::from("name\ttype\tunits\tsampling_frequency\tstatus\n");
    for name in ch_names {
        out.push_str(&format!("{name}\tEEG\t\u{b5}V\t{sfreq}\tgood\n"));
    }
    std::fs::write(path, out).with_context(|| format!("write {}", path.display()))
}

/// Write `events.tsv`: onset/duration in seconds, `trial_type` from the
/// event-id map, plus the raw integer value and sample index.
pub fn write_events_tsv(
    path: &Path,
    events: &[crate::events::StimEvent],
    event_id: &BTreeMap<String, i64>,
    sfreq: f64,
) -> Result<()> {
    let mut out = String::from("onset\tduration\ttrial_type\tvalue\tsample\n");
    for event in events {
        let onset = event.sample as f64 / sfreq;
        let duration = event.duration as f64 / sfreq;
        let trial_type = crate::events::label_for(event_id, event.code);
        out.push_str(&format!(
            "{onset}\t{duration}\t{trial_type}\t{}\t{}\n",
            event.code, event.sample
        ));
    }
    std::fs::write(path, out).with_context(|| format!("write {}", path.display()))
}

// ── sourcedata mirror ─────────────────────────────────────────────────────

/// Copy `source` (file or directory) to `dest`, recursively.
///
/// `overwrite` permits merging into an existing destination; without it the
/// caller must have checked for collisions already.
pub fn copy_source_tree(source: &Path, dest: &Path, overwrite: bool) -> Result<()> {
    if dest.exists() && !overwrite {
        bail!(
            "cannot write source data: {} already exists but overwrite is false",
            dest.display()
        );
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    info!("copying source data to {}", dest.display());
    copy_recursive(source, dest)
}

fn copy_recursive(source: &Path, dest: &Path) -> Result<()> {
    if source.is_dir() {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("create {}", dest.display()))?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(source, dest).with_context(|| {
            format!("copy {} to {}", source.display(), dest.display())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_entity_order() {
        let p = BidsPath::new(Path::new("/data"), "01", "preop", "rest", None).unwrap();
        assert_eq!(p.basename(), "sub-01_ses-preop_task-rest_eeg.vhdr");
        assert_eq!(
            p.fpath(),
            Path::new("/data/sub-01/ses-preop/eeg/sub-01_ses-preop_task-rest_eeg.vhdr")
        );
    }

    #[test]
    fn run_is_zero_padded() {
        let p = BidsPath::new(Path::new("/data"), "01", "a", "rest", Some(3)).unwrap();
        assert_eq!(p.basename(), "sub-01_ses-a_task-rest_run-03_eeg.vhdr");
    }

    #[test]
    fn invalid_labels_are_rejected() {
        assert!(BidsPath::new(Path::new("/d"), "sub-01", "a", "t", None).is_err());
        assert!(BidsPath::new(Path::new("/d"), "", "a", "t", None).is_err());
        assert!(BidsPath::new(Path::new("/d"), "01", "pre_op", "t", None).is_err());
    }

    #[test]
    fn with_extension_changes_only_extension() {
        let p = BidsPath::new(Path::new("/d"), "01", "a", "t", None).unwrap();
        let json = p.with_extension(".json");
        assert_eq!(json.basename(), "sub-01_ses-a_task-t_eeg.json");
        assert_eq!(p.basename(), "sub-01_ses-a_task-t_eeg.vhdr");
    }

    #[test]
    fn dataset_description_is_not_clobbered() {
        let tmp = tempfile::tempdir().unwrap();
        make_dataset_description(tmp.path(), "first", "raw").unwrap();
        make_dataset_description(tmp.path(), "second", "raw").unwrap();
        let text =
            std::fs::read_to_string(tmp.path().join("dataset_description.json")).unwrap();
        let desc: DatasetDescription = serde_json::from_str(&text).unwrap();
        assert_eq!(desc.name, "first");
        assert_eq!(desc.bids_version, BIDS_VERSION);
    }

    #[test]
    fn sidecar_update_merges_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub-01_task-t_eeg.json");
        write_json(
            &path,
            &EegSidecar {
                task_name:             "t".into(),
                sampling_frequency:    250.0,
                power_line_frequency:  Some(50.0),
                eeg_channel_count:     4,
                trigger_channel_count: 1,
                recording_duration:    10.0,
                recording_type:        "continuous".into(),
            },
        )
        .unwrap();
        update_sidecar_json(&path, &fixed_sidecar_fields()).unwrap();

        let merged: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(merged["Manufacturer"], "EGI");
        assert_eq!(merged["EEGReference"], "Cz");
        assert_eq!(merged["SamplingFrequency"], 250.0);
    }
}
