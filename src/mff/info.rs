//! Bundle metadata: `info.xml` and `sensorLayout.xml`.
//!
//! Only the fields the conversion needs are read (record time, MFF version,
//! sensor labels); amplifier calibration blocks, montage geometry and the
//! rest of the bundle XML are intentionally ignored.
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use quick_xml::events::Event;
use quick_xml::Reader;

// ── info.xml ──────────────────────────────────────────────────────────────

/// Recording-level metadata from `info.xml`.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// MFF container version.
    pub version:     Option<i32>,
    /// Acquisition start, with the amplifier's UTC offset.
    pub record_time: Option<DateTime<FixedOffset>>,
}

/// Parse `info.xml`.
pub fn read_file_info(path: &Path) -> Result<FileInfo> {
    let mut version = None;
    let mut record_time = None;

    for (tag, text) in leaf_texts(path)? {
        match tag.as_str() {
            "mffVersion" | "version" => {
                version = Some(
                    text.trim()
                        .parse::<i32>()
                        .with_context(|| format!("bad MFF version '{text}'"))?,
                );
            }
            "recordTime" => {
                record_time = Some(
                    DateTime::parse_from_rfc3339(text.trim())
                        .with_context(|| format!("bad recordTime '{text}'"))?,
                );
            }
            _ => {}
        }
    }
    Ok(FileInfo { version, record_time })
}

// ── sensorLayout.xml ──────────────────────────────────────────────────────

/// One `<sensor>` entry from the layout file.
#[derive(Debug, Clone)]
pub struct Sensor {
    pub name:   Option<String>,
    pub number: u32,
    /// 0 = scalp electrode, 1 = reference, 2 = auxiliary (skipped).
    pub kind:   u32,
}

impl Sensor {
    /// Channel label: the sensor's own name, or its number as a string —
    /// the positional form the rename table expects.
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => self.number.to_string(),
        }
    }

    /// Scalp and reference sensors carry signal data; auxiliaries do not.
    pub fn is_data_channel(&self) -> bool {
        self.kind <= 1
    }
}

/// Parse `sensorLayout.xml` into its sensor list, in file order.
pub fn read_sensor_layout(path: &Path) -> Result<Vec<Sensor>> {
    let mut reader = xml_reader(path)?;
    let mut buf = Vec::new();

    let mut sensors = Vec::new();
    let mut in_sensor = false;
    let mut current_tag = String::new();
    let mut name: Option<String> = None;
    let mut number: Option<u32> = None;
    let mut kind: Option<u32> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .with_context(|| format!("parse {}", path.display()))?
        {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if tag == "sensor" {
                    in_sensor = true;
                    name = None;
                    number = None;
                    kind = None;
                } else if in_sensor {
                    current_tag = tag;
                }
            }
            Event::Text(t) if in_sensor => {
                let text = t.unescape()?.trim().to_string();
                match current_tag.as_str() {
                    "name" if !text.is_empty() => name = Some(text),
                    "number" => number = Some(text.parse().context("bad sensor number")?),
                    "type" => kind = Some(text.parse().context("bad sensor type")?),
                    _ => {}
                }
            }
            Event::End(e) => {
                let tag = e.local_name();
                if tag.as_ref() == b"sensor" {
                    let number = number.context("sensor without a <number>")?;
                    sensors.push(Sensor {
                        name: name.take(),
                        number,
                        kind: kind.unwrap_or(0),
                    });
                    in_sensor = false;
                } else if in_sensor {
                    current_tag.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if sensors.is_empty() {
        bail!("no <sensor> entries in {}", path.display());
    }
    Ok(sensors)
}

// ── Shared helpers ────────────────────────────────────────────────────────

pub(crate) fn xml_reader(path: &Path) -> Result<Reader<std::io::BufReader<std::fs::File>>> {
    let reader =
        Reader::from_file(path).with_context(|| format!("open {}", path.display()))?;
    Ok(reader)
}

/// Flatten a small XML document into `(leaf tag, text)` pairs.
pub(crate) fn leaf_texts(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = xml_reader(path)?;
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut current = String::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .with_context(|| format!("parse {}", path.display()))?
        {
            Event::Start(e) => {
                current = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
            }
            Event::Text(t) => {
                let text = t.unescape()?.trim().to_string();
                if !current.is_empty() && !text.is_empty() {
                    out.push((current.clone(), text));
                }
            }
            Event::End(_) => current.clear(),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
