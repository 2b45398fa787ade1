/// Shared helpers: synthesize a complete MFF bundle on disk.
use std::path::Path;

use ndarray::Array2;

pub const RECORD_TIME: &str = "2023-04-12T09:30:00.000000000+02:00";

/// One synthetic marker: onset in seconds from the record time, duration in
/// nanoseconds, and the event code string.
pub struct SpecEvent {
    pub onset_secs:  f64,
    pub duration_ns: u64,
    pub code:        String,
}

pub struct BundleSpec {
    pub n_chan:  usize,
    pub n_times: usize,
    pub sfreq:   f64,
    pub events:  Vec<SpecEvent>,
}

impl Default for BundleSpec {
    fn default() -> Self {
        Self { n_chan: 4, n_times: 100, sfreq: 100.0, events: vec![] }
    }
}

#[allow(unused)]
pub fn event(onset_secs: f64, duration_ns: u64, code: &str) -> SpecEvent {
    SpecEvent { onset_secs, duration_ns, code: code.to_string() }
}

/// Write `info.xml`, `sensorLayout.xml`, `signal1.bin` and (optionally) an
/// event track into `dir`.
pub fn write_bundle_files(dir: &Path, spec: &BundleSpec) {
    std::fs::create_dir_all(dir).unwrap();

    std::fs::write(
        dir.join("info.xml"),
        format!(
            r#"<?xml version="1.0"?>
<fileInfo xmlns="http://www.egi.com/info_mff">
  <mffVersion>3</mffVersion>
  <recordTime>{RECORD_TIME}</recordTime>
</fileInfo>"#
        ),
    )
    .unwrap();

    let mut sensors = String::new();
    for i in 1..=spec.n_chan {
        sensors.push_str(&format!(
            "    <sensor><name></name><number>{i}</number><type>0</type></sensor>\n"
        ));
    }
    std::fs::write(
        dir.join("sensorLayout.xml"),
        format!(
            r#"<?xml version="1.0"?>
<sensorLayout xmlns="http://www.egi.com/sensorLayout_mff">
  <name>HydroCel GSN 256 1.0</name>
  <sensors>
{sensors}  </sensors>
</sensorLayout>"#
        ),
    )
    .unwrap();

    // Deterministic ramp per channel, in microvolts.
    let data = Array2::from_shape_fn((spec.n_chan, spec.n_times), |(c, t)| {
        (c as f64 + 1.0) * 10.0 + t as f64 * 0.1
    });
    egi2bids::mff::write_signal_file(&dir.join("signal1.bin"), &data, spec.sfreq).unwrap();

    if !spec.events.is_empty() {
        let record = chrono::DateTime::parse_from_rfc3339(RECORD_TIME).unwrap();
        let mut rows = String::new();
        for ev in &spec.events {
            let begin = record
                + chrono::Duration::nanoseconds((ev.onset_secs * 1e9).round() as i64);
            rows.push_str(&format!(
                "  <event>\n    <beginTime>{}</beginTime>\n    <duration>{}</duration>\n    <code>{}</code>\n  </event>\n",
                begin.to_rfc3339_opts(chrono::SecondsFormat::Nanos, false),
                ev.duration_ns,
                ev.code,
            ));
        }
        std::fs::write(
            dir.join("Events_DIN.xml"),
            format!(
                r#"<?xml version="1.0"?>
<eventTrack xmlns="http://www.egi.com/event_mff">
  <name>DIN</name>
{rows}</eventTrack>"#
            ),
        )
        .unwrap();
    }
}

/// A bare `.mff` bundle directory (files at the root).
#[allow(unused)]
pub fn make_bundle(parent: &Path, spec: &BundleSpec) -> std::path::PathBuf {
    let bundle = parent.join("rec.mff");
    write_bundle_files(&bundle, spec);
    bundle
}

/// A bundle in archive shape: files under `rec.mff/Contents/`.
#[allow(unused)]
pub fn make_contents_bundle(parent: &Path, spec: &BundleSpec) -> std::path::PathBuf {
    let bundle = parent.join("rec.mff");
    write_bundle_files(&bundle.join("Contents"), spec);
    bundle
}
