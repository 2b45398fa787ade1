//! Event tracks: `Events_*.xml` → a synthesized stimulus channel.
//!
//! MFF stores markers as XML event tracks with absolute begin times.  BIDS
//! and the downstream transition scan both want a sample-aligned integer
//! trigger channel, so the tracks are folded into one extra channel
//! (`STI 014`) holding each event's integer code for its duration.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use quick_xml::events::Event;
use tracing::{debug, warn};

use super::info::xml_reader;

/// One marker from an event track.
#[derive(Debug, Clone)]
pub struct MffEvent {
    /// Absolute onset time.
    pub begin:       DateTime<FixedOffset>,
    /// Duration in nanoseconds (MFF's native unit).
    pub duration_ns: u64,
    /// Symbolic code, e.g. `DIN1`.
    pub code:        String,
}

/// Parse a single `Events_*.xml` track.
pub fn read_event_track(path: &Path) -> Result<Vec<MffEvent>> {
    let mut reader = xml_reader(path)?;
    let mut buf = Vec::new();

    let mut events = Vec::new();
    let mut in_event = false;
    let mut current_tag = String::new();
    let mut begin: Option<DateTime<FixedOffset>> = None;
    let mut duration_ns: u64 = 0;
    let mut code: Option<String> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .with_context(|| format!("parse {}", path.display()))?
        {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if tag == "event" {
                    in_event = true;
                    begin = None;
                    duration_ns = 0;
                    code = None;
                } else if in_event {
                    current_tag = tag;
                }
            }
            Event::Text(t) if in_event => {
                let text = t.unescape()?.trim().to_string();
                match current_tag.as_str() {
                    "beginTime" => {
                        begin = Some(
                            DateTime::parse_from_rfc3339(&text)
                                .with_context(|| format!("bad beginTime '{text}'"))?,
                        );
                    }
                    "duration" => {
                        duration_ns = text.parse().context("bad event duration")?;
                    }
                    "code" if !text.is_empty() => code = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"event" {
                    in_event = false;
                    match (begin.take(), code.take()) {
                        (Some(begin), Some(code)) => {
                            events.push(MffEvent { begin, duration_ns, code });
                        }
                        _ => warn!("skipping incomplete <event> in {}", path.display()),
                    }
                } else if in_event {
                    current_tag.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(events)
}

/// Collect every `Events_*.xml` in `dir`, in name order.
pub fn read_event_tracks(dir: &Path) -> Result<Vec<MffEvent>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("read directory {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("Events") && n.ends_with(".xml"))
        })
        .collect();
    paths.sort();

    let mut events = Vec::new();
    for path in paths {
        let track = read_event_track(&path)?;
        debug!("{}: {} events", path.display(), track.len());
        events.extend(track);
    }
    events.sort_by_key(|e| e.begin);
    Ok(events)
}

/// Assign an integer id to every distinct code.
///
/// Numeric codes keep their value when it is still free; symbolic codes —
/// and numeric codes whose value is already taken — get the smallest
/// positive id not assigned yet, in order of first appearance.  Ids are
/// unique per code so event types stay distinguishable on the trigger
/// channel.
pub fn code_ids(events: &[MffEvent]) -> BTreeMap<String, i64> {
    let mut ids = BTreeMap::new();
    for event in events {
        if ids.contains_key(&event.code) {
            continue;
        }
        let taken = |id: i64| ids.values().any(|&v| v == id);
        let id = match event.code.parse::<i64>() {
            Ok(v) if v > 0 && !taken(v) => v,
            _ => (1..).find(|&c| !taken(c)).unwrap_or(1),
        };
        ids.insert(event.code.clone(), id);
    }
    ids
}

/// Fold events into a trigger channel of `n_times` samples.
///
/// Each event writes its integer code from its onset sample for
/// `max(1, duration × sfreq)` samples; events outside the recording window
/// are dropped with a warning.  Overlaps resolve in onset order (the later
/// event wins).
pub fn build_stim_channel(
    events: &[MffEvent],
    record_time: DateTime<FixedOffset>,
    sfreq: f64,
    n_times: usize,
) -> Vec<f64> {
    let ids = code_ids(events);
    let mut stim = vec![0.0; n_times];

    for event in events {
        let offset_ns = (event.begin - record_time)
            .num_nanoseconds()
            .unwrap_or(i64::MAX);
        let onset = (offset_ns as f64 * sfreq / 1e9).round() as i64;
        if onset < 0 || onset as usize >= n_times {
            warn!(
                "event '{}' at sample {onset} falls outside the recording, dropped",
                event.code
            );
            continue;
        }
        let onset = onset as usize;
        let n_samp = ((event.duration_ns as f64 * sfreq / 1e9).round() as usize).max(1);
        let end = (onset + n_samp).min(n_times);
        let id = ids[&event.code] as f64;
        stim[onset..end].iter_mut().for_each(|v| *v = id);
    }
    stim
}
