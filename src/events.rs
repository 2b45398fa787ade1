//! Stimulus-event detection on a trigger channel.
//!
//! BIDS wants discrete events; the recording encodes them as integer codes on
//! a dedicated stimulus channel.  [`find_events`] scans that channel for value
//! transitions the way `mne.find_events` does: an event is a change of value
//! whose new value is non-zero (returns to zero are offsets, not events).
use std::collections::BTreeMap;

use crate::mff::RawMff;

/// Name of the combined stimulus channel synthesized by the MFF reader.
pub const STIM_CHANNEL: &str = "STI 014";

/// One detected event: a value transition on the stimulus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimEvent {
    /// Sample index of the transition.
    pub sample:   usize,
    /// Number of samples the code is held for, counted from `sample`.
    pub duration: usize,
    /// Channel value immediately before the transition.
    pub prev:     i64,
    /// Channel value at and after the transition (the event code, non-zero).
    pub code:     i64,
}

/// Scan `stim_channel` of `raw` for onset transitions.
///
/// Each event records how long its code is held, so onsets and durations
/// both survive into the marker file and `events.tsv`.
///
/// Returns `None` when no channel of that name exists — the caller then
/// writes no events and no event-id mapping.  An existing channel with no
/// transitions yields `Some(vec![])`.
pub fn find_events(raw: &RawMff, stim_channel: &str) -> Option<Vec<StimEvent>> {
    let idx = raw.channel_index(stim_channel)?;
    let row = raw.data.row(idx);

    let mut events: Vec<StimEvent> = Vec::new();
    let mut prev: i64 = row.first().map(|v| v.round() as i64).unwrap_or(0);
    for (t, v) in row.iter().enumerate().skip(1) {
        let code = v.round() as i64;
        if code != prev {
            // The previous code's run ends here.
            if let Some(last) = events.last_mut() {
                if last.code == prev && last.duration == 0 {
                    last.duration = t - last.sample;
                }
            }
            if code != 0 {
                events.push(StimEvent { sample: t, duration: 0, prev, code });
            }
        }
        prev = code;
    }
    // A run still open at the end of the recording spans to the last sample.
    if let Some(last) = events.last_mut() {
        if last.code == prev && last.duration == 0 {
            last.duration = row.len() - last.sample;
        }
    }
    Some(events)
}

/// Synthesize an event-id mapping for events whose codes the caller did not
/// label: each distinct code `c` becomes `"Unknown_<c>" -> c`.
///
/// The map is ordered by code so repeated runs produce identical metadata.
pub fn auto_event_id(events: &[StimEvent]) -> BTreeMap<String, i64> {
    let mut codes: Vec<i64> = events.iter().map(|e| e.code).collect();
    codes.sort_unstable();
    codes.dedup();
    codes
        .into_iter()
        .map(|c| (format!("Unknown_{c}"), c))
        .collect()
}

/// Reverse lookup: label for a code, falling back to `Unknown_<code>` when
/// the mapping does not cover it.
pub fn label_for(event_id: &BTreeMap<String, i64>, code: i64) -> String {
    event_id
        .iter()
        .find(|(_, &c)| c == code)
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| format!("Unknown_{code}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mff::RawMff;
    use ndarray::Array2;

    fn raw_with_stim(stim: &[f64]) -> RawMff {
        let n_t = stim.len();
        let mut data = Array2::<f64>::zeros((2, n_t));
        for (t, &v) in stim.iter().enumerate() {
            data[[1, t]] = v;
        }
        RawMff {
            ch_names: vec!["1".into(), STIM_CHANNEL.into()],
            data,
            sfreq: 1000.0,
            line_freq: None,
            meas_date: None,
            n_eeg: 1,
        }
    }

    #[test]
    fn transitions_become_events() {
        let mut stim = vec![0.0; 30];
        stim[10..15].iter_mut().for_each(|v| *v = 1.0);
        stim[20..25].iter_mut().for_each(|v| *v = 2.0);
        let raw = raw_with_stim(&stim);

        let events = find_events(&raw, STIM_CHANNEL).unwrap();
        assert_eq!(
            events,
            vec![
                StimEvent { sample: 10, duration: 5, prev: 0, code: 1 },
                StimEvent { sample: 20, duration: 5, prev: 0, code: 2 },
            ]
        );
    }

    #[test]
    fn run_held_to_the_end_spans_the_tail() {
        let mut stim = vec![0.0; 20];
        stim[12..].iter_mut().for_each(|v| *v = 3.0);
        let raw = raw_with_stim(&stim);
        let events = find_events(&raw, STIM_CHANNEL).unwrap();
        assert_eq!(events, vec![StimEvent { sample: 12, duration: 8, prev: 0, code: 3 }]);
    }

    #[test]
    fn offsets_are_not_events() {
        let mut stim = vec![0.0; 20];
        stim[5..10].iter_mut().for_each(|v| *v = 7.0);
        let raw = raw_with_stim(&stim);
        let events = find_events(&raw, STIM_CHANNEL).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, 7);
    }

    #[test]
    fn missing_channel_yields_none() {
        let raw = raw_with_stim(&[0.0; 10]);
        assert!(find_events(&raw, "STI 015").is_none());
    }

    #[test]
    fn auto_event_id_names_unknown_codes() {
        let events = vec![
            StimEvent { sample: 10, duration: 1, prev: 0, code: 1 },
            StimEvent { sample: 20, duration: 1, prev: 0, code: 2 },
            StimEvent { sample: 25, duration: 1, prev: 0, code: 1 },
        ];
        let map = auto_event_id(&events);
        assert_eq!(map.len(), 2);
        assert_eq!(map["Unknown_1"], 1);
        assert_eq!(map["Unknown_2"], 2);
    }
}
