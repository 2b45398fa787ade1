//! Canonical channel names for the EGI HydroCel GSN 256 net.
//!
//! The amplifier labels channels by position ("1", "2", …).  [`CH_NAMES_EGI`]
//! maps that position to the closest 10-20 electrode name where one exists;
//! positions without a standard name keep their number.  Entry 256 is the
//! reference electrode `Cz` (device channel 257).
use crate::mff::RawMff;

/// Positional rename table: index `i` names device channel `i + 1`.
#[rustfmt::skip]
pub const CH_NAMES_EGI: [&str; 257] = [
    "1", "F8", "3", "4", "F2", "6", "7", "8",
    "9", "AF8", "11", "AF4", "13", "14", "FCz", "16",
    "17", "FP2", "19", "20", "Fz", "22", "23", "FC1",
    "25", "FPz", "27", "28", "F1", "30", "31", "32",
    "33", "AF3", "35", "F3", "FP1", "38", "39", "40",
    "41", "FC3", "43", "C1", "45", "AF7", "F7", "F5",
    "FC5", "50", "51", "52", "53", "54", "55", "56",
    "57", "58", "C3", "60", "61", "FT7", "63", "C5",
    "65", "CP3", "FT9", "T9", "T7", "70", "71", "72",
    "73", "74", "75", "CP5", "77", "78", "CP1", "80",
    "81", "82", "83", "TP7", "85", "P5", "P3", "P1",
    "89", "CPz", "91", "92", "93", "TP9", "95", "P7",
    "PO7", "98", "99", "100", "Pz", "102", "103", "104",
    "105", "P9", "107", "108", "PO3", "110", "111", "112",
    "113", "114", "115", "O1", "117", "118", "POz", "120",
    "121", "122", "123", "124", "125", "Oz", "127", "128",
    "129", "130", "131", "132", "133", "134", "135", "136",
    "137", "138", "139", "PO4", "141", "P2", "CP2", "144",
    "145", "146", "147", "148", "149", "O2", "151", "152",
    "P4", "154", "155", "156", "157", "158", "159", "160",
    "PO8", "P6", "163", "CP4", "165", "166", "167", "168",
    "P10", "P8", "171", "CP6", "173", "174", "175", "176",
    "177", "178", "TP8", "180", "181", "182", "C4", "184",
    "C2", "186", "187", "188", "189", "TP10", "191", "192",
    "193", "C6", "195", "196", "197", "198", "199", "200",
    "201", "T8", "203", "204", "205", "FC4", "FC2", "208",
    "209", "T10", "FT8", "212", "FC6", "214", "215", "216",
    "217", "218", "FT10", "220", "221", "F6", "223", "F4",
    "225", "F10", "227", "228", "229", "230", "231", "232",
    "233", "234", "235", "236", "237", "238", "239", "240",
    "241", "242", "243", "244", "245", "246", "247", "248",
    "249", "250", "251", "F9", "253", "254", "255", "256",
    "Cz",
];

/// Rename the first 257 data channels of `raw` in place.
///
/// The rename is positional and order-dependent: device channel `i + 1`
/// (i.e. the channel at raw index `i`) receives `CH_NAMES_EGI[i]`,
/// whatever its current label.  Only the `raw.n_eeg` data channels are
/// candidates; the synthesized stimulus channel is never renamed, whatever
/// its position.
pub fn rename_channels(raw: &mut RawMff) {
    let n = raw.n_eeg.min(CH_NAMES_EGI.len());
    for (name, canonical) in raw.ch_names.iter_mut().take(n).zip(CH_NAMES_EGI.iter()) {
        *name = (*canonical).to_string();
    }
}
