//! Block-based `signal1.bin` decoder.
//!
//! An MFF signal file is a sequence of blocks.  Each block starts with a
//! little-endian `i32` version flag:
//!
//! * `1` — a full header follows:
//!   ```text
//!    4  header_size          i32  (bytes, including the version word)
//!    4  data_size            i32  (bytes of sample data after the header)
//!    4  n_signals            i32
//!   4n  offsets              n × i32   byte offset of each channel in the block
//!   4n  signal info          n × i32   low byte = bit depth, upper 24 bits = rate (Hz)
//!    4  optional_header_size i32, then that many bytes (skipped)
//!   ```
//! * `0` — the previous block's header applies unchanged.
//!
//! Samples are IEEE float-32 little-endian (depth 32 is the only depth EGI
//! amplifiers write and the only one we accept), one contiguous run per
//! channel, in channel order.  Values are microvolts.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

/// Parsed per-block header (shared across version-0 continuation blocks).
#[derive(Debug, Clone)]
struct BlockHeader {
    data_size: usize,
    n_signals: usize,
    /// Byte offset of each channel's run within the data block.
    offsets:   Vec<usize>,
    /// Bit depth per channel (32 expected).
    depths:    Vec<u8>,
    /// Sampling rate per channel in Hz.
    rates:     Vec<u32>,
}

impl BlockHeader {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let _header_size = read_i32(reader).context("block header size")?;
        let data_size    = read_i32(reader).context("block data size")? as usize;
        let n_signals    = read_i32(reader).context("block signal count")? as usize;
        if n_signals == 0 {
            bail!("signal block declares zero channels");
        }

        let mut offsets = Vec::with_capacity(n_signals);
        for _ in 0..n_signals {
            offsets.push(read_i32(reader)? as usize);
        }
        let mut depths = Vec::with_capacity(n_signals);
        let mut rates  = Vec::with_capacity(n_signals);
        for _ in 0..n_signals {
            let word = read_i32(reader)? as u32;
            depths.push((word & 0xFF) as u8);
            rates.push(word >> 8);
        }

        let opt_size = read_i32(reader).context("optional header size")? as usize;
        if opt_size > 0 {
            std::io::copy(&mut reader.take(opt_size as u64), &mut std::io::sink())?;
        }
        Ok(BlockHeader { data_size, n_signals, offsets, depths, rates })
    }

    /// Samples per channel in one data block.
    fn samples_per_channel(&self, channel: usize) -> Result<usize> {
        let start = self.offsets[channel];
        let end = if channel + 1 < self.n_signals {
            self.offsets[channel + 1]
        } else {
            self.data_size
        };
        if end < start || end > self.data_size {
            bail!("inconsistent channel offsets in signal block");
        }
        let depth_bytes = (self.depths[channel] / 8) as usize;
        if depth_bytes == 0 {
            bail!("channel {channel} has zero bit depth");
        }
        Ok((end - start) / depth_bytes)
    }
}

/// Decode a complete signal file into `[n_chan, n_times]` microvolt samples
/// plus the (uniform) sampling rate in Hz.
pub fn read_signal_file(path: &Path) -> Result<(Array2<f64>, f64)> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut header: Option<BlockHeader> = None;
    let mut blocks: Vec<Vec<Vec<f64>>> = Vec::new(); // block → channel → samples
    let mut sfreq: Option<u32> = None;

    loop {
        let version = match read_i32_or_eof(&mut reader)? {
            Some(v) => v,
            None => break,
        };
        match version {
            1 => header = Some(BlockHeader::read(&mut reader)?),
            0 => {} // continuation: previous header applies
            other => bail!("unsupported signal block version {other} in {}", path.display()),
        }
        let Some(hdr) = header.as_ref() else {
            bail!("continuation block before any header in {}", path.display());
        };

        for (c, (&depth, &rate)) in hdr.depths.iter().zip(&hdr.rates).enumerate() {
            if depth != 32 {
                bail!("channel {c} has unsupported bit depth {depth} (expected 32)");
            }
            match sfreq {
                None => sfreq = Some(rate),
                Some(s) if s != rate => {
                    bail!("mixed sampling rates in signal file ({s} Hz vs {rate} Hz)")
                }
                _ => {}
            }
        }

        let mut payload = vec![0u8; hdr.data_size];
        reader
            .read_exact(&mut payload)
            .with_context(|| format!("read signal block data ({} bytes)", hdr.data_size))?;

        let mut channels = Vec::with_capacity(hdr.n_signals);
        for c in 0..hdr.n_signals {
            let n_samp = hdr.samples_per_channel(c)?;
            let start = hdr.offsets[c];
            let samples = payload[start..start + n_samp * 4]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect();
            channels.push(samples);
        }
        blocks.push(channels);
    }

    let Some(first) = blocks.first() else {
        bail!("signal file {} contains no data blocks", path.display());
    };
    let n_chan = first.len();
    let n_times: usize = blocks.iter().map(|b| b[0].len()).sum();

    let mut out = Array2::<f64>::zeros((n_chan, n_times));
    let mut t_offset = 0;
    for block in &blocks {
        if block.len() != n_chan {
            bail!("channel count changes between signal blocks");
        }
        let n_samp = block[0].len();
        for (c, samples) in block.iter().enumerate() {
            if samples.len() != n_samp {
                bail!("ragged channel lengths within a signal block");
            }
            for (t, &v) in samples.iter().enumerate() {
                out[[c, t_offset + t]] = v;
            }
        }
        t_offset += n_samp;
    }

    let sfreq = sfreq.context("signal file carries no sampling rate")? as f64;
    Ok((out, sfreq))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Like [`read_i32`] but maps a clean EOF at the first byte to `None`.
fn read_i32_or_eof<R: Read>(reader: &mut R) -> Result<Option<i32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            bail!("truncated block header (got {filled} of 4 bytes)");
        }
        filled += n;
    }
    Ok(Some(i32::from_le_bytes(buf)))
}

// ── Encoder (used by tests and the sourcedata round-trip checks) ──────────

/// Write `[n_chan, n_times]` microvolt samples as a single-block signal file.
///
/// Counterpart of [`read_signal_file`]; exists so synthetic bundles can be
/// built without an amplifier in the loop.
pub fn write_signal_file(path: &Path, data: &Array2<f64>, sfreq: f64) -> Result<()> {
    use std::io::Write;

    let (n_chan, n_times) = data.dim();
    if n_chan == 0 || n_times == 0 {
        bail!("refusing to write an empty signal file");
    }
    let bytes_per_chan = n_times * 4;
    let header_size = 4 * (5 + 2 * n_chan) as i32;
    let data_size = (n_chan * bytes_per_chan) as i32;

    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(file);
    w.write_all(&1_i32.to_le_bytes())?; // version
    w.write_all(&header_size.to_le_bytes())?;
    w.write_all(&data_size.to_le_bytes())?;
    w.write_all(&(n_chan as i32).to_le_bytes())?;
    for c in 0..n_chan {
        w.write_all(&((c * bytes_per_chan) as i32).to_le_bytes())?;
    }
    let rate = sfreq.round() as u32;
    for _ in 0..n_chan {
        let word = (rate << 8) | 32;
        w.write_all(&(word as i32).to_le_bytes())?;
    }
    w.write_all(&0_i32.to_le_bytes())?; // no optional header
    for c in 0..n_chan {
        for t in 0..n_times {
            w.write_all(&(data[[c, t]] as f32).to_le_bytes())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn roundtrip_single_block() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("signal1.bin");
        let data = Array2::from_shape_fn((3, 16), |(c, t)| (c * 100 + t) as f64);
        write_signal_file(&path, &data, 250.0).unwrap();

        let (read, sfreq) = read_signal_file(&path).unwrap();
        assert_abs_diff_eq!(sfreq, 250.0, epsilon = 1e-9);
        assert_eq!(read.dim(), (3, 16));
        for c in 0..3 {
            for t in 0..16 {
                assert_abs_diff_eq!(read[[c, t]], data[[c, t]], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn continuation_blocks_share_the_header() {
        use std::io::Write;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("signal1.bin");

        // One full block, then a version-0 continuation with the same shape.
        let data = Array2::from_elem((2, 4), 1.5_f64);
        write_signal_file(&path, &data, 100.0).unwrap();
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&0_i32.to_le_bytes()).unwrap();
        for _ in 0..2 * 4 {
            f.write_all(&2.5_f32.to_le_bytes()).unwrap();
        }
        drop(f);

        let (read, _) = read_signal_file(&path).unwrap();
        assert_eq!(read.dim(), (2, 8));
        assert_abs_diff_eq!(read[[1, 3]], 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(read[[1, 4]], 2.5, epsilon = 1e-6);
    }

    #[test]
    fn truncated_header_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("signal1.bin");
        std::fs::write(&path, 1_i32.to_le_bytes()).unwrap();
        assert!(read_signal_file(&path).is_err());
    }
}
