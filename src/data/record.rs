//! On-media record layout for [`SampleSlot`].
//!
//! A record is the analog channels followed by the X, Y, Z accelerometer
//! readings, each as a little-endian `u16`. Records are written back to back
//! with no header or framing, so a data file is a plain multiple of
//! [`SampleSlot::RECORD_LEN`] (a trailing partial record means the session
//! ended mid-flush).
//!
//! Nothing here runs on the acquisition path except [`SampleSlot::encode_into`];
//! decoding and CSV export are for desktop post-processing.

use std::io::Write;

use crate::data::sample::{Axis, SampleSlot, ACCEL_AXES};
use crate::error::{AppResult, LoggerError};

impl<const N: usize> SampleSlot<N> {
    /// Encoded size of one record in bytes.
    pub const RECORD_LEN: usize = 2 * (N + ACCEL_AXES);

    /// Serialize into `out`, returning the number of bytes written.
    ///
    /// Returns 0 and writes nothing if `out` is shorter than
    /// [`Self::RECORD_LEN`].
    pub fn encode_into(&self, out: &mut [u8]) -> usize {
        if out.len() < Self::RECORD_LEN {
            return 0;
        }

        let words = self.analog.iter().chain(self.accel.iter());
        for (chunk, word) in out.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self::RECORD_LEN
    }

    /// Parse one record from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::RECORD_LEN {
            return None;
        }

        let mut words = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

        let mut slot = Self::default();
        for value in slot.analog.iter_mut().chain(slot.accel.iter_mut()) {
            *value = words.next()?;
        }
        Some(slot)
    }
}

/// Split a data file into records.
///
/// Returns the decoded records and the number of trailing bytes that did not
/// form a whole record.
pub fn decode_records<const N: usize>(data: &[u8]) -> (Vec<SampleSlot<N>>, usize) {
    let record_len = SampleSlot::<N>::RECORD_LEN;
    let chunks = data.chunks_exact(record_len);
    let trailing = chunks.remainder().len();
    let records = chunks.filter_map(SampleSlot::decode).collect();
    (records, trailing)
}

/// Column names for a CSV export: `ADC0..ADC{N-1}, ACCELX, ACCELY, ACCELZ`.
pub fn csv_header<const N: usize>() -> Vec<String> {
    (0..N)
        .map(|i| format!("ADC{i}"))
        .chain(Axis::ALL.iter().map(|axis| format!("ACCEL{axis:?}")))
        .collect()
}

/// Write records as CSV, one row per sample cycle.
pub fn write_csv<const N: usize, W: Write>(records: &[SampleSlot<N>], writer: W) -> AppResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(csv_header::<N>())?;

    for record in records {
        let row = record
            .analog
            .iter()
            .chain(record.accel.iter())
            .map(|value| value.to_string());
        csv.write_record(row)?;
    }

    csv.flush().map_err(LoggerError::Io)?;
    Ok(())
}
