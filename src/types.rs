//! Core data structures shared by the writer and reader.
//!
//! - [`SourceDef`] / [`SignalDef`]: descriptor records with borrowed strings
//! - [`SignalType`], [`DataType`], [`StorageType`], [`AnnotationType`]: small
//!   closed enums stored as single bytes or nibbles on disk
//! - [`SummaryEntry`]: the fixed 16-byte reduction tuple of the summary
//!   pyramid
//! - [`UserData`]: tagged payload for user-data and annotation bodies

use crate::format::TrackType;

/// The tracks permitted on a signal of the given type.
pub(crate) fn legal_tracks(signal_type: SignalType) -> &'static [TrackType] {
    match signal_type {
        SignalType::Fsr => &[TrackType::Fsr, TrackType::Annotation, TrackType::Utc],
        SignalType::Vsr => &[TrackType::Vsr, TrackType::Annotation],
    }
}

/// Signal sampling discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignalType {
    /// Fixed sample rate: samples addressed by a monotone 64-bit sample id.
    Fsr = 0,
    /// Variable sample rate: each entry carries its own timestamp.
    Vsr = 1,
}

impl SignalType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SignalType::Fsr),
            1 => Some(SignalType::Vsr),
            _ => None,
        }
    }
}

/// Sample data type. Only 32-bit floats are currently stored; the u32 wire
/// field leaves room for fixed-point and integer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataType {
    F32 = 1,
}

impl DataType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(DataType::F32),
            _ => None,
        }
    }
}

/// Storage type for user-data chunks and annotation bodies, carried in the
/// high nibble of `chunk_meta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageType {
    /// Reserved for the sentinel chunk; payload forced empty.
    Invalid = 0,
    Binary = 1,
    /// NUL-terminated UTF-8
    String = 2,
    /// NUL-terminated JSON text
    Json = 3,
}

impl StorageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageType::Invalid),
            1 => Some(StorageType::Binary),
            2 => Some(StorageType::String),
            3 => Some(StorageType::Json),
            _ => None,
        }
    }
}

/// Annotation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AnnotationType {
    User = 0,
    Text = 1,
    Marker = 2,
}

impl AnnotationType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AnnotationType::User),
            1 => Some(AnnotationType::Text),
            2 => Some(AnnotationType::Marker),
            _ => None,
        }
    }
}

/// Source descriptor: the instrument or process that produced one or more
/// signals. Source 0 is reserved for the global annotation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDef<'a> {
    pub source_id: u16,
    pub name: &'a str,
    pub vendor: &'a str,
    pub model: &'a str,
    pub version: &'a str,
    pub serial_number: &'a str,
}

/// Signal descriptor. Signal 0 is reserved for global VSR annotations.
///
/// The decimation parameters shape the summary pyramid:
/// - `samples_per_data`: samples per level-0 data chunk
/// - `sample_decimate_factor`: samples per level-1 summary entry
/// - `entries_per_summary`: entries per summary chunk (any level)
/// - `summary_decimate_factor`: entries collapsed per next-level entry
///
/// The writer may raise these to safe floors and multiples; the adjusted
/// values are what round-trip through the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalDef<'a> {
    pub signal_id: u16,
    pub source_id: u16,
    pub signal_type: SignalType,
    pub data_type: DataType,
    /// Samples per second; required non-zero for FSR, forced to 0 for VSR.
    pub sample_rate: u32,
    pub samples_per_data: u32,
    pub sample_decimate_factor: u32,
    pub entries_per_summary: u32,
    pub summary_decimate_factor: u32,
    /// Opaque pass-through; semantics reserved.
    pub utc_rate_auto: u32,
    pub name: &'a str,
    pub si_units: &'a str,
}

impl Default for SignalDef<'_> {
    fn default() -> Self {
        Self {
            signal_id: 0,
            source_id: 0,
            signal_type: SignalType::Fsr,
            data_type: DataType::F32,
            sample_rate: 0,
            samples_per_data: 100_000,
            sample_decimate_factor: 100,
            entries_per_summary: 20_000,
            summary_decimate_factor: 100,
            utc_rate_auto: 0,
            name: "",
            si_units: "",
        }
    }
}

/// Owned signal parameters shared by the writer and reader directories.
///
/// The coverage arithmetic lives here so both sides derive seek geometry
/// from the same rules the writer uses to close summary chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SignalParams {
    pub source_id: u16,
    pub signal_type: SignalType,
    pub data_type: DataType,
    pub sample_rate: u32,
    pub samples_per_data: u32,
    pub sample_decimate_factor: u32,
    pub entries_per_summary: u32,
    pub summary_decimate_factor: u32,
    pub utc_rate_auto: u32,
}

impl SignalParams {
    /// Samples covered by one entry at summary level `level` (>= 1).
    pub fn entry_coverage(&self, level: usize) -> i64 {
        let mut cov = self.sample_decimate_factor as i64;
        for _ in 1..level {
            cov = cov.saturating_mul(self.summary_decimate_factor as i64);
        }
        cov
    }

    /// Samples covered by one closed chunk at summary level `level` (>= 1).
    pub fn chunk_coverage(&self, level: usize) -> i64 {
        self.entry_coverage(level)
            .saturating_mul(self.entries_per_summary as i64)
    }

    /// Samples covered by one child of a level-`level` INDEX chunk: a data
    /// chunk at level 1, a level-(level-1) chunk above that.
    pub fn child_step(&self, level: usize) -> i64 {
        if level <= 1 {
            self.samples_per_data as i64
        } else {
            self.chunk_coverage(level - 1)
        }
    }
}

/// One reduction entry of the summary pyramid: statistics over the samples
/// the entry covers. Stored as four little-endian f32 values (16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SummaryEntry {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub std: f32,
}

impl SummaryEntry {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;

    /// Reduce a run of raw samples into one entry.
    pub fn from_samples(samples: &[f32]) -> Self {
        debug_assert!(!samples.is_empty());
        let n = samples.len() as f64;
        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in samples {
            sum += v as f64;
            min = min.min(v);
            max = max.max(v);
        }
        let mean = sum / n;
        let mut m2 = 0.0f64;
        for &v in samples {
            let d = v as f64 - mean;
            m2 += d * d;
        }
        Self {
            mean: mean as f32,
            min,
            max,
            std: (m2 / n).sqrt() as f32,
        }
    }

    /// Combine equal-coverage child entries into one parent entry.
    pub fn combine(entries: &[SummaryEntry]) -> Self {
        debug_assert!(!entries.is_empty());
        let n = entries.len() as f64;
        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for e in entries {
            sum += e.mean as f64;
            min = min.min(e.min);
            max = max.max(e.max);
        }
        let mean = sum / n;
        // E[x^2] combines exactly when children have equal weight
        let mut sq = 0.0f64;
        for e in entries {
            let em = e.mean as f64;
            let es = e.std as f64;
            sq += es * es + em * em;
        }
        let var = (sq / n - mean * mean).max(0.0);
        Self {
            mean: mean as f32,
            min,
            max,
            std: var.sqrt() as f32,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..4].copy_from_slice(&self.mean.to_le_bytes());
        buf[4..8].copy_from_slice(&self.min.to_le_bytes());
        buf[8..12].copy_from_slice(&self.max.to_le_bytes());
        buf[12..16].copy_from_slice(&self.std.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= Self::SIZE);
        Self {
            mean: f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            min: f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            max: f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            std: f32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }
}

/// Tagged payload for user-data chunks and annotation bodies.
///
/// `String` and `Json` bodies are stored NUL-terminated; the stored size is
/// recomputed from the text, not from the caller's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserData<'a> {
    Binary(&'a [u8]),
    String(&'a str),
    Json(&'a str),
}

impl UserData<'_> {
    pub fn storage_type(&self) -> StorageType {
        match self {
            UserData::Binary(_) => StorageType::Binary,
            UserData::String(_) => StorageType::String,
            UserData::Json(_) => StorageType::Json,
        }
    }
}

/// One user-data chunk surfaced by the reader, borrowed from its payload
/// buffer. `String` and `Json` payloads include the trailing NUL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDataEntry<'a> {
    /// The caller's 12-bit metadata value.
    pub chunk_meta: u16,
    pub storage_type: StorageType,
    pub data: &'a [u8],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_entry_from_samples() {
        let e = SummaryEntry::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(e.mean, 2.5);
        assert_eq!(e.min, 1.0);
        assert_eq!(e.max, 4.0);
        // population std of 1,2,3,4
        assert!((e.std - 1.1180339887).abs() < 1e-6);
    }

    #[test]
    fn test_summary_entry_combine_matches_flat() {
        let a: Vec<f32> = (0..100).map(|i| (i as f32).sin()).collect();
        let flat = SummaryEntry::from_samples(&a);
        let children: Vec<SummaryEntry> =
            a.chunks(10).map(SummaryEntry::from_samples).collect();
        let combined = SummaryEntry::combine(&children);
        assert!((combined.mean - flat.mean).abs() < 1e-6);
        assert_eq!(combined.min, flat.min);
        assert_eq!(combined.max, flat.max);
        assert!((combined.std - flat.std).abs() < 1e-5);
    }

    #[test]
    fn test_summary_entry_encode_decode() {
        let e = SummaryEntry {
            mean: 0.5,
            min: -1.0,
            max: 1.0,
            std: 0.25,
        };
        assert_eq!(SummaryEntry::decode(&e.encode()), e);
    }

    #[test]
    fn test_enum_round_trips() {
        for v in 0..=3u8 {
            assert_eq!(StorageType::from_u8(v).map(|s| s as u8), Some(v));
        }
        assert_eq!(StorageType::from_u8(4), None);
        assert_eq!(SignalType::from_u8(2), None);
        assert_eq!(DataType::from_u32(1), Some(DataType::F32));
        assert_eq!(DataType::from_u32(7), None);
    }

    #[test]
    fn test_user_data_storage_type() {
        assert_eq!(
            UserData::Binary(&[1, 2]).storage_type(),
            StorageType::Binary
        );
        assert_eq!(UserData::String("x").storage_type(), StorageType::String);
        assert_eq!(UserData::Json("{}").storage_type(), StorageType::Json);
    }
}
