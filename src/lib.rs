//! # JLS (Jetperch Log Storage) Library
//!
//! JLS is a single-file container for long, regularly-sampled (FSR) and
//! irregularly-sampled (VSR) numeric signals, enriched with annotations, UTC
//! timestamp anchors, and arbitrary user metadata. It targets
//! instrumentation workloads that capture multi-hour, multi-gigasample
//! waveforms and must later support fast random-access viewing at many zoom
//! levels.
//!
//! ## Design
//!
//! The file is a sequence of CRC-protected chunks threaded into per-kind
//! doubly-linked lists. Each sampled signal carries a pyramid of decimated
//! summary chunks (mean, min, max, std), so length queries, point seeks, and
//! range statistics complete in O(log N) chunk reads no matter how large the
//! capture.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jls::{Reader, SignalDef, SourceDef, Writer};
//!
//! # fn main() -> jls::Result<()> {
//! let mut writer = Writer::open("capture.jls")?;
//! writer.source_def(&SourceDef {
//!     source_id: 1,
//!     name: "multimeter",
//!     vendor: "example",
//!     model: "mm-1",
//!     version: "1.0",
//!     serial_number: "0001",
//! })?;
//! writer.signal_def(&SignalDef {
//!     signal_id: 1,
//!     source_id: 1,
//!     sample_rate: 1_000_000,
//!     name: "current",
//!     si_units: "A",
//!     ..Default::default()
//! })?;
//! writer.fsr_f32(1, 0, &[0.0, 0.5, 1.0])?;
//! writer.close()?;
//!
//! let mut reader = Reader::open("capture.jls")?;
//! assert_eq!(reader.fsr_length(1)?, 3);
//! let mut samples = [0.0f32; 3];
//! reader.fsr_f32(1, 0, &mut samples)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`error`]: Error types and Result alias
//! - [`types`]: Descriptors, enums, and summary entries
//! - [`format`]: On-disk layout (headers, tags, sizes)
//! - [`buffer`]: Bounded scratch serializer used by the writer
//! - [`arena`]: String arena used by the reader
//! - [`raw`]: Raw chunk-level file access
//! - [`writer`]: Streaming writer with pyramidal summaries
//! - [`reader`]: Directory scan and pyramid navigation

pub mod arena;
pub mod buffer;
pub mod error;
pub mod format;
pub mod raw;
pub mod reader;
pub mod types;
pub mod writer;

pub use error::{JlsError, Result};
pub use format::{TrackRole, TrackType, SIGNAL_COUNT, SOURCE_COUNT, SUMMARY_LEVEL_COUNT};
pub use reader::Reader;
pub use types::{
    AnnotationType, DataType, SignalDef, SignalType, SourceDef, StorageType, SummaryEntry,
    UserData, UserDataEntry,
};
pub use writer::Writer;
