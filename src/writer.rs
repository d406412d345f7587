//! JLS file writer.
//!
//! The writer streams samples into fixed-size data chunks and maintains the
//! per-signal summary pyramid as it goes:
//!
//! - Each flushed level-0 data chunk contributes one child offset and
//!   `samples_per_data / sample_decimate_factor` reduction entries to the
//!   level-1 accumulator.
//! - When a level's accumulator reaches `entries_per_summary` entries, the
//!   writer emits an INDEX chunk (child offsets) immediately followed by a
//!   SUMMARY chunk (reduction entries), then feeds the INDEX offset and the
//!   `summary_decimate_factor`-collapsed entries into the next level.
//! - The track HEAD chunk is rewritten in place after every data or INDEX
//!   emission so readers can always find the most recent chunk per level.
//!
//! Every chain append follows the back-patch protocol: the new chunk lands
//! at end of file with `item_prev` pointing at the chain's most recently
//! added chunk, whose header is then rewritten in place with `item_next`
//! pointing forward. A crash between the two writes leaves the chain
//! forward-broken but recoverable by the reader's linear scan.

use std::path::Path;

use tracing::warn;

use crate::buffer::Serializer;
use crate::error::{JlsError, Result};
use crate::format::{
    track_tag, ChunkHeader, TrackRole, TrackType, SIGNAL_COUNT, SIGNAL_MASK, SOURCE_COUNT,
    SUMMARY_LEVEL_COUNT, TAG_SIGNAL_DEF, TAG_SOURCE_DEF, TAG_USER_DATA,
};
use crate::raw::{OpenMode, Raw};
use crate::types::{
    legal_tracks, AnnotationType, SignalDef, SignalParams, SignalType, SourceDef, SummaryEntry,
    UserData,
};

/// Reserved bytes in a source-def payload before the strings.
pub(crate) const SOURCE_DEF_RESERVED: usize = 64;

/// Reserved bytes in a signal-def payload between the fixed fields and the
/// strings.
pub(crate) const SIGNAL_DEF_RESERVED: usize = 68;

/// A chunk's offset and its header as currently stored on disk. Kept for the
/// most recently added chunk of every chain so the forward link can be
/// back-patched.
#[derive(Debug, Clone, Copy)]
struct ChunkRecord {
    offset: u64,
    hdr: ChunkHeader,
}

/// Staged content for one summary level.
#[derive(Debug, Default)]
struct LevelAccum {
    /// Sample id of the first sample covered by the staged entries.
    timestamp: i64,
    /// Offsets of the child chunks covered.
    index: Vec<u64>,
    summary: Vec<SummaryEntry>,
}

struct TrackState {
    head_offset: u64,
    head_hdr: ChunkHeader,
    head: [u64; SUMMARY_LEVEL_COUNT],
    data_mra: Option<ChunkRecord>,
    index_mra: [Option<ChunkRecord>; SUMMARY_LEVEL_COUNT],
    summary_mra: [Option<ChunkRecord>; SUMMARY_LEVEL_COUNT],
}

struct SignalState {
    params: SignalParams,
    tracks: [Option<TrackState>; 4],
    sample_buffer: Vec<f32>,
    /// Sample id of the first sample in `sample_buffer`.
    buffer_sample_id: i64,
    /// Expected sample id of the next write; None before the first write.
    expected_sample_id: Option<i64>,
    /// Per-level accumulators; index 0 is unused.
    levels: [LevelAccum; SUMMARY_LEVEL_COUNT],
}

/// Streaming JLS writer. Owned by exactly one caller; all I/O is synchronous.
pub struct Writer {
    raw: Raw,
    buf: Serializer,
    /// Chunk offset per source id; 0 = undefined.
    source_offsets: [u64; SOURCE_COUNT],
    signals: Vec<Option<SignalState>>,
    source_mra: Option<ChunkRecord>,
    signal_mra: Option<ChunkRecord>,
    user_data_mra: Option<ChunkRecord>,
    closed: bool,
}

impl Writer {
    /// Create a new JLS file.
    ///
    /// Writes the user-data sentinel chunk and the reserved definitions:
    /// source 0 (global annotation source) and signal 0 (global VSR
    /// annotation signal).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = Raw::open(path, OpenMode::Write)?;
        let mut signals = Vec::with_capacity(SIGNAL_COUNT);
        signals.resize_with(SIGNAL_COUNT, || None);
        let mut wr = Self {
            raw,
            buf: Serializer::new(),
            source_offsets: [0; SOURCE_COUNT],
            signals,
            source_mra: None,
            signal_mra: None,
            user_data_mra: None,
            closed: false,
        };
        // sentinel: storage type INVALID, empty payload
        chain_append(&mut wr.raw, &mut wr.user_data_mra, TAG_USER_DATA, 0, &[])?;
        wr.source_def(&SourceDef {
            source_id: 0,
            name: "global_annotation_source",
            vendor: "",
            model: "",
            version: "",
            serial_number: "",
        })?;
        wr.signal_def(&SignalDef {
            signal_id: 0,
            source_id: 0,
            signal_type: SignalType::Vsr,
            sample_rate: 0,
            name: "global_annotation_signal",
            si_units: "",
            ..Default::default()
        })?;
        Ok(wr)
    }

    /// Define a source. Each source id may be defined once per file.
    pub fn source_def(&mut self, source: &SourceDef) -> Result<()> {
        self.check_open()?;
        let id = source.source_id;
        if id as usize >= SOURCE_COUNT {
            return Err(JlsError::ParameterInvalid("source_id out of range"));
        }
        if self.source_offsets[id as usize] != 0 {
            return Err(JlsError::AlreadyExists { kind: "source", id });
        }
        self.buf.clear();
        self.buf.wr_zero(SOURCE_DEF_RESERVED)?;
        for s in [
            source.name,
            source.vendor,
            source.model,
            source.version,
            source.serial_number,
        ] {
            self.buf.wr_str(s)?;
        }
        let rec = chain_append(
            &mut self.raw,
            &mut self.source_mra,
            TAG_SOURCE_DEF,
            id,
            self.buf.as_slice(),
        )?;
        self.source_offsets[id as usize] = rec.offset;
        Ok(())
    }

    /// Define a signal. The source must already be defined; summary
    /// parameters below their floors are raised with a warning and the
    /// adjusted values are what reach the file.
    pub fn signal_def(&mut self, signal: &SignalDef) -> Result<()> {
        self.check_open()?;
        let id = signal.signal_id;
        if id as usize >= SIGNAL_COUNT {
            return Err(JlsError::ParameterInvalid("signal_id out of range"));
        }
        if self.signals[id as usize].is_some() {
            return Err(JlsError::AlreadyExists { kind: "signal", id });
        }
        if (signal.source_id as usize) >= SOURCE_COUNT
            || self.source_offsets[signal.source_id as usize] == 0
        {
            return Err(JlsError::NotFound {
                kind: "source",
                id: signal.source_id,
            });
        }
        let mut params = SignalParams {
            source_id: signal.source_id,
            signal_type: signal.signal_type,
            data_type: signal.data_type,
            sample_rate: signal.sample_rate,
            samples_per_data: signal.samples_per_data,
            sample_decimate_factor: signal.sample_decimate_factor,
            entries_per_summary: signal.entries_per_summary,
            summary_decimate_factor: signal.summary_decimate_factor,
            utc_rate_auto: signal.utc_rate_auto,
        };
        match params.signal_type {
            SignalType::Fsr => {
                if params.sample_rate == 0 {
                    return Err(JlsError::ParameterInvalid(
                        "fsr signal requires sample_rate > 0",
                    ));
                }
                adjust_summary_params(id, &mut params)?;
            }
            SignalType::Vsr => {
                params.sample_rate = 0;
            }
        }

        self.buf.clear();
        self.buf.wr_u16(params.source_id)?;
        self.buf.wr_u8(params.signal_type as u8)?;
        self.buf.wr_u8(0)?;
        self.buf.wr_u32(params.data_type as u32)?;
        self.buf.wr_u32(params.sample_rate)?;
        self.buf.wr_u32(params.samples_per_data)?;
        self.buf.wr_u32(params.sample_decimate_factor)?;
        self.buf.wr_u32(params.entries_per_summary)?;
        self.buf.wr_u32(params.summary_decimate_factor)?;
        self.buf.wr_u32(params.utc_rate_auto)?;
        self.buf.wr_zero(SIGNAL_DEF_RESERVED)?;
        self.buf.wr_str(signal.name)?;
        self.buf.wr_str(signal.si_units)?;
        chain_append(
            &mut self.raw,
            &mut self.signal_mra,
            TAG_SIGNAL_DEF,
            id,
            self.buf.as_slice(),
        )?;

        let mut tracks: [Option<TrackState>; 4] = [None, None, None, None];
        for track in legal_tracks(params.signal_type) {
            chain_append(
                &mut self.raw,
                &mut self.signal_mra,
                track_tag(*track, TrackRole::Def),
                id,
                &[],
            )?;
            let head_rec = chain_append(
                &mut self.raw,
                &mut self.signal_mra,
                track_tag(*track, TrackRole::Head),
                id,
                &[0u8; SUMMARY_LEVEL_COUNT * 8],
            )?;
            tracks[*track as usize] = Some(TrackState {
                head_offset: head_rec.offset,
                head_hdr: head_rec.hdr,
                head: [0; SUMMARY_LEVEL_COUNT],
                data_mra: None,
                index_mra: [None; SUMMARY_LEVEL_COUNT],
                summary_mra: [None; SUMMARY_LEVEL_COUNT],
            });
        }

        let sample_buffer = if params.signal_type == SignalType::Fsr {
            // size the shared scratch for the largest payloads this signal
            // can produce
            let data_payload = 16 + params.samples_per_data as usize * 4;
            let summary_payload =
                16 + params.entries_per_summary as usize * SummaryEntry::SIZE;
            self.buf.grow_to(data_payload.max(summary_payload));
            Vec::with_capacity(params.samples_per_data as usize)
        } else {
            Vec::new()
        };
        self.signals[id as usize] = Some(SignalState {
            params,
            tracks,
            sample_buffer,
            buffer_sample_id: 0,
            expected_sample_id: None,
            levels: std::array::from_fn(|_| LevelAccum::default()),
        });
        Ok(())
    }

    /// Append fixed-sample-rate f32 samples.
    ///
    /// `sample_id` is the 64-bit index of `data[0]` from the start of the
    /// signal. Discontinuous sample ids are logged and treated as
    /// contiguous.
    pub fn fsr_f32(&mut self, signal_id: u16, sample_id: i64, data: &[f32]) -> Result<()> {
        self.check_open()?;
        let state = signal_state(&mut self.signals, signal_id)?;
        if state.params.signal_type != SignalType::Fsr {
            return Err(JlsError::NotSupported("fsr write to non-fsr signal"));
        }
        if data.is_empty() {
            return Ok(());
        }
        match state.expected_sample_id {
            None => state.buffer_sample_id = sample_id,
            Some(expected) if expected != sample_id => {
                warn!(
                    signal_id,
                    expected, got = sample_id, "sample_id discontinuity"
                );
            }
            _ => {}
        }
        let spd = state.params.samples_per_data as usize;
        let mut remaining = data;
        while !remaining.is_empty() {
            let take = (spd - state.sample_buffer.len()).min(remaining.len());
            state.sample_buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if state.sample_buffer.len() == spd {
                Self::flush_data_chunk(&mut self.raw, &mut self.buf, state, signal_id)?;
            }
        }
        let first = state.expected_sample_id.unwrap_or(sample_id);
        state.expected_sample_id = Some(first + data.len() as i64);
        Ok(())
    }

    /// Variable-sample-rate writes are an extension point.
    pub fn vsr_f32(&mut self, _signal_id: u16, _timestamp: i64, _data: &[f32]) -> Result<()> {
        Err(JlsError::NotSupported("vsr sample write"))
    }

    /// Append an annotation to a signal's annotation track.
    ///
    /// For FSR signals `timestamp` is a sample id; for VSR signals it is the
    /// caller's timestamp. Signal 0 accepts global annotations.
    pub fn annotation(
        &mut self,
        signal_id: u16,
        timestamp: i64,
        annotation_type: AnnotationType,
        data: &UserData,
    ) -> Result<()> {
        self.check_open()?;
        self.buf.clear();
        self.buf.wr_i64(timestamp)?;
        self.buf.wr_u8(annotation_type as u8)?;
        self.buf.wr_u8(data.storage_type() as u8)?;
        self.buf.wr_zero(6)?;
        wr_body(&mut self.buf, data)?;
        let state = signal_state(&mut self.signals, signal_id)?;
        let track = state.tracks[TrackType::Annotation as usize]
            .as_mut()
            .ok_or(JlsError::NotSupported("signal has no annotation track"))?;
        let rec = chain_append(
            &mut self.raw,
            &mut track.data_mra,
            track_tag(TrackType::Annotation, TrackRole::Data),
            signal_id,
            self.buf.as_slice(),
        )?;
        track.head[0] = rec.offset;
        head_write(&mut self.raw, track)
    }

    /// Record a sample-id to UTC mapping on a signal's UTC track.
    pub fn utc(&mut self, signal_id: u16, sample_id: i64, utc: i64) -> Result<()> {
        self.check_open()?;
        self.buf.clear();
        self.buf.wr_u64(sample_id as u64)?;
        self.buf.wr_i64(utc)?;
        let state = signal_state(&mut self.signals, signal_id)?;
        let track = state.tracks[TrackType::Utc as usize]
            .as_mut()
            .ok_or(JlsError::NotSupported("utc track requires an fsr signal"))?;
        let rec = chain_append(
            &mut self.raw,
            &mut track.data_mra,
            track_tag(TrackType::Utc, TrackRole::Data),
            signal_id,
            self.buf.as_slice(),
        )?;
        track.head[0] = rec.offset;
        head_write(&mut self.raw, track)
    }

    /// Append a user-data chunk. The low 12 bits of `chunk_meta` are the
    /// caller's; the storage type occupies the top nibble.
    pub fn user_data(&mut self, chunk_meta: u16, data: &UserData) -> Result<()> {
        self.check_open()?;
        let meta = (chunk_meta & SIGNAL_MASK) | ((data.storage_type() as u16) << 12);
        self.buf.clear();
        wr_body(&mut self.buf, data)?;
        chain_append(
            &mut self.raw,
            &mut self.user_data_mra,
            TAG_USER_DATA,
            meta,
            self.buf.as_slice(),
        )?;
        Ok(())
    }

    /// Flush partial sample buffers and summaries, then close the file.
    pub fn close(mut self) -> Result<()> {
        self.close_impl()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(JlsError::ParameterInvalid("writer is closed"));
        }
        Ok(())
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        for id in 0..SIGNAL_COUNT {
            if let Some(state) = self.signals[id].as_mut() {
                if state.params.signal_type != SignalType::Fsr {
                    continue;
                }
                Self::flush_data_chunk(&mut self.raw, &mut self.buf, state, id as u16)?;
                for level in 1..SUMMARY_LEVEL_COUNT {
                    if !state.levels[level].summary.is_empty() {
                        Self::flush_summary_level(
                            &mut self.raw,
                            &mut self.buf,
                            state,
                            id as u16,
                            level,
                            true,
                        )?;
                    }
                }
            }
        }
        self.closed = true;
        self.raw.close()
    }

    /// Emit the staged samples as a level-0 data chunk and feed the level-1
    /// accumulator, closing any levels that reach capacity.
    fn flush_data_chunk(
        raw: &mut Raw,
        buf: &mut Serializer,
        state: &mut SignalState,
        signal_id: u16,
    ) -> Result<()> {
        if state.sample_buffer.is_empty() {
            return Ok(());
        }
        let count = state.sample_buffer.len();
        buf.clear();
        buf.wr_i64(state.buffer_sample_id)?;
        buf.wr_u64(count as u64)?;
        for &v in &state.sample_buffer {
            buf.wr_f32(v)?;
        }
        let track = state.tracks[TrackType::Fsr as usize]
            .as_mut()
            .ok_or(JlsError::ParameterInvalid("fsr track missing"))?;
        let rec = chain_append(
            raw,
            &mut track.data_mra,
            track_tag(TrackType::Fsr, TrackRole::Data),
            signal_id,
            buf.as_slice(),
        )?;
        track.head[0] = rec.offset;
        head_write(raw, track)?;

        let level1 = &mut state.levels[1];
        if level1.summary.is_empty() && level1.index.is_empty() {
            level1.timestamp = state.buffer_sample_id;
        }
        level1.index.push(rec.offset);
        let sdf = state.params.sample_decimate_factor as usize;
        for group in state.sample_buffer.chunks(sdf) {
            level1.summary.push(SummaryEntry::from_samples(group));
        }
        state.buffer_sample_id += count as i64;
        state.sample_buffer.clear();

        let eps = state.params.entries_per_summary as usize;
        let mut level = 1;
        while level < SUMMARY_LEVEL_COUNT && state.levels[level].summary.len() >= eps {
            Self::flush_summary_level(raw, buf, state, signal_id, level, false)?;
            level += 1;
        }
        Ok(())
    }

    /// Emit one level's staged INDEX + SUMMARY chunk pair, update the HEAD,
    /// and feed the level above. During the final flush a level feeds upward
    /// only if the level above already exists, so small captures do not grow
    /// a tower of single-child indices.
    fn flush_summary_level(
        raw: &mut Raw,
        buf: &mut Serializer,
        state: &mut SignalState,
        signal_id: u16,
        level: usize,
        is_final: bool,
    ) -> Result<()> {
        let timestamp = state.levels[level].timestamp;
        let index = std::mem::take(&mut state.levels[level].index);
        let entries = std::mem::take(&mut state.levels[level].summary);
        if entries.is_empty() {
            return Ok(());
        }
        let meta = (signal_id & SIGNAL_MASK) | ((level as u16) << 12);

        buf.clear();
        buf.wr_i64(timestamp)?;
        buf.wr_u64(index.len() as u64)?;
        for offset in &index {
            buf.wr_u64(*offset)?;
        }
        let track = state.tracks[TrackType::Fsr as usize]
            .as_mut()
            .ok_or(JlsError::ParameterInvalid("fsr track missing"))?;
        let index_rec = chain_append(
            raw,
            &mut track.index_mra[level],
            track_tag(TrackType::Fsr, TrackRole::Index),
            meta,
            buf.as_slice(),
        )?;

        buf.clear();
        buf.wr_i64(timestamp)?;
        buf.wr_u64(entries.len() as u64)?;
        for entry in &entries {
            buf.wr_bin(&entry.encode())?;
        }
        chain_append(
            raw,
            &mut track.summary_mra[level],
            track_tag(TrackType::Fsr, TrackRole::Summary),
            meta,
            buf.as_slice(),
        )?;
        track.head[level] = index_rec.offset;
        head_write(raw, track)?;
        let parent_on_disk = track.index_mra.get(level + 1).is_some_and(|m| m.is_some());

        let next = level + 1;
        if next < SUMMARY_LEVEL_COUNT {
            let parent = &mut state.levels[next];
            if !is_final || !parent.summary.is_empty() || parent_on_disk {
                if parent.summary.is_empty() && parent.index.is_empty() {
                    parent.timestamp = timestamp;
                }
                parent.index.push(index_rec.offset);
                let smf = state.params.summary_decimate_factor as usize;
                for group in entries.chunks(smf) {
                    parent.summary.push(SummaryEntry::combine(group));
                }
            }
        }
        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close_impl() {
                warn!("writer close on drop failed: {e}");
            }
        }
    }
}

fn signal_state<'a>(
    signals: &'a mut [Option<SignalState>],
    signal_id: u16,
) -> Result<&'a mut SignalState> {
    if signal_id as usize >= SIGNAL_COUNT {
        return Err(JlsError::ParameterInvalid("signal_id out of range"));
    }
    signals[signal_id as usize]
        .as_mut()
        .ok_or(JlsError::NotFound {
            kind: "signal",
            id: signal_id,
        })
}

/// Raise summary parameters to their floors and to the multiples the pyramid
/// arithmetic relies on, warning when anything changes.
fn adjust_summary_params(signal_id: u16, params: &mut SignalParams) -> Result<()> {
    if params.samples_per_data == 0 || params.sample_decimate_factor == 0 {
        return Err(JlsError::ParameterInvalid(
            "samples_per_data and sample_decimate_factor must be non-zero",
        ));
    }
    let orig = *params;
    if params.summary_decimate_factor < 10 {
        params.summary_decimate_factor = 10;
    }
    if params.entries_per_summary < 1000 {
        params.entries_per_summary = 1000;
    }
    let rem = params.samples_per_data % params.sample_decimate_factor;
    if rem != 0 {
        params.samples_per_data += params.sample_decimate_factor - rem;
    }
    let rem = params.entries_per_summary % params.summary_decimate_factor;
    if rem != 0 {
        params.entries_per_summary += params.summary_decimate_factor - rem;
    }
    // every data chunk must fall inside exactly one level-1 summary chunk
    for _ in 0..params.samples_per_data {
        let covered =
            params.entries_per_summary as u64 * params.sample_decimate_factor as u64;
        if covered % params.samples_per_data as u64 == 0 {
            break;
        }
        params.entries_per_summary += params.summary_decimate_factor;
    }
    let covered = params.entries_per_summary as u64 * params.sample_decimate_factor as u64;
    if covered % params.samples_per_data as u64 != 0 {
        return Err(JlsError::ParameterInvalid(
            "summary parameters cannot be aligned to samples_per_data",
        ));
    }
    if *params != orig {
        warn!(
            signal_id,
            samples_per_data = params.samples_per_data,
            sample_decimate_factor = params.sample_decimate_factor,
            entries_per_summary = params.entries_per_summary,
            summary_decimate_factor = params.summary_decimate_factor,
            "summary parameters adjusted"
        );
    }
    Ok(())
}

/// Append a chunk to a chain: write it with `item_prev` pointing at the
/// chain's MRA, back-patch the MRA's `item_next`, and make the new chunk the
/// MRA.
fn chain_append(
    raw: &mut Raw,
    mra: &mut Option<ChunkRecord>,
    tag: u8,
    chunk_meta: u16,
    payload: &[u8],
) -> Result<ChunkRecord> {
    let mut hdr = ChunkHeader {
        item_next: 0,
        item_prev: mra.as_ref().map_or(0, |m| m.offset),
        tag,
        rsv0: 0,
        chunk_meta,
        payload_length: 0,
        payload_prev_length: 0,
        crc32: 0,
    };
    let offset = raw.wr(&mut hdr, payload)?;
    if let Some(prev) = mra.as_mut() {
        prev.hdr.item_next = offset;
        raw.wr_header_at(prev.offset, &prev.hdr)?;
    }
    let rec = ChunkRecord { offset, hdr };
    *mra = Some(rec);
    Ok(rec)
}

/// Rewrite a track's HEAD chunk payload in place.
fn head_write(raw: &mut Raw, track: &TrackState) -> Result<()> {
    let mut payload = [0u8; SUMMARY_LEVEL_COUNT * 8];
    for (slot, offset) in payload.chunks_exact_mut(8).zip(track.head.iter()) {
        slot.copy_from_slice(&offset.to_le_bytes());
    }
    raw.wr_payload_at(track.head_offset, &track.head_hdr, &payload)
}

fn wr_body(buf: &mut Serializer, data: &UserData) -> Result<()> {
    match data {
        UserData::Binary(bytes) => buf.wr_bin(bytes),
        UserData::String(s) | UserData::Json(s) => {
            buf.wr_bin(s.as_bytes())?;
            buf.wr_u8(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_adjust_summary_params_floors() {
        let mut p = SignalParams {
            source_id: 1,
            signal_type: SignalType::Fsr,
            data_type: crate::types::DataType::F32,
            sample_rate: 1000,
            samples_per_data: 1000,
            sample_decimate_factor: 100,
            entries_per_summary: 10,
            summary_decimate_factor: 2,
            utc_rate_auto: 0,
        };
        adjust_summary_params(1, &mut p).unwrap();
        assert!(p.summary_decimate_factor >= 10);
        assert!(p.entries_per_summary >= 1000);
        assert_eq!(p.entries_per_summary % p.summary_decimate_factor, 0);
        assert_eq!(
            (p.entries_per_summary as u64 * p.sample_decimate_factor as u64)
                % p.samples_per_data as u64,
            0
        );
    }

    #[test]
    fn test_adjust_summary_params_multiples() {
        let mut p = SignalParams {
            source_id: 1,
            signal_type: SignalType::Fsr,
            data_type: crate::types::DataType::F32,
            sample_rate: 1000,
            samples_per_data: 999,
            sample_decimate_factor: 100,
            entries_per_summary: 1003,
            summary_decimate_factor: 13,
            utc_rate_auto: 0,
        };
        adjust_summary_params(2, &mut p).unwrap();
        assert_eq!(p.samples_per_data % p.sample_decimate_factor, 0);
        assert_eq!(p.entries_per_summary % p.summary_decimate_factor, 0);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let dir = tempdir().unwrap();
        let mut wr = Writer::open(dir.path().join("dup.jls")).unwrap();
        let src = SourceDef {
            source_id: 1,
            name: "a",
            vendor: "",
            model: "",
            version: "",
            serial_number: "",
        };
        wr.source_def(&src).unwrap();
        assert!(matches!(
            wr.source_def(&src),
            Err(JlsError::AlreadyExists {
                kind: "source",
                id: 1
            })
        ));
        wr.close().unwrap();
    }

    #[test]
    fn test_signal_def_unknown_source() {
        let dir = tempdir().unwrap();
        let mut wr = Writer::open(dir.path().join("nosrc.jls")).unwrap();
        let result = wr.signal_def(&SignalDef {
            signal_id: 7,
            source_id: 99,
            sample_rate: 1000,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(JlsError::NotFound {
                kind: "source",
                id: 99
            })
        ));
        wr.close().unwrap();
    }

    #[test]
    fn test_fsr_write_to_vsr_rejected() {
        let dir = tempdir().unwrap();
        let mut wr = Writer::open(dir.path().join("vsr.jls")).unwrap();
        // signal 0 is the reserved VSR signal
        assert!(matches!(
            wr.fsr_f32(0, 0, &[1.0]),
            Err(JlsError::NotSupported(_))
        ));
        assert!(matches!(
            wr.vsr_f32(0, 0, &[1.0]),
            Err(JlsError::NotSupported(_))
        ));
        wr.close().unwrap();
    }

    #[test]
    fn test_fsr_requires_sample_rate() {
        let dir = tempdir().unwrap();
        let mut wr = Writer::open(dir.path().join("rate.jls")).unwrap();
        let result = wr.signal_def(&SignalDef {
            signal_id: 1,
            source_id: 0,
            sample_rate: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(JlsError::ParameterInvalid(_))));
        wr.close().unwrap();
    }

    #[test]
    fn test_utc_requires_fsr_signal() {
        let dir = tempdir().unwrap();
        let mut wr = Writer::open(dir.path().join("utc.jls")).unwrap();
        assert!(matches!(
            wr.utc(0, 0, 1_600_000_000),
            Err(JlsError::NotSupported(_))
        ));
        wr.close().unwrap();
    }
}
