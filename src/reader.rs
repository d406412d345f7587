//! JLS file reader.
//!
//! On open, the reader scans forward from the start of the file to locate
//! the first source-def, signal-def, and user-data chunks, then walks the
//! per-kind item chains to materialize its in-RAM directory. Length queries,
//! point seeks, sample reads, and range statistics then navigate the summary
//! pyramid in O(log N): the track HEAD chunk names the most recent chunk at
//! every level, and each INDEX chunk names the chunks of the level below.
//!
//! A single growable payload buffer holds the bytes of one chunk at a time;
//! descriptor strings are interned in a [`StringArena`] that lives until
//! close.

use std::path::Path;

use tracing::{debug, warn};

use crate::arena::{StrRef, StringArena};
use crate::error::{JlsError, Result};
use crate::format::{
    ChunkHeader, Tag, TrackRole, TrackType, SIGNAL_COUNT, SIGNAL_MASK, SOURCE_COUNT,
    SUMMARY_LEVEL_COUNT, TAG_SIGNAL_DEF, TAG_SOURCE_DEF, TAG_USER_DATA,
};
use crate::raw::{OpenMode, Raw};
use crate::types::{
    legal_tracks, DataType, SignalDef, SignalParams, SignalType, SourceDef, StorageType,
    SummaryEntry, UserDataEntry,
};
use crate::writer::{SIGNAL_DEF_RESERVED, SOURCE_DEF_RESERVED};

/// Initial payload buffer capacity: 32 MiB, grown by doubling on demand.
const PAYLOAD_BUFFER_SIZE_DEFAULT: usize = 1 << 25;

/// A chunk's offset and header, cached for chain walking.
#[derive(Debug, Clone, Copy)]
struct ChunkCursor {
    offset: u64,
    hdr: ChunkHeader,
}

#[derive(Default)]
struct SourceEntry {
    defined: bool,
    name: StrRef,
    vendor: StrRef,
    model: StrRef,
    version: StrRef,
    serial_number: StrRef,
}

struct SignalEntry {
    defined: bool,
    params: SignalParams,
    name: StrRef,
    si_units: StrRef,
    /// Directory state kept for chain repair and future track readers.
    #[allow(dead_code)]
    track_defs: [u64; 4],
    #[allow(dead_code)]
    track_head_offsets: [u64; 4],
    track_head_data: [[u64; SUMMARY_LEVEL_COUNT]; 4],
}

impl Default for SignalEntry {
    fn default() -> Self {
        Self {
            defined: false,
            params: SignalParams {
                source_id: 0,
                signal_type: SignalType::Vsr,
                data_type: DataType::F32,
                sample_rate: 0,
                samples_per_data: 0,
                sample_decimate_factor: 0,
                entries_per_summary: 0,
                summary_decimate_factor: 0,
                utc_rate_auto: 0,
            },
            name: StrRef::default(),
            si_units: StrRef::default(),
            track_defs: [0; 4],
            track_head_offsets: [0; 4],
            track_head_data: [[0; SUMMARY_LEVEL_COUNT]; 4],
        }
    }
}

/// Streaming payload parser with truncation checks.
struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(JlsError::ParameterInvalid("payload truncated"));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Parse a `{0x00, 0x1F}`-terminated UTF-8 string.
    fn str_(&mut self) -> Result<&'a str> {
        let rel = self.buf[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(JlsError::ParameterInvalid("unterminated string"))?;
        let bytes = &self.buf[self.pos..self.pos + rel];
        self.pos += rel + 1;
        if self.pos < self.buf.len() && self.buf[self.pos] == 0x1f {
            self.pos += 1;
        }
        std::str::from_utf8(bytes)
            .map_err(|_| JlsError::ParameterInvalid("string is not valid utf-8"))
    }
}

/// JLS reader. Owned by exactly one caller; all I/O is synchronous.
pub struct Reader {
    raw: Raw,
    payload: Vec<u8>,
    cur: Option<ChunkCursor>,
    arena: StringArena,
    sources: Vec<SourceEntry>,
    signals: Vec<SignalEntry>,
    source_head: Option<ChunkCursor>,
    signal_head: Option<ChunkCursor>,
    user_data_head: Option<ChunkCursor>,
    user_data_cur: Option<ChunkCursor>,
}

impl Reader {
    /// Open a JLS file and build the in-RAM directory.
    ///
    /// Files whose tail was truncated by a crash still open; reads past the
    /// truncation return [`JlsError::Empty`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = Raw::open(path, OpenMode::Read)?;
        if raw.file_header().length == 0 {
            warn!("file was not closed gracefully");
        }
        let mut sources = Vec::with_capacity(SOURCE_COUNT);
        sources.resize_with(SOURCE_COUNT, SourceEntry::default);
        let mut signals = Vec::with_capacity(SIGNAL_COUNT);
        signals.resize_with(SIGNAL_COUNT, SignalEntry::default);
        let mut rd = Self {
            raw,
            payload: vec![0; PAYLOAD_BUFFER_SIZE_DEFAULT],
            cur: None,
            arena: StringArena::new(),
            sources,
            signals,
            source_head: None,
            signal_head: None,
            user_data_head: None,
            user_data_cur: None,
        };
        rd.scan()?;
        Ok(rd)
    }

    /// Read the current chunk into the payload buffer, growing it by
    /// doubling when the chunk is larger.
    fn rd(&mut self) -> Result<()> {
        loop {
            let offset = self.raw.chunk_tell();
            match self.raw.rd(&mut self.payload) {
                Ok(hdr) => {
                    self.cur = Some(ChunkCursor { offset, hdr });
                    return Ok(());
                }
                Err(JlsError::TooBig { needed, .. }) => {
                    let mut size = self.payload.len().max(1);
                    while size < needed {
                        size *= 2;
                    }
                    debug!(size, "growing payload buffer");
                    self.payload.resize(size, 0);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn read_chunk_at(&mut self, offset: u64) -> Result<()> {
        self.raw.chunk_seek(offset)?;
        self.rd()
    }

    /// Locate the first source-def, signal-def, and user-data chunks by
    /// scanning forward, then walk the definition chains.
    fn scan(&mut self) -> Result<()> {
        let mut found = 0u8;
        let mut chunk_count = 0u32;
        while found != 0b111 {
            if chunk_count == 3 {
                warn!("malformed head, continuing scan");
            }
            match self.rd() {
                Ok(()) => {}
                Err(JlsError::Empty) => break,
                Err(JlsError::ChecksumMismatch { offset, .. }) => {
                    warn!(offset, "corrupt chunk terminates scan");
                    break;
                }
                Err(e) => return Err(e),
            }
            let Some(cur) = self.cur else { break };
            match cur.hdr.tag {
                TAG_USER_DATA => {
                    found |= 1;
                    if self.user_data_head.is_none() {
                        self.user_data_head = Some(cur);
                        self.user_data_cur = Some(cur);
                    }
                }
                TAG_SOURCE_DEF => {
                    found |= 2;
                    if self.source_head.is_none() {
                        self.source_head = Some(cur);
                    }
                }
                TAG_SIGNAL_DEF => {
                    found |= 4;
                    if self.signal_head.is_none() {
                        self.signal_head = Some(cur);
                    }
                }
                _ => {}
            }
            chunk_count += 1;
        }
        if let Some(head) = self.source_head {
            self.scan_sources(head.offset)?;
        }
        if let Some(head) = self.signal_head {
            self.scan_signals(head.offset)?;
        }
        Ok(())
    }

    fn scan_sources(&mut self, head_offset: u64) -> Result<()> {
        self.read_chunk_at(head_offset)?;
        loop {
            let Some(cur) = self.cur else { break };
            let source_id = cur.hdr.chunk_meta;
            if source_id as usize >= SOURCE_COUNT {
                warn!(source_id, "source_id too big, skipping");
            } else {
                let mut p = Parser::new(&self.payload[..cur.hdr.payload_length as usize]);
                p.skip(SOURCE_DEF_RESERVED)?;
                let name = self.arena.intern(p.str_()?)?;
                let vendor = self.arena.intern(p.str_()?)?;
                let model = self.arena.intern(p.str_()?)?;
                let version = self.arena.intern(p.str_()?)?;
                let serial_number = self.arena.intern(p.str_()?)?;
                self.sources[source_id as usize] = SourceEntry {
                    defined: true,
                    name,
                    vendor,
                    model,
                    version,
                    serial_number,
                };
                debug!(source_id, "found source");
            }
            if cur.hdr.item_next == 0 {
                break;
            }
            self.read_chunk_at(cur.hdr.item_next)?;
        }
        Ok(())
    }

    fn scan_signals(&mut self, head_offset: u64) -> Result<()> {
        self.read_chunk_at(head_offset)?;
        loop {
            let Some(cur) = self.cur else { break };
            match Tag::from_u8(cur.hdr.tag) {
                Some(Tag::SignalDef) => {
                    if let Err(e) = self.handle_signal_def(&cur) {
                        warn!(offset = cur.offset, error = %e, "skipping signal def");
                    }
                }
                Some(Tag::Track(track, TrackRole::Def)) => self.handle_track_def(&cur, track),
                Some(Tag::Track(track, TrackRole::Head)) => self.handle_track_head(&cur, track),
                _ => warn!(tag = cur.hdr.tag, "unknown tag in signal list"),
            }
            if cur.hdr.item_next == 0 {
                break;
            }
            self.read_chunk_at(cur.hdr.item_next)?;
        }
        Ok(())
    }

    fn handle_signal_def(&mut self, cur: &ChunkCursor) -> Result<()> {
        let signal_id = cur.hdr.signal_id();
        if signal_id as usize >= SIGNAL_COUNT {
            warn!(signal_id, "signal_id too big, skipping");
            return Ok(());
        }
        let mut p = Parser::new(&self.payload[..cur.hdr.payload_length as usize]);
        let source_id = p.u16()?;
        let signal_type_raw = p.u8()?;
        p.skip(1)?;
        let data_type_raw = p.u32()?;
        let sample_rate = p.u32()?;
        let samples_per_data = p.u32()?;
        let sample_decimate_factor = p.u32()?;
        let entries_per_summary = p.u32()?;
        let summary_decimate_factor = p.u32()?;
        let utc_rate_auto = p.u32()?;
        p.skip(SIGNAL_DEF_RESERVED)?;
        let name_str = p.str_()?;
        let si_units_str = p.str_()?;

        let Some(signal_type) = SignalType::from_u8(signal_type_raw) else {
            warn!(signal_id, signal_type_raw, "invalid signal_type, skipping");
            return Ok(());
        };
        let Some(data_type) = DataType::from_u32(data_type_raw) else {
            warn!(signal_id, data_type_raw, "unsupported data_type, skipping");
            return Ok(());
        };
        if source_id as usize >= SOURCE_COUNT || !self.sources[source_id as usize].defined {
            warn!(signal_id, source_id, "source not found, skipping signal");
            return Ok(());
        }
        let name = self.arena.intern(name_str)?;
        let si_units = self.arena.intern(si_units_str)?;
        let entry = &mut self.signals[signal_id as usize];
        entry.params = SignalParams {
            source_id,
            signal_type,
            data_type,
            sample_rate,
            samples_per_data,
            sample_decimate_factor,
            entries_per_summary,
            summary_decimate_factor,
            utc_rate_auto,
        };
        entry.name = name;
        entry.si_units = si_units;
        entry.defined = true;
        debug!(signal_id, "found signal");
        Ok(())
    }

    fn track_valid(&self, signal_id: u16, track: TrackType) -> bool {
        let id = signal_id as usize;
        if id >= SIGNAL_COUNT || !self.signals[id].defined {
            warn!(signal_id, "track for undefined signal, skipping");
            return false;
        }
        if !legal_tracks(self.signals[id].params.signal_type).contains(&track) {
            warn!(signal_id, ?track, "track not legal for signal type, skipping");
            return false;
        }
        true
    }

    fn handle_track_def(&mut self, cur: &ChunkCursor, track: TrackType) {
        let signal_id = cur.hdr.signal_id();
        if !self.track_valid(signal_id, track) {
            return;
        }
        self.signals[signal_id as usize].track_defs[track as usize] = cur.offset;
    }

    fn handle_track_head(&mut self, cur: &ChunkCursor, track: TrackType) {
        let signal_id = cur.hdr.signal_id();
        if !self.track_valid(signal_id, track) {
            return;
        }
        let expect = SUMMARY_LEVEL_COUNT * 8;
        if cur.hdr.payload_length as usize != expect {
            warn!(
                signal_id,
                size = cur.hdr.payload_length,
                expect,
                "bad track head size, skipping"
            );
            return;
        }
        let entry = &mut self.signals[signal_id as usize];
        entry.track_head_offsets[track as usize] = cur.offset;
        for (level, slot) in entry.track_head_data[track as usize].iter_mut().enumerate() {
            let base = level * 8;
            *slot = u64::from_le_bytes(
                self.payload[base..base + 8]
                    .try_into()
                    .expect("slice length 8"),
            );
        }
    }

    /// Defined sources in id order. The reserved global annotation source
    /// (id 0) is not listed.
    pub fn sources(&self) -> Vec<SourceDef<'_>> {
        (1..SOURCE_COUNT)
            .filter(|&i| self.sources[i].defined)
            .map(|i| {
                let e = &self.sources[i];
                SourceDef {
                    source_id: i as u16,
                    name: self.arena.resolve(e.name),
                    vendor: self.arena.resolve(e.vendor),
                    model: self.arena.resolve(e.model),
                    version: self.arena.resolve(e.version),
                    serial_number: self.arena.resolve(e.serial_number),
                }
            })
            .collect()
    }

    /// Defined signals in id order. The reserved global annotation signal
    /// (id 0) is not listed.
    pub fn signals(&self) -> Vec<SignalDef<'_>> {
        (1..SIGNAL_COUNT)
            .filter(|&i| self.signals[i].defined)
            .map(|i| {
                let e = &self.signals[i];
                SignalDef {
                    signal_id: i as u16,
                    source_id: e.params.source_id,
                    signal_type: e.params.signal_type,
                    data_type: e.params.data_type,
                    sample_rate: e.params.sample_rate,
                    samples_per_data: e.params.samples_per_data,
                    sample_decimate_factor: e.params.sample_decimate_factor,
                    entries_per_summary: e.params.entries_per_summary,
                    summary_decimate_factor: e.params.summary_decimate_factor,
                    utc_rate_auto: e.params.utc_rate_auto,
                    name: self.arena.resolve(e.name),
                    si_units: self.arena.resolve(e.si_units),
                }
            })
            .collect()
    }

    fn fsr_signal(&self, signal_id: u16) -> Result<(SignalParams, [u64; SUMMARY_LEVEL_COUNT])> {
        let id = (signal_id & SIGNAL_MASK) as usize;
        if id >= SIGNAL_COUNT || !self.signals[id].defined {
            return Err(JlsError::NotFound {
                kind: "signal",
                id: signal_id,
            });
        }
        let entry = &self.signals[id];
        if entry.params.signal_type != SignalType::Fsr {
            return Err(JlsError::NotSupported("operation requires an fsr signal"));
        }
        Ok((
            entry.params,
            entry.track_head_data[TrackType::Fsr as usize],
        ))
    }

    /// Parse the `(timestamp, count)` prefix of a data, index, or summary
    /// payload.
    fn payload_header(&self) -> Result<(i64, u64)> {
        let cur = self.cur.ok_or(JlsError::Empty)?;
        if (cur.hdr.payload_length as usize) < 16 {
            return Err(JlsError::ParameterInvalid("payload truncated"));
        }
        let ts = i64::from_le_bytes(self.payload[..8].try_into().expect("slice length 8"));
        let count = u64::from_le_bytes(self.payload[8..16].try_into().expect("slice length 8"));
        Ok((ts, count))
    }

    /// Child offset `index` of the current INDEX chunk.
    fn index_child(&self, index: u64) -> Result<u64> {
        let cur = self.cur.ok_or(JlsError::Empty)?;
        let base = 16 + index as usize * 8;
        if base + 8 > cur.hdr.payload_length as usize {
            return Err(JlsError::ParameterInvalid("index entry out of range"));
        }
        Ok(u64::from_le_bytes(
            self.payload[base..base + 8]
                .try_into()
                .expect("slice length 8"),
        ))
    }

    /// Entry `index` of the current SUMMARY chunk.
    fn summary_entry(&self, index: usize) -> Result<SummaryEntry> {
        let cur = self.cur.ok_or(JlsError::Empty)?;
        let base = 16 + index * SummaryEntry::SIZE;
        if base + SummaryEntry::SIZE > cur.hdr.payload_length as usize {
            return Err(JlsError::ParameterInvalid("summary entry out of range"));
        }
        Ok(SummaryEntry::decode(&self.payload[base..]))
    }

    /// Number of samples stored for an FSR signal.
    ///
    /// Descends from the highest non-zero HEAD level through the last index
    /// entry at each level to the final level-0 data chunk.
    pub fn fsr_length(&mut self, signal_id: u16) -> Result<i64> {
        let (_, offsets) = self.fsr_signal(signal_id)?;
        let Some(top) = (0..SUMMARY_LEVEL_COUNT).rev().find(|&l| offsets[l] != 0) else {
            return Ok(0);
        };
        let mut offset = offsets[top];
        for _level in (1..=top).rev() {
            self.read_chunk_at(offset)?;
            let (_, count) = self.payload_header()?;
            if count == 0 {
                return Err(JlsError::ParameterInvalid("empty index chunk"));
            }
            offset = self.index_child(count - 1)?;
        }
        self.read_chunk_at(offset)?;
        let (ts, count) = self.payload_header()?;
        Ok(ts + count as i64)
    }

    /// Descend the pyramid to the chunk at `target_level` containing
    /// `sample_id`, leaving the raw cursor positioned on it.
    fn seek(
        &mut self,
        signal_id: u16,
        params: &SignalParams,
        offsets: &[u64; SUMMARY_LEVEL_COUNT],
        target_level: usize,
        sample_id: i64,
    ) -> Result<()> {
        let Some(top) = (0..SUMMARY_LEVEL_COUNT).rev().find(|&l| offsets[l] != 0) else {
            return Err(JlsError::NotFound {
                kind: "sample data for signal",
                id: signal_id,
            });
        };
        let mut offset = offsets[top];
        for level in ((target_level + 1)..=top).rev() {
            self.read_chunk_at(offset)?;
            let (ts, count) = self.payload_header()?;
            if count == 0 {
                return Err(JlsError::ParameterInvalid("empty index chunk"));
            }
            let step = params.child_step(level);
            let mut idx = if sample_id > ts {
                (sample_id - ts) / step
            } else {
                0
            };
            if idx >= count as i64 {
                idx = count as i64 - 1;
            }
            offset = self.index_child(idx as u64)?;
        }
        self.raw.chunk_seek(offset)?;
        Ok(())
    }

    /// Read FSR f32 samples starting at `start_sample_id` until `out` is
    /// full. Returns `Empty` if the signal ends (or the file is truncated)
    /// before `out` is filled.
    pub fn fsr_f32(&mut self, signal_id: u16, start_sample_id: i64, out: &mut [f32]) -> Result<()> {
        let (params, offsets) = self.fsr_signal(signal_id)?;
        if out.is_empty() {
            return Ok(());
        }
        self.seek(signal_id, &params, &offsets, 0, start_sample_id)?;
        let mut wanted = start_sample_id;
        let mut out_pos = 0usize;
        loop {
            self.rd()?;
            let cur = self.cur.ok_or(JlsError::Empty)?;
            let (ts, count) = self.payload_header()?;
            if wanted < ts {
                // clamped descent can land one chunk late
                if cur.hdr.item_prev == 0 {
                    return Err(JlsError::ParameterInvalid("sample_id before signal start"));
                }
                self.raw.chunk_seek(cur.hdr.item_prev)?;
                continue;
            }
            if wanted >= ts + count as i64 {
                if cur.hdr.item_next == 0 {
                    return Err(JlsError::Empty);
                }
                self.raw.chunk_seek(cur.hdr.item_next)?;
                continue;
            }
            let idx = (wanted - ts) as usize;
            if 16 + count as usize * 4 > cur.hdr.payload_length as usize {
                return Err(JlsError::ParameterInvalid("data payload truncated"));
            }
            let n = (count as usize - idx).min(out.len() - out_pos);
            for (i, slot) in out[out_pos..out_pos + n].iter_mut().enumerate() {
                let base = 16 + (idx + i) * 4;
                *slot = f32::from_le_bytes(
                    self.payload[base..base + 4]
                        .try_into()
                        .expect("slice length 4"),
                );
            }
            out_pos += n;
            wanted += n as i64;
            if out_pos == out.len() {
                return Ok(());
            }
            if cur.hdr.item_next == 0 {
                return Err(JlsError::Empty);
            }
            self.raw.chunk_seek(cur.hdr.item_next)?;
        }
    }

    /// Range statistics: each `out` entry summarizes `increment` samples
    /// starting at `start_sample_id`.
    ///
    /// Uses the deepest summary level whose per-entry coverage divides
    /// `increment`; falls back to a single streaming pass over the raw data
    /// chunks when no level qualifies. The start position is aligned down to
    /// the chosen level's entry grid.
    pub fn fsr_f32_statistics(
        &mut self,
        signal_id: u16,
        start_sample_id: i64,
        increment: i64,
        out: &mut [SummaryEntry],
    ) -> Result<()> {
        let (params, offsets) = self.fsr_signal(signal_id)?;
        if increment < 1 {
            return Err(JlsError::ParameterInvalid("increment must be positive"));
        }
        if out.is_empty() {
            return Ok(());
        }
        let mut level = 0usize;
        for k in 1..SUMMARY_LEVEL_COUNT {
            let cov = params.entry_coverage(k);
            if offsets[k] != 0 && cov <= increment && increment % cov == 0 {
                level = k;
            }
        }
        if level == 0 {
            return self.statistics_from_samples(
                signal_id,
                &params,
                &offsets,
                start_sample_id,
                increment,
                out,
            );
        }
        let per_entry = params.entry_coverage(level);
        let entries_per_out = (increment / per_entry) as usize;

        self.seek(signal_id, &params, &offsets, level, start_sample_id)?;
        // the paired SUMMARY chunk immediately follows its INDEX chunk
        let hdr = self.raw.chunk_next()?;
        if Tag::from_u8(hdr.tag) != Some(Tag::Track(TrackType::Fsr, TrackRole::Summary)) {
            return Err(JlsError::ParameterInvalid("summary chunk missing"));
        }
        self.rd()?;
        let (ts, mut count) = self.payload_header()?;
        let mut entry_idx = if start_sample_id > ts {
            ((start_sample_id - ts) / per_entry) as usize
        } else {
            0
        };
        let mut group = Vec::with_capacity(entries_per_out);
        for slot in out.iter_mut() {
            group.clear();
            while group.len() < entries_per_out {
                if entry_idx >= count as usize {
                    let cur = self.cur.ok_or(JlsError::Empty)?;
                    if cur.hdr.item_next == 0 {
                        return Err(JlsError::Empty);
                    }
                    self.raw.chunk_seek(cur.hdr.item_next)?;
                    self.rd()?;
                    entry_idx -= count as usize;
                    let (_, next_count) = self.payload_header()?;
                    count = next_count;
                    continue;
                }
                group.push(self.summary_entry(entry_idx)?);
                entry_idx += 1;
            }
            *slot = SummaryEntry::combine(&group);
        }
        Ok(())
    }

    /// Statistics fallback: one streaming pass over the level-0 data chunks.
    fn statistics_from_samples(
        &mut self,
        signal_id: u16,
        params: &SignalParams,
        offsets: &[u64; SUMMARY_LEVEL_COUNT],
        start_sample_id: i64,
        increment: i64,
        out: &mut [SummaryEntry],
    ) -> Result<()> {
        self.seek(signal_id, params, offsets, 0, start_sample_id)?;
        let mut wanted = start_sample_id;
        let mut out_idx = 0usize;
        let mut acc_count = 0i64;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        loop {
            self.rd()?;
            let cur = self.cur.ok_or(JlsError::Empty)?;
            let (ts, count) = self.payload_header()?;
            if wanted < ts {
                if cur.hdr.item_prev == 0 {
                    return Err(JlsError::ParameterInvalid("sample_id before signal start"));
                }
                self.raw.chunk_seek(cur.hdr.item_prev)?;
                continue;
            }
            if wanted >= ts + count as i64 {
                if cur.hdr.item_next == 0 {
                    return Err(JlsError::Empty);
                }
                self.raw.chunk_seek(cur.hdr.item_next)?;
                continue;
            }
            if 16 + count as usize * 4 > cur.hdr.payload_length as usize {
                return Err(JlsError::ParameterInvalid("data payload truncated"));
            }
            let mut idx = (wanted - ts) as usize;
            while idx < count as usize {
                let base = 16 + idx * 4;
                let v = f32::from_le_bytes(
                    self.payload[base..base + 4]
                        .try_into()
                        .expect("slice length 4"),
                );
                sum += v as f64;
                sum_sq += v as f64 * v as f64;
                min = min.min(v);
                max = max.max(v);
                acc_count += 1;
                idx += 1;
                wanted += 1;
                if acc_count == increment {
                    let mean = sum / increment as f64;
                    let var = (sum_sq / increment as f64 - mean * mean).max(0.0);
                    out[out_idx] = SummaryEntry {
                        mean: mean as f32,
                        min,
                        max,
                        std: var.sqrt() as f32,
                    };
                    out_idx += 1;
                    acc_count = 0;
                    sum = 0.0;
                    sum_sq = 0.0;
                    min = f32::INFINITY;
                    max = f32::NEG_INFINITY;
                    if out_idx == out.len() {
                        return Ok(());
                    }
                }
            }
            if cur.hdr.item_next == 0 {
                return Err(JlsError::Empty);
            }
            self.raw.chunk_seek(cur.hdr.item_next)?;
        }
    }

    /// Annotation reads are an extension point.
    pub fn annotations(&mut self, _signal_id: u16) -> Result<()> {
        Err(JlsError::NotSupported("annotation read"))
    }

    /// Rewind user-data iteration to the start of the chain.
    pub fn user_data_reset(&mut self) -> Result<()> {
        self.user_data_cur = self.user_data_head;
        Ok(())
    }

    /// Advance to the next user-data chunk. `Empty` at end of chain.
    pub fn user_data_next(&mut self) -> Result<UserDataEntry<'_>> {
        let cur = self.user_data_cur.ok_or(JlsError::Empty)?;
        if cur.hdr.item_next == 0 {
            return Err(JlsError::Empty);
        }
        self.raw.chunk_seek(cur.hdr.item_next)?;
        self.rd_user_data()
    }

    /// Step back to the previous user-data chunk. Stepping onto the initial
    /// sentinel resets the cursor and returns `Empty`.
    pub fn user_data_prev(&mut self) -> Result<UserDataEntry<'_>> {
        let cur = self.user_data_cur.ok_or(JlsError::Empty)?;
        let head = self.user_data_head.ok_or(JlsError::Empty)?;
        if cur.hdr.item_prev == 0 {
            return Err(JlsError::Empty);
        }
        if cur.hdr.item_prev == head.offset {
            self.user_data_cur = Some(head);
            return Err(JlsError::Empty);
        }
        self.raw.chunk_seek(cur.hdr.item_prev)?;
        self.rd_user_data()
    }

    fn rd_user_data(&mut self) -> Result<UserDataEntry<'_>> {
        self.rd()?;
        let cur = self.cur.ok_or(JlsError::Empty)?;
        if cur.hdr.tag != TAG_USER_DATA {
            return Err(JlsError::ParameterInvalid("not a user-data chunk"));
        }
        let storage_type = StorageType::from_u8((cur.hdr.chunk_meta >> 12) as u8)
            .filter(|s| *s != StorageType::Invalid)
            .ok_or(JlsError::ParameterInvalid("invalid user-data storage type"))?;
        self.user_data_cur = Some(cur);
        Ok(UserDataEntry {
            chunk_meta: cur.hdr.chunk_meta & SIGNAL_MASK,
            storage_type,
            data: &self.payload[..cur.hdr.payload_length as usize],
        })
    }
}
