//! On-disk format definitions.
//!
//! A JLS file is a 32-byte file header followed by a sequence of chunks.
//! Each chunk is a 32-byte header, a payload, 0-7 zero pad bytes, and a
//! CRC32 over the payload, sized so every chunk ends on an 8-byte boundary.
//! Chunks of the same logical kind thread into doubly-linked lists through
//! the `item_next` / `item_prev` header fields (absolute file offsets,
//! 0 = none).
//!
//! Everything on disk is little-endian.

use crate::error::{JlsError, Result};

/// The file identification bytes at the start of the file.
///
/// Chosen so a text viewer shows "jlsfmt" and stops, line-ending mangling is
/// detectable, and 8-bit transparency is verified:
///
/// | Value (hex)       | Purpose                                   |
/// | ----------------- | ----------------------------------------- |
/// | 6A 6C 73 66 6D 74 | ASCII "jlsfmt"                            |
/// | 0D 0A             | DOS line ending                           |
/// | 20 0A 20          | space, UNIX line ending, space            |
/// | 1A                | Substitute (stops listing under Windows)  |
/// | 20 20             | ASCII spaces                              |
/// | B2                | Verify 8-bit data support                 |
/// | 1C                | File separator                            |
pub const FILE_IDENTIFICATION: [u8; 16] = [
    0x6a, 0x6c, 0x73, 0x66, 0x6d, 0x74, 0x0d, 0x0a, 0x20, 0x0a, 0x20, 0x1a, 0x20, 0x20, 0xb2,
    0x1c,
];

/// Format version: major8.minor8.patch16.
pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 1;
pub const VERSION_PATCH: u16 = 1;

/// Format version packed as u32.
pub const fn version_u32() -> u32 {
    ((VERSION_MAJOR as u32) << 24) | ((VERSION_MINOR as u32) << 16) | (VERSION_PATCH as u32)
}

/// Size of the file header in bytes.
pub const FILE_HEADER_SIZE: usize = 32;

/// Size of every chunk header in bytes.
pub const CHUNK_HEADER_SIZE: usize = 32;

/// Maximum number of source definitions per file. Source 0 is reserved.
pub const SOURCE_COUNT: usize = 256;

/// Maximum number of signal definitions per file. Signal 0 is reserved.
/// Must fit the 12-bit signal id field of `chunk_meta`.
pub const SIGNAL_COUNT: usize = 256;

/// Number of summary levels per sample track, including level 0 (raw data).
pub const SUMMARY_LEVEL_COUNT: usize = 8;

/// Mask selecting the signal id bits of `chunk_meta`.
pub const SIGNAL_MASK: u16 = 0x0fff;

/// String terminator: NUL then Unit Separator, so concatenated strings keep
/// recognizable boundaries even when a bare NUL appears in binary payloads.
pub const STRING_TERMINATOR: [u8; 2] = [0x00, 0x1f];

pub const TAG_INVALID: u8 = 0x00;
pub const TAG_SOURCE_DEF: u8 = 0x01;
pub const TAG_SIGNAL_DEF: u8 = 0x02;
pub const TAG_USER_DATA: u8 = 0x40;

/// Bit set on every per-track chunk tag.
const TAG_TRACK_BASE: u8 = 0x20;

/// One of the four per-signal track streams.
///
/// Encoded in bits 3-4 of a track chunk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackType {
    /// Fixed sample rate samples
    Fsr = 0,
    /// Variable sample rate samples
    Vsr = 1,
    /// Annotations
    Annotation = 2,
    /// UTC timestamp anchors
    Utc = 3,
}

impl TrackType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TrackType::Fsr),
            1 => Some(TrackType::Vsr),
            2 => Some(TrackType::Annotation),
            3 => Some(TrackType::Utc),
            _ => None,
        }
    }
}

/// The role of a chunk within its track, encoded in the low 3 bits of the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackRole {
    /// Marks track existence; empty payload
    Def = 0,
    /// Per-level most-recent chunk offsets; rewritten in place
    Head = 1,
    /// Level-0 sample data
    Data = 2,
    /// Per-level child chunk offsets
    Index = 3,
    /// Per-level reduction entries
    Summary = 4,
}

impl TrackRole {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TrackRole::Def),
            1 => Some(TrackRole::Head),
            2 => Some(TrackRole::Data),
            3 => Some(TrackRole::Index),
            4 => Some(TrackRole::Summary),
            _ => None,
        }
    }
}

/// Decoded chunk tag: an 8-bit discriminant over a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    SourceDef,
    SignalDef,
    UserData,
    Track(TrackType, TrackRole),
}

impl Tag {
    pub fn to_u8(self) -> u8 {
        match self {
            Tag::SourceDef => TAG_SOURCE_DEF,
            Tag::SignalDef => TAG_SIGNAL_DEF,
            Tag::UserData => TAG_USER_DATA,
            Tag::Track(track, role) => TAG_TRACK_BASE | ((track as u8) << 3) | (role as u8),
        }
    }

    /// Decode a tag byte. Returns `None` for unknown tags, which the reader
    /// skips with a warning.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            TAG_SOURCE_DEF => Some(Tag::SourceDef),
            TAG_SIGNAL_DEF => Some(Tag::SignalDef),
            TAG_USER_DATA => Some(Tag::UserData),
            v if v & TAG_TRACK_BASE != 0 && v & 0xc0 == 0 => {
                let track = TrackType::from_u8((v >> 3) & 0x3)?;
                let role = TrackRole::from_u8(v & 0x7)?;
                Some(Tag::Track(track, role))
            }
            _ => None,
        }
    }
}

/// Shorthand for the raw tag byte of a track chunk.
pub fn track_tag(track: TrackType, role: TrackRole) -> u8 {
    Tag::Track(track, role).to_u8()
}

/// Zero padding after a payload so that payload + pad + CRC ends on a
/// multiple of 8 bytes.
pub fn payload_pad(payload_length: u32) -> u32 {
    let pad = (payload_length + 4) & 7;
    if pad == 0 {
        0
    } else {
        8 - pad
    }
}

/// Bytes a payload occupies on disk: payload, pad, payload CRC32.
pub fn payload_size_on_disk(payload_length: u32) -> u32 {
    payload_length + payload_pad(payload_length) + 4
}

/// The JLS file header.
///
/// `length` is the total file size in bytes, back-patched as the last write
/// on graceful close. A value of 0 marks a file that was never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub length: u64,
    pub version: u32,
}

impl FileHeader {
    pub fn new(length: u64) -> Self {
        Self {
            length,
            version: version_u32(),
        }
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[..16].copy_from_slice(&FILE_IDENTIFICATION);
        buf[16..24].copy_from_slice(&self.length.to_le_bytes());
        buf[24..28].copy_from_slice(&self.version.to_le_bytes());
        let crc = crc32fast::hash(&buf[..28]);
        buf[28..32].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; FILE_HEADER_SIZE]) -> Result<Self> {
        let crc = crc32fast::hash(&buf[..28]);
        let stored = u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        if crc != stored {
            return Err(JlsError::ChecksumMismatch {
                offset: 0,
                expected: stored,
                actual: crc,
            });
        }
        if buf[..16] != FILE_IDENTIFICATION {
            return Err(JlsError::UnsupportedFile("bad identification bytes"));
        }
        let version = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);
        if (version >> 24) as u8 != VERSION_MAJOR {
            return Err(JlsError::UnsupportedFile("unsupported major version"));
        }
        let length = u64::from_le_bytes([
            buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22], buf[23],
        ]);
        Ok(Self { length, version })
    }
}

/// The header that starts every chunk.
///
/// `item_next` / `item_prev` thread chunks of one logical kind into a doubly
/// linked list. `payload_prev_length` is the payload length of the chunk
/// immediately before this one in file order (any kind), enabling backward
/// streaming without a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkHeader {
    pub item_next: u64,
    pub item_prev: u64,
    pub tag: u8,
    pub rsv0: u8,
    pub chunk_meta: u16,
    pub payload_length: u32,
    pub payload_prev_length: u32,
    pub crc32: u32,
}

impl ChunkHeader {
    /// Encode to 32 bytes, computing the header CRC over the first 28.
    pub fn encode(&mut self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut buf = [0u8; CHUNK_HEADER_SIZE];
        buf[..8].copy_from_slice(&self.item_next.to_le_bytes());
        buf[8..16].copy_from_slice(&self.item_prev.to_le_bytes());
        buf[16] = self.tag;
        buf[17] = self.rsv0;
        buf[18..20].copy_from_slice(&self.chunk_meta.to_le_bytes());
        buf[20..24].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[24..28].copy_from_slice(&self.payload_prev_length.to_le_bytes());
        self.crc32 = crc32fast::hash(&buf[..28]);
        buf[28..32].copy_from_slice(&self.crc32.to_le_bytes());
        buf
    }

    /// Decode 32 bytes, verifying the header CRC.
    ///
    /// `offset` is only used for error context.
    pub fn decode(buf: &[u8; CHUNK_HEADER_SIZE], offset: u64) -> Result<Self> {
        let crc = crc32fast::hash(&buf[..28]);
        let stored = u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        if crc != stored {
            return Err(JlsError::ChecksumMismatch {
                offset,
                expected: stored,
                actual: crc,
            });
        }
        Ok(Self {
            item_next: u64::from_le_bytes(buf[..8].try_into().expect("slice length 8")),
            item_prev: u64::from_le_bytes(buf[8..16].try_into().expect("slice length 8")),
            tag: buf[16],
            rsv0: buf[17],
            chunk_meta: u16::from_le_bytes([buf[18], buf[19]]),
            payload_length: u32::from_le_bytes(buf[20..24].try_into().expect("slice length 4")),
            payload_prev_length: u32::from_le_bytes(
                buf[24..28].try_into().expect("slice length 4"),
            ),
            crc32: stored,
        })
    }

    /// Summary level carried in the high nibble of `chunk_meta`.
    pub fn level(&self) -> u8 {
        (self.chunk_meta >> 12) as u8
    }

    /// Signal id carried in the low 12 bits of `chunk_meta`.
    pub fn signal_id(&self) -> u16 {
        self.chunk_meta & SIGNAL_MASK
    }
}
