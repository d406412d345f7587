//! Raw chunk-level file access.
//!
//! This layer understands exactly one thing: the chunk framing. It reads and
//! writes 32-byte chunk headers plus variable payloads at arbitrary file
//! offsets, maintains the `payload_prev_length` linkage between consecutive
//! chunks, and supports in-place header and payload rewrites for the chains
//! maintained by the writer. It refuses misaligned seeks and never logs;
//! anomalies surface as error values.
//!
//! The cursor model follows the chunk boundaries: after a successful header
//! read the instance is positioned at the payload of the "current" chunk;
//! after a full chunk read it is positioned at the next chunk header.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{JlsError, Result};
use crate::format::{
    payload_pad, payload_size_on_disk, ChunkHeader, FileHeader, CHUNK_HEADER_SIZE,
    FILE_HEADER_SIZE,
};

/// File open disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access to an existing file.
    Read,
    /// Create or truncate; read-write (header back-patching needs reads).
    Write,
    /// Read-write on an existing file, positioned at end of file.
    Append,
}

/// Raw chunk I/O over one open file.
pub struct Raw {
    file: File,
    file_header: FileHeader,
    /// Offset of the current chunk header.
    offset: u64,
    /// Actual file position.
    fpos: u64,
    /// Header of the current chunk, if one has been read or written.
    hdr: Option<ChunkHeader>,
    /// Payload length of the most recently appended chunk (any kind).
    payload_prev_length: u32,
    write_en: bool,
    closed: bool,
}

impl Raw {
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        match mode {
            OpenMode::Write => {
                let mut file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                let file_header = FileHeader::new(0);
                file.write_all(&file_header.encode())?;
                Ok(Self {
                    file,
                    file_header,
                    offset: FILE_HEADER_SIZE as u64,
                    fpos: FILE_HEADER_SIZE as u64,
                    hdr: None,
                    payload_prev_length: 0,
                    write_en: true,
                    closed: false,
                })
            }
            OpenMode::Read => {
                let mut file = File::open(path)?;
                let file_header = read_file_header(&mut file)?;
                Ok(Self {
                    file,
                    file_header,
                    offset: FILE_HEADER_SIZE as u64,
                    fpos: FILE_HEADER_SIZE as u64,
                    hdr: None,
                    payload_prev_length: 0,
                    write_en: false,
                    closed: false,
                })
            }
            OpenMode::Append => {
                let mut file = OpenOptions::new().read(true).write(true).open(path)?;
                let file_header = read_file_header(&mut file)?;
                let end = file.seek(SeekFrom::End(0))?;
                Ok(Self {
                    file,
                    file_header,
                    offset: end,
                    fpos: end,
                    hdr: None,
                    payload_prev_length: 0,
                    write_en: true,
                    closed: false,
                })
            }
        }
    }

    /// The file header as read at open (write mode: length 0 until close).
    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    /// Header of the current chunk, if any.
    pub fn header(&self) -> Option<&ChunkHeader> {
        self.hdr.as_ref()
    }

    /// Offset of the chunk the next read will return: the current chunk when
    /// positioned at its payload, otherwise the upcoming header position.
    pub fn chunk_tell(&self) -> u64 {
        if self.hdr.is_some() && self.fpos == self.offset + CHUNK_HEADER_SIZE as u64 {
            self.offset
        } else {
            self.fpos
        }
    }

    /// Seek to a chunk boundary and read its header.
    ///
    /// Chunks always start at 8-byte-aligned offsets past the file header;
    /// anything else is refused without touching the cursor.
    pub fn chunk_seek(&mut self, offset: u64) -> Result<()> {
        if offset < FILE_HEADER_SIZE as u64 || offset % 8 != 0 {
            return Err(JlsError::ParameterInvalid("misaligned chunk seek"));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.fpos = offset;
        self.rd_header()?;
        Ok(())
    }

    /// Read the chunk header at the current position.
    ///
    /// Returns `Empty` at end of file (including a header truncated by an
    /// interrupted write).
    pub fn rd_header(&mut self) -> Result<ChunkHeader> {
        self.offset = self.fpos;
        self.hdr = None;
        let mut buf = [0u8; CHUNK_HEADER_SIZE];
        let n = read_up_to(&mut self.file, &mut buf)?;
        if n < CHUNK_HEADER_SIZE {
            self.fpos += n as u64;
            return Err(JlsError::Empty);
        }
        self.fpos += CHUNK_HEADER_SIZE as u64;
        let hdr = ChunkHeader::decode(&buf, self.offset)?;
        self.hdr = Some(hdr);
        Ok(hdr)
    }

    /// Read the current chunk's payload into `buf` and verify its CRC.
    ///
    /// `buf` must hold [`payload_size_on_disk`] bytes; otherwise `TooBig` is
    /// returned and the cursor does not advance, so the caller can grow the
    /// buffer and retry. Returns the payload length in bytes. A payload cut
    /// short by truncation reads as `Empty`.
    pub fn rd_payload(&mut self, buf: &mut [u8]) -> Result<usize> {
        let hdr = self.hdr.ok_or(JlsError::Empty)?;
        let disk_size = payload_size_on_disk(hdr.payload_length) as usize;
        if disk_size > buf.len() {
            return Err(JlsError::TooBig {
                needed: disk_size,
                capacity: buf.len(),
            });
        }
        let payload_pos = self.offset + CHUNK_HEADER_SIZE as u64;
        if self.fpos != payload_pos {
            self.file.seek(SeekFrom::Start(payload_pos))?;
            self.fpos = payload_pos;
        }
        let n = read_up_to(&mut self.file, &mut buf[..disk_size])?;
        self.fpos += n as u64;
        if n < disk_size {
            return Err(JlsError::Empty);
        }
        let crc = crc32fast::hash(&buf[..hdr.payload_length as usize]);
        let stored = u32::from_le_bytes(
            buf[disk_size - 4..disk_size]
                .try_into()
                .expect("slice length 4"),
        );
        if crc != stored {
            return Err(JlsError::ChecksumMismatch {
                offset: self.offset,
                expected: stored,
                actual: crc,
            });
        }
        Ok(hdr.payload_length as usize)
    }

    /// Read the current chunk: header (unless already read) and payload.
    pub fn rd(&mut self, buf: &mut [u8]) -> Result<ChunkHeader> {
        let header_read = self.hdr.is_some()
            && self.fpos == self.offset + CHUNK_HEADER_SIZE as u64;
        if !header_read {
            self.rd_header()?;
        }
        let hdr = self.hdr.ok_or(JlsError::Empty)?;
        self.rd_payload(buf)?;
        Ok(hdr)
    }

    /// Append a chunk at the current position (end of file for the writer).
    ///
    /// Fills `payload_length`, `payload_prev_length`, and the CRCs; returns
    /// the chunk's file offset.
    pub fn wr(&mut self, hdr: &mut ChunkHeader, payload: &[u8]) -> Result<u64> {
        if !self.write_en {
            return Err(JlsError::ParameterInvalid("file not open for writing"));
        }
        if payload.len() > u32::MAX as usize {
            return Err(JlsError::ParameterInvalid("payload exceeds u32 length"));
        }
        let chunk_offset = self.fpos;
        hdr.payload_length = payload.len() as u32;
        hdr.payload_prev_length = self.payload_prev_length;
        self.file.write_all(&hdr.encode())?;
        write_payload_with_footer(&mut self.file, payload)?;
        self.payload_prev_length = hdr.payload_length;
        self.offset = chunk_offset;
        self.fpos = chunk_offset
            + CHUNK_HEADER_SIZE as u64
            + payload_size_on_disk(hdr.payload_length) as u64;
        self.hdr = Some(*hdr);
        Ok(chunk_offset)
    }

    /// Rewrite a chunk header in place. The append state (cursor, previous
    /// payload length) is preserved.
    pub fn wr_header_at(&mut self, offset: u64, hdr: &ChunkHeader) -> Result<()> {
        if !self.write_en {
            return Err(JlsError::ParameterInvalid("file not open for writing"));
        }
        let mut hdr = *hdr;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&hdr.encode())?;
        self.file.seek(SeekFrom::Start(self.fpos))?;
        if offset == self.offset {
            self.hdr = Some(hdr);
        }
        Ok(())
    }

    /// Rewrite a chunk payload in place. The length must match the header;
    /// the payload CRC and padding are rewritten, and the append state is
    /// preserved.
    pub fn wr_payload_at(&mut self, offset: u64, hdr: &ChunkHeader, payload: &[u8]) -> Result<()> {
        if !self.write_en {
            return Err(JlsError::ParameterInvalid("file not open for writing"));
        }
        if payload.len() != hdr.payload_length as usize {
            return Err(JlsError::ParameterInvalid("payload length mismatch"));
        }
        self.file
            .seek(SeekFrom::Start(offset + CHUNK_HEADER_SIZE as u64))?;
        write_payload_with_footer(&mut self.file, payload)?;
        self.file.seek(SeekFrom::Start(self.fpos))?;
        Ok(())
    }

    /// Advance to the next chunk in file order and read its header.
    pub fn chunk_next(&mut self) -> Result<ChunkHeader> {
        let hdr = self.hdr.ok_or(JlsError::Empty)?;
        let pos = self.offset
            + CHUNK_HEADER_SIZE as u64
            + payload_size_on_disk(hdr.payload_length) as u64;
        if pos != self.fpos {
            self.file.seek(SeekFrom::Start(pos))?;
            self.fpos = pos;
        }
        self.rd_header()
    }

    /// Step back to the previous chunk in file order and read its header.
    pub fn chunk_prev(&mut self) -> Result<ChunkHeader> {
        let hdr = self.hdr.ok_or(JlsError::Empty)?;
        let step =
            CHUNK_HEADER_SIZE as u64 + payload_size_on_disk(hdr.payload_prev_length) as u64;
        let offset = self.offset;
        if offset < FILE_HEADER_SIZE as u64 + step {
            return Err(JlsError::Empty);
        }
        let pos = offset - step;
        self.file.seek(SeekFrom::Start(pos))?;
        self.fpos = pos;
        self.rd_header()
    }

    /// Close the file. In write mode, back-patches the file header with the
    /// final file length. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.write_en {
            let length = self.file.seek(SeekFrom::End(0))?;
            self.file.seek(SeekFrom::Start(0))?;
            self.file_header = FileHeader::new(length);
            self.file.write_all(&self.file_header.encode())?;
            self.file.flush()?;
        }
        self.closed = true;
        Ok(())
    }
}

impl Drop for Raw {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn read_file_header(file: &mut File) -> Result<FileHeader> {
    let mut buf = [0u8; FILE_HEADER_SIZE];
    let n = read_up_to(file, &mut buf)?;
    if n < FILE_HEADER_SIZE {
        return Err(JlsError::UnsupportedFile("file shorter than header"));
    }
    FileHeader::decode(&buf)
}

/// Read until `buf` is full or EOF; returns bytes read.
fn read_up_to(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}

fn write_payload_with_footer(file: &mut File, payload: &[u8]) -> Result<()> {
    file.write_all(payload)?;
    let pad = payload_pad(payload.len() as u32) as usize;
    let crc = crc32fast::hash(payload);
    let mut footer = [0u8; 11];
    footer[pad..pad + 4].copy_from_slice(&crc.to_le_bytes());
    file.write_all(&footer[..pad + 4])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TAG_USER_DATA;
    use std::fs;
    use tempfile::tempdir;

    fn wr_chunk(raw: &mut Raw, tag: u8, meta: u16, payload: &[u8]) -> u64 {
        let mut hdr = ChunkHeader {
            tag,
            chunk_meta: meta,
            ..Default::default()
        };
        raw.wr(&mut hdr, payload).unwrap()
    }

    #[test]
    fn test_write_read_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            wr_chunk(&mut raw, TAG_USER_DATA, 1, b"alpha");
            wr_chunk(&mut raw, TAG_USER_DATA, 2, b"bravo-bravo");
            wr_chunk(&mut raw, TAG_USER_DATA, 3, &[]);
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        assert!(raw.file_header().length > 0);
        let mut buf = vec![0u8; 256];

        let hdr = raw.rd(&mut buf).unwrap();
        assert_eq!(hdr.chunk_meta, 1);
        assert_eq!(&buf[..5], b"alpha");
        assert_eq!(hdr.payload_prev_length, 0);

        let hdr = raw.rd(&mut buf).unwrap();
        assert_eq!(hdr.chunk_meta, 2);
        assert_eq!(hdr.payload_prev_length, 5);
        assert_eq!(&buf[..11], b"bravo-bravo");

        let hdr = raw.rd(&mut buf).unwrap();
        assert_eq!(hdr.chunk_meta, 3);
        assert_eq!(hdr.payload_length, 0);

        assert!(matches!(raw.rd(&mut buf), Err(JlsError::Empty)));
    }

    #[test]
    fn test_too_big_then_retry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        let offset;
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            offset = wr_chunk(&mut raw, TAG_USER_DATA, 0, &[7u8; 100]);
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        raw.chunk_seek(offset).unwrap();
        let mut small = vec![0u8; 16];
        match raw.rd(&mut small) {
            Err(JlsError::TooBig { needed, capacity }) => {
                assert_eq!(needed, payload_size_on_disk(100) as usize);
                assert_eq!(capacity, 16);
            }
            other => panic!("expected TooBig, got {other:?}"),
        }
        // cursor did not advance; a grown buffer succeeds
        let mut big = vec![0u8; 256];
        let hdr = raw.rd(&mut big).unwrap();
        assert_eq!(hdr.payload_length, 100);
        assert_eq!(&big[..100], &[7u8; 100]);
    }

    #[test]
    fn test_chunk_next_prev_symmetry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        let mut offsets = Vec::new();
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            for i in 0..4u8 {
                offsets.push(wr_chunk(
                    &mut raw,
                    TAG_USER_DATA,
                    i as u16,
                    &vec![i; (i as usize + 1) * 3],
                ));
            }
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        raw.chunk_seek(offsets[0]).unwrap();
        for (i, &offset) in offsets.iter().enumerate().skip(1) {
            let hdr = raw.chunk_next().unwrap();
            assert_eq!(hdr.chunk_meta, i as u16);
            assert_eq!(raw.chunk_tell(), offset);
        }
        assert!(matches!(raw.chunk_next(), Err(JlsError::Empty)));
        raw.chunk_seek(offsets[3]).unwrap();
        for i in (0..3usize).rev() {
            let hdr = raw.chunk_prev().unwrap();
            assert_eq!(hdr.chunk_meta, i as u16);
            assert_eq!(raw.chunk_tell(), offsets[i]);
        }
        assert!(matches!(raw.chunk_prev(), Err(JlsError::Empty)));
    }

    #[test]
    fn test_misaligned_seek_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            wr_chunk(&mut raw, TAG_USER_DATA, 0, b"data");
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        assert!(matches!(
            raw.chunk_seek(0),
            Err(JlsError::ParameterInvalid(_))
        ));
        assert!(matches!(
            raw.chunk_seek(FILE_HEADER_SIZE as u64 + 4),
            Err(JlsError::ParameterInvalid(_))
        ));
    }

    #[test]
    fn test_header_backpatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            let first = wr_chunk(&mut raw, TAG_USER_DATA, 0, b"first");
            let mut first_hdr = *raw.header().unwrap();
            let second = wr_chunk(&mut raw, TAG_USER_DATA, 1, b"second");
            first_hdr.item_next = second;
            raw.wr_header_at(first, &first_hdr).unwrap();
            // append state survived the patch
            let third = wr_chunk(&mut raw, TAG_USER_DATA, 2, b"third");
            assert!(third > second);
            let hdr = raw.header().unwrap();
            assert_eq!(hdr.payload_prev_length, 6);
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        let mut buf = vec![0u8; 64];
        let hdr = raw.rd(&mut buf).unwrap();
        assert_ne!(hdr.item_next, 0);
        raw.chunk_seek(hdr.item_next).unwrap();
        let hdr = raw.rd(&mut buf).unwrap();
        assert_eq!(&buf[..6], b"second");
        assert_eq!(hdr.chunk_meta, 1);
    }

    #[test]
    fn test_payload_rewrite_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        let offset;
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            offset = wr_chunk(&mut raw, TAG_USER_DATA, 0, &[0u8; 8]);
            let hdr = *raw.header().unwrap();
            wr_chunk(&mut raw, TAG_USER_DATA, 1, b"tail");
            raw.wr_payload_at(offset, &hdr, &[9u8; 8]).unwrap();
            assert!(matches!(
                raw.wr_payload_at(offset, &hdr, &[9u8; 4]),
                Err(JlsError::ParameterInvalid(_))
            ));
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        raw.chunk_seek(offset).unwrap();
        let mut buf = vec![0u8; 64];
        raw.rd(&mut buf).unwrap();
        assert_eq!(&buf[..8], &[9u8; 8]);
    }

    #[test]
    fn test_truncated_chunk_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            wr_chunk(&mut raw, TAG_USER_DATA, 0, b"intact");
            wr_chunk(&mut raw, TAG_USER_DATA, 1, &[3u8; 64]);
            raw.close().unwrap();
        }
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 20).unwrap();
        drop(file);

        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        let mut buf = vec![0u8; 256];
        let hdr = raw.rd(&mut buf).unwrap();
        assert_eq!(hdr.chunk_meta, 0);
        assert!(matches!(raw.rd(&mut buf), Err(JlsError::Empty)));
    }

    #[test]
    fn test_append_mode_positions_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        {
            let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
            wr_chunk(&mut raw, TAG_USER_DATA, 0, b"one");
            raw.close().unwrap();
        }
        {
            let mut raw = Raw::open(&path, OpenMode::Append).unwrap();
            wr_chunk(&mut raw, TAG_USER_DATA, 1, b"two");
            raw.close().unwrap();
        }
        let mut raw = Raw::open(&path, OpenMode::Read).unwrap();
        let mut buf = vec![0u8; 64];
        assert_eq!(raw.rd(&mut buf).unwrap().chunk_meta, 0);
        assert_eq!(raw.rd(&mut buf).unwrap().chunk_meta, 1);
        assert!(matches!(raw.rd(&mut buf), Err(JlsError::Empty)));
    }

    #[test]
    fn test_double_close_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.jls");
        let mut raw = Raw::open(&path, OpenMode::Write).unwrap();
        raw.close().unwrap();
        raw.close().unwrap();
    }
}
