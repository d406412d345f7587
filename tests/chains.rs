//! Chunk-chain integrity checks at the raw layer.
//!
//! For every chunk kind, following `item_next` from the first chunk must
//! visit every chunk of that kind exactly once in file-offset order, and
//! following `item_prev` from the last must visit them in reverse.

use std::path::PathBuf;

use jls::format::{track_tag, ChunkHeader, TrackRole, TrackType, TAG_SOURCE_DEF, TAG_USER_DATA};
use jls::raw::{OpenMode, Raw};
use jls::{SignalDef, SourceDef, UserData, Writer};
use tempfile::TempDir;

fn build_file(dir: &TempDir) -> PathBuf {
    let p = dir.path().join("chains.jls");
    let mut wr = Writer::open(&p).unwrap();
    for (id, name) in [(1u16, "one"), (2, "two")] {
        wr.source_def(&SourceDef {
            source_id: id,
            name,
            vendor: "",
            model: "",
            version: "",
            serial_number: "",
        })
        .unwrap();
    }
    wr.signal_def(&SignalDef {
        signal_id: 1,
        source_id: 1,
        sample_rate: 1000,
        samples_per_data: 500,
        name: "sig",
        si_units: "",
        ..Default::default()
    })
    .unwrap();
    wr.user_data(1, &UserData::String("a")).unwrap();
    // interleave data and user chunks so the chains are non-contiguous
    wr.fsr_f32(1, 0, &vec![0.5f32; 1250]).unwrap();
    wr.user_data(2, &UserData::Binary(&[1, 2])).unwrap();
    wr.fsr_f32(1, 1250, &vec![0.25f32; 750]).unwrap();
    wr.user_data(3, &UserData::Json("{}")).unwrap();
    wr.close().unwrap();
    p
}

/// All chunks in file order: (offset, header).
fn file_order(raw: &mut Raw) -> Vec<(u64, ChunkHeader)> {
    let mut list = Vec::new();
    let Ok(mut hdr) = raw.rd_header() else {
        return list;
    };
    loop {
        list.push((raw.chunk_tell(), hdr));
        match raw.chunk_next() {
            Ok(next) => hdr = next,
            Err(_) => break,
        }
    }
    list
}

fn follow_next(raw: &mut Raw, start: u64) -> Vec<u64> {
    let mut offsets = Vec::new();
    let mut offset = start;
    loop {
        raw.chunk_seek(offset).unwrap();
        offsets.push(offset);
        let next = raw.header().unwrap().item_next;
        if next == 0 {
            break;
        }
        offset = next;
    }
    offsets
}

fn follow_prev(raw: &mut Raw, start: u64) -> Vec<u64> {
    let mut offsets = Vec::new();
    let mut offset = start;
    loop {
        raw.chunk_seek(offset).unwrap();
        offsets.push(offset);
        let prev = raw.header().unwrap().item_prev;
        if prev == 0 {
            break;
        }
        offset = prev;
    }
    offsets
}

fn check_chain(raw: &mut Raw, expected: &[u64]) {
    assert!(!expected.is_empty());
    let forward = follow_next(raw, expected[0]);
    assert_eq!(forward, expected, "forward chain mismatch");
    let mut backward = follow_prev(raw, *expected.last().unwrap());
    backward.reverse();
    assert_eq!(backward, expected, "backward chain mismatch");
}

#[test]
fn test_chain_integrity_per_kind() {
    let dir = TempDir::new().unwrap();
    let p = build_file(&dir);
    let mut raw = Raw::open(&p, OpenMode::Read).unwrap();
    let chunks = file_order(&mut raw);

    // offsets strictly increase: chunks only append
    for pair in chunks.windows(2) {
        assert!(pair[0].0 < pair[1].0);
    }

    let by_tag = |tag: u8| -> Vec<u64> {
        chunks
            .iter()
            .filter(|(_, h)| h.tag == tag)
            .map(|(o, _)| *o)
            .collect()
    };

    let sources = by_tag(TAG_SOURCE_DEF);
    assert_eq!(sources.len(), 3); // reserved source 0 + two defined
    check_chain(&mut raw, &sources);

    let user = by_tag(TAG_USER_DATA);
    assert_eq!(user.len(), 4); // sentinel + three entries
    check_chain(&mut raw, &user);

    let data = by_tag(track_tag(TrackType::Fsr, TrackRole::Data));
    assert_eq!(data.len(), 4); // 500-sample chunks for 2000 samples
    check_chain(&mut raw, &data);
}

#[test]
fn test_payload_prev_length_is_linear() {
    let dir = TempDir::new().unwrap();
    let p = build_file(&dir);
    let mut raw = Raw::open(&p, OpenMode::Read).unwrap();
    let chunks = file_order(&mut raw);
    assert!(chunks.len() > 10);
    assert_eq!(chunks[0].1.payload_prev_length, 0);
    for pair in chunks.windows(2) {
        assert_eq!(
            pair[1].1.payload_prev_length,
            pair[0].1.payload_length,
            "chunk at offset {}",
            pair[1].0
        );
    }
}

#[test]
fn test_signal_chain_contains_defs_and_heads() {
    let dir = TempDir::new().unwrap();
    let p = build_file(&dir);
    let mut raw = Raw::open(&p, OpenMode::Read).unwrap();
    let chunks = file_order(&mut raw);

    let is_signal_chain_tag = |tag: u8| {
        tag == jls::format::TAG_SIGNAL_DEF
            || (jls::format::Tag::from_u8(tag)).is_some_and(|t| {
                matches!(
                    t,
                    jls::format::Tag::Track(_, TrackRole::Def)
                        | jls::format::Tag::Track(_, TrackRole::Head)
                )
            })
    };
    let signal_chain: Vec<u64> = chunks
        .iter()
        .filter(|(_, h)| is_signal_chain_tag(h.tag))
        .map(|(o, _)| *o)
        .collect();
    // signal 0: def + 2 tracks x (def, head); signal 1: def + 3 tracks
    assert_eq!(signal_chain.len(), (1 + 2 * 2) + (1 + 3 * 2));
    check_chain(&mut raw, &signal_chain);
}
