//! String arena for the reader.
//!
//! Descriptor strings parsed from payloads are interned into a chain of
//! fixed-capacity blocks that are never reallocated, so a [`StrRef`] stays
//! valid for the life of the arena. When a block runs out mid-string, the
//! partial prefix is carried into a fresh block; every interned string is
//! contiguous and can be handed out as a borrowed `&str`.

use crate::error::{JlsError, Result};

/// Default block capacity: 8 MiB.
pub const ARENA_BLOCK_SIZE: usize = 1 << 23;

/// Stable handle to an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrRef {
    block: u32,
    start: u32,
    len: u32,
}

pub struct StringArena {
    blocks: Vec<Vec<u8>>,
    block_size: usize,
}

impl StringArena {
    pub fn new() -> Self {
        Self::with_block_size(ARENA_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            blocks: vec![Vec::with_capacity(block_size)],
            block_size,
        }
    }

    /// Intern a string, copying it into the arena.
    pub fn intern(&mut self, value: &str) -> Result<StrRef> {
        let bytes = value.as_bytes();
        if bytes.len() > u32::MAX as usize {
            return Err(JlsError::NotEnoughMemory("string exceeds arena limits"));
        }
        let tail = self.blocks.len() - 1;
        let remaining = self.block_size.saturating_sub(self.blocks[tail].len());
        let block = if bytes.len() <= remaining {
            tail
        } else {
            // carry the whole string into a fresh block so it stays contiguous
            let capacity = self.block_size.max(bytes.len());
            self.blocks.push(Vec::with_capacity(capacity));
            self.blocks.len() - 1
        };
        let start = self.blocks[block].len();
        self.blocks[block].extend_from_slice(bytes);
        Ok(StrRef {
            block: block as u32,
            start: start as u32,
            len: bytes.len() as u32,
        })
    }

    /// Resolve a handle produced by [`intern`](Self::intern).
    pub fn resolve(&self, r: StrRef) -> &str {
        let block = &self.blocks[r.block as usize];
        let bytes = &block[r.start as usize..(r.start + r.len) as usize];
        // Safety: the bytes were copied verbatim from a validated &str and
        // blocks are append-only, so they are still valid UTF-8.
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    pub fn memory_usage(&self) -> usize {
        self.blocks.iter().map(|b| b.capacity()).sum()
    }
}

impl Default for StringArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_resolve() {
        let mut arena = StringArena::new();
        let a = arena.intern("hello").unwrap();
        let b = arena.intern("").unwrap();
        let c = arena.intern("wörld").unwrap();
        assert_eq!(arena.resolve(a), "hello");
        assert_eq!(arena.resolve(b), "");
        assert_eq!(arena.resolve(c), "wörld");
    }

    #[test]
    fn test_block_overflow_keeps_strings_contiguous() {
        let mut arena = StringArena::with_block_size(16);
        let mut refs = Vec::new();
        for i in 0..32 {
            let s = format!("string-{i:02}");
            refs.push((arena.intern(&s).unwrap(), s));
        }
        assert!(arena.blocks.len() > 1);
        for (r, s) in refs {
            assert_eq!(arena.resolve(r), s);
        }
    }

    #[test]
    fn test_oversized_string_gets_dedicated_block() {
        let mut arena = StringArena::with_block_size(8);
        let long = "x".repeat(100);
        let r = arena.intern(&long).unwrap();
        assert_eq!(arena.resolve(r), long);
    }

    #[test]
    fn test_refs_stable_across_growth() {
        let mut arena = StringArena::with_block_size(32);
        let first = arena.intern("first").unwrap();
        for _ in 0..100 {
            arena.intern("filler-filler-filler").unwrap();
        }
        assert_eq!(arena.resolve(first), "first");
    }
}
