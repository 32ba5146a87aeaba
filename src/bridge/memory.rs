// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Memory view cache over the module's linear memory.
//!
//! Views are plain slices borrowed from the current buffer, so a view can not
//! outlive a call that might grow memory: getting the buffer needs the same
//! mutable store borrow that a module call needs. The cache records which
//! buffer each view kind was last built against and rebuilds (and reports)
//! when the identity changes.

use std::ops::Range;

use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::bridge::ViewRebuilt;

/// Base address and length of a linear memory buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferIdentity {
    base: usize,
    len: usize,
}

impl BufferIdentity {
    pub fn of(buf: &[u8]) -> Self {
        Self {
            base: buf.as_ptr() as usize,
            len: buf.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Bytes,
    Words,
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewKind::Bytes => write!(f, "byte"),
            ViewKind::Words => write!(f, "word"),
        }
    }
}

/// Tracks the buffer identity each view kind was built against.
#[derive(Debug, Default)]
pub struct MemoryViewCache {
    bytes: Option<BufferIdentity>,
    words: Option<BufferIdentity>,
    rebuilds: u64,
}

impl MemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes<'m>(&mut self, buf: &'m [u8]) -> ByteView<'m> {
        self.refresh(ViewKind::Bytes, BufferIdentity::of(buf));
        ByteView { data: buf }
    }

    pub fn bytes_mut<'m>(&mut self, buf: &'m mut [u8]) -> ByteViewMut<'m> {
        self.refresh(ViewKind::Bytes, BufferIdentity::of(buf));
        ByteViewMut { data: buf }
    }

    pub fn words_mut<'m>(&mut self, buf: &'m mut [u8]) -> WordViewMut<'m> {
        self.refresh(ViewKind::Words, BufferIdentity::of(buf));
        WordViewMut { data: buf }
    }

    /// True when a cached view was built against a different buffer.
    pub fn is_stale(&self, buf: &[u8]) -> bool {
        let current = BufferIdentity::of(buf);
        [self.bytes, self.words]
            .iter()
            .flatten()
            .any(|identity| *identity != current)
    }

    /// Number of times a view was rebuilt after the buffer moved or grew.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn refresh(&mut self, kind: ViewKind, current: BufferIdentity) {
        let slot = match kind {
            ViewKind::Bytes => &mut self.bytes,
            ViewKind::Words => &mut self.words,
        };
        match slot {
            Some(cached) if *cached == current => {}
            Some(cached) => {
                tracing::debug!(
                    "{}",
                    ViewRebuilt {
                        kind,
                        old_len: cached.len,
                        new_len: current.len,
                    }
                );
                *slot = Some(current);
                self.rebuilds += 1;
            }
            None => *slot = Some(current),
        }
    }
}

fn window(ptr: u32, len: u32, size: usize) -> BridgeResult<Range<usize>> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|end| *end <= size)
        .ok_or_else(|| {
            BridgeError::OutOfBounds(format!(
                "window [{ptr}, +{len}) exceeds memory of {size} bytes"
            ))
        })?;
    Ok(start..end)
}

/// Read-only byte-addressed view.
#[derive(Debug)]
pub struct ByteView<'m> {
    data: &'m [u8],
}

impl<'m> ByteView<'m> {
    pub fn read(&self, ptr: u32, len: u32) -> BridgeResult<&'m [u8]> {
        let range = window(ptr, len, self.data.len())?;
        Ok(&self.data[range])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Writable byte-addressed view.
#[derive(Debug)]
pub struct ByteViewMut<'m> {
    data: &'m mut [u8],
}

impl ByteViewMut<'_> {
    pub fn write(&mut self, ptr: u32, src: &[u8]) -> BridgeResult<()> {
        let range = window(ptr, src.len() as u32, self.data.len())?;
        self.data[range].copy_from_slice(src);
        Ok(())
    }
}

/// Writable view addressed in little-endian 32-bit words.
#[derive(Debug)]
pub struct WordViewMut<'m> {
    data: &'m mut [u8],
}

impl WordViewMut<'_> {
    fn aligned(ptr: u32) -> BridgeResult<()> {
        if ptr % 4 != 0 {
            return Err(BridgeError::OutOfBounds(format!(
                "word address {ptr} is not 4-byte aligned"
            )));
        }
        Ok(())
    }

    pub fn get_i32(&self, ptr: u32) -> BridgeResult<i32> {
        Self::aligned(ptr)?;
        let range = window(ptr, 4, self.data.len())?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.data[range]);
        Ok(i32::from_le_bytes(word))
    }

    pub fn set_i32(&mut self, ptr: u32, value: i32) -> BridgeResult<()> {
        Self::aligned(ptr)?;
        let range = window(ptr, 4, self.data.len())?;
        self.data[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

/// Access to the module's current linear memory buffer.
///
/// Implementations must return the buffer as it is *now*; callers never keep
/// the slice across a module call.
pub trait GuestMemory {
    fn buffer(&mut self) -> BridgeResult<(&mut [u8], &mut MemoryViewCache)>;

    fn read_bytes(&mut self, ptr: u32, len: u32) -> BridgeResult<Vec<u8>> {
        let (buf, views) = self.buffer()?;
        Ok(views.bytes(buf).read(ptr, len)?.to_vec())
    }

    fn write_bytes(&mut self, ptr: u32, src: &[u8]) -> BridgeResult<()> {
        let (buf, views) = self.buffer()?;
        views.bytes_mut(buf).write(ptr, src)
    }
}

/// The module's exported allocator, reached through module calls that may
/// grow memory.
pub trait GuestAllocator: GuestMemory {
    fn malloc(&mut self, size: u32) -> BridgeResult<u32>;

    fn has_realloc(&self) -> bool;

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32) -> BridgeResult<u32>;

    /// Returns a block to the module. A module without a free export leaks it.
    fn free(&mut self, ptr: u32, size: u32) -> BridgeResult<()>;
}
