// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! String and byte marshalling between host values and module memory.
//!
//! Every function re-fetches the buffer after each allocator call, because an
//! allocator call may grow (and so move) linear memory.

use crate::bridge::memory::{GuestAllocator, GuestMemory};
use crate::errors::{BridgeResult, DecodeError};

/// A string placed in module memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedStr {
    pub ptr: u32,
    pub len: u32,
}

/// Strictly decodes `len` bytes at `ptr`.
pub fn decode<M: GuestMemory + ?Sized>(mem: &mut M, ptr: u32, len: u32) -> BridgeResult<String> {
    let bytes = mem.read_bytes(ptr, len)?;
    String::from_utf8(bytes).map_err(|err| {
        DecodeError {
            ptr,
            len,
            valid_up_to: err.utf8_error().valid_up_to(),
        }
        .into()
    })
}

/// Copies `text` into freshly allocated module memory.
///
/// Without a reallocator the exact size is allocated once. With one, the
/// buffer starts at one byte per UTF-16 unit, the leading ASCII run is copied
/// straight across, and the buffer only grows to the worst case once a
/// non-ASCII character shows up.
pub fn encode<A: GuestAllocator + ?Sized>(mem: &mut A, text: &str) -> BridgeResult<EncodedStr> {
    if !mem.has_realloc() {
        let len = text.len() as u32;
        let ptr = mem.malloc(len)?;
        mem.write_bytes(ptr, text.as_bytes())?;
        return Ok(EncodedStr { ptr, len });
    }

    let units = text.encode_utf16().count() as u32;
    let mut ptr = mem.malloc(units)?;

    let ascii = text.bytes().take_while(u8::is_ascii).count();
    mem.write_bytes(ptr, &text.as_bytes()[..ascii])?;

    if ascii == text.len() {
        return Ok(EncodedStr { ptr, len: units });
    }

    let offset = ascii as u32;
    let rest = &text[ascii..];
    let worst = offset + rest.encode_utf16().count() as u32 * 3;
    ptr = mem.realloc(ptr, units, worst)?;

    mem.write_bytes(ptr + offset, rest.as_bytes())?;
    let len = offset + rest.len() as u32;
    if len != worst {
        ptr = mem.realloc(ptr, worst, len)?;
    }

    tracing::trace!(ptr, len, ascii_prefix = ascii, "encoded string with reallocation");
    Ok(EncodedStr { ptr, len })
}

/// Copies a byte window out of module memory.
pub fn copy_out<M: GuestMemory + ?Sized>(mem: &mut M, ptr: u32, len: u32) -> BridgeResult<Vec<u8>> {
    mem.read_bytes(ptr, len)
}

/// Copies host bytes into module memory the module already allocated.
pub fn copy_in<M: GuestMemory + ?Sized>(mem: &mut M, ptr: u32, bytes: &[u8]) -> BridgeResult<()> {
    mem.write_bytes(ptr, bytes)
}

/// Writes a `(ptr, len)` pair as two words at `retptr`.
pub fn write_pair<M: GuestMemory + ?Sized>(
    mem: &mut M,
    retptr: u32,
    first: u32,
    second: u32,
) -> BridgeResult<()> {
    let (buf, views) = mem.buffer()?;
    let mut words = views.words_mut(buf);
    words.set_i32(retptr, first as i32)?;
    words.set_i32(retptr + 4, second as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::memory::scratch::ScratchMemory;
    use crate::errors::BridgeError;

    const SAMPLES: &[&str] = &[
        "",
        "plain ascii text",
        "héllo",
        "日本語のテキスト",
        "emoji 🦀 crab",
        "🦀",
        "abc\u{7f}\u{80}def",
        "mixed: ascii then ünïcödé then ascii again",
    ];

    fn roundtrip(with_realloc: bool) {
        for sample in SAMPLES {
            let mut mem = ScratchMemory::new(8, with_realloc);
            let encoded = encode(&mut mem, sample).unwrap();
            assert_eq!(encoded.len as usize, sample.len(), "length for {sample:?}");
            let decoded = decode(&mut mem, encoded.ptr, encoded.len).unwrap();
            assert_eq!(&decoded, sample);
        }
    }

    #[test]
    fn test_roundtrip_exact_path() {
        roundtrip(false);
    }

    #[test]
    fn test_roundtrip_adaptive_path() {
        roundtrip(true);
    }

    #[test]
    fn test_ascii_run_straddling_cutover() {
        for prefix in 0..12 {
            let text = format!("{}é{}", "a".repeat(prefix), "z".repeat(prefix));
            let mut mem = ScratchMemory::new(4, true);
            let encoded = encode(&mut mem, &text).unwrap();
            assert_eq!(decode(&mut mem, encoded.ptr, encoded.len).unwrap(), text);
        }
    }

    #[test]
    fn test_pure_ascii_never_reallocates() {
        let mut mem = ScratchMemory::new(8, true);
        encode(&mut mem, "only ascii characters here").unwrap();
        assert_eq!(mem.reallocs, 0);

        encode(&mut mem, "now with ß").unwrap();
        assert_eq!(mem.reallocs, 2);
    }

    #[test]
    fn test_encode_survives_buffer_growth() {
        let mut mem = ScratchMemory::new(8, true);
        let long = "x".repeat(200) + "ø";
        let encoded = encode(&mut mem, &long).unwrap();
        assert!(mem.views.rebuild_count() > 0);
        assert_eq!(decode(&mut mem, encoded.ptr, encoded.len).unwrap(), long);
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let mut mem = ScratchMemory::new(16, false);
        mem.write_bytes(0, &[b'o', b'k', 0xC3, 0x28]).unwrap();

        match decode(&mut mem, 0, 4) {
            Err(BridgeError::Decode(err)) => {
                assert_eq!(err.valid_up_to, 2);
                assert_eq!(err.len, 4);
            }
            other => panic!("Expected DecodeError, got {other:?}"),
        }
    }

    #[test]
    fn test_bytes_transfer_is_verbatim() {
        let mut mem = ScratchMemory::new(32, false);
        let payload = [0u8, 0xFF, 0x80, 0x7F, 1, 2, 3];
        copy_in(&mut mem, 10, &payload).unwrap();
        assert_eq!(copy_out(&mut mem, 10, payload.len() as u32).unwrap(), payload);
    }

    #[test]
    fn test_write_pair_lands_at_retptr() {
        let mut mem = ScratchMemory::new(32, false);
        write_pair(&mut mem, 16, 1024, 7).unwrap();
        assert_eq!(&mem.data[16..20], &1024i32.to_le_bytes());
        assert_eq!(&mem.data[20..24], &7i32.to_le_bytes());
    }
}
