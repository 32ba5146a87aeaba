// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module binary detection.
//!
//! The bridge only hosts classic core modules. Component Model binaries and
//! legacy Preview 1 components (version 1 plus a `component` custom section)
//! are rejected before compilation with a clear error.

use crate::errors::{BridgeError, BridgeResult};

use wasmparser::{Encoding, Parser, Payload};

const COMPONENT_REJECTED: &str =
    "component binaries are not supported; the bridge hosts core modules only";

/// Checks that `bytes` is a core module binary.
///
/// # Errors
/// * `InvalidWasmBinary` / `ParserError` - empty, truncated or malformed input
/// * `UnsupportedEncoding` - a component binary
pub fn ensure_core_module(bytes: &[u8]) -> BridgeResult<()> {
    let mut encoding = None;
    let mut has_component_section = false;

    for payload in Parser::new(0).parse_all(bytes) {
        match payload? {
            Payload::Version { encoding: enc, .. } => encoding = Some(enc),
            Payload::CustomSection(reader) if reader.name() == "component" => {
                has_component_section = true;
            }
            _ => {}
        }
    }

    match encoding {
        None => Err(BridgeError::InvalidWasmBinary(
            "missing WASM header".to_string(),
        )),
        Some(Encoding::Component) => Err(BridgeError::UnsupportedEncoding(
            COMPONENT_REJECTED.to_string(),
        )),
        Some(Encoding::Module) if has_component_section => Err(BridgeError::UnsupportedEncoding(
            COMPONENT_REJECTED.to_string(),
        )),
        Some(Encoding::Module) => Ok(()),
    }
}
