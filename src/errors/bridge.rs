// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for bridge operations.
//!
//! Failures fall into three dispositions, and every host primitive routes its
//! error by disposition rather than by variant:
//!
//! * **Boxable** - an ordinary host failure (bad tag name, missing global,
//!   randomness unavailable). The error is boxed into a handle and parked in the
//!   exception register; the module call itself returns normally.
//! * **Call-fatal** - malformed input from the module (invalid UTF-8, an
//!   out-of-bounds pointer). The current call traps, the bridge stays usable.
//! * **Fatal** - a [`ProtocolViolation`]. Handle state can no longer be
//!   trusted, so the bridge halts and every later entry fails with
//!   [`BridgeError::Halted`].

use crate::bridge::closure::ClosureId;
use crate::bridge::value::HostValue;
use thiserror::Error;

/// Unrecoverable violations of the handle/closure protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A handle was dereferenced while not allocated.
    #[error("handle {0} is not allocated")]
    UnallocatedHandle(u32),

    /// A closure was invoked or released after reaching `Destroyed`.
    #[error("closure {0} used after destruction")]
    ClosureDestroyed(ClosureId),

    /// A closure was entered again while its environment was checked out.
    #[error("closure {0} re-entered while already executing")]
    ReentrantInvocation(ClosureId),

    /// A closure id that was never issued by this bridge.
    #[error("closure {0} is not registered")]
    UnknownClosure(ClosureId),

    /// The handle exists but does not hold a closure.
    #[error("handle {0} does not refer to a closure")]
    NotAClosure(u32),

    /// Too many values borrowed for the duration of nested calls.
    #[error("borrow stack overflow: all {capacity} borrow slots in use")]
    BorrowStackOverflow { capacity: u32 },

    /// A borrow scope ended out of LIFO order.
    #[error("borrow stack imbalance: expected top {expected}, found {actual}")]
    BorrowStackImbalance { expected: u32, actual: u32 },
}

/// Strict UTF-8 decoding failure for a string read out of module memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid UTF-8 at module address {ptr} (length {len}): valid up to byte {valid_up_to}")]
pub struct DecodeError {
    pub ptr: u32,
    pub len: u32,
    pub valid_up_to: usize,
}

/// Comprehensive error type for bridge, host and runtime operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Fatal protocol violation; halts the bridge.
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Entry refused because an earlier violation halted the bridge.
    #[error("Bridge halted after protocol violation: {0}")]
    Halted(ProtocolViolation),

    /// Invalid UTF-8 passed across the boundary.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The slot table reached its configured ceiling.
    #[error("Slot table exhausted: capacity of {capacity} handles reached")]
    ResourceExhausted { capacity: usize },

    /// An ordinary host-side failure, boxed for the module when raised by a primitive.
    #[error("{kind}: {message}")]
    HostFailure { kind: &'static str, message: String },

    /// A host value thrown out of a module call. The value is the original,
    /// not a copy.
    #[error("Uncaught host value thrown across the module boundary: {0:?}")]
    Thrown(HostValue),

    /// Memory access outside valid bounds.
    #[error("Memory access out of bounds: {0}")]
    OutOfBounds(String),

    /// A required export is missing or has the wrong signature.
    #[error("Missing module export: {0}")]
    MissingExport(String),

    /// The startup entrypoint was already invoked on this instance.
    #[error("Start entrypoint already invoked")]
    AlreadyStarted,

    /// Invalid or malformed WASM binary format.
    #[error("Invalid WASM binary: {0}")]
    InvalidWasmBinary(String),

    /// Binary encoding this host does not accept (components).
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Module compilation or instantiation error.
    #[error("WASM module error: {0}")]
    ModuleError(String),

    /// Wasmtime engine creation or configuration error.
    #[error("Engine creation error: {0}")]
    EngineError(String),

    /// Input validation error (size limits, format, etc.).
    #[error("Invalid input: {0}")]
    ValidationError(String),

    /// File I/O error during module loading.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Trap or other execution failure raised by wasmtime.
    #[error("WASM execution error: {0}")]
    ExecutionError(wasmtime::Error),

    /// WASM binary parsing error from wasmparser.
    #[error("WASM parser error: {0}")]
    ParserError(#[from] wasmparser::BinaryReaderError),
}

impl BridgeError {
    /// Shorthand for a boxable host failure.
    pub fn host(kind: &'static str, message: impl Into<String>) -> Self {
        Self::HostFailure {
            kind,
            message: message.into(),
        }
    }

    /// True when this error must halt the bridge.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Halted(_))
    }

    /// True when a primitive should box this error into the exception register
    /// instead of trapping the call.
    pub fn is_boxable(&self) -> bool {
        matches!(self, Self::HostFailure { .. })
    }

    /// Recovers a bridge error carried through a wasmtime trap.
    ///
    /// Host imports fail by returning a `BridgeError` inside the trap; this
    /// unwraps it again so a thrown host value keeps its identity.
    pub fn from_trap(err: wasmtime::Error) -> Self {
        match err.downcast::<BridgeError>() {
            Ok(inner) => inner,
            Err(other) => Self::ExecutionError(other),
        }
    }
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispositions() {
        let fatal = BridgeError::from(ProtocolViolation::UnallocatedHandle(40));
        assert!(fatal.is_fatal());
        assert!(!fatal.is_boxable());

        let boxed = BridgeError::host("TypeError", "not a node");
        assert!(boxed.is_boxable());
        assert!(!boxed.is_fatal());
        assert_eq!(boxed.to_string(), "TypeError: not a node");

        let decode = BridgeError::from(DecodeError {
            ptr: 8,
            len: 2,
            valid_up_to: 1,
        });
        assert!(!decode.is_fatal());
        assert!(!decode.is_boxable());
    }

    #[test]
    fn test_from_trap_preserves_thrown_identity() {
        let value = HostValue::new(String::from("boom"));
        let trap: wasmtime::Error = BridgeError::Thrown(value.clone()).into();

        match BridgeError::from_trap(trap) {
            BridgeError::Thrown(recovered) => assert!(HostValue::ptr_eq(&value, &recovered)),
            other => panic!("Expected Thrown, got {other:?}"),
        }
    }

    #[test]
    fn test_from_trap_wraps_foreign_errors() {
        let trap = wasmtime::Error::msg("unreachable executed");
        assert!(matches!(
            BridgeError::from_trap(trap),
            BridgeError::ExecutionError(_)
        ));
    }
}
