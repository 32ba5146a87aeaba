// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for bridge state events.
//!
//! This module contains message types for logging events related to:
//! * memory view rebuilds after linear memory moved
//! * the exception register
//! * protocol violations halting the bridge
//! * host primitive failures boxed for the module

use std::fmt::{Display, Formatter};

use crate::bridge::memory::ViewKind;
use crate::errors::ProtocolViolation;

/// A cached memory view was rebuilt against a new buffer.
///
/// # Log Level
/// `debug!` - Growth happens routinely
pub struct ViewRebuilt {
    pub kind: ViewKind,
    pub old_len: usize,
    pub new_len: usize,
}

impl Display for ViewRebuilt {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rebuilt {} view: linear memory moved ({} -> {} bytes)",
            self.kind, self.old_len, self.new_len
        )
    }
}

/// The bridge halted on a protocol violation.
///
/// # Log Level
/// `error!` - Every later entry into the module will fail
///
/// # Example
/// ```
/// use the_ferry::errors::ProtocolViolation;
/// use the_ferry::observability::messages::bridge::BridgeHalted;
///
/// let violation = ProtocolViolation::UnallocatedHandle(40);
/// let msg = BridgeHalted { violation: &violation };
///
/// tracing::error!("{}", msg);
/// ```
pub struct BridgeHalted<'a> {
    pub violation: &'a ProtocolViolation,
}

impl Display for BridgeHalted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bridge halted, refusing further module entries: {}",
            self.violation
        )
    }
}

/// A new exception replaced one the module never took.
///
/// # Log Level
/// `warn!` - The module skipped an exception check
pub struct ExceptionOverwritten {
    pub previous: u32,
}

impl Display for ExceptionOverwritten {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Exception register overwritten; dropped handle {} the module never took",
            self.previous
        )
    }
}

/// A host primitive failed and its error was boxed for the module.
///
/// # Log Level
/// `debug!` - The module decides whether this matters
///
/// # Example
/// ```
/// use the_ferry::observability::messages::bridge::PrimitiveFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "no document");
/// let msg = PrimitiveFailed {
///     primitive: "create_element",
///     error: &error,
///     handle: 41,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct PrimitiveFailed<'a> {
    pub primitive: &'a str,
    pub error: &'a dyn std::error::Error,
    pub handle: u32,
}

impl Display for PrimitiveFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Host primitive '{}' failed, boxed as handle {}: {}",
            self.primitive, self.handle, self.error
        )
    }
}

/// A host primitive trapped the current module call.
///
/// # Log Level
/// `warn!` - The call is aborted but the bridge stays usable
pub struct PrimitiveTrapped<'a> {
    pub primitive: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for PrimitiveTrapped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Host primitive '{}' trapped the module call: {}",
            self.primitive, self.error
        )
    }
}
