// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! # Host/module value bridge
//!
//! The module only ever sees small integers. This module holds everything the
//! host keeps on the other side of those integers:
//!
//! - [`slot_table`] maps handles to [`value::HostValue`]s, with a free list and
//!   a bounded borrow stack ([`borrow`]).
//! - [`memory`] and [`codec`] move strings and bytes through linear memory.
//! - [`closure`] tracks module callbacks with manual reference counts.
//! - [`events`] records which closures listen on which host targets.
//!
//! [`BridgeContext`] bundles that state. One context exists per instance,
//! stored in the wasmtime store data, and nothing in it is global.

pub mod borrow;
pub mod closure;
pub mod codec;
pub mod events;
pub mod memory;
pub mod slot_table;
pub mod value;

use crate::config::consts::{DEFAULT_BORROW_STACK_CAPACITY, DEFAULT_MAX_HANDLES};
use crate::errors::{BridgeError, BridgeResult, ProtocolViolation};
use crate::observability::messages::bridge::{BridgeHalted, ExceptionOverwritten};

use closure::ClosureRegistry;
use events::EventRegistry;
use memory::MemoryViewCache;
use slot_table::{Handle, SlotTable};
use value::HostValue;

/// All bridge state for one module instance.
#[derive(Debug)]
pub struct BridgeContext {
    pub slots: SlotTable,
    pub views: MemoryViewCache,
    pub closures: ClosureRegistry,
    pub events: EventRegistry,
    last_exception: Option<Handle>,
    halted: Option<ProtocolViolation>,
}

impl BridgeContext {
    pub fn new(borrow_capacity: u32, max_handles: usize) -> Self {
        Self {
            slots: SlotTable::new(borrow_capacity, max_handles),
            views: MemoryViewCache::new(),
            closures: ClosureRegistry::new(),
            events: EventRegistry::new(),
            last_exception: None,
            halted: None,
        }
    }

    /// Fails with [`BridgeError::Halted`] once a protocol violation occurred.
    pub fn ensure_running(&self) -> BridgeResult<()> {
        match &self.halted {
            Some(violation) => Err(BridgeError::Halted(violation.clone())),
            None => Ok(()),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&ProtocolViolation> {
        self.halted.as_ref()
    }

    /// Records a protocol violation. The first one wins.
    pub fn halt(&mut self, violation: ProtocolViolation) {
        if self.halted.is_none() {
            tracing::error!("{}", BridgeHalted { violation: &violation });
            self.halted = Some(violation);
        }
    }

    /// Boxes `value` into a handle and parks it in the exception register.
    /// An exception the module never took is dropped.
    pub fn raise(&mut self, value: HostValue) -> BridgeResult<Handle> {
        let handle = self.slots.allocate(value)?;
        if let Some(previous) = self.last_exception.replace(handle) {
            tracing::warn!("{}", ExceptionOverwritten { previous: previous.raw() });
            self.slots.drop_handle(previous)?;
        }
        Ok(handle)
    }

    /// Hands the pending exception to the module and clears the register.
    pub fn take_exception(&mut self) -> Option<Handle> {
        self.last_exception.take()
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new(DEFAULT_BORROW_STACK_CAPACITY, DEFAULT_MAX_HANDLES)
    }
}

impl borrow::SlotAccess for BridgeContext {
    fn slots_mut(&mut self) -> &mut SlotTable {
        &mut self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_is_sticky_and_keeps_first_reason() {
        let mut ctx = BridgeContext::default();
        ctx.ensure_running().unwrap();

        ctx.halt(ProtocolViolation::UnallocatedHandle(77));
        ctx.halt(ProtocolViolation::BorrowStackOverflow { capacity: 32 });

        match ctx.ensure_running() {
            Err(BridgeError::Halted(ProtocolViolation::UnallocatedHandle(77))) => {}
            other => panic!("Expected Halted, got {other:?}"),
        }
    }

    #[test]
    fn test_exception_register_holds_one_value() {
        let mut ctx = BridgeContext::default();
        assert_eq!(ctx.take_exception(), None);

        let first = ctx.raise(HostValue::string("first")).unwrap();
        let second = ctx.raise(HostValue::string("second")).unwrap();
        assert_ne!(first, second);
        assert!(ctx.slots.get(first).is_err(), "overwritten exception is dropped");
        assert_eq!(ctx.slots.live_count(), 1);

        let taken = ctx.take_exception().unwrap();
        assert_eq!(taken, second);
        assert_eq!(ctx.slots.get(taken).unwrap().as_str(), Some("second"));
        assert_eq!(ctx.take_exception(), None);
    }
}
