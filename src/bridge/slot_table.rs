// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Slot table: integer handles aliasing host values.
//!
//! ## Layout
//!
//! ```text
//! 0 1 2 3 | 4 .......... 4+cap-1 | 4+cap ..........
//! sentinels | borrow stack region  | allocated handles (free list)
//! ```
//!
//! Handles below the reserved threshold (`4 + borrow_capacity`) are never
//! recycled. Free slots form a singly linked list threaded through the slots
//! themselves; the list is terminated by a `next` equal to the current table
//! length, so "free list empty" and "append a new slot" are the same test.
//! Reuse is LIFO.

use crate::bridge::value::HostValue;
use crate::config::consts::{DEFAULT_BORROW_STACK_CAPACITY, DEFAULT_MAX_HANDLES};
use crate::errors::{BridgeError, BridgeResult, ProtocolViolation};

/// Number of permanent sentinel handles.
pub const SENTINEL_COUNT: u32 = 4;

/// Integer naming a slot table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const UNDEFINED: Handle = Handle(0);
    pub const NULL: Handle = Handle(1);
    pub const TRUE: Handle = Handle(2);
    pub const FALSE: Handle = Handle(3);

    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Live(HostValue),
    Free { next: u32 },
    Borrowed(HostValue),
    Vacant,
}

/// Growable handle table with an embedded free list and borrow stack.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Slot>,
    next_free: u32,
    stack_pointer: u32,
    borrow_capacity: u32,
    max_handles: usize,
    live: usize,
}

impl SlotTable {
    pub fn new(borrow_capacity: u32, max_handles: usize) -> Self {
        let threshold = SENTINEL_COUNT + borrow_capacity;
        let mut slots = Vec::with_capacity(threshold as usize + 32);
        slots.push(Slot::Live(HostValue::undefined()));
        slots.push(Slot::Live(HostValue::null()));
        slots.push(Slot::Live(HostValue::boolean(true)));
        slots.push(Slot::Live(HostValue::boolean(false)));
        slots.resize(threshold as usize, Slot::Vacant);

        Self {
            slots,
            next_free: threshold,
            stack_pointer: threshold,
            borrow_capacity,
            max_handles,
            live: 0,
        }
    }

    /// Handles below this value are reserved: never recycled, never dropped.
    pub fn reserved_threshold(&self) -> u32 {
        SENTINEL_COUNT + self.borrow_capacity
    }

    pub fn borrow_capacity(&self) -> u32 {
        self.borrow_capacity
    }

    /// Number of allocated (non-reserved) live handles.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Current number of slots, including reserved ones and free ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn allocate(&mut self, value: HostValue) -> BridgeResult<Handle> {
        if self.next_free as usize == self.slots.len() {
            if self.slots.len() >= self.max_handles {
                return Err(BridgeError::ResourceExhausted {
                    capacity: self.max_handles,
                });
            }
            let next = self.slots.len() as u32 + 1;
            self.slots.push(Slot::Free { next });
        }

        let idx = self.next_free;
        let next = match self.slots[idx as usize] {
            Slot::Free { next } => next,
            _ => return Err(ProtocolViolation::UnallocatedHandle(idx).into()),
        };
        self.next_free = next;
        self.slots[idx as usize] = Slot::Live(value);
        self.live += 1;

        tracing::trace!(handle = idx, "allocated handle");
        Ok(Handle(idx))
    }

    pub fn get(&self, handle: Handle) -> Result<&HostValue, ProtocolViolation> {
        match self.slots.get(handle.index()) {
            Some(Slot::Live(value)) | Some(Slot::Borrowed(value)) => Ok(value),
            _ => Err(ProtocolViolation::UnallocatedHandle(handle.raw())),
        }
    }

    pub fn drop_handle(&mut self, handle: Handle) -> Result<(), ProtocolViolation> {
        if handle.raw() < self.reserved_threshold() {
            return Ok(());
        }
        match self.slots.get(handle.index()) {
            Some(Slot::Live(_)) => {}
            _ => return Err(ProtocolViolation::UnallocatedHandle(handle.raw())),
        }
        self.slots[handle.index()] = Slot::Free {
            next: self.next_free,
        };
        self.next_free = handle.raw();
        self.live -= 1;

        tracing::trace!(handle = handle.raw(), "dropped handle");
        Ok(())
    }

    /// Reads a handle and drops it in one step, transferring ownership to the host.
    pub fn take(&mut self, handle: Handle) -> Result<HostValue, ProtocolViolation> {
        let value = self.get(handle)?.clone();
        self.drop_handle(handle)?;
        Ok(value)
    }

    pub fn clone_ref(&mut self, handle: Handle) -> BridgeResult<Handle> {
        let value = self.get(handle)?.clone();
        self.allocate(value)
    }

    /// Pushes a value onto the borrow stack. Prefer [`BorrowScope`], which
    /// guarantees the matching pop.
    ///
    /// [`BorrowScope`]: crate::bridge::borrow::BorrowScope
    pub fn push_borrowed(&mut self, value: HostValue) -> Result<Handle, ProtocolViolation> {
        if self.stack_pointer == SENTINEL_COUNT {
            return Err(ProtocolViolation::BorrowStackOverflow {
                capacity: self.borrow_capacity,
            });
        }
        self.stack_pointer -= 1;
        self.slots[self.stack_pointer as usize] = Slot::Borrowed(value);
        Ok(Handle(self.stack_pointer))
    }

    pub fn pop_borrowed(&mut self, expected: Handle) -> Result<(), ProtocolViolation> {
        if self.stack_pointer != expected.raw() || self.stack_pointer >= self.reserved_threshold() {
            return Err(ProtocolViolation::BorrowStackImbalance {
                expected: expected.raw(),
                actual: self.stack_pointer,
            });
        }
        self.slots[self.stack_pointer as usize] = Slot::Vacant;
        self.stack_pointer += 1;
        Ok(())
    }

    /// Number of values currently borrowed.
    pub fn borrow_depth(&self) -> u32 {
        self.reserved_threshold() - self.stack_pointer
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new(DEFAULT_BORROW_STACK_CAPACITY, DEFAULT_MAX_HANDLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SlotTable {
        SlotTable::default()
    }

    #[test]
    fn test_sentinels_are_preinstalled() {
        let t = table();
        assert!(t.get(Handle::UNDEFINED).unwrap().is_undefined());
        assert!(t.get(Handle::NULL).unwrap().is_null());
        assert_eq!(t.get(Handle::TRUE).unwrap().downcast_ref::<bool>(), Some(&true));
        assert_eq!(t.get(Handle::FALSE).unwrap().downcast_ref::<bool>(), Some(&false));
        assert_eq!(t.reserved_threshold(), 36);
        assert_eq!(t.live_count(), 0);
    }

    #[test]
    fn test_first_allocation_starts_at_threshold() {
        let mut t = table();
        let h = t.allocate(HostValue::string("a")).unwrap();
        assert_eq!(h.raw(), t.reserved_threshold());
        assert_eq!(t.get(h).unwrap().as_str(), Some("a"));
    }

    #[test]
    fn test_dropped_middle_handle_is_reused_next() {
        let mut t = table();
        let h1 = t.allocate(HostValue::string("one")).unwrap();
        let h2 = t.allocate(HostValue::string("two")).unwrap();
        let h3 = t.allocate(HostValue::string("three")).unwrap();
        let len_before = t.len();

        t.drop_handle(h2).unwrap();
        let reused = t.allocate(HostValue::string("four")).unwrap();

        assert_eq!(reused, h2);
        assert_eq!(t.len(), len_before);
        assert_eq!(t.get(h1).unwrap().as_str(), Some("one"));
        assert_eq!(t.get(h3).unwrap().as_str(), Some("three"));
        assert_eq!(t.get(reused).unwrap().as_str(), Some("four"));
    }

    #[test]
    fn test_free_list_reuse_is_lifo() {
        let mut t = table();
        let handles: Vec<Handle> = (0..6)
            .map(|i| t.allocate(HostValue::new(i as f64)).unwrap())
            .collect();

        let drop_order = [handles[2], handles[0], handles[5], handles[3], handles[1], handles[4]];
        for h in drop_order {
            t.drop_handle(h).unwrap();
        }

        let reused: Vec<Handle> = (0..6)
            .map(|_| t.allocate(HostValue::undefined()).unwrap())
            .collect();
        let expected: Vec<Handle> = drop_order.iter().rev().copied().collect();
        assert_eq!(reused, expected);
    }

    #[test]
    fn test_reserved_handles_are_never_dropped_or_recycled() {
        let mut t = table();
        for raw in 0..t.reserved_threshold() {
            t.drop_handle(Handle::from_raw(raw)).unwrap();
        }
        assert!(t.get(Handle::NULL).unwrap().is_null());

        let h = t.allocate(HostValue::string("x")).unwrap();
        assert!(h.raw() >= t.reserved_threshold());
    }

    #[test]
    fn test_live_handles_never_alias_under_churn() {
        let mut t = table();
        let mut live: Vec<(Handle, f64)> = Vec::new();
        for step in 0..200u32 {
            if step % 3 == 2 && !live.is_empty() {
                let (h, _) = live.remove((step as usize * 7) % live.len());
                t.drop_handle(h).unwrap();
            } else {
                let tag = step as f64;
                let h = t.allocate(HostValue::new(tag)).unwrap();
                assert!(live.iter().all(|(other, _)| *other != h));
                live.push((h, tag));
            }
        }
        for (h, tag) in &live {
            assert_eq!(t.get(*h).unwrap().downcast_ref::<f64>(), Some(tag));
        }
        assert_eq!(t.live_count(), live.len());
    }

    #[test]
    fn test_get_unallocated_is_protocol_violation() {
        let mut t = table();
        let h = t.allocate(HostValue::string("gone")).unwrap();
        t.drop_handle(h).unwrap();

        assert_eq!(
            t.get(h).unwrap_err(),
            ProtocolViolation::UnallocatedHandle(h.raw())
        );
        assert!(t.get(Handle::from_raw(9_999)).is_err());
        assert!(t.drop_handle(h).is_err());
    }

    #[test]
    fn test_take_transfers_and_frees() {
        let mut t = table();
        let h = t.allocate(HostValue::string("owned")).unwrap();
        let value = t.take(h).unwrap();
        assert_eq!(value.as_str(), Some("owned"));
        assert!(t.get(h).is_err());
        assert_eq!(t.live_count(), 0);
    }

    #[test]
    fn test_clone_ref_aliases_without_disturbing_original() {
        let mut t = table();
        let original = t.allocate(HostValue::string("shared")).unwrap();
        let alias = t.clone_ref(original).unwrap();

        assert_ne!(original, alias);
        assert!(HostValue::ptr_eq(t.get(original).unwrap(), t.get(alias).unwrap()));

        t.drop_handle(alias).unwrap();
        assert_eq!(t.get(original).unwrap().as_str(), Some("shared"));
    }

    #[test]
    fn test_capacity_ceiling_is_resource_exhaustion() {
        let mut t = SlotTable::new(2, 8);
        assert_eq!(t.reserved_threshold(), 6);
        t.allocate(HostValue::undefined()).unwrap();
        t.allocate(HostValue::undefined()).unwrap();

        match t.allocate(HostValue::undefined()) {
            Err(BridgeError::ResourceExhausted { capacity }) => assert_eq!(capacity, 8),
            other => panic!("Expected ResourceExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_borrow_stack_is_lifo_and_bounded() {
        let mut t = SlotTable::new(2, DEFAULT_MAX_HANDLES);
        let a = t.push_borrowed(HostValue::string("a")).unwrap();
        let b = t.push_borrowed(HostValue::string("b")).unwrap();
        assert_eq!(t.borrow_depth(), 2);
        assert_eq!(t.get(a).unwrap().as_str(), Some("a"));
        assert_eq!(t.get(b).unwrap().as_str(), Some("b"));

        assert_eq!(
            t.push_borrowed(HostValue::undefined()).unwrap_err(),
            ProtocolViolation::BorrowStackOverflow { capacity: 2 }
        );

        assert!(t.pop_borrowed(a).is_err());
        t.pop_borrowed(b).unwrap();
        t.pop_borrowed(a).unwrap();
        assert_eq!(t.borrow_depth(), 0);
        assert!(t.get(a).is_err());
    }

    #[test]
    fn test_borrowed_handles_are_not_droppable() {
        let mut t = table();
        let b = t.push_borrowed(HostValue::string("borrowed")).unwrap();
        t.drop_handle(b).unwrap();
        assert_eq!(t.get(b).unwrap().as_str(), Some("borrowed"));
        t.pop_borrowed(b).unwrap();
    }
}
