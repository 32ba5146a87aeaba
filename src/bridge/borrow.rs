// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scoped borrow-stack acquisition.
//!
//! A [`BorrowScope`] pushes one value onto the borrow stack and pops it when
//! the scope is dropped, so the pop happens on every exit path: normal return,
//! `?` propagation, or a trap unwinding out of a nested module call. The scope
//! holds the only mutable borrow of its owner, which also forces nested scopes
//! to end before their parents.

use std::ops::{Deref, DerefMut};

use crate::bridge::slot_table::{Handle, SlotTable};
use crate::bridge::value::HostValue;
use crate::errors::ProtocolViolation;

/// Anything that can hand out the bridge's slot table.
pub trait SlotAccess {
    fn slots_mut(&mut self) -> &mut SlotTable;
}

impl SlotAccess for SlotTable {
    fn slots_mut(&mut self) -> &mut SlotTable {
        self
    }
}

/// A borrowed handle that lives exactly as long as this guard.
pub struct BorrowScope<'a, S: SlotAccess> {
    owner: &'a mut S,
    handle: Handle,
}

impl<'a, S: SlotAccess> BorrowScope<'a, S> {
    pub fn enter(owner: &'a mut S, value: HostValue) -> Result<Self, ProtocolViolation> {
        let handle = owner.slots_mut().push_borrowed(value)?;
        Ok(Self { owner, handle })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl<S: SlotAccess> Deref for BorrowScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.owner
    }
}

impl<S: SlotAccess> DerefMut for BorrowScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.owner
    }
}

impl<S: SlotAccess> Drop for BorrowScope<'_, S> {
    fn drop(&mut self) {
        if let Err(violation) = self.owner.slots_mut().pop_borrowed(self.handle) {
            tracing::error!(handle = self.handle.raw(), %violation, "borrow scope ended out of order");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::consts::DEFAULT_MAX_HANDLES;

    #[test]
    fn test_scope_pops_on_normal_exit() {
        let mut table = SlotTable::default();
        {
            let scope = BorrowScope::enter(&mut table, HostValue::string("event")).unwrap();
            assert_eq!(scope.get(scope.handle()).unwrap().as_str(), Some("event"));
            assert_eq!(scope.borrow_depth(), 1);
        }
        assert_eq!(table.borrow_depth(), 0);
    }

    #[test]
    fn test_scope_pops_on_error_path() {
        fn fails_inside(table: &mut SlotTable) -> Result<(), ProtocolViolation> {
            let mut scope = BorrowScope::enter(table, HostValue::null())?;
            scope.slots_mut().get(Handle::from_raw(5_000))?;
            Ok(())
        }

        let mut table = SlotTable::default();
        assert!(fails_inside(&mut table).is_err());
        assert_eq!(table.borrow_depth(), 0);
    }

    #[test]
    fn test_nested_scopes_unwind_in_order() {
        let mut table = SlotTable::new(3, DEFAULT_MAX_HANDLES);
        {
            let mut outer = BorrowScope::enter(&mut table, HostValue::string("outer")).unwrap();
            let outer_handle = outer.handle();
            {
                let inner = BorrowScope::enter(&mut *outer, HostValue::string("inner")).unwrap();
                assert_ne!(inner.handle(), outer_handle);
                assert_eq!(inner.borrow_depth(), 2);
            }
            assert_eq!(outer.borrow_depth(), 1);
        }
        assert_eq!(table.borrow_depth(), 0);
    }

    #[test]
    fn test_overflow_leaves_stack_unchanged() {
        let mut table = SlotTable::new(1, DEFAULT_MAX_HANDLES);
        let mut outer = BorrowScope::enter(&mut table, HostValue::null()).unwrap();
        let overflow = BorrowScope::enter(&mut *outer, HostValue::null());
        assert!(matches!(
            overflow.err(),
            Some(ProtocolViolation::BorrowStackOverflow { capacity: 1 })
        ));
        assert_eq!(outer.borrow_depth(), 1);
    }
}
