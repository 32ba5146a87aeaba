// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Closure bridge: module callbacks exposed to the host with manual refcounts.
//!
//! ## State machine
//!
//! ```text
//!            begin_invoke                finish_invoke (refcount > 0)
//!   Live ─────────────────▶ Invoking ─────────────────────────────▶ Live
//!    │                        │
//!    │ release (refcount = 0) │ finish_invoke (refcount = 0)
//!    ▼                        ▼
//!  Destroyed ◀────────────────┘
//! ```
//!
//! While `Invoking`, the stored environment pointer is cleared and the saved
//! copy travels with the [`Invocation`] ticket. A release that drops the count
//! to zero during an invocation is deferred: the invocation's own
//! `finish_invoke` observes zero and destroys. `Destroyed` is terminal and any
//! further use is a [`ProtocolViolation`].
//!
//! Destroyed closures are dropped from the registry. Ids are issued in
//! increasing order, so an id at or below the last one issued that is no
//! longer tracked is known to be destroyed.
//!
//! This module only does bookkeeping. Running the module's invoke and
//! destructor entries is done by `runtime::calls`, which acts on the
//! [`DestructorCall`]s returned here.

use std::collections::HashMap;
use std::fmt;

use crate::errors::ProtocolViolation;

/// Identifier for a closure issued by this bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureId(pub u64);

impl fmt::Display for ClosureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closure#{}", self.0)
    }
}

/// Host value stored in the slot table for a closure handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureRef(pub ClosureId);

/// How the host passes an argument to the invoke entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMode {
    /// `(env_ptr, env_data)`
    None,
    /// `(env_ptr, env_data, borrowed_handle)`; the handle is valid for the call only.
    Borrowed,
    /// `(env_ptr, env_data, owned_handle)`; the module must drop the handle.
    Owned,
}

impl TryFrom<u32> for ArgMode {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        match raw {
            0 => Ok(ArgMode::None),
            1 => Ok(ArgMode::Borrowed),
            2 => Ok(ArgMode::Owned),
            other => Err(other),
        }
    }
}

/// Phase of a tracked closure. Destroyed closures are no longer tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosurePhase {
    Live,
    Invoking,
}

/// Module-side description of a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureSpec {
    pub env_ptr: u32,
    pub env_data: u32,
    pub destructor_id: u32,
    pub invoke_id: u32,
    pub arg_mode: ArgMode,
}

#[derive(Debug, Clone)]
pub struct ClosureState {
    env_ptr: u32,
    env_data: u32,
    refcount: u32,
    destructor_id: u32,
    invoke_id: u32,
    arg_mode: ArgMode,
    phase: ClosurePhase,
}

impl ClosureState {
    fn new(spec: ClosureSpec) -> Self {
        Self {
            env_ptr: spec.env_ptr,
            env_data: spec.env_data,
            refcount: 1,
            destructor_id: spec.destructor_id,
            invoke_id: spec.invoke_id,
            arg_mode: spec.arg_mode,
            phase: ClosurePhase::Live,
        }
    }

    pub fn phase(&self) -> ClosurePhase {
        self.phase
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn env_ptr(&self) -> u32 {
        self.env_ptr
    }

    pub fn arg_mode(&self) -> ArgMode {
        self.arg_mode
    }
}

/// A pending call to the module destructor. Returned exactly once per closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the module destructor must be dispatched"]
pub struct DestructorCall {
    pub id: ClosureId,
    pub destructor_id: u32,
    pub env_ptr: u32,
    pub env_data: u32,
}

/// Ticket for one in-flight invocation.
#[derive(Debug)]
#[must_use = "every invocation must be finished"]
pub struct Invocation {
    pub id: ClosureId,
    pub invoke_id: u32,
    pub env_ptr: u32,
    pub env_data: u32,
    pub arg_mode: ArgMode,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other references remain.
    Retained,
    /// Reached zero during an invocation; the invocation destroys it on return.
    Deferred,
    Destroyed(DestructorCall),
}

/// All closures issued by one bridge.
#[derive(Debug, Default)]
pub struct ClosureRegistry {
    closures: HashMap<ClosureId, ClosureState>,
    next_id: u64,
}

impl ClosureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, spec: ClosureSpec) -> ClosureId {
        self.next_id += 1;
        let id = ClosureId(self.next_id);
        self.closures.insert(id, ClosureState::new(spec));
        id
    }

    /// State of a closure that has not been destroyed.
    pub fn state(&self, id: ClosureId) -> Option<&ClosureState> {
        self.closures.get(&id)
    }

    fn was_issued(&self, id: ClosureId) -> bool {
        id.0 >= 1 && id.0 <= self.next_id
    }

    fn live_mut(&mut self, id: ClosureId) -> Result<&mut ClosureState, ProtocolViolation> {
        if !self.closures.contains_key(&id) {
            return Err(if self.was_issued(id) {
                ProtocolViolation::ClosureDestroyed(id)
            } else {
                ProtocolViolation::UnknownClosure(id)
            });
        }
        self.closures
            .get_mut(&id)
            .ok_or(ProtocolViolation::UnknownClosure(id))
    }

    /// Adds a reference held by the host (an event registration or a timer).
    pub fn retain(&mut self, id: ClosureId) -> Result<(), ProtocolViolation> {
        let state = self.live_mut(id)?;
        state.refcount += 1;
        Ok(())
    }

    pub fn begin_invoke(&mut self, id: ClosureId) -> Result<Invocation, ProtocolViolation> {
        let state = self.live_mut(id)?;
        if state.phase == ClosurePhase::Invoking {
            return Err(ProtocolViolation::ReentrantInvocation(id));
        }
        state.refcount += 1;
        state.phase = ClosurePhase::Invoking;
        let env_ptr = std::mem::take(&mut state.env_ptr);

        Ok(Invocation {
            id,
            invoke_id: state.invoke_id,
            env_ptr,
            env_data: state.env_data,
            arg_mode: state.arg_mode,
        })
    }

    /// Ends an invocation, returning the destructor call if it was the last reference.
    pub fn finish_invoke(
        &mut self,
        invocation: Invocation,
    ) -> Result<Option<DestructorCall>, ProtocolViolation> {
        let id = invocation.id;
        let state = self.live_mut(id)?;
        state.refcount -= 1;
        if state.refcount == 0 {
            let destructor_id = state.destructor_id;
            self.closures.remove(&id);
            return Ok(Some(DestructorCall {
                id,
                destructor_id,
                env_ptr: invocation.env_ptr,
                env_data: invocation.env_data,
            }));
        }
        state.env_ptr = invocation.env_ptr;
        state.phase = ClosurePhase::Live;
        Ok(None)
    }

    /// Drops one reference.
    pub fn release(&mut self, id: ClosureId) -> Result<ReleaseOutcome, ProtocolViolation> {
        let state = self.live_mut(id)?;
        state.refcount -= 1;
        if state.refcount > 0 {
            return Ok(ReleaseOutcome::Retained);
        }
        if state.phase == ClosurePhase::Invoking {
            // The in-flight ticket's reference is still outstanding.
            state.refcount = 1;
            return Ok(ReleaseOutcome::Deferred);
        }
        let call = DestructorCall {
            id,
            destructor_id: state.destructor_id,
            env_ptr: state.env_ptr,
            env_data: state.env_data,
        };
        self.closures.remove(&id);
        Ok(ReleaseOutcome::Destroyed(call))
    }

    /// Number of closures not yet destroyed. Destroyed closures are not tracked.
    pub fn live_count(&self) -> usize {
        self.closures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClosureSpec {
        ClosureSpec {
            env_ptr: 1024,
            env_data: 7,
            destructor_id: 3,
            invoke_id: 2,
            arg_mode: ArgMode::Borrowed,
        }
    }

    #[test]
    fn test_repeated_invocation_never_destroys() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());

        for _ in 0..5 {
            let ticket = reg.begin_invoke(id).unwrap();
            assert_eq!(ticket.env_ptr, 1024);
            assert_eq!(reg.state(id).unwrap().env_ptr(), 0);
            assert_eq!(reg.finish_invoke(ticket).unwrap(), None);
        }

        let state = reg.state(id).unwrap();
        assert_eq!(state.phase(), ClosurePhase::Live);
        assert_eq!(state.refcount(), 1);
        assert_eq!(state.env_ptr(), 1024);
    }

    #[test]
    fn test_single_release_destroys_once() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());

        match reg.release(id).unwrap() {
            ReleaseOutcome::Destroyed(call) => {
                assert_eq!(call.destructor_id, 3);
                assert_eq!((call.env_ptr, call.env_data), (1024, 7));
            }
            other => panic!("Expected Destroyed, got {other:?}"),
        }
        assert!(reg.state(id).is_none());
        assert_eq!(reg.live_count(), 0);
    }

    #[test]
    fn test_release_during_invocation_is_deferred() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());

        let ticket = reg.begin_invoke(id).unwrap();
        assert_eq!(reg.release(id).unwrap(), ReleaseOutcome::Retained);
        let call = reg.finish_invoke(ticket).unwrap().expect("destroyed on return");
        assert_eq!((call.env_ptr, call.env_data), (1024, 7));
        assert!(reg.state(id).is_none());
    }

    #[test]
    fn test_extra_reference_released_inside_invocation_defers() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());
        let ticket = reg.begin_invoke(id).unwrap();

        // Owner's reference and the invocation's reference both dropped early.
        assert_eq!(reg.release(id).unwrap(), ReleaseOutcome::Retained);
        assert_eq!(reg.release(id).unwrap(), ReleaseOutcome::Deferred);
        assert!(reg.finish_invoke(ticket).unwrap().is_some());
    }

    #[test]
    fn test_destroyed_closure_is_a_protocol_fault() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());
        let _ = reg.release(id).unwrap();

        assert_eq!(
            reg.begin_invoke(id).unwrap_err(),
            ProtocolViolation::ClosureDestroyed(id)
        );
        assert_eq!(
            reg.release(id).unwrap_err(),
            ProtocolViolation::ClosureDestroyed(id)
        );
        assert!(reg.retain(id).is_err());
    }

    #[test]
    fn test_reentrant_invocation_is_a_protocol_fault() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());
        let ticket = reg.begin_invoke(id).unwrap();

        assert_eq!(
            reg.begin_invoke(id).unwrap_err(),
            ProtocolViolation::ReentrantInvocation(id)
        );
        assert_eq!(reg.finish_invoke(ticket).unwrap(), None);
    }

    #[test]
    fn test_retained_references_delay_destruction() {
        let mut reg = ClosureRegistry::new();
        let id = reg.create(spec());
        reg.retain(id).unwrap();
        reg.retain(id).unwrap();

        assert_eq!(reg.release(id).unwrap(), ReleaseOutcome::Retained);
        assert_eq!(reg.release(id).unwrap(), ReleaseOutcome::Retained);
        assert!(matches!(reg.release(id).unwrap(), ReleaseOutcome::Destroyed(_)));
    }

    #[test]
    fn test_unknown_closure() {
        let mut reg = ClosureRegistry::new();
        assert_eq!(
            reg.release(ClosureId(99)).unwrap_err(),
            ProtocolViolation::UnknownClosure(ClosureId(99))
        );
        assert_eq!(
            reg.release(ClosureId(0)).unwrap_err(),
            ProtocolViolation::UnknownClosure(ClosureId(0))
        );
    }

    #[test]
    fn test_destroyed_closures_are_not_retained() {
        let mut reg = ClosureRegistry::new();
        for round in 0..10_000 {
            let id = reg.create(spec());
            if round % 2 == 0 {
                let _ = reg.release(id).unwrap();
            } else {
                let ticket = reg.begin_invoke(id).unwrap();
                assert_eq!(reg.release(id).unwrap(), ReleaseOutcome::Retained);
                let _ = reg.finish_invoke(ticket).unwrap();
            }
        }
        assert_eq!(reg.live_count(), 0);
        assert!(reg.closures.is_empty());

        let fresh = reg.create(spec());
        assert_eq!(fresh, ClosureId(10_001));
        assert_eq!(
            reg.begin_invoke(ClosureId(5_000)).unwrap_err(),
            ProtocolViolation::ClosureDestroyed(ClosureId(5_000))
        );
        assert_eq!(reg.live_count(), 1);
    }

    #[test]
    fn test_arg_mode_from_raw() {
        assert_eq!(ArgMode::try_from(0), Ok(ArgMode::None));
        assert_eq!(ArgMode::try_from(2), Ok(ArgMode::Owned));
        assert_eq!(ArgMode::try_from(9), Err(9));
    }
}
