// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Event registration tracking.
//!
//! Registrations are identified by `(target identity, event name, capture,
//! closure)`. The registry only records them; the caller owns the closure
//! reference bookkeeping (retain on a new add, release on remove).

use crate::bridge::closure::ClosureId;
use crate::bridge::value::HostValue;

/// Options passed with `add_event`, as a bit set from the module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub passive: bool,
    pub once: bool,
}

impl ListenerOptions {
    pub const PASSIVE: u32 = 1;
    pub const ONCE: u32 = 1 << 1;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            passive: bits & Self::PASSIVE != 0,
            once: bits & Self::ONCE != 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub target: HostValue,
    pub event: String,
    pub capture: bool,
    pub options: ListenerOptions,
    pub closure: ClosureId,
}

impl Registration {
    fn matches(&self, target: &HostValue, event: &str, capture: bool, closure: ClosureId) -> bool {
        HostValue::ptr_eq(&self.target, target)
            && self.event == event
            && self.capture == capture
            && self.closure == closure
    }
}

#[derive(Debug, Default)]
pub struct EventRegistry {
    registrations: Vec<Registration>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a registration. Returns `false` when an identical one exists.
    pub fn add(
        &mut self,
        target: HostValue,
        event: &str,
        capture: bool,
        options: ListenerOptions,
        closure: ClosureId,
    ) -> bool {
        if self
            .registrations
            .iter()
            .any(|r| r.matches(&target, event, capture, closure))
        {
            return false;
        }
        self.registrations.push(Registration {
            target,
            event: event.to_string(),
            capture,
            options,
            closure,
        });
        true
    }

    /// Removes the exact registration, if present.
    pub fn remove(
        &mut self,
        target: &HostValue,
        event: &str,
        capture: bool,
        closure: ClosureId,
    ) -> Option<Registration> {
        let idx = self
            .registrations
            .iter()
            .position(|r| r.matches(target, event, capture, closure))?;
        Some(self.registrations.remove(idx))
    }

    /// Registrations to run for one dispatch: capture phase first, then
    /// bubbling, each in registration order.
    pub fn matching(&self, target: &HostValue, event: &str) -> Vec<Registration> {
        let on_target = |r: &&Registration| HostValue::ptr_eq(&r.target, target) && r.event == event;
        let capture = self.registrations.iter().filter(on_target).filter(|r| r.capture);
        let bubble = self.registrations.iter().filter(on_target).filter(|r| !r.capture);
        capture.chain(bubble).cloned().collect()
    }

    /// True while an identical registration is still recorded.
    pub fn contains(&self, registration: &Registration) -> bool {
        self.registrations.iter().any(|r| {
            r.matches(
                &registration.target,
                &registration.event,
                registration.capture,
                registration.closure,
            )
        })
    }

    pub fn drain(&mut self) -> Vec<Registration> {
        std::mem::take(&mut self.registrations)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_add_then_single_remove_leaves_nothing() {
        let mut reg = EventRegistry::new();
        let target = HostValue::string("button");
        let cb = ClosureId(1);

        assert!(reg.add(target.clone(), "click", false, ListenerOptions::default(), cb));
        assert!(!reg.add(target.clone(), "click", false, ListenerOptions::default(), cb));
        assert_eq!(reg.len(), 1);

        assert!(reg.remove(&target, "click", false, cb).is_some());
        assert!(reg.is_empty());
        assert!(reg.matching(&target, "click").is_empty());
    }

    #[test]
    fn test_unknown_remove_changes_nothing() {
        let mut reg = EventRegistry::new();
        let target = HostValue::string("button");
        reg.add(target.clone(), "click", false, ListenerOptions::default(), ClosureId(1));

        assert!(reg.remove(&target, "click", true, ClosureId(1)).is_none());
        assert!(reg.remove(&target, "input", false, ClosureId(1)).is_none());
        assert!(reg.remove(&target, "click", false, ClosureId(2)).is_none());
        assert!(reg
            .remove(&HostValue::string("button"), "click", false, ClosureId(1))
            .is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_capture_and_bubble_are_distinct_registrations() {
        let mut reg = EventRegistry::new();
        let target = HostValue::string("div");
        assert!(reg.add(target.clone(), "click", false, ListenerOptions::default(), ClosureId(1)));
        assert!(reg.add(target.clone(), "click", true, ListenerOptions::default(), ClosureId(1)));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_matching_runs_capture_first_in_registration_order() {
        let mut reg = EventRegistry::new();
        let target = HostValue::string("div");
        let other = HostValue::string("span");
        let opts = ListenerOptions::default();

        reg.add(target.clone(), "click", false, opts, ClosureId(1));
        reg.add(target.clone(), "click", true, opts, ClosureId(2));
        reg.add(other.clone(), "click", true, opts, ClosureId(3));
        reg.add(target.clone(), "click", false, opts, ClosureId(4));
        reg.add(target.clone(), "click", true, opts, ClosureId(5));
        reg.add(target.clone(), "keydown", true, opts, ClosureId(6));

        let order: Vec<ClosureId> = reg
            .matching(&target, "click")
            .into_iter()
            .map(|r| r.closure)
            .collect();
        assert_eq!(order, vec![ClosureId(2), ClosureId(5), ClosureId(1), ClosureId(4)]);
    }

    #[test]
    fn test_contains_tracks_removal() {
        let mut reg = EventRegistry::new();
        let target = HostValue::string("div");
        reg.add(target.clone(), "click", false, ListenerOptions::default(), ClosureId(7));

        let snapshot = reg.matching(&target, "click");
        assert!(reg.contains(&snapshot[0]));
        reg.remove(&target, "click", false, ClosureId(7));
        assert!(!reg.contains(&snapshot[0]));
    }

    #[test]
    fn test_options_from_bits() {
        assert_eq!(ListenerOptions::from_bits(0), ListenerOptions::default());
        let both = ListenerOptions::from_bits(ListenerOptions::PASSIVE | ListenerOptions::ONCE);
        assert!(both.passive && both.once);
    }
}
