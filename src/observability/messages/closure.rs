// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for closure lifecycle events.

use std::fmt::{Display, Formatter};

use crate::bridge::closure::ClosureId;

/// A module callback was wrapped as a closure.
///
/// # Log Level
/// `debug!` - Per-closure detail
///
/// # Example
/// ```
/// use the_ferry::bridge::closure::ClosureId;
/// use the_ferry::observability::messages::closure::ClosureCreated;
///
/// let msg = ClosureCreated {
///     id: ClosureId(1),
///     handle: 36,
///     invoke_id: 2,
///     destructor_id: 3,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ClosureCreated {
    pub id: ClosureId,
    pub handle: u32,
    pub invoke_id: u32,
    pub destructor_id: u32,
}

impl Display for ClosureCreated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created {} as handle {} (invoke entry {}, destructor entry {})",
            self.id, self.handle, self.invoke_id, self.destructor_id
        )
    }
}

/// A closure's module destructor ran.
///
/// # Log Level
/// `debug!` - Per-closure detail
pub struct ClosureDestroyed {
    pub id: ClosureId,
    pub destructor_id: u32,
}

impl Display for ClosureDestroyed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Destroyed {} via destructor entry {}",
            self.id, self.destructor_id
        )
    }
}

/// A closure invocation failed inside the module.
///
/// # Log Level
/// `error!` - The host-triggered callback did not complete
pub struct ClosureInvocationFailed<'a> {
    pub id: ClosureId,
    pub error: &'a dyn std::error::Error,
}

impl Display for ClosureInvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Invocation of {} failed: {}", self.id, self.error)
    }
}

/// A closure destructor trapped; the closure is still marked destroyed.
///
/// # Log Level
/// `error!` - Module-side resources may have leaked
pub struct DestructorFailed<'a> {
    pub id: ClosureId,
    pub error: &'a dyn std::error::Error,
}

impl Display for DestructorFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Destructor for {} failed: {}", self.id, self.error)
    }
}

/// A closure became due for destruction after the bridge halted; its
/// destructor was not called.
///
/// # Log Level
/// `warn!` - Module-side resources behind the closure are leaked
pub struct DestructorSkipped {
    pub id: ClosureId,
    pub destructor_id: u32,
}

impl Display for DestructorSkipped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipped destructor entry {} for {}: bridge halted",
            self.destructor_id, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_destroyed_message() {
        let msg = ClosureDestroyed {
            id: ClosureId(4),
            destructor_id: 9,
        };
        assert_eq!(msg.to_string(), "Destroyed closure#4 via destructor entry 9");
    }

    #[test]
    fn test_destructor_skipped_message() {
        let msg = DestructorSkipped {
            id: ClosureId(2),
            destructor_id: 1,
        };
        assert_eq!(msg.to_string(), "Skipped destructor entry 1 for closure#2: bridge halted");
    }
}
