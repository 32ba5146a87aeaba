// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for module loading and run loop events.
//!
//! This module contains message types for logging events related to:
//! * fetching module images and compiling them
//! * instantiation and the startup entry
//! * the run loop and shutdown

use std::fmt::{Display, Formatter};

/// Module image fetched successfully.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_ferry::observability::messages::runtime::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     location: "build/app.wasm",
///     size_bytes: 4096,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub location: &'a str,
    pub size_bytes: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded module image: {} ({} bytes)",
            self.location, self.size_bytes
        )
    }
}

/// Fetching a module image failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_ferry::observability::messages::runtime::ModuleLoadFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// let msg = ModuleLoadFailed {
///     location: "build/missing.wasm",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ModuleLoadFailed<'a> {
    pub location: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load module '{}': {}",
            self.location, self.error
        )
    }
}

/// The payload was not labelled as a WASM binary; compiling from a buffer instead.
///
/// # Log Level
/// `warn!` - Works, but the transport should be fixed
pub struct StreamingFallback<'a> {
    pub location: &'a str,
    pub content_type: Option<&'a str>,
}

impl Display for StreamingFallback<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Module '{}' served as '{}' instead of 'application/wasm'; falling back to buffer compilation",
            self.location,
            self.content_type.unwrap_or("<none>")
        )
    }
}

/// Module compiled.
///
/// # Log Level
/// `debug!` - Detail of the load pipeline
pub struct ModuleCompiled<'a> {
    pub location: &'a str,
    pub path: &'a str,
}

impl Display for ModuleCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Compiled module '{}' via {} path", self.location, self.path)
    }
}

/// Module instantiated against the host primitives and its exports bound.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ModuleInstantiated<'a> {
    pub location: &'a str,
    pub has_realloc: bool,
    pub fuel_per_entry: u64,
}

impl Display for ModuleInstantiated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instantiated module '{}' (reallocator: {}, fuel per entry: {})",
            self.location,
            if self.has_realloc { "yes" } else { "no" },
            self.fuel_per_entry
        )
    }
}

/// The startup entry returned.
///
/// # Log Level
/// `info!` - Important operational event
pub struct StartCompleted<'a> {
    pub location: &'a str,
    pub live_handles: usize,
}

impl Display for StartCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Start entry of '{}' completed; {} live handles",
            self.location, self.live_handles
        )
    }
}

/// An event was dispatched to its registered closures.
///
/// # Log Level
/// `debug!` - Per-entry detail
pub struct EventDispatched<'a> {
    pub event: &'a str,
    pub listeners: usize,
}

impl Display for EventDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatched '{}' event to {} listener(s)",
            self.event, self.listeners
        )
    }
}

/// The run loop started processing tasks.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunLoopStarted {
    pub pending_timers: usize,
    pub idle_timeout_ms: Option<u64>,
}

impl Display for RunLoopStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Run loop started with {} pending timer(s)", self.pending_timers)?;
        if let Some(ms) = self.idle_timeout_ms {
            write!(f, ", idle timeout {}ms", ms)?;
        }
        Ok(())
    }
}

/// The run loop stopped.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunLoopStopped<'a> {
    pub reason: &'a dyn Display,
    pub tasks_handled: usize,
}

impl Display for RunLoopStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run loop stopped ({}) after {} task(s)",
            self.reason, self.tasks_handled
        )
    }
}

/// A top-level entry into the module failed.
///
/// # Log Level
/// `error!` - A callback, timer or event did not complete
pub struct EntryFailed<'a> {
    pub entry: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for EntryFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Module entry '{}' failed: {}", self.entry, self.error)
    }
}

/// Shutdown released every host-held reference.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ShutdownCompleted {
    pub registrations_released: usize,
    pub timers_cancelled: usize,
    pub destructors_run: usize,
    pub leaked_handles: usize,
}

impl Display for ShutdownCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Shutdown released {} event registration(s) and {} timer(s); {} destructor(s) run, {} handle(s) still live",
            self.registrations_released,
            self.timers_cancelled,
            self.destructors_run,
            self.leaked_handles
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_fallback_names_content_type() {
        let msg = StreamingFallback {
            location: "app.wasm",
            content_type: Some("application/octet-stream"),
        };
        assert!(msg.to_string().contains("application/octet-stream"));

        let unlabelled = StreamingFallback {
            location: "app.wasm",
            content_type: None,
        };
        assert!(unlabelled.to_string().contains("<none>"));
    }

    #[test]
    fn test_run_loop_started_idle_suffix() {
        let msg = RunLoopStarted {
            pending_timers: 2,
            idle_timeout_ms: Some(500),
        };
        assert_eq!(
            msg.to_string(),
            "Run loop started with 2 pending timer(s), idle timeout 500ms"
        );
    }
}
