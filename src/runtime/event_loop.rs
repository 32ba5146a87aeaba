// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Single-threaded run loop.
//!
//! Host callbacks never re-enter module code directly. They are queued as
//! [`HostTask`]s through a [`RunLoopHandle`] and the loop, which owns the
//! instance, runs each one as a fresh top-level entry. Due timers fire from
//! the same loop.
//!
//! The loop stops when:
//! * a [`HostTask::Shutdown`] arrives,
//! * every handle is dropped and no timers remain,
//! * the cancellation token fires,
//! * the idle timeout passes without any task or timer,
//! * the bridge halts.
//!
//! In every case it finishes with [`BridgedInstance::shutdown`].

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::bridge::value::HostValue;
use crate::errors::ProtocolViolation;
use crate::observability::messages::runtime::{EntryFailed, RunLoopStarted, RunLoopStopped};
use crate::runtime::instance::{BridgedInstance, ShutdownReport};

/// Work delivered to the module through the run loop.
#[derive(Debug)]
pub enum HostTask {
    /// Fire `event` on `target`, passing `payload` to each listener.
    Dispatch {
        target: HostValue,
        event: String,
        payload: HostValue,
    },
    /// Call the closure behind a module handle.
    Invoke { handle: u32, arg: Option<HostValue> },
    Shutdown,
}

impl HostTask {
    fn entry(&self) -> &'static str {
        match self {
            HostTask::Dispatch { .. } => "dispatch",
            HostTask::Invoke { .. } => "invoke",
            HostTask::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    ShutdownRequested,
    /// All handles dropped with no timers pending.
    Drained,
    Cancelled,
    Idle,
    Halted(ProtocolViolation),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ShutdownRequested => write!(f, "shutdown requested"),
            StopReason::Drained => write!(f, "no work left"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Idle => write!(f, "idle timeout"),
            StopReason::Halted(violation) => write!(f, "bridge halted: {}", violation),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub tasks_handled: usize,
    pub timers_fired: usize,
    pub report: ShutdownReport,
}

/// Sends work to a [`RunLoop`]. Cloneable; the loop can drain once every
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct RunLoopHandle {
    sender: mpsc::UnboundedSender<HostTask>,
    cancel: CancellationToken,
}

impl RunLoopHandle {
    pub fn send(&self, task: HostTask) -> Result<(), mpsc::error::SendError<HostTask>> {
        self.sender.send(task)
    }

    pub fn dispatch(
        &self,
        target: HostValue,
        event: impl Into<String>,
        payload: HostValue,
    ) -> Result<(), mpsc::error::SendError<HostTask>> {
        self.send(HostTask::Dispatch {
            target,
            event: event.into(),
            payload,
        })
    }

    pub fn invoke(
        &self,
        handle: u32,
        arg: Option<HostValue>,
    ) -> Result<(), mpsc::error::SendError<HostTask>> {
        self.send(HostTask::Invoke { handle, arg })
    }

    /// Asks the loop to stop after the tasks already queued.
    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<HostTask>> {
        self.send(HostTask::Shutdown)
    }

    /// Stops the loop without waiting for queued tasks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels the loop without keeping the task channel open.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

pub struct RunLoop {
    instance: BridgedInstance,
    receiver: mpsc::UnboundedReceiver<HostTask>,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
}

impl RunLoop {
    pub fn new(instance: BridgedInstance, idle_timeout: Option<Duration>) -> (Self, RunLoopHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let run_loop = Self {
            instance,
            receiver,
            cancel: cancel.clone(),
            idle_timeout,
        };
        (run_loop, RunLoopHandle { sender, cancel })
    }

    pub fn instance(&self) -> &BridgedInstance {
        &self.instance
    }

    pub fn into_instance(self) -> BridgedInstance {
        self.instance
    }

    pub async fn run(&mut self) -> RunOutcome {
        tracing::info!(
            "{}",
            RunLoopStarted {
                pending_timers: self.instance.state().timers.len(),
                idle_timeout_ms: self.idle_timeout.map(|d| d.as_millis() as u64),
            }
        );

        let mut tasks_handled = 0;
        let mut timers_fired = 0;
        let mut channel_open = true;

        let reason = loop {
            if let Some(violation) = self.instance.state().bridge.halt_reason() {
                break StopReason::Halted(violation.clone());
            }
            if !channel_open && !self.instance.has_pending_timers() {
                break StopReason::Drained;
            }

            let deadline = self.instance.next_timer_deadline();
            let idle = self.idle_timeout;

            // Preconditions disable a branch but its future is still built,
            // so the disabled forms must not panic.
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break StopReason::Cancelled,

                task = self.receiver.recv(), if channel_open => match task {
                    Some(HostTask::Shutdown) => break StopReason::ShutdownRequested,
                    Some(task) => {
                        tasks_handled += 1;
                        self.handle(task);
                    }
                    None => channel_open = false,
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    timers_fired += self.fire_timers();
                }

                _ = tokio::time::sleep(idle.unwrap_or_default()), if idle.is_some() => break StopReason::Idle,
            }
        };

        let report = self.instance.shutdown();
        tracing::info!(
            "{}",
            RunLoopStopped {
                reason: &reason,
                tasks_handled,
            }
        );

        RunOutcome {
            reason,
            tasks_handled,
            timers_fired,
            report,
        }
    }

    fn handle(&mut self, task: HostTask) {
        let entry = task.entry();
        let result = match task {
            HostTask::Dispatch {
                target,
                event,
                payload,
            } => self
                .instance
                .dispatch_event(&target, &event, payload)
                .map(|_| ()),
            HostTask::Invoke { handle, arg } => self.instance.invoke_handle(handle, arg),
            HostTask::Shutdown => Ok(()),
        };

        if let Err(error) = result {
            tracing::error!("{}", EntryFailed { entry, error: &error });
        }
    }

    fn fire_timers(&mut self) -> usize {
        match self.instance.fire_due_timers(Instant::now()) {
            Ok(fired) => fired,
            Err(error) => {
                tracing::error!(
                    "{}",
                    EntryFailed {
                        entry: "timer",
                        error: &error,
                    }
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Idle.to_string(), "idle timeout");
        let halted = StopReason::Halted(ProtocolViolation::UnallocatedHandle(40));
        assert_eq!(halted.to_string(), "bridge halted: handle 40 is not allocated");
    }

    #[test]
    fn test_task_entry_names() {
        let dispatch = HostTask::Dispatch {
            target: HostValue::null(),
            event: "click".to_string(),
            payload: HostValue::undefined(),
        };
        assert_eq!(dispatch.entry(), "dispatch");
        assert_eq!(HostTask::Invoke { handle: 40, arg: None }.entry(), "invoke");
        assert_eq!(HostTask::Shutdown.entry(), "shutdown");
    }
}
