// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A module instance bound to the bridge.
//!
//! [`BridgedInstance`] owns the wasmtime store and is the only way the host
//! enters module code: the startup entry, event dispatch, timer callbacks and
//! direct closure calls. Every entry refuels the store, refuses to run once the
//! bridge has halted, and halts the bridge when a protocol violation surfaces.

use tokio::time::Instant;
use wasmtime::{Engine, Instance, Module, Store};

use crate::bridge::closure::{ClosureId, ClosureRef};
use crate::bridge::slot_table::Handle;
use crate::bridge::value::HostValue;
use crate::config::FerryConfig;
use crate::errors::{BridgeError, BridgeResult, ProtocolViolation};
use crate::host::imports::{create_linker, release_closure};
use crate::host::HostState;
use crate::observability::messages::runtime::{
    EntryFailed, EventDispatched, ModuleInstantiated, ShutdownCompleted, StartCompleted,
};
use crate::runtime::calls::{
    invoke_closure, ModuleExports, FREE_EXPORT, MALLOC_EXPORT, MEMORY_EXPORT, REALLOC_EXPORT,
    START_EXPORT, TABLE_EXPORT,
};

/// What [`BridgedInstance::shutdown`] released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub registrations_released: usize,
    pub timers_cancelled: usize,
    pub destructors_run: usize,
    /// Handles the module still holds after teardown.
    pub leaked_handles: usize,
}

pub struct BridgedInstance {
    store: Store<HostState>,
    started: bool,
    fuel: u64,
    origin: String,
}

impl BridgedInstance {
    /// Instantiates `module` against the `ferry` imports and binds its exports.
    ///
    /// `memory`, `__indirect_function_table`, `ferry_malloc` and `ferry_start`
    /// are required. `ferry_realloc` and `ferry_free` are optional, but if
    /// exported they must have the expected signatures.
    pub fn instantiate(engine: &Engine, module: &Module, config: &FerryConfig) -> BridgeResult<Self> {
        let fuel = config.wasm.fuel.effective();
        let mut store = Store::new(engine, HostState::new(config));
        store.set_fuel(fuel).map_err(BridgeError::ExecutionError)?;

        let linker = create_linker(engine)?;
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| BridgeError::ModuleError(e.to_string()))?;

        let exports = bind_exports(&mut store, &instance)?;
        let has_realloc = exports.realloc.is_some();
        store.data_mut().exports = Some(exports);

        tracing::info!(
            "{}",
            ModuleInstantiated {
                location: &config.module,
                has_realloc,
                fuel_per_entry: fuel,
            }
        );

        Ok(Self {
            store,
            started: false,
            fuel,
            origin: config.module.clone(),
        })
    }

    /// Invokes `ferry_start`. Only the first call runs it.
    pub fn start(&mut self) -> BridgeResult<()> {
        if self.started {
            return Err(BridgeError::AlreadyStarted);
        }
        self.started = true;

        let start = self.exports()?.start;
        self.enter(|store| start.call(&mut *store, ()).map_err(BridgeError::from_trap))?;

        tracing::info!(
            "{}",
            StartCompleted {
                location: &self.origin,
                live_handles: self.live_handles(),
            }
        );
        Ok(())
    }

    /// Delivers `event` on `target` to every matching registration.
    ///
    /// A listener removed by an earlier listener in the same dispatch is
    /// skipped. `once` registrations are removed before their closure runs.
    /// A failing listener is logged and the rest still run, unless the failure
    /// halted the bridge. Returns the number of listeners that completed.
    pub fn dispatch_event(
        &mut self,
        target: &HostValue,
        event: &str,
        payload: HostValue,
    ) -> BridgeResult<usize> {
        self.store.data().bridge.ensure_running()?;

        let listeners = self.store.data().bridge.events.matching(target, event);
        let mut delivered = 0;

        for registration in listeners {
            let events = &mut self.store.data_mut().bridge.events;
            if !events.contains(&registration) {
                continue;
            }
            if registration.options.once {
                events.remove(
                    &registration.target,
                    &registration.event,
                    registration.capture,
                    registration.closure,
                );
            }

            let id = registration.closure;
            let payload = payload.clone();
            let result = self.enter(|store| invoke_closure(store, id, Some(payload)));
            self.settle(event, result, &mut delivered)?;

            if registration.options.once {
                self.release_reference(id)?;
            }
        }

        tracing::debug!(
            "{}",
            EventDispatched {
                event,
                listeners: delivered,
            }
        );
        Ok(delivered)
    }

    /// Calls the closure behind a module handle directly.
    pub fn invoke_handle(&mut self, handle: u32, arg: Option<HostValue>) -> BridgeResult<()> {
        self.enter(|store| {
            let value = store.data().bridge.slots.get(Handle::from_raw(handle))?.clone();
            let id = match value.downcast_ref::<ClosureRef>() {
                Some(ClosureRef(id)) => *id,
                None => return Err(ProtocolViolation::NotAClosure(handle).into()),
            };
            invoke_closure(store, id, arg)
        })
    }

    /// Runs every timer due at `now`, then gives back each timer's closure
    /// reference. Returns the number of callbacks that completed.
    pub fn fire_due_timers(&mut self, now: Instant) -> BridgeResult<usize> {
        self.store.data().bridge.ensure_running()?;

        let due = self.store.data_mut().timers.pop_due(now);
        let mut fired = 0;
        for timer in due {
            tracing::trace!(token = timer.token.0, closure = %timer.closure, "timer due");
            let id = timer.closure;
            let result = self.enter(|store| invoke_closure(store, id, None));
            self.settle("timer", result, &mut fired)?;
            self.release_reference(id)?;
        }
        Ok(fired)
    }

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.store.data().timers.next_deadline()
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.store.data().timers.is_empty()
    }

    /// Releases every event registration and pending timer, running the
    /// destructors that become due. After a halt nothing is called into the
    /// module; the references are only counted.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let state = self.store.data_mut();
        let registrations = state.bridge.events.drain();
        let timers = state.timers.drain();
        let halted = state.bridge.is_halted();

        let mut report = ShutdownReport {
            registrations_released: registrations.len(),
            timers_cancelled: timers.len(),
            ..ShutdownReport::default()
        };

        let held = registrations
            .iter()
            .map(|r| r.closure)
            .chain(timers.iter().map(|t| t.closure));
        if !halted {
            for id in held {
                match self.enter(|store| release_closure(store, id)) {
                    Ok(true) => report.destructors_run += 1,
                    Ok(false) => {}
                    Err(error) => tracing::error!(
                        "{}",
                        EntryFailed {
                            entry: "shutdown",
                            error: &error,
                        }
                    ),
                }
            }
        }

        report.leaked_handles = self.live_handles();
        tracing::info!(
            "{}",
            ShutdownCompleted {
                registrations_released: report.registrations_released,
                timers_cancelled: report.timers_cancelled,
                destructors_run: report.destructors_run,
                leaked_handles: report.leaked_handles,
            }
        );
        report
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn live_handles(&self) -> usize {
        self.store.data().bridge.slots.live_count()
    }

    pub fn state(&self) -> &HostState {
        self.store.data()
    }

    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    /// The headless document's body node, when a document exists.
    pub fn document_body(&self) -> Option<HostValue> {
        let document = self.store.data().document.as_ref()?;
        Some(document.value(document.body()))
    }

    /// Serialized body markup, when a document exists.
    pub fn body_html(&self) -> Option<String> {
        let document = self.store.data().document.as_ref()?;
        Some(document.outer_html(document.body()))
    }

    fn exports(&self) -> BridgeResult<ModuleExports> {
        self.store
            .data()
            .exports
            .clone()
            .ok_or_else(|| BridgeError::MissingExport(START_EXPORT.to_string()))
    }

    /// Runs one top-level entry into the module.
    fn enter<R>(
        &mut self,
        entry: impl FnOnce(&mut Store<HostState>) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        self.store.data().bridge.ensure_running()?;
        self.store
            .set_fuel(self.fuel)
            .map_err(BridgeError::ExecutionError)?;

        let result = entry(&mut self.store);
        if let Err(BridgeError::Protocol(violation)) = &result {
            self.store.data_mut().bridge.halt(violation.clone());
        }
        result
    }

    fn release_reference(&mut self, id: ClosureId) -> BridgeResult<()> {
        self.enter(|store| release_closure(store, id).map(|_| ()))
    }

    /// Counts a completed listener, logs a failed one, and stops on a halt.
    fn settle(&self, entry: &str, result: BridgeResult<()>, completed: &mut usize) -> BridgeResult<()> {
        match result {
            Ok(()) => {
                *completed += 1;
                Ok(())
            }
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                tracing::error!("{}", EntryFailed { entry, error: &error });
                Ok(())
            }
        }
    }
}

fn bind_exports(store: &mut Store<HostState>, instance: &Instance) -> BridgeResult<ModuleExports> {
    let missing = |name: &str| BridgeError::MissingExport(name.to_string());
    let mismatched = |name: &str, e: wasmtime::Error| BridgeError::MissingExport(format!("{name}: {e}"));

    let memory = instance
        .get_memory(&mut *store, MEMORY_EXPORT)
        .ok_or_else(|| missing(MEMORY_EXPORT))?;
    let table = instance
        .get_table(&mut *store, TABLE_EXPORT)
        .ok_or_else(|| missing(TABLE_EXPORT))?;
    let malloc = instance
        .get_typed_func::<u32, u32>(&mut *store, MALLOC_EXPORT)
        .map_err(|e| mismatched(MALLOC_EXPORT, e))?;
    let start = instance
        .get_typed_func::<(), ()>(&mut *store, START_EXPORT)
        .map_err(|e| mismatched(START_EXPORT, e))?;

    let realloc = match instance.get_export(&mut *store, REALLOC_EXPORT) {
        Some(_) => Some(
            instance
                .get_typed_func::<(u32, u32, u32), u32>(&mut *store, REALLOC_EXPORT)
                .map_err(|e| mismatched(REALLOC_EXPORT, e))?,
        ),
        None => None,
    };
    let free = match instance.get_export(&mut *store, FREE_EXPORT) {
        Some(_) => Some(
            instance
                .get_typed_func::<(u32, u32), ()>(&mut *store, FREE_EXPORT)
                .map_err(|e| mismatched(FREE_EXPORT, e))?,
        ),
        None => None,
    };

    Ok(ModuleExports {
        memory,
        table,
        malloc,
        realloc,
        free,
        start,
    })
}
