// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The host side of the boundary: the primitives the module imports and the
//! collaborators they act on (globals, a headless document, timers).

pub mod document;
pub mod environment;
pub mod imports;
pub mod timers;

use wasmtime::{Caller, Store};

use crate::bridge::borrow::SlotAccess;
use crate::bridge::slot_table::SlotTable;
use crate::bridge::BridgeContext;
use crate::config::FerryConfig;
use crate::runtime::calls::ModuleExports;

use document::HeadlessDocument;
use environment::Environment;
use timers::TimerQueue;

/// Data stored in the wasmtime store for one module instance.
#[derive(Debug)]
pub struct HostState {
    pub bridge: BridgeContext,
    pub environment: Environment,
    pub document: Option<HeadlessDocument>,
    pub timers: TimerQueue,
    /// Bound after instantiation; primitives that touch memory fail before then.
    pub exports: Option<ModuleExports>,
}

impl HostState {
    pub fn new(config: &FerryConfig) -> Self {
        Self {
            bridge: BridgeContext::new(
                config.bridge.borrow_stack_capacity,
                config.bridge.max_handles,
            ),
            environment: Environment::new(config.environment.scope),
            document: config
                .environment
                .has_document()
                .then(HeadlessDocument::new),
            timers: TimerQueue::new(),
            exports: None,
        }
    }
}

impl SlotAccess for HostState {
    fn slots_mut(&mut self) -> &mut SlotTable {
        &mut self.bridge.slots
    }
}

impl SlotAccess for Store<HostState> {
    fn slots_mut(&mut self) -> &mut SlotTable {
        &mut self.data_mut().bridge.slots
    }
}

impl SlotAccess for Caller<'_, HostState> {
    fn slots_mut(&mut self) -> &mut SlotTable {
        &mut self.data_mut().bridge.slots
    }
}
