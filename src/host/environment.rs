// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Global execution context probes.
//!
//! The module branches on which global objects exist. The host decides that
//! once, from configuration, and answers every probe from the same
//! [`GlobalObject`] value so repeated probes return the same identity.

use serde::Deserialize;

use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};

/// Which kind of global context the module runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalScope {
    #[default]
    Window,
    Worker,
    Node,
    /// No global object at all.
    Bare,
}

impl std::fmt::Display for GlobalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GlobalScope::Window => "window",
            GlobalScope::Worker => "worker",
            GlobalScope::Node => "node",
            GlobalScope::Bare => "bare",
        };
        write!(f, "{name}")
    }
}

/// The host value behind every global probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalObject {
    pub scope: GlobalScope,
}

/// Names a global probe can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalName {
    This,
    SelfRef,
    Window,
    Global,
}

impl GlobalName {
    fn identifier(self) -> &'static str {
        match self {
            GlobalName::This => "globalThis",
            GlobalName::SelfRef => "self",
            GlobalName::Window => "window",
            GlobalName::Global => "global",
        }
    }
}

#[derive(Debug)]
pub struct Environment {
    scope: GlobalScope,
    global: HostValue,
}

impl Environment {
    pub fn new(scope: GlobalScope) -> Self {
        Self {
            scope,
            global: HostValue::new(GlobalObject { scope }),
        }
    }

    pub fn scope(&self) -> GlobalScope {
        self.scope
    }

    /// Resolves a global name, or fails with a boxable `ReferenceError`.
    pub fn probe(&self, name: GlobalName) -> BridgeResult<HostValue> {
        let present = match (name, self.scope) {
            (_, GlobalScope::Bare) => false,
            (GlobalName::This, _) => true,
            (GlobalName::SelfRef, scope) => matches!(scope, GlobalScope::Window | GlobalScope::Worker),
            (GlobalName::Window, scope) => scope == GlobalScope::Window,
            (GlobalName::Global, scope) => scope == GlobalScope::Node,
        };
        if !present {
            return Err(BridgeError::host(
                "ReferenceError",
                format!("{} is not defined", name.identifier()),
            ));
        }
        Ok(self.global.clone())
    }
}

/// True when `value` is the global object of a window context.
pub fn is_window(value: &HostValue) -> bool {
    value
        .downcast_ref::<GlobalObject>()
        .is_some_and(|g| g.scope == GlobalScope::Window)
}

/// Fills `dest` from the operating system's secure random source.
pub fn random_fill(dest: &mut [u8]) -> BridgeResult<()> {
    getrandom::getrandom(dest)
        .map_err(|err| BridgeError::host("OperationError", format!("random source unavailable: {err}")))
}
