// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading, instantiating and driving a bridged module.
//!
//! ## Initialization handshake
//! 1. [`loader`] fetches the module image and compiles it (streaming path for
//!    payloads labelled `application/wasm`, buffer path otherwise).
//! 2. [`instance::BridgedInstance::instantiate`] links the `ferry` imports and
//!    binds the module's exports.
//! 3. [`instance::BridgedInstance::start`] invokes `ferry_start` exactly once.
//! 4. [`event_loop::RunLoop`] delivers every later entry.

pub mod calls;
pub mod detector;
pub mod engine;
pub mod event_loop;
pub mod instance;
pub mod loader;


pub use engine::create_engine;
pub use event_loop::{HostTask, RunLoop, RunLoopHandle, RunOutcome, StopReason};
pub use instance::{BridgedInstance, ShutdownReport};
pub use loader::{compile, load_module, CompilePath, FileFetcher, ModuleFetcher, ModulePayload};
