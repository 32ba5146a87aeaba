// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Log text lives in struct-based message types implementing `Display`, so no
//! message strings are scattered through the bridge and runtime code.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::bridge` - slot table, memory view and exception register events
//! * `messages::closure` - closure lifecycle events
//! * `messages::runtime` - module loading, instantiation and run loop events
//!
//! # Usage
//!
//! ```rust
//! use the_ferry::observability::messages::runtime::ModuleLoaded;
//!
//! let msg = ModuleLoaded {
//!     location: "app.wasm",
//!     size_bytes: 4096,
//! };
//!
//! tracing::info!("{}", msg);
//! ```
//!
//! Module console output is not wrapped in a message type; it is forwarded
//! verbatim under the `module` tracing target.

pub mod messages;
