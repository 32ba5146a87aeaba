// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `bridge` - handle table, views and the exception register
//! * `closure` - closure creation, invocation and destruction
//! * `runtime` - loading, instantiation, entry points and the run loop

pub mod bridge;
pub mod closure;
pub mod runtime;
