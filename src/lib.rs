// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod bridge;     // handles, strings, closures, events
pub mod config;     // YAML configuration
pub mod errors;     // error handling
pub mod host;       // host primitives and their collaborators
pub mod observability;
pub mod runtime;    // load, instantiate, run
