// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Findings produced by configuration validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The module location is empty
    MissingModule,
    /// The borrow stack capacity is zero or above the accepted maximum
    BorrowCapacityOutOfRange {
        capacity: u32,
        maximum: u32,
    },
    /// The handle ceiling leaves no room above the reserved handles
    MaxHandlesTooSmall {
        max_handles: usize,
        /// First non-reserved handle for the configured borrow capacity
        threshold: usize,
    },
    /// Fuel minimum is above fuel maximum
    FuelBoundsInverted {
        minimum: u64,
        maximum: u64,
    },
    /// Fuel maximum exceeds the built-in security limit
    FuelAboveLimit {
        maximum: u64,
        limit: u64,
    },
    /// An idle timeout of zero would stop the run loop immediately
    ZeroIdleTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingModule => write!(f, "A module location is required"),
            ConfigError::BorrowCapacityOutOfRange { capacity, maximum } => {
                write!(
                    f,
                    "bridge.borrow_stack_capacity must be between 1 and {}, got {}",
                    maximum, capacity
                )
            }
            ConfigError::MaxHandlesTooSmall {
                max_handles,
                threshold,
            } => {
                write!(
                    f,
                    "bridge.max_handles ({}) must exceed the reserved threshold ({}) and fit in 32 bits",
                    max_handles, threshold
                )
            }
            ConfigError::FuelBoundsInverted { minimum, maximum } => {
                write!(
                    f,
                    "wasm.fuel.minimum ({}) is greater than wasm.fuel.maximum ({})",
                    minimum, maximum
                )
            }
            ConfigError::FuelAboveLimit { maximum, limit } => {
                write!(
                    f,
                    "wasm.fuel.maximum ({}) exceeds the security limit of {}",
                    maximum, limit
                )
            }
            ConfigError::ZeroIdleTimeout => {
                write!(f, "run.idle_timeout_ms must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
