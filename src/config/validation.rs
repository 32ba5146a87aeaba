// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Every check runs, so a bad file reports all of its problems at once.

use crate::config::consts::{MAX_BORROW_STACK_CAPACITY, MAX_FUEL_LEVEL};
use crate::config::FerryConfig;
use crate::bridge::slot_table::SENTINEL_COUNT;
use crate::errors::ConfigError;
use crate::host::environment::GlobalScope;

/// Validates a loaded configuration.
///
/// # Returns
/// * `Ok(())` - The configuration is usable
/// * `Err(Vec<ConfigError>)` - Every finding, in section order
pub fn validate_config(config: &FerryConfig) -> Result<(), Vec<ConfigError>> {
    let mut findings = Vec::new();

    if config.module.trim().is_empty() {
        findings.push(ConfigError::MissingModule);
    }

    let capacity = config.bridge.borrow_stack_capacity;
    if capacity == 0 || capacity > MAX_BORROW_STACK_CAPACITY {
        findings.push(ConfigError::BorrowCapacityOutOfRange {
            capacity,
            maximum: MAX_BORROW_STACK_CAPACITY,
        });
    }

    let threshold = (SENTINEL_COUNT + capacity.min(MAX_BORROW_STACK_CAPACITY)) as usize;
    if config.bridge.max_handles <= threshold || config.bridge.max_handles > u32::MAX as usize {
        findings.push(ConfigError::MaxHandlesTooSmall {
            max_handles: config.bridge.max_handles,
            threshold,
        });
    }

    if config.environment.document && config.environment.scope != GlobalScope::Window {
        tracing::warn!(
            scope = %config.environment.scope,
            "document requested outside a window scope; no document will be exposed"
        );
    }

    let fuel = &config.wasm.fuel;
    if fuel.get_minimum() > fuel.get_maximum() {
        findings.push(ConfigError::FuelBoundsInverted {
            minimum: fuel.get_minimum(),
            maximum: fuel.get_maximum(),
        });
    }
    if fuel.get_maximum() > MAX_FUEL_LEVEL {
        findings.push(ConfigError::FuelAboveLimit {
            maximum: fuel.get_maximum(),
            limit: MAX_FUEL_LEVEL,
        });
    }

    if config.run.idle_timeout_ms == Some(0) {
        findings.push(ConfigError::ZeroIdleTimeout);
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(findings)
    }
}
