// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wasmtime engine configuration.

use crate::errors::{BridgeError, BridgeResult};
use wasmtime::{Config, Engine};

/// Creates the engine every bridged module runs on.
///
/// Core modules only, single memory, 32-bit addressing. Fuel is always on so
/// each top-level entry can be bounded.
pub fn create_engine() -> BridgeResult<Engine> {
    let mut config = Config::new();

    config.wasm_component_model(false);
    config.wasm_threads(false);
    config.wasm_relaxed_simd(false);
    config.wasm_simd(false);
    config.wasm_multi_memory(false);
    config.wasm_memory64(false);
    config.consume_fuel(true);
    config.epoch_interruption(false);

    tracing::debug!("Creating engine for core modules with fuel metering");
    Engine::new(&config).map_err(|e| BridgeError::EngineError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_engine() {
        assert!(create_engine().is_ok());
    }

    #[test]
    fn test_engine_rejects_simd() {
        let engine = create_engine().unwrap();
        let wasm = wat::parse_str(
            r#"(module (func (result v128) (v128.const i32x4 0 0 0 0)))"#,
        )
        .unwrap();
        assert!(wasmtime::Module::from_binary(&engine, &wasm).is_err());
    }
}
