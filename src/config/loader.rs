// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_BORROW_STACK_CAPACITY, DEFAULT_FUEL_LEVEL, DEFAULT_MAX_HANDLES, MAX_FUEL_LEVEL,
    MIN_FUEL_LEVEL,
};
use crate::host::environment::GlobalScope;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration for a bridged module run.
///
/// Only `module` is required; every section falls back to the defaults in
/// [`consts`](crate::config::consts).
///
/// # Example
/// ```yaml
/// module: app.wasm
/// bridge:
///   borrow_stack_capacity: 32
///   max_handles: 1048576
/// environment:
///   scope: window
///   document: true
/// wasm:
///   fuel:
///     per_entry: 100000000
/// run:
///   idle_timeout_ms: 5000
/// ```
#[derive(Debug, Deserialize)]
pub struct FerryConfig {
    pub module: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub wasm: WasmConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl FerryConfig {
    /// Configuration for a module location with every section defaulted.
    pub fn for_module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            bridge: BridgeConfig::default(),
            environment: EnvironmentConfig::default(),
            wasm: WasmConfig::default(),
            run: RunConfig::default(),
        }
    }
}

/// Slot table sizing.
///
/// `borrow_stack_capacity` also fixes the reserved-handle threshold
/// (`4 + borrow_stack_capacity`), which the module reads back through the
/// `handle_threshold` import.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_borrow_capacity")]
    pub borrow_stack_capacity: u32,
    #[serde(default = "default_max_handles")]
    pub max_handles: usize,
}

fn default_borrow_capacity() -> u32 {
    DEFAULT_BORROW_STACK_CAPACITY
}

fn default_max_handles() -> usize {
    DEFAULT_MAX_HANDLES
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            borrow_stack_capacity: DEFAULT_BORROW_STACK_CAPACITY,
            max_handles: DEFAULT_MAX_HANDLES,
        }
    }
}

/// Which globals the module sees, and whether a headless document exists.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub scope: GlobalScope,
    #[serde(default = "default_document")]
    pub document: bool,
}

fn default_document() -> bool {
    true
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            scope: GlobalScope::Window,
            document: true,
        }
    }
}

impl EnvironmentConfig {
    /// A document only exists in a window scope.
    pub fn has_document(&self) -> bool {
        self.document && self.scope == GlobalScope::Window
    }
}

/// WASM execution limits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WasmConfig {
    #[serde(default)]
    pub fuel: FuelConfig,
}

/// Fuel granted per top-level entry (start, event dispatch, timer, closure call).
///
/// # Example
/// ```yaml
/// fuel:
///   per_entry: 100000000   # 100 million instructions
///   minimum: 1000000       # 1 million instructions
///   maximum: 500000000     # 500 million instructions (hard limit)
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuelConfig {
    pub per_entry: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    pub fn get_per_entry(&self) -> u64 {
        self.per_entry.unwrap_or(DEFAULT_FUEL_LEVEL)
    }

    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Clamps a fuel level to the configured bounds.
    ///
    /// ```
    /// use the_ferry::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// assert_eq!(config.validate_and_clamp(1_000_000_000), 500_000_000);
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum();
        if requested < min || requested > max {
            tracing::warn!(requested, min, max, "fuel level out of bounds, clamping");
        }
        requested.clamp(min, max.max(min))
    }

    /// Fuel actually granted per entry.
    pub fn effective(&self) -> u64 {
        self.validate_and_clamp(self.get_per_entry())
    }
}

/// Run loop behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    /// Stop the run loop after this long without any activity.
    pub idle_timeout_ms: Option<u64>,
}

impl RunConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FerryConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let cfg: FerryConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Load a config from a YAML file and reject invalid values, listing every finding.
pub fn load_and_validate_config<P: AsRef<Path>>(
    path: P,
) -> Result<FerryConfig, Box<dyn std::error::Error>> {
    let cfg = load_config(path)?;

    if let Err(findings) = crate::config::validate_config(&cfg) {
        let messages: Vec<String> = findings.iter().map(|e| e.to_string()).collect();
        return Err(format!("Configuration validation failed:\n{}", messages.join("\n")).into());
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_minimal_config_uses_defaults() {
        let cfg: FerryConfig = serde_yaml::from_str("module: app.wasm").unwrap();
        assert_eq!(cfg.module, "app.wasm");
        assert_eq!(cfg.bridge.borrow_stack_capacity, 32);
        assert_eq!(cfg.bridge.max_handles, DEFAULT_MAX_HANDLES);
        assert_eq!(cfg.environment.scope, GlobalScope::Window);
        assert!(cfg.environment.has_document());
        assert_eq!(cfg.wasm.fuel.effective(), DEFAULT_FUEL_LEVEL);
        assert_eq!(cfg.run.idle_timeout(), None);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
module: build/app.wasm
bridge:
  borrow_stack_capacity: 64
  max_handles: 4096
environment:
  scope: worker
  document: true
wasm:
  fuel:
    per_entry: 2000000
run:
  idle_timeout_ms: 250
"#;
        let cfg: FerryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.bridge.borrow_stack_capacity, 64);
        assert_eq!(cfg.bridge.max_handles, 4096);
        assert_eq!(cfg.environment.scope, GlobalScope::Worker);
        assert!(!cfg.environment.has_document());
        assert_eq!(cfg.wasm.fuel.effective(), 2_000_000);
        assert_eq!(cfg.run.idle_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn parse_rejects_unknown_scope() {
        let yaml = "module: a.wasm\nenvironment:\n  scope: browser\n";
        assert!(serde_yaml::from_str::<FerryConfig>(yaml).is_err());
    }

    #[test]
    fn test_fuel_is_clamped() {
        let fuel = FuelConfig {
            per_entry: Some(10),
            minimum: None,
            maximum: None,
        };
        assert_eq!(fuel.effective(), MIN_FUEL_LEVEL);
    }

    #[test]
    fn test_load_and_validate_valid_config() {
        let file = write_config("module: app.wasm\nbridge:\n  borrow_stack_capacity: 16\n");
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.bridge.borrow_stack_capacity, 16);
    }

    #[test]
    fn test_load_and_validate_lists_every_finding() {
        let file = write_config(
            "module: ''\nbridge:\n  borrow_stack_capacity: 0\n  max_handles: 3\n",
        );
        let message = load_and_validate_config(file.path()).unwrap_err().to_string();
        assert!(message.contains("Configuration validation failed"));
        assert!(message.contains("module location"));
        assert!(message.contains("borrow_stack_capacity"));
        assert!(message.contains("max_handles"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config("/nonexistent/ferry.yaml").is_err());
    }
}
