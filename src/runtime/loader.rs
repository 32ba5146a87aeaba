// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module image fetching and compilation.
//!
//! A module is fetched as a [`ModulePayload`] (bytes plus the content type the
//! transport labelled it with) and compiled along one of two paths:
//!
//! * **Streaming** - the payload is labelled `application/wasm`. The binary is
//!   checked to be a core module and compiled directly.
//! * **Buffer** - any other label. A [`StreamingFallback`] warning is logged and
//!   the bytes are compiled from the buffer, which also accepts the text format.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use wasmtime::{Engine, Module};

use crate::config::consts::MAX_MODULE_SIZE;
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::runtime::{
    ModuleCompiled, ModuleLoadFailed, ModuleLoaded, StreamingFallback,
};
use crate::runtime::detector::ensure_core_module;

pub const WASM_CONTENT_TYPE: &str = "application/wasm";

/// A fetched module image.
#[derive(Debug, Clone)]
pub struct ModulePayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Where the bytes came from, for diagnostics.
    pub origin: String,
}

impl ModulePayload {
    /// Pre-fetched bytes. Unlabelled bytes take the buffer path.
    pub fn from_bytes(
        bytes: impl Into<Vec<u8>>,
        content_type: Option<&str>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_owned),
            origin: origin.into(),
        }
    }

    pub fn is_labelled_wasm(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(WASM_CONTENT_TYPE))
    }
}

/// Retrieves module images by location.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> BridgeResult<ModulePayload>;

    fn name(&self) -> &'static str;
}

/// Fetches module images from the local filesystem.
///
/// The content type is derived from the extension: `.wasm` is labelled
/// `application/wasm`, `.wat` is `text/plain`, anything else is unlabelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl FileFetcher {
    fn content_type_for(path: &Path) -> Option<&'static str> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wasm") => Some(WASM_CONTENT_TYPE),
            Some(ext) if ext.eq_ignore_ascii_case("wat") => Some("text/plain"),
            _ => None,
        }
    }

    async fn read(location: &str) -> BridgeResult<ModulePayload> {
        let path = Path::new(location);
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > MAX_MODULE_SIZE as u64 {
            return Err(BridgeError::ValidationError(format!(
                "WASM module too large: {} bytes (max: {} bytes)",
                metadata.len(),
                MAX_MODULE_SIZE
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        Ok(ModulePayload::from_bytes(
            bytes,
            Self::content_type_for(path),
            location,
        ))
    }
}

#[async_trait]
impl ModuleFetcher for FileFetcher {
    async fn fetch(&self, location: &str) -> BridgeResult<ModulePayload> {
        match Self::read(location).await {
            Ok(payload) => {
                tracing::info!(
                    "{}",
                    ModuleLoaded {
                        location,
                        size_bytes: payload.bytes.len(),
                    }
                );
                Ok(payload)
            }
            Err(error) => {
                tracing::error!(
                    "{}",
                    ModuleLoadFailed {
                        location,
                        error: &error,
                    }
                );
                Err(error)
            }
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Which compilation path a payload took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePath {
    Streaming,
    Buffer,
}

impl fmt::Display for CompilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilePath::Streaming => write!(f, "streaming"),
            CompilePath::Buffer => write!(f, "buffer"),
        }
    }
}

/// Compiles a payload, preferring the streaming path.
pub fn compile(engine: &Engine, payload: &ModulePayload) -> BridgeResult<(Module, CompilePath)> {
    if payload.bytes.len() > MAX_MODULE_SIZE {
        return Err(BridgeError::ValidationError(format!(
            "WASM module too large: {} bytes (max: {} bytes)",
            payload.bytes.len(),
            MAX_MODULE_SIZE
        )));
    }

    let (module, path) = if payload.is_labelled_wasm() {
        ensure_core_module(&payload.bytes)?;
        let module = Module::from_binary(engine, &payload.bytes)
            .map_err(|e| BridgeError::ModuleError(e.to_string()))?;
        (module, CompilePath::Streaming)
    } else {
        tracing::warn!(
            "{}",
            StreamingFallback {
                location: &payload.origin,
                content_type: payload.content_type.as_deref(),
            }
        );
        if payload.bytes.starts_with(b"\0asm") {
            ensure_core_module(&payload.bytes)?;
        }
        let module = Module::new(engine, &payload.bytes)
            .map_err(|e| BridgeError::ModuleError(e.to_string()))?;
        (module, CompilePath::Buffer)
    };

    tracing::debug!(
        "{}",
        ModuleCompiled {
            location: &payload.origin,
            path: &path.to_string(),
        }
    );
    Ok((module, path))
}

/// Fetches and compiles in one step.
pub async fn load_module(
    fetcher: &dyn ModuleFetcher,
    engine: &Engine,
    location: &str,
) -> BridgeResult<(Module, CompilePath)> {
    let payload = fetcher.fetch(location).await?;
    compile(engine, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::engine::create_engine;
    use std::io::Write;
    use tempfile::Builder;

    const EMPTY_MODULE: &str = "(module (func (export \"noop\")))";

    fn temp_module(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_content_type_label_matching() {
        let labelled = ModulePayload::from_bytes(vec![], Some("application/wasm"), "a");
        assert!(labelled.is_labelled_wasm());

        let with_params = ModulePayload::from_bytes(vec![], Some("Application/WASM; charset=binary"), "a");
        assert!(with_params.is_labelled_wasm());

        let octet = ModulePayload::from_bytes(vec![], Some("application/octet-stream"), "a");
        assert!(!octet.is_labelled_wasm());

        let unlabelled = ModulePayload::from_bytes(vec![], None, "a");
        assert!(!unlabelled.is_labelled_wasm());
    }

    #[test]
    fn test_compile_streaming_path() {
        let engine = create_engine().unwrap();
        let bytes = wat::parse_str(EMPTY_MODULE).unwrap();
        let payload = ModulePayload::from_bytes(bytes, Some(WASM_CONTENT_TYPE), "mem");

        let (module, path) = compile(&engine, &payload).unwrap();
        assert_eq!(path, CompilePath::Streaming);
        assert!(module.get_export("noop").is_some());
    }

    #[test]
    fn test_compile_falls_back_to_buffer_for_unlabelled_binary() {
        let engine = create_engine().unwrap();
        let bytes = wat::parse_str(EMPTY_MODULE).unwrap();
        let payload = ModulePayload::from_bytes(bytes, Some("application/octet-stream"), "mem");

        let (_, path) = compile(&engine, &payload).unwrap();
        assert_eq!(path, CompilePath::Buffer);
    }

    #[test]
    fn test_buffer_path_accepts_text_format() {
        let engine = create_engine().unwrap();
        let payload = ModulePayload::from_bytes(EMPTY_MODULE.as_bytes(), Some("text/plain"), "mem");

        let (_, path) = compile(&engine, &payload).unwrap();
        assert_eq!(path, CompilePath::Buffer);
    }

    #[test]
    fn test_text_labelled_as_wasm_is_rejected() {
        let engine = create_engine().unwrap();
        let payload = ModulePayload::from_bytes(EMPTY_MODULE.as_bytes(), Some(WASM_CONTENT_TYPE), "mem");
        assert!(compile(&engine, &payload).is_err());
    }

    #[test]
    fn test_component_rejected_on_both_paths() {
        let engine = create_engine().unwrap();
        let component = wat::parse_str("(component)").unwrap();

        for label in [Some(WASM_CONTENT_TYPE), None] {
            let payload = ModulePayload::from_bytes(component.clone(), label, "mem");
            assert!(matches!(
                compile(&engine, &payload),
                Err(BridgeError::UnsupportedEncoding(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_file_fetcher_labels_by_extension() {
        let bytes = wat::parse_str(EMPTY_MODULE).unwrap();
        let wasm = temp_module(".wasm", &bytes);
        let wat = temp_module(".wat", EMPTY_MODULE.as_bytes());
        let bin = temp_module(".bin", &bytes);

        let fetcher = FileFetcher;
        let payload = fetcher.fetch(wasm.path().to_str().unwrap()).await.unwrap();
        assert_eq!(payload.content_type.as_deref(), Some(WASM_CONTENT_TYPE));
        assert_eq!(payload.bytes, bytes);

        let payload = fetcher.fetch(wat.path().to_str().unwrap()).await.unwrap();
        assert_eq!(payload.content_type.as_deref(), Some("text/plain"));

        let payload = fetcher.fetch(bin.path().to_str().unwrap()).await.unwrap();
        assert_eq!(payload.content_type, None);
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file() {
        let result = FileFetcher.fetch("/nonexistent/app.wasm").await;
        assert!(matches!(result, Err(BridgeError::IoError(_))));
    }

    #[tokio::test]
    async fn test_load_module_from_wat_file() {
        let engine = create_engine().unwrap();
        let wat = temp_module(".wat", EMPTY_MODULE.as_bytes());

        let (module, path) = load_module(&FileFetcher, &engine, wat.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(path, CompilePath::Buffer);
        assert!(module.get_export("noop").is_some());
    }
}
