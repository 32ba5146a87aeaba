// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Opaque host values.
//!
//! The bridge never inspects what it stores: a [`HostValue`] is a shared,
//! type-erased pointer, and the host primitives that created a value are the
//! only code that downcasts it. Cloning a `HostValue` aliases the same
//! underlying value, which is what `clone_ref` relies on.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

/// The `undefined` sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Undefined;

/// The `null` sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null;

/// A host error boxed for the module.
#[derive(Debug, Clone)]
pub struct HostError {
    pub kind: &'static str,
    pub message: String,
    pub stack: String,
}

impl HostError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let stack = format!("{kind}: {message}\n{}", Backtrace::capture());
        Self {
            kind,
            message,
            stack,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HostError {}

/// An immutable host-side byte array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBytes(pub Vec<u8>);

/// Shared handle to an opaque host value.
#[derive(Clone)]
pub struct HostValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl HostValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn undefined() -> Self {
        Self::new(Undefined)
    }

    pub fn null() -> Self {
        Self::new(Null)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value.into())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// True when both values alias the same host allocation.
    pub fn ptr_eq(a: &HostValue, b: &HostValue) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn is_undefined(&self) -> bool {
        self.is::<Undefined>()
    }

    pub fn is_null(&self) -> bool {
        self.is::<Null>()
    }

    pub fn is_string(&self) -> bool {
        self.is::<String>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// Primitives are the sentinels, booleans, numbers and strings; everything
    /// else is an object.
    pub fn is_object(&self) -> bool {
        !(self.is_undefined()
            || self.is_null()
            || self.is::<bool>()
            || self.is::<f64>()
            || self.is_string())
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            return write!(f, "HostValue({s:?})");
        }
        if let Some(err) = self.downcast_ref::<HostError>() {
            return write!(f, "HostValue({err})");
        }
        write!(f, "HostValue(<{}>)", self.type_name)
    }
}
