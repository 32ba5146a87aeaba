// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default fuel granted to each top-level entry into the module (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel level (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;

/// Default borrow stack depth
pub const DEFAULT_BORROW_STACK_CAPACITY: u32 = 32;
/// Largest accepted borrow stack depth
pub const MAX_BORROW_STACK_CAPACITY: u32 = 1024;
/// Default hard ceiling on slot table length
pub const DEFAULT_MAX_HANDLES: usize = 1 << 20;

/// Maximum allowed size for module images (16 MB)
pub const MAX_MODULE_SIZE: usize = 16 * 1024 * 1024;
