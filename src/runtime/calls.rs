// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Calls from the host into module code.
//!
//! [`Guest`] adapts a store (or a `Caller` inside an import) to the bridge's
//! memory and allocator traits. [`invoke_closure`] and [`run_destructor`]
//! drive the closure state machine around the actual table calls.

use std::fmt;

use wasmtime::{AsContextMut, Func, Memory, Ref, Table, TypedFunc, Val};

use crate::bridge::borrow::{BorrowScope, SlotAccess};
use crate::bridge::closure::{ArgMode, ClosureId, DestructorCall, Invocation};
use crate::bridge::memory::{GuestAllocator, GuestMemory, MemoryViewCache};
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::host::HostState;
use crate::observability::messages::closure::{ClosureDestroyed, DestructorFailed, DestructorSkipped};

pub const MEMORY_EXPORT: &str = "memory";
pub const TABLE_EXPORT: &str = "__indirect_function_table";
pub const MALLOC_EXPORT: &str = "ferry_malloc";
pub const REALLOC_EXPORT: &str = "ferry_realloc";
pub const FREE_EXPORT: &str = "ferry_free";
pub const START_EXPORT: &str = "ferry_start";

/// The exports the bridge needs from an instance.
#[derive(Clone)]
pub struct ModuleExports {
    pub memory: Memory,
    pub table: Table,
    pub malloc: TypedFunc<u32, u32>,
    pub realloc: Option<TypedFunc<(u32, u32, u32), u32>>,
    pub free: Option<TypedFunc<(u32, u32), ()>>,
    pub start: TypedFunc<(), ()>,
}

impl fmt::Debug for ModuleExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleExports")
            .field("has_realloc", &self.realloc.is_some())
            .field("has_free", &self.free.is_some())
            .finish_non_exhaustive()
    }
}

/// Memory and allocator access through a store context.
pub struct Guest<'a, C> {
    ctx: &'a mut C,
    exports: ModuleExports,
}

impl<'a, C: AsContextMut<Data = HostState>> Guest<'a, C> {
    pub fn new(ctx: &'a mut C) -> BridgeResult<Self> {
        let exports = ctx
            .as_context_mut()
            .data()
            .exports
            .clone()
            .ok_or_else(|| BridgeError::MissingExport(format!("{MEMORY_EXPORT} (instance not bound yet)")))?;
        Ok(Self { ctx, exports })
    }

    pub fn state(&mut self) -> &mut HostState {
        self.exports.memory.data_and_store_mut(&mut *self.ctx).1
    }
}

impl<C: AsContextMut<Data = HostState>> GuestMemory for Guest<'_, C> {
    fn buffer(&mut self) -> BridgeResult<(&mut [u8], &mut MemoryViewCache)> {
        let (data, state) = self.exports.memory.data_and_store_mut(&mut *self.ctx);
        Ok((data, &mut state.bridge.views))
    }
}

impl<C: AsContextMut<Data = HostState>> GuestAllocator for Guest<'_, C> {
    fn malloc(&mut self, size: u32) -> BridgeResult<u32> {
        self.exports
            .malloc
            .call(&mut *self.ctx, size)
            .map_err(BridgeError::from_trap)
    }

    fn has_realloc(&self) -> bool {
        self.exports.realloc.is_some()
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32) -> BridgeResult<u32> {
        let realloc = self
            .exports
            .realloc
            .as_ref()
            .ok_or_else(|| BridgeError::MissingExport(REALLOC_EXPORT.to_string()))?;
        realloc
            .call(&mut *self.ctx, (ptr, old_size, new_size))
            .map_err(BridgeError::from_trap)
    }

    fn free(&mut self, ptr: u32, size: u32) -> BridgeResult<()> {
        match &self.exports.free {
            Some(free) => free
                .call(&mut *self.ctx, (ptr, size))
                .map_err(BridgeError::from_trap),
            None => {
                tracing::trace!(ptr, size, "module exports no free; block leaked");
                Ok(())
            }
        }
    }
}

fn exports_of<C: AsContextMut<Data = HostState>>(ctx: &mut C) -> BridgeResult<ModuleExports> {
    ctx.as_context_mut()
        .data()
        .exports
        .clone()
        .ok_or_else(|| BridgeError::MissingExport(TABLE_EXPORT.to_string()))
}

fn table_func<C: AsContextMut<Data = HostState>>(
    ctx: &mut C,
    table: &Table,
    index: u32,
) -> BridgeResult<Func> {
    match table.get(&mut *ctx, u64::from(index)) {
        Some(Ref::Func(Some(func))) => Ok(func),
        _ => Err(BridgeError::MissingExport(format!(
            "{TABLE_EXPORT}[{index}] is not a function"
        ))),
    }
}

/// Runs a closure's destructor entry. The closure is already destroyed.
///
/// Once the bridge has halted no module code runs; the destructor is skipped
/// and logged.
pub fn run_destructor<C: AsContextMut<Data = HostState>>(
    ctx: &mut C,
    call: DestructorCall,
) -> BridgeResult<()> {
    if ctx.as_context_mut().data().bridge.is_halted() {
        tracing::warn!(
            "{}",
            DestructorSkipped {
                id: call.id,
                destructor_id: call.destructor_id,
            }
        );
        return Ok(());
    }

    let exports = exports_of(ctx)?;
    let result = table_func(ctx, &exports.table, call.destructor_id).and_then(|func| {
        func.call(
            &mut *ctx,
            &[Val::I32(call.env_ptr as i32), Val::I32(call.env_data as i32)],
            &mut [],
        )
        .map_err(BridgeError::from_trap)
    });

    match &result {
        Ok(()) => tracing::debug!(
            "{}",
            ClosureDestroyed {
                id: call.id,
                destructor_id: call.destructor_id,
            }
        ),
        Err(error) => tracing::error!("{}", DestructorFailed { id: call.id, error }),
    }
    result
}

/// Invokes a closure once, passing `arg` according to its argument mode.
///
/// The invocation is always finished, whatever the call did, and a
/// destructor that becomes due is run before returning.
pub fn invoke_closure<C>(ctx: &mut C, id: ClosureId, arg: Option<HostValue>) -> BridgeResult<()>
where
    C: AsContextMut<Data = HostState> + SlotAccess,
{
    let exports = exports_of(ctx)?;
    let invocation = ctx
        .as_context_mut()
        .data_mut()
        .bridge
        .closures
        .begin_invoke(id)?;

    let outcome = call_entry(ctx, &exports.table, &invocation, arg);

    let finished = ctx
        .as_context_mut()
        .data_mut()
        .bridge
        .closures
        .finish_invoke(invocation)?;
    if let Some(call) = finished {
        let destroyed = run_destructor(ctx, call);
        outcome?;
        return destroyed;
    }
    outcome
}

fn call_entry<C>(
    ctx: &mut C,
    table: &Table,
    invocation: &Invocation,
    arg: Option<HostValue>,
) -> BridgeResult<()>
where
    C: AsContextMut<Data = HostState> + SlotAccess,
{
    let func = table_func(ctx, table, invocation.invoke_id)?;
    let env = [
        Val::I32(invocation.env_ptr as i32),
        Val::I32(invocation.env_data as i32),
    ];
    let arg = arg.unwrap_or_else(HostValue::undefined);

    let result = match invocation.arg_mode {
        ArgMode::None => func.call(&mut *ctx, &env, &mut []),
        ArgMode::Borrowed => {
            let mut scope = BorrowScope::enter(ctx, arg)?;
            let handle = scope.handle().raw();
            func.call(&mut *scope, &[env[0].clone(), env[1].clone(), Val::I32(handle as i32)], &mut [])
        }
        ArgMode::Owned => {
            let handle = ctx.slots_mut().allocate(arg)?.raw();
            func.call(&mut *ctx, &[env[0].clone(), env[1].clone(), Val::I32(handle as i32)], &mut [])
        }
    };
    result.map_err(BridgeError::from_trap)
}
