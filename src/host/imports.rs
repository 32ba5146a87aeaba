// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The `ferry` import namespace.
//!
//! Every primitive runs through [`guarded`], which routes failures by
//! disposition:
//!
//! * host failures are boxed into the exception register and the primitive
//!   returns its zero value; the module checks `exception_take` right after;
//! * protocol violations halt the bridge and trap;
//! * anything else (bad UTF-8, out-of-bounds pointers, thrown values) traps
//!   the current call only.
//!
//! String arguments are `(ptr, len)` pairs. `ptr == 0` names an interned host
//! string by handle `len` instead; `(0, 0)` is the empty string.

use std::time::Duration;

use tokio::time::Instant;
use wasmtime::{Caller, Engine, Linker};

use crate::bridge::closure::{ArgMode, ClosureId, ClosureRef, ClosureSpec, ReleaseOutcome};
use crate::bridge::codec;
use crate::bridge::events::ListenerOptions;
use crate::bridge::memory::GuestAllocator;
use crate::bridge::slot_table::Handle;
use crate::bridge::value::{HostBytes, HostError, HostValue};
use crate::errors::{BridgeError, BridgeResult, ProtocolViolation};
use crate::host::document::{HeadlessDocument, NodeId};
use crate::host::environment::{self, GlobalName};
use crate::host::timers::TimerToken;
use crate::host::HostState;
use crate::observability::messages::bridge::{PrimitiveFailed, PrimitiveTrapped};
use crate::observability::messages::closure::ClosureCreated;
use crate::runtime::calls::{run_destructor, Guest};

/// Import module name every primitive is registered under.
pub const NAMESPACE: &str = "ferry";

/// Tracing target for module console output.
pub const MODULE_LOG_TARGET: &str = "module";

type Ctx<'c> = Caller<'c, HostState>;

/// Creates a linker with every host primitive registered.
pub fn create_linker(engine: &Engine) -> BridgeResult<Linker<HostState>> {
    let mut linker = Linker::new(engine);
    register_host_functions(&mut linker)
        .map_err(|e| BridgeError::EngineError(format!("failed to register host primitives: {e}")))?;
    Ok(linker)
}

/// Register all host primitives with a Wasmtime linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    register_handle_functions(linker)?;
    register_string_functions(linker)?;
    register_error_functions(linker)?;
    register_callback_functions(linker)?;
    register_probe_functions(linker)?;
    register_document_functions(linker)?;
    Ok(())
}

/// Runs a primitive body and applies the failure disposition.
fn guarded<'c, R: Default>(
    caller: &mut Ctx<'c>,
    primitive: &'static str,
    body: impl FnOnce(&mut Ctx<'c>) -> BridgeResult<R>,
) -> wasmtime::Result<R> {
    caller.data().bridge.ensure_running()?;

    match body(caller) {
        Ok(value) => Ok(value),
        Err(BridgeError::HostFailure { kind, message }) => {
            let error = HostError::new(kind, message);
            let handle = caller.data_mut().bridge.raise(HostValue::new(error.clone()))?;
            tracing::debug!(
                "{}",
                PrimitiveFailed {
                    primitive,
                    error: &error,
                    handle: handle.raw(),
                }
            );
            Ok(R::default())
        }
        Err(err) => {
            match &err {
                BridgeError::Protocol(violation) => caller.data_mut().bridge.halt(violation.clone()),
                BridgeError::Thrown(_) => {}
                other => tracing::warn!("{}", PrimitiveTrapped { primitive, error: other }),
            }
            Err(err.into())
        }
    }
}

fn value(c: &mut Ctx<'_>, handle: u32) -> BridgeResult<HostValue> {
    Ok(c.data().bridge.slots.get(Handle::from_raw(handle))?.clone())
}

fn alloc(c: &mut Ctx<'_>, value: HostValue) -> BridgeResult<u32> {
    Ok(c.data_mut().bridge.slots.allocate(value)?.raw())
}

fn read_str(c: &mut Ctx<'_>, ptr: u32, len: u32) -> BridgeResult<String> {
    if ptr == 0 {
        if len == 0 {
            return Ok(String::new());
        }
        let interned = value(c, len)?;
        return interned
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| BridgeError::host("TypeError", format!("handle {len} is not a string")));
    }
    codec::decode(&mut Guest::new(c)?, ptr, len)
}

/// Encodes `text` into module memory and writes `(ptr, len)` at `retptr`;
/// `(0, 0)` when there is no text.
fn write_str(c: &mut Ctx<'_>, retptr: u32, text: Option<&str>) -> BridgeResult<()> {
    let mut guest = Guest::new(c)?;
    let (ptr, len) = match text {
        Some(text) => {
            let encoded = codec::encode(&mut guest, text)?;
            (encoded.ptr, encoded.len)
        }
        None => (0, 0),
    };
    codec::write_pair(&mut guest, retptr, ptr, len)
}

fn closure_of(c: &mut Ctx<'_>, handle: u32) -> BridgeResult<ClosureId> {
    match value(c, handle)?.downcast_ref::<ClosureRef>() {
        Some(ClosureRef(id)) => Ok(*id),
        None => Err(ProtocolViolation::NotAClosure(handle).into()),
    }
}

/// Drops one host-held closure reference, running the destructor if due.
pub(crate) fn release_closure<C>(ctx: &mut C, id: ClosureId) -> BridgeResult<bool>
where
    C: wasmtime::AsContextMut<Data = HostState>,
{
    let outcome = ctx.as_context_mut().data_mut().bridge.closures.release(id)?;
    match outcome {
        ReleaseOutcome::Destroyed(call) => {
            run_destructor(ctx, call)?;
            Ok(true)
        }
        ReleaseOutcome::Retained | ReleaseOutcome::Deferred => Ok(false),
    }
}

fn with_document<R>(
    c: &mut Ctx<'_>,
    f: impl FnOnce(&mut HeadlessDocument) -> BridgeResult<R>,
) -> BridgeResult<R> {
    let document = c
        .data_mut()
        .document
        .as_mut()
        .ok_or_else(|| BridgeError::host("ReferenceError", "document is not defined"))?;
    f(document)
}

fn node(c: &mut Ctx<'_>, handle: u32) -> BridgeResult<NodeId> {
    let v = value(c, handle)?;
    with_document(c, |d| d.node_of(&v))
}

fn check_document(c: &mut Ctx<'_>, handle: u32) -> BridgeResult<()> {
    let v = value(c, handle)?;
    with_document(c, |d| {
        if HostValue::ptr_eq(&d.document_value(), &v) {
            Ok(())
        } else {
            Err(BridgeError::host("TypeError", format!("handle {handle} is not the document")))
        }
    })
}

fn node_handle(c: &mut Ctx<'_>, id: NodeId) -> BridgeResult<u32> {
    let v = with_document(c, |d| Ok(d.value(id)))?;
    alloc(c, v)
}

/// Register handle management primitives.
fn register_handle_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(NAMESPACE, "object_clone_ref", |mut caller: Ctx<'_>, h: u32| {
        guarded(&mut caller, "object_clone_ref", |c| {
            Ok(c.data_mut().bridge.slots.clone_ref(Handle::from_raw(h))?.raw())
        })
    })?;

    linker.func_wrap(NAMESPACE, "object_drop_ref", |mut caller: Ctx<'_>, h: u32| {
        guarded(&mut caller, "object_drop_ref", |c| {
            c.data_mut().bridge.slots.drop_handle(Handle::from_raw(h))?;
            Ok(())
        })
    })?;

    linker.func_wrap(NAMESPACE, "handle_threshold", |mut caller: Ctx<'_>| {
        guarded(&mut caller, "handle_threshold", |c| {
            Ok(c.data().bridge.slots.reserved_threshold())
        })
    })?;

    // Returns 0 when no exception is pending; exceptions are never reserved handles.
    linker.func_wrap(NAMESPACE, "exception_take", |mut caller: Ctx<'_>| {
        guarded(&mut caller, "exception_take", |c| {
            Ok(c.data_mut().bridge.take_exception().map_or(0, Handle::raw))
        })
    })?;

    Ok(())
}

/// Register string and byte array primitives.
fn register_string_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(NAMESPACE, "string_new", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "string_new", |c| {
            let text = read_str(c, ptr, len)?;
            alloc(c, HostValue::string(text))
        })
    })?;

    linker.func_wrap(NAMESPACE, "string_get", |mut caller: Ctx<'_>, retptr: u32, h: u32| {
        guarded(&mut caller, "string_get", |c| {
            let v = value(c, h)?;
            write_str(c, retptr, v.as_str())
        })
    })?;

    linker.func_wrap(NAMESPACE, "bytes_new", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "bytes_new", |c| {
            let bytes = codec::copy_out(&mut Guest::new(c)?, ptr, len)?;
            alloc(c, HostValue::new(HostBytes(bytes)))
        })
    })?;

    linker.func_wrap(NAMESPACE, "bytes_length", |mut caller: Ctx<'_>, h: u32| {
        guarded(&mut caller, "bytes_length", |c| {
            let v = value(c, h)?;
            let bytes = v
                .downcast_ref::<HostBytes>()
                .ok_or_else(|| BridgeError::host("TypeError", "value is not a byte array"))?;
            Ok(bytes.0.len() as u32)
        })
    })?;

    linker.func_wrap(NAMESPACE, "bytes_copy_to", |mut caller: Ctx<'_>, h: u32, ptr: u32| {
        guarded(&mut caller, "bytes_copy_to", |c| {
            let v = value(c, h)?;
            let bytes = v
                .downcast_ref::<HostBytes>()
                .ok_or_else(|| BridgeError::host("TypeError", "value is not a byte array"))?;
            codec::copy_in(&mut Guest::new(c)?, ptr, &bytes.0)
        })
    })?;

    Ok(())
}

/// Register error boxing, console and throw primitives.
fn register_error_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(NAMESPACE, "error_new", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "error_new", |c| {
            let message = read_str(c, ptr, len)?;
            alloc(c, HostValue::new(HostError::new("Error", message)))
        })
    })?;

    linker.func_wrap(NAMESPACE, "error_stack", |mut caller: Ctx<'_>, retptr: u32, h: u32| {
        guarded(&mut caller, "error_stack", |c| {
            let v = value(c, h)?;
            let stack = match v.downcast_ref::<HostError>() {
                Some(error) => error.stack.clone(),
                None => format!("{v:?}"),
            };
            write_str(c, retptr, Some(&stack))
        })
    })?;

    linker.func_wrap(NAMESPACE, "console_log", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "console_log", |c| {
            let text = read_str(c, ptr, len)?;
            tracing::info!(target: MODULE_LOG_TARGET, "{}", text);
            Ok(())
        })
    })?;

    // The message buffer belongs to the host once passed here.
    linker.func_wrap(NAMESPACE, "console_error", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "console_error", |c| {
            let text = read_str(c, ptr, len)?;
            tracing::error!(target: MODULE_LOG_TARGET, "{}", text);
            if ptr != 0 {
                Guest::new(c)?.free(ptr, len)?;
            }
            Ok(())
        })
    })?;

    linker.func_wrap(NAMESPACE, "throw_str", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "throw_str", |c| -> BridgeResult<()> {
            let message = read_str(c, ptr, len)?;
            Err(BridgeError::Thrown(HostValue::new(HostError::new("Error", message))))
        })
    })?;

    linker.func_wrap(NAMESPACE, "rethrow", |mut caller: Ctx<'_>, h: u32| {
        guarded(&mut caller, "rethrow", |c| -> BridgeResult<()> {
            let thrown = c.data_mut().bridge.slots.take(Handle::from_raw(h))?;
            Err(BridgeError::Thrown(thrown))
        })
    })?;

    Ok(())
}

/// Register closure, event registration and timer primitives.
fn register_callback_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(
        NAMESPACE,
        "closure_new",
        |mut caller: Ctx<'_>,
         env_ptr: u32,
         env_data: u32,
         destructor_id: u32,
         invoke_id: u32,
         arg_mode: u32| {
            guarded(&mut caller, "closure_new", |c| {
                let arg_mode = ArgMode::try_from(arg_mode).map_err(|raw| {
                    BridgeError::ValidationError(format!("unknown closure argument mode {raw}"))
                })?;
                let id = c.data_mut().bridge.closures.create(ClosureSpec {
                    env_ptr,
                    env_data,
                    destructor_id,
                    invoke_id,
                    arg_mode,
                });
                let handle = alloc(c, HostValue::new(ClosureRef(id)))?;
                tracing::debug!(
                    "{}",
                    ClosureCreated {
                        id,
                        handle,
                        invoke_id,
                        destructor_id,
                    }
                );
                Ok(handle)
            })
        },
    )?;

    // Consumes the handle and the module's reference. Returns 1 if this
    // destroyed the closure.
    linker.func_wrap(NAMESPACE, "cb_drop", |mut caller: Ctx<'_>, h: u32| {
        guarded(&mut caller, "cb_drop", |c| {
            let id = closure_of(c, h)?;
            c.data_mut().bridge.slots.drop_handle(Handle::from_raw(h))?;
            Ok(i32::from(release_closure(c, id)?))
        })
    })?;

    linker.func_wrap(
        NAMESPACE,
        "add_event",
        |mut caller: Ctx<'_>,
         target: u32,
         name_ptr: u32,
         name_len: u32,
         capture: u32,
         options: u32,
         callback: u32| {
            guarded(&mut caller, "add_event", |c| {
                let target = value(c, target)?;
                let event = read_str(c, name_ptr, name_len)?;
                let id = closure_of(c, callback)?;
                let bridge = &mut c.data_mut().bridge;
                if bridge.events.add(
                    target,
                    &event,
                    capture != 0,
                    ListenerOptions::from_bits(options),
                    id,
                ) {
                    bridge.closures.retain(id)?;
                }
                Ok(())
            })
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "remove_event",
        |mut caller: Ctx<'_>, target: u32, name_ptr: u32, name_len: u32, capture: u32, callback: u32| {
            guarded(&mut caller, "remove_event", |c| {
                let target = value(c, target)?;
                let event = read_str(c, name_ptr, name_len)?;
                let id = closure_of(c, callback)?;
                let removed = c
                    .data_mut()
                    .bridge
                    .events
                    .remove(&target, &event, capture != 0, id);
                if let Some(registration) = removed {
                    release_closure(c, registration.closure)?;
                }
                Ok(())
            })
        },
    )?;

    linker.func_wrap(NAMESPACE, "set_timeout", |mut caller: Ctx<'_>, callback: u32, delay_ms: u32| {
        guarded(&mut caller, "set_timeout", |c| {
            let id = closure_of(c, callback)?;
            let state = c.data_mut();
            state.bridge.closures.retain(id)?;
            let token = state
                .timers
                .schedule(id, Duration::from_millis(u64::from(delay_ms)), Instant::now());
            Ok(token.0)
        })
    })?;

    linker.func_wrap(NAMESPACE, "clear_timeout", |mut caller: Ctx<'_>, token: u32| {
        guarded(&mut caller, "clear_timeout", |c| {
            let cancelled = c
                .data_mut()
                .timers
                .cancel(TimerToken(token));
            if let Some(id) = cancelled {
                release_closure(c, id)?;
            }
            Ok(())
        })
    })?;

    Ok(())
}

/// Register value probes, global probes and the random source.
fn register_probe_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    fn probe(
        linker: &mut Linker<HostState>,
        name: &'static str,
        test: fn(&HostValue) -> bool,
    ) -> wasmtime::Result<()> {
        linker.func_wrap(NAMESPACE, name, move |mut caller: Ctx<'_>, h: u32| {
            guarded(&mut caller, name, |c| Ok(u32::from(test(&value(c, h)?))))
        })?;
        Ok(())
    }

    probe(linker, "is_undefined", HostValue::is_undefined)?;
    probe(linker, "is_null", HostValue::is_null)?;
    probe(linker, "is_object", HostValue::is_object)?;
    probe(linker, "is_string", HostValue::is_string)?;
    probe(linker, "is_function", |v| v.is::<ClosureRef>())?;
    probe(linker, "instanceof_window", environment::is_window)?;

    fn global(
        linker: &mut Linker<HostState>,
        name: &'static str,
        which: GlobalName,
    ) -> wasmtime::Result<()> {
        linker.func_wrap(NAMESPACE, name, move |mut caller: Ctx<'_>| {
            guarded(&mut caller, name, |c| {
                let global = c.data().environment.probe(which)?;
                alloc(c, global)
            })
        })?;
        Ok(())
    }

    global(linker, "global_this", GlobalName::This)?;
    global(linker, "global_self", GlobalName::SelfRef)?;
    global(linker, "global_window", GlobalName::Window)?;
    global(linker, "global_node", GlobalName::Global)?;

    linker.func_wrap(NAMESPACE, "random_fill", |mut caller: Ctx<'_>, ptr: u32, len: u32| {
        guarded(&mut caller, "random_fill", |c| {
            let mut bytes = vec![0u8; len as usize];
            environment::random_fill(&mut bytes)?;
            codec::copy_in(&mut Guest::new(c)?, ptr, &bytes)
        })
    })?;

    Ok(())
}

/// Register headless document primitives.
fn register_document_functions(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(NAMESPACE, "document", |mut caller: Ctx<'_>| {
        guarded(&mut caller, "document", |c| {
            let doc = with_document(c, |d| Ok(d.document_value()))?;
            alloc(c, doc)
        })
    })?;

    linker.func_wrap(NAMESPACE, "document_body", |mut caller: Ctx<'_>, doc: u32| {
        guarded(&mut caller, "document_body", |c| {
            check_document(c, doc)?;
            let body = with_document(c, |d| Ok(d.body()))?;
            node_handle(c, body)
        })
    })?;

    linker.func_wrap(NAMESPACE, "document_head", |mut caller: Ctx<'_>, doc: u32| {
        guarded(&mut caller, "document_head", |c| {
            check_document(c, doc)?;
            let head = with_document(c, |d| Ok(d.head()))?;
            node_handle(c, head)
        })
    })?;

    linker.func_wrap(NAMESPACE, "create_element", |mut caller: Ctx<'_>, doc: u32, ptr: u32, len: u32| {
        guarded(&mut caller, "create_element", |c| {
            check_document(c, doc)?;
            let tag = read_str(c, ptr, len)?;
            let id = with_document(c, |d| d.create_element(&tag))?;
            node_handle(c, id)
        })
    })?;

    linker.func_wrap(NAMESPACE, "create_text_node", |mut caller: Ctx<'_>, doc: u32, ptr: u32, len: u32| {
        guarded(&mut caller, "create_text_node", |c| {
            check_document(c, doc)?;
            let text = read_str(c, ptr, len)?;
            let id = with_document(c, |d| Ok(d.create_text_node(&text)))?;
            node_handle(c, id)
        })
    })?;

    linker.func_wrap(NAMESPACE, "create_comment", |mut caller: Ctx<'_>, doc: u32, ptr: u32, len: u32| {
        guarded(&mut caller, "create_comment", |c| {
            check_document(c, doc)?;
            let text = read_str(c, ptr, len)?;
            let id = with_document(c, |d| Ok(d.create_comment(&text)))?;
            node_handle(c, id)
        })
    })?;

    linker.func_wrap(NAMESPACE, "append_child", |mut caller: Ctx<'_>, parent: u32, child: u32| {
        guarded(&mut caller, "append_child", |c| {
            let (parent, child) = (node(c, parent)?, node(c, child)?);
            let id = with_document(c, |d| d.append_child(parent, child))?;
            node_handle(c, id)
        })
    })?;

    // A null or undefined reference node appends.
    linker.func_wrap(
        NAMESPACE,
        "insert_before",
        |mut caller: Ctx<'_>, parent: u32, child: u32, reference: u32| {
            guarded(&mut caller, "insert_before", |c| {
                let (parent, child) = (node(c, parent)?, node(c, child)?);
                let reference = match Handle::from_raw(reference) {
                    Handle::NULL | Handle::UNDEFINED => None,
                    _ => Some(node(c, reference)?),
                };
                let id = with_document(c, |d| d.insert_before(parent, child, reference))?;
                node_handle(c, id)
            })
        },
    )?;

    linker.func_wrap(NAMESPACE, "remove_child", |mut caller: Ctx<'_>, parent: u32, child: u32| {
        guarded(&mut caller, "remove_child", |c| {
            let (parent, child) = (node(c, parent)?, node(c, child)?);
            let id = with_document(c, |d| d.remove_child(parent, child))?;
            node_handle(c, id)
        })
    })?;

    linker.func_wrap(
        NAMESPACE,
        "replace_child",
        |mut caller: Ctx<'_>, parent: u32, new_child: u32, old_child: u32| {
            guarded(&mut caller, "replace_child", |c| {
                let parent = node(c, parent)?;
                let (new_child, old_child) = (node(c, new_child)?, node(c, old_child)?);
                let id = with_document(c, |d| d.replace_child(parent, new_child, old_child))?;
                node_handle(c, id)
            })
        },
    )?;

    linker.func_wrap(NAMESPACE, "set_text_data", |mut caller: Ctx<'_>, h: u32, ptr: u32, len: u32| {
        guarded(&mut caller, "set_text_data", |c| {
            let id = node(c, h)?;
            let text = read_str(c, ptr, len)?;
            with_document(c, |d| d.set_text_data(id, &text))
        })
    })?;

    linker.func_wrap(
        NAMESPACE,
        "set_attribute",
        |mut caller: Ctx<'_>, h: u32, name_ptr: u32, name_len: u32, value_ptr: u32, value_len: u32| {
            guarded(&mut caller, "set_attribute", |c| {
                let id = node(c, h)?;
                let name = read_str(c, name_ptr, name_len)?;
                let value = read_str(c, value_ptr, value_len)?;
                with_document(c, |d| d.set_attribute(id, &name, &value))
            })
        },
    )?;

    linker.func_wrap(NAMESPACE, "class_add", |mut caller: Ctx<'_>, h: u32, ptr: u32, len: u32| {
        guarded(&mut caller, "class_add", |c| {
            let id = node(c, h)?;
            let class = read_str(c, ptr, len)?;
            with_document(c, |d| d.class_add(id, &class))
        })
    })?;

    linker.func_wrap(NAMESPACE, "class_remove", |mut caller: Ctx<'_>, h: u32, ptr: u32, len: u32| {
        guarded(&mut caller, "class_remove", |c| {
            let id = node(c, h)?;
            let class = read_str(c, ptr, len)?;
            with_document(c, |d| d.class_remove(id, &class))
        })
    })?;

    linker.func_wrap(
        NAMESPACE,
        "style_set",
        |mut caller: Ctx<'_>, h: u32, prop_ptr: u32, prop_len: u32, value_ptr: u32, value_len: u32| {
            guarded(&mut caller, "style_set", |c| {
                let id = node(c, h)?;
                let property = read_str(c, prop_ptr, prop_len)?;
                let value = read_str(c, value_ptr, value_len)?;
                with_document(c, |d| d.style_set(id, &property, &value))
            })
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "style_get",
        |mut caller: Ctx<'_>, retptr: u32, h: u32, prop_ptr: u32, prop_len: u32| {
            guarded(&mut caller, "style_get", |c| {
                let id = node(c, h)?;
                let property = read_str(c, prop_ptr, prop_len)?;
                let current = with_document(c, |d| d.style_get(id, &property))?;
                write_str(c, retptr, Some(&current))
            })
        },
    )?;

    linker.func_wrap(
        NAMESPACE,
        "style_remove",
        |mut caller: Ctx<'_>, retptr: u32, h: u32, prop_ptr: u32, prop_len: u32| {
            guarded(&mut caller, "style_remove", |c| {
                let id = node(c, h)?;
                let property = read_str(c, prop_ptr, prop_len)?;
                let old = with_document(c, |d| d.style_remove(id, &property))?;
                write_str(c, retptr, Some(&old))
            })
        },
    )?;

    Ok(())
}
