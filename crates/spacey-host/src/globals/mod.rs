// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Globals installed into every request context
//!
//! Implements:
//! - `require(name)` - Load a module once per request
//! - `include(name)` - Run a module again, with fresh exports
//! - `onexit(fn)` - Register a hook run when the request ends
//! - `exit([code])` - Stop the request
//! - `global` - The global object
//! - `system` - Host bindings, see [`system`]

pub mod system;

use crate::module_system::loader;
use crate::request::Request;
use crate::runtime::context::StateRef;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::object::builtins::JsFunction;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, js_string};

/// Signature of host functions bound to a request
pub(crate) type HostFn = fn(&JsValue, &[JsValue], &StateRef, &mut Context) -> JsResult<JsValue>;

/// Build a function object that carries the request state
pub(crate) fn host_fn(
    context: &mut Context,
    state: &StateRef,
    name: &str,
    length: usize,
    body: HostFn,
) -> JsFunction {
    FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(body, state.clone()),
    )
    .name(JsString::from(name))
    .length(length)
    .constructor(false)
    .build()
}

/// Install the request globals into the current realm
pub(crate) fn install(state: &StateRef, request: &Request, context: &mut Context) -> JsResult<()> {
    let require = host_fn(context, state, "require", 1, require_fn);
    let include = host_fn(context, state, "include", 1, include_fn);
    let onexit = host_fn(context, state, "onexit", 1, onexit_fn);
    let exit = host_fn(context, state, "exit", 1, exit_fn);
    let system = system::create_system(state, request, context)?;

    {
        let mut state = state.borrow_mut();
        state.require = Some(require.clone());
        state.include = Some(include.clone());
    }

    let attributes = Attribute::WRITABLE | Attribute::CONFIGURABLE;
    let global = context.global_object();
    context.register_global_property(js_string!("require"), require, attributes)?;
    context.register_global_property(js_string!("include"), include, attributes)?;
    context.register_global_property(js_string!("onexit"), onexit, attributes)?;
    context.register_global_property(js_string!("exit"), exit, attributes)?;
    context.register_global_property(js_string!("system"), system, attributes)?;
    context.register_global_property(js_string!("global"), global, attributes)?;
    Ok(())
}

/// Stop the request with `args[0]` as exit status.
///
/// The error thrown cannot be caught by scripts; the request boundary
/// recognizes it through the termination flag.
pub(crate) fn terminate(state: &StateRef, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let code = match args.first() {
        Some(value) if !value.is_undefined() => value.to_i32(context)?,
        _ => 0,
    };
    state.borrow_mut().terminated = Some(code);
    tracing::debug!("Script requested exit with status {}", code);
    Err(JsNativeError::runtime_limit()
        .with_message("Execution terminated")
        .into())
}

fn module_name(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let name = args.first().cloned().unwrap_or_default();
    if name.is_undefined() {
        return Err(JsNativeError::typ()
            .with_message("Module name must be a string")
            .into());
    }
    Ok(name.to_string(context)?.to_std_string_escaped())
}

fn require_fn(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let name = module_name(args, context)?;
    loader::require(state, &name, context)
}

fn include_fn(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let name = module_name(args, context)?;
    loader::include(state, &name, context)
}

fn onexit_fn(_: &JsValue, args: &[JsValue], state: &StateRef, _: &mut Context) -> JsResult<JsValue> {
    let hook = args
        .first()
        .and_then(JsValue::as_object)
        .and_then(|object| JsFunction::from_object(object.clone()))
        .ok_or_else(|| JsNativeError::typ().with_message("onexit expects a function"))?;
    state.borrow_mut().onexit.push(hook);
    Ok(JsValue::undefined())
}

fn exit_fn(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    terminate(state, args, context)
}
