// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - runs scripts, shared objects and builtins as modules

use crate::error::HostError;
use crate::module_system::resolver::{ModuleKind, ResolvedModule};
use crate::runtime::context::{CompiledScript, StateRef};
use crate::runtime::diagnostics::extract_line;
use boa_engine::error::JsNativeErrorKind;
use boa_engine::object::builtins::JsFunction;
use boa_engine::{Context, JsError, JsObject, JsResult, JsString, JsValue, Script, Source, js_string};
use std::path::Path;

/// `require(name)`: load once per context, return `module.exports`
pub(crate) fn require(state: &StateRef, name: &str, context: &mut Context) -> JsResult<JsValue> {
    let resolved = resolve(state, name)?;
    let id = resolved.id();

    let memoized = state.borrow().modules.get(&id).cloned();
    if let Some(module) = memoized {
        return module.get(js_string!("exports"), context);
    }

    let module = new_module(&resolved, context)?;
    // Registered before running so cycles see the partial exports
    state.borrow_mut().modules.insert(id.clone(), module.clone());

    if let Err(err) = load_module(state, &resolved, &module, context) {
        state.borrow_mut().modules.remove(&id);
        return Err(err);
    }
    module.get(js_string!("exports"), context)
}

/// `include(name)`: run again with fresh `exports`, return `module.exports`
pub(crate) fn include(state: &StateRef, name: &str, context: &mut Context) -> JsResult<JsValue> {
    let resolved = resolve(state, name)?;
    let module = new_module(&resolved, context)?;
    load_module(state, &resolved, &module, context)?;
    module.get(js_string!("exports"), context)
}

/// Run the main file as a fresh module.
pub(crate) fn run_main(state: &StateRef, path: &Path, context: &mut Context) -> JsResult<JsValue> {
    let resolved = ResolvedModule {
        path: path.to_path_buf(),
        kind: ModuleKind::Script,
    };
    let module = new_module(&resolved, context)?;
    state
        .borrow_mut()
        .modules
        .insert(resolved.id(), module.clone());
    load_module(state, &resolved, &module, context)?;
    module.get(js_string!("exports"), context)
}

fn resolve(state: &StateRef, name: &str) -> JsResult<ResolvedModule> {
    let state = state.borrow();
    let current_dir = state.current_dir();
    let resolved = state.shared.resolver.borrow().resolve(name, &current_dir)?;
    tracing::trace!("Resolved '{}' to {}", name, resolved.path.display());
    Ok(resolved)
}

fn new_module(resolved: &ResolvedModule, context: &mut Context) -> JsResult<JsObject> {
    let module = JsObject::with_object_proto(context.intrinsics());
    let exports = JsObject::with_object_proto(context.intrinsics());
    let id = JsString::from(resolved.id().as_str());
    module.set(js_string!("exports"), exports, false, context)?;
    module.set(js_string!("id"), id.clone(), false, context)?;
    module.set(js_string!("filename"), id, false, context)?;
    Ok(module)
}

fn load_module(
    state: &StateRef,
    resolved: &ResolvedModule,
    module: &JsObject,
    context: &mut Context,
) -> JsResult<()> {
    let result = match resolved.kind {
        ModuleKind::Script | ModuleKind::PackageIndex => load_js(state, &resolved.path, module, context),
        ModuleKind::Native => load_dso(state, &resolved.path, module, context),
        ModuleKind::Builtin => load_builtin(state, &resolved.path.display().to_string(), module, context),
    };
    result.map_err(|err| track_failure(state, err, &resolved.path, context))
}

/// Run a script module in the current realm
fn load_js(state: &StateRef, path: &Path, module: &JsObject, context: &mut Context) -> JsResult<()> {
    let script = compiled_script(state, path, context)?;

    state.borrow_mut().paths.push_file(path);
    let _frame = scopeguard::guard(state.clone(), |state| {
        state.borrow_mut().paths.pop();
    });

    let function = script.evaluate(context)?;
    let function = function
        .as_object()
        .and_then(|object| JsFunction::from_object(object.clone()))
        .ok_or_else(|| HostError::Runtime(format!("{} did not compile to a module", path.display())))?;

    let (require, include) = {
        let state = state.borrow();
        (state.require.clone(), state.include.clone())
    };
    let exports = module.get(js_string!("exports"), context)?;
    let filename = JsString::from(path.display().to_string().as_str());
    let dirname = JsString::from(
        path.parent()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()
            .as_str(),
    );

    function.call(
        &exports,
        &[
            exports.clone(),
            module.clone().into(),
            require.map(JsValue::from).unwrap_or_default(),
            include.map(JsValue::from).unwrap_or_default(),
            filename.into(),
            dirname.into(),
        ],
        context,
    )?;
    Ok(())
}

/// Compile `path` in this context, reusing the compilation while the cached
/// source keeps its revision
fn compiled_script(state: &StateRef, path: &Path, context: &mut Context) -> JsResult<Script> {
    let shared = state.borrow().shared.clone();
    let cached = shared.cache.get(path)?;
    let key = path.display().to_string();

    if let Some(compiled) = state.borrow().scripts.get(&key) {
        if compiled.revision == cached.revision {
            return Ok(compiled.script.clone());
        }
    }

    let source = Source::from_bytes(cached.source.as_bytes()).with_path(path);
    let script = Script::parse(source, None, context).inspect_err(|err| {
        tracing::debug!("Compile error in {}: {}", path.display(), err);
    })?;

    state.borrow_mut().scripts.insert(
        key,
        CompiledScript {
            revision: cached.revision,
            script: script.clone(),
        },
    );
    Ok(script)
}

/// Bind a shared object's exports
fn load_dso(state: &StateRef, path: &Path, module: &JsObject, context: &mut Context) -> JsResult<()> {
    let init = state.borrow().shared.natives.init_fn(path)?;
    let exports = exports_object(module, context)?;
    let exports = init(&exports, context)?;
    module.set(js_string!("exports"), exports, false, context)?;
    Ok(())
}

/// Bind an in-process native module's exports
fn load_builtin(state: &StateRef, name: &str, module: &JsObject, context: &mut Context) -> JsResult<()> {
    let native = state.borrow().shared.builtins.borrow().get(name).cloned();
    let native = native.ok_or_else(|| HostError::module_not_found(name))?;
    let exports = exports_object(module, context)?;
    let exports = native.register(&exports, context)?;
    module.set(js_string!("exports"), exports, false, context)?;
    Ok(())
}

fn exports_object(module: &JsObject, context: &mut Context) -> JsResult<JsObject> {
    let exports = module.get(js_string!("exports"), context)?;
    Ok(exports
        .as_object()
        .map(|object| object.clone())
        .unwrap_or_else(|| JsObject::with_object_proto(context.intrinsics())))
}

/// Record which file and line `err` escaped from.
///
/// The error is turned into its script value once so the same exception
/// can be recognized again at outer modules and at the request boundary.
/// That drops the engine backtrace, so the line is read from it first.
fn track_failure(state: &StateRef, err: JsError, file: &Path, context: &mut Context) -> JsError {
    if state.borrow().terminated.is_some() || is_runtime_limit(&err) {
        return err;
    }
    let line = extract_line(&err.to_string()).unwrap_or(0);
    let value = err.to_opaque(context);
    state.borrow_mut().record_failure(&value, file, line);
    JsError::from_opaque(value)
}

/// Runtime limit errors have no script object and cannot be caught
pub(crate) fn is_runtime_limit(err: &JsError) -> bool {
    err.as_native()
        .is_some_and(|native| matches!(native.kind, JsNativeErrorKind::RuntimeLimit))
}
