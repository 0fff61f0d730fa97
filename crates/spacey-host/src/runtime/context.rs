// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-request execution state

use crate::config::Config;
use crate::io::HostIo;
use crate::module_system::{ModuleResolver, NativeLoader, NativeModule, PathStack, ScriptCache};
use crate::runtime::gc::GcNotifier;
use boa_engine::object::builtins::{JsArray, JsFunction};
use boa_engine::realm::Realm;
use boa_engine::{Context, JsObject, JsResult, JsValue, Script, js_string};
use boa_gc::{Finalize, Gc, GcRefCell, Trace};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Guard over the engine's execution lock
pub(crate) type ExecutionGuard = ArcMutexGuard<RawMutex, ()>;

/// Request state shared by the host functions of one context
pub(crate) type StateRef = Gc<GcRefCell<RequestState>>;

/// Process-scoped pieces every context refers to
pub(crate) struct HostShared {
    pub(crate) config: Config,
    pub(crate) resolver: RefCell<ModuleResolver>,
    pub(crate) builtins: RefCell<HashMap<String, Rc<dyn NativeModule>>>,
    pub(crate) cache: Arc<ScriptCache>,
    pub(crate) gc: Arc<GcNotifier>,
    pub(crate) natives: Arc<NativeLoader>,
    pub(crate) io: Rc<dyn HostIo>,
    pub(crate) lock: Arc<Mutex<()>>,
}

/// A compiled script and the cache revision it was compiled from
#[derive(Trace, Finalize)]
pub(crate) struct CompiledScript {
    #[unsafe_ignore_trace]
    pub(crate) revision: u64,
    pub(crate) script: Script,
}

/// An exception value and the innermost file it escaped from
#[derive(Trace, Finalize)]
pub(crate) struct FailureOrigin {
    pub(crate) value: JsValue,
    #[unsafe_ignore_trace]
    pub(crate) file: PathBuf,
    /// Line in `file`, 0 when the engine gave none
    #[unsafe_ignore_trace]
    pub(crate) line: u32,
}

/// Everything one request accumulates while it runs.
///
/// Host functions capture a [`StateRef`] to this; a borrow must never be
/// held across a call back into the engine.
#[derive(Trace, Finalize)]
pub(crate) struct RequestState {
    /// `require` memo: module id to module object
    pub(crate) modules: HashMap<String, JsObject>,
    /// Scripts compiled in this context's realm
    pub(crate) scripts: HashMap<String, CompiledScript>,
    /// `onexit` hooks in registration order
    pub(crate) onexit: Vec<JsFunction>,
    /// Where the last escaping exception came from
    pub(crate) failure: Option<FailureOrigin>,
    /// The context's `require` function, passed to every module
    pub(crate) require: Option<JsFunction>,
    /// The context's `include` function, passed to every module
    pub(crate) include: Option<JsFunction>,
    #[unsafe_ignore_trace]
    pub(crate) paths: PathStack,
    #[unsafe_ignore_trace]
    pub(crate) terminated: Option<i32>,
    #[unsafe_ignore_trace]
    pub(crate) guard: Option<ExecutionGuard>,
    #[unsafe_ignore_trace]
    pub(crate) main_file: Option<PathBuf>,
    #[unsafe_ignore_trace]
    pub(crate) cwd: PathBuf,
    #[unsafe_ignore_trace]
    pub(crate) shared: Rc<HostShared>,
}

impl RequestState {
    pub(crate) fn new(shared: Rc<HostShared>, main_file: Option<PathBuf>, cwd: PathBuf) -> Self {
        Self {
            modules: HashMap::new(),
            scripts: HashMap::new(),
            onexit: Vec::new(),
            failure: None,
            require: None,
            include: None,
            paths: PathStack::new(),
            terminated: None,
            guard: None,
            main_file,
            cwd,
            shared,
        }
    }

    /// Directory relative module names resolve against
    pub(crate) fn current_dir(&self) -> PathBuf {
        self.paths
            .top()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone())
    }

    /// Remember that `value` escaped from `file` at `line`, unless an inner
    /// module already claimed the same value.
    pub(crate) fn record_failure(&mut self, value: &JsValue, file: &Path, line: u32) {
        if let Some(origin) = &self.failure {
            if origin.value.strict_equals(value) {
                return;
            }
        }
        self.failure = Some(FailureOrigin {
            value: value.clone(),
            file: file.to_path_buf(),
            line,
        });
    }

    /// File and line an uncaught `value` should be attributed to.
    ///
    /// Falls back to the main file with an unknown line.
    pub(crate) fn failure_origin(&self, value: Option<&JsValue>) -> (Option<PathBuf>, u32) {
        match (&self.failure, value) {
            (Some(origin), Some(value)) if origin.value.strict_equals(value) => {
                (Some(origin.file.clone()), origin.line)
            }
            _ => (self.main_file.clone(), 0),
        }
    }
}

/// One request's isolated execution environment.
///
/// Created by [`Engine::create_context`](crate::Engine::create_context) and
/// released by [`Engine::delete_context`](crate::Engine::delete_context).
/// Holds the engine's execution lock while alive.
pub struct ExecutionContext {
    pub(crate) state: StateRef,
    pub(crate) realm: Realm,
    pub(crate) previous: Option<Realm>,
    /// Why no main file was found
    pub(crate) missing_main: Option<String>,
}

impl ExecutionContext {
    /// Main file of the request, if one was found
    pub fn main_file(&self) -> Option<PathBuf> {
        self.state.borrow().main_file.clone()
    }

    /// Number of modules currently executing
    pub fn path_depth(&self) -> usize {
        self.state.borrow().paths.depth()
    }

    /// Exit code passed to `exit()`, if the script terminated
    pub fn exit_code(&self) -> Option<i32> {
        self.state.borrow().terminated
    }

    /// Whether `exit()` was called
    pub fn is_terminated(&self) -> bool {
        self.exit_code().is_some()
    }

    /// Registered `onexit` hooks
    pub fn hook_count(&self) -> usize {
        self.state.borrow().onexit.len()
    }

    /// Modules memoized by `require`
    pub fn module_count(&self) -> usize {
        self.state.borrow().modules.len()
    }

    /// The realm scripts of this request run in
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Whether this context still holds the execution lock
    pub fn holds_lock(&self) -> bool {
        self.state.borrow().guard.is_some()
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        // The state may outlive us until the next collection.
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.guard.take();
        }
    }
}

/// Delete every own property of the current global object.
///
/// Non-configurable properties stay; failures are ignored.
pub(crate) fn clear_global(context: &mut Context) -> JsResult<usize> {
    let global = context.global_object();
    let object = context.intrinsics().constructors().object().constructor();
    let names = object.get(js_string!("getOwnPropertyNames"), context)?;
    let Some(names) = names.as_callable().map(|f| f.clone()) else {
        return Ok(0);
    };

    let keys = names.call(&object.clone().into(), &[global.clone().into()], context)?;
    let Some(keys) = keys.as_object().map(|o| o.clone()) else {
        return Ok(0);
    };
    let keys = JsArray::from_object(keys)?;

    let mut deleted = 0;
    for index in 0..keys.length(context)? {
        let key = keys.get(index as i64, context)?.to_string(context)?;
        if global.delete_property_or_throw(key, context).is_ok() {
            deleted += 1;
        }
    }
    Ok(deleted)
}
