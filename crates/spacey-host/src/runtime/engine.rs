// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The per-worker engine and the request lifecycle

use crate::config::Config;
use crate::error::{HostError, Result};
use crate::globals;
use crate::io::{HostIo, StdIo};
use crate::module_system::loader::{self, is_runtime_limit};
use crate::module_system::{ModuleResolver, NativeLoader, NativeModule, ScriptCache};
use crate::request::Request;
use crate::runtime::context::{ExecutionContext, HostShared, RequestState, clear_global};
use crate::runtime::diagnostics::{Diagnostic, ScriptFailure};
use crate::runtime::gc::GcNotifier;
use crate::runtime::jobs::RequestJobs;
use boa_engine::{Context, JsError, JsResult, JsValue, Source};
use boa_gc::{Gc, GcRefCell};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// A long-lived script engine serving one request at a time.
///
/// Each request runs in a fresh realm of the same engine, so nothing a
/// script defines survives into the next request. Module sources, opened
/// native libraries and collector pacing are shared across requests.
pub struct Engine {
    context: Context,
    jobs: Rc<RequestJobs>,
    shared: Rc<HostShared>,
}

impl Engine {
    /// Create an engine writing to the process streams
    pub fn new(config: Config) -> Result<Self> {
        Self::with_io(config, StdIo)
    }

    /// Create an engine using `io` for script input, output and errors
    pub fn with_io(config: Config, io: impl HostIo + 'static) -> Result<Self> {
        let shared = HostShared {
            resolver: RefCell::new(ModuleResolver::new(&config)),
            builtins: RefCell::new(HashMap::new()),
            cache: Arc::new(ScriptCache::new()),
            gc: Arc::new(GcNotifier::new(&config.gc)),
            natives: Arc::new(NativeLoader::new()),
            io: Rc::new(io),
            lock: Arc::new(Mutex::new(())),
            config,
        };

        let jobs = Rc::new(RequestJobs::new());
        let context = Context::builder()
            .job_executor(jobs.clone())
            .build()
            .map_err(|err| HostError::Runtime(err.to_string()))?;

        Ok(Self {
            context,
            jobs,
            shared: Rc::new(shared),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Cache of prepared module sources
    pub fn script_cache(&self) -> &Arc<ScriptCache> {
        &self.shared.cache
    }

    /// Collector pacing state
    pub fn gc(&self) -> &Arc<GcNotifier> {
        &self.shared.gc
    }

    /// Shared objects opened so far
    pub fn native_loader(&self) -> &Arc<NativeLoader> {
        &self.shared.natives
    }

    /// Lock held for the whole of each request.
    ///
    /// Released only while a script sleeps.
    pub fn execution_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.shared.lock)
    }

    /// Promise jobs queued by the running request
    pub fn pending_jobs(&self) -> usize {
        self.jobs.pending()
    }

    /// The underlying engine context
    pub fn js_context(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Make `require(name)` return the exports built by `module`
    pub fn register_native(&mut self, name: impl Into<String>, module: impl NativeModule + 'static) {
        let name = name.into();
        tracing::debug!("Registering native module '{}'", name);
        self.shared.resolver.borrow_mut().add_builtin(name.clone());
        self.shared
            .builtins
            .borrow_mut()
            .insert(name, Rc::new(module));
    }

    /// Serve one request and return its exit status.
    ///
    /// 0 on success, the `exit()` code on termination, 1 when an exception
    /// escapes or no main file can be found. Exit hooks always run.
    pub fn execute(&mut self, request: &Request) -> i32 {
        let context = match self.create_context(request) {
            Ok(context) => context,
            Err(err) => {
                self.report(&Diagnostic::from_host_error(&err, None));
                return 1;
            }
        };

        let status = match self.run_main(&context) {
            Ok(()) => 0,
            Err(failure) => {
                if let ScriptFailure::Script(diagnostic) = &failure {
                    self.report(diagnostic);
                }
                failure.status()
            }
        };

        self.run_exit_hooks(&context);
        self.delete_context(context);
        self.shared.gc.after_request();

        tracing::debug!("Request finished with status {}", status);
        status
    }

    /// Enter a fresh realm and install the request globals.
    ///
    /// Blocks until the execution lock is free; the returned context holds
    /// it until [`delete_context`](Self::delete_context).
    pub fn create_context(&mut self, request: &Request) -> Result<ExecutionContext> {
        let guard = self.shared.lock.lock_arc();
        let cwd = std::env::current_dir()?;

        let (main_file, missing_main) = match request.find_main(&cwd) {
            Ok(path) => (Some(path), None),
            Err(err) => (None, Some(err.to_string())),
        };

        let realm = self
            .context
            .create_realm()
            .map_err(|err| HostError::Runtime(err.to_string()))?;
        let previous = self.context.enter_realm(realm.clone());

        let mut state = RequestState::new(Rc::clone(&self.shared), main_file, cwd);
        state.guard = Some(guard);
        let context = ExecutionContext {
            state: Gc::new(GcRefCell::new(state)),
            realm,
            previous: Some(previous),
            missing_main,
        };

        if let Err(err) = globals::install(&context.state, request, &mut self.context) {
            let err = HostError::Runtime(err.to_string());
            self.delete_context(context);
            return Err(err);
        }

        tracing::debug!(
            "Created context for {}",
            context
                .main_file()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<no main file>".to_string())
        );
        Ok(context)
    }

    /// Run the autoload list, then the main file, then pending jobs
    pub fn run_main(&mut self, context: &ExecutionContext) -> std::result::Result<(), ScriptFailure> {
        let Some(main) = context.main_file() else {
            let message = context
                .missing_main
                .clone()
                .unwrap_or_else(|| HostError::MainNotFound(None).to_string());
            return Err(ScriptFailure::Script(Diagnostic {
                message,
                file: String::new(),
                line: 0,
                stack: None,
            }));
        };

        let result = self.load_all(context, &main);
        result.map_err(|err| self.failure(context, err))
    }

    fn load_all(&mut self, context: &ExecutionContext, main: &std::path::Path) -> JsResult<()> {
        for name in self.shared.config.library_autoload.clone() {
            tracing::debug!("Autoloading '{}'", name);
            loader::require(&context.state, &name, &mut self.context)?;
        }
        loader::run_main(&context.state, main, &mut self.context)?;
        self.context.run_jobs()
    }

    /// Classify an error that escaped the main file
    fn failure(&mut self, context: &ExecutionContext, err: JsError) -> ScriptFailure {
        if let Some(code) = context.exit_code() {
            return ScriptFailure::Termination { code };
        }

        let (err, file, line) = if is_runtime_limit(&err) {
            (err, context.main_file(), 0)
        } else {
            let value = err.to_opaque(&mut self.context);
            let (file, line) = context.state.borrow().failure_origin(Some(&value));
            (JsError::from_opaque(value), file, line)
        };

        let file = file.unwrap_or_default();
        let mut diagnostic = Diagnostic::from_error(&err, &mut self.context, &file);
        if diagnostic.line == 0 {
            diagnostic.line = line;
        }
        ScriptFailure::Script(diagnostic)
    }

    /// Run `onexit` hooks in registration order.
    ///
    /// A failing hook is reported and the rest still run. Returns the
    /// number of hooks that failed.
    pub fn run_exit_hooks(&mut self, context: &ExecutionContext) -> usize {
        let hooks = std::mem::take(&mut context.state.borrow_mut().onexit);
        let mut failed = 0;

        for hook in hooks {
            let Err(err) = hook.call(&JsValue::undefined(), &[], &mut self.context) else {
                continue;
            };
            if is_runtime_limit(&err) && context.is_terminated() {
                tracing::debug!("Exit hook called exit()");
                continue;
            }

            failed += 1;
            let file = context.main_file().unwrap_or_default();
            let diagnostic = Diagnostic::from_error(&err, &mut self.context, &file);
            tracing::warn!("Exit hook failed: {}", diagnostic.message);
            self.report(&diagnostic);
        }
        failed
    }

    /// Tear the request down: clear its globals, return to the previous
    /// realm, drop request state and release the execution lock.
    pub fn delete_context(&mut self, mut context: ExecutionContext) {
        let depth = context.path_depth();
        if depth != 0 {
            tracing::warn!("Module path stack not empty at teardown (depth {})", depth);
        }

        let dropped = self.jobs.clear();
        if dropped != 0 {
            tracing::debug!("Dropped {} queued jobs of the finished request", dropped);
        }

        match clear_global(&mut self.context) {
            Ok(deleted) => tracing::trace!("Cleared {} global properties", deleted),
            Err(err) => tracing::debug!("Could not clear globals: {}", err),
        }

        if let Some(previous) = context.previous.take() {
            self.context.enter_realm(previous);
        }

        let guard = {
            let mut state = context.state.borrow_mut();
            state.modules.clear();
            state.scripts.clear();
            state.onexit.clear();
            state.failure = None;
            state.require = None;
            state.include = None;
            state.paths.clear();
            state.guard.take()
        };
        drop(guard);
        tracing::debug!("Deleted context");
    }

    /// Evaluate `code` in a live request context
    pub fn eval(&mut self, context: &ExecutionContext, code: &str) -> JsResult<JsValue> {
        debug_assert!(context.previous.is_some(), "context already deleted");
        self.context.eval(Source::from_bytes(code))
    }

    fn report(&self, diagnostic: &Diagnostic) {
        tracing::debug!("Uncaught error: {}", diagnostic);
        self.shared
            .io
            .error(&diagnostic.to_string(), &diagnostic.file, diagnostic.line);
    }
}
