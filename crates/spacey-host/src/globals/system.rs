// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `system` global
//!
//! | Member | Behavior |
//! |---|---|
//! | `stdin([count])`, `stdin.read([count])` | `ArrayBuffer` of up to `count` bytes, all input when 0 |
//! | `stdin.readLine([max])` | One line including the newline, at most `max` (65535) bytes |
//! | `stdout(data)`, `stdout.write(data)`, `stdout.flush()` | Response output |
//! | `stderr(data)`, `stderr.write(data)`, `stderr.flush()` | Diagnostic output |
//! | `getcwd()`, `getpid()`, `getTimeInMicroseconds()` | Process information |
//! | `sleep(seconds)`, `usleep(microseconds)` | Block without holding the execution lock |
//! | `env`, `args` | Request environment and `[mainfile, ...args]` |
//! | `exit([code])` | Same as the `exit` global |
//! | `gc.external(bytes)`, `gc.stats()` | External memory accounting |

use super::{HostFn, host_fn, terminate};
use crate::io::{self, HostIo};
use crate::request::Request;
use crate::runtime::context::StateRef;
use boa_engine::object::{IntegrityLevel, ObjectInitializer};
use boa_engine::object::builtins::{AlignedVec, JsArray, JsArrayBuffer, JsFunction};
use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue, js_string};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Longest line `stdin.readLine` returns when no limit is given
pub const DEFAULT_LINE_LIMIT: usize = 65535;

/// Build the `system` object for one request
pub(crate) fn create_system(state: &StateRef, request: &Request, context: &mut Context) -> JsResult<JsObject> {
    let stdin = stream(context, state, "stdin", stdin_read, &[("read", 1, stdin_read), ("readLine", 1, stdin_read_line)])?;
    let stdout = stream(context, state, "stdout", stdout_write, &[("write", 1, stdout_write), ("flush", 0, stdout_flush)])?;
    let stderr = stream(context, state, "stderr", stderr_write, &[("write", 1, stderr_write), ("flush", 0, stderr_flush)])?;

    let getcwd = host_fn(context, state, "getcwd", 0, getcwd);
    let getpid = host_fn(context, state, "getpid", 0, getpid);
    let sleep = host_fn(context, state, "sleep", 1, sleep);
    let usleep = host_fn(context, state, "usleep", 1, usleep);
    let time = host_fn(context, state, "getTimeInMicroseconds", 0, time_in_microseconds);
    let exit = host_fn(context, state, "exit", 1, exit);

    let external = host_fn(context, state, "external", 1, gc_external);
    let stats = host_fn(context, state, "stats", 0, gc_stats);
    let gc = ObjectInitializer::new(context)
        .property(js_string!("external"), external, Attribute::all())
        .property(js_string!("stats"), stats, Attribute::all())
        .build();

    let env = create_env(request, context)?;
    let args = create_args(state, request, context);

    let attributes = Attribute::WRITABLE | Attribute::ENUMERABLE | Attribute::CONFIGURABLE;
    Ok(ObjectInitializer::new(context)
        .property(js_string!("stdin"), stdin, attributes)
        .property(js_string!("stdout"), stdout, attributes)
        .property(js_string!("stderr"), stderr, attributes)
        .property(js_string!("getcwd"), getcwd, attributes)
        .property(js_string!("getpid"), getpid, attributes)
        .property(js_string!("sleep"), sleep, attributes)
        .property(js_string!("usleep"), usleep, attributes)
        .property(js_string!("getTimeInMicroseconds"), time, attributes)
        .property(js_string!("exit"), exit, attributes)
        .property(js_string!("gc"), gc, attributes)
        .property(js_string!("env"), env, attributes)
        .property(js_string!("args"), args, attributes)
        .build())
}

/// A callable stream object with extra methods
fn stream(
    context: &mut Context,
    state: &StateRef,
    name: &str,
    call: HostFn,
    methods: &[(&str, usize, HostFn)],
) -> JsResult<JsFunction> {
    let function = host_fn(context, state, name, 1, call);
    for (method, length, body) in methods {
        let method_fn = host_fn(context, state, method, *length, *body);
        function.set(JsString::from(*method), method_fn, false, context)?;
    }
    Ok(function)
}

/// Request environment as a frozen object
fn create_env(request: &Request, context: &mut Context) -> JsResult<JsObject> {
    let mut env = ObjectInitializer::new(context);
    for (name, value) in request.env() {
        env.property(
            JsString::from(name.as_str()),
            JsString::from(value.as_str()),
            Attribute::ENUMERABLE,
        );
    }
    let env = env.build();
    env.set_integrity_level(IntegrityLevel::Frozen, context)?;
    Ok(env)
}

fn create_args(state: &StateRef, request: &Request, context: &mut Context) -> JsArray {
    let main = state
        .borrow()
        .main_file
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let values = std::iter::once(main)
        .chain(request.args().iter().cloned())
        .map(|arg| JsValue::from(JsString::from(arg.as_str())));
    JsArray::from_iter(values, context)
}

fn host_io(state: &StateRef) -> Rc<dyn HostIo> {
    state.borrow().shared.io.clone()
}

fn io_error(err: std::io::Error) -> JsError {
    JsNativeError::error()
        .with_message(format!("I/O error: {}", err))
        .into()
}

/// Non-negative integer argument, 0 when absent or not a positive number
fn count_arg(value: Option<&JsValue>, context: &mut Context) -> JsResult<usize> {
    let Some(value) = value.filter(|v| !v.is_undefined()) else {
        return Ok(0);
    };
    let n = value.to_number(context)?;
    Ok(if n.is_finite() && n >= 1.0 { n as usize } else { 0 })
}

/// Bytes of a string or `ArrayBuffer` argument
fn bytes_arg(value: Option<&JsValue>, context: &mut Context) -> JsResult<Vec<u8>> {
    let value = value.cloned().unwrap_or_default();
    if let Some(object) = value.as_object() {
        if let Ok(buffer) = JsArrayBuffer::from_object(object.clone()) {
            return Ok(buffer.data().map(|data| data.to_vec()).unwrap_or_default());
        }
    }
    Ok(value.to_string(context)?.to_std_string_escaped().into_bytes())
}

fn stdin_read(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let count = count_arg(args.first(), context)?;
    let host = host_io(state);
    let data = if count == 0 {
        io::read_all(&*host)
    } else {
        io::read_exact_or_eof(&*host, count)
    }
    .map_err(io_error)?;

    let gc = state.borrow().shared.gc.clone();
    gc.allocated(data.len());
    Ok(JsArrayBuffer::from_byte_block(AlignedVec::from_slice(0, &data), context)?.into())
}

fn stdin_read_line(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let max = match count_arg(args.first(), context)? {
        0 => DEFAULT_LINE_LIMIT,
        max => max,
    };
    let line = host_io(state)
        .read_line(max)
        .map_err(io_error)?
        .ok_or_else(|| JsNativeError::error().with_message("Cannot read enough bytes"))?;
    Ok(JsString::from(String::from_utf8_lossy(&line).as_ref()).into())
}

fn stdout_write(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let data = bytes_arg(args.first(), context)?;
    let written = host_io(state).write(&data).map_err(io_error)?;
    Ok(JsValue::from(written as f64))
}

fn stdout_flush(this: &JsValue, _: &[JsValue], state: &StateRef, _: &mut Context) -> JsResult<JsValue> {
    host_io(state).flush().map_err(io_error)?;
    Ok(this.clone())
}

fn stderr_write(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let data = bytes_arg(args.first(), context)?;
    let written = host_io(state).write_err(&data).map_err(io_error)?;
    Ok(JsValue::from(written as f64))
}

fn stderr_flush(this: &JsValue, _: &[JsValue], state: &StateRef, _: &mut Context) -> JsResult<JsValue> {
    host_io(state).flush_err().map_err(io_error)?;
    Ok(this.clone())
}

fn getcwd(_: &JsValue, _: &[JsValue], _: &StateRef, _: &mut Context) -> JsResult<JsValue> {
    let cwd = std::env::current_dir().map_err(io_error)?;
    Ok(JsString::from(cwd.display().to_string().as_str()).into())
}

fn getpid(_: &JsValue, _: &[JsValue], _: &StateRef, _: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::from(std::process::id()))
}

fn sleep(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let seconds = args.first().cloned().unwrap_or_default().to_number(context)?;
    pause(state, Duration::try_from_secs_f64(seconds).unwrap_or_default());
    Ok(JsValue::undefined())
}

fn usleep(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let micros = args.first().cloned().unwrap_or_default().to_number(context)?;
    pause(state, Duration::try_from_secs_f64(micros / 1_000_000.0).unwrap_or_default());
    Ok(JsValue::undefined())
}

/// Sleep with the execution lock released
fn pause(state: &StateRef, duration: Duration) {
    let (guard, lock) = {
        let mut state = state.borrow_mut();
        (state.guard.take(), state.shared.lock.clone())
    };
    let held = guard.is_some();
    drop(guard);

    std::thread::sleep(duration);

    if held {
        let guard = lock.lock_arc();
        state.borrow_mut().guard = Some(guard);
    }
}

fn time_in_microseconds(_: &JsValue, _: &[JsValue], _: &StateRef, _: &mut Context) -> JsResult<JsValue> {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as f64)
        .unwrap_or(0.0);
    Ok(JsValue::from(micros))
}

fn exit(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    terminate(state, args, context)
}

fn gc_external(_: &JsValue, args: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let bytes = args.first().cloned().unwrap_or_default().to_number(context)?;
    let gc = state.borrow().shared.gc.clone();
    if bytes >= 1.0 {
        gc.allocated(bytes as usize);
    } else if bytes <= -1.0 {
        gc.released((-bytes) as usize);
    }
    Ok(JsValue::undefined())
}

fn gc_stats(_: &JsValue, _: &[JsValue], state: &StateRef, context: &mut Context) -> JsResult<JsValue> {
    let stats = state.borrow().shared.gc.stats();
    let object = ObjectInitializer::new(context)
        .property(js_string!("pendingBytes"), stats.pending_bytes as f64, Attribute::all())
        .property(js_string!("totalExternalBytes"), stats.total_external_bytes as f64, Attribute::all())
        .property(js_string!("requests"), stats.requests as f64, Attribute::all())
        .property(js_string!("collections"), stats.collections as f64, Attribute::all())
        .build();
    Ok(object.into())
}
