// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module system tests
//!
//! `require` memoization, `include`, resolution order, cycles and the
//! process-wide source cache.

mod common;

use boa_engine::{Context, JsObject, JsResult, js_string};
use common::Site;

#[test]
fn test_require_returns_same_exports() {
    let site = Site::new();
    site.write("a.js", "exports.n = Math.random();");
    site.write(
        "main.js",
        "var a = require('./a'); var b = require('./a.js'); system.stdout(String(a === b));",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "true");
}

#[test]
fn test_include_runs_every_time() {
    let site = Site::new();
    site.write("counter.js", "global.runs = (global.runs || 0) + 1; exports.run = global.runs;");
    site.write(
        "main.js",
        r#"
        var x = include('./counter');
        var y = include('./counter');
        require('./counter');
        require('./counter');
        system.stdout([x.run, y.run, global.runs, String(x !== y)].join(','));
        "#,
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "1,2,3,true");
}

#[test]
fn test_module_exports_replacement() {
    let site = Site::new();
    site.write("greet.js", "module.exports = function (name) { return 'hi ' + name; };");
    site.write("main.js", "system.stdout(require('./greet')('there'));");

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "hi there");
}

#[test]
fn test_cycle_sees_partial_exports() {
    let site = Site::new();
    site.write(
        "a.js",
        "exports.early = 1; var b = require('./b'); exports.late = 2; exports.fromB = b.sawEarly;",
    );
    site.write("b.js", "var a = require('./a'); exports.sawEarly = a.early; exports.sawLate = a.late;");
    site.write(
        "main.js",
        "var a = require('./a'); system.stdout(a.fromB + ',' + require('./b').sawLate);",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "1,undefined");
}

#[test]
fn test_missing_module_is_catchable() {
    let site = Site::new();
    site.write(
        "main.js",
        "try { require('./nope'); } catch (e) { system.stdout(e.message); }",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "Cannot find module './nope'");
    assert!(site.io.errors().is_empty());
}

#[test]
fn test_failed_require_is_retried() {
    let site = Site::new();
    site.write(
        "flaky.js",
        "if (!global.tried) { global.tried = true; throw new Error('first'); } exports.ok = true;",
    );
    site.write(
        "main.js",
        "try { require('./flaky'); } catch (e) {} system.stdout(String(require('./flaky').ok));",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "true");
}

#[test]
fn test_syntax_error_is_catchable() {
    let site = Site::new();
    site.write("bad.js", "var = ;");
    site.write(
        "main.js",
        "try { require('./bad'); } catch (e) { system.stdout(e.name); }",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "SyntaxError");
}

#[test]
fn test_library_path_lookup() {
    let site = Site::new();
    site.write("lib/util.js", "exports.name = 'util';");
    site.write("lib/pkg/index.js", "exports.name = 'pkg';");
    site.write(
        "main.js",
        "system.stdout(require('util').name + ',' + require('pkg').name);",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "util,pkg");
}

#[test]
fn test_relative_to_requiring_module() {
    let site = Site::new();
    site.write("b.js", "exports.where = 'top';");
    site.write("sub/b.js", "exports.where = 'sub';");
    site.write("sub/a.js", "module.exports = require('./b').where;");
    site.write(
        "main.js",
        "system.stdout(require('./sub/a') + ',' + require('./b').where);",
    );

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "sub,top");
}

#[test]
fn test_filename_and_dirname() {
    let site = Site::new();
    site.write("sub/where.js", "exports.file = __filename; exports.dir = __dirname;");
    site.write(
        "main.js",
        "var w = require('./sub/where'); system.stdout(w.file + '\\n' + w.dir);",
    );

    assert_eq!(site.run("main.js"), 0);
    let expected = format!("{}\n{}", site.canonical("sub/where.js"), site.canonical("sub"));
    assert_eq!(site.io.stdout(), expected);
}

#[test]
fn test_shebang_line_is_ignored() {
    let site = Site::new();
    site.write("main.js", "#!/usr/bin/env spacey-cgi\nsystem.stdout('ok');");

    assert_eq!(site.run("main.js"), 0);
    assert_eq!(site.io.stdout(), "ok");
}

#[test]
fn test_registered_native_module() {
    let site = Site::new();
    site.write("main.js", "system.stdout(String(require('answer').value));");

    let mut engine = site.engine();
    engine.register_native(
        "answer",
        |exports: &JsObject, context: &mut Context| -> JsResult<JsObject> {
            exports.set(js_string!("value"), 42, false, context)?;
            Ok(exports.clone())
        },
    );

    assert_eq!(engine.execute(&site.request("main.js")), 0);
    assert_eq!(site.io.stdout(), "42");
}

#[test]
fn test_source_cache_reused_across_requests() {
    let site = Site::new();
    site.write("dep.js", "exports.v = 'one';");
    site.write("main.js", "system.stdout(require('./dep').v);");

    let mut engine = site.engine();
    assert_eq!(engine.execute(&site.request("main.js")), 0);
    assert_eq!(engine.execute(&site.request("main.js")), 0);
    assert_eq!(site.io.stdout(), "oneone");

    let stats = engine.script_cache().stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.reloads, 0);
    assert_eq!(stats.hits, 2);
}

#[test]
fn test_source_cache_reloads_changed_file() {
    let site = Site::new();
    site.write("dep.js", "exports.v = 'one';");
    site.write("main.js", "system.stdout(require('./dep').v);");

    let mut engine = site.engine();
    assert_eq!(engine.execute(&site.request("main.js")), 0);

    // Different length, so the change is seen even within one mtime tick
    site.write("dep.js", "exports.v = 'three';");
    assert_eq!(engine.execute(&site.request("main.js")), 0);

    assert_eq!(site.io.stdout(), "onethree");
    assert_eq!(engine.script_cache().stats().reloads, 1);
}

#[test]
fn test_unchanged_file_read_once_across_includes() {
    let site = Site::new();
    site.write("part.js", "system.stdout('p');");
    site.write("main.js", "include('./part'); include('./part'); require('./part');");

    let mut engine = site.engine();
    assert_eq!(engine.execute(&site.request("main.js")), 0);
    assert_eq!(engine.execute(&site.request("main.js")), 0);
    assert_eq!(site.io.stdout(), "pppppp");

    let stats = engine.script_cache().stats();
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.reloads, 0);
    assert_eq!(stats.hits, 6);
}
