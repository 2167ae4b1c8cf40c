// Module loader. `require` resolves dotted names through the searcher list
// (preload table first, then the path templates), caches results by module
// name, and publishes an in-progress marker so circular requires return the
// partially-constructed value instead of recursing.

use super::check_str;
use crate::lib_module;
use crate::runtime::{Control, ErrorKind, Runtime};
use crate::syntax;
use crate::value::{NativeCall, Value};
use tracing::debug;

pub const DEFAULT_PATH: &str = "./?.luma;./?/init.luma";

pub fn register(rt: &Runtime) {
    let registry = rt.state.registry.get();
    if rt.raw_get_field(registry, "path").is_nil() {
        let p = rt.str_value(DEFAULT_PATH);
        rt.raw_set_field(registry, "path", p);
    }
    let loaded = rt.new_table();
    rt.raw_set_field(registry, "loaded", Value::Table(loaded));
    let preload = rt.new_table();
    rt.raw_set_field(registry, "preload", Value::Table(preload));

    let searchers = rt.new_table();
    rt.raw_set_field(registry, "searchers", Value::Table(searchers));
    let preload_searcher = rt.new_native("preload_searcher", searcher_preload);
    rt.raw_set(searchers, Value::Int(1), preload_searcher)
        .expect("int key");
    let path_searcher = rt.new_native("path_searcher", searcher_path);
    rt.raw_set(searchers, Value::Int(2), path_searcher)
        .expect("int key");

    let package = lib_module!("package", {})
        .install(rt)
        .expect("package module table");
    rt.raw_set_field(package, "loaded", Value::Table(loaded));
    rt.raw_set_field(package, "preload", Value::Table(preload));
    rt.raw_set_field(package, "searchers", Value::Table(searchers));
    let path = rt.raw_get_field(registry, "path");
    rt.raw_set_field(package, "path", path);

    let require = rt.new_native("require", lua_require);
    rt.define_global("require", require);
}

fn registry_table(rt: &Runtime, name: &str) -> crate::gc::TableId {
    let registry = rt.state.registry.get();
    rt.raw_get_field(registry, name)
        .as_table_id()
        .expect("registry table set at registration")
}

/// package.path: prefer the script-visible field, fall back to the registry.
fn current_path(rt: &Runtime) -> String {
    if let Some(pkg) = rt.global("package").as_table_id() {
        if let Value::Str(id) = rt.raw_get_field(pkg, "path") {
            return rt.string_text(id);
        }
    }
    let registry = rt.state.registry.get();
    match rt.raw_get_field(registry, "path") {
        Value::Str(id) => rt.string_text(id),
        _ => DEFAULT_PATH.to_string(),
    }
}

fn lua_require(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let name_bytes = check_str(rt, call, 0, "require")?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();
    let loaded = registry_table(rt, "loaded");
    let key = rt.str_value(&name);

    let cached = rt.raw_get(loaded, key);
    if !cached.is_nil() {
        return Ok(vec![cached]);
    }

    // In-progress marker: a circular require observes this value (or
    // whatever the module has published meanwhile).
    rt.raw_set(loaded, key, Value::Bool(true))
        .map_err(|m| rt.error_here(ErrorKind::ModuleError, m.to_string()))?;

    let searchers = registry_table(rt, "searchers");
    let mut failures = Vec::new();
    let mut index = 1;
    loop {
        let searcher = rt.raw_get(searchers, Value::Int(index));
        if searcher.is_nil() {
            break;
        }
        index += 1;
        let results = rt.call_value(searcher, vec![key])?;
        let loader = results.first().copied().unwrap_or(Value::Nil);
        if loader.is_function() {
            let extra = results.get(1).copied().unwrap_or(Value::Nil);
            let loaded_value = match rt.call_value(loader, vec![key, extra]) {
                Ok(values) => values.first().copied().unwrap_or(Value::Nil),
                Err(e) => {
                    // A failed load must not leave a stale marker.
                    let _ = rt.raw_set(loaded, key, Value::Nil);
                    return Err(e);
                }
            };
            let current = rt.raw_get(loaded, key);
            let published = if !loaded_value.is_nil() {
                loaded_value
            } else {
                current
            };
            rt.raw_set(loaded, key, published)
                .map_err(|m| rt.error_here(ErrorKind::ModuleError, m.to_string()))?;
            debug!(module = %name, "module loaded");
            return Ok(vec![published]);
        }
        // A failed searcher reports a message as its first result.
        if let Value::Str(id) = loader {
            failures.push(rt.string_text(id));
        }
    }

    let _ = rt.raw_set(loaded, key, Value::Nil);
    Err(rt.error_here(
        ErrorKind::ModuleError,
        format!("module '{}' not found:{}", name, failures.join("")),
    ))
}

/// Searcher 1: package.preload[name].
fn searcher_preload(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let name = call.arg(0);
    let preload = registry_table(rt, "preload");
    let loader = rt.raw_get(preload, name);
    if loader.is_nil() {
        Ok(vec![rt.str_value("\n\tno field package.preload entry")])
    } else {
        Ok(vec![loader])
    }
}

/// Searcher 2: the path templates. Dots in the module name become path
/// separators; each `?` in a template is replaced with the result.
fn searcher_path(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let name = match call.arg(0) {
        Value::Str(id) => rt.string_text(id),
        other => return Err(super::arg_error(rt, 0, "searcher", "string", other)),
    };
    let relative = name.replace('.', std::path::MAIN_SEPARATOR_STR);
    let mut tried = String::new();
    for template in current_path(rt).split(';') {
        if template.is_empty() {
            continue;
        }
        let candidate = template.replace('?', &relative);
        if std::fs::metadata(&candidate).map(|m| m.is_file()).unwrap_or(false) {
            let loader = rt.new_native("module_loader", module_loader);
            let path_v = rt.str_value(&candidate);
            return Ok(vec![loader, path_v]);
        }
        tried.push_str("\n\tno file '");
        tried.push_str(&candidate);
        tried.push('\'');
    }
    Ok(vec![rt.str_value(&tried)])
}

/// Loader returned by the path searcher: parse and run the file as a chunk;
/// the chunk receives (name, path) as varargs.
fn module_loader(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let path = match call.arg(1) {
        Value::Str(id) => rt.string_text(id),
        other => return Err(super::arg_error(rt, 1, "loader", "string", other)),
    };
    let source = std::fs::read(&path).map_err(|e| {
        rt.error_here(
            ErrorKind::ModuleError,
            format!("cannot read module file '{}': {}", path, e),
        )
    })?;
    let chunk = syntax::parse(&source, &path).map_err(|e| {
        rt.error_here(ErrorKind::SyntaxError, e.to_string())
    })?;
    let args = vec![call.arg(0), call.arg(1)];
    let values = rt.exec_chunk(&chunk, args)?;
    Ok(values)
}
