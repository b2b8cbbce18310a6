//! Browser substitutes for the node builtin modules.
//!
//! When a bare specifier names a node builtin and native shims are enabled,
//! resolution continues with the mapped package specifier instead. On the
//! nodejs target the builtin is left to the host runtime.

/// Sorted by builtin name for binary search.
pub static NATIVE_SHIMS: &[(&str, &str)] = &[
    ("assert", "assert/"),
    ("buffer", "buffer/"),
    ("console", "console-browserify"),
    ("constants", "constants-browserify"),
    ("crypto", "crypto-browserify"),
    ("domain", "domain-browser"),
    ("events", "events/"),
    ("http", "stream-http"),
    ("https", "https-browserify"),
    ("os", "os-browserify/browser.js"),
    ("path", "path-browserify"),
    ("process", "process/browser.js"),
    ("punycode", "punycode/"),
    ("querystring", "querystring-es3/"),
    ("stream", "stream-browserify"),
    ("string_decoder", "string_decoder/"),
    ("sys", "util/util.js"),
    ("timers", "timers-browserify"),
    ("tty", "tty-browserify"),
    ("url", "url/"),
    ("util", "util/util.js"),
    ("vm", "vm-browserify"),
    ("zlib", "browserify-zlib"),
];

/// The shim package specifier for a node builtin, if one exists.
pub fn native_shim(name: &str) -> Option<&'static str> {
    NATIVE_SHIMS
        .binary_search_by_key(&name, |(builtin, _)| builtin)
        .ok()
        .map(|i| NATIVE_SHIMS[i].1)
}

/// All node builtin module names, sorted for binary search. On the nodejs
/// target these are skipped entirely: the host runtime provides them.
pub static NODEJS_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

pub fn is_builtin(name: &str) -> bool {
    let name = name.strip_prefix("node:").unwrap_or(name);
    NODEJS_BUILTINS.binary_search(&name).is_ok()
}
