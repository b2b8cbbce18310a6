//! URL resolution: probes, package walk, aliases, shims, hooks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{bundler, bundler_with};
use crate::{BundleOptions, ErrorAction, Severity};

fn resolved_require(files: &[(&str, &str)], entry: &str) -> Vec<PathBuf> {
    let mut bundler = bundler(files);
    let id = bundler.get_module(entry.as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty(), "{:?}", bundler.diagnostics());
    bundler
        .module(id)
        .requires()
        .iter()
        .map(|&dep| bundler.module(dep).path().to_path_buf())
        .collect()
}

#[test]
fn relative_with_extensions() {
    let pass = [
        ("./b", "/b.js"),
        ("./b.js", "/b.js"),
        ("./sub/c", "/sub/c.json"),
        ("/b", "/b.js"),
    ];
    for (specifier, expected) in pass {
        let source = format!("require(\"{specifier}\");");
        let files =
            [("/a.js", source.as_str()), ("/b.js", ""), ("/sub/c.json", "{}")];
        assert_eq!(
            resolved_require(&files, "/a.js"),
            vec![PathBuf::from(expected)],
            "{specifier}"
        );
    }
}

#[test]
fn extension_order_prefers_exact_then_json() {
    // "" probes first, then .json before .js
    let files = [("/a.js", "require(\"./b\");"), ("/b.json", "{}"), ("/b.js", "")];
    assert_eq!(resolved_require(&files, "/a.js"), vec![PathBuf::from("/b.json")]);
}

#[test]
fn package_main_field() {
    let files = [
        ("/app/a.js", "require(\"dep\");"),
        ("/app/node_modules/dep/package.json", r#"{"main": "lib/entry.js"}"#),
        ("/app/node_modules/dep/lib/entry.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/app/a.js"),
        vec![PathBuf::from("/app/node_modules/dep/lib/entry.js")]
    );
}

#[test]
fn browser_field_wins_over_main() {
    let files = [
        ("/a.js", "require(\"dep\");"),
        (
            "/node_modules/dep/package.json",
            r#"{"main": "server.js", "browser": "client.js"}"#,
        ),
        ("/node_modules/dep/server.js", ""),
        ("/node_modules/dep/client.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/a.js"),
        vec![PathBuf::from("/node_modules/dep/client.js")]
    );
}

#[test]
fn package_json_with_comments() {
    let files = [
        ("/a.js", "require(\"dep\");"),
        (
            "/node_modules/dep/package.json",
            "{\n  // entry point\n  \"main\": \"x.js\"\n}",
        ),
        ("/node_modules/dep/x.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/a.js"),
        vec![PathBuf::from("/node_modules/dep/x.js")]
    );
}

#[test]
fn index_fallback() {
    let files = [
        ("/a.js", "require(\"dep\");"),
        ("/node_modules/dep/index.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/a.js"),
        vec![PathBuf::from("/node_modules/dep/index.js")]
    );
}

#[test]
fn walks_up_parent_directories() {
    let files = [
        ("/app/src/deep/a.js", "require(\"dep\");"),
        ("/node_modules/dep/index.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/app/src/deep/a.js"),
        vec![PathBuf::from("/node_modules/dep/index.js")]
    );
}

#[test]
fn web_modules_probe_first() {
    let files = [
        ("/a.js", "require(\"dep\");"),
        ("/web_modules/dep/index.js", ""),
        ("/node_modules/dep/index.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/a.js"),
        vec![PathBuf::from("/web_modules/dep/index.js")]
    );
}

#[test]
fn package_subpath() {
    let files = [
        ("/a.js", "require(\"dep/util\");"),
        ("/node_modules/dep/util.js", ""),
    ];
    assert_eq!(
        resolved_require(&files, "/a.js"),
        vec![PathBuf::from("/node_modules/dep/util.js")]
    );
}

#[test]
fn roots_probe() {
    let mut options = BundleOptions::default();
    options.resolve.root.push(PathBuf::from("/static"));
    let files = [("/a.js", "require(\"widgets\");"), ("/static/widgets.js", "")];
    let mut bundler = bundler_with(&files, options);
    let a = bundler.get_module("/a.js".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    let dep = *bundler.module(a).requires().first().unwrap();
    assert_eq!(bundler.module(dep).path(), Path::new("/static/widgets.js"));
}

#[test]
fn alias_preserves_query() {
    let options = BundleOptions::default().with_alias("~", "src");
    let files = [("/a.js", "require(\"~/x?v=1\")"), ("/src/x.js", "module.exports = 1")];

    let mut bundler = bundler_with(&files, options);
    let a = bundler.get_module("/a.js".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    let dep = *bundler.module(a).requires().first().unwrap();
    assert_eq!(bundler.module(dep).path(), Path::new("/src/x.js"));

    let code = bundler.save(a).code;
    assert!(code.contains("require(\"./src/x.js?v=1\")"), "{code}");
}

#[test]
fn not_found_severity() {
    let mut bundler = bundler(&[("/a.js", "require(\"./missing\");")]);
    bundler.get_module("/a.js".as_ref()).unwrap();
    assert_eq!(bundler.diagnostics().len(), 1);
    assert_eq!(bundler.diagnostics()[0].severity, Severity::Error);
    assert_eq!(bundler.diagnostics()[0].message, "Cannot find module './missing'");
}

#[test]
fn not_found_can_be_ignored() {
    let mut options = BundleOptions::default();
    options.resolve.not_found = ErrorAction::Ignore;
    let mut bundler = bundler_with(&[("/a.js", "require(\"./missing\");")], options);
    bundler.get_module("/a.js".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
}

#[test]
fn commonjs_search_can_be_disabled() {
    let mut options = BundleOptions::default();
    options.resolve.commonjs = false;
    // without CommonJS search the extensionless probe fails
    let mut bundler = bundler_with(&[("/a.js", "require(\"./b\");"), ("/b.js", "")], options);
    bundler.get_module("/a.js".as_ref()).unwrap();
    assert_eq!(bundler.diagnostics().len(), 1);
}

#[test]
fn parse_hook_rewrites_first() {
    let mut options = BundleOptions::default();
    options.hooks.resolve_parse =
        Some(Arc::new(|url: &str| url.strip_prefix("app:").map(|rest| format!("./{rest}"))));
    let files = [("/a.js", "require(\"app:b\");"), ("/b.js", "")];
    let mut bundler = bundler_with(&files, options);
    let a = bundler.get_module("/a.js".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    assert_eq!(bundler.module(a).requires().len(), 1);
}

#[test]
fn skip_hook_aborts_quietly() {
    let mut options = BundleOptions::default();
    options.hooks.resolve_skip = Some(Arc::new(|url: &str| url.ends_with(".gen.js")));
    let files = [("/a.js", "require(\"./x.gen.js\");")];
    let mut bundler = bundler_with(&files, options);
    let a = bundler.get_module("/a.js".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    assert!(bundler.module(a).requires().is_empty());
}

#[test]
fn fallback_hook_is_last() {
    let mut options = BundleOptions::default();
    options.hooks.resolve_fallback =
        Some(Arc::new(|_url: &str| Some(PathBuf::from("/vendor/poly.js"))));
    let files = [("/a.js", "require(\"mystery\");"), ("/vendor/poly.js", "")];
    let mut bundler = bundler_with(&files, options);
    let a = bundler.get_module("/a.js".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    let dep = *bundler.module(a).requires().first().unwrap();
    assert_eq!(bundler.module(dep).path(), Path::new("/vendor/poly.js"));
}

#[test]
fn memoised_modules_are_created_once() {
    let files = [
        ("/a.js", "require(\"./c\");"),
        ("/b.js", "require(\"./c\");"),
        ("/c.js", "module.exports = 1;"),
    ];
    let mut bundler = bundler(&files);
    let a = bundler.get_module("/a.js".as_ref()).unwrap();
    let b = bundler.get_module("/b.js".as_ref()).unwrap();
    let from_a = *bundler.module(a).requires().first().unwrap();
    let from_b = *bundler.module(b).requires().first().unwrap();
    assert_eq!(from_a, from_b);
    assert_eq!(bundler.get_module("/c.js".as_ref()).unwrap(), from_a);
}
