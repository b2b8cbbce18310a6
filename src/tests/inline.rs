//! Data-URI inlining and URL rewriting in CSS.

use base64::Engine;

use super::{bundler_with, save, save_with};
use crate::{BundleOptions, CssImport, Severity};

#[test]
fn inline_threshold() {
    let icon = "x".repeat(50);
    let files = [("/page.html", "<img src=\"icon.png\">"), ("/icon.png", icon.as_str())];
    let options = BundleOptions::default().with_inline_limit(100);

    let mut bundler = bundler_with(&files, options);
    let page = bundler.get_module("/page.html".as_ref()).unwrap();
    let icon_module = bundler.get_module("/icon.png".as_ref()).unwrap();
    assert!(bundler.module(page).includes().contains(&icon_module));

    let payload = base64::engine::general_purpose::STANDARD.encode("x".repeat(50));
    assert_eq!(
        bundler.save(page).code,
        format!("<img src=\"data:image/png;base64,{payload}\">")
    );
}

#[test]
fn threshold_respects_size() {
    let icon = "x".repeat(200);
    let files = [("/page.html", "<img src=\"icon.png\">"), ("/icon.png", icon.as_str())];
    let code = save_with(&files, "/page.html", BundleOptions::default().with_inline_limit(100));
    assert_eq!(code, "<img src=\"./icon.png\">");
}

#[test]
fn inline_marker_forces() {
    let code = save(
        &[("/page.html", "<img src=\"icon.png?__inline\">"), ("/icon.png", "png")],
        "/page.html",
    );
    assert!(code.starts_with("<img src=\"data:image/png;base64,"), "{code}");
}

#[test]
fn inline_marker_with_cap() {
    let code = save(
        &[("/page.html", "<img src=\"icon.png?__inline=2\">"), ("/icon.png", "png")],
        "/page.html",
    );
    // three bytes exceed the two-byte cap: plain rewrite, marker stripped
    assert_eq!(code, "<img src=\"./icon.png\">");
}

#[test]
fn postfix_applies_and_suppresses() {
    let mut options = BundleOptions::default();
    options.url.postfix = Some("?v=2".to_string());
    let files = [
        ("/page.html", "<img src=\"a.png\"><img src=\"b.png?__postfix=0\">"),
        ("/a.png", "a"),
        ("/b.png", "b"),
    ];
    let code = save_with(&files, "/page.html", options);
    assert_eq!(code, "<img src=\"./a.png?v=2\"><img src=\"./b.png\">");
}

#[test]
fn skip_marker_leaves_url_alone() {
    let code = save(
        &[("/page.html", "<img src=\"icon.png?__skip\">"), ("/icon.png", "png")],
        "/page.html",
    );
    assert_eq!(code, "<img src=\"icon.png?__skip\">");
}

#[test]
fn css_url_rewrite() {
    let code = save(
        &[("/css/site.css", "a { background: url(../img/logo.png); }"), ("/img/logo.png", "p")],
        "/css/site.css",
    );
    assert_eq!(code, "a { background: url(../img/logo.png); }");

    let code = save(
        &[("/site.css", "a { background: url(\"img/logo.png\"); }"), ("/img/logo.png", "p")],
        "/site.css",
    );
    assert_eq!(code, "a { background: url(\"./img/logo.png\"); }");
}

#[test]
fn css_import_inline_merges() {
    let files = [
        ("/site.css", "@import url(base.css);\nbody { color: red; }"),
        ("/base.css", "* { margin: 0; }"),
    ];
    let code = save(&files, "/site.css");
    assert_eq!(code, "* { margin: 0; }\n\nbody { color: red; }");
}

#[test]
fn css_import_url_rewrites() {
    let mut options = BundleOptions::default();
    options.css.import = CssImport::Url;
    let files = [
        ("/css/site.css", "@import \"../base.css\";"),
        ("/base.css", "* { margin: 0; }"),
    ];
    let code = save_with(&files, "/css/site.css", options);
    assert_eq!(code, "@import \"../base.css\";");
}

#[test]
fn css_import_none_is_left_alone() {
    let mut options = BundleOptions::default();
    options.css.import = CssImport::None;
    let files = [("/site.css", "@import url(missing.css);")];
    let mut bundler = bundler_with(&files, options);
    let site = bundler.get_module("/site.css".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    assert_eq!(bundler.save(site).code, "@import url(missing.css);");
}

#[test]
fn non_local_import_warns() {
    let files = [("/site.css", "@import url(http://cdn.example.com/x.css);")];
    let mut bundler = bundler_with(&files, BundleOptions::default());
    let site = bundler.get_module("/site.css".as_ref()).unwrap();
    assert_eq!(bundler.diagnostics().len(), 1);
    assert_eq!(bundler.diagnostics()[0].severity, Severity::Warning);
    // the statement stays
    assert_eq!(bundler.save(site).code, "@import url(http://cdn.example.com/x.css);");
}

#[test]
fn network_url_in_inline_position_is_skipped_silently() {
    let files = [("/page.html", "<img src=\"https://cdn.example.com/a.png\">")];
    let mut bundler = bundler_with(&files, BundleOptions::default());
    let page = bundler.get_module("/page.html".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    assert_eq!(bundler.save(page).code, "<img src=\"https://cdn.example.com/a.png\">");
}

#[test]
fn extract_css_redirects_style_requires() {
    let files = [
        ("/app.js", "// #extract-css\nvar css = require(\"./style.css\");\nrequire(\"./b\");"),
        ("/style.css", "body { color: red; }"),
        ("/b.js", "module.exports = 1;"),
    ];
    let mut bundler = bundler_with(&files, BundleOptions::default());
    let app = bundler.get_module("/app.js".as_ref()).unwrap();
    let bundle = bundler.save(app);

    // the stylesheet is not part of the JS bundle
    assert!(!bundle.code.contains("insertStyle"), "{}", bundle.code);
    assert!(bundle.code.contains("var css = ;"), "{}", bundle.code);
    // it lands in the sibling css bundle instead
    let css = bundle.css.expect("extract-css sibling");
    assert!(css.code.contains("body { color: red; }"), "{}", css.code);
}

#[test]
fn css_required_into_js_uses_insert_style() {
    let files = [
        ("/app.js", "require(\"./style.css\");"),
        ("/style.css", "body { color: red; }"),
    ];
    let code = save(&files, "/app.js");
    assert!(
        code.contains(
            "module.exports = __tpack__.insertStyle(\"body { color: red; }\");"
        ),
        "{code}"
    );
}
