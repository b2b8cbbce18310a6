//! HTML scanning: inline scripts and styles, attributes, srcset, `__skip`.

use std::path::PathBuf;

use super::{bundler, bundler_with, save, save_with};
use crate::{BundleOptions, ModuleKind};

#[test]
fn inline_script_becomes_a_synthetic_module() {
    let mut bundler = bundler(&[("/index.html", "<html><script>var a = 1;</script></html>")]);
    let page = bundler.get_module("/index.html".as_ref()).unwrap();

    assert_eq!(bundler.module(page).includes().len(), 1);
    let synthetic = *bundler.module(page).includes().first().unwrap();
    assert_eq!(bundler.module(synthetic).path(), PathBuf::from("/index.html#inline1.js"));
    assert_eq!(bundler.module(synthetic).kind(), ModuleKind::Js);

    // stitching is byte-transparent when nothing inside needed rewriting
    assert_eq!(bundler.save(page).code, "<html><script>var a = 1;</script></html>");
}

#[test]
fn inline_counter_follows_document_order() {
    let mut bundler = bundler(&[(
        "/index.html",
        "<script>var a = 1;</script><style>b{}</style><script>var c = 3;</script>",
    )]);
    let page = bundler.get_module("/index.html".as_ref()).unwrap();
    let names: Vec<String> = bundler
        .module(page)
        .includes()
        .iter()
        .map(|&id| bundler.module(id).path().display().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "/index.html#inline1.js",
            "/index.html#inline2.css",
            "/index.html#inline3.js"
        ]
    );
}

#[test]
fn inline_style_urls_are_rewritten() {
    let code = save(
        &[
            ("/pages/index.html", "<style>a { background: url(../img/x.png); }</style>"),
            ("/img/x.png", "p"),
        ],
        "/pages/index.html",
    );
    assert_eq!(code, "<style>a { background: url(../img/x.png); }</style>");
}

#[test]
fn script_src_is_rewritten() {
    let code = save(
        &[("/index.html", "<script src=\"js/app.js\"></script>"), ("/js/app.js", "var a = 1;")],
        "/index.html",
    );
    assert_eq!(code, "<script src=\"./js/app.js\"></script>");
}

#[test]
fn script_src_inline_marker_stitches_content() {
    let code = save(
        &[
            ("/index.html", "<script src=\"app.js?__inline\"></script>"),
            ("/app.js", "var x = 1;"),
        ],
        "/index.html",
    );
    assert_eq!(code, "<script>var x = 1;</script>");
}

#[test]
fn non_js_script_bodies_are_left_alone() {
    let source = "<script type=\"text/template\"><div>__raw__</div></script>";
    let mut bundler = bundler(&[("/index.html", source)]);
    let page = bundler.get_module("/index.html".as_ref()).unwrap();
    assert!(bundler.module(page).includes().is_empty());
    assert_eq!(bundler.save(page).code, source);
}

#[test]
fn template_markers_suppress_inline_processing() {
    let source = "<script>var tpl = <%= data %>;</script>";
    let mut bundler = bundler(&[("/index.html", source)]);
    let page = bundler.get_module("/index.html".as_ref()).unwrap();
    assert!(bundler.module(page).includes().is_empty());
    assert_eq!(bundler.save(page).code, source);
}

#[test]
fn link_href_is_rewritten() {
    let code = save(
        &[("/index.html", "<link rel=\"stylesheet\" href=\"style.css\">"), ("/style.css", "a{}")],
        "/index.html",
    );
    assert_eq!(code, "<link rel=\"stylesheet\" href=\"./style.css\">");
}

#[test]
fn srcset_entries_are_rewritten() {
    let mut options = BundleOptions::default();
    options.url.public.insert("/img".to_string(), "https://cdn.example.com/img".to_string());
    let files = [
        ("/index.html", "<img srcset=\"img/a.png 1x, img/b.png 2x\">"),
        ("/img/a.png", "a"),
        ("/img/b.png", "b"),
    ];
    let code = save_with(&files, "/index.html", options);
    assert_eq!(
        code,
        "<img srcset=\"https://cdn.example.com/img/a.png 1x, https://cdn.example.com/img/b.png 2x\">"
    );
}

#[test]
fn skip_attribute_suppresses_the_tag() {
    let mut bundler = bundler(&[("/index.html", "<img __skip src=\"missing.png\">")]);
    let page = bundler.get_module("/index.html".as_ref()).unwrap();
    assert!(bundler.diagnostics().is_empty());
    // the marker itself is stripped
    assert_eq!(bundler.save(page).code, "<img src=\"missing.png\">");
}

#[test]
fn form_action_and_data_attributes() {
    let files = [
        ("/pages/form.html", "<form action=\"submit.html\"></form><object data=\"x.bin\"></object>"),
        ("/pages/submit.html", "<p>ok</p>"),
        ("/pages/x.bin", "bin"),
    ];
    let code = save(&files, "/pages/form.html");
    assert_eq!(
        code,
        "<form action=\"./submit.html\"></form><object data=\"./x.bin\"></object>"
    );
}

#[test]
fn missing_image_warns_but_keeps_markup() {
    let mut bundler = bundler_with(
        &[("/index.html", "<img src=\"gone.png\">")],
        BundleOptions::default(),
    );
    let page = bundler.get_module("/index.html".as_ref()).unwrap();
    assert_eq!(bundler.diagnostics().len(), 1);
    assert_eq!(bundler.diagnostics()[0].severity, crate::Severity::Warning);
    assert_eq!(bundler.save(page).code, "<img src=\"gone.png\">");
}
