//! JavaScript scanner.
//!
//! A single ordered regex sweep: strings and regex literals are skipped,
//! comments route to the directive parser, `require("...")` calls resolve
//! and rewrite, and a handful of CommonJS globals pull in prepend shims.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::{
    file_system::FileSystem,
    kind::ModuleKind,
    options::Target,
    path::PathUtil,
    preprocessor::Preprocessor,
    replacement::{DeferredUrl, ReplacementData, ReplacementStore, UrlEncoder},
    resolver::Usage,
    strings::{decode_string, encode_string},
    Bundler, ModuleId,
};

static JS_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?s)"#,
        // strings are opaque
        r#""(?:[^"\\\r\n]|\\.)*""#,
        "|",
        r#"'(?:[^'\\\r\n]|\\.)*'"#,
        "|",
        // comments carry directives
        r#"(?P<mlc>/\*.*?\*/)"#,
        "|",
        r#"(?P<slc>//[^\r\n]*)"#,
        "|",
        // regex literals are opaque; the leading context char keeps division
        // expressions out
        r#"(?:^|[=(,:?!&|;{}\[\r\n])\s*/(?:[^/\\\r\n\[]|\\.|\[(?:[^\]\\\r\n]|\\.)*\])+/[a-zA-Z]*"#,
        "|",
        // require("...") in non-member position
        r#"(?:^|[^.$\w])(?P<call>require\s*\(\s*(?P<rq>"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')\s*\))"#,
        "|",
        // CommonJS globals, each handled once per file
        r#"(?:^|[^.$\w])(?P<kw>require|exports|module|process|global|Buffer|setImmediate|clearImmediate|__dirname|__filename)\b"#,
    ))
    .unwrap()
});

pub(crate) fn parse<Fs: FileSystem>(bundler: &mut Bundler<Fs>, id: ModuleId) {
    let Some(content) = bundler.modules[id.index()].content.text_arc() else {
        return;
    };
    let mut store = ReplacementStore::new(content.len());
    let mut pp = Preprocessor::default();
    let mut seen_keywords: FxHashSet<&'static str> = FxHashSet::default();

    for caps in JS_TOKEN.captures_iter(&content) {
        if let Some(comment) = caps.name("mlc") {
            let text = &content[comment.start() + 2..comment.end() - 2];
            if bundler.parse_comment_directives(
                id,
                &mut store,
                &mut pp,
                comment.start(),
                comment.end(),
                text,
                comment.start() + 2,
            ) {
                store.replace(comment.start(), comment.end(), ReplacementData::Literal(String::new()));
            }
        } else if let Some(comment) = caps.name("slc") {
            let text = &content[comment.start() + 2..comment.end()];
            if bundler.parse_comment_directives(
                id,
                &mut store,
                &mut pp,
                comment.start(),
                comment.end(),
                text,
                comment.start() + 2,
            ) {
                store.replace(comment.start(), comment.end(), ReplacementData::Literal(String::new()));
            }
        } else if let Some(call) = caps.name("call") {
            let literal = caps.name("rq").expect("require call always captures its argument");
            handle_require(bundler, id, &mut store, call.range(), literal.range(), &content);
        } else if let Some(keyword) = caps.name("kw") {
            handle_keyword(bundler, id, &mut store, &mut seen_keywords, keyword.range(), &content);
        }
    }

    pp.finish(bundler, id, content.len());
    bundler.parse_macros(id, &mut store, &content);
    bundler.modules[id.index()].replacements = store.into_entries();
}

fn handle_require<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    call: std::ops::Range<usize>,
    literal: std::ops::Range<usize>,
    content: &str,
) {
    if !store.accepts(call.start, call.end) {
        return;
    }
    let raw = &content[literal.clone()];
    let quote = if raw.starts_with('\'') { '\'' } else { '"' };
    let url = decode_string(raw);

    // a require() call makes this a CommonJS module
    bundler.modules[id.index()].commonjs = true;

    let Some(mut result) = bundler.resolve_url(id, literal.start, &url, Usage::Require) else {
        return;
    };
    if result.resolve_query("__skip").is_present() {
        return;
    }
    result.resolve_query("__inline");
    let postfix = !matches!(
        result.resolve_query("__postfix"),
        crate::strings::QueryValue::Bytes(0)
    );

    // CSS requires feed the extracted stylesheet instead of the JS bundle
    if bundler.modules[result.module.index()].kind == ModuleKind::Css {
        if let Some(extracted) = bundler.modules[id.index()].extract_css {
            bundler.add_require(extracted, result.module);
            bundler.ensure_loaded(result.module);
            store.replace(call.start, call.end, ReplacementData::Literal(String::new()));
            return;
        }
    }

    bundler.add_require(id, result.module);
    bundler.ensure_loaded(result.module);
    store.replace(
        literal.start,
        literal.end,
        ReplacementData::Deferred(DeferredUrl {
            module: result.module,
            query: result.query,
            hash: result.hash,
            alias: result.alias,
            postfix,
            inline: false,
            owner: id,
            encoder: UrlEncoder::Quoted { quote },
        }),
    );
}

fn handle_keyword<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    seen: &mut FxHashSet<&'static str>,
    span: std::ops::Range<usize>,
    content: &str,
) {
    if !store.accepts(span.start, span.end) {
        return;
    }
    let keyword = &content[span.clone()];
    let Some(keyword) = KEYWORDS.iter().copied().find(|k| *k == keyword) else {
        return;
    };
    if !seen.insert(keyword) {
        return;
    }

    match keyword {
        "require" | "exports" | "module" => {
            bundler.modules[id.index()].commonjs = true;
        }
        "global" => {
            store.insert(
                0,
                ReplacementData::Literal(
                    "var global = (function () { return this; })();\n".to_string(),
                ),
            );
        }
        "__dirname" => {
            let dir = bundler.modules[id.index()]
                .path
                .parent()
                .map(|p| p.to_slash())
                .unwrap_or_default();
            store.insert(
                0,
                ReplacementData::Literal(format!(
                    "var __dirname = {};\n",
                    encode_string(&dir, '"')
                )),
            );
        }
        "__filename" => {
            let file = bundler.modules[id.index()].path.to_slash();
            store.insert(
                0,
                ReplacementData::Literal(format!(
                    "var __filename = {};\n",
                    encode_string(&file, '"')
                )),
            );
        }
        _ => {
            // process, Buffer, setImmediate, clearImmediate: pull in the
            // native shim and prepend the binding
            let (specifier, member) = match keyword {
                "process" => ("process", None),
                "Buffer" => ("buffer", Some(".Buffer")),
                "setImmediate" => ("timers", Some(".setImmediate")),
                _ => ("timers", Some(".clearImmediate")),
            };
            let module = &bundler.modules[id.index()];
            if module.target() == Target::NodeJs || !module.options.resolve.native {
                return;
            }
            let Some(result) = bundler.resolve_url(id, span.start, specifier, Usage::Require)
            else {
                return;
            };
            bundler.modules[id.index()].commonjs = true;
            bundler.add_require(id, result.module);
            bundler.ensure_loaded(result.module);
            store.insert(
                0,
                ReplacementData::Deferred(DeferredUrl {
                    module: result.module,
                    query: String::new(),
                    hash: String::new(),
                    alias: None,
                    postfix: true,
                    inline: false,
                    owner: id,
                    encoder: UrlEncoder::ShimVar {
                        ident: keyword.to_string(),
                        member: member.map(str::to_string),
                    },
                }),
            );
        }
    }
}

static KEYWORDS: &[&str] = &[
    "require",
    "exports",
    "module",
    "process",
    "global",
    "Buffer",
    "setImmediate",
    "clearImmediate",
    "__dirname",
    "__filename",
];

