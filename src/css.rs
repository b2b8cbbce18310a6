//! CSS scanner.
//!
//! Recognises comments (directives), `@import` statements, bare `url(...)`
//! tokens and IE-filter `src=` values in one ordered sweep.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    file_system::FileSystem,
    options::CssImport,
    preprocessor::Preprocessor,
    replacement::{ReplacementData, ReplacementStore, UrlEncoder},
    resolver::Usage,
    strings::decode_string,
    Bundler, ModuleId,
};

static CSS_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?s)"#,
        r#"(?P<comment>/\*.*?\*/)"#,
        "|",
        r#"(?P<import>@import\s+(?:url\(\s*(?P<iurl>"[^"]*"|'[^']*'|[^)]*)\s*\)|(?P<istr>"[^"]*"|'[^']*'))[^;]*;?)"#,
        "|",
        r#"url\(\s*(?P<url>"[^"]*"|'[^']*'|[^)"'\s]+)\s*\)"#,
        "|",
        r#"\bsrc\s*=\s*(?P<src>"[^"]*"|'[^']*'|[^,)\s]+)"#,
    ))
    .unwrap()
});

pub(crate) fn parse<Fs: FileSystem>(bundler: &mut Bundler<Fs>, id: ModuleId) {
    let Some(content) = bundler.modules[id.index()].content.text_arc() else {
        return;
    };
    let mut store = ReplacementStore::new(content.len());
    let mut pp = Preprocessor::default();

    for caps in CSS_TOKEN.captures_iter(&content) {
        if let Some(comment) = caps.name("comment") {
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
                store.replace(
                    comment.start(),
                    comment.end(),
                    ReplacementData::Literal(String::new()),
                );
            }
        } else if let Some(import) = caps.name("import") {
            let token = caps.name("iurl").or_else(|| caps.name("istr"));
            let Some(token) = token else { continue };
            handle_import(bundler, id, &mut store, import.range(), token.range(), &content);
        } else if let Some(token) = caps.name("url") {
            replace_url_token(bundler, id, &mut store, token.range(), &content, Usage::Inline);
        } else if let Some(token) = caps.name("src") {
            replace_url_token(bundler, id, &mut store, token.range(), &content, Usage::Inline);
        }
    }

    pp.finish(bundler, id, content.len());
    bundler.parse_macros(id, &mut store, &content);
    bundler.modules[id.index()].replacements = store.into_entries();
}

fn handle_import<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    statement: std::ops::Range<usize>,
    token: std::ops::Range<usize>,
    content: &str,
) {
    let raw = &content[token.clone()];
    let url = decode_string(raw);

    let disposition = match &bundler.modules[id.index()].options.hooks.css_import {
        Some(hook) => hook(&url),
        None => bundler.modules[id.index()].options.css.import,
    };

    match disposition {
        CssImport::None => {}
        CssImport::Url => {
            replace_url_token(bundler, id, store, token, content, Usage::Local);
        }
        CssImport::Inline => {
            if !store.accepts(statement.start, statement.end) {
                return;
            }
            let Some(result) = bundler.resolve_url(id, token.start, &url, Usage::Local) else {
                return;
            };
            bundler.add_require(id, result.module);
            bundler.ensure_loaded(result.module);
            store.replace(
                statement.start,
                statement.end,
                ReplacementData::Literal(String::new()),
            );
        }
    }
}

/// Rewrite one quoted-or-bare URL token in place.
fn replace_url_token<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    token: std::ops::Range<usize>,
    content: &str,
    usage: Usage,
) {
    let raw = &content[token.clone()];
    let (url, encoder) = match raw.bytes().next() {
        Some(quote @ (b'"' | b'\'')) => {
            (decode_string(raw), UrlEncoder::Quoted { quote: quote as char })
        }
        _ => (raw.to_string(), UrlEncoder::Raw),
    };
    bundler.replace_url(id, store, token.start, token.end, &url, usage, encoder);
}
