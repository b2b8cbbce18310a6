//! HTML scanner.
//!
//! One alternation distinguishes comments, `<script>`/`<style>` elements,
//! template markers and URL-bearing tags. Inline script and style bodies are
//! extracted into synthetic modules named `<origName>#inline<N><ext>` — the
//! counter is scoped to the enclosing HTML module and follows document
//! order, so emitted source maps reference reproducible paths.

use std::ops::Range;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    file_system::FileSystem,
    kind::ModuleKind,
    preprocessor::Preprocessor,
    replacement::{DeferredUrl, ReplacementData, ReplacementStore, UrlEncoder},
    resolver::Usage,
    strings::decode_attr,
    Bundler, ModuleId,
};

static HTML_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?is)"#,
        r#"(?P<comment><!--.*?-->)"#,
        "|",
        r#"<script\b(?P<sattrs>[^>]*)>(?P<sbody>.*?)</script\s*>"#,
        "|",
        r#"<style\b(?P<stattrs>[^>]*)>(?P<stbody>.*?)</style\s*>"#,
        "|",
        // template markers are opaque
        r#"<%.*?%>|<\?.*?\?>|<#.*?#>"#,
        "|",
        r#"<(?P<tag>img|link|object|embed|audio|video|source|a|base|form|input|button)\b(?P<tattrs>[^>]*)>"#,
    ))
    .unwrap()
});

static ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<name>[^\s"'<>/=]+)(?:\s*=\s*(?P<value>"[^"]*"|'[^']*'|[^\s>]+))?"#).unwrap()
});

#[derive(Debug)]
struct Attr {
    /// Lowercased attribute name.
    name: String,
    /// Span of the whole `name="value"` text.
    span: Range<usize>,
    /// Span of the value without quotes.
    value: Option<Range<usize>>,
    quote: Option<char>,
}

fn parse_attrs(content: &str, range: Range<usize>) -> Vec<Attr> {
    let mut attrs = Vec::new();
    for caps in ATTR.captures_iter(&content[range.clone()]) {
        let all = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = match caps.name("name") {
            Some(m) => m,
            None => continue,
        };
        let (value, quote) = match caps.name("value") {
            Some(m) => {
                let text = m.as_str();
                match text.bytes().next() {
                    Some(q @ (b'"' | b'\'')) => (
                        Some(range.start + m.start() + 1..range.start + m.end() - 1),
                        Some(q as char),
                    ),
                    _ => (Some(range.start + m.start()..range.start + m.end()), None),
                }
            }
            None => (None, None),
        };
        attrs.push(Attr {
            name: name.as_str().to_ascii_lowercase(),
            span: range.start + all.start()..range.start + all.end(),
            value,
            quote,
        });
    }
    attrs
}

fn has_template_markers(text: &str) -> bool {
    text.contains("<%") || text.contains("<?") || text.contains("<#")
}

pub(crate) fn parse<Fs: FileSystem>(bundler: &mut Bundler<Fs>, id: ModuleId) {
    let Some(content) = bundler.modules[id.index()].content.text_arc() else {
        return;
    };
    let mut store = ReplacementStore::new(content.len());
    let mut pp = Preprocessor::default();
    let mut inline_counter = 0u32;

    for caps in HTML_TOKEN.captures_iter(&content) {
        if let Some(comment) = caps.name("comment") {
            let text = &content[comment.start() + 4..comment.end() - 3];
            if bundler.parse_comment_directives(
                id,
                &mut store,
                &mut pp,
                comment.start(),
                comment.end(),
                text,
                comment.start() + 4,
            ) {
                store.replace(
                    comment.start(),
                    comment.end(),
                    ReplacementData::Literal(String::new()),
                );
            }
        } else if let Some(attrs) = caps.name("sattrs") {
            let body = caps.name("sbody").map_or(0..0, |m| m.range());
            handle_script(
                bundler,
                id,
                &mut store,
                &content,
                attrs.range(),
                body,
                &mut inline_counter,
            );
        } else if let Some(attrs) = caps.name("stattrs") {
            let body = caps.name("stbody").map_or(0..0, |m| m.range());
            handle_style(
                bundler,
                id,
                &mut store,
                &content,
                attrs.range(),
                body,
                &mut inline_counter,
            );
        } else if let Some(tag) = caps.name("tag") {
            let attrs = caps.name("tattrs").map_or(0..0, |m| m.range());
            handle_tag(bundler, id, &mut store, &content, &tag.as_str().to_ascii_lowercase(), attrs);
        }
    }

    pp.finish(bundler, id, content.len());
    bundler.parse_macros(id, &mut store, &content);
    bundler.modules[id.index()].replacements = store.into_entries();
}

/// Delete the `__skip` attribute and report whether the tag is suppressed.
fn strip_skip(
    store: &mut ReplacementStore,
    content: &str,
    attrs: &[Attr],
) -> bool {
    let Some(skip) = attrs.iter().find(|a| a.name == "__skip") else {
        return false;
    };
    let mut start = skip.span.start;
    while start > 0 && content.as_bytes()[start - 1].is_ascii_whitespace() {
        start -= 1;
    }
    store.replace(start, skip.span.end, ReplacementData::Literal(String::new()));
    true
}

fn handle_script<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    content: &str,
    attrs_range: Range<usize>,
    body: Range<usize>,
    inline_counter: &mut u32,
) {
    let attrs = parse_attrs(content, attrs_range);
    if strip_skip(store, content, &attrs) {
        return;
    }

    let script_type = attrs.iter().find(|a| a.name == "type");
    let type_is_js = script_type.is_none_or(|attr| {
        attr.value.as_ref().is_none_or(|range| {
            let value = content[range.clone()].to_ascii_lowercase();
            value.contains("javascript") || value == "module"
        })
    });

    if let Some(src) = attrs.iter().find(|a| a.name == "src") {
        let Some(value) = src.value.clone() else { return };
        let url = decode_attr(&content[value.clone()]);
        if !store.accepts(value.start, value.end) {
            return;
        }
        let Some(mut result) = bundler.resolve_url(id, value.start, &url, Usage::Local) else {
            return;
        };
        if result.resolve_query("__skip").is_present() {
            return;
        }
        let inline = result.resolve_query("__inline").is_present();
        let postfix = !matches!(
            result.resolve_query("__postfix"),
            crate::strings::QueryValue::Bytes(0)
        );
        if inline && bundler.add_include(id, value.start, result.module) {
            bundler.ensure_loaded(result.module);
            // keep both tags, drop the src attribute, splice the module in
            // between
            let mut attr_start = src.span.start;
            while attr_start > 0 && content.as_bytes()[attr_start - 1].is_ascii_whitespace() {
                attr_start -= 1;
            }
            store.replace(attr_start, src.span.end, ReplacementData::Literal(String::new()));
            store.replace(body.start, body.end, ReplacementData::Inline(result.module));
            return;
        }
        bundler.ensure_loaded(result.module);
        store.replace(
            value.start,
            value.end,
            ReplacementData::Deferred(DeferredUrl {
                module: result.module,
                query: result.query,
                hash: result.hash,
                alias: result.alias,
                postfix,
                inline: false,
                owner: id,
                encoder: UrlEncoder::Attr { quote: src.quote.unwrap_or('"') },
            }),
        );
        return;
    }

    let text = &content[body.clone()];
    if text.trim().is_empty() || !type_is_js || has_template_markers(text) {
        return;
    }
    if !store.accepts(body.start, body.end) {
        return;
    }
    *inline_counter += 1;
    let path = synthetic_path(bundler, id, *inline_counter, ".js");
    let synthetic = bundler.create_synthetic(path, ModuleKind::Js, text.to_string());
    if bundler.add_include(id, body.start, synthetic) {
        store.replace(body.start, body.end, ReplacementData::Inline(synthetic));
    }
    bundler.ensure_loaded(synthetic);
}

fn handle_style<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    content: &str,
    attrs_range: Range<usize>,
    body: Range<usize>,
    inline_counter: &mut u32,
) {
    let attrs = parse_attrs(content, attrs_range);
    if strip_skip(store, content, &attrs) {
        return;
    }
    let text = &content[body.clone()];
    if text.trim().is_empty() || has_template_markers(text) {
        return;
    }
    if !store.accepts(body.start, body.end) {
        return;
    }
    *inline_counter += 1;
    let path = synthetic_path(bundler, id, *inline_counter, ".css");
    let synthetic = bundler.create_synthetic(path, ModuleKind::Css, text.to_string());
    if bundler.add_include(id, body.start, synthetic) {
        store.replace(body.start, body.end, ReplacementData::Inline(synthetic));
    }
    bundler.ensure_loaded(synthetic);
}

fn synthetic_path<Fs: FileSystem>(
    bundler: &Bundler<Fs>,
    id: ModuleId,
    counter: u32,
    ext: &str,
) -> PathBuf {
    let base = bundler.modules[id.index()].path.as_os_str().to_string_lossy();
    PathBuf::from(format!("{base}#inline{counter}{ext}"))
}

fn handle_tag<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    content: &str,
    tag: &str,
    attrs_range: Range<usize>,
) {
    let attrs = parse_attrs(content, attrs_range);
    if strip_skip(store, content, &attrs) {
        return;
    }

    for attr in &attrs {
        let usage = match (tag, attr.name.as_str()) {
            ("link", "href") => Usage::Inline,
            ("a" | "base", "href") => Usage::Local,
            ("form", "action") => Usage::Local,
            ("input" | "button", "formaction") => Usage::Local,
            ("object", "data") => Usage::Inline,
            ("img", "srcset") => {
                handle_srcset(bundler, id, store, content, attr);
                continue;
            }
            (_, "src" | "data-src") => Usage::Inline,
            _ => continue,
        };
        let Some(value) = attr.value.clone() else { continue };
        let url = decode_attr(&content[value.clone()]);
        if url.is_empty() {
            continue;
        }
        bundler.replace_url(
            id,
            store,
            value.start,
            value.end,
            &url,
            usage,
            UrlEncoder::Attr { quote: attr.quote.unwrap_or('"') },
        );
    }
}

/// `srcset` holds comma-separated `url [descriptor]` entries; each URL is
/// rewritten in place.
fn handle_srcset<Fs: FileSystem>(
    bundler: &mut Bundler<Fs>,
    id: ModuleId,
    store: &mut ReplacementStore,
    content: &str,
    attr: &Attr,
) {
    let Some(value) = attr.value.clone() else { return };
    let text = &content[value.clone()];
    let mut offset = 0;
    for entry in text.split(',') {
        let trimmed_start = entry.len() - entry.trim_start().len();
        let url_start = offset + trimmed_start;
        let url_text: &str = entry
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or("");
        if !url_text.is_empty() {
            let start = value.start + url_start;
            let end = start + url_text.len();
            bundler.replace_url(
                id,
                store,
                start,
                end,
                url_text,
                Usage::Inline,
                UrlEncoder::Raw,
            );
        }
        offset += entry.len() + 1;
    }
}
