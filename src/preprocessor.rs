//! Conditional compilation directives and substitution macros.
//!
//! Directives live on lines inside comments (`#if`, `#region`, `#include`,
//! …) and drive a frame stack that opens and closes hidden regions in the
//! replacement store. Macros (`__url(...)`, `__macro(...)`, …) are scanned
//! over any text content after the kind scanner ran.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    error::Severity,
    expr,
    file_system::FileSystem,
    kind::ModuleKind,
    options::Target,
    path::PathUtil,
    replacement::{ReplacementData, ReplacementStore, UrlEncoder},
    resolver::Usage,
    strings::trim_quotes,
    Bundler, ModuleId,
};

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"#(include|extract-css|external|endregion|endif|elif|else|error|warning|region|require|target|if)\b\s*(.*)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    If,
    Elif,
    Else,
    Region,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    truth: bool,
}

/// Preprocessor state for one module's load.
#[derive(Debug, Default)]
pub(crate) struct Preprocessor {
    frames: Vec<Frame>,
}

impl Preprocessor {
    /// Report any directives left open at the end of the file. A hidden
    /// region still open is closed by the store itself.
    pub(crate) fn finish<Fs: FileSystem>(
        &mut self,
        bundler: &mut Bundler<Fs>,
        id: ModuleId,
        content_len: usize,
    ) {
        for frame in self.frames.drain(..) {
            let directive = match frame.kind {
                FrameKind::If | FrameKind::Elif | FrameKind::Else => "#if",
                FrameKind::Region => "#region",
            };
            bundler.report(
                id,
                content_len,
                Severity::Warning,
                format!("Missing matching close for '{directive}'"),
                None,
            );
        }
    }
}

impl<Fs: FileSystem> Bundler<Fs> {
    /// Scan a comment's text for directives. Returns true when at least one
    /// directive was found, in which case the caller deletes the comment.
    ///
    /// `text_offset` is the byte offset of `text` inside the module content;
    /// `comment_start`/`comment_end` span the whole comment including its
    /// delimiters.
    pub(crate) fn parse_comment_directives(
        &mut self,
        id: ModuleId,
        store: &mut ReplacementStore,
        pp: &mut Preprocessor,
        comment_start: usize,
        comment_end: usize,
        text: &str,
        text_offset: usize,
    ) -> bool {
        let mut seen = false;
        let mut line_offset = 0;
        for line in text.split('\n') {
            if let Some(caps) = DIRECTIVE.captures(line) {
                seen = true;
                let name = caps.get(1).map_or("", |m| m.as_str());
                let arg = trim_quotes(caps.get(2).map_or("", |m| m.as_str()));
                let at = text_offset + line_offset + caps.get(0).map_or(0, |m| m.start());
                self.apply_directive(
                    id,
                    store,
                    pp,
                    name,
                    arg,
                    at,
                    comment_start,
                    comment_end,
                );
            }
            line_offset += line.len() + 1;
        }
        seen
    }

    fn apply_directive(
        &mut self,
        id: ModuleId,
        store: &mut ReplacementStore,
        pp: &mut Preprocessor,
        name: &str,
        arg: &str,
        at: usize,
        comment_start: usize,
        comment_end: usize,
    ) {
        match name {
            "if" => {
                let truth = self.eval_condition(id, at, arg);
                pp.frames.push(Frame { kind: FrameKind::If, truth });
                if !truth {
                    store.begin_hidden_region(comment_end);
                }
            }
            "elif" => {
                let Some(top) = pp.frames.last_mut() else {
                    return self.mismatched(id, at, "#elif");
                };
                if top.kind != FrameKind::If {
                    return self.mismatched(id, at, "#elif");
                }
                // close the previous branch as if this were an #else
                if !top.truth {
                    store.end_hidden_region(comment_start);
                }
                top.truth = !top.truth;
                top.kind = FrameKind::Elif;
                if !top.truth {
                    store.begin_hidden_region(comment_end);
                }
                // then behave like a fresh #if
                let truth = self.eval_condition(id, at, arg);
                pp.frames.push(Frame { kind: FrameKind::If, truth });
                if !truth {
                    store.begin_hidden_region(comment_end);
                }
            }
            "else" => {
                let Some(top) = pp.frames.last_mut() else {
                    return self.mismatched(id, at, "#else");
                };
                if top.kind != FrameKind::If {
                    return self.mismatched(id, at, "#else");
                }
                if !top.truth {
                    store.end_hidden_region(comment_start);
                }
                top.truth = !top.truth;
                top.kind = FrameKind::Else;
                if !top.truth {
                    store.begin_hidden_region(comment_end);
                }
            }
            "endif" => {
                match pp.frames.last() {
                    Some(f) if matches!(f.kind, FrameKind::If | FrameKind::Else) => {}
                    _ => return self.mismatched(id, at, "#endif"),
                }
                if let Some(top) = pp.frames.pop() {
                    if !top.truth {
                        store.end_hidden_region(comment_start);
                    }
                }
                while pp.frames.last().is_some_and(|f| f.kind == FrameKind::Elif) {
                    if let Some(elif) = pp.frames.pop() {
                        if !elif.truth {
                            store.end_hidden_region(comment_start);
                        }
                    }
                }
            }
            "region" => {
                let truth = self.modules[id.index()].options.region.get(arg)
                    != Some(&Value::Bool(false));
                pp.frames.push(Frame { kind: FrameKind::Region, truth });
                if !truth {
                    store.begin_hidden_region(comment_end);
                }
            }
            "endregion" => {
                if pp.frames.last().is_none_or(|f| f.kind != FrameKind::Region) {
                    return self.mismatched(id, at, "#endregion");
                }
                if let Some(top) = pp.frames.pop() {
                    if !top.truth {
                        store.end_hidden_region(comment_start);
                    }
                }
            }
            // Directives below have side effects; inside a hidden region they
            // are elided together with their comment.
            _ if store.in_hidden_region() => {}
            "error" => {
                self.report(id, at, Severity::Error, arg.to_string(), None);
            }
            "warning" => {
                self.report(id, at, Severity::Warning, arg.to_string(), None);
            }
            "include" => {
                if let Some(result) = self.resolve_url(id, at, arg, Usage::Local) {
                    if self.add_include(id, at, result.module) {
                        store.insert(comment_start, ReplacementData::Inline(result.module));
                    }
                    self.ensure_loaded(result.module);
                }
            }
            "require" => {
                if let Some(result) = self.resolve_url(id, at, arg, Usage::Require) {
                    self.add_require(id, result.module);
                    self.ensure_loaded(result.module);
                }
            }
            "external" => {
                if let Some(result) = self.resolve_url(id, at, arg, Usage::Require) {
                    self.add_external(id, result.module);
                    self.ensure_loaded(result.module);
                }
            }
            "target" => match arg.parse::<Target>() {
                Ok(target) => self.modules[id.index()].target = Some(target),
                Err(()) => self.report(
                    id,
                    at,
                    Severity::Warning,
                    format!("Invalid target '{arg}'"),
                    None,
                ),
            },
            "extract-css" => {
                let path = if arg.is_empty() {
                    self.modules[id.index()].path.with_extension("css")
                } else {
                    let dir = self.modules[id.index()]
                        .path
                        .parent()
                        .map_or_else(std::path::PathBuf::new, std::path::Path::to_path_buf);
                    dir.normalize_with(arg)
                };
                let extracted = self.create_synthetic(path, ModuleKind::Css, String::new());
                self.modules[id.index()].extract_css = Some(extracted);
                self.ensure_loaded(extracted);
            }
            _ => unreachable!("unknown directive {name}"),
        }
    }

    fn eval_condition(&mut self, id: ModuleId, at: usize, arg: &str) -> bool {
        let defines = &self.modules[id.index()].options.define;
        match expr::evaluate(arg, defines) {
            Ok(value) => expr::truthy(&value),
            Err(err) => {
                self.report(
                    id,
                    at,
                    Severity::Error,
                    format!("Cannot evaluate expression '{arg}'"),
                    Some(err.to_string()),
                );
                false
            }
        }
    }

    fn mismatched(&mut self, id: ModuleId, at: usize, directive: &str) {
        self.report(
            id,
            at,
            Severity::Warning,
            format!("Mismatched '{directive}'"),
            None,
        );
    }
}

static MACRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"__(url|skip|postfix|macro|include|external|require|target)\s*\(\s*('[^']*'|"[^"]*"|[^)]*?)\s*\)"#,
    )
    .unwrap()
});

impl<Fs: FileSystem> Bundler<Fs> {
    /// The macro pass, run over any text content after the kind scanner.
    pub(crate) fn parse_macros(
        &mut self,
        id: ModuleId,
        store: &mut ReplacementStore,
        content: &str,
    ) {
        for caps in MACRO.captures_iter(content) {
            let all = caps.get(0).expect("full match");
            let name = caps.get(1).map_or("", |m| m.as_str());
            let raw_arg = caps.get(2).map_or("", |m| m.as_str());
            if !store.accepts(all.start(), all.end()) {
                continue;
            }
            let quote = match raw_arg.bytes().next() {
                Some(b'\'') => Some('\''),
                Some(b'"') => Some('"'),
                _ => None,
            };
            let arg = trim_quotes(raw_arg);
            match name {
                "url" => {
                    let encoder = match quote {
                        Some(quote) => UrlEncoder::Quoted { quote },
                        None => UrlEncoder::Raw,
                    };
                    self.replace_url(
                        id,
                        store,
                        all.start(),
                        all.end(),
                        arg,
                        Usage::Inline,
                        encoder,
                    );
                }
                "skip" => {
                    store.replace(
                        all.start(),
                        all.end(),
                        ReplacementData::Literal(raw_arg.to_string()),
                    );
                }
                "postfix" => {
                    self.modules[id.index()].url_postfix = Some(arg.to_string());
                    store.replace(all.start(), all.end(), ReplacementData::Literal(String::new()));
                }
                "macro" => {
                    let text = match self.modules[id.index()].options.define.get(arg) {
                        Some(Value::String(text)) => text.clone(),
                        Some(value) => value.to_string(),
                        None => String::new(),
                    };
                    store.replace(all.start(), all.end(), ReplacementData::Literal(text));
                }
                "include" => {
                    let mut replaced = ReplacementData::Literal(String::new());
                    if let Some(result) = self.resolve_url(id, all.start(), arg, Usage::Local) {
                        if self.add_include(id, all.start(), result.module) {
                            replaced = ReplacementData::Inline(result.module);
                        }
                        self.ensure_loaded(result.module);
                    }
                    store.replace(all.start(), all.end(), replaced);
                }
                "require" | "external" => {
                    if let Some(result) = self.resolve_url(id, all.start(), arg, Usage::Require) {
                        if name == "require" {
                            self.add_require(id, result.module);
                        } else {
                            self.add_external(id, result.module);
                        }
                        self.ensure_loaded(result.module);
                    }
                    store.replace(all.start(), all.end(), ReplacementData::Literal(String::new()));
                }
                "target" => {
                    match arg.parse::<Target>() {
                        Ok(target) => self.modules[id.index()].target = Some(target),
                        Err(()) => self.report(
                            id,
                            all.start(),
                            Severity::Warning,
                            format!("Invalid target '{arg}'"),
                            None,
                        ),
                    }
                    store.replace(all.start(), all.end(), ReplacementData::Literal(String::new()));
                }
                _ => unreachable!("unknown macro {name}"),
            }
        }
    }
}
