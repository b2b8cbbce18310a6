//! # tpack
//!
//! Web asset module bundler core.
//!
//! Given an entry asset file (JavaScript, CSS, HTML, JSON, or an arbitrary
//! resource), the [Bundler] discovers every transitively referenced asset,
//! rewrites inter-asset links, optionally inlines small assets as data URIs,
//! evaluates conditional compilation directives and composes a single
//! concatenated output.
//!
//! The heart of the crate is the module graph engine: each file is scanned
//! into a sequence of replacement operations against its original content,
//! every referenced URL resolves to another module through a layered
//! pipeline, and three relations (`requires`, `includes`, `externals`) drive
//! which modules end up in the output and in what order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tpack::{Bundler, BundleOptions};
//!
//! let mut bundler = Bundler::new(BundleOptions::default());
//! let entry = bundler.get_module("src/app.js".as_ref())?;
//! let bundle = bundler.save(entry);
//! std::fs::write("dist/app.js", bundle.code)?;
//! ```

mod builtins;
mod css;
mod error;
mod expr;
mod file_system;
mod html;
mod js;
mod kind;
mod module;
mod options;
mod output;
mod path;
mod preprocessor;
mod replacement;
mod resolver;
mod strings;
mod writer;

#[cfg(test)]
mod tests;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rustc_hash::FxHashMap;

pub use crate::{
    builtins::{native_shim, NATIVE_SHIMS, NODEJS_BUILTINS},
    error::{BundleError, Diagnostic, IOError, Severity},
    expr::{evaluate, ExprError},
    file_system::{FileSystem, FileSystemOs},
    kind::{mime_of, ModuleKind},
    module::{Content, Module, ModuleId},
    options::{
        deep_merge, BundleOptions, CssImport, CssOptions, ErrorAction, Hooks, InlineLimit,
        OutputOptions, ResolveOptions, Target, UrlOptions,
    },
    output::SavedBundle,
    replacement::{DeferredUrl, Replacement, ReplacementData, UrlEncoder},
    resolver::{ResolveResult, Usage},
    strings::{
        decode_attr, decode_string, encode_attr, encode_string, trim_quotes, QueryValue,
    },
    writer::{TextWriter, Writer},
};
use crate::{module::Content as ModuleContent, path::PathUtil, resolver::BareResolution};

/// Bundler with the current operating system as the file system
pub type OsBundler = Bundler<FileSystemOs>;

/// One build session: the module arena, the per-path memo and the collected
/// diagnostics.
///
/// The session is single-threaded and cooperative: loading a module scans it
/// to completion, recursively constructing every module it references.
/// After a module has loaded it is read-only.
pub struct Bundler<Fs = FileSystemOs> {
    pub(crate) fs: Fs,
    options: BundleOptions,
    pub(crate) modules: Vec<Module>,
    by_path: FxHashMap<PathBuf, ModuleId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Bare-specifier memo, per referencing module.
    pub(crate) specifier_cache: FxHashMap<(ModuleId, String), BareResolution>,
}

impl<Fs> std::fmt::Debug for Bundler<Fs> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.options, f)
    }
}

impl<Fs: FileSystem + Default> Default for Bundler<Fs> {
    fn default() -> Self {
        Self::new(BundleOptions::default())
    }
}

impl<Fs: FileSystem + Default> Bundler<Fs> {
    pub fn new(options: BundleOptions) -> Self {
        Self::new_with_file_system(Fs::default(), options)
    }
}

impl<Fs: FileSystem> Bundler<Fs> {
    pub fn new_with_file_system(fs: Fs, options: BundleOptions) -> Self {
        Self {
            fs,
            options: options.sanitize(),
            modules: Vec::new(),
            by_path: FxHashMap::default(),
            diagnostics: Vec::new(),
            specifier_cache: FxHashMap::default(),
        }
    }

    /// Returns the session options.
    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    /// All diagnostics reported so far, in discovery order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    /// The module for `path`, creating and loading it on first use.
    ///
    /// A module is created exactly once per file: repeated calls return the
    /// memoised id. Loading scans the content and recursively constructs
    /// every referenced module.
    ///
    /// # Errors
    ///
    /// Only hard failures error: unreadable entry files and invalid UTF-8 in
    /// a textual kind. Everything recoverable lands in [Self::diagnostics].
    pub fn get_module(&mut self, path: &Path) -> Result<ModuleId, BundleError> {
        let id = self.register_from_fs(path)?;
        self.ensure_loaded(id);
        Ok(id)
    }

    /// Create the module for `path` without scanning it yet. Referrers
    /// record their edges against the registered module, then trigger
    /// [Self::ensure_loaded]; the edge order is what makes circular-include
    /// detection attribute the refusal to the right side.
    pub(crate) fn register_from_fs(&mut self, path: &Path) -> Result<ModuleId, BundleError> {
        let path = path.normalize();
        if let Some(&id) = self.by_path.get(&path) {
            return Ok(id);
        }

        let span = tracing::debug_span!("register_module", path = ?path);
        let _enter = span.enter();
        tracing::trace!(options = %self.options, "bundle_options");

        let kind = ModuleKind::from_path(&path);
        let bytes = self.fs.read(&path)?;
        let (kind, content) = match simdutf8::basic::from_utf8(&bytes) {
            Ok(text) => (kind, ModuleContent::Text(Arc::from(text))),
            Err(_) if kind.is_text() => return Err(BundleError::InvalidUtf8(path)),
            Err(_) => (ModuleKind::Binary, ModuleContent::Bytes(Arc::from(bytes))),
        };

        Ok(self.register(path, kind, content))
    }

    /// Run the module's scanner once.
    pub(crate) fn ensure_loaded(&mut self, id: ModuleId) {
        if self.modules[id.index()].loaded {
            return;
        }
        // marked before scanning so require cycles terminate
        self.modules[id.index()].loaded = true;
        self.load(id);
    }

    /// Register a module synthesised from in-memory content (inline scripts,
    /// extracted stylesheets). The caller records its edge and then calls
    /// [Self::ensure_loaded].
    pub(crate) fn create_synthetic(
        &mut self,
        path: PathBuf,
        kind: ModuleKind,
        content: String,
    ) -> ModuleId {
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        self.register(path, kind, ModuleContent::Text(Arc::from(content.as_str())))
    }

    fn register(&mut self, path: PathBuf, kind: ModuleKind, content: ModuleContent) -> ModuleId {
        let options = match self.options.for_file(&path) {
            Ok(options) => Arc::new(options.sanitize()),
            Err(err) => {
                // a broken per-file patch falls back to the session options
                self.diagnostics.push(Diagnostic {
                    path: path.clone(),
                    index: 0,
                    severity: Severity::Error,
                    message: "Invalid per-file options".to_string(),
                    cause: Some(err.to_string()),
                });
                Arc::new(self.options.clone().sanitize())
            }
        };
        let id = ModuleId(u32::try_from(self.modules.len()).expect("module arena overflow"));
        self.modules.push(Module {
            path: path.clone(),
            kind,
            target: options.target,
            options,
            commonjs: false,
            content,
            includes: indexmap::IndexSet::new(),
            requires: indexmap::IndexSet::new(),
            externals: indexmap::IndexSet::new(),
            replacements: Vec::new(),
            extract_css: None,
            url_postfix: None,
            loaded: false,
        });
        self.by_path.insert(path, id);
        id
    }

    /// Run the kind scanner, then the macro pass.
    fn load(&mut self, id: ModuleId) {
        match self.modules[id.index()].kind {
            ModuleKind::Js => js::parse(self, id),
            ModuleKind::Css => css::parse(self, id),
            ModuleKind::Html => html::parse(self, id),
            ModuleKind::Json | ModuleKind::Text => self.parse_text(id),
            ModuleKind::Resource | ModuleKind::Binary => {}
        }
    }

    /// Plain text kinds only run the macro pass.
    fn parse_text(&mut self, id: ModuleId) {
        let Some(content) = self.modules[id.index()].content.text_arc() else {
            return;
        };
        let mut store = crate::replacement::ReplacementStore::new(content.len());
        self.parse_macros(id, &mut store, &content);
        self.modules[id.index()].replacements = store.into_entries();
    }

    pub(crate) fn report(
        &mut self,
        module: ModuleId,
        index: usize,
        severity: Severity,
        message: String,
        cause: Option<String>,
    ) {
        let path = self.modules[module.index()].path.clone();
        match severity {
            Severity::Error => tracing::error!(path = ?path, index, "{message}"),
            Severity::Warning => tracing::warn!(path = ?path, index, "{message}"),
        }
        self.diagnostics.push(Diagnostic { path, index, severity, message, cause });
    }

    pub(crate) fn report_action(
        &mut self,
        action: ErrorAction,
        module: ModuleId,
        index: usize,
        message: String,
        cause: Option<String>,
    ) {
        let severity = match action {
            ErrorAction::Error => Severity::Error,
            ErrorAction::Warning => Severity::Warning,
            ErrorAction::Ignore => return,
        };
        self.report(module, index, severity, message, cause);
    }
}
