use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::BundleError, path::PathUtil};

/// The module-emission dialect of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Browser,
    NodeJs,
    Tpack,
    RequireJs,
}

impl FromStr for Target {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "browser" => Ok(Self::Browser),
            "nodejs" => Ok(Self::NodeJs),
            "tpack" => Ok(Self::Tpack),
            "requirejs" => Ok(Self::RequireJs),
            _ => Err(()),
        }
    }
}

/// How a recoverable resolution problem is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    Error,
    Warning,
    Ignore,
}

/// Threshold for automatic data-URI inlining of `Inline`-usage URLs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InlineLimit {
    Enabled(bool),
    /// Inline targets no larger than this many bytes.
    Limit(u64),
}

impl Default for InlineLimit {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

/// Disposition of `@import` statements in CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssImport {
    /// Leave the statement untouched.
    None,
    /// Rewrite the imported URL in place.
    Url,
    /// Resolve the target, require it into the bundle and delete the
    /// statement.
    Inline,
}

/// URL resolution options, see §resolve of the option tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Prefix aliases applied before any probing. Longest key wins, the
    /// prefix must end at a `/` or at the end of the URL, trailing slashes on
    /// key and value are ignored and comparison is case-insensitive.
    pub alias: IndexMap<String, String>,

    /// Extensions probed in order. `None` picks the target default:
    /// `["", ".node", ".json", ".js"]` for nodejs, otherwise
    /// `["", ".json", ".js", ".css", ".tpl"]`.
    pub extensions: Option<Vec<String>>,

    /// Directory names walked for bare specifiers. `None` picks the target
    /// default: `["node_modules"]` for nodejs, otherwise
    /// `["web_modules", "node_modules"]`.
    pub modules_directories: Option<Vec<String>>,

    /// `package.json` fields tried in order for a package entry point.
    /// `None` picks the target default: `["main"]` for nodejs, otherwise
    /// `["browser", "web", "browserify", "main"]`.
    pub package_mains: Option<Vec<String>>,

    /// Absolute roots probed for bare specifiers after the directory walk.
    pub root: Vec<PathBuf>,

    /// Whether CommonJS-style search applies to `Require`-usage URLs.
    pub commonjs: bool,

    /// Whether node builtins map to their browser shim packages.
    pub native: bool,

    /// Reporting of unresolvable URLs. `Inline` usage downgrades `error` to
    /// a warning.
    pub not_found: ErrorAction,

    /// Reporting of network/data URLs in a context that needs a local file.
    pub non_local: ErrorAction,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            alias: IndexMap::new(),
            extensions: None,
            modules_directories: None,
            package_mains: None,
            root: vec![],
            commonjs: true,
            native: true,
            not_found: ErrorAction::Error,
            non_local: ErrorAction::Warning,
        }
    }
}

static NODEJS_EXTENSIONS: &[&str] = &["", ".node", ".json", ".js"];
static DEFAULT_EXTENSIONS: &[&str] = &["", ".json", ".js", ".css", ".tpl"];
static NODEJS_MODULES_DIRECTORIES: &[&str] = &["node_modules"];
static DEFAULT_MODULES_DIRECTORIES: &[&str] = &["web_modules", "node_modules"];
static NODEJS_PACKAGE_MAINS: &[&str] = &["main"];
static DEFAULT_PACKAGE_MAINS: &[&str] = &["browser", "web", "browserify", "main"];

impl ResolveOptions {
    pub(crate) fn extensions_for(&self, target: Target) -> Vec<String> {
        self.extensions.clone().unwrap_or_else(|| {
            let defaults =
                if target == Target::NodeJs { NODEJS_EXTENSIONS } else { DEFAULT_EXTENSIONS };
            defaults.iter().map(ToString::to_string).collect()
        })
    }

    pub(crate) fn modules_directories_for(&self, target: Target) -> Vec<String> {
        self.modules_directories.clone().unwrap_or_else(|| {
            let defaults = if target == Target::NodeJs {
                NODEJS_MODULES_DIRECTORIES
            } else {
                DEFAULT_MODULES_DIRECTORIES
            };
            defaults.iter().map(ToString::to_string).collect()
        })
    }

    pub(crate) fn package_mains_for(&self, target: Target) -> Vec<String> {
        self.package_mains.clone().unwrap_or_else(|| {
            let defaults =
                if target == Target::NodeJs { NODEJS_PACKAGE_MAINS } else { DEFAULT_PACKAGE_MAINS };
            defaults.iter().map(ToString::to_string).collect()
        })
    }
}

/// Output composition options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputOptions {
    /// Whether the writer should compose a source map.
    pub source_map: bool,

    /// Text emitted before the bundle. `__name` substitutes the entry file
    /// stem.
    pub prefix: String,

    /// Text emitted after the bundle, formatted like `prefix`.
    pub postfix: String,

    /// Text between two emitted modules.
    // Field name spelling is part of the external option surface.
    pub module_seperator: String,

    /// Text before each emitted module.
    pub module_prefix: String,

    /// Text after each emitted module.
    pub module_postfix: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            source_map: false,
            prefix: String::new(),
            postfix: String::new(),
            module_seperator: "\n".into(),
            module_prefix: String::new(),
            module_postfix: String::new(),
        }
    }
}

/// Emitted-URL options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlOptions {
    /// Automatic data-URI inlining threshold for `Inline`-usage URLs.
    /// `?__inline` markers override this per URL.
    pub inline: InlineLimit,

    /// Appended to every rewritten URL path, unless the URL carried
    /// `?__postfix=0`.
    pub postfix: Option<String>,

    /// Public-path table: a rewritten URL whose project path starts with a
    /// key is emitted under the mapped prefix instead of a relative path.
    /// Longest key wins.
    pub public: IndexMap<String, String>,
}

/// CSS scanner options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CssOptions {
    pub import: CssImport,
}

impl Default for CssOptions {
    fn default() -> Self {
        Self { import: CssImport::Inline }
    }
}

/// Non-serialisable option hooks.
///
/// These survive per-file option merging by being re-attached from the base
/// options after the value-level merge.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Rewrites a raw URL before any other resolution step.
    pub resolve_parse: Option<Arc<dyn Fn(&str) -> Option<String> + Send + Sync>>,

    /// Aborts resolution of a URL with no result when it returns true.
    pub resolve_skip: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,

    /// Last-chance resolution: the returned path is accepted if it exists.
    pub resolve_fallback: Option<Arc<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>>,

    /// Computes the URL postfix for a resolved file, overriding
    /// [UrlOptions::postfix].
    pub url_postfix: Option<Arc<dyn Fn(&Path) -> String + Send + Sync>>,

    /// Computes the disposition of one `@import`, overriding
    /// [CssOptions::import].
    pub css_import: Option<Arc<dyn Fn(&str) -> CssImport + Send + Sync>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("resolve_parse", &self.resolve_parse.is_some())
            .field("resolve_skip", &self.resolve_skip.is_some())
            .field("resolve_fallback", &self.resolve_fallback.is_some())
            .field("url_postfix", &self.url_postfix.is_some())
            .field("css_import", &self.css_import.is_some())
            .finish()
    }
}

/// The full option tree applied to a build session.
///
/// Per-file overrides in [BundleOptions::module] are deep-merged onto a
/// clone of these options when a module is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleOptions {
    /// Default emission dialect. A `#target` directive in a file overrides
    /// this for that module.
    pub target: Option<Target>,

    pub resolve: ResolveOptions,

    pub output: OutputOptions,

    pub url: UrlOptions,

    pub css: CssOptions,

    /// Preprocessor definitions for `#if` expressions and `__macro` calls.
    pub define: IndexMap<String, Value>,

    /// Region switches: a region named here with the value `false` is
    /// hidden.
    pub region: IndexMap<String, Value>,

    /// Per-file option patches, keyed by glob pattern (or plain file name)
    /// and deep-merged in declaration order.
    pub module: IndexMap<String, Value>,

    #[serde(skip)]
    pub hooks: Hooks,
}

impl BundleOptions {
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds an alias pair to `resolve.alias`.
    #[must_use]
    pub fn with_alias<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.resolve.alias.insert(key.into(), value.into());
        self
    }

    /// Defines a preprocessor symbol.
    #[must_use]
    pub fn with_define<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.define.insert(name.into(), value.into());
        self
    }

    /// Sets the automatic inline threshold in bytes.
    #[must_use]
    pub const fn with_inline_limit(mut self, bytes: u64) -> Self {
        self.url.inline = InlineLimit::Limit(bytes);
        self
    }

    /// Adds a per-file option patch.
    #[must_use]
    pub fn with_module_patch<K: Into<String>>(mut self, pattern: K, patch: Value) -> Self {
        self.module.insert(pattern.into(), patch);
        self
    }

    pub(crate) fn sanitize(self) -> Self {
        debug_assert!(
            self.resolve
                .extensions
                .iter()
                .flatten()
                .all(|e| e.is_empty() || e.starts_with('.')),
            "All extensions must start with a leading dot"
        );
        self
    }

    /// Resolve the options applied to `path`: the base options with every
    /// matching [BundleOptions::module] patch deep-merged on top.
    pub(crate) fn for_file(&self, path: &Path) -> Result<Self, BundleError> {
        if self.module.is_empty() {
            return Ok(self.clone());
        }
        let slash = path.to_slash();
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();

        let mut value = None;
        for (pattern, patch) in &self.module {
            if !matches_file(pattern, &slash, &name) {
                continue;
            }
            let merged = value.get_or_insert_with(|| {
                serde_json::to_value(self).unwrap_or(Value::Object(serde_json::Map::new()))
            });
            deep_merge(merged, patch);
        }
        let Some(value) = value else {
            return Ok(self.clone());
        };

        let mut merged: Self = serde_json::from_value(value)
            .map_err(|err| BundleError::InvalidOptions(slash, err.to_string()))?;
        merged.hooks = self.hooks.clone();
        Ok(merged)
    }
}

fn matches_file(pattern: &str, slash_path: &str, file_name: &str) -> bool {
    pattern == file_name
        || fast_glob::glob_match(pattern, slash_path)
        || fast_glob::glob_match(pattern, file_name)
}

/// The §options deep merge: object values merge recursively unless the
/// destination holds `false`; arrays and primitives replace wholesale.
pub fn deep_merge(dst: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *dst = patch.clone();
        return;
    };
    if !dst.is_object() {
        *dst = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(dst_map) = dst {
        for (key, value) in patch_map {
            if value.is_object() && dst_map.get(key) != Some(&Value::Bool(false)) {
                let entry = dst_map.entry(key.clone()).or_insert(Value::Null);
                deep_merge(entry, value);
            } else {
                dst_map.insert(key.clone(), value.clone());
            }
        }
    }
}

// For tracing
impl fmt::Display for BundleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(target) = self.target {
            write!(f, "target:{target:?},")?;
        }
        if !self.resolve.alias.is_empty() {
            write!(f, "alias:{:?},", self.resolve.alias)?;
        }
        if let Some(extensions) = &self.resolve.extensions {
            write!(f, "extensions:{extensions:?},")?;
        }
        if !self.resolve.root.is_empty() {
            write!(f, "root:{:?},", self.resolve.root)?;
        }
        if !self.resolve.commonjs {
            write!(f, "commonjs:false,")?;
        }
        if !self.resolve.native {
            write!(f, "native:false,")?;
        }
        if self.url.inline != InlineLimit::Enabled(false) {
            write!(f, "inline:{:?},", self.url.inline)?;
        }
        if !self.define.is_empty() {
            write!(f, "define:{:?},", self.define)?;
        }
        if !self.module.is_empty() {
            write!(f, "module:{:?},", self.module)?;
        }
        Ok(())
    }
}
