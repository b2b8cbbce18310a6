use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    builtins::{is_builtin, native_shim},
    error::Severity,
    file_system::FileSystem,
    options::{BundleOptions, ErrorAction, Target},
    path::PathUtil,
    strings::{split_url, take_query, QueryValue},
    Bundler, ModuleId,
};

/// The context a URL appears in, which selects the resolution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// A data-URL-capable reference (`url(...)`, `<img src>`).
    Inline,
    /// Must name a local file (`<a href>`, `@import`).
    Local,
    /// Module-resolution rules apply (`require(...)`).
    Require,
}

/// A resolved URL: the target module plus the preserved query and hash.
#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub module: ModuleId,
    /// `?query` part of the original URL, including the `?`.
    pub query: String,
    /// `#hash` part of the original URL, including the `#`.
    pub hash: String,
    /// The original unaliased base when the alias table rewrote the path.
    pub alias: Option<String>,
}

impl ResolveResult {
    /// Consume a `?name[=value]` marker from the preserved query.
    pub fn resolve_query(&mut self, name: &str) -> QueryValue {
        take_query(&mut self.query, name)
    }
}

/// Outcome of bare-specifier resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BareResolution {
    Found(PathBuf),
    /// A node builtin on the nodejs target: the host runtime provides it.
    HostProvided,
    NotFound,
}

/// Network, data and scheme-relative URLs are never local files.
static NON_LOCAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w\w+:|^//").unwrap());

impl<Fs: FileSystem> Bundler<Fs> {
    /// Resolve `raw_url` as referenced from `from`, creating (and loading)
    /// the target module on success.
    ///
    /// Failures are reported per the module's resolve options and yield
    /// `None`.
    pub(crate) fn resolve_url(
        &mut self,
        from: ModuleId,
        src_index: usize,
        raw_url: &str,
        usage: Usage,
    ) -> Option<ResolveResult> {
        let options = std::sync::Arc::clone(&self.modules[from.index()].options);

        let mut url = raw_url.to_string();
        if let Some(parse) = &options.hooks.resolve_parse {
            if let Some(rewritten) = parse(&url) {
                url = rewritten;
            }
        }

        let (url, alias) = apply_alias(&options.resolve.alias, &url);

        if NON_LOCAL.is_match(&url) {
            if usage == Usage::Local {
                self.report_action(
                    options.resolve.non_local,
                    from,
                    src_index,
                    format!("Cannot use the non-local url '{raw_url}' here"),
                    None,
                );
            }
            return None;
        }

        if let Some(skip) = &options.hooks.resolve_skip {
            if skip(&url) {
                return None;
            }
        }

        let (path_part, query, hash) = split_url(&url);
        if path_part.is_empty() {
            return None;
        }

        let target = self.modules[from.index()].target();
        let from_dir = self.modules[from.index()]
            .path
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);

        let mut resolved = if usage == Usage::Require && options.resolve.commonjs {
            if alias.is_some() || path_part.starts_with('.') || path_part.starts_with('/') {
                self.probe_extensions(
                    &from_dir.normalize_with(path_part),
                    &options.resolve.extensions_for(target),
                )
            } else {
                match self.resolve_bare(from, &from_dir, path_part, target, &options) {
                    BareResolution::Found(path) => Some(path),
                    BareResolution::HostProvided => return None,
                    BareResolution::NotFound => None,
                }
            }
        } else {
            let candidate = from_dir.normalize_with(path_part);
            self.fs.exists_file(&candidate).then(|| candidate.normalize())
        };

        if resolved.is_none() {
            if let Some(fallback) = &options.hooks.resolve_fallback {
                if let Some(path) = fallback(&url) {
                    if self.fs.exists_file(&path) {
                        resolved = Some(path.normalize());
                    }
                }
            }
        }

        let Some(path) = resolved else {
            let mut action = options.resolve.not_found;
            if usage == Usage::Inline && action == ErrorAction::Error {
                action = ErrorAction::Warning;
            }
            self.report_action(
                action,
                from,
                src_index,
                format!("Cannot find module '{raw_url}'"),
                None,
            );
            return None;
        };

        tracing::debug!(from = ?self.modules[from.index()].path, url = raw_url, ret = ?path);

        // registered, not yet loaded: the caller records its edge first and
        // then triggers the load
        let module = match self.register_from_fs(&path) {
            Ok(module) => module,
            Err(err) => {
                self.report(
                    from,
                    src_index,
                    Severity::Error,
                    format!("Cannot load module '{raw_url}'"),
                    Some(err.to_string()),
                );
                return None;
            }
        };

        Some(ResolveResult {
            module,
            query: query.to_string(),
            hash: hash.to_string(),
            alias,
        })
    }

    /// Resolve `raw_url` and record a deferred URL replacement over
    /// `start..end`.
    ///
    /// `Inline`-usage URLs may become data URIs per the `?__inline` marker
    /// and the `url.inline` option; inlining records an include edge, and a
    /// refused (circular) include falls back to the link rewrite.
    pub(crate) fn replace_url(
        &mut self,
        from: ModuleId,
        store: &mut crate::replacement::ReplacementStore,
        start: usize,
        end: usize,
        raw_url: &str,
        usage: Usage,
        encoder: crate::replacement::UrlEncoder,
    ) {
        use crate::options::InlineLimit;
        use crate::replacement::{DeferredUrl, ReplacementData};

        if !store.accepts(start, end) {
            return;
        }
        let Some(mut result) = self.resolve_url(from, start, raw_url, usage) else {
            return;
        };
        if result.resolve_query("__skip").is_present() {
            return;
        }
        let inline_marker = result.resolve_query("__inline");
        let postfix = !matches!(result.resolve_query("__postfix"), QueryValue::Bytes(0));

        let mut inline = false;
        if usage == Usage::Inline {
            let size = self.modules[result.module.index()].content.len() as u64;
            inline = match inline_marker {
                QueryValue::Flag => true,
                QueryValue::Bytes(limit) => size <= limit,
                QueryValue::None => match self.modules[from.index()].options.url.inline {
                    InlineLimit::Enabled(enabled) => enabled,
                    InlineLimit::Limit(limit) => size <= limit,
                },
            };
        }
        if inline && !self.add_include(from, start, result.module) {
            inline = false;
        }
        self.ensure_loaded(result.module);

        store.replace(
            start,
            end,
            ReplacementData::Deferred(DeferredUrl {
                module: result.module,
                query: result.query,
                hash: result.hash,
                alias: result.alias,
                postfix,
                inline,
                owner: from,
                encoder,
            }),
        );
    }

    /// Probe `path` with each configured extension, in order. The empty
    /// extension probes the exact path.
    fn probe_extensions(&self, path: &Path, extensions: &[String]) -> Option<PathBuf> {
        for ext in extensions {
            let candidate = if ext.is_empty() {
                path.to_path_buf()
            } else {
                let mut os = path.as_os_str().to_os_string();
                os.push(ext);
                PathBuf::from(os)
            };
            if self.fs.exists_file(&candidate) {
                return Some(candidate.normalize());
            }
        }
        None
    }

    /// Bare specifier resolution: the native shim table, then the module
    /// directory walk, then the configured roots. Memoised per module.
    fn resolve_bare(
        &mut self,
        from: ModuleId,
        from_dir: &Path,
        name: &str,
        target: Target,
        options: &BundleOptions,
    ) -> BareResolution {
        let memo_key = (from, name.to_string());
        if let Some(hit) = self.specifier_cache.get(&memo_key) {
            return hit.clone();
        }

        let resolution = self.resolve_bare_uncached(from_dir, name, target, options);
        self.specifier_cache.insert(memo_key, resolution.clone());
        resolution
    }

    fn resolve_bare_uncached(
        &self,
        from_dir: &Path,
        name: &str,
        target: Target,
        options: &BundleOptions,
    ) -> BareResolution {
        let mut specifier = name;
        if target == Target::NodeJs && is_builtin(name) {
            return BareResolution::HostProvided;
        }
        if options.resolve.native {
            if let Some(shim) = native_shim(name) {
                specifier = shim;
            }
        }

        let extensions = options.resolve.extensions_for(target);
        let mains = options.resolve.package_mains_for(target);
        let directories = options.resolve.modules_directories_for(target);

        for ancestor in from_dir.ancestors() {
            for directory in &directories {
                let base = ancestor.join(directory);
                if let Some(found) = self.probe_package(&base, specifier, &extensions, &mains) {
                    return BareResolution::Found(found);
                }
            }
        }

        for root in &options.resolve.root {
            if let Some(found) = self.probe_package(root, specifier, &extensions, &mains) {
                return BareResolution::Found(found);
            }
        }

        BareResolution::NotFound
    }

    /// Probe `base/specifier` as a file (extension probe), then as a package
    /// directory (`package.json` main fields, then an `index` file).
    fn probe_package(
        &self,
        base: &Path,
        specifier: &str,
        extensions: &[String],
        mains: &[String],
    ) -> Option<PathBuf> {
        let wants_directory = specifier.ends_with('/');
        let candidate = base.join(specifier.trim_end_matches('/')).normalize();

        if !wants_directory {
            if let Some(found) = self.probe_extensions(&candidate, extensions) {
                return Some(found);
            }
        }

        if !self.fs.exists_dir(&candidate) {
            return None;
        }

        if let Some(main) = self.read_package_main(&candidate, mains) {
            let entry = candidate.normalize_with(&main);
            if let Some(found) = self.probe_extensions(&entry, extensions) {
                return Some(found);
            }
            if self.fs.exists_dir(&entry) {
                if let Some(found) = self.probe_extensions(&entry.join("index"), extensions) {
                    return Some(found);
                }
            }
        }

        self.probe_extensions(&candidate.join("index"), extensions)
    }

    /// The first string value among the configured main fields of the
    /// directory's `package.json`.
    fn read_package_main(&self, directory: &Path, mains: &[String]) -> Option<String> {
        let manifest = directory.join("package.json");
        let mut text = match self.fs.read_to_string(&manifest) {
            Ok(text) => text,
            Err(_) => return None,
        };
        json_strip_comments::strip(&mut text).ok()?;
        let json: Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(err) => {
                tracing::debug!(path = ?manifest, error = %err, "invalid package.json");
                return None;
            }
        };
        for field in mains {
            if let Some(main) = json.get(field).and_then(Value::as_str) {
                if !main.is_empty() {
                    return Some(main.to_string());
                }
            }
        }
        None
    }
}

/// Longest-prefix alias rewrite. The matched prefix must end at a `/` or at
/// the end of the URL; trailing slashes on key and value are ignored and the
/// comparison is case-insensitive. Returns the rewritten URL and, when a
/// rewrite happened, the original base.
pub(crate) fn apply_alias(
    aliases: &indexmap::IndexMap<String, String>,
    url: &str,
) -> (String, Option<String>) {
    let mut best: Option<(&str, &str)> = None;
    for (key, value) in aliases {
        let key = key.trim_end_matches('/');
        if key.is_empty() || key.len() > url.len() {
            continue;
        }
        if !url[..key.len()].eq_ignore_ascii_case(key) {
            continue;
        }
        if url.len() > key.len() && !url[key.len()..].starts_with('/') {
            continue;
        }
        if best.is_none_or(|(k, _)| key.len() > k.len()) {
            best = Some((key, value));
        }
    }
    let Some((key, value)) = best else {
        return (url.to_string(), None);
    };
    let value = value.trim_end_matches('/');
    let rest = &url[key.len()..];
    (format!("{value}{rest}"), Some(url.to_string()))
}
