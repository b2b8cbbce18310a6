//! Output composer.
//!
//! Walks the closed require-list of a bundle root and emits each member's
//! content spliced with its replacements. The tpack and requirejs dialects
//! wrap every member in a define call; browser and nodejs emit plain
//! concatenation.

use std::path::Path;

use base64::Engine;

use crate::{
    file_system::FileSystem,
    kind::{mime_of, ModuleKind},
    module::Content,
    options::Target,
    path::{relative_url, PathUtil},
    replacement::{DeferredUrl, ReplacementData, UrlEncoder},
    strings::{encode_attr, encode_data_text, encode_string},
    writer::{TextWriter, Writer},
    Bundler, ModuleId,
};

/// The tpack runtime loader, prefixed to a tpack bundle with no externals.
static LOADER: &str = include_str!("loader/require.js");

/// A composed bundle, plus the extracted stylesheet sibling when the entry
/// used `#extract-css`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBundle {
    pub code: String,
    pub css: Option<Box<SavedBundle>>,
}

impl<Fs: FileSystem> Bundler<Fs> {
    /// Compose the bundle rooted at `id`: prefix, require-closure, postfix,
    /// then the `extract_css` sibling recursively.
    pub fn save(&self, id: ModuleId) -> SavedBundle {
        let module = &self.modules[id.index()];
        let mut writer = TextWriter::new(module.options.output.source_map);
        let prefix = format_banner(&module.options.output.prefix, &module.path);
        if !prefix.is_empty() {
            writer.write(&prefix, None);
        }
        self.write(id, &mut writer);
        let postfix = format_banner(&module.options.output.postfix, &module.path);
        if !postfix.is_empty() {
            writer.write(&postfix, None);
        }
        let css = module.extract_css.map(|extracted| Box::new(self.save(extracted)));
        SavedBundle { code: writer.finish(), css }
    }

    /// Emit the bundle rooted at `id` into `writer`, using the root's
    /// require-closure as the module list.
    pub fn write<W: Writer>(&self, id: ModuleId, writer: &mut W) {
        let list = self.all_requires(id);
        self.write_list(id, &list, writer);
    }

    /// Emit `list` as the bundle rooted at `root`.
    pub fn write_list<W: Writer>(&self, root: ModuleId, list: &[ModuleId], writer: &mut W) {
        let root_module = &self.modules[root.index()];
        let output = &root_module.options.output;
        let dialect = root_module.target();
        let wrap = matches!(dialect, Target::Tpack | Target::RequireJs)
            && root_module.kind == ModuleKind::Js;

        if wrap && dialect == Target::Tpack && self.all_externals(root).is_empty() {
            writer.write(LOADER, None);
        }

        for (i, &id) in list.iter().enumerate() {
            if i > 0 {
                writer.write(&output.module_seperator, None);
            }
            if !output.module_prefix.is_empty() {
                writer.write(&output.module_prefix, None);
            }
            if wrap {
                self.write_wrapped(root, id, dialect, writer);
            } else {
                self.write_module(root, id, writer);
            }
            if !output.module_postfix.is_empty() {
                writer.write(&output.module_postfix, None);
            }
        }
    }

    fn write_wrapped<W: Writer>(
        &self,
        root: ModuleId,
        id: ModuleId,
        dialect: Target,
        writer: &mut W,
    ) {
        let module = &self.modules[id.index()];
        writer.write(
            if dialect == Target::Tpack { "__tpack__.define(" } else { "define(" },
            None,
        );
        if id != root {
            let root_dir =
                self.modules[root.index()].path.parent().unwrap_or_else(|| Path::new(""));
            let name = relative_url(root_dir, &module.path);
            writer.write(&encode_string(&name, '"'), None);
            writer.write(", ", None);
        }
        writer.write("function(require, exports, module){", None);
        writer.write("\n", None);
        writer.indent();
        match module.kind {
            ModuleKind::Css => {
                let css = self.render(root, id);
                let exports = if dialect == Target::Tpack {
                    format!("module.exports = __tpack__.insertStyle({});", encode_string(&css, '"'))
                } else {
                    format!("module.exports = {};", encode_string(&css, '"'))
                };
                writer.write(&exports, None);
            }
            ModuleKind::Json => {
                writer.write("module.exports = ", None);
                self.write_module(root, id, writer);
                writer.write(";", None);
            }
            ModuleKind::Js => self.write_module(root, id, writer),
            _ => {
                // text, html and resources export their content as a string;
                // binary content as a data URI
                let exports = match &module.content {
                    Content::Text(_) => encode_string(&self.render(root, id), '"'),
                    Content::Bytes(_) => encode_string(&self.data_uri(root, id), '"'),
                };
                writer.write(&format!("module.exports = {exports};"), None);
            }
        }
        writer.unindent();
        writer.write("\n});", None);
    }

    /// Emit one module's content with its replacements spliced in.
    pub(crate) fn write_module<W: Writer>(&self, root: ModuleId, id: ModuleId, writer: &mut W) {
        let module = &self.modules[id.index()];
        let Content::Text(content) = &module.content else {
            return;
        };
        if module.replacements.is_empty() {
            writer.write(content, Some((&module.path, 0)));
            return;
        }
        let mut cursor = 0;
        for replacement in &module.replacements {
            let start = replacement.start.min(content.len());
            if cursor < start {
                writer.write(&content[cursor..start], Some((&module.path, cursor)));
            }
            match &replacement.data {
                ReplacementData::Literal(text) => {
                    if !text.is_empty() {
                        writer.write(text, None);
                    }
                }
                ReplacementData::Deferred(url) => {
                    writer.write(&self.build_url_text(root, url), None);
                }
                ReplacementData::Inline(inlined) => {
                    self.write(*inlined, writer);
                }
            }
            cursor = replacement.end.min(content.len());
        }
        if cursor < content.len() {
            writer.write(&content[cursor..], Some((&module.path, cursor)));
        }
    }

    fn render(&self, root: ModuleId, id: ModuleId) -> String {
        let mut writer = TextWriter::new(false);
        self.write_module(root, id, &mut writer);
        writer.finish()
    }

    /// Build the final text of a deferred URL against the emitting root.
    fn build_url_text(&self, root: ModuleId, deferred: &DeferredUrl) -> String {
        let url = if deferred.inline {
            self.data_uri(root, deferred.module)
        } else {
            self.link_url(root, deferred)
        };
        match &deferred.encoder {
            UrlEncoder::Raw => url,
            UrlEncoder::Quoted { quote } => encode_string(&url, *quote),
            UrlEncoder::Attr { quote } => encode_attr(&url, *quote),
            UrlEncoder::ShimVar { ident, member } => format!(
                "var {ident} = require({}){};\n",
                encode_string(&url, '"'),
                member.as_deref().unwrap_or("")
            ),
        }
    }

    fn link_url(&self, root: ModuleId, deferred: &DeferredUrl) -> String {
        let root_module = &self.modules[root.index()];
        let target = &self.modules[deferred.module.index()];
        let slash = target.path.to_slash();

        // public-path table, longest prefix on the target's path
        let mut best: Option<(&str, &str)> = None;
        for (key, value) in &root_module.options.url.public {
            let key = key.trim_end_matches('/');
            if !slash.starts_with(key) {
                continue;
            }
            if slash.len() > key.len() && !slash[key.len()..].starts_with('/') {
                continue;
            }
            if best.is_none_or(|(k, _)| key.len() > k.len()) {
                best = Some((key, value));
            }
        }
        let mut url = match best {
            Some((key, value)) => format!("{}{}", value.trim_end_matches('/'), &slash[key.len()..]),
            None => {
                let root_dir = root_module.path.parent().unwrap_or_else(|| Path::new(""));
                relative_url(root_dir, &target.path)
            }
        };

        if deferred.postfix {
            let owner = &self.modules[deferred.owner.index()];
            let postfix = owner
                .url_postfix
                .clone()
                .or_else(|| {
                    owner.options.hooks.url_postfix.as_ref().map(|hook| hook(&target.path))
                })
                .or_else(|| owner.options.url.postfix.clone());
            if let Some(postfix) = postfix {
                url.push_str(&postfix);
            }
        }

        url.push_str(&deferred.query);
        url.push_str(&deferred.hash);
        url
    }

    /// Data URI for an inlined target: base64 for binary content, percent
    /// encoding for text.
    fn data_uri(&self, root: ModuleId, id: ModuleId) -> String {
        let module = &self.modules[id.index()];
        let mime = mime_of(&module.path);
        if module.kind.is_text() {
            let rendered = self.render(root, id);
            format!("data:{mime},{}", encode_data_text(&rendered))
        } else {
            let payload =
                base64::engine::general_purpose::STANDARD.encode(module.content.as_bytes());
            format!("data:{mime};base64,{payload}")
        }
    }
}

fn format_banner(template: &str, path: &Path) -> String {
    if !template.contains("__name") {
        return template.to_string();
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    template.replace("__name", &stem)
}
