use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexSet;
use rustc_hash::FxHashSet;

use crate::{
    error::Severity,
    file_system::FileSystem,
    kind::ModuleKind,
    options::{BundleOptions, Target},
    replacement::Replacement,
    Bundler,
};

/// Identity of a module inside its build session's arena.
///
/// Modules reference each other freely (`requires` may be cyclic), so they
/// are addressed by id instead of owning pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Loaded module content.
#[derive(Debug, Clone)]
pub enum Content {
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl Content {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    pub(crate) fn text_arc(&self) -> Option<Arc<str>> {
        match self {
            Self::Text(text) => Some(Arc::clone(text)),
            Self::Bytes(_) => None,
        }
    }
}

/// One analysed physical file: its discovered edges and pending edits.
///
/// Created exactly once per file and registered in the session before its
/// scanner runs, so recursive resolution observes in-progress modules. After
/// loading the module is read-only.
#[derive(Debug)]
pub struct Module {
    pub(crate) path: PathBuf,
    pub(crate) kind: ModuleKind,
    pub(crate) options: Arc<BundleOptions>,
    /// Explicit target from options or a `#target` directive.
    pub(crate) target: Option<Target>,
    /// Set when the scanner sees CommonJS constructs; upgrades the default
    /// target to tpack.
    pub(crate) commonjs: bool,
    pub(crate) content: Content,
    pub(crate) includes: IndexSet<ModuleId>,
    pub(crate) requires: IndexSet<ModuleId>,
    pub(crate) externals: IndexSet<ModuleId>,
    pub(crate) replacements: Vec<Replacement>,
    pub(crate) extract_css: Option<ModuleId>,
    /// Module-scoped URL postfix set by a `__postfix` macro.
    pub(crate) url_postfix: Option<String>,
    /// Whether the scanner has run. Registration precedes loading so that
    /// edges recorded by a referrer are visible while the target loads.
    pub(crate) loaded: bool,
}

impl Module {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn includes(&self) -> &IndexSet<ModuleId> {
        &self.includes
    }

    pub fn requires(&self) -> &IndexSet<ModuleId> {
        &self.requires
    }

    pub fn externals(&self) -> &IndexSet<ModuleId> {
        &self.externals
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn extract_css(&self) -> Option<ModuleId> {
        self.extract_css
    }

    /// The dialect this module is emitted in when it is the bundle root.
    pub fn target(&self) -> Target {
        self.target.unwrap_or(if self.commonjs { Target::Tpack } else { Target::Browser })
    }

    /// File name for diagnostics.
    pub(crate) fn name(&self) -> Cow<'_, str> {
        self.path.file_name().map_or_else(|| self.path.to_string_lossy(), |n| n.to_string_lossy())
    }
}

impl<Fs: FileSystem> Bundler<Fs> {
    /// Reflexive-transitive inclusion: whether `a` is `b` or inlines `b`
    /// through any chain of `includes` edges.
    pub fn has_included(&self, a: ModuleId, b: ModuleId) -> bool {
        if a == b {
            return true;
        }
        let mut seen = FxHashSet::default();
        let mut stack = vec![a];
        while let Some(id) = stack.pop() {
            for &inc in &self.modules[id.index()].includes {
                if inc == b {
                    return true;
                }
                if seen.insert(inc) {
                    stack.push(inc);
                }
            }
        }
        false
    }

    /// Record "`from` inlines `to`". Refused with a warning when the edge
    /// would close an include cycle.
    pub(crate) fn add_include(&mut self, from: ModuleId, src_index: usize, to: ModuleId) -> bool {
        if self.has_included(to, from) {
            let name = self.modules[to.index()].name().into_owned();
            self.report(
                from,
                src_index,
                Severity::Warning,
                format!("Circular include with '{name}'"),
                None,
            );
            return false;
        }
        self.modules[from.index()].includes.insert(to);
        true
    }

    /// Record "`from` depends on `to`". Self-edges are ignored.
    pub(crate) fn add_require(&mut self, from: ModuleId, to: ModuleId) {
        if from == to {
            return;
        }
        self.modules[from.index()].requires.insert(to);
    }

    /// Record "`to` is provided elsewhere for `from`". Self-edges are
    /// ignored.
    pub(crate) fn add_external(&mut self, from: ModuleId, to: ModuleId) {
        if from == to {
            return;
        }
        self.modules[from.index()].externals.insert(to);
    }

    /// Every module excluded from `id`'s closure: each direct external plus
    /// everything it transitively requires or excludes.
    pub fn all_externals(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        let externals: Vec<ModuleId> =
            self.modules[id.index()].externals.iter().copied().collect();
        for external in externals {
            self.collect_external(external, &mut seen, &mut out);
        }
        out
    }

    fn collect_external(
        &self,
        id: ModuleId,
        seen: &mut FxHashSet<ModuleId>,
        out: &mut Vec<ModuleId>,
    ) {
        if !seen.insert(id) {
            return;
        }
        out.push(id);
        let module = &self.modules[id.index()];
        for &dep in module.requires.iter().chain(module.externals.iter()) {
            self.collect_external(dep, seen, out);
        }
    }

    /// The emission order of `id`'s bundle: post-order over `requires` with
    /// the external closure excluded. `id` itself is last.
    pub fn all_requires(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut visited: FxHashSet<ModuleId> = self.all_externals(id).into_iter().collect();
        let mut out = Vec::new();
        self.visit_requires(id, &mut visited, &mut out);
        out
    }

    fn visit_requires(
        &self,
        id: ModuleId,
        visited: &mut FxHashSet<ModuleId>,
        out: &mut Vec<ModuleId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        for &dep in &self.modules[id.index()].requires {
            self.visit_requires(dep, visited, out);
        }
        out.push(id);
    }
}
