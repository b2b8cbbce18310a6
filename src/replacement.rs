//! Byte-interval edits against a module's original content.
//!
//! Replacements are kept ordered and strictly non-overlapping:
//! `prev.end <= next.start` for any two successive entries. An edit that
//! would overlap an existing entry is silently dropped, which is also how
//! edits inside an open hidden region are discarded.

use crate::module::ModuleId;

/// The value spliced in place of a replaced byte range.
#[derive(Debug, Clone)]
pub enum ReplacementData {
    /// Verbatim text.
    Literal(String),
    /// A URL (or URL-bearing statement) built at write time against the
    /// module that is being emitted.
    Deferred(DeferredUrl),
    /// Another module's patched content, spliced recursively.
    Inline(ModuleId),
}

/// How a deferred URL is rendered into the surrounding content.
#[derive(Debug, Clone)]
pub enum UrlEncoder {
    /// The URL text itself.
    Raw,
    /// A quoted string literal (JS strings, CSS url tokens).
    Quoted { quote: char },
    /// An HTML attribute value; entities are escaped, quotes are not added.
    Attr { quote: char },
    /// A `var <ident> = require("<url>")<member>;` prepend shim.
    ShimVar { ident: String, member: Option<String> },
}

/// A URL replacement whose final text depends on the module being written.
#[derive(Debug, Clone)]
pub struct DeferredUrl {
    /// The resolved target.
    pub module: ModuleId,
    /// Preserved `?query`, already stripped of consumed `__` markers.
    pub query: String,
    /// Preserved `#hash`.
    pub hash: String,
    /// The unaliased base when the alias table rewrote the URL.
    pub alias: Option<String>,
    /// False when the URL carried `?__postfix=0`.
    pub postfix: bool,
    /// Emit the target as a data URI instead of a link.
    pub inline: bool,
    /// The module the URL was discovered in; its `__postfix` override and
    /// URL options apply at write time.
    pub owner: ModuleId,
    pub encoder: UrlEncoder,
}

/// One byte-range edit. `start == end` is a pure insertion.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub data: ReplacementData,
}

/// The per-module ordered edit list, only mutable during `load()`.
#[derive(Debug)]
pub struct ReplacementStore {
    entries: Vec<Replacement>,
    content_len: usize,
    /// Nesting depth of hidden regions; only the outermost one owns an
    /// entry.
    hidden_depth: usize,
    /// Index of the open hidden-region entry.
    hidden_entry: usize,
}

impl ReplacementStore {
    pub fn new(content_len: usize) -> Self {
        Self { entries: Vec::new(), content_len, hidden_depth: 0, hidden_entry: 0 }
    }

    fn last_end(&self) -> usize {
        self.entries.last().map_or(0, |r| r.end)
    }

    /// Whether an edit over `start..end` would be accepted right now.
    pub fn accepts(&self, start: usize, end: usize) -> bool {
        debug_assert!(start <= end);
        if start >= self.last_end() {
            return true;
        }
        let mut i = self.entries.len();
        while i > 0 && self.entries[i - 1].start > start {
            i -= 1;
        }
        if i > 0 && start < self.entries[i - 1].end {
            return false;
        }
        if i < self.entries.len() && end > self.entries[i].start {
            return false;
        }
        true
    }

    /// Record an edit. Returns the insertion position, or `None` when the
    /// interval overlaps an existing entry (the edit is dropped).
    pub fn replace(
        &mut self,
        start: usize,
        end: usize,
        data: ReplacementData,
    ) -> Option<usize> {
        debug_assert!(start <= end, "replacement must not be inverted");
        debug_assert!(end <= self.content_len, "replacement past the end of content");
        if start >= self.last_end() {
            self.entries.push(Replacement { start, end, data });
            return Some(self.entries.len() - 1);
        }
        let mut i = self.entries.len();
        while i > 0 && self.entries[i - 1].start > start {
            i -= 1;
        }
        if i > 0 && start < self.entries[i - 1].end {
            return None;
        }
        if i < self.entries.len() && end > self.entries[i].start {
            return None;
        }
        self.entries.insert(i, Replacement { start, end, data });
        Some(i)
    }

    /// Record a pure insertion at `at`.
    pub fn insert(&mut self, at: usize, data: ReplacementData) -> Option<usize> {
        self.replace(at, at, data)
    }

    /// Open a hidden region at `at`. Nested opens share the outermost entry.
    ///
    /// The open entry uses the past-end sentinel `content_len + 1` so that
    /// every later edit is rejected until the region closes.
    pub fn begin_hidden_region(&mut self, at: usize) {
        self.hidden_depth += 1;
        if self.hidden_depth > 1 {
            return;
        }
        debug_assert!(at >= self.last_end(), "hidden region must open past existing edits");
        self.entries.push(Replacement {
            start: at,
            end: self.content_len + 1,
            data: ReplacementData::Literal(String::new()),
        });
        self.hidden_entry = self.entries.len() - 1;
    }

    /// Close the hidden region at `at`. Only the outermost close rewrites
    /// the sentinel end.
    pub fn end_hidden_region(&mut self, at: usize) {
        debug_assert!(self.hidden_depth > 0, "no hidden region to close");
        self.hidden_depth -= 1;
        if self.hidden_depth == 0 {
            debug_assert!(at >= self.entries[self.hidden_entry].start);
            self.entries[self.hidden_entry].end = at;
        }
    }

    pub fn in_hidden_region(&self) -> bool {
        self.hidden_depth > 0
    }

    /// Finish the edit list. A still-open hidden region is closed at the end
    /// of the content.
    pub fn into_entries(mut self) -> Vec<Replacement> {
        if self.hidden_depth > 0 {
            self.hidden_depth = 1;
            self.end_hidden_region(self.content_len);
        }
        self.entries
    }
}

#[cfg(test)]
mod test {
    use super::{ReplacementData, ReplacementStore};

    fn literal(text: &str) -> ReplacementData {
        ReplacementData::Literal(text.to_string())
    }

    fn spans(store: &ReplacementStore) -> Vec<(usize, usize)> {
        store.entries.iter().map(|r| (r.start, r.end)).collect()
    }

    #[test]
    fn append_in_order() {
        let mut store = ReplacementStore::new(100);
        assert_eq!(store.replace(0, 5, literal("a")), Some(0));
        assert_eq!(store.replace(5, 10, literal("b")), Some(1));
        assert_eq!(store.replace(20, 30, literal("c")), Some(2));
        assert_eq!(spans(&store), vec![(0, 5), (5, 10), (20, 30)]);
    }

    #[test]
    fn out_of_order_insert() {
        let mut store = ReplacementStore::new(100);
        store.replace(20, 30, literal("b"));
        assert_eq!(store.replace(0, 5, literal("a")), Some(0));
        assert_eq!(spans(&store), vec![(0, 5), (20, 30)]);
    }

    #[test]
    fn overlap_is_rejected() {
        let mut store = ReplacementStore::new(100);
        store.replace(10, 20, literal("a"));
        assert_eq!(store.replace(15, 25, literal("b")), None);
        assert_eq!(store.replace(5, 11, literal("c")), None);
        assert_eq!(store.replace(10, 20, literal("d")), None);
        // state unchanged
        assert_eq!(spans(&store), vec![(10, 20)]);
        // touching boundaries are fine
        assert_eq!(store.replace(20, 25, literal("e")), Some(1));
        assert_eq!(store.replace(5, 10, literal("f")), Some(0));
    }

    #[test]
    fn zero_width_insertions() {
        let mut store = ReplacementStore::new(100);
        // The #include discipline: insertion at the directive start, then
        // the comment deletion starting at the same index.
        assert_eq!(store.insert(10, literal("included")), Some(0));
        assert_eq!(store.replace(10, 30, literal("")), Some(1));
        assert_eq!(spans(&store), vec![(10, 10), (10, 30)]);

        // prepend shims all land at index 0, in discovery order
        assert_eq!(store.insert(0, literal("one")), Some(0));
        assert_eq!(store.insert(0, literal("two")), Some(1));
    }

    #[test]
    fn zero_width_inside_range_rejected() {
        let mut store = ReplacementStore::new(100);
        store.replace(10, 20, literal("a"));
        assert_eq!(store.insert(15, literal("x")), None);
    }

    #[test]
    fn hidden_region() {
        let mut store = ReplacementStore::new(50);
        store.replace(0, 4, literal("head"));
        store.begin_hidden_region(10);
        // edits inside the open region are dropped
        assert_eq!(store.replace(12, 14, literal("x")), None);
        assert!(store.in_hidden_region());
        store.end_hidden_region(20);
        assert!(!store.in_hidden_region());
        // edits after the closed region work again
        assert_eq!(store.replace(20, 25, literal("tail")), Some(2));
        assert_eq!(spans(&store), vec![(0, 4), (10, 20), (20, 25)]);
    }

    #[test]
    fn nested_hidden_regions_share_the_outermost_entry() {
        let mut store = ReplacementStore::new(50);
        store.begin_hidden_region(5);
        store.begin_hidden_region(10);
        store.end_hidden_region(15);
        assert!(store.in_hidden_region());
        store.end_hidden_region(30);
        assert_eq!(spans(&store), vec![(5, 30)]);
    }

    #[test]
    fn open_region_closed_at_content_end() {
        let mut store = ReplacementStore::new(50);
        store.begin_hidden_region(5);
        let entries = store.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!((entries[0].start, entries[0].end), (5, 50));
    }
}
