//! The dictionary: deduplicated string storage shared by a [`crate::Context`].
//!
//! Converts heap-allocated strings into cheap integer handles ([`Symbol`]).
//! Comparing two symbols is O(1) integer comparison. The interner's own
//! algorithmic behavior (hashing, growth policy) is an implementation detail;
//! only `insert`/`remove`/`find` are part of the dictionary contract other
//! components rely on.

use std::collections::HashMap;

/// A lightweight handle to an interned string.
///
/// Comparing two symbols is O(1). Symbols are ordered by insertion order,
/// not lexicographically — use `Interner::resolve` if you need string
/// ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw index for serialization/debugging.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create a Symbol from a raw index. Use only for deserialization.
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

/// String interner (the "dictionary"). Deduplicates strings and returns
/// cheap `Symbol` handles; refcounts entries so a caller-visible `remove`
/// can drop a string once nothing else references it.
#[derive(Debug, Clone, Default)]
pub struct Interner {
    map: HashMap<String, Symbol>,
    strings: Vec<Option<String>>,
    refcounts: Vec<u32>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a string, returning its Symbol and bumping its refcount.
    /// If the string was already interned, returns the existing Symbol.
    pub fn insert(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            self.refcounts[sym.0 as usize] += 1;
            return sym;
        }

        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(Some(s.to_owned()));
        self.refcounts.push(1);
        self.map.insert(s.to_owned(), sym);
        sym
    }

    /// Alias of [`Interner::insert`] kept for call sites that read more
    /// naturally as "intern this text".
    #[inline]
    pub fn intern(&mut self, s: &str) -> Symbol {
        self.insert(s)
    }

    /// Decrement a symbol's refcount, freeing its backing string once it
    /// reaches zero. A double-free (refcount already zero) is a no-op: the
    /// dictionary's own accounting is an internal contract, not something
    /// callers must track precisely.
    pub fn remove(&mut self, sym: Symbol) {
        let Some(count) = self.refcounts.get_mut(sym.0 as usize) else {
            return;
        };
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            if let Some(s) = self.strings[sym.0 as usize].take() {
                self.map.remove(&s);
            }
        }
    }

    /// Look up a string's Symbol without inserting it.
    pub fn find(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// Resolve a Symbol back to its string.
    ///
    /// # Panics
    /// Panics if the symbol was not created by this interner or has since
    /// been fully removed.
    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.strings[sym.0 as usize]
            .as_deref()
            .expect("symbol resolved after its dictionary entry was removed")
    }

    /// Try to resolve a Symbol, returning None if invalid or removed.
    #[inline]
    pub fn try_resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.0 as usize).and_then(|s| s.as_deref())
    }

    /// Number of live interned strings.
    #[inline]
    pub fn len(&self) -> usize {
        self.refcounts.iter().filter(|&&c| c > 0).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all live interned strings with their symbols.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> {
        self.strings
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|s| (Symbol(i as u32), s)))
    }

    /// Emit as binary format blob and offset table, for the snapshot format.
    ///
    /// Returns (concatenated UTF-8 bytes, offset for each live string in
    /// storage order + sentinel). Removed slots are emitted as empty spans
    /// so that symbol indices stay stable across a dump/reload round trip.
    pub fn to_blob(&self) -> (Vec<u8>, Vec<u32>) {
        let mut blob = Vec::new();
        let mut offsets = Vec::with_capacity(self.strings.len() + 1);

        for s in &self.strings {
            offsets.push(blob.len() as u32);
            if let Some(s) = s {
                blob.extend_from_slice(s.as_bytes());
            }
        }
        offsets.push(blob.len() as u32);

        (blob, offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_dedups_and_resolves() {
        let mut dict = Interner::new();
        let a = dict.insert("foo");
        let b = dict.insert("foo");
        let c = dict.insert("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(dict.resolve(a), "foo");
        assert_eq!(dict.resolve(c), "bar");
    }

    #[test]
    fn find_does_not_insert() {
        let mut dict = Interner::new();
        assert_eq!(dict.find("foo"), None);
        let sym = dict.insert("foo");
        assert_eq!(dict.find("foo"), Some(sym));
    }

    #[test]
    fn remove_frees_after_refcount_reaches_zero() {
        let mut dict = Interner::new();
        let a = dict.insert("foo");
        dict.insert("foo"); // refcount 2
        dict.remove(a);
        assert_eq!(dict.try_resolve(a), Some("foo"));
        dict.remove(a);
        assert_eq!(dict.try_resolve(a), None);
        assert_eq!(dict.find("foo"), None);
    }

    #[test]
    fn to_blob_round_trips_offsets() {
        let mut dict = Interner::new();
        let a = dict.insert("foo");
        let b = dict.insert("barbaz");
        let (blob, offsets) = dict.to_blob();
        let a_span = offsets[a.as_u32() as usize]..offsets[a.as_u32() as usize + 1];
        let b_span = offsets[b.as_u32() as usize]..offsets[b.as_u32() as usize + 1];
        assert_eq!(&blob[a_span], b"foo");
        assert_eq!(&blob[b_span], b"barbaz");
    }
}
