//! Positional reconciliation of published image lists.
//!
//! Infinite-scroll pages keep growing and recycling elements, so every pass
//! samples a list that overlaps the previous one only partly. [`combine`]
//! patches the previous list instead of replacing it, keeping the viewer's
//! position stable.
//!
//! # Algorithm
//!
//! A single forward pass over the new list with a cursor into the old one.
//! A new entry is an *anchor* when it appears in the old list at or after
//! the cursor and has not been emitted yet. On each anchor at old index `i`:
//!
//! 1. old entries between the cursor and `i` are emitted verbatim
//! 2. the pending run of new entries up to and including the anchor follows
//! 3. the cursor moves to `i + 1`
//!
//! Afterwards the old tail is emitted, then any trailing new run that never
//! met an anchor. Entries are unique by URL (first occurrence wins) and
//! empty URLs are dropped.
//!
//! ```text
//! old: [a, b, c, d]    new: [b, c, x, d]    merged: [a, b, c, x, d]
//! old: [a, b]          new: [x, y]          merged: [a, b, x, y]
//! ```

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};

use crate::scan::{ImageEntry, OrderedList};

// ============================================================================
// Merge
// ============================================================================

/// Merges a freshly sorted list into the previously published one.
#[must_use]
pub fn combine(new: &[ImageEntry], old: &[ImageEntry]) -> OrderedList {
    let mut old_index: FxHashMap<&str, usize> = FxHashMap::default();
    for (i, entry) in old.iter().enumerate() {
        old_index.entry(entry.url.as_str()).or_insert(i);
    }

    let mut out = Output::with_capacity(new.len() + old.len());
    let mut cursor = 0;
    let mut left = 0;

    for (right, entry) in new.iter().enumerate() {
        if entry.url.is_empty() {
            continue;
        }
        let anchor = old_index
            .get(entry.url.as_str())
            .copied()
            .filter(|&i| i >= cursor && !out.contains(&entry.url));
        let Some(i) = anchor else {
            continue;
        };

        out.extend(&old[cursor..i]);
        out.extend(&new[left..=right]);
        cursor = i + 1;
        left = right + 1;
    }

    out.extend(&old[cursor..]);
    out.extend(&new[left..]);
    out.into_list()
}

/// Position of the entry whose image URL is `url`.
#[must_use]
pub fn index_of(list: &[ImageEntry], url: &str) -> Option<usize> {
    list.iter().position(|entry| entry.url == url)
}

// ============================================================================
// Output
// ============================================================================

/// Merge output that keeps first occurrences only.
struct Output {
    list: OrderedList,
    placed: FxHashSet<String>,
}

impl Output {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
            placed: FxHashSet::default(),
        }
    }

    fn contains(&self, url: &str) -> bool {
        self.placed.contains(url)
    }

    fn extend(&mut self, entries: &[ImageEntry]) {
        for entry in entries {
            if !entry.url.is_empty() && self.placed.insert(entry.url.clone()) {
                self.list.push(entry.clone());
            }
        }
    }

    fn into_list(self) -> OrderedList {
        self.list
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn list(urls: &[&str]) -> OrderedList {
        urls.iter().map(|&url| ImageEntry::new(url)).collect()
    }

    fn urls(list: &[ImageEntry]) -> Vec<&str> {
        list.iter().map(|e| e.url.as_str()).collect()
    }

    #[test]
    fn test_insert_before_new_neighbour() {
        let merged = combine(&list(&["b", "c", "x", "d"]), &list(&["a", "b", "c", "d"]));
        assert_eq!(urls(&merged), vec!["a", "b", "c", "x", "d"]);
    }

    #[test]
    fn test_disjoint_lists_append() {
        let merged = combine(&list(&["x", "y"]), &list(&["a", "b"]));
        assert_eq!(urls(&merged), vec!["a", "b", "x", "y"]);
    }

    #[test]
    fn test_scrolled_window() {
        // The page recycled a, b and loaded e, f below.
        let merged = combine(&list(&["c", "d", "e", "f"]), &list(&["a", "b", "c", "d"]));
        assert_eq!(urls(&merged), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_run_before_first_anchor() {
        let merged = combine(&list(&["x", "y", "b"]), &list(&["a", "b", "c"]));
        assert_eq!(urls(&merged), vec!["a", "x", "y", "b", "c"]);
    }

    #[test]
    fn test_reordered_anchor_is_not_reused() {
        // d anchors first, so b (behind the cursor) becomes part of the next run.
        let merged = combine(&list(&["d", "b", "e"]), &list(&["a", "b", "c", "d"]));
        assert_eq!(urls(&merged), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(combine(&[], &[]).is_empty());
        assert_eq!(urls(&combine(&list(&["a"]), &[])), vec!["a"]);
        assert_eq!(urls(&combine(&[], &list(&["a"]))), vec!["a"]);
    }

    #[test]
    fn test_duplicates_and_empty_entries_are_dropped() {
        let merged = combine(&list(&["x", "", "x", "a"]), &list(&["a", "a", ""]));
        assert_eq!(urls(&merged), vec!["x", "a"]);
    }

    #[test]
    fn test_frame_entries_keep_their_frame() {
        let framed = ImageEntry::framed("f.jpg", "https://f.test/embed");
        let merged = combine(&[framed.clone()], &list(&["a"]));
        assert_eq!(merged, vec![ImageEntry::new("a"), framed]);
    }

    #[test]
    fn test_index_of() {
        let l = list(&["a", "b"]);
        assert_eq!(index_of(&l, "b"), Some(1));
        assert_eq!(index_of(&l, "z"), None);
    }

    fn unique(urls: Vec<String>) -> OrderedList {
        let mut seen = FxHashSet::default();
        urls.into_iter()
            .filter(|u| seen.insert(u.clone()))
            .map(ImageEntry::new)
            .collect()
    }

    proptest! {
        #[test]
        fn prop_merge_identity(raw in prop::collection::vec("[a-j]{1,2}", 0..16)) {
            let l = unique(raw);
            prop_assert_eq!(combine(&l, &l), l);
        }

        #[test]
        fn prop_merge_totality(
            new in prop::collection::vec("[a-h]", 0..12),
            old in prop::collection::vec("[a-h]", 0..12),
        ) {
            let new = unique(new);
            let old = unique(old);
            let merged = combine(&new, &old);

            let merged_urls: FxHashSet<&str> = merged.iter().map(|e| e.url.as_str()).collect();
            prop_assert_eq!(merged_urls.len(), merged.len());

            let expected: FxHashSet<&str> =
                new.iter().chain(old.iter()).map(|e| e.url.as_str()).collect();
            prop_assert_eq!(merged_urls, expected);
        }

        #[test]
        fn prop_old_order_is_preserved(
            new in prop::collection::vec("[a-h]", 0..12),
            old in prop::collection::vec("[a-h]", 0..12),
        ) {
            let new = unique(new);
            let old = unique(old);
            let merged = combine(&new, &old);

            // Old entries absent from the new list keep their relative order.
            let kept: Vec<&str> = old
                .iter()
                .filter(|e| index_of(&new, &e.url).is_none())
                .map(|e| e.url.as_str())
                .collect();
            let in_merged: Vec<&str> = merged
                .iter()
                .filter(|e| kept.contains(&e.url.as_str()))
                .map(|e| e.url.as_str())
                .collect();
            prop_assert_eq!(in_merged, kept);
        }
    }
}
