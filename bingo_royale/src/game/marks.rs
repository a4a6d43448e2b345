use std::collections::{BTreeSet, btree_set};

use super::mode::GameMode;

/// Marked cells of a card, as flattened row-major indices.
///
/// In 75-ball mode the free centre is always marked and survives both
/// [`MarkSet::remove`] and [`MarkSet::clear`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarkSet {
    marked: BTreeSet<usize>,
    free_index: Option<usize>,
}

impl MarkSet {
    pub fn new(mode: GameMode) -> Self {
        let free_index = mode.free_index();
        Self {
            marked: free_index.into_iter().collect(),
            free_index,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.marked.contains(&index)
    }

    /// Returns `true` if the index was not already marked.
    pub fn insert(&mut self, index: usize) -> bool {
        self.marked.insert(index)
    }

    /// Returns `true` if the index was marked and is now unmarked.
    pub fn remove(&mut self, index: usize) -> bool {
        if Some(index) == self.free_index {
            return false;
        }
        self.marked.remove(&index)
    }

    /// Flip an index, returning whether it is marked afterwards.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.contains(index) {
            !self.remove(index)
        } else {
            self.insert(index)
        }
    }

    /// Drop every mark except the free centre.
    pub fn clear(&mut self) {
        self.marked.clear();
        self.marked.extend(self.free_index);
    }

    pub fn contains_all(&self, indices: &[usize]) -> bool {
        indices.iter().all(|index| self.marked.contains(index))
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, usize> {
        self.marked.iter()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.marked.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a MarkSet {
    type Item = &'a usize;
    type IntoIter = btree_set::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_starts_with_free_space() {
        let marks = MarkSet::new(GameMode::Classic75);
        assert!(marks.contains(12));
        assert_eq!(marks.len(), 1);
    }

    #[test]
    fn test_european_starts_empty() {
        let marks = MarkSet::new(GameMode::European90);
        assert!(marks.is_empty());
    }

    #[test]
    fn test_free_space_cannot_be_removed() {
        let mut marks = MarkSet::new(GameMode::Classic75);
        assert!(!marks.remove(12));
        assert!(marks.toggle(12));
        assert!(marks.contains(12));
    }

    #[test]
    fn test_toggle() {
        let mut marks = MarkSet::new(GameMode::European90);
        assert!(marks.toggle(4));
        assert!(marks.contains(4));
        assert!(!marks.toggle(4));
        assert!(!marks.contains(4));
    }

    #[test]
    fn test_clear_keeps_free_space() {
        let mut marks = MarkSet::new(GameMode::Classic75);
        marks.insert(0);
        marks.insert(24);
        marks.clear();
        assert_eq!(marks.to_vec(), vec![12]);
    }

    #[test]
    fn test_contains_all() {
        let mut marks = MarkSet::new(GameMode::Classic75);
        for index in [10, 11, 13, 14] {
            marks.insert(index);
        }
        assert!(marks.contains_all(&[10, 11, 12, 13, 14]));
        assert!(!marks.contains_all(&[0, 1, 2, 3, 4]));
    }
}
