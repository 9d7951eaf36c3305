//! Union-find over integer labels.
//!
//! The parent table is an arena indexed directly by label; index 0 is background
//! and always maps to itself. Union always makes the numerically smaller root the
//! representative, so the final root of every class is its smallest label no
//! matter in which order unions happen.

/// Sequential union-find with path compression and smallest-label-wins union.
#[derive(Debug, Clone)]
pub struct LabelUnionFind {
    parent: Vec<u32>,
}

impl Default for LabelUnionFind {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelUnionFind {
    /// Empty table holding only the background label.
    pub fn new() -> Self {
        Self { parent: vec![0] }
    }

    /// Identity table for labels `0..=label_count`.
    pub fn with_labels(label_count: u32) -> Self {
        Self {
            parent: (0..=label_count).collect(),
        }
    }

    /// Number of labels, excluding background.
    #[inline]
    pub fn label_count(&self) -> u32 {
        (self.parent.len() - 1) as u32
    }

    /// Allocate a fresh singleton label.
    #[inline]
    pub fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    /// Find root with iterative path compression (two-pass).
    #[inline]
    pub fn find(&mut self, label: u32) -> u32 {
        // First pass: find root
        let mut root = label;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        // Second pass: compress path
        let mut current = label;
        while current != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }

        root
    }

    /// Merge the classes of `a` and `b`; returns the surviving root.
    #[inline]
    pub fn union(&mut self, a: u32, b: u32) -> u32 {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return root_a;
        }
        let (smaller, larger) = if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[larger as usize] = smaller;
        smaller
    }

    /// Resolve every label to its root and return the table as a lookup table.
    ///
    /// Afterwards `lut[l]` is the canonical label of `l` and `lut[lut[l]] == lut[l]`.
    pub fn into_lut(mut self) -> Vec<u32> {
        for label in 1..self.parent.len() as u32 {
            let parent = self.parent[label as usize];
            // Roots are always smaller than their members, so the parent's
            // entry is already final when visited in increasing order.
            self.parent[label as usize] = self.parent[parent as usize];
        }
        self.parent
    }

    /// Map every class to a dense label `1..=n`, numbered by smallest member.
    ///
    /// Returns the mapping (indexed by label) and `n`.
    pub fn into_dense_lut(self) -> (Vec<u32>, u32) {
        let mut lut = self.into_lut();
        let mut next = 0u32;
        for label in 1..lut.len() {
            let root = lut[label] as usize;
            if root == label {
                next += 1;
                lut[label] = next;
            } else {
                // The root precedes the label and was renumbered already.
                lut[label] = lut[root];
            }
        }
        (lut, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_table() {
        let uf = LabelUnionFind::with_labels(4);
        assert_eq!(uf.label_count(), 4);
        assert_eq!(uf.into_lut(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_smaller_label_wins() {
        let mut uf = LabelUnionFind::with_labels(5);
        assert_eq!(uf.union(5, 3), 3);
        assert_eq!(uf.union(2, 5), 2);
        assert_eq!(uf.find(3), 2);
        assert_eq!(uf.find(5), 2);
        assert_eq!(uf.find(4), 4);
    }

    #[test]
    fn test_find_is_idempotent() {
        let mut uf = LabelUnionFind::with_labels(8);
        uf.union(8, 7);
        uf.union(7, 6);
        uf.union(6, 2);
        for label in 0..=8 {
            let once = uf.find(label);
            assert_eq!(uf.find(once), once);
        }
    }

    #[test]
    fn test_lut_is_fixed_point() {
        let mut uf = LabelUnionFind::with_labels(10);
        uf.union(10, 9);
        uf.union(9, 4);
        uf.union(7, 2);
        uf.union(2, 9);
        let lut = uf.into_lut();
        for label in 0..lut.len() {
            let canonical = lut[label] as usize;
            assert_eq!(lut[canonical] as usize, canonical);
            assert!(canonical <= label);
        }
        assert_eq!(lut[10], 2);
        assert_eq!(lut[4], 2);
        assert_eq!(lut[5], 5);
    }

    #[test]
    fn test_union_order_does_not_change_roots() {
        let pairs = [(9u32, 3u32), (3, 7), (1, 8), (8, 6), (6, 2), (5, 9)];

        let mut forward = LabelUnionFind::with_labels(9);
        for &(a, b) in &pairs {
            forward.union(a, b);
        }
        let mut backward = LabelUnionFind::with_labels(9);
        for &(a, b) in pairs.iter().rev() {
            backward.union(b, a);
        }
        assert_eq!(forward.into_lut(), backward.into_lut());
    }

    #[test]
    fn test_make_set_and_dense_lut() {
        let mut uf = LabelUnionFind::new();
        let a = uf.make_set();
        let b = uf.make_set();
        let c = uf.make_set();
        let d = uf.make_set();
        assert_eq!((a, b, c, d), (1, 2, 3, 4));
        uf.union(d, b);

        let (lut, count) = uf.into_dense_lut();
        assert_eq!(count, 3);
        assert_eq!(lut, vec![0, 1, 2, 3, 2]);
    }

    #[test]
    fn test_background_never_moves() {
        let mut uf = LabelUnionFind::with_labels(3);
        uf.union(1, 2);
        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.into_lut()[0], 0);
    }
}
