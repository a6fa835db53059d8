//! Dynamic disjoint-set over non-negative `i32` object labels (spec.md §4.11, §C11)
//!
//! Label 0 is background by convention elsewhere in the stitcher, but the
//! union-find itself treats every non-negative label uniformly — it has
//! no notion of background. `parent` grows on demand so a label seen for
//! the first time is its own base without any preallocation step. `union`
//! always joins the larger label's base towards the smaller one, which
//! makes the tiebreak deterministic and keeps `find_base` converging on
//! the lowest label in any equivalence class.

use log::trace;

/// Dynamic union-find keyed by non-negative `i32` labels.
///
/// `union`/`find_base` are safe to call at any time but are not meant to
/// be called concurrently with each other (single-writer, per spec.md §5).
/// `resolve_all_bases` flattens the forest so `parent_or_self` becomes a
/// lock-free O(1) read safe for concurrent callers afterwards.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: Vec<i32>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self { parent: Vec::new() }
    }

    /// Labels in `[0, len())` have been touched by a prior `union`/`ensure`;
    /// labels beyond this are implicitly their own base.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Grows `parent` so that index `label` is valid, initializing any new
    /// slot to be its own base (`parent[i] = i`).
    fn ensure(&mut self, label: i32) {
        let needed = label as usize + 1;
        if self.parent.len() < needed {
            let start = self.parent.len();
            self.parent.reserve(needed - start);
            for i in start..needed {
                self.parent.push(i as i32);
            }
        }
    }

    /// Path-compressing find: walks to the root, then rewrites every
    /// visited node's parent to point directly at it.
    pub fn find_base(&mut self, x: i32) -> i32 {
        if x as usize >= self.parent.len() {
            return x;
        }
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    /// Joins the equivalence classes of `a` and `b`. Deterministic tiebreak:
    /// the larger base's parent is set to the smaller, so the canonical
    /// label of any class is always its numerically smallest member.
    pub fn union(&mut self, a: i32, b: i32) {
        self.ensure(a.max(b));
        let base_a = self.find_base(a);
        let base_b = self.find_base(b);
        if base_a == base_b {
            return;
        }
        let (smaller, larger) = if base_a < base_b { (base_a, base_b) } else { (base_b, base_a) };
        self.parent[larger as usize] = smaller;
        trace!("union({}, {}): base {} now points to {}", a, b, larger, smaller);
    }

    /// Flattens every `parent[i]` for `i < len()` to point directly at its
    /// root, so that `parent_or_self` becomes a valid lock-free read.
    /// Must be called (and must complete) before any concurrent
    /// `parent_or_self` access, per spec.md §4.11/§5.
    pub fn resolve_all_bases(&mut self) {
        for i in 0..self.parent.len() as i32 {
            let base = self.find_base(i);
            self.parent[i as usize] = base;
        }
    }

    /// Lock-free O(1) canonical-label lookup. Only valid after
    /// `resolve_all_bases` has fully flattened the forest — calling this
    /// before that leaves stale intermediate parents visible.
    pub fn parent_or_self(&self, x: i32) -> i32 {
        if (x as usize) < self.parent.len() {
            self.parent[x as usize]
        } else {
            x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_chain_resolves_to_smallest_label() {
        // Scenario C: union(3,5), union(5,7), union(2,7), find_base(3) -> 2
        let mut uf = UnionFind::new();
        uf.union(3, 5);
        uf.union(5, 7);
        uf.union(2, 7);
        assert_eq!(uf.find_base(3), 2);
    }

    #[test]
    fn parent_or_self_matches_find_base_after_resolve() {
        let mut uf = UnionFind::new();
        uf.union(3, 5);
        uf.union(5, 7);
        uf.union(2, 7);
        uf.resolve_all_bases();
        assert_eq!(uf.parent_or_self(3), uf.find_base(3));
        assert_eq!(uf.parent_or_self(3), 2);
    }

    #[test]
    fn unseen_label_is_its_own_base() {
        let mut uf = UnionFind::new();
        assert_eq!(uf.find_base(42), 42);
        assert_eq!(uf.parent_or_self(42), 42);
    }

    #[test]
    fn union_is_idempotent_for_already_joined_labels() {
        let mut uf = UnionFind::new();
        uf.union(1, 2);
        uf.union(1, 2);
        assert_eq!(uf.find_base(1), uf.find_base(2));
    }

    #[test]
    fn resolve_all_bases_flattens_every_touched_label() {
        let mut uf = UnionFind::new();
        uf.union(0, 1);
        uf.union(1, 2);
        uf.union(2, 3);
        uf.resolve_all_bases();
        for i in 0..uf.len() as i32 {
            assert_eq!(uf.parent_or_self(i), 0);
        }
    }
}
