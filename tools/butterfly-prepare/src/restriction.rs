//! Turn restriction index
//!
//! Restrictions are grouped by their approach `(from, via)` into buckets of
//! `{target, is_only}` entries. A bucket holds either forbidden targets or a
//! single mandatory ("only") target, never both:
//!
//! - inserting an only-entry replaces the whole bucket
//! - a forbidden target arriving after an only-entry is dropped, since the
//!   only-entry already forbids every other continuation
//!
//! Every lookup first checks the via-node set, which is small compared to the
//! node count, so unrestricted junctions cost one hash probe.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::types::NodeId;

/// A turn restriction `from -> via -> to` in internal node ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnRestriction {
    pub via: NodeId,
    pub from: NodeId,
    pub to: NodeId,
    pub is_only: bool,
}

impl TurnRestriction {
    pub fn no_turn(from: NodeId, via: NodeId, to: NodeId) -> Self {
        Self {
            via,
            from,
            to,
            is_only: false,
        }
    }

    pub fn only_turn(from: NodeId, via: NodeId, to: NodeId) -> Self {
        Self {
            via,
            from,
            to,
            is_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionTarget {
    pub target: NodeId,
    pub is_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RestrictionMap {
    buckets: Vec<Vec<RestrictionTarget>>,
    /// (from, via) -> bucket index
    index: FxHashMap<(NodeId, NodeId), usize>,
    /// via -> every `from` with a bucket at that via node
    sources_by_via: FxHashMap<NodeId, Vec<NodeId>>,
    via_nodes: FxHashSet<NodeId>,
    start_nodes: FxHashSet<NodeId>,
}

impl RestrictionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_restrictions(restrictions: &[TurnRestriction]) -> Self {
        let mut map = Self::new();
        let mut ignored = 0usize;
        for restriction in restrictions {
            if !map.insert(*restriction) {
                ignored += 1;
            }
        }
        debug!(
            restrictions = restrictions.len(),
            buckets = map.buckets.len(),
            ignored,
            "Built restriction map"
        );
        map
    }

    /// Add a restriction under the bucket policy.
    ///
    /// Returns false when the restriction was redundant or overridden by an
    /// existing only-entry.
    pub fn insert(&mut self, restriction: TurnRestriction) -> bool {
        let TurnRestriction {
            via,
            from,
            to,
            is_only,
        } = restriction;
        self.via_nodes.insert(via);
        self.start_nodes.insert(from);
        let bucket = self.bucket_index_or_create(from, via);
        Self::merge_into(&mut self.buckets[bucket], RestrictionTarget { target: to, is_only })
    }

    fn bucket_index_or_create(&mut self, from: NodeId, via: NodeId) -> usize {
        if let Some(&index) = self.index.get(&(from, via)) {
            return index;
        }
        let index = self.buckets.len();
        self.buckets.push(Vec::new());
        self.index.insert((from, via), index);
        self.sources_by_via.entry(via).or_default().push(from);
        index
    }

    fn merge_into(bucket: &mut Vec<RestrictionTarget>, entry: RestrictionTarget) -> bool {
        if entry.is_only {
            if bucket.len() == 1 && bucket[0] == entry {
                return false;
            }
            bucket.clear();
            bucket.push(entry);
            return true;
        }
        if bucket.iter().any(|t| t.is_only || t.target == entry.target) {
            return false;
        }
        bucket.push(entry);
        true
    }

    fn bucket(&self, from: NodeId, via: NodeId) -> Option<&[RestrictionTarget]> {
        if !self.via_nodes.contains(&via) {
            return None;
        }
        self.index
            .get(&(from, via))
            .map(|&i| self.buckets[i].as_slice())
    }

    /// Mandatory continuation when approaching `v` from `u`
    pub fn check_for_emanating_is_only_turn(&self, u: NodeId, v: NodeId) -> Option<NodeId> {
        self.bucket(u, v)?
            .iter()
            .find(|t| t.is_only)
            .map(|t| t.target)
    }

    /// Whether `u -> v -> w` is explicitly forbidden
    ///
    /// Only-entries are not considered here; use
    /// `check_for_emanating_is_only_turn` for those.
    pub fn check_if_turn_is_restricted(&self, u: NodeId, v: NodeId, w: NodeId) -> bool {
        self.bucket(u, v)
            .is_some_and(|bucket| bucket.iter().any(|t| !t.is_only && t.target == w))
    }

    pub fn is_via_node(&self, node: NodeId) -> bool {
        self.via_nodes.contains(&node)
    }

    /// Whether `node` starts the approach of some restriction
    pub fn is_source_node(&self, node: NodeId) -> bool {
        self.start_nodes.contains(&node)
    }

    /// Number of stored restriction entries
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Current restrictions, in bucket creation order
    pub fn restrictions(&self) -> impl Iterator<Item = TurnRestriction> + '_ {
        let mut keys: Vec<_> = self.index.iter().map(|(&key, &i)| (i, key)).collect();
        keys.sort_unstable();
        keys.into_iter().flat_map(move |(i, (from, via))| {
            self.buckets[i].iter().map(move |t| TurnRestriction {
                via,
                from,
                to: t.target,
                is_only: t.is_only,
            })
        })
    }

    /// Node `v` between `u` and `w` is being removed: approaches `v -> w`
    /// become `u -> w`.
    ///
    /// Must run before the graph edge is rewired.
    pub fn fixup_starting_turn_restriction(&mut self, u: NodeId, v: NodeId, w: NodeId) {
        if !self.start_nodes.contains(&v) {
            return;
        }
        let Some(old) = self.index.remove(&(v, w)) else {
            return;
        };
        if let Some(sources) = self.sources_by_via.get_mut(&w) {
            sources.retain(|&s| s != v);
        }

        self.start_nodes.insert(u);
        match self.index.get(&(u, w)) {
            Some(&existing) => {
                let moved = std::mem::take(&mut self.buckets[old]);
                for entry in moved {
                    Self::merge_into(&mut self.buckets[existing], entry);
                }
            }
            None => {
                self.index.insert((u, w), old);
                self.sources_by_via.entry(w).or_default().push(u);
            }
        }
    }

    /// Node `v` between `u` and `w` is being removed: restrictions that arrive
    /// at `u` and continue to `v` now continue to `w`.
    ///
    /// Must run before the graph edge is rewired.
    pub fn fixup_arriving_turn_restriction(&mut self, u: NodeId, v: NodeId, w: NodeId) {
        if !self.via_nodes.contains(&u) {
            return;
        }
        let Some(sources) = self.sources_by_via.get(&u) else {
            return;
        };
        for &x in sources {
            if x == v {
                continue;
            }
            let Some(&i) = self.index.get(&(x, u)) else {
                continue;
            };
            for entry in &mut self.buckets[i] {
                if entry.target == v {
                    entry.target = w;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_turns() {
        let map = RestrictionMap::from_restrictions(&[
            TurnRestriction::no_turn(0, 1, 2),
            TurnRestriction::no_turn(0, 1, 3),
        ]);
        assert!(map.is_via_node(1));
        assert!(!map.is_via_node(0));
        assert!(map.is_source_node(0));
        assert!(map.check_if_turn_is_restricted(0, 1, 2));
        assert!(map.check_if_turn_is_restricted(0, 1, 3));
        assert!(!map.check_if_turn_is_restricted(0, 1, 4));
        assert!(!map.check_if_turn_is_restricted(4, 1, 2));
        assert_eq!(map.check_for_emanating_is_only_turn(0, 1), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_only_turn_clears_bucket() {
        let mut map = RestrictionMap::new();
        assert!(map.insert(TurnRestriction::no_turn(0, 1, 2)));
        assert!(map.insert(TurnRestriction::only_turn(0, 1, 3)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.check_for_emanating_is_only_turn(0, 1), Some(3));
        assert!(!map.check_if_turn_is_restricted(0, 1, 2));
    }

    #[test]
    fn test_latest_only_turn_wins() {
        let mut map = RestrictionMap::new();
        map.insert(TurnRestriction::only_turn(0, 1, 2));
        map.insert(TurnRestriction::only_turn(0, 1, 3));
        assert_eq!(map.check_for_emanating_is_only_turn(0, 1), Some(3));
        let only_entries = map.restrictions().filter(|r| r.is_only).count();
        assert_eq!(only_entries, 1);
    }

    #[test]
    fn test_no_turn_after_only_turn_is_dropped() {
        let mut map = RestrictionMap::new();
        map.insert(TurnRestriction::only_turn(0, 1, 3));
        assert!(!map.insert(TurnRestriction::no_turn(0, 1, 2)));
        assert!(!map.insert(TurnRestriction::no_turn(0, 1, 2)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.check_for_emanating_is_only_turn(0, 1), Some(3));
    }

    #[test]
    fn test_only_turn_exclusivity_under_any_sequence() {
        let sequence = [
            TurnRestriction::no_turn(5, 6, 1),
            TurnRestriction::only_turn(5, 6, 2),
            TurnRestriction::no_turn(5, 6, 3),
            TurnRestriction::only_turn(5, 6, 4),
            TurnRestriction::no_turn(5, 6, 1),
        ];
        let mut map = RestrictionMap::new();
        for r in sequence {
            map.insert(r);
            let only: Vec<_> = map.restrictions().filter(|r| r.is_only).collect();
            assert!(only.len() <= 1);
        }
        assert_eq!(map.check_for_emanating_is_only_turn(5, 6), Some(4));
    }

    #[test]
    fn test_duplicate_no_turn_is_ignored() {
        let mut map = RestrictionMap::new();
        assert!(map.insert(TurnRestriction::no_turn(0, 1, 2)));
        assert!(!map.insert(TurnRestriction::no_turn(0, 1, 2)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_fixup_starting_rekeys_approach() {
        // Chain 0 - 1 - 2 - 3 with "no 1 -> 2 -> 3"; node 1 is removed
        let mut map = RestrictionMap::from_restrictions(&[TurnRestriction::no_turn(1, 2, 3)]);
        map.fixup_starting_turn_restriction(0, 1, 2);
        assert!(map.check_if_turn_is_restricted(0, 2, 3));
        assert!(!map.check_if_turn_is_restricted(1, 2, 3));
        assert!(map.is_source_node(0));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_fixup_starting_merges_into_existing_bucket() {
        let mut map = RestrictionMap::from_restrictions(&[
            TurnRestriction::no_turn(1, 2, 3),
            TurnRestriction::only_turn(0, 2, 4),
        ]);
        map.fixup_starting_turn_restriction(0, 1, 2);
        // The only-turn already excludes 3
        assert_eq!(map.check_for_emanating_is_only_turn(0, 2), Some(4));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_fixup_arriving_retargets() {
        // "no 5 -> 0 -> 1" and node 1 between 0 and 2 is removed
        let mut map = RestrictionMap::from_restrictions(&[
            TurnRestriction::no_turn(5, 0, 1),
            TurnRestriction::only_turn(6, 0, 1),
        ]);
        map.fixup_arriving_turn_restriction(0, 1, 2);
        assert!(map.check_if_turn_is_restricted(5, 0, 2));
        assert!(!map.check_if_turn_is_restricted(5, 0, 1));
        assert_eq!(map.check_for_emanating_is_only_turn(6, 0), Some(2));
    }

    #[test]
    fn test_fixup_arriving_skips_removed_node_as_source() {
        let mut map = RestrictionMap::from_restrictions(&[TurnRestriction::no_turn(1, 0, 1)]);
        map.fixup_arriving_turn_restriction(0, 1, 2);
        assert!(map.check_if_turn_is_restricted(1, 0, 1));
    }

    #[test]
    fn test_fixup_on_unrestricted_nodes_is_noop() {
        let mut map = RestrictionMap::from_restrictions(&[TurnRestriction::no_turn(0, 1, 2)]);
        map.fixup_starting_turn_restriction(7, 8, 9);
        map.fixup_arriving_turn_restriction(7, 8, 9);
        assert_eq!(map.restrictions().collect::<Vec<_>>(), vec![TurnRestriction::no_turn(0, 1, 2)]);
    }
}
