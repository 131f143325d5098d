//! Partition tree of the divide-and-conquer builder.
//!
//! Nodes live in an arena and refer to each other by id. A node is created
//! when its parent is split, receives its neighbor sets once all of its
//! children are conquered, and is freed as soon as its parent has merged
//! them. The root's sets are the builder's output.

use crate::knn::NeighborSet;

/// Arena index of a node.
pub(crate) type NodeId = usize;

/// Children of a split node: left and right partition it, middle overlaps both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Children {
    pub left: NodeId,
    pub right: NodeId,
    pub middle: Option<NodeId>,
}

#[derive(Debug)]
struct PartitionNode {
    /// Global instance indices, ascending.
    indices: Vec<usize>,
    parent: Option<NodeId>,
    children: Option<Children>,
    /// Children not yet conquered.
    pending: usize,
    /// Neighbor sets aligned with `indices`, once conquered.
    sets: Option<Vec<NeighborSet>>,
}

/// Three-way split of a node's members, as global indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Split {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
    pub middle: Vec<usize>,
    /// Largest `|v|` admitted to the middle band.
    pub threshold: f32,
    /// The sign split left one side empty and the median was used.
    pub median_fallback: bool,
}

/// Splits `indices` (ascending) by their projections `values`.
///
/// Right holds `v >= 0`, left `v < 0`. If either side is empty the values
/// are shifted by their median; if that still leaves a side empty (ties),
/// the lower half by `(v, position)` goes left. The middle band holds the
/// `ceil(overlap_ratio * m)` members closest to the split, capped at
/// `m - 1`, and is dropped when it would hold fewer than two.
pub(crate) fn split_by_projection(indices: &[usize], values: &[f32], overlap_ratio: f32) -> Split {
    let m = indices.len();
    debug_assert_eq!(m, values.len());
    debug_assert!(m >= 2, "cannot split fewer than two points");

    let by_sign = |shift: f32| -> (Vec<usize>, Vec<usize>) {
        (0..m).partition(|&p| values[p] - shift < 0.0)
    };

    let mut shift = 0.0;
    let (mut left, mut right) = by_sign(shift);
    let median_fallback = left.is_empty() || right.is_empty();
    if median_fallback {
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
        let half = m / 2;
        shift = values[order[half]];
        (left, right) = by_sign(shift);
        if left.is_empty() || right.is_empty() {
            left = order[..half].to_vec();
            right = order[half..].to_vec();
            left.sort_unstable();
            right.sort_unstable();
        }
    }

    let band = ((overlap_ratio * m as f32).ceil() as usize).min(m - 1);
    let mut middle = Vec::new();
    let mut threshold = 0.0f32;
    if band >= 2 {
        let mut by_distance: Vec<usize> = (0..m).collect();
        by_distance.sort_by(|&a, &b| {
            let da = (values[a] - shift).abs();
            let db = (values[b] - shift).abs();
            da.total_cmp(&db).then(a.cmp(&b))
        });
        by_distance.truncate(band);
        threshold = by_distance
            .last()
            .map_or(0.0, |&p| (values[p] - shift).abs());
        by_distance.sort_unstable();
        middle = by_distance;
    }

    let to_global = |positions: Vec<usize>| positions.into_iter().map(|p| indices[p]).collect();
    Split {
        left: to_global(left),
        right: to_global(right),
        middle: to_global(middle),
        threshold,
        median_fallback,
    }
}

/// Arena of partition nodes.
#[derive(Debug)]
pub(crate) struct PartitionTree {
    nodes: Vec<Option<PartitionNode>>,
    k: usize,
    live: usize,
    peak: usize,
}

impl PartitionTree {
    /// Creates a tree whose root holds `indices` (ascending).
    pub fn new(indices: Vec<usize>, k: usize) -> Self {
        let root = PartitionNode {
            indices,
            parent: None,
            children: None,
            pending: 0,
            sets: None,
        };
        Self {
            nodes: vec![Some(root)],
            k,
            live: 1,
            peak: 1,
        }
    }

    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        0
    }

    /// Members of a live node; empty for a freed one.
    pub fn indices(&self, id: NodeId) -> &[usize] {
        self.nodes[id].as_ref().map_or(&[], |n| n.indices.as_slice())
    }

    /// Number of nodes ever created.
    pub fn created(&self) -> usize {
        self.nodes.len()
    }

    /// Largest number of simultaneously live nodes.
    pub fn peak_live(&self) -> usize {
        self.peak
    }

    fn push(&mut self, indices: Vec<usize>, parent: NodeId) -> NodeId {
        self.nodes.push(Some(PartitionNode {
            indices,
            parent: Some(parent),
            children: None,
            pending: 0,
            sets: None,
        }));
        self.live += 1;
        self.peak = self.peak.max(self.live);
        self.nodes.len() - 1
    }

    fn take(&mut self, id: NodeId) -> Option<PartitionNode> {
        let node = self.nodes.get_mut(id)?.take();
        if node.is_some() {
            self.live -= 1;
        }
        node
    }

    /// Attaches the children of a split; returns their ids.
    pub fn split(&mut self, id: NodeId, split: Split) -> Children {
        let left = self.push(split.left, id);
        let right = self.push(split.right, id);
        let middle = (!split.middle.is_empty()).then(|| self.push(split.middle, id));
        let children = Children {
            left,
            right,
            middle,
        };
        if let Some(node) = self.nodes[id].as_mut() {
            node.children = Some(children);
            node.pending = 2 + usize::from(middle.is_some());
        }
        children
    }

    /// Stores the sets of a finished node and conquers every ancestor whose
    /// children are now all finished.
    pub fn complete(&mut self, id: NodeId, sets: Vec<NeighborSet>) {
        let mut id = id;
        let mut sets = sets;
        loop {
            let Some(node) = self.nodes[id].as_mut() else {
                return;
            };
            node.sets = Some(sets);
            let Some(parent) = node.parent else {
                return;
            };
            let Some(parent_node) = self.nodes[parent].as_mut() else {
                return;
            };
            parent_node.pending -= 1;
            if parent_node.pending > 0 {
                return;
            }
            sets = self.conquer(parent);
            id = parent;
        }
    }

    /// Merges and frees the children of `id`.
    ///
    /// Each member takes its set from the side it fell on and then receives
    /// the entries of its middle set through the bounded insertion, skipping
    /// neighbors it already holds.
    fn conquer(&mut self, id: NodeId) -> Vec<NeighborSet> {
        let k = self.k;
        let Some(children) = self.nodes[id].as_ref().and_then(|n| n.children) else {
            return Vec::new();
        };
        let left = self.take(children.left);
        let right = self.take(children.right);
        let middle = children.middle.and_then(|m| self.take(m));

        let side = |node: Option<PartitionNode>| {
            node.map(|n| {
                let sets = n.sets.unwrap_or_default();
                n.indices.into_iter().zip(sets)
            })
            .into_iter()
            .flatten()
            .peekable()
        };
        let mut left = side(left);
        let mut right = side(right);
        let (middle_indices, middle_sets) = middle.map_or((Vec::new(), Vec::new()), |n| {
            (n.indices, n.sets.unwrap_or_default())
        });

        let indices = self.indices(id).to_vec();
        indices
            .iter()
            .map(|&g| {
                let mut set = left
                    .next_if(|(i, _)| *i == g)
                    .or_else(|| right.next_if(|(i, _)| *i == g))
                    .map_or_else(|| NeighborSet::with_capacity(k), |(_, s)| s);
                if let Ok(pos) = middle_indices.binary_search(&g) {
                    if let Some(extra) = middle_sets.get(pos) {
                        for (j, d) in extra.iter() {
                            if !set.contains(j) {
                                set.insert(j, d);
                            }
                        }
                    }
                }
                set
            })
            .collect()
    }

    /// Removes the root's sets once everything is conquered.
    pub fn take_root_sets(&mut self) -> Option<Vec<NeighborSet>> {
        let root = self.take(self.root())?;
        root.sets
    }
}
