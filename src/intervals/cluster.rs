use std::collections::BTreeMap;

use crate::error::{RangeError, Result};

/// A group of intervals lying within the merge distance of one another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub start: usize,
    pub end: usize,

    /// Identifiers of the member intervals, ascending
    pub ids: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Node {
    end: usize,
    ids: Vec<usize>,
}

/// Incrementally merges intervals into clusters
///
/// Two intervals join the same cluster when the gap between them is at
/// most `mincols` positions; touching intervals always merge. Clusters are
/// kept disjoint and keyed by their start, so an insertion only visits the
/// clusters it absorbs.
///
/// ```rust
/// use binspan::intervals::ClusterTree;
///
/// let mut tree = ClusterTree::new(0, 0);
/// for (id, (start, end)) in [(1, 2), (4, 5), (2, 4)].into_iter().enumerate() {
///     tree.insert(start, end, id).unwrap();
/// }
/// let clusters = tree.regions();
/// assert_eq!(clusters.len(), 1);
/// assert_eq!((clusters[0].start, clusters[0].end), (1, 5));
/// assert_eq!(clusters[0].ids, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClusterTree {
    mincols: usize,
    minregions: usize,
    nodes: BTreeMap<usize, Node>,
}
impl ClusterTree {
    /// Creates an empty tree
    ///
    /// * `mincols` - largest gap between two intervals that still merges them
    /// * `minregions` - smallest member count a cluster needs to be reported
    #[must_use]
    pub fn new(mincols: usize, minregions: usize) -> Self {
        Self {
            mincols,
            minregions,
            nodes: BTreeMap::new(),
        }
    }

    /// Adds the interval `[start, end)` under identifier `id`
    ///
    /// # Errors
    ///
    /// * `RangeError::InvalidInterval` - If `start > end`
    pub fn insert(&mut self, start: usize, end: usize, id: usize) -> Result<()> {
        if start > end {
            return Err(RangeError::InvalidInterval { start, end }.into());
        }
        let reach = end.saturating_add(self.mincols);

        // Clusters are disjoint, so the ones within reach form a contiguous
        // run ending at the last cluster starting at or before `reach`.
        let absorbed: Vec<usize> = self
            .nodes
            .range(..=reach)
            .rev()
            .take_while(|(_, node)| node.end.saturating_add(self.mincols) >= start)
            .map(|(&key, _)| key)
            .collect();

        let mut merged = Node {
            end,
            ids: vec![id],
        };
        let mut merged_start = start;
        for key in absorbed {
            if let Some(node) = self.nodes.remove(&key) {
                merged_start = merged_start.min(key);
                merged.end = merged.end.max(node.end);
                merged.ids.extend(node.ids);
            }
        }
        self.nodes.insert(merged_start, merged);
        Ok(())
    }

    /// Number of clusters, reported or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clusters with at least `minregions` members, in coordinate order
    #[must_use]
    pub fn regions(&self) -> Vec<Cluster> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.ids.len() >= self.minregions)
            .map(|(&start, node)| {
                let mut ids = node.ids.clone();
                ids.sort_unstable();
                Cluster {
                    start,
                    end: node.end,
                    ids,
                }
            })
            .collect()
    }
}
