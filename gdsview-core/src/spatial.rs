/*!
# Static Spatial Index

Bulk-loaded R-tree over the bounding boxes of drawable units for one loaded
layout. Nodes are packed with the Sort-Tile-Recursive scheme: entries are
sorted into vertical slices by centre x, each slice is sorted by centre y and
cut into runs of `node_capacity`, and the process repeats one level up until a
single root remains.

The index is rebuilt, never edited: a new document or a detail-tier change
calls [`SpatialIndex::build`] again with the complete item set.
*/

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::IndexConfig;
use crate::error::GeometryError;
use crate::types::{BoundingBox, IndexedItem, ItemId, LayerKey};

/// Item refused at build time. It stays addressable by id but never
/// intersects a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedItem {
    pub id: ItemId,
    pub error: GeometryError,
}

/// Outcome of a bulk build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub indexed: usize,
    pub rejected: Vec<RejectedItem>,
    pub duplicate_ids: usize,
    pub tree_height: usize,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.duplicate_ids == 0
    }
}

#[derive(Debug)]
enum Children {
    /// Indices into `SpatialIndex::items`
    Leaf(Vec<usize>),
    /// Indices into `SpatialIndex::nodes`
    Branch(Vec<usize>),
}

#[derive(Debug)]
struct Node {
    bbox: BoundingBox,
    children: Children,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    bbox: BoundingBox,
    center: (f64, f64),
    index: usize,
}

impl Entry {
    fn new(bbox: BoundingBox, index: usize) -> Self {
        Self {
            bbox,
            center: bbox.center(),
            index,
        }
    }
}

pub struct SpatialIndex {
    config: IndexConfig,
    items: Vec<IndexedItem>,
    positions: HashMap<ItemId, usize>,
    nodes: Vec<Node>,
    root: Option<usize>,
    /// Valid items when the set is too small for a tree
    linear: Vec<usize>,
    bounds: Option<BoundingBox>,
}

impl SpatialIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
            positions: HashMap::new(),
            nodes: Vec::new(),
            root: None,
            linear: Vec::new(),
            bounds: None,
        }
    }

    /// Replace the whole index with `items`.
    pub fn build(&mut self, items: Vec<IndexedItem>) -> BuildReport {
        self.nodes.clear();
        self.root = None;
        self.linear.clear();
        self.bounds = None;
        self.positions.clear();
        self.items = items;

        let mut report = BuildReport::default();
        let mut entries = Vec::with_capacity(self.items.len());

        for (index, item) in self.items.iter().enumerate() {
            if self.positions.insert(item.id, index).is_some() {
                report.duplicate_ids += 1;
            }
            match item.bbox.validate() {
                Ok(()) => {
                    self.bounds = Some(match self.bounds {
                        Some(bounds) => bounds.union(&item.bbox),
                        None => item.bbox,
                    });
                    entries.push(Entry::new(item.bbox, index));
                }
                Err(error) => report.rejected.push(RejectedItem { id: item.id, error }),
            }
        }
        report.indexed = entries.len();

        if entries.len() < self.config.linear_scan_threshold.max(1) {
            self.linear = entries.iter().map(|entry| entry.index).collect();
            report.tree_height = 0;
        } else {
            let (root, height) = self.pack(entries);
            self.root = Some(root);
            report.tree_height = height;
        }

        if !report.rejected.is_empty() {
            log::warn!(
                "Spatial index rejected {} malformed item(s); first: id {} ({})",
                report.rejected.len(),
                report.rejected[0].id,
                report.rejected[0].error
            );
        }
        if report.duplicate_ids > 0 {
            log::warn!(
                "Spatial index saw {} duplicate item id(s); lookups by id return the last",
                report.duplicate_ids
            );
        }
        log::info!(
            "Built spatial index: {} item(s) indexed, tree height {}",
            report.indexed,
            report.tree_height
        );

        report
    }

    /// Every item whose box intersects `query`, inclusive of touching edges.
    pub fn query(&self, query: &BoundingBox) -> Vec<&IndexedItem> {
        self.query_positions(query)
            .into_iter()
            .map(|position| &self.items[position])
            .collect()
    }

    /// Positions in [`items`](Self::items) of the items `query` would return.
    /// Unlike ids, positions are unique within one build.
    pub(crate) fn query_positions(&self, query: &BoundingBox) -> Vec<usize> {
        let mut found = Vec::new();
        if !query.is_valid() {
            log::debug!("Ignoring query with malformed box {:?}", query);
            return found;
        }

        let hits = |index: &&usize| self.items[**index].bbox.intersects(query);

        let Some(root) = self.root else {
            found.extend(self.linear.iter().filter(hits).copied());
            return found;
        };

        let mut stack = vec![root];
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            if !node.bbox.intersects(query) {
                continue;
            }
            match &node.children {
                Children::Leaf(items) => found.extend(items.iter().filter(hits).copied()),
                Children::Branch(nodes) => stack.extend(nodes.iter().copied()),
            }
        }
        found
    }

    pub fn get(&self, id: ItemId) -> Option<&IndexedItem> {
        self.positions.get(&id).map(|&index| &self.items[index])
    }

    /// All items, including ones rejected for malformed geometry
    pub fn items(&self) -> &[IndexedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Union of all well-formed boxes, `None` when nothing is indexed
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    pub fn layer_item_counts(&self) -> HashMap<LayerKey, usize> {
        let mut counts = HashMap::new();
        for item in &self.items {
            *counts.entry(item.layer_key()).or_insert(0) += 1;
        }
        counts
    }

    /// Pack entries bottom-up. Returns the root node and the tree height.
    fn pack(&mut self, entries: Vec<Entry>) -> (usize, usize) {
        let mut level = self.pack_level(entries, true);
        let mut height = 1;
        while level.len() > 1 {
            level = self.pack_level(level, false);
            height += 1;
        }
        (level[0].index, height)
    }

    fn pack_level(&mut self, mut entries: Vec<Entry>, leaf: bool) -> Vec<Entry> {
        let capacity = self.config.node_capacity.max(2);
        let node_count = entries.len().div_ceil(capacity);
        let slice_count = (node_count as f64).sqrt().ceil().max(1.0) as usize;
        let slice_len = slice_count * capacity;

        self.sort_entries(&mut entries, |entry| entry.center.0);

        let mut parents = Vec::with_capacity(node_count);
        for slice in entries.chunks_mut(slice_len) {
            slice.sort_unstable_by(|a, b| a.center.1.total_cmp(&b.center.1));
            for group in slice.chunks(capacity) {
                let bbox = group
                    .iter()
                    .skip(1)
                    .fold(group[0].bbox, |acc, entry| acc.union(&entry.bbox));
                let indices: Vec<usize> = group.iter().map(|entry| entry.index).collect();
                let children = if leaf {
                    Children::Leaf(indices)
                } else {
                    Children::Branch(indices)
                };
                self.nodes.push(Node { bbox, children });
                parents.push(Entry::new(bbox, self.nodes.len() - 1));
            }
        }
        parents
    }

    fn sort_entries(&self, entries: &mut [Entry], key: fn(&Entry) -> f64) {
        let compare = |a: &Entry, b: &Entry| -> Ordering { key(a).total_cmp(&key(b)) };
        if entries.len() >= self.config.parallel_sort_threshold {
            entries.par_sort_unstable_by(compare);
        } else {
            entries.sort_unstable_by(compare);
        }
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}
