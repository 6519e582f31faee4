//! Footnote reference tracking.
//!
//! References are collected per group while an article renders; the
//! reference list for a group is emitted where the document requests it
//! and consumes the collected state. Named references share one list entry
//! across occurrences: the first occurrence fixes the sequence number and
//! each later occurrence gets its own back-reference id.
//!
//! State is scoped to a single article render and must be fresh for each
//! document.

use crate::tree::{Node, NodeKind};
use rustc_hash::FxHashMap;

/// Inline marker emitted at the point a reference occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefMarker {
    /// Bracketed label, e.g. `[1]` or `[note 3]`.
    pub text: String,
    /// Id of the inline anchor, target of the back-link in the list.
    pub backref_id: String,
    /// Id of the list item this marker points at.
    pub note_id: String,
}

#[derive(Debug, Clone, Copy)]
struct NamedRef {
    first: usize,
    count: usize,
}

#[derive(Debug, Default)]
pub struct RefTracker {
    references: FxHashMap<String, Vec<Node>>,
    named: FxHashMap<String, FxHashMap<String, NamedRef>>,
}

/// List item id for the `num`-th reference (1-based) of a group.
pub fn note_id(group: &str, num: usize) -> String {
    format!("_n{}_{}", group, num)
}

impl RefTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of a reference node and returns its inline
    /// marker. The node must be a `Reference`.
    pub fn register(&mut self, node: &Node) -> RefMarker {
        let (group, name) = match &node.kind {
            NodeKind::Reference { group, name } => (group.clone(), name.clone()),
            other => unreachable!("register called on non-reference node: {:?}", other),
        };

        let group_refs = self.references.entry(group.clone()).or_default();

        let (seq, backref_id) = match name {
            Some(name) => {
                let name = name.replace(' ', "_");
                let named = self
                    .named
                    .entry(group.clone())
                    .or_default()
                    .entry(name)
                    .or_insert(NamedRef { first: 0, count: 0 });
                if named.count == 0 {
                    group_refs.push(node.clone());
                    named.first = group_refs.len();
                }
                let backref_id = format!("_r{}_{}", note_id(&group, named.first), named.count);
                named.count += 1;
                (named.first, backref_id)
            }
            None => {
                group_refs.push(node.clone());
                let seq = group_refs.len();
                (seq, format!("_r{}", note_id(&group, seq)))
            }
        };

        let label = format!("{} {}", group, seq);
        RefMarker {
            text: format!("[{}]", label.trim()),
            backref_id,
            note_id: note_id(&group, seq),
        }
    }

    /// Removes and returns the group's collected references in
    /// first-occurrence order. An unknown group is simply empty.
    pub fn pop_group(&mut self, group: &str) -> Vec<Node> {
        self.references.remove(group).unwrap_or_default()
    }

    /// Occurrence count for a named reference, 0 when never seen.
    pub fn named_count(&self, group: &str, name: &str) -> usize {
        let name = name.replace(' ', "_");
        self.named
            .get(group)
            .and_then(|names| names.get(&name))
            .map(|named| named.count)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
