//! Reference graph between named component definitions
//!
//! Nodes are the definitions under `#/components`; an edge `A -> B` means the
//! content of `A` reaches `B` through references without passing through
//! another named definition first.

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::model::{AnyHandle, Document};
use crate::reference::ReferenceType;

/// A named definition, e.g. `schemas/Pet`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Definition {
    pub kind: ReferenceType,
    pub name: String,
}

impl Definition {
    pub fn new(kind: ReferenceType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// `#/components/...` pointer of the definition
    pub fn pointer(&self) -> String {
        format!("#{}", self.kind.definition_pointer(&self.name))
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.component_key() {
            Some(key) => write!(f, "{}/{}", key, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    graph: DiGraph<Definition, ()>,
    node_indices: HashMap<Definition, NodeIndex>,
}

impl ReferenceGraph {
    /// Build the graph of a document. Unresolved references end the path they
    /// are on.
    pub fn build(document: &Document) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut starts = Vec::new();
        // Concrete slots that hold a definition's content
        let mut owners: HashMap<AnyHandle, NodeIndex> = HashMap::new();

        let store = document.store();
        for (name, handle) in document.components.definitions() {
            let definition = Definition::new(handle.kind(), name);
            let index = graph.add_node(definition.clone());
            node_indices.insert(definition, index);
            if store.entry_reference(handle).is_none() {
                owners.insert(handle, index);
            }
            starts.push((index, handle));
        }

        let mut children = Vec::new();
        for (from, start) in starts {
            let mut stack = Vec::new();
            let mut visited = HashSet::new();
            store.children(start, &mut stack);

            while let Some(handle) = stack.pop() {
                if !visited.insert(handle) {
                    continue;
                }
                if let Some(&to) = owners.get(&handle) {
                    graph.update_edge(from, to, ());
                    continue;
                }
                store.children(handle, &mut children);
                stack.append(&mut children);
            }
        }

        Self { graph, node_indices }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Groups of definitions that reach each other, including definitions
    /// that refer to themselves. Each group is sorted; groups are in
    /// declaration order of their first member.
    pub fn cycles(&self) -> Vec<Vec<Definition>> {
        let mut cycles: Vec<(usize, Vec<Definition>)> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let first = scc.iter().map(|index| index.index()).min().unwrap_or_default();
                let mut members: Vec<Definition> = scc.iter().map(|&index| self.graph[index].clone()).collect();
                members.sort();
                (first, members)
            })
            .collect();
        cycles.sort_by_key(|(first, _)| *first);
        cycles.into_iter().map(|(_, members)| members).collect()
    }

    /// Definitions that `definition` refers to directly
    pub fn dependencies(&self, definition: &Definition) -> Vec<Definition> {
        self.neighbors(definition, Direction::Outgoing)
    }

    /// Definitions that refer to `definition` directly
    pub fn dependents(&self, definition: &Definition) -> Vec<Definition> {
        self.neighbors(definition, Direction::Incoming)
    }

    fn neighbors(&self, definition: &Definition, direction: Direction) -> Vec<Definition> {
        let Some(&index) = self.node_indices.get(definition) else {
            return Vec::new();
        };
        let mut neighbors: Vec<Definition> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|neighbor| self.graph[neighbor].clone())
            .collect();
        neighbors.sort();
        neighbors
    }
}
