//! Depth-first traversal of the object graph
//!
//! The traversal keeps an explicit stack and a visited set, so cyclic graphs
//! are walked once per slot without recursion.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::model::{AnyHandle, ComponentStore, Document};
use crate::reference::ReferenceDescriptor;

/// Explicit-stack walk state shared by the resolver and [`Walker`]
#[derive(Debug, Default)]
pub(crate) struct Traversal {
    stack: Vec<AnyHandle>,
    visited: HashSet<AnyHandle>,
    scratch: Vec<AnyHandle>,
}

impl Traversal {
    pub(crate) fn new(mut roots: Vec<AnyHandle>) -> Self {
        // Popped from the back; reverse to visit roots in document order.
        roots.reverse();
        Self {
            stack: roots,
            ..Default::default()
        }
    }

    /// Next slot not yet visited
    pub(crate) fn next(&mut self) -> Option<AnyHandle> {
        while let Some(handle) = self.stack.pop() {
            if self.visited.insert(handle) {
                return Some(handle);
            }
        }
        None
    }

    /// Queue the children of `handle` as they are now
    pub(crate) fn descend(&mut self, store: &ComponentStore, handle: AnyHandle) {
        store.children(handle, &mut self.scratch);
        self.stack.extend(self.scratch.drain(..).rev());
    }
}

/// Callbacks for [`Walker::walk`]. Both default to doing nothing.
pub trait Visitor {
    /// Every slot reached from the document roots, once
    fn visit(&mut self, _document: &Document, _handle: AnyHandle) {}

    /// Slots that were written as a reference
    fn visit_reference(
        &mut self,
        _document: &Document,
        _handle: AnyHandle,
        _reference: &ReferenceDescriptor,
        _resolved: bool,
    ) {
    }
}

/// Read-only walk over everything reachable from a document's roots
pub struct Walker<'d> {
    document: &'d Document,
}

impl<'d> Walker<'d> {
    pub fn new(document: &'d Document) -> Self {
        Self { document }
    }

    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        let store = self.document.store();
        let mut traversal = Traversal::new(self.document.roots());
        while let Some(handle) = traversal.next() {
            visitor.visit(self.document, handle);
            if let Some(reference) = store.entry_reference(handle) {
                let resolved = !store.is_entry_unresolved(handle);
                visitor.visit_reference(self.document, handle, reference, resolved);
            }
            traversal.descend(store, handle);
        }
    }

    /// Every reachable slot in visiting order
    pub fn reachable(&self) -> Vec<AnyHandle> {
        struct Collect(Vec<AnyHandle>);
        impl Visitor for Collect {
            fn visit(&mut self, _document: &Document, handle: AnyHandle) {
                self.0.push(handle);
            }
        }

        let mut collect = Collect(Vec::new());
        self.walk(&mut collect);
        collect.0
    }
}

/// Reference counts of a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// References into another document, resolved or not
    pub external: usize,
}

impl ReferenceSummary {
    pub fn of(document: &Document) -> Self {
        let mut summary = Self::default();
        Walker::new(document).walk(&mut summary);
        summary
    }
}

impl Visitor for ReferenceSummary {
    fn visit_reference(
        &mut self,
        document: &Document,
        handle: AnyHandle,
        reference: &ReferenceDescriptor,
        resolved: bool,
    ) {
        self.total += 1;
        if resolved {
            self.resolved += 1;
        } else {
            self.unresolved += 1;
        }

        let origin = document
            .store()
            .entry_origin(handle)
            .unwrap_or_else(|| document.location());
        let external = reference
            .target_location(origin)
            .map(|location| &location != document.location())
            .unwrap_or(true);
        if external {
            self.external += 1;
        }
    }
}

impl fmt::Display for ReferenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reference{}: {} resolved, {} unresolved, {} external",
            self.total,
            if self.total == 1 { "" } else { "s" },
            self.resolved,
            self.unresolved,
            self.external
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Schema, SpecVersion};
    use url::Url;

    #[test]
    fn test_traversal_visits_each_slot_once() {
        let mut doc = Document::new(Url::parse("file:///api.yaml").unwrap(), SpecVersion::V3_1);
        let leaf = doc.store.insert(Schema::default());
        let parent = doc.store.insert(Schema {
            all_of: vec![leaf, leaf],
            ..Default::default()
        });
        doc.components.schemas.insert("Parent".to_string(), parent);
        doc.components.schemas.insert("Leaf".to_string(), leaf);

        let reachable = Walker::new(&doc).reachable();
        assert_eq!(reachable, vec![AnyHandle::Schema(parent), AnyHandle::Schema(leaf)]);
        assert_eq!(ReferenceSummary::of(&doc), ReferenceSummary::default());
    }
}
