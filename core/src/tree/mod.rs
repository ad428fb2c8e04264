use std::{mem, ops::Index};

/// Identifies an [`Element`] inside an [`ElementTree`]. Only valid for the
/// tree that created it and only until the next call to
/// [`ElementTree::retain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// An XML element with its attributes and the IDs of its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,

    /// Back-reference used for navigation only. The parent owns the child
    /// through its `children` list, never the other way round.
    parent: Option<NodeId>,
}

impl Element {
    /// Create a new element without children and without a parent
    pub fn new(name: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attributes,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element's attributes in document order
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Look up the value of the attribute with the given key
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// An arena of elements addressed by [`NodeId`]
#[derive(Debug, Default)]
pub struct ElementTree {
    nodes: Vec<Element>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of elements currently held by the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add an element to the arena. The element records `parent` as its
    /// parent but is not added to the parent's children. Use
    /// [`append_child`](Self::append_child) for that.
    pub fn insert(&mut self, mut element: Element, parent: Option<NodeId>) -> NodeId {
        element.parent = parent;
        element.children.clear();
        self.nodes.push(element);
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` to the children of `parent` and make `parent` the
    /// child's parent
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Detach all children from the given element. The detached elements stay
    /// in the arena until the next call to [`retain`](Self::retain).
    pub fn clear_children(&mut self, id: NodeId) {
        self.nodes[id.0].children.clear();
    }

    /// Drop every element that is not part of one of the subtrees rooted at
    /// `keep`. Each kept subtree root loses its parent. Returns the new IDs of
    /// the subtree roots in the order of `keep`. All other IDs handed out
    /// before are invalid afterwards.
    pub fn retain(&mut self, keep: &[NodeId]) -> Vec<NodeId> {
        let mut old = mem::take(&mut self.nodes);
        keep.iter()
            .map(|&id| move_subtree(&mut old, id, &mut self.nodes))
            .collect()
    }
}

impl Index<NodeId> for ElementTree {
    type Output = Element;

    fn index(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }
}

/// Move the subtree rooted at `id` from `from` into `into`. Returns the new
/// ID of the subtree root.
fn move_subtree(from: &mut [Element], id: NodeId, into: &mut Vec<Element>) -> NodeId {
    let new_root = move_node(from, id, None, into);
    let mut pending = vec![(id, new_root)];
    while let Some((old_id, new_id)) = pending.pop() {
        let children = mem::take(&mut from[old_id.0].children);
        for child in children {
            let moved = move_node(from, child, Some(new_id), into);
            into[new_id.0].children.push(moved);
            pending.push((child, moved));
        }
    }
    new_root
}

fn move_node(
    from: &mut [Element],
    id: NodeId,
    parent: Option<NodeId>,
    into: &mut Vec<Element>,
) -> NodeId {
    let old = &mut from[id.0];
    into.push(Element {
        name: mem::take(&mut old.name),
        attributes: mem::take(&mut old.attributes),
        children: Vec::new(),
        parent,
    });
    NodeId(into.len() - 1)
}
