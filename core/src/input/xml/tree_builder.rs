use tracing::{trace, warn};

use crate::{
    input::{xml::ElementEvent, EventConsumer},
    tree::{Element, ElementTree, NodeId},
};

/// An element that has just been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedElement {
    pub id: NodeId,

    /// `true` if the element is a direct child of the document's root
    /// element. Only after such an element the document can be cut into
    /// independent chunks.
    pub top_level: bool,
}

/// Incrementally builds an [`ElementTree`] from element events
///
/// Elements are attached to their parent when they are closed. End events
/// whose name does not match the innermost open element are ignored, so
/// malformed input leads to an incomplete tree instead of an error.
#[derive(Debug)]
pub struct TreeBuilder {
    tree: ElementTree,

    /// Open elements. The innermost one is at the end.
    open: Vec<NodeId>,

    /// The document's root element. [`None`] if it has not been found yet.
    root: Option<NodeId>,

    /// The first element named `anchor_tag`
    anchor: Option<NodeId>,
    anchor_tag: Option<String>,

    /// Depth inside a subtree that is being skipped (an additional top-level
    /// element after the root has been closed)
    skip_depth: usize,
}

impl TreeBuilder {
    /// Create a new builder that captures the first element named
    /// `anchor_tag` as anchor
    pub fn new(anchor_tag: Option<String>) -> Self {
        Self {
            tree: ElementTree::new(),
            open: Vec::new(),
            root: None,
            anchor: None,
            anchor_tag,
            skip_depth: 0,
        }
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn anchor(&self) -> Option<NodeId> {
        self.anchor
    }

    /// The number of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn start_element(&mut self, name: String, attributes: Vec<(String, String)>) {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return;
        }

        let parent = self.open.last().copied();
        if parent.is_none() && self.root.is_some() {
            warn!("Skipping additional top-level element `{name}' after the root element");
            self.skip_depth = 1;
            return;
        }

        let capture = self.anchor.is_none() && self.anchor_tag.as_deref() == Some(name.as_str());
        let id = self.tree.insert(Element::new(name, attributes), parent);
        if capture {
            self.anchor = Some(id);
        }
        if parent.is_none() {
            self.root = Some(id);
        }
        self.open.push(id);
    }

    pub fn end_element(&mut self, name: &str) -> Option<ClosedElement> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return None;
        }

        let current = *self.open.last()?;
        if self.tree[current].name() != name {
            trace!(
                "End tag `{name}' does not match open element `{}'",
                self.tree[current].name()
            );
            return None;
        }
        self.open.pop();

        let parent = self.tree[current].parent();
        if let Some(parent) = parent {
            self.tree.append_child(parent, current);
        }

        Some(ClosedElement {
            id: current,
            top_level: parent.is_some() && parent == self.root,
        })
    }

    /// Prepare the tree for the next chunk: remove all of the root's
    /// children, release their memory, and re-insert the anchor element (if
    /// one has been captured) as the root's first child
    pub fn start_next_chunk(&mut self) {
        let Some(root) = self.root else {
            return;
        };

        // Elements below the root can only be open here if the document
        // ended prematurely. They are dropped.
        self.open.truncate(1);

        self.tree.clear_children(root);
        let anchor = self.anchor.filter(|&a| a != root);
        let keep = match anchor {
            Some(anchor) => vec![root, anchor],
            None => vec![root],
        };
        let kept = self.tree.retain(&keep);

        let new_root = kept[0];
        if let Some(open_root) = self.open.first_mut() {
            *open_root = new_root;
        }
        self.root = Some(new_root);

        if anchor.is_some() {
            let new_anchor = kept[1];
            self.tree.append_child(new_root, new_anchor);
            self.anchor = Some(new_anchor);
        } else if self.anchor.is_some() {
            // the root itself is the anchor
            self.anchor = Some(new_root);
        }
    }
}

impl EventConsumer<ElementEvent> for TreeBuilder {
    fn on_event(&mut self, event: ElementEvent) -> Option<ClosedElement> {
        match event {
            ElementEvent::Start { name, attributes } => {
                self.start_element(name, attributes);
                None
            }

            ElementEvent::Empty { name, attributes } => {
                let end = name.clone();
                self.start_element(name, attributes);
                self.end_element(&end)
            }

            ElementEvent::End { name } => self.end_element(&name),
        }
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, BooleanAssertion, EqualityAssertion, OptionAssertion};
    use pretty_assertions::assert_eq;

    use crate::{
        input::{
            xml::{ClosedElement, ElementEvent},
            EventConsumer,
        },
        tree::NodeId,
    };

    use super::TreeBuilder;

    fn start(name: &str) -> ElementEvent {
        ElementEvent::Start {
            name: name.to_string(),
            attributes: vec![],
        }
    }

    fn empty(name: &str) -> ElementEvent {
        ElementEvent::Empty {
            name: name.to_string(),
            attributes: vec![],
        }
    }

    fn end(name: &str) -> ElementEvent {
        ElementEvent::End {
            name: name.to_string(),
        }
    }

    fn child_names(builder: &TreeBuilder, id: NodeId) -> Vec<String> {
        let tree = builder.tree();
        tree[id]
            .children()
            .iter()
            .map(|&c| tree[c].name().to_string())
            .collect()
    }

    fn feed(builder: &mut TreeBuilder, events: Vec<ElementEvent>) -> Vec<ClosedElement> {
        events
            .into_iter()
            .filter_map(|e| builder.on_event(e))
            .collect()
    }

    /// Elements are attached to their parents when closed and top-level
    /// completions are reported as such
    #[test]
    fn build() {
        let mut b = TreeBuilder::new(None);
        let closed = feed(
            &mut b,
            vec![
                start("root"),
                start("a"),
                empty("x"),
                end("a"),
                empty("b"),
            ],
        );

        let top_level = closed.iter().map(|c| c.top_level).collect::<Vec<_>>();
        assert_eq!(top_level, vec![false, true, true]);

        let root = b.root().unwrap();
        assert_that!(b.depth()).is_equal_to(1);
        assert_eq!(child_names(&b, root), vec!["a", "b"]);
        let a = b.tree()[root].children()[0];
        assert_eq!(child_names(&b, a), vec!["x"]);

        // closing the root is not a top-level completion
        let c = b.on_event(end("root")).unwrap();
        assert_that!(c.top_level).is_false();
        assert_that!(b.depth()).is_equal_to(0);
    }

    /// Mismatching end tags are ignored
    #[test]
    fn mismatch_is_tolerated() {
        let mut b = TreeBuilder::new(None);
        let closed = feed(&mut b, vec![start("root"), start("a"), end("b")]);
        assert!(closed.is_empty());
        assert_that!(b.depth()).is_equal_to(2);

        assert_that!(b.on_event(end("a"))).is_some();
        assert_that!(b.depth()).is_equal_to(1);
    }

    /// The anchor is captured once and survives chunk resets as the root's
    /// first child
    #[test]
    fn anchor() {
        let mut b = TreeBuilder::new(Some("ExportDate".to_string()));
        feed(
            &mut b,
            vec![
                start("HealthData"),
                empty("Me"),
                start("ExportDate"),
                empty("Detail"),
                end("ExportDate"),
                empty("ExportDate"),
                empty("Record"),
            ],
        );
        let root = b.root().unwrap();
        assert_eq!(
            child_names(&b, root),
            vec!["Me", "ExportDate", "ExportDate", "Record"]
        );
        let anchor = b.anchor().unwrap();
        assert_eq!(child_names(&b, anchor), vec!["Detail"]);

        b.start_next_chunk();
        let root = b.root().unwrap();
        let anchor = b.anchor().unwrap();
        assert_eq!(child_names(&b, root), vec!["ExportDate"]);
        assert_eq!(child_names(&b, anchor), vec!["Detail"]);
        assert_that!(b.tree()[anchor].parent()).is_equal_to(Some(root));
        assert_that!(b.tree().len()).is_equal_to(3);

        // the open root keeps receiving children
        assert_that!(b.depth()).is_equal_to(1);
        let closed = b.on_event(empty("Record")).unwrap();
        assert_that!(closed.top_level).is_true();
        assert_eq!(child_names(&b, root), vec!["ExportDate", "Record"]);

        b.start_next_chunk();
        let root = b.root().unwrap();
        assert_eq!(child_names(&b, root), vec!["ExportDate"]);
    }

    /// Without anchor, a reset leaves an empty root
    #[test]
    fn reset_without_anchor() {
        let mut b = TreeBuilder::new(Some("ExportDate".to_string()));
        feed(&mut b, vec![start("root"), empty("a"), empty("b")]);
        b.start_next_chunk();
        let root = b.root().unwrap();
        assert!(child_names(&b, root).is_empty());
        assert_that!(b.anchor()).is_none();
        assert_that!(b.tree()[root].name()).is_equal_to("root");
    }

    /// A root element that matches the anchor tag is never re-inserted into
    /// itself
    #[test]
    fn root_is_anchor() {
        let mut b = TreeBuilder::new(Some("root".to_string()));
        feed(&mut b, vec![start("root"), empty("a")]);
        assert_that!(b.anchor()).is_equal_to(b.root());
        b.start_next_chunk();
        let root = b.root().unwrap();
        assert!(child_names(&b, root).is_empty());
        assert_that!(b.anchor()).is_equal_to(Some(root));
    }

    /// Additional top-level elements after the root are skipped entirely
    #[test]
    fn second_root_is_skipped() {
        let mut b = TreeBuilder::new(None);
        let closed = feed(
            &mut b,
            vec![
                start("root"),
                end("root"),
                start("other"),
                empty("x"),
                end("other"),
            ],
        );
        assert_that!(closed.len()).is_equal_to(1);
        let root = b.root().unwrap();
        assert_that!(b.tree()[root].name()).is_equal_to("root");
        assert_that!(b.tree().len()).is_equal_to(1);
    }
}
