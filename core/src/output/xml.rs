use std::borrow::Cow;

use crate::tree::{ElementTree, NodeId};

const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

const INDENT: &[u8] = b"  ";

/// Replacements applied to attribute values. `&` must come first so that
/// the entities produced by the other replacements are not escaped again.
const ATTRIBUTE_ESCAPES: [(&str, &str); 5] = [
    ("&", "&amp;"),
    ("\"", "&quot;"),
    ("'", "&#39;"),
    (">", "&gt;"),
    ("<", "&lt;"),
];

/// Escape an attribute value
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '"', '\'', '>', '<']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = value.to_string();
    for (from, to) in ATTRIBUTE_ESCAPES {
        escaped = escaped.replace(from, to);
    }
    Cow::Owned(escaped)
}

/// Serialize the subtree rooted at `root` into a standalone XML document
pub fn serialize_document(tree: &ElementTree, root: NodeId) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(XML_DECLARATION);
    serialize_element(tree, root, &mut out);
    out
}

enum Step {
    Open(NodeId, usize),
    Close(NodeId, usize),
}

/// Write the subtree rooted at `root` into `out`. Each element starts on its
/// own line and is indented by its depth relative to `root`. Elements without
/// children are written as empty elements.
pub fn serialize_element(tree: &ElementTree, root: NodeId, out: &mut Vec<u8>) {
    // iterate instead of recursing so that deeply nested documents cannot
    // overflow the stack
    let mut steps = vec![Step::Open(root, 0)];
    while let Some(step) = steps.pop() {
        match step {
            Step::Open(id, depth) => {
                let e = &tree[id];
                indent(out, depth);
                out.push(b'<');
                out.extend_from_slice(e.name().as_bytes());
                for (k, v) in e.attributes() {
                    out.push(b' ');
                    out.extend_from_slice(k.as_bytes());
                    out.extend_from_slice(b"=\"");
                    out.extend_from_slice(escape_attribute(v).as_bytes());
                    out.push(b'"');
                }

                if e.children().is_empty() {
                    out.extend_from_slice(b"/>\n");
                } else {
                    out.extend_from_slice(b">\n");
                    steps.push(Step::Close(id, depth));
                    for &child in e.children().iter().rev() {
                        steps.push(Step::Open(child, depth + 1));
                    }
                }
            }

            Step::Close(id, depth) => {
                indent(out, depth);
                out.extend_from_slice(b"</");
                out.extend_from_slice(tree[id].name().as_bytes());
                out.extend_from_slice(b">\n");
            }
        }
    }
}

fn indent(out: &mut Vec<u8>, depth: usize) {
    for _ in 0..depth {
        out.extend_from_slice(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, str::from_utf8};

    use assertor::{assert_that, EqualityAssertion};
    use pretty_assertions::assert_eq;

    use crate::tree::{Element, ElementTree};

    use super::{escape_attribute, serialize_document};

    #[test]
    fn escape_mixed() {
        assert_that!(escape_attribute(r#"He said "hi" & <bye>"#).into_owned())
            .is_equal_to(r#"He said &quot;hi&quot; &amp; &lt;bye&gt;"#.to_string());
    }

    #[test]
    fn escape_apostrophe() {
        assert_eq!(escape_attribute("it's"), "it&#39;s");
    }

    /// Existing entities in the input are escaped exactly once
    #[test]
    fn escape_no_double_escaping() {
        assert_eq!(escape_attribute("&amp;<"), "&amp;amp;&lt;");
    }

    #[test]
    fn escape_borrowed_if_unchanged() {
        assert!(matches!(escape_attribute("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn document() {
        let mut tree = ElementTree::new();
        let root = tree.insert(
            Element::new("HealthData", vec![("locale".to_string(), "en_US".to_string())]),
            None,
        );
        let record = tree.insert(
            Element::new(
                "Record",
                vec![
                    ("type".to_string(), "Steps".to_string()),
                    ("source".to_string(), "Bob's \"Watch\"".to_string()),
                ],
            ),
            Some(root),
        );
        let entry = tree.insert(Element::new("MetadataEntry", vec![]), Some(record));
        let me = tree.insert(Element::new("Me", vec![]), Some(root));
        tree.append_child(record, entry);
        tree.append_child(root, record);
        tree.append_child(root, me);

        let doc = serialize_document(&tree, root);
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<HealthData locale="en_US">
  <Record type="Steps" source="Bob&#39;s &quot;Watch&quot;">
    <MetadataEntry/>
  </Record>
  <Me/>
</HealthData>
"#;
        assert_eq!(from_utf8(&doc).unwrap(), expected);
    }

    /// A root without children is still a complete document
    #[test]
    fn empty_root() {
        let mut tree = ElementTree::new();
        let root = tree.insert(Element::new("root", vec![]), None);
        let doc = serialize_document(&tree, root);
        assert_eq!(
            from_utf8(&doc).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root/>\n"
        );
    }
}
