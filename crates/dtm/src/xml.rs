// XML source trees backed by roxmltree
use crate::node::{NodeKind, QName, SourceNode, XML_NAMESPACE};
use roxmltree::Node;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Wrapper around `roxmltree::Document` providing source-tree navigation.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self { doc })
    }

    pub fn root_node(&self) -> XmlNode<'_, 'input> {
        XmlNode::Node(self.doc.root())
    }

    pub fn document_element(&self) -> XmlNode<'_, 'input> {
        XmlNode::Node(self.doc.root_element())
    }
}

/// A tree node or an attribute. roxmltree stores attributes as data on their
/// element rather than as navigable nodes, so they are addressed by index.
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    Node(Node<'a, 'input>),
    Attribute {
        parent: Node<'a, 'input>,
        index: usize,
    },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    pub fn inner(&self) -> Option<Node<'a, 'input>> {
        match self {
            XmlNode::Node(node) => Some(*node),
            XmlNode::Attribute { .. } => None,
        }
    }

    fn sort_key(&self) -> (usize, usize) {
        match self {
            XmlNode::Node(node) => (node.id().get_usize(), 0),
            XmlNode::Attribute { parent, index } => (parent.id().get_usize(), index + 1),
        }
    }
}

impl PartialEq for XmlNode<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for XmlNode<'_, '_> {}

impl PartialOrd for XmlNode<'_, '_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XmlNode<'_, '_> {
    // An element precedes its attributes, which precede its children.
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl Hash for XmlNode<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

fn element_prefix<'a>(node: Node<'a, 'a>, uri: &str) -> Option<&'a str> {
    let mut bindings = node.namespaces().filter(|ns| ns.uri() == uri);
    // Prefer the default namespace when it matches.
    if node.namespaces().any(|ns| ns.uri() == uri && ns.name().is_none()) {
        return None;
    }
    bindings.find_map(|ns| ns.name())
}

fn attribute_prefix<'a>(parent: Node<'a, 'a>, uri: &str) -> Option<&'a str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    parent
        .namespaces()
        .filter(|ns| ns.uri() == uri)
        .find_map(|ns| ns.name())
}

impl<'a> SourceNode<'a> for XmlNode<'a, 'a> {
    fn node_kind(&self) -> NodeKind {
        match self {
            XmlNode::Node(node) => match node.node_type() {
                roxmltree::NodeType::Root => NodeKind::Document,
                roxmltree::NodeType::Element => NodeKind::Element,
                roxmltree::NodeType::Text => NodeKind::Text,
                roxmltree::NodeType::Comment => NodeKind::Comment,
                roxmltree::NodeType::PI => NodeKind::ProcessingInstruction,
            },
            XmlNode::Attribute { .. } => NodeKind::Attribute,
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            XmlNode::Node(node) if node.is_element() => {
                let tag = node.tag_name();
                let prefix = tag.namespace().and_then(|uri| element_prefix(*node, uri));
                Some(QName::new(prefix, tag.name()))
            }
            XmlNode::Node(node) => node.pi().map(|pi| QName::local(pi.target)),
            XmlNode::Attribute { parent, index } => parent.attributes().nth(*index).map(|attr| {
                let prefix = attr.namespace().and_then(|uri| attribute_prefix(*parent, uri));
                QName::new(prefix, attr.name())
            }),
        }
    }

    fn namespace_uri(&self) -> Option<&'a str> {
        match self {
            XmlNode::Node(node) if node.is_element() => node.tag_name().namespace(),
            XmlNode::Node(_) => None,
            XmlNode::Attribute { parent, index } => {
                parent.attributes().nth(*index).and_then(|attr| attr.namespace())
            }
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Node(node) => match node.node_type() {
                roxmltree::NodeType::Root | roxmltree::NodeType::Element => node
                    .descendants()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect(),
                roxmltree::NodeType::Text | roxmltree::NodeType::Comment => {
                    node.text().unwrap_or("").to_string()
                }
                roxmltree::NodeType::PI => node
                    .pi()
                    .and_then(|pi| pi.value)
                    .unwrap_or("")
                    .to_string(),
            },
            XmlNode::Attribute { parent, index } => parent
                .attributes()
                .nth(*index)
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Node(node) if node.is_element() => {
                let parent = *node;
                let count = node.attributes().len();
                Box::new((0..count).map(move |index| XmlNode::Attribute { parent, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn namespace_declarations(&self) -> Box<dyn Iterator<Item = (Option<&'a str>, &'a str)> + 'a> {
        let XmlNode::Node(node) = self else {
            return Box::new(std::iter::empty());
        };
        if !node.is_element() {
            return Box::new(std::iter::empty());
        }
        let inherited: Vec<(Option<&'a str>, &'a str)> = node
            .parent_element()
            .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
            .unwrap_or_default();
        let declared: Vec<(Option<&'a str>, &'a str)> = node
            .namespaces()
            .map(|ns| (ns.name(), ns.uri()))
            .filter(|(_, uri)| *uri != XML_NAMESPACE)
            .filter(|binding| !inherited.contains(binding))
            .collect();
        Box::new(declared.into_iter())
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Node(node) => Box::new(node.children().map(XmlNode::Node)),
            XmlNode::Attribute { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Node(node) => node.parent().map(XmlNode::Node),
            XmlNode::Attribute { parent, .. } => Some(XmlNode::Node(*parent)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element<'a>(node: XmlNode<'a, 'a>, local: &str) -> XmlNode<'a, 'a> {
        node.children()
            .find(|n| n.name().map(|q| q.local_part == local).unwrap_or(false))
            .unwrap()
    }

    #[test]
    fn test_kinds_and_string_values() {
        let xml = r#"<root><!--note--><?pi data?><item>Text <b>bold</b></item></root>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.root_node();
        assert_eq!(root.node_kind(), NodeKind::Document);

        let element = first_element(root, "root");
        let kinds: Vec<NodeKind> = element.children().map(|c| c.node_kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Comment,
                NodeKind::ProcessingInstruction,
                NodeKind::Element
            ]
        );
        let pi = element.children().nth(1).unwrap();
        assert_eq!(pi.name().unwrap().local_part, "pi");
        assert_eq!(pi.string_value(), "data");
        assert_eq!(first_element(element, "item").string_value(), "Text bold");
    }

    #[test]
    fn test_attributes_follow_their_element() {
        let xml = r#"<root><item id="123" status="active">Text</item></root>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let item = first_element(first_element(doc.root_node(), "root"), "item");

        let attrs: Vec<_> = item.attributes().collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].string_value(), "123");
        assert_eq!(attrs[1].name().unwrap().local_part, "status");
        assert_eq!(attrs[0].parent(), Some(item));
        assert!(attrs[0] > item);
        let text = item.children().next().unwrap();
        assert!(text.is_after(&attrs[1]));
    }

    #[test]
    fn test_namespace_prefixes_and_declarations() {
        let xml = r#"<x:root xmlns:x="urn:x" xmlns="urn:d"><child x:flag="y"/></x:root>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.document_element();
        assert_eq!(root.qualified_name(), "x:root");
        assert_eq!(root.namespace_uri(), Some("urn:x"));

        let mut declared: Vec<_> = root.namespace_declarations().collect();
        declared.sort();
        assert_eq!(declared, vec![(None, "urn:d"), (Some("x"), "urn:x")]);

        let child = root.children().next().unwrap();
        assert_eq!(child.qualified_name(), "child");
        assert_eq!(child.namespace_uri(), Some("urn:d"));
        assert_eq!(child.namespace_declarations().count(), 0);
        let flag = child.attributes().next().unwrap();
        assert_eq!(flag.qualified_name(), "x:flag");
        assert_eq!(flag.namespace_uri(), Some("urn:x"));
    }
}
