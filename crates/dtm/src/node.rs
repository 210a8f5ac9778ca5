//! The navigation contract every source tree implements.
use std::fmt;
use std::hash::Hash;

/// Namespace permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` declaration attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A qualified name, consisting of an optional prefix and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

impl<'a> QName<'a> {
    pub fn new(prefix: Option<&'a str>, local_part: &'a str) -> Self {
        Self { prefix, local_part }
    }

    /// A name without a prefix.
    pub fn local(local_part: &'a str) -> Self {
        Self {
            prefix: None,
            local_part,
        }
    }
}

impl fmt::Display for QName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) if !prefix.is_empty() => write!(f, "{}:{}", prefix, self.local_part),
            _ => f.write_str(self.local_part),
        }
    }
}

/// The kind of a node in a source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    DocumentFragment,
    Element,
    Attribute,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
    EntityReference,
    Namespace,
}

impl NodeKind {
    pub fn is_character_data(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::CData)
    }

    /// Document and fragment nodes have no representation of their own in a result tree.
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::DocumentFragment)
    }
}

/// The universal contract for a node in a read-only, hierarchical source tree.
///
/// The engine is written exclusively against this trait. Implementations are cheap
/// handles (`Copy`) whose `Ord` is document order, so sorting a node list by `Ord`
/// puts it into document order.
///
/// `'a` is the lifetime of the underlying tree storage.
pub trait SourceNode<'a>:
    fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn node_kind(&self) -> NodeKind;

    /// The qualified name of the node. For a processing instruction this is its
    /// target, for a namespace node the bound prefix, for an entity reference the
    /// entity name. `None` for unnamed kinds (text, comment, document).
    fn name(&self) -> Option<QName<'a>>;

    /// Namespace URI of an element or attribute, `None` when it has none.
    fn namespace_uri(&self) -> Option<&'a str>;

    /// The XPath string value.
    /// - Elements and documents: concatenated descendant text.
    /// - Attributes: the attribute value.
    /// - Namespace nodes: the bound URI.
    /// - Everything else: its own content.
    fn string_value(&self) -> String;

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Namespace declarations made on this element itself as `(prefix, uri)` pairs,
    /// `None` being the default namespace. Inherited bindings are not repeated.
    fn namespace_declarations(&self) -> Box<dyn Iterator<Item = (Option<&'a str>, &'a str)> + 'a>;

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn parent(&self) -> Option<Self>;

    /// Text nodes the source marked as ignorable (element-content whitespace).
    fn is_ignorable_whitespace(&self) -> bool {
        false
    }

    /// True if `self` follows `other` in document order.
    fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// The lexical `prefix:local` name, empty for unnamed nodes.
    fn qualified_name(&self) -> String {
        self.name().map(|q| q.to_string()).unwrap_or_default()
    }

    fn root(&self) -> Self {
        let mut current = *self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Siblings that come before this node, in document order.
    fn preceding_siblings(&self) -> Vec<Self> {
        match self.parent() {
            Some(parent) if self.node_kind() != NodeKind::Attribute => {
                parent.children().take_while(|c| c != self).collect()
            }
            _ => Vec::new(),
        }
    }
}
