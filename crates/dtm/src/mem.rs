//! An arena-backed source tree built programmatically.
//!
//! Nodes are stored in creation order, and [`TreeBuilder`] creates them depth-first
//! with attributes right after their element, so arena index order is document
//! order.
use crate::node::{NodeKind, QName, SourceNode};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
struct MemNodeData {
    kind: NodeKind,
    prefix: Option<String>,
    local: String,
    namespace: Option<String>,
    value: String,
    children: Vec<usize>,
    attributes: Vec<usize>,
    namespaces: Vec<(Option<String>, String)>,
    parent: Option<usize>,
    ignorable: bool,
}

impl MemNodeData {
    fn new(kind: NodeKind, parent: Option<usize>) -> Self {
        Self {
            kind,
            prefix: None,
            local: String::new(),
            namespace: None,
            value: String::new(),
            children: Vec::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            parent,
            ignorable: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemTree {
    nodes: Vec<MemNodeData>,
}

impl MemTree {
    pub fn root(&self) -> MemNode<'_> {
        MemNode { id: 0, tree: self }
    }

    pub fn node(&self, id: usize) -> Option<MemNode<'_>> {
        (id < self.nodes.len()).then_some(MemNode { id, tree: self })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in document order, attributes included.
    pub fn nodes(&self) -> impl Iterator<Item = MemNode<'_>> {
        (0..self.nodes.len()).map(move |id| MemNode { id, tree: self })
    }
}

/// A handle to a node in a [`MemTree`].
#[derive(Debug, Clone, Copy)]
pub struct MemNode<'a> {
    id: usize,
    tree: &'a MemTree,
}

impl MemNode<'_> {
    pub fn id(&self) -> usize {
        self.id
    }

    fn data(&self) -> &MemNodeData {
        &self.tree.nodes[self.id]
    }
}

impl PartialEq for MemNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for MemNode<'_> {}

impl PartialOrd for MemNode<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for MemNode<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for MemNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<'a> SourceNode<'a> for MemNode<'a> {
    fn node_kind(&self) -> NodeKind {
        self.data().kind
    }

    fn name(&self) -> Option<QName<'a>> {
        let data = &self.tree.nodes[self.id];
        match data.kind {
            NodeKind::Element
            | NodeKind::Attribute
            | NodeKind::ProcessingInstruction
            | NodeKind::EntityReference
            | NodeKind::Namespace => Some(QName::new(data.prefix.as_deref(), &data.local)),
            _ => None,
        }
    }

    fn namespace_uri(&self) -> Option<&'a str> {
        self.tree.nodes[self.id].namespace.as_deref()
    }

    fn string_value(&self) -> String {
        let data = self.data();
        match data.kind {
            NodeKind::Document | NodeKind::DocumentFragment | NodeKind::Element => {
                let mut out = String::new();
                collect_text(self.tree, self.id, &mut out);
                out
            }
            _ => data.value.clone(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let tree = self.tree;
        Box::new(
            tree.nodes[self.id]
                .attributes
                .iter()
                .map(move |&id| MemNode { id, tree }),
        )
    }

    fn namespace_declarations(&self) -> Box<dyn Iterator<Item = (Option<&'a str>, &'a str)> + 'a> {
        let tree = self.tree;
        Box::new(
            tree.nodes[self.id]
                .namespaces
                .iter()
                .map(|(prefix, uri)| (prefix.as_deref(), uri.as_str())),
        )
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let tree = self.tree;
        Box::new(
            tree.nodes[self.id]
                .children
                .iter()
                .map(move |&id| MemNode { id, tree }),
        )
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|id| MemNode {
            id,
            tree: self.tree,
        })
    }

    fn is_ignorable_whitespace(&self) -> bool {
        self.data().ignorable
    }
}

fn collect_text(tree: &MemTree, id: usize, out: &mut String) {
    for &child in &tree.nodes[id].children {
        let data = &tree.nodes[child];
        match data.kind {
            NodeKind::Text | NodeKind::CData => out.push_str(&data.value),
            NodeKind::Element | NodeKind::EntityReference => collect_text(tree, child, out),
            _ => {}
        }
    }
}

fn split_qname(qname: &str) -> (Option<String>, String) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qname.to_string()),
    }
}

/// Builds a [`MemTree`] with open/close calls, mirroring a parser's event stream.
///
/// ```
/// use trellis_dtm::{SourceNode, TreeBuilder};
///
/// let mut builder = TreeBuilder::new();
/// builder.start_element("doc");
/// builder.attribute("id", "1");
/// builder.text("hello");
/// builder.end_element();
/// let tree = builder.finish();
/// assert_eq!(tree.root().string_value(), "hello");
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<MemNodeData>,
    open: Vec<usize>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// A builder whose root is a document node.
    pub fn new() -> Self {
        Self::with_root(NodeKind::Document)
    }

    /// A builder whose root is a document fragment.
    pub fn fragment() -> Self {
        Self::with_root(NodeKind::DocumentFragment)
    }

    fn with_root(kind: NodeKind) -> Self {
        Self {
            nodes: vec![MemNodeData::new(kind, None)],
            open: vec![0],
        }
    }

    fn current(&self) -> usize {
        self.open.last().copied().unwrap_or(0)
    }

    fn append(&mut self, mut data: MemNodeData) -> usize {
        let parent = self.current();
        data.parent = Some(parent);
        let id = self.nodes.len();
        self.nodes.push(data);
        self.nodes[parent].children.push(id);
        id
    }

    /// Opens an element with no namespace. A `prefix:local` name is split.
    pub fn start_element(&mut self, qname: &str) -> usize {
        self.open_element(qname, None)
    }

    pub fn start_element_ns(&mut self, qname: &str, uri: &str) -> usize {
        self.open_element(qname, Some(uri))
    }

    fn open_element(&mut self, qname: &str, uri: Option<&str>) -> usize {
        let (prefix, local) = split_qname(qname);
        let mut data = MemNodeData::new(NodeKind::Element, None);
        data.prefix = prefix;
        data.local = local;
        data.namespace = uri.map(str::to_string);
        let id = self.append(data);
        self.open.push(id);
        id
    }

    /// Closes the innermost open element or entity reference.
    pub fn end_element(&mut self) {
        if self.open.len() > 1 {
            self.open.pop();
        }
    }

    pub fn attribute(&mut self, qname: &str, value: &str) -> usize {
        self.add_attribute(qname, None, value)
    }

    pub fn attribute_ns(&mut self, qname: &str, uri: &str, value: &str) -> usize {
        self.add_attribute(qname, Some(uri), value)
    }

    fn add_attribute(&mut self, qname: &str, uri: Option<&str>, value: &str) -> usize {
        let owner = self.current();
        let (prefix, local) = split_qname(qname);
        let mut data = MemNodeData::new(NodeKind::Attribute, Some(owner));
        data.prefix = prefix;
        data.local = local;
        data.namespace = uri.map(str::to_string);
        data.value = value.to_string();
        let id = self.nodes.len();
        self.nodes.push(data);
        self.nodes[owner].attributes.push(id);
        id
    }

    /// Records a namespace declaration on the open element. An empty prefix
    /// declares the default namespace.
    pub fn declare_namespace(&mut self, prefix: &str, uri: &str) {
        let owner = self.current();
        let prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self.nodes[owner].namespaces.push((prefix, uri.to_string()));
    }

    pub fn text(&mut self, text: &str) -> usize {
        self.leaf(NodeKind::Text, None, text)
    }

    /// Whitespace the source flagged as element content.
    pub fn ignorable_whitespace(&mut self, text: &str) -> usize {
        let id = self.leaf(NodeKind::Text, None, text);
        self.nodes[id].ignorable = true;
        id
    }

    pub fn cdata(&mut self, text: &str) -> usize {
        self.leaf(NodeKind::CData, None, text)
    }

    pub fn comment(&mut self, text: &str) -> usize {
        self.leaf(NodeKind::Comment, None, text)
    }

    pub fn processing_instruction(&mut self, target: &str, data: &str) -> usize {
        self.leaf(NodeKind::ProcessingInstruction, Some(target), data)
    }

    /// A standalone namespace node, as produced by a namespace axis.
    pub fn namespace_node(&mut self, prefix: &str, uri: &str) -> usize {
        self.leaf(NodeKind::Namespace, Some(prefix), uri)
    }

    /// Opens an entity reference; its replacement content follows until
    /// [`TreeBuilder::end_element`].
    pub fn start_entity_reference(&mut self, name: &str) -> usize {
        let mut data = MemNodeData::new(NodeKind::EntityReference, None);
        data.local = name.to_string();
        let id = self.append(data);
        self.open.push(id);
        id
    }

    fn leaf(&mut self, kind: NodeKind, name: Option<&str>, value: &str) -> usize {
        let mut data = MemNodeData::new(kind, None);
        data.local = name.unwrap_or_default().to_string();
        data.value = value.to_string();
        self.append(data)
    }

    pub fn finish(self) -> MemTree {
        MemTree { nodes: self.nodes }
    }
}
