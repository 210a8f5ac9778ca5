//! Stack-based record of the prefix bindings in effect in the result tree.
use trellis_dtm::{XML_NAMESPACE, XMLNS_NAMESPACE};

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Prefix → URI bindings organized in nested contexts, one per result element.
/// The empty prefix is the default namespace. `xml` and `xmlns` are
/// pre-bound and cannot be redeclared.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceSupport {
    bindings: Vec<Binding>,
    depth: usize,
}

impl Default for NamespaceSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceSupport {
    pub fn new() -> Self {
        Self {
            bindings: vec![
                Binding {
                    prefix: "xml".to_string(),
                    uri: XML_NAMESPACE.to_string(),
                    depth: 0,
                },
                Binding {
                    prefix: "xmlns".to_string(),
                    uri: XMLNS_NAMESPACE.to_string(),
                    depth: 0,
                },
            ],
            depth: 0,
        }
    }

    pub fn push_context(&mut self) {
        self.depth += 1;
    }

    /// Leave the innermost context, dropping its bindings. The base context is
    /// never popped.
    pub fn pop_context(&mut self) {
        if self.depth == 0 {
            return;
        }
        while self.bindings.last().is_some_and(|b| b.depth >= self.depth) {
            self.bindings.pop();
        }
        self.depth -= 1;
    }

    /// Bind `prefix` in the current context, replacing a binding the same
    /// context already made. Returns false for the reserved prefixes.
    pub fn declare_prefix(&mut self, prefix: &str, uri: &str) -> bool {
        if prefix == "xml" || prefix == "xmlns" {
            return false;
        }
        let depth = self.depth;
        if let Some(existing) = self
            .bindings
            .iter_mut()
            .rev()
            .take_while(|b| b.depth == depth)
            .find(|b| b.prefix == prefix)
        {
            existing.uri = uri.to_string();
            return true;
        }
        self.bindings.push(Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth,
        });
        true
    }

    /// The URI `prefix` is bound to, searching innermost first.
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// A prefix currently bound to `uri`, if any.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| b.uri == uri)
            .map(|b| b.prefix.as_str())
            .find(|prefix| self.uri(prefix) == Some(uri))
    }

    /// Bindings made in the current context, in declaration order.
    pub fn declared_prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        let depth = self.depth;
        self.bindings
            .iter()
            .filter(move |b| b.depth == depth && depth > 0)
            .map(|b| (b.prefix.as_str(), b.uri.as_str()))
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
