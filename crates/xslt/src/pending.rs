//! Start events held back until the result tree knows they are complete.
//!
//! A start-element stays pending while attributes and namespace declarations can
//! still be added to it. A start-document stays pending until the first event
//! that needs it, so a serializer switch can still happen before it.
use trellis_traits::Attribute;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingElement {
    pub uri: String,
    pub local_name: String,
    pub qname: String,
    pub attributes: Vec<Attribute>,
    /// Prefix mappings to report before the element, in declaration order.
    pub prefix_mappings: Vec<(String, String)>,
    /// `xmlns` attributes for the mappings were already added.
    pub ns_decls_added: bool,
}

impl PendingElement {
    fn reset(&mut self) {
        self.uri.clear();
        self.local_name.clear();
        self.qname.clear();
        self.attributes.clear();
        self.prefix_mappings.clear();
        self.ns_decls_added = false;
    }

    /// Adds an attribute, replacing one with the same namespace and local name.
    pub fn add_attribute(&mut self, attribute: Attribute) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.uri == attribute.uri && a.local_name == attribute.local_name)
        {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn record_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        match self.prefix_mappings.iter_mut().find(|(p, _)| p == prefix) {
            Some(existing) => existing.1 = uri.to_string(),
            None => self
                .prefix_mappings
                .push((prefix.to_string(), uri.to_string())),
        }
    }

    /// Writes the recorded mappings as `xmlns` attributes, once.
    pub fn add_namespace_attributes(&mut self) {
        if self.ns_decls_added {
            return;
        }
        let mappings = std::mem::take(&mut self.prefix_mappings);
        for (prefix, uri) in &mappings {
            let (local, qname) = if prefix.is_empty() {
                ("xmlns".to_string(), "xmlns".to_string())
            } else {
                (prefix.clone(), format!("xmlns:{}", prefix))
            };
            self.add_attribute(Attribute::new(
                trellis_dtm::XMLNS_NAMESPACE,
                local,
                qname,
                uri.clone(),
            ));
        }
        self.prefix_mappings = mappings;
        self.ns_decls_added = true;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingEvent {
    /// The start-document event; `pending` clears once it is delivered.
    Document { pending: bool },
    Element(PendingElement),
}

const POOL_LIMIT: usize = 16;

/// The pending start events. At most one element is live at a time and the
/// document event, once pushed, sits at the bottom.
#[derive(Debug, Clone, Default)]
pub struct PendingEventQueue {
    stack: Vec<PendingEvent>,
    pool: Vec<PendingElement>,
}

// Recycled allocations are not part of the observable state.
impl PartialEq for PendingEventQueue {
    fn eq(&self, other: &Self) -> bool {
        self.stack == other.stack
    }
}

impl PendingEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending start-document. A second call is a no-op.
    pub fn push_document(&mut self) {
        if !matches!(self.stack.first(), Some(PendingEvent::Document { .. })) {
            self.stack.insert(0, PendingEvent::Document { pending: true });
        }
    }

    pub fn is_document_pending(&self) -> bool {
        matches!(self.stack.first(), Some(PendingEvent::Document { pending: true }))
    }

    /// Marks the document as delivered. Returns true if the caller must now emit
    /// the start-document event.
    pub fn flush_document(&mut self) -> bool {
        match self.stack.first_mut() {
            Some(PendingEvent::Document { pending }) if *pending => {
                *pending = false;
                true
            }
            _ => false,
        }
    }

    /// Starts a new pending element. Any earlier element must have been taken.
    pub fn push_element(&mut self, uri: &str, local_name: &str, qname: &str) {
        debug_assert!(self.element().is_none(), "previous element still pending");
        let mut element = self.pool.pop().unwrap_or_default();
        element.uri.push_str(uri);
        element.local_name.push_str(local_name);
        element.qname.push_str(qname);
        self.stack.push(PendingEvent::Element(element));
    }

    pub fn element(&self) -> Option<&PendingElement> {
        match self.stack.last() {
            Some(PendingEvent::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut PendingElement> {
        match self.stack.last_mut() {
            Some(PendingEvent::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Removes the live element for delivery.
    pub fn take_element(&mut self) -> Option<PendingElement> {
        if self.element().is_some() {
            if let Some(PendingEvent::Element(element)) = self.stack.pop() {
                return Some(element);
            }
        }
        None
    }

    /// Returns a delivered element's storage for reuse.
    pub fn recycle(&mut self, mut element: PendingElement) {
        if self.pool.len() < POOL_LIMIT {
            element.reset();
            self.pool.push(element);
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        while let Some(event) = self.stack.pop() {
            if let PendingEvent::Element(element) = event {
                self.recycle(element);
            }
        }
    }
}
