//! The result-tree event sink sitting between the engine and a [`ContentHandler`].
//!
//! Start events are buffered in a [`PendingEventQueue`] and delivered lazily: an
//! element start goes out only when its attributes and namespace declarations are
//! complete, and the document start only when the first real event needs it.
//! Namespace declarations are tracked in a [`NamespaceSupport`] so every element
//! and attribute prefix in the output is declared exactly where it is needed.
use crate::error::XsltError;
use crate::namespace::NamespaceSupport;
use crate::pending::PendingEventQueue;
use log::{debug, trace, warn};
use trellis_dtm::{NodeKind, SourceNode};
use trellis_traits::{Attribute, ContentHandler, OutputMethod};

/// The buffered state of a [`ResultTreeHandler`], detached from its consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTreeState {
    pub queue: PendingEventQueue,
    pub namespaces: NamespaceSupport,
    pub ns_context_pushed: bool,
    pub element_seen: bool,
    pub method_fixed: bool,
    pub event_count: u64,
}

pub struct ResultTreeHandler<'h> {
    handler: Box<dyn ContentHandler + 'h>,
    queue: PendingEventQueue,
    namespaces: NamespaceSupport,
    /// A namespace context was pushed for an element that has not started yet.
    ns_context_pushed: bool,
    element_seen: bool,
    method_fixed: bool,
    configured_method: Option<OutputMethod>,
    event_count: u64,
}

impl<'h> ResultTreeHandler<'h> {
    /// `method` is the output method the stylesheet fixed, if any. Without one,
    /// a document element named `html` in no namespace switches the consumer
    /// to HTML output.
    pub fn new(handler: Box<dyn ContentHandler + 'h>, method: Option<OutputMethod>) -> Self {
        Self {
            handler,
            queue: PendingEventQueue::new(),
            namespaces: NamespaceSupport::new(),
            ns_context_pushed: false,
            element_seen: false,
            method_fixed: method.is_some(),
            configured_method: method,
            event_count: 0,
        }
    }

    pub fn namespaces(&self) -> &NamespaceSupport {
        &self.namespaces
    }

    pub fn queue(&self) -> &PendingEventQueue {
        &self.queue
    }

    /// Number of events delivered downstream so far.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn into_handler(self) -> Box<dyn ContentHandler + 'h> {
        self.handler
    }

    fn count_event(&mut self) {
        self.event_count += 1;
    }

    // --- document ---

    pub fn start_document(&mut self) -> Result<(), XsltError> {
        self.queue.push_document();
        Ok(())
    }

    pub fn end_document(&mut self) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.end_document()?;
        self.count_event();
        debug!("Result tree complete after {} events", self.event_count);
        Ok(())
    }

    // --- elements ---

    pub fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &[Attribute],
    ) -> Result<(), XsltError> {
        self.check_for_serializer_switch(uri, local_name)?;
        self.flush_pending()?;

        if !self.ns_context_pushed {
            self.namespaces.push_context();
            self.ns_context_pushed = true;
        }
        self.queue.push_element(uri, local_name, qname);
        let declared_early: Vec<(String, String)> = self
            .namespaces
            .declared_prefixes()
            .map(|(p, u)| (p.to_string(), u.to_string()))
            .collect();
        if let Some(element) = self.queue.element_mut() {
            for (prefix, uri) in &declared_early {
                element.record_prefix_mapping(prefix, uri);
            }
        }

        if !uri.is_empty() {
            self.ensure_prefix_declared(uri, qname);
        }
        for attribute in attributes {
            self.add_attribute(attribute.clone())?;
        }
        Ok(())
    }

    pub fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> Result<(), XsltError> {
        self.flush_pending()?;
        if self.ns_context_pushed {
            // Declarations made for an element that never started.
            self.namespaces.pop_context();
            self.ns_context_pushed = false;
        }
        self.handler.end_element(uri, local_name, qname)?;
        self.count_event();

        let declared: Vec<String> = self
            .namespaces
            .declared_prefixes()
            .map(|(p, _)| p.to_string())
            .collect();
        for prefix in declared {
            self.handler.end_prefix_mapping(&prefix)?;
            self.count_event();
        }
        self.namespaces.pop_context();
        Ok(())
    }

    /// Adds an attribute to the pending element. An attribute that arrives after
    /// the element's start was delivered is reported as recoverable.
    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<(), XsltError> {
        if self.queue.element().is_none() {
            return Err(XsltError::AttributeOutsideElement(attribute.qname));
        }
        if attribute.is_namespace_declaration() {
            let prefix = attribute.qname.strip_prefix("xmlns:").unwrap_or("");
            return self.start_prefix_mapping(prefix, &attribute.value);
        }
        if !attribute.uri.is_empty() && attribute.prefix().is_some() {
            self.ensure_prefix_declared(&attribute.uri, &attribute.qname);
        }
        if let Some(element) = self.queue.element_mut() {
            element.add_attribute(attribute);
        }
        Ok(())
    }

    // --- namespaces ---

    /// Declares `prefix` for the next or pending element. Nothing is delivered
    /// until the element starts, and a binding equal to the one already in scope
    /// is not repeated.
    pub fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), XsltError> {
        self.declare_mapping(prefix, uri);
        Ok(())
    }

    fn declare_mapping(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        if !self.ns_context_pushed {
            self.namespaces.push_context();
            self.ns_context_pushed = true;
        }
        if self.namespaces.uri(prefix) == Some(uri) {
            return;
        }
        if prefix.is_empty() && uri.is_empty() && self.namespaces.uri("").is_none() {
            return;
        }
        self.namespaces.declare_prefix(prefix, uri);
        if let Some(element) = self.queue.element_mut() {
            element.record_prefix_mapping(prefix, uri);
        }
        trace!("Declared prefix '{}' -> '{}'", prefix, uri);
    }

    fn ensure_prefix_declared(&mut self, uri: &str, qname: &str) {
        let prefix = qname.split_once(':').map_or("", |(p, _)| p);
        if prefix == "xmlns" || prefix == "xml" {
            return;
        }
        if self.namespaces.uri(prefix) != Some(uri) {
            self.declare_mapping(prefix, uri);
        }
    }

    /// Declares the namespaces the source element itself declares.
    pub fn copy_namespace_declarations<'a, N: SourceNode<'a>>(
        &mut self,
        node: N,
    ) -> Result<(), XsltError> {
        for (prefix, uri) in node.namespace_declarations() {
            self.start_prefix_mapping(prefix.unwrap_or(""), uri)?;
        }
        Ok(())
    }

    // --- character data and other leaves ---

    pub fn characters(&mut self, text: &str) -> Result<(), XsltError> {
        if self.queue.is_document_pending() && is_whitespace(text) {
            return Ok(());
        }
        self.flush_pending()?;
        self.handler.characters(text)?;
        self.count_event();
        Ok(())
    }

    pub fn ignorable_whitespace(&mut self, text: &str) -> Result<(), XsltError> {
        if self.queue.is_document_pending() && is_whitespace(text) {
            return Ok(());
        }
        self.flush_pending()?;
        self.handler.ignorable_whitespace(text)?;
        self.count_event();
        Ok(())
    }

    pub fn comment(&mut self, text: &str) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.comment(text)?;
        self.count_event();
        Ok(())
    }

    pub fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.processing_instruction(target, data)?;
        self.count_event();
        Ok(())
    }

    pub fn start_cdata(&mut self) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.start_cdata()?;
        self.count_event();
        Ok(())
    }

    pub fn end_cdata(&mut self) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.end_cdata()?;
        self.count_event();
        Ok(())
    }

    pub fn start_entity(&mut self, name: &str) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.start_entity(name)?;
        self.count_event();
        Ok(())
    }

    pub fn end_entity(&mut self, name: &str) -> Result<(), XsltError> {
        self.flush_pending()?;
        self.handler.end_entity(name)?;
        self.count_event();
        Ok(())
    }

    /// DTD events precede the document element, so only the document start is
    /// flushed.
    pub fn start_dtd(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), XsltError> {
        self.flush_document()?;
        self.handler.start_dtd(name, public_id, system_id)?;
        self.count_event();
        Ok(())
    }

    pub fn end_dtd(&mut self) -> Result<(), XsltError> {
        self.flush_document()?;
        self.handler.end_dtd()?;
        self.count_event();
        Ok(())
    }

    // --- flushing ---

    /// Delivers the pending document start and element start, in that order.
    pub fn flush_pending(&mut self) -> Result<(), XsltError> {
        self.flush_document()?;
        self.flush_element()
    }

    fn flush_document(&mut self) -> Result<(), XsltError> {
        if self.queue.flush_document() {
            self.handler.start_document()?;
            self.count_event();
        }
        Ok(())
    }

    /// Delivers the pending element start only. A pending element implies the
    /// document start has already gone out.
    pub(crate) fn flush_element(&mut self) -> Result<(), XsltError> {
        let Some(mut element) = self.queue.take_element() else {
            return Ok(());
        };
        element.add_namespace_attributes();
        for (prefix, uri) in &element.prefix_mappings {
            self.handler.start_prefix_mapping(prefix, uri)?;
            self.count_event();
        }
        self.handler.start_element(
            &element.uri,
            &element.local_name,
            &element.qname,
            &element.attributes,
        )?;
        self.count_event();
        trace!("Flushed <{}> with {} attributes", element.qname, element.attributes.len());
        self.ns_context_pushed = false;
        self.queue.recycle(element);
        Ok(())
    }

    // --- output method ---

    fn check_for_serializer_switch(&mut self, uri: &str, local_name: &str) -> Result<(), XsltError> {
        if self.element_seen {
            return Ok(());
        }
        self.element_seen = true;
        if self.method_fixed || !uri.is_empty() || local_name != "html" {
            return Ok(());
        }
        debug!("Document element is <html>; switching output method to HTML");
        self.method_fixed = true;
        self.handler.switch_output_method(OutputMethod::Html)?;
        self.count_event();
        Ok(())
    }

    // --- cloning ---

    /// Copies one source node (not its descendants) into the result tree.
    ///
    /// Element copies leave the element pending so content can follow; the
    /// caller ends it. Document and fragment nodes cannot be cloned and yield a
    /// recoverable [`XsltError::UncloneableNode`].
    pub fn clone_to_result_tree<'a, N: SourceNode<'a>>(
        &mut self,
        node: N,
        clone_attributes: bool,
    ) -> Result<(), XsltError> {
        let kind = node.node_kind();
        match kind {
            NodeKind::Text => {
                let text = node.string_value();
                if text.is_empty() {
                    return Ok(());
                }
                if node.is_ignorable_whitespace() {
                    self.ignorable_whitespace(&text)
                } else {
                    self.characters(&text)
                }
            }
            NodeKind::CData => {
                self.start_cdata()?;
                self.characters(&node.string_value())?;
                self.end_cdata()
            }
            NodeKind::Element => {
                let uri = node.namespace_uri().unwrap_or("");
                let local = node.name().map(|q| q.local_part).unwrap_or("");
                self.start_element(uri, local, &node.qualified_name(), &[])?;
                if clone_attributes {
                    self.copy_namespace_declarations(node)?;
                    for attribute in node.attributes() {
                        self.add_attribute(source_attribute(attribute))?;
                    }
                }
                Ok(())
            }
            NodeKind::Attribute => self.add_attribute(source_attribute(node)),
            NodeKind::Comment => self.comment(&node.string_value()),
            NodeKind::ProcessingInstruction => {
                let target = node.name().map(|q| q.local_part).unwrap_or("");
                self.processing_instruction(target, &node.string_value())
            }
            NodeKind::EntityReference => {
                let name = node.name().map(|q| q.local_part).unwrap_or("");
                self.start_entity(name)?;
                self.end_entity(name)
            }
            NodeKind::Namespace => {
                let prefix = node.name().map(|q| q.local_part).unwrap_or("");
                self.start_prefix_mapping(prefix, &node.string_value())
            }
            NodeKind::Document | NodeKind::DocumentFragment => {
                warn!("Refusing to clone a {:?} node into the result tree", kind);
                Err(XsltError::UncloneableNode(kind))
            }
        }
    }

    // --- state capture ---

    pub fn capture_state(&self) -> ResultTreeState {
        ResultTreeState {
            queue: self.queue.clone(),
            namespaces: self.namespaces.clone(),
            ns_context_pushed: self.ns_context_pushed,
            element_seen: self.element_seen,
            method_fixed: self.method_fixed,
            event_count: self.event_count,
        }
    }

    pub fn restore_state(&mut self, state: &ResultTreeState) {
        self.queue = state.queue.clone();
        self.namespaces = state.namespaces.clone();
        self.ns_context_pushed = state.ns_context_pushed;
        self.element_seen = state.element_seen;
        self.method_fixed = state.method_fixed;
        self.event_count = state.event_count;
    }

    /// Drops all buffered state so the handler can serve a new transformation.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.namespaces.reset();
        self.ns_context_pushed = false;
        self.element_seen = false;
        self.method_fixed = self.configured_method.is_some();
        self.event_count = 0;
    }
}

fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn source_attribute<'a, N: SourceNode<'a>>(node: N) -> Attribute {
    let local = node.name().map(|q| q.local_part).unwrap_or("");
    Attribute::new(
        node.namespace_uri().unwrap_or(""),
        local,
        node.qualified_name(),
        node.string_value(),
    )
}
