//! The downstream consumer of result-tree events.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a [`ContentHandler`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid event sequence: {0}")]
    Sequence(String),

    #[error("Event consumer closed")]
    Closed,
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Io(err.to_string())
    }
}

/// How the final consumer serializes the result tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Text,
}

/// An attribute of a result element. `uri` is empty for attributes without a
/// namespace; `qname` carries the lexical `prefix:local` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub uri: String,
    pub local_name: String,
    pub qname: String,
    pub value: String,
}

impl Attribute {
    pub fn new(
        uri: impl Into<String>,
        local_name: impl Into<String>,
        qname: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
            qname: qname.into(),
            value: value.into(),
        }
    }

    /// An attribute with no namespace.
    pub fn local(name: &str, value: impl Into<String>) -> Self {
        Self::new("", name, name, value)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.qname.split_once(':').map(|(prefix, _)| prefix)
    }

    /// True for `xmlns` and `xmlns:*` attributes.
    pub fn is_namespace_declaration(&self) -> bool {
        self.qname == "xmlns" || self.qname.starts_with("xmlns:")
    }
}

/// A SAX-style consumer of result-tree events.
///
/// Element and attribute names arrive as namespace URI (empty when absent), local
/// name and lexical qualified name. Prefix mappings for an element are reported
/// immediately before its `start_element` and ended immediately after its
/// `end_element`.
///
/// The lexical events (CDATA, entity and DTD bracketing) and the output method
/// switch default to no-ops so plain consumers only implement the core events.
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<(), HandlerError>;
    fn end_document(&mut self) -> Result<(), HandlerError>;

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), HandlerError>;
    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<(), HandlerError>;

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &[Attribute],
    ) -> Result<(), HandlerError>;
    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str)
    -> Result<(), HandlerError>;

    fn characters(&mut self, text: &str) -> Result<(), HandlerError>;

    fn ignorable_whitespace(&mut self, text: &str) -> Result<(), HandlerError> {
        self.characters(text)
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError>;
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError>;

    fn start_cdata(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn end_cdata(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn start_entity(&mut self, _name: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    fn end_entity(&mut self, _name: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    fn start_dtd(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _system_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    fn end_dtd(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Replace the serializer's output method. Called at most once per
    /// transformation, before the document start is delivered.
    fn switch_output_method(&mut self, _method: OutputMethod) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl<H: ContentHandler + ?Sized> ContentHandler for &mut H {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        (**self).start_document()
    }
    fn end_document(&mut self) -> Result<(), HandlerError> {
        (**self).end_document()
    }
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), HandlerError> {
        (**self).start_prefix_mapping(prefix, uri)
    }
    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<(), HandlerError> {
        (**self).end_prefix_mapping(prefix)
    }
    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &[Attribute],
    ) -> Result<(), HandlerError> {
        (**self).start_element(uri, local_name, qname, attributes)
    }
    fn end_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) -> Result<(), HandlerError> {
        (**self).end_element(uri, local_name, qname)
    }
    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        (**self).characters(text)
    }
    fn ignorable_whitespace(&mut self, text: &str) -> Result<(), HandlerError> {
        (**self).ignorable_whitespace(text)
    }
    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        (**self).comment(text)
    }
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        (**self).processing_instruction(target, data)
    }
    fn start_cdata(&mut self) -> Result<(), HandlerError> {
        (**self).start_cdata()
    }
    fn end_cdata(&mut self) -> Result<(), HandlerError> {
        (**self).end_cdata()
    }
    fn start_entity(&mut self, name: &str) -> Result<(), HandlerError> {
        (**self).start_entity(name)
    }
    fn end_entity(&mut self, name: &str) -> Result<(), HandlerError> {
        (**self).end_entity(name)
    }
    fn start_dtd(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        (**self).start_dtd(name, public_id, system_id)
    }
    fn end_dtd(&mut self) -> Result<(), HandlerError> {
        (**self).end_dtd()
    }
    fn switch_output_method(&mut self, method: OutputMethod) -> Result<(), HandlerError> {
        (**self).switch_output_method(method)
    }
}
