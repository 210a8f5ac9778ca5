//! Source tree model for the trellis transformation engine.
//!
//! The engine never owns source documents. It navigates them through the
//! [`SourceNode`] contract, which any tree representation can implement:
//!
//! - [`xml::XmlDocument`] wraps a `roxmltree` document parsed from text.
//! - [`mem::MemTree`] is an arena tree assembled with [`mem::TreeBuilder`]. It can
//!   express node kinds a parsed document hides (CDATA sections, entity references,
//!   document fragments, ignorable whitespace).

pub mod mem;
pub mod node;
pub mod xml;

pub use mem::{MemNode, MemTree, TreeBuilder};
pub use node::{NodeKind, QName, SourceNode, XML_NAMESPACE, XMLNS_NAMESPACE};
pub use xml::{XmlDocument, XmlNode};
