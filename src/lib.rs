//! Trellis: an XSLT template-application engine.
//!
//! The engine itself lives in [`trellis_xslt`]; this crate ties it to real
//! input and output. Sources are parsed with `roxmltree`, results are written
//! by [`XmlSerializer`], and [`pipeline::transform_on_worker`] runs a
//! transformation off the calling thread.
//!
//! ```rust,ignore
//! let stylesheet = Stylesheet::builder()
//!     .template(Template::matching("item", vec![Instruction::value_of("@id")]))
//!     .build();
//! let out = trellis::transform_to_string(xml, &stylesheet, &TransformConfig::default())?;
//! ```
pub mod pipeline;
pub mod serializer;

use log::info;
use std::path::Path;
use thiserror::Error;

pub use serializer::XmlSerializer;
pub use trellis_dtm::{MemNode, MemTree, NodeKind, QName, SourceNode, TreeBuilder, XmlDocument, XmlNode};
pub use trellis_traits::{
    Attribute, ContentHandler, EventRecorder, Expr, HandlerError, OutputMethod, ResultEvent,
    TypedValue, XPathError, XPathEvaluator,
};
pub use trellis_xslt::*;

#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("XML parsing failed: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Transformation failed: {0}")]
    Xslt(#[from] XsltError),

    #[error("Result consumer failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialized output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Reads a JSON [`TransformConfig`] from disk.
pub fn load_config(path: impl AsRef<Path>) -> Result<TransformConfig, TrellisError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let config = TransformConfig::from_json(&text)?;
    info!("Loaded transform config from {}", path.display());
    Ok(config)
}

/// Parses `xml`, transforms it and serializes the result.
pub fn transform_to_string(
    xml: &str,
    stylesheet: &Stylesheet,
    config: &TransformConfig,
) -> Result<String, TrellisError> {
    let doc = XmlDocument::parse(xml)?;
    let evaluator = SimplePathEvaluator::new();
    let method = config
        .output_method
        .or(stylesheet.output_method())
        .unwrap_or_default();
    let mut serializer = XmlSerializer::with_method(Vec::new(), method);
    {
        let mut transformer = TransformerBuilder::new(stylesheet, &evaluator)
            .content_handler(&mut serializer)
            .config(config.clone())
            .build()?;
        transformer.transform(doc.root_node())?;
    }
    Ok(String::from_utf8(serializer.into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"recursion_limit": 12, "quiet_conflict_warnings": true}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.recursion_limit, Some(12));
        assert!(config.quiet_conflict_warnings);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"channel_capacity": 0}}"#).unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(TrellisError::Xslt(XsltError::Config(_)))
        ));
    }
}
