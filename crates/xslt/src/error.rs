use log::warn;
use thiserror::Error;
use trellis_dtm::NodeKind;
use trellis_traits::{HandlerError, XPathError};

#[derive(Error, Debug, Clone)]
pub enum XsltError {
    #[error("Result tree consumer failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("XPath evaluation error: {0}")]
    XPath(#[from] XPathError),

    #[error("Recursion limit of {limit} reached applying {template} to {node}")]
    RecursionLimit {
        limit: usize,
        template: String,
        node: String,
    },

    #[error("Template element stack exceeded {0} entries")]
    TemplateStackOverflow(usize),

    #[error("Call to unknown named template: '{0}'")]
    UnknownNamedTemplate(String),

    #[error("Reference to unknown attribute set: '{0}'")]
    UnknownAttributeSet(String),

    #[error("Attribute set '{0}' directly or indirectly uses itself")]
    AttributeSetRecursion(String),

    #[error("A {0:?} node cannot be copied into the result tree")]
    UncloneableNode(NodeKind),

    #[error("Ambiguous rule match for {node}: several rules share the best priority; using {template}")]
    AmbiguousRule { node: String, template: String },

    #[error("Attribute '{0}' added after the element's content started")]
    AttributeOutsideElement(String),

    #[error("Variable slot {slot} is outside the current frame of {size} slots")]
    VariableSlot { slot: usize, size: usize },

    #[error("No content handler was supplied")]
    MissingContentHandler,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template execution error: {0}")]
    Execution(String),
}

impl XsltError {
    pub fn execution(msg: impl Into<String>) -> Self {
        XsltError::Execution(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        XsltError::Config(msg.into())
    }

    /// Recoverable errors are reported and processing continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            XsltError::UncloneableNode(_)
                | XsltError::AmbiguousRule { .. }
                | XsltError::AttributeOutsideElement(_)
        )
    }
}

/// Receives diagnostics raised during a transformation.
///
/// Warnings and recoverable errors never stop processing unless `error` returns
/// `Err`, which escalates the error to a fatal one. `fatal_error` is informational:
/// the transformation aborts and returns the error regardless.
pub trait ErrorListener {
    fn warning(&mut self, error: &XsltError);

    fn error(&mut self, error: &XsltError) -> Result<(), XsltError> {
        self.warning(error);
        Ok(())
    }

    fn fatal_error(&mut self, error: &XsltError);
}

impl<L: ErrorListener + ?Sized> ErrorListener for &mut L {
    fn warning(&mut self, error: &XsltError) {
        (**self).warning(error)
    }

    fn error(&mut self, error: &XsltError) -> Result<(), XsltError> {
        (**self).error(error)
    }

    fn fatal_error(&mut self, error: &XsltError) {
        (**self).fatal_error(error)
    }
}

/// How serious a collected diagnostic was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// An [`ErrorListener`] that keeps every diagnostic.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<(Severity, XsltError)>,
    escalate_errors: bool,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that turns recoverable errors into fatal ones.
    pub fn strict() -> Self {
        Self {
            entries: Vec::new(),
            escalate_errors: true,
        }
    }

    pub fn entries(&self) -> &[(Severity, XsltError)] {
        &self.entries
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|(s, _)| *s == severity).count()
    }
}

impl ErrorListener for DiagnosticLog {
    fn warning(&mut self, error: &XsltError) {
        self.entries.push((Severity::Warning, error.clone()));
    }

    fn error(&mut self, error: &XsltError) -> Result<(), XsltError> {
        self.entries.push((Severity::Error, error.clone()));
        if self.escalate_errors {
            warn!("Escalating recoverable error: {}", error);
            return Err(error.clone());
        }
        Ok(())
    }

    fn fatal_error(&mut self, error: &XsltError) {
        self.entries.push((Severity::Fatal, error.clone()));
    }
}
