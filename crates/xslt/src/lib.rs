//! The template-application core of an XSLT processor.
//!
//! A compiled [`Stylesheet`] is run against a source tree by a [`Transformer`],
//! which selects rules, executes instructions and sends the resulting events
//! through a [`ResultTreeHandler`] to any [`trellis_traits::ContentHandler`].
//! Element and document starts are buffered until their attributes and
//! namespace declarations are known. Sorting and grouping run over node
//! handles with a stable merge sort.

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod grouping;
pub mod keys;
pub mod namespace;
pub mod pending;
pub mod result_tree;
pub mod snapshot;
pub mod sort;
pub mod state;
pub mod transformer;

mod executor_handlers;

pub use ast::{
    ApplyMode, AttributeSet, Grouping, Instruction, KeyDeclaration, LiteralAttribute,
    PrecedenceCeiling, SortKey, Stylesheet, StylesheetBuilder, Template, ValueTemplate, When,
    WithParam,
};
pub use config::TransformConfig;
pub use error::{DiagnosticLog, ErrorListener, Severity, XsltError};
pub use evaluator::SimplePathEvaluator;
pub use grouping::{Group, GroupSorter, GroupingIterator};
pub use keys::KeyTable;
pub use result_tree::{ResultTreeHandler, ResultTreeState};
pub use snapshot::TransformSnapshot;
pub use sort::{NanOrdering, NodeSorter, SortKeyEvaluator};
pub use state::ExecutionState;
pub use transformer::{TransformState, Transformer, TransformerBuilder};
