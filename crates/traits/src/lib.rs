pub mod collation;
pub mod content;
pub mod recorder;
pub mod xpath;

pub use collation::{CollationKey, Collator, RootCollator};
pub use content::{Attribute, ContentHandler, HandlerError, OutputMethod};
pub use recorder::{EventRecorder, ResultEvent};
pub use xpath::{
    EvalContext, Expr, KeyLookup, TypedValue, XPathError, XPathEvaluator, format_number,
    parse_number,
};
