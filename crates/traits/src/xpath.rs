//! The expression-evaluation seam.
//!
//! The engine consumes expressions as opaque [`Expr`] handles and hands them to an
//! [`XPathEvaluator`] together with an [`EvalContext`]. Parsing and the function
//! library live behind that trait.
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use trellis_dtm::SourceNode;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("Failed to parse expression '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Variable slot ${0} is not bound")]
    UnboundVariable(usize),

    #[error("No key named '{0}' is declared")]
    UnknownKey(String),
}

/// An uncompiled expression or pattern, cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr(Arc<str>);

impl Expr {
    pub fn new(source: impl AsRef<str>) -> Self {
        Expr(Arc::from(source.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Expr {
    fn from(source: &str) -> Self {
        Expr::new(source)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: SourceNode<'a>> TypedValue<N> {
    pub fn to_bool(&self) -> bool {
        match self {
            TypedValue::NodeSet(nodes) => !nodes.is_empty(),
            TypedValue::String(s) => !s.is_empty(),
            TypedValue::Number(n) => *n != 0.0 && !n.is_nan(),
            TypedValue::Boolean(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            TypedValue::Number(n) => *n,
            TypedValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            TypedValue::String(s) => parse_number(s),
            TypedValue::NodeSet(_) => parse_number(&self.to_string_value()),
        }
    }

    /// The XPath `string()` conversion. A node-set converts to the string value
    /// of its first node.
    pub fn to_string_value(&self) -> String {
        match self {
            TypedValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| n.string_value())
                .unwrap_or_default(),
            TypedValue::String(s) => s.clone(),
            TypedValue::Number(n) => format_number(*n),
            TypedValue::Boolean(b) => b.to_string(),
        }
    }

    /// The nodes of a node-set; any other value yields no nodes.
    pub fn into_nodes(self) -> Vec<N> {
        match self {
            TypedValue::NodeSet(nodes) => nodes,
            _ => Vec::new(),
        }
    }
}

/// Parses a string with XPath `number()` rules: optional surrounding whitespace,
/// an optional leading minus, digits with at most one decimal point. Anything
/// else is NaN.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Formats a number the way XPath `string()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let label = if n > 0.0 { "Infinity" } else { "-Infinity" };
        label.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Lookup into the engine's key tables, exposed to the `key()` function.
pub trait KeyLookup<N> {
    /// Nodes indexed under `value` for the key `name`, in document order.
    /// `None` when no key of that name is declared.
    fn lookup(&self, name: &str, value: &str) -> Option<&[N]>;
}

/// Everything an evaluator may consult besides the expression itself.
pub struct EvalContext<'c, N> {
    pub node: N,
    /// 1-based position of `node` within the current node list.
    pub position: usize,
    pub size: usize,
    /// Members of the group being processed by a grouping instruction.
    pub current_group: Option<&'c [N]>,
    pub grouping_key: Option<&'c str>,
    /// The active variable frame, indexed by slot.
    pub variables: &'c [Option<TypedValue<N>>],
    /// In-scope `(prefix, uri)` bindings of the expression.
    pub namespaces: &'c [(String, String)],
    pub keys: Option<&'c dyn KeyLookup<N>>,
}

impl<'c, N: Copy> EvalContext<'c, N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
            current_group: None,
            grouping_key: None,
            variables: &[],
            namespaces: &[],
            keys: None,
        }
    }

    pub fn with_position(mut self, position: usize, size: usize) -> Self {
        self.position = position;
        self.size = size;
        self
    }

    pub fn variable(&self, slot: usize) -> Option<&TypedValue<N>> {
        self.variables.get(slot).and_then(Option::as_ref)
    }

    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

/// Evaluates expressions and matches patterns against source nodes.
pub trait XPathEvaluator<'a, N: SourceNode<'a>> {
    fn evaluate(&self, expr: &Expr, ctx: &EvalContext<'_, N>) -> Result<TypedValue<N>, XPathError>;

    /// True if `ctx.node` matches the pattern.
    fn matches(&self, pattern: &Expr, ctx: &EvalContext<'_, N>) -> Result<bool, XPathError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_dtm::{MemNode, TreeBuilder};

    #[test]
    fn test_number_parsing_follows_xpath_rules() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert_eq!(parse_number(".5"), 0.5);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("+1").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number("1.2.3").is_nan());
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_value_conversions() {
        let mut b = TreeBuilder::new();
        b.start_element("n");
        b.text("12");
        b.end_element();
        let tree = b.finish();
        let n = tree.root().children().next().unwrap();

        let nodes: TypedValue<MemNode<'_>> = TypedValue::NodeSet(vec![n]);
        assert!(nodes.to_bool());
        assert_eq!(nodes.to_number(), 12.0);
        assert_eq!(nodes.to_string_value(), "12");

        let empty: TypedValue<MemNode<'_>> = TypedValue::NodeSet(vec![]);
        assert!(!empty.to_bool());
        assert!(empty.to_number().is_nan());
        assert!(!TypedValue::<MemNode<'_>>::Number(f64::NAN).to_bool());
        assert_eq!(TypedValue::<MemNode<'_>>::Boolean(true).to_string_value(), "true");
        assert!(TypedValue::<MemNode<'_>>::String("x".into()).into_nodes().is_empty());
    }
}
