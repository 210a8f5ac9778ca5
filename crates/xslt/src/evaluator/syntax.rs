//! Parsed form of the expressions [`super::SimplePathEvaluator`] understands.

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    Path(LocationPath),
    /// A variable reference by frame slot, written `$0`, `$1`, ...
    Variable(usize),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Negate(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Expression the path continues from, as in `key('k', 'v')/name`.
    pub start: Option<Box<Expression>>,
    /// Starts at the root of the context node's tree.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Step {
    pub(crate) fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::NodeType(NodeTypeTest::Node),
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    /// Reverse axes count proximity positions from the context node outwards.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `*`, or `prefix:*` when a prefix is given.
    Wildcard(Option<String>),
    NodeType(NodeTypeTest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTypeTest {
    Text,
    Node,
    Comment,
    ProcessingInstruction,
}
