//! A small path-expression evaluator for driving the engine without a full
//! XPath implementation.
//!
//! Supported: location paths over the child, descendant, attribute, parent,
//! ancestor, self and sibling axes with predicates; `|`; comparisons; arithmetic;
//! string and number literals; variables by slot (`$0`); and the functions listed
//! in the `functions` module. Unprefixed name tests match on local name alone.
//!
//! A pattern matches a node when evaluating it from the node or one of its
//! ancestors selects the node.
mod functions;
mod parser;
mod syntax;

pub use parser::parse_expression;
pub use syntax::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};

use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use trellis_dtm::{NodeKind, SourceNode};
use trellis_traits::{EvalContext, Expr, TypedValue, XPathError, XPathEvaluator};

/// Evaluator with a cache of parsed expressions keyed by source text.
#[derive(Debug, Default)]
pub struct SimplePathEvaluator {
    cache: RwLock<HashMap<Arc<str>, Arc<Expression>>>,
}

impl SimplePathEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled(&self, expr: &Expr) -> Result<Arc<Expression>, XPathError> {
        if let Some(parsed) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(expr.as_str()).cloned())
        {
            return Ok(parsed);
        }
        let parsed = Arc::new(parse_expression(expr.as_str())?);
        trace!("Compiled expression '{}'", expr);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(Arc::from(expr.as_str()), parsed.clone());
        }
        Ok(parsed)
    }

    /// Number of distinct expressions compiled so far.
    pub fn cached_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl<'a, N: SourceNode<'a>> XPathEvaluator<'a, N> for SimplePathEvaluator {
    fn evaluate(&self, expr: &Expr, ctx: &EvalContext<'_, N>) -> Result<TypedValue<N>, XPathError> {
        let parsed = self.compiled(expr)?;
        let focus = Focus {
            node: ctx.node,
            position: ctx.position,
            size: ctx.size,
        };
        Engine { ctx }.eval(&parsed, focus)
    }

    fn matches(&self, pattern: &Expr, ctx: &EvalContext<'_, N>) -> Result<bool, XPathError> {
        let parsed = self.compiled(pattern)?;
        let engine = Engine { ctx };
        let target = ctx.node;
        let mut context = Some(target);
        while let Some(node) = context {
            let focus = Focus {
                node,
                position: 1,
                size: 1,
            };
            if let TypedValue::NodeSet(selected) = engine.eval(&parsed, focus)? {
                if selected.contains(&target) {
                    return Ok(true);
                }
            }
            context = node.parent();
        }
        Ok(false)
    }
}

/// The node, position and size an expression is evaluated against. Changes as
/// predicates and steps are applied; the rest of the context does not.
#[derive(Debug, Clone, Copy)]
struct Focus<N> {
    node: N,
    position: usize,
    size: usize,
}

struct Engine<'e, 'c, N> {
    ctx: &'e EvalContext<'c, N>,
}

impl<'e, 'c, 'a, N: SourceNode<'a>> Engine<'e, 'c, N> {
    fn eval(&self, expr: &Expression, focus: Focus<N>) -> Result<TypedValue<N>, XPathError> {
        match expr {
            Expression::Literal(s) => Ok(TypedValue::String(s.clone())),
            Expression::Number(n) => Ok(TypedValue::Number(*n)),
            Expression::Variable(slot) => self
                .ctx
                .variable(*slot)
                .cloned()
                .ok_or(XPathError::UnboundVariable(*slot)),
            Expression::Path(path) => self.eval_path(path, focus).map(TypedValue::NodeSet),
            Expression::FunctionCall { name, args } => functions::call(self, name, args, focus),
            Expression::Negate(inner) => Ok(TypedValue::Number(-self.eval(inner, focus)?.to_number())),
            Expression::Binary { left, op, right } => self.eval_binary(left, *op, right, focus),
        }
    }

    fn eval_binary(
        &self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
        focus: Focus<N>,
    ) -> Result<TypedValue<N>, XPathError> {
        match op {
            BinaryOperator::Or => {
                let l = self.eval(left, focus)?.to_bool();
                Ok(TypedValue::Boolean(l || self.eval(right, focus)?.to_bool()))
            }
            BinaryOperator::And => {
                let l = self.eval(left, focus)?.to_bool();
                Ok(TypedValue::Boolean(l && self.eval(right, focus)?.to_bool()))
            }
            BinaryOperator::Union => {
                let mut nodes = self.node_set(left, focus, "|")?;
                nodes.extend(self.node_set(right, focus, "|")?);
                nodes.sort();
                nodes.dedup();
                Ok(TypedValue::NodeSet(nodes))
            }
            BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => {
                let l = self.eval(left, focus)?.to_number();
                let r = self.eval(right, focus)?.to_number();
                Ok(TypedValue::Number(match op {
                    BinaryOperator::Plus => l + r,
                    BinaryOperator::Minus => l - r,
                    BinaryOperator::Multiply => l * r,
                    BinaryOperator::Divide => l / r,
                    _ => l % r,
                }))
            }
            _ => {
                let l = self.eval(left, focus)?;
                let r = self.eval(right, focus)?;
                Ok(TypedValue::Boolean(compare(&l, op, &r)))
            }
        }
    }

    pub(crate) fn node_set(
        &self,
        expr: &Expression,
        focus: Focus<N>,
        what: &str,
    ) -> Result<Vec<N>, XPathError> {
        match self.eval(expr, focus)? {
            TypedValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::Type(format!(
                "{} expects a node-set, found {:?}",
                what,
                other.to_string_value()
            ))),
        }
    }

    fn eval_path(&self, path: &LocationPath, focus: Focus<N>) -> Result<Vec<N>, XPathError> {
        let mut current = match &path.start {
            Some(start) => self.node_set(start, focus, "a path step")?,
            None if path.absolute => vec![focus.node.root()],
            None => vec![focus.node],
        };
        for step in &path.steps {
            let mut next = Vec::new();
            for node in current {
                next.extend(self.eval_step(step, node)?);
            }
            next.sort();
            next.dedup();
            current = next;
        }
        Ok(current)
    }

    fn eval_step(&self, step: &Step, node: N) -> Result<Vec<N>, XPathError> {
        let mut selected: Vec<N> = axis_nodes(step.axis, node)
            .into_iter()
            .filter(|n| node_test(&step.test, step.axis, *n, self.ctx))
            .collect();
        for predicate in &step.predicates {
            let size = selected.len();
            let mut kept = Vec::with_capacity(size);
            for (i, candidate) in selected.into_iter().enumerate() {
                let focus = Focus {
                    node: candidate,
                    position: i + 1,
                    size,
                };
                let keep = match self.eval(predicate, focus)? {
                    TypedValue::Number(n) => n == (i + 1) as f64,
                    other => other.to_bool(),
                };
                if keep {
                    kept.push(candidate);
                }
            }
            selected = kept;
        }
        Ok(selected)
    }
}

/// Nodes along `axis` in proximity order.
fn axis_nodes<'a, N: SourceNode<'a>>(axis: Axis, node: N) -> Vec<N> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::Attribute => node.attributes().collect(),
        Axis::SelfAxis => vec![node],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Descendant | Axis::DescendantOrSelf => {
            let mut out = Vec::new();
            if axis == Axis::DescendantOrSelf {
                out.push(node);
            }
            let mut pending: Vec<N> = node.children().collect();
            pending.reverse();
            while let Some(next) = pending.pop() {
                out.push(next);
                let mut children: Vec<N> = next.children().collect();
                children.reverse();
                pending.extend(children);
            }
            out
        }
        Axis::Ancestor | Axis::AncestorOrSelf => {
            let mut out = Vec::new();
            if axis == Axis::AncestorOrSelf {
                out.push(node);
            }
            let mut current = node.parent();
            while let Some(parent) = current {
                out.push(parent);
                current = parent.parent();
            }
            out
        }
        Axis::PrecedingSibling => {
            let mut siblings = node.preceding_siblings();
            siblings.reverse();
            siblings
        }
        Axis::FollowingSibling => match node.parent() {
            Some(parent) if node.node_kind() != NodeKind::Attribute => {
                parent.children().skip_while(|c| *c != node).skip(1).collect()
            }
            _ => Vec::new(),
        },
    }
}

fn node_test<'a, N: SourceNode<'a>>(
    test: &NodeTest,
    axis: Axis,
    node: N,
    ctx: &EvalContext<'_, N>,
) -> bool {
    let kind = node.node_kind();
    let principal = if axis == Axis::Attribute {
        NodeKind::Attribute
    } else {
        NodeKind::Element
    };
    match test {
        NodeTest::NodeType(NodeTypeTest::Node) => true,
        NodeTest::NodeType(NodeTypeTest::Text) => kind.is_character_data(),
        NodeTest::NodeType(NodeTypeTest::Comment) => kind == NodeKind::Comment,
        NodeTest::NodeType(NodeTypeTest::ProcessingInstruction) => {
            kind == NodeKind::ProcessingInstruction
        }
        NodeTest::Wildcard(prefix) => {
            kind == principal
                && prefix
                    .as_deref()
                    .is_none_or(|p| prefix_matches(p, node, ctx))
        }
        NodeTest::Name { prefix, local } => {
            kind == principal
                && node.name().is_some_and(|q| q.local_part == local)
                && prefix
                    .as_deref()
                    .is_none_or(|p| prefix_matches(p, node, ctx))
        }
    }
}

// A prefix bound in the expression's context compares namespace URIs; an
// unbound one compares the node's own prefix.
fn prefix_matches<'a, N: SourceNode<'a>>(prefix: &str, node: N, ctx: &EvalContext<'_, N>) -> bool {
    match ctx.namespace_uri(prefix) {
        Some(uri) => node.namespace_uri() == Some(uri),
        None => node.name().and_then(|q| q.prefix) == Some(prefix),
    }
}

fn compare<'a, N: SourceNode<'a>>(
    left: &TypedValue<N>,
    op: BinaryOperator,
    right: &TypedValue<N>,
) -> bool {
    use TypedValue::*;
    match (left, right) {
        (NodeSet(l), NodeSet(r)) => l.iter().any(|a| {
            let a = a.string_value();
            r.iter().any(|b| compare_atoms::<N>(&String(a.clone()), op, &String(b.string_value())))
        }),
        (NodeSet(nodes), other) => nodes
            .iter()
            .any(|n| compare_atoms(&atomize(*n, other), op, other)),
        (other, NodeSet(nodes)) => nodes
            .iter()
            .any(|n| compare_atoms(other, op, &atomize(*n, other))),
        _ => compare_atoms(left, op, right),
    }
}

// A node compared with a non-node value takes that value's type.
fn atomize<'a, N: SourceNode<'a>>(node: N, like: &TypedValue<N>) -> TypedValue<N> {
    match like {
        TypedValue::Number(_) => TypedValue::Number(trellis_traits::parse_number(&node.string_value())),
        TypedValue::Boolean(_) => TypedValue::Boolean(true),
        _ => TypedValue::String(node.string_value()),
    }
}

fn compare_atoms<'a, N: SourceNode<'a>>(
    left: &TypedValue<N>,
    op: BinaryOperator,
    right: &TypedValue<N>,
) -> bool {
    use TypedValue::*;
    match op {
        BinaryOperator::Equals | BinaryOperator::NotEquals => {
            let equal = match (left, right) {
                (Boolean(_), _) | (_, Boolean(_)) => left.to_bool() == right.to_bool(),
                (Number(_), _) | (_, Number(_)) => left.to_number() == right.to_number(),
                _ => left.to_string_value() == right.to_string_value(),
            };
            equal == (op == BinaryOperator::Equals)
        }
        _ => {
            let (l, r) = (left.to_number(), right.to_number());
            match op {
                BinaryOperator::LessThan => l < r,
                BinaryOperator::LessThanOrEqual => l <= r,
                BinaryOperator::GreaterThan => l > r,
                _ => l >= r,
            }
        }
    }
}
