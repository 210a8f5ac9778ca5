use crate::ast::{Instruction, When};
use crate::error::XsltError;
use crate::transformer::Transformer;
use trellis_dtm::SourceNode;
use trellis_traits::Expr;

pub(crate) fn handle_if<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    test: &Expr,
    body: &'s [Instruction],
    node: N,
) -> Result<(), XsltError> {
    if executor.evaluate(test, node)?.to_bool() {
        executor.execute_children(body, node)?;
    }
    Ok(())
}

/// Runs the body of the first `when` whose test holds, or `otherwise`.
pub(crate) fn handle_choose<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    whens: &'s [When],
    otherwise: &'s [Instruction],
    node: N,
) -> Result<(), XsltError> {
    for when in whens {
        if executor.evaluate(&when.test, node)?.to_bool() {
            return executor.execute_children(&when.body, node);
        }
    }
    executor.execute_children(otherwise, node)
}
