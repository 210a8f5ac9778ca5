use crate::error::XsltError;
use crate::transformer::Transformer;
use log::trace;
use trellis_dtm::SourceNode;
use trellis_traits::Expr;

/// Binds a local variable in the current frame. Later instructions in the same
/// template see it through `$slot`.
pub(crate) fn handle_variable<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    slot: usize,
    select: &Expr,
    node: N,
) -> Result<(), XsltError> {
    let value = executor.evaluate(select, node)?;
    trace!("Binding slot {} from '{}'", slot, select);
    executor.state.variables_mut().set(slot, value)
}
