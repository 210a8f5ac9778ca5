use crate::ast::{Instruction, SortKey};
use crate::error::XsltError;
use crate::sort::NodeSorter;
use crate::state::ContextNodeList;
use crate::transformer::Transformer;
use trellis_dtm::SourceNode;
use trellis_traits::Expr;

pub(crate) fn handle_for_each<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    select: &Expr,
    sort_keys: &[SortKey],
    body: &'s [Instruction],
    node: N,
) -> Result<(), XsltError> {
    let mut nodes = executor.select_nodes(select, node)?;
    if nodes.is_empty() {
        return Ok(());
    }
    NodeSorter::new(sort_keys).sort(&mut nodes, executor)?;

    executor
        .state
        .push_context_list(ContextNodeList::new(nodes.clone()));
    let outcome = run_body(executor, body, &nodes);
    executor.state.pop_context_list();
    outcome
}

fn run_body<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    body: &'s [Instruction],
    nodes: &[N],
) -> Result<(), XsltError> {
    for (index, &item) in nodes.iter().enumerate() {
        executor.state.set_context_position(index + 1);
        executor.state.push_current_node(item);
        let outcome = executor.execute_children(body, item);
        executor.state.pop_current_node();
        outcome?;
    }
    Ok(())
}
