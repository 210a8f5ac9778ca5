use crate::ast::{ApplyMode, Instruction, SortKey};
use crate::error::XsltError;
use crate::sort::NodeSorter;
use crate::state::ContextNodeList;
use crate::transformer::Transformer;
use trellis_dtm::SourceNode;
use trellis_traits::Expr;

pub(crate) fn handle_apply_templates<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    instruction: &'s Instruction,
    select: Option<&Expr>,
    mode: &'s ApplyMode,
    sort_keys: &[SortKey],
    node: N,
) -> Result<(), XsltError> {
    let mut nodes = match select {
        Some(select) => executor.select_nodes(select, node)?,
        None => node.children().collect(),
    };
    NodeSorter::new(sort_keys).sort(&mut nodes, executor)?;

    let mode = match mode {
        ApplyMode::Unnamed => None,
        ApplyMode::Named(name) => Some(name.as_str()),
        ApplyMode::Current => executor.state.current_mode(),
    };
    executor.state.push_mode(mode);
    executor
        .state
        .push_context_list(ContextNodeList::new(nodes.clone()));
    let outcome = apply_to_each(executor, instruction, &nodes);
    executor.state.pop_context_list();
    executor.state.pop_mode();
    outcome
}

fn apply_to_each<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    instruction: &'s Instruction,
    nodes: &[N],
) -> Result<(), XsltError> {
    for (index, &node) in nodes.iter().enumerate() {
        executor.state.set_context_position(index + 1);
        executor.apply_rule(Some(instruction), None, node)?;
    }
    Ok(())
}

/// Re-applies rule selection to the current node, considering only rules of
/// lower import precedence than the one being applied.
pub(crate) fn handle_apply_imports<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    instruction: &'s Instruction,
    node: N,
) -> Result<(), XsltError> {
    executor.apply_rule(Some(instruction), None, node).map(|_| ())
}
