use crate::ast::{Grouping, Instruction, SortKey};
use crate::error::XsltError;
use crate::grouping::{GroupSorter, GroupingIterator, group_adjacent, group_by};
use crate::state::{ActiveGroup, ContextNodeList};
use crate::transformer::Transformer;
use log::debug;
use trellis_dtm::SourceNode;
use trellis_traits::{Expr, TypedValue};

pub(crate) fn handle_for_each_group<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    select: &Expr,
    grouping: &Grouping,
    sort_keys: &[SortKey],
    body: &'s [Instruction],
    node: N,
) -> Result<(), XsltError> {
    let population = executor.select_nodes(select, node)?;
    let size = population.len();
    let positions = |n: N| population.iter().position(|p| *p == n).map_or(1, |i| i + 1);

    let groups = match grouping {
        Grouping::By(key) => group_by(&population, |n| {
            let value = executor.evaluate_at(key, n, positions(n), size)?;
            Ok::<_, XsltError>(match value {
                TypedValue::NodeSet(nodes) => nodes.iter().map(|k| k.string_value()).collect(),
                other => vec![other.to_string_value()],
            })
        })?,
        Grouping::Adjacent(key) => group_adjacent(&population, |n| {
            Ok::<_, XsltError>(
                executor
                    .evaluate_at(key, n, positions(n), size)?
                    .to_string_value(),
            )
        })?,
    };
    debug!("Formed {} groups from {} nodes", groups.len(), size);

    let mut groups = GroupingIterator::new(groups);
    GroupSorter::new(sort_keys).sort(&mut groups, executor)?;

    executor
        .state
        .push_context_list(ContextNodeList::new(groups.heads()));
    let outcome = run_groups(executor, &groups, body);
    executor.state.pop_context_list();
    outcome
}

fn run_groups<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    groups: &GroupingIterator<N>,
    body: &'s [Instruction],
) -> Result<(), XsltError> {
    for (index, group) in groups.groups().iter().enumerate() {
        let Some(head) = group.head() else { continue };
        executor.state.set_context_position(index + 1);
        let previous = executor.state.replace_current_group(Some(ActiveGroup {
            members: group.members.clone(),
            key: group.key.clone(),
        }));
        executor.state.push_current_node(head);
        let outcome = executor.execute_children(body, head);
        executor.state.pop_current_node();
        executor.state.replace_current_group(previous);
        outcome?;
    }
    Ok(())
}
