use crate::ast::Instruction;
use crate::error::XsltError;
use crate::executor_handlers::literals::apply_attribute_sets;
use crate::transformer::Transformer;
use trellis_dtm::{NodeKind, SourceNode};
use trellis_traits::{Expr, TypedValue};

/// Shallow copy of the current node. Elements keep their namespaces but not
/// their attributes; the body supplies the content.
pub(crate) fn handle_copy<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    use_attribute_sets: &'s [String],
    body: &'s [Instruction],
    node: N,
) -> Result<(), XsltError> {
    match node.node_kind() {
        NodeKind::Element => {
            executor.result.clone_to_result_tree(node, false)?;
            executor.result.copy_namespace_declarations(node)?;
            apply_attribute_sets(executor, use_attribute_sets, node)?;
            executor.execute_children(body, node)?;
            end_copied_element(executor, node)
        }
        NodeKind::Document | NodeKind::DocumentFragment => executor.execute_children(body, node),
        _ => {
            let cloned = executor.result.clone_to_result_tree(node, false);
            executor.recover(cloned)
        }
    }
}

pub(crate) fn handle_copy_of<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    select: &Expr,
    node: N,
) -> Result<(), XsltError> {
    match executor.evaluate(select, node)? {
        TypedValue::NodeSet(nodes) => {
            for selected in nodes {
                if selected.node_kind().is_container() {
                    for child in selected.children() {
                        deep_copy(executor, child)?;
                    }
                } else {
                    deep_copy(executor, selected)?;
                }
            }
            Ok(())
        }
        other => {
            let text = other.to_string_value();
            if text.is_empty() {
                return Ok(());
            }
            executor.result.characters(&text)
        }
    }
}

fn deep_copy<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    node: N,
) -> Result<(), XsltError> {
    if node.node_kind() != NodeKind::Element {
        let cloned = executor.result.clone_to_result_tree(node, true);
        return executor.recover(cloned);
    }
    executor.result.clone_to_result_tree(node, true)?;
    for child in node.children() {
        deep_copy(executor, child)?;
    }
    end_copied_element(executor, node)
}

fn end_copied_element<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    node: N,
) -> Result<(), XsltError> {
    let uri = node.namespace_uri().unwrap_or("");
    let local = node.name().map(|q| q.local_part).unwrap_or("");
    executor.result.end_element(uri, local, &node.qualified_name())
}
