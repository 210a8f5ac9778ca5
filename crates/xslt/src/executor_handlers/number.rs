//! `xsl:number` at level single.
use crate::error::XsltError;
use crate::transformer::Transformer;
use log::trace;
use trellis_dtm::SourceNode;
use trellis_traits::Expr;

pub(crate) fn handle_number<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    counter: usize,
    count: Option<&Expr>,
    node: N,
) -> Result<(), XsltError> {
    let Some(target) = counted_ancestor_or_self(executor, count, node)? else {
        trace!("Nothing to number for counter {}", counter);
        return Ok(());
    };
    let value = sibling_number(executor, counter, count, node, target)?;
    executor.result.characters(&value.to_string())
}

/// The nearest ancestor-or-self of `node` that the counter counts.
fn counted_ancestor_or_self<'s, 'a, N: SourceNode<'a>>(
    executor: &Transformer<'s, 'a, N>,
    count: Option<&Expr>,
    node: N,
) -> Result<Option<N>, XsltError> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if is_counted(executor, count, node, candidate)? {
            return Ok(Some(candidate));
        }
        current = candidate.parent();
    }
    Ok(None)
}

/// One plus the number of counted preceding siblings of `target`. A cached
/// value on the nearest counted sibling short-circuits the walk.
fn sibling_number<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    counter: usize,
    count: Option<&Expr>,
    node: N,
    target: N,
) -> Result<usize, XsltError> {
    if let Some(cached) = executor.state.counters().lookup(counter, target) {
        return Ok(cached);
    }
    let mut value = 1;
    for sibling in target.preceding_siblings().into_iter().rev() {
        if !is_counted(executor, count, node, sibling)? {
            continue;
        }
        if let Some(cached) = executor.state.counters().lookup(counter, sibling) {
            value += cached;
            break;
        }
        value += 1;
    }
    executor.state.counters_mut().record(counter, target, value);
    Ok(value)
}

fn is_counted<'s, 'a, N: SourceNode<'a>>(
    executor: &Transformer<'s, 'a, N>,
    count: Option<&Expr>,
    node: N,
    candidate: N,
) -> Result<bool, XsltError> {
    match count {
        Some(pattern) => executor.matches(pattern, candidate),
        None => Ok(candidate.node_kind() == node.node_kind()
            && candidate.namespace_uri() == node.namespace_uri()
            && candidate.name().map(|q| q.local_part) == node.name().map(|q| q.local_part)),
    }
}
