//! Multi-key sorting of node lists.
//!
//! Nodes are wrapped in [`NodeCompareElem`]s that carry the values of the first two
//! sort keys, computed once up front. Later keys are evaluated only when the
//! earlier ones tie. The sort is a top-down merge sort, so equal elements keep
//! their input order, and a final document-order comparison breaks any remaining
//! tie.
use crate::ast::{CaseOrder, SortDataType, SortKey, SortOrder};
use crate::error::XsltError;
use crate::state::ActiveGroup;
use log::trace;
use std::borrow::Cow;
use std::cmp::Ordering;
use trellis_dtm::SourceNode;
use trellis_traits::{CollationKey, TypedValue};

/// How NaN number keys order against numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NanOrdering {
    /// NaN compares as 0.
    TreatAsZero,
    /// NaN sorts before every number (after, when descending).
    SortFirst,
}

/// The comparable value of one sort key for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Number(f64),
    Text { key: CollationKey, text: String },
}

/// A node prepared for sorting.
#[derive(Debug, Clone)]
pub struct NodeCompareElem<N> {
    pub node: N,
    /// Position of the node in the unsorted input.
    pub index: usize,
    cached: [Option<KeyValue>; 2],
}

/// Evaluates sort keys on behalf of the sorters. The engine implements this.
pub trait SortKeyEvaluator<'a, N: SourceNode<'a>> {
    fn evaluate_sort_key(
        &mut self,
        key: &SortKey,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<TypedValue<N>, XsltError>;

    fn collation_key(&self, key: &SortKey, text: &str) -> CollationKey;

    /// Installs `group` as the current group, returning the previous one.
    fn replace_current_group(&mut self, group: Option<ActiveGroup<N>>) -> Option<ActiveGroup<N>>;
}

pub(crate) struct KeyComparator<'k> {
    pub(crate) keys: &'k [SortKey],
    nan: NanOrdering,
}

impl<'k> KeyComparator<'k> {
    pub(crate) fn new(keys: &'k [SortKey], nan: NanOrdering) -> Self {
        Self { keys, nan }
    }

    pub(crate) fn key_value<'a, N: SourceNode<'a>>(
        &self,
        key: &SortKey,
        value: &TypedValue<N>,
        collate: impl FnOnce(&str) -> CollationKey,
    ) -> KeyValue {
        match key.data_type {
            SortDataType::Number => {
                let n = value.to_number();
                if n.is_nan() && self.nan == NanOrdering::TreatAsZero {
                    KeyValue::Number(0.0)
                } else {
                    KeyValue::Number(n)
                }
            }
            SortDataType::Text => {
                let text = value.to_string_value();
                KeyValue::Text {
                    key: collate(&text),
                    text,
                }
            }
        }
    }

    /// Wraps `node`, evaluating up to two keys eagerly.
    pub(crate) fn prepare<N: Copy>(
        &self,
        node: N,
        index: usize,
        fetch: &mut impl FnMut(usize, N, usize) -> Result<KeyValue, XsltError>,
    ) -> Result<NodeCompareElem<N>, XsltError> {
        let mut cached = [None, None];
        for (k, slot) in cached.iter_mut().enumerate().take(self.keys.len()) {
            *slot = Some(fetch(k, node, index)?);
        }
        Ok(NodeCompareElem {
            node,
            index,
            cached,
        })
    }

    fn compare_values(&self, key: &SortKey, a: &KeyValue, b: &KeyValue) -> Ordering {
        let ordering = match (a, b) {
            (KeyValue::Number(x), KeyValue::Number(y)) => self.compare_numbers(*x, *y),
            (KeyValue::Text { key: ka, text: ta }, KeyValue::Text { key: kb, text: tb }) => {
                let ordering = ka.cmp(kb);
                if key.case_order == CaseOrder::UpperFirst
                    && ordering != Ordering::Equal
                    && ta.to_lowercase() == tb.to_lowercase()
                {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            _ => Ordering::Equal,
        };
        match key.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    fn compare_numbers(&self, x: f64, y: f64) -> Ordering {
        match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        }
    }

    pub(crate) fn compare<N: Copy + Ord>(
        &self,
        a: &NodeCompareElem<N>,
        b: &NodeCompareElem<N>,
        fetch: &mut impl FnMut(usize, N, usize) -> Result<KeyValue, XsltError>,
    ) -> Result<Ordering, XsltError> {
        for (k, key) in self.keys.iter().enumerate() {
            let va = match a.cached.get(k).and_then(Option::as_ref) {
                Some(v) => Cow::Borrowed(v),
                None => Cow::Owned(fetch(k, a.node, a.index)?),
            };
            let vb = match b.cached.get(k).and_then(Option::as_ref) {
                Some(v) => Cow::Borrowed(v),
                None => Cow::Owned(fetch(k, b.node, b.index)?),
            };
            let ordering = self.compare_values(key, &va, &vb);
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(a.node.cmp(&b.node))
    }
}

/// Sorts plain node lists for `apply-templates` and `for-each`.
pub struct NodeSorter<'k> {
    comparator: KeyComparator<'k>,
}

impl<'k> NodeSorter<'k> {
    pub fn new(keys: &'k [SortKey]) -> Self {
        Self {
            comparator: KeyComparator::new(keys, NanOrdering::TreatAsZero),
        }
    }

    /// Uses a different NaN policy than the default.
    pub fn with_nan_ordering(keys: &'k [SortKey], nan: NanOrdering) -> Self {
        Self {
            comparator: KeyComparator::new(keys, nan),
        }
    }

    pub fn sort<'a, N, E>(&self, nodes: &mut [N], eval: &mut E) -> Result<(), XsltError>
    where
        N: SourceNode<'a>,
        E: SortKeyEvaluator<'a, N> + ?Sized,
    {
        if self.comparator.keys.is_empty() || nodes.len() < 2 {
            return Ok(());
        }
        let size = nodes.len();
        let comparator = &self.comparator;
        let mut fetch = |k: usize, node: N, index: usize| -> Result<KeyValue, XsltError> {
            let key = &comparator.keys[k];
            let value = eval.evaluate_sort_key(key, node, index + 1, size)?;
            Ok(comparator.key_value(key, &value, |text| eval.collation_key(key, text)))
        };

        let elems = nodes
            .iter()
            .enumerate()
            .map(|(index, &node)| comparator.prepare(node, index, &mut fetch))
            .collect::<Result<Vec<_>, _>>()?;
        let order = merge_sort_indices(elems.len(), |i, j| {
            comparator.compare(&elems[i], &elems[j], &mut fetch)
        })?;
        for (slot, index) in nodes.iter_mut().zip(order) {
            *slot = elems[index].node;
        }
        trace!("Sorted {} nodes on {} keys", size, comparator.keys.len());
        Ok(())
    }
}

/// Stable top-down merge sort over `0..len`, returning the sorted index order.
/// The first comparator error aborts the sort.
pub(crate) fn merge_sort_indices<E>(
    len: usize,
    mut compare: impl FnMut(usize, usize) -> Result<Ordering, E>,
) -> Result<Vec<usize>, E> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut scratch = order.clone();
    merge_sort_range(&mut order, &mut scratch, 0, len, &mut compare)?;
    Ok(order)
}

fn merge_sort_range<E, F>(
    order: &mut [usize],
    scratch: &mut [usize],
    lo: usize,
    hi: usize,
    compare: &mut F,
) -> Result<(), E>
where
    F: FnMut(usize, usize) -> Result<Ordering, E>,
{
    if hi - lo < 2 {
        return Ok(());
    }
    let mid = lo + (hi - lo) / 2;
    merge_sort_range(order, scratch, lo, mid, compare)?;
    merge_sort_range(order, scratch, mid, hi, compare)?;
    if compare(order[mid - 1], order[mid])? != Ordering::Greater {
        return Ok(());
    }

    scratch[lo..hi].copy_from_slice(&order[lo..hi]);
    let (mut left, mut right) = (lo, mid);
    for slot in order[lo..hi].iter_mut() {
        let take_right = if left >= mid {
            true
        } else if right >= hi {
            false
        } else {
            compare(scratch[right], scratch[left])? == Ordering::Less
        };
        if take_right {
            *slot = scratch[right];
            right += 1;
        } else {
            *slot = scratch[left];
            left += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_dtm::{MemNode, MemTree, TreeBuilder};
    use trellis_traits::{Collator, RootCollator};

    /// Reads key values from the `n` and `s` attributes of each row.
    struct AttributeKeys {
        evaluations: usize,
    }

    impl<'a> SortKeyEvaluator<'a, MemNode<'a>> for AttributeKeys {
        fn evaluate_sort_key(
            &mut self,
            key: &SortKey,
            node: MemNode<'a>,
            _position: usize,
            _size: usize,
        ) -> Result<TypedValue<MemNode<'a>>, XsltError> {
            self.evaluations += 1;
            let name = key.select.as_str().trim_start_matches('@');
            if name == "fail" {
                return Err(XsltError::execution("key evaluation failed"));
            }
            let value = node
                .attributes()
                .find(|a| a.name().map(|q| q.local_part) == Some(name))
                .map(|a| a.string_value())
                .unwrap_or_default();
            Ok(TypedValue::String(value))
        }

        fn collation_key(&self, key: &SortKey, text: &str) -> CollationKey {
            RootCollator.collation_key(text, key.lang.as_deref())
        }

        fn replace_current_group(
            &mut self,
            _group: Option<ActiveGroup<MemNode<'a>>>,
        ) -> Option<ActiveGroup<MemNode<'a>>> {
            None
        }
    }

    fn rows(values: &[(&str, &str)]) -> MemTree {
        let mut b = TreeBuilder::new();
        b.start_element("rows");
        for (n, s) in values {
            b.start_element("row");
            b.attribute("n", n);
            b.attribute("s", s);
            b.end_element();
        }
        b.end_element();
        b.finish()
    }

    fn row_nodes(tree: &MemTree) -> Vec<MemNode<'_>> {
        tree.root().children().next().unwrap().children().collect()
    }

    fn pairs(nodes: &[MemNode<'_>]) -> Vec<(String, String)> {
        nodes
            .iter()
            .map(|n| {
                let mut attrs = n.attributes().map(|a| a.string_value());
                (attrs.next().unwrap(), attrs.next().unwrap())
            })
            .collect()
    }

    #[test]
    fn test_two_keys_numeric_then_text_descending() {
        let tree = rows(&[("2", "b"), ("1", "a"), ("1", "z")]);
        let mut nodes = row_nodes(&tree);
        let keys = vec![SortKey::number("@n"), SortKey::text("@s").descending()];
        let mut eval = AttributeKeys { evaluations: 0 };
        NodeSorter::new(&keys).sort(&mut nodes, &mut eval).unwrap();
        assert_eq!(
            pairs(&nodes),
            vec![
                ("1".to_string(), "z".to_string()),
                ("1".to_string(), "a".to_string()),
                ("2".to_string(), "b".to_string()),
            ]
        );
        // Two keys for three nodes, all computed up front.
        assert_eq!(eval.evaluations, 6);
    }

    #[test]
    fn test_equal_keys_keep_document_order() {
        let tree = rows(&[("x", "1"), ("0", "2"), ("x", "3"), ("0", "4")]);
        let mut nodes = row_nodes(&tree);
        let original = nodes.clone();
        let keys = vec![SortKey::number("@n")];
        NodeSorter::new(&keys)
            .sort(&mut nodes, &mut AttributeKeys { evaluations: 0 })
            .unwrap();
        // NaN counts as zero, so every key ties.
        assert_eq!(nodes, original);
    }

    #[test]
    fn test_nan_first_policy() {
        let tree = rows(&[("3", "a"), ("x", "b"), ("1", "c")]);
        let mut nodes = row_nodes(&tree);
        let keys = vec![SortKey::number("@n")];
        NodeSorter::with_nan_ordering(&keys, NanOrdering::SortFirst)
            .sort(&mut nodes, &mut AttributeKeys { evaluations: 0 })
            .unwrap();
        let order: Vec<String> = pairs(&nodes).into_iter().map(|(_, s)| s).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_third_key_evaluated_only_on_ties() {
        let tree = rows(&[("1", "a"), ("2", "a"), ("3", "a")]);
        let mut nodes = row_nodes(&tree);
        nodes.reverse();
        let keys = vec![
            SortKey::number("@n"),
            SortKey::text("@s"),
            SortKey::text("@fail"),
        ];
        let mut eval = AttributeKeys { evaluations: 0 };
        NodeSorter::new(&keys).sort(&mut nodes, &mut eval).unwrap();
        let order: Vec<String> = pairs(&nodes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
        assert_eq!(eval.evaluations, 6);
    }

    #[test]
    fn test_key_error_aborts_sort() {
        let tree = rows(&[("1", "a"), ("1", "a")]);
        let mut nodes = row_nodes(&tree);
        let keys = vec![
            SortKey::number("@n"),
            SortKey::text("@s"),
            SortKey::text("@fail"),
        ];
        let result = NodeSorter::new(&keys).sort(&mut nodes, &mut AttributeKeys { evaluations: 0 });
        assert!(matches!(result, Err(XsltError::Execution(_))));
    }

    #[test]
    fn test_case_order() {
        let tree = rows(&[("0", "b"), ("0", "A"), ("0", "a"), ("0", "B")]);
        let mut lower = row_nodes(&tree);
        let keys = vec![SortKey::text("@s")];
        NodeSorter::new(&keys)
            .sort(&mut lower, &mut AttributeKeys { evaluations: 0 })
            .unwrap();
        let order: Vec<String> = pairs(&lower).into_iter().map(|(_, s)| s).collect();
        assert_eq!(order, vec!["a", "A", "b", "B"]);

        let mut upper = row_nodes(&tree);
        let keys = vec![SortKey::text("@s").upper_first()];
        NodeSorter::new(&keys)
            .sort(&mut upper, &mut AttributeKeys { evaluations: 0 })
            .unwrap();
        let order: Vec<String> = pairs(&upper).into_iter().map(|(_, s)| s).collect();
        assert_eq!(order, vec!["A", "a", "B", "b"]);
    }

    #[test]
    fn test_merge_sort_is_stable() {
        let values = [3, 1, 2, 1, 3, 2, 1];
        let order = merge_sort_indices(values.len(), |i, j| {
            Ok::<_, ()>(values[i].cmp(&values[j]))
        })
        .unwrap();
        assert_eq!(order, vec![1, 3, 6, 2, 5, 0, 4]);
    }
}
