//! Groups formed by `for-each-group`, and sorting them.
use crate::ast::SortKey;
use crate::error::XsltError;
use crate::sort::{KeyComparator, KeyValue, NanOrdering, SortKeyEvaluator, merge_sort_indices};
use crate::state::ActiveGroup;
use log::trace;
use std::collections::HashMap;
use trellis_dtm::SourceNode;

/// One group: its members in population order, the first being the head.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<N> {
    pub members: Vec<N>,
    pub key: Option<String>,
}

impl<N: Copy> Group<N> {
    pub fn head(&self) -> Option<N> {
        self.members.first().copied()
    }
}

/// Groups `population` by one or more string keys per node. Groups appear in
/// order of first appearance; a node with several keys joins several groups.
pub fn group_by<N: Copy, E>(
    population: &[N],
    mut keys_of: impl FnMut(N) -> Result<Vec<String>, E>,
) -> Result<Vec<Group<N>>, E> {
    let mut groups: Vec<Group<N>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for &node in population {
        let mut keys = keys_of(node)?;
        keys.dedup();
        for key in keys {
            match index.get(&key) {
                Some(&i) => groups[i].members.push(node),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(Group {
                        members: vec![node],
                        key: Some(key),
                    });
                }
            }
        }
    }
    Ok(groups)
}

/// Groups runs of adjacent nodes sharing a key.
pub fn group_adjacent<N: Copy, E>(
    population: &[N],
    mut key_of: impl FnMut(N) -> Result<String, E>,
) -> Result<Vec<Group<N>>, E> {
    let mut groups: Vec<Group<N>> = Vec::new();
    for &node in population {
        let key = key_of(node)?;
        match groups.last_mut() {
            Some(group) if group.key.as_deref() == Some(key.as_str()) => group.members.push(node),
            _ => groups.push(Group {
                members: vec![node],
                key: Some(key),
            }),
        }
    }
    Ok(groups)
}

/// A restartable cursor over group heads.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingIterator<N> {
    groups: Vec<Group<N>>,
    cursor: usize,
    found_last: bool,
}

impl<N: Copy + PartialEq> GroupingIterator<N> {
    pub fn new(groups: Vec<Group<N>>) -> Self {
        Self {
            groups,
            cursor: 0,
            found_last: false,
        }
    }

    /// The next group head, `None` once every group was visited.
    pub fn next_node(&mut self) -> Option<N> {
        match self.groups.get(self.cursor).and_then(Group::head) {
            Some(head) => {
                self.cursor += 1;
                if self.cursor == self.groups.len() {
                    self.found_last = true;
                }
                Some(head)
            }
            None => {
                self.found_last = true;
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.found_last = false;
    }

    /// True once iteration has reached the last group.
    pub fn found_last(&self) -> bool {
        self.found_last
    }

    /// The members of the group headed by `head`.
    pub fn sequence(&self, head: N) -> Option<&[N]> {
        self.groups
            .iter()
            .find(|g| g.head() == Some(head))
            .map(|g| g.members.as_slice())
    }

    pub fn item(&self, index: usize) -> Option<&Group<N>> {
        self.groups.get(index)
    }

    pub fn set_item(&mut self, index: usize, group: Group<N>) -> bool {
        match self.groups.get_mut(index) {
            Some(slot) => {
                *slot = group;
                true
            }
            None => false,
        }
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.groups.len() && b < self.groups.len() {
            self.groups.swap(a, b);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Group<N>] {
        &self.groups
    }

    pub fn heads(&self) -> Vec<N> {
        self.groups.iter().filter_map(Group::head).collect()
    }
}

impl<N: Copy + PartialEq> Iterator for GroupingIterator<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        self.next_node()
    }
}

/// Sorts groups by keys evaluated with the group installed as the current
/// group, so keys like `count(current-group())` see its members. The previous
/// current group is restored after every evaluation, including failed ones.
/// NaN number keys sort first.
pub struct GroupSorter<'k> {
    comparator: KeyComparator<'k>,
}

impl<'k> GroupSorter<'k> {
    pub fn new(keys: &'k [SortKey]) -> Self {
        Self {
            comparator: KeyComparator::new(keys, NanOrdering::SortFirst),
        }
    }

    pub fn sort<'a, N, E>(
        &self,
        groups: &mut GroupingIterator<N>,
        eval: &mut E,
    ) -> Result<(), XsltError>
    where
        N: SourceNode<'a>,
        E: SortKeyEvaluator<'a, N> + ?Sized,
    {
        if self.comparator.keys.is_empty() || groups.len() < 2 {
            return Ok(());
        }
        let size = groups.len();
        let snapshot: Vec<Group<N>> = groups.groups().to_vec();
        let comparator = &self.comparator;
        let mut fetch = |k: usize, head: N, index: usize| -> Result<KeyValue, XsltError> {
            let key = &comparator.keys[k];
            let members = snapshot
                .get(index)
                .map(|g| g.members.clone())
                .unwrap_or_else(|| vec![head]);
            let group_key = snapshot.get(index).and_then(|g| g.key.clone());
            let previous = eval.replace_current_group(Some(ActiveGroup {
                members,
                key: group_key,
            }));
            let value = eval.evaluate_sort_key(key, head, index + 1, size);
            eval.replace_current_group(previous);
            let value = value?;
            Ok(comparator.key_value(key, &value, |text| eval.collation_key(key, text)))
        };

        let elems = snapshot
            .iter()
            .enumerate()
            .filter_map(|(index, g)| g.head().map(|head| (index, head)))
            .map(|(index, head)| comparator.prepare(head, index, &mut fetch))
            .collect::<Result<Vec<_>, _>>()?;
        let order = merge_sort_indices(elems.len(), |i, j| {
            comparator.compare(&elems[i], &elems[j], &mut fetch)
        })?;
        for (slot, sorted) in order.into_iter().enumerate() {
            groups.set_item(slot, snapshot[elems[sorted].index].clone());
        }
        groups.reset();
        trace!("Sorted {} groups", size);
        Ok(())
    }
}
