//! Indexes built from key declarations, consulted by the `key()` function.
use crate::ast::KeyDeclaration;
use crate::error::XsltError;
use log::debug;
use std::collections::HashMap;
use trellis_dtm::SourceNode;
use trellis_traits::{EvalContext, KeyLookup, TypedValue, XPathEvaluator};

#[derive(Debug, Clone, PartialEq)]
pub struct KeyTable<N> {
    tables: HashMap<String, HashMap<String, Vec<N>>>,
}

impl<N> Default for KeyTable<N> {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }
}

impl<'a, N: SourceNode<'a>> KeyTable<N> {
    /// Indexes every node under `root`, attributes included, in document order.
    pub fn build(
        root: N,
        declarations: &[KeyDeclaration],
        evaluator: &dyn XPathEvaluator<'a, N>,
    ) -> Result<Self, XsltError> {
        let mut table = Self::default();
        for decl in declarations {
            table.tables.entry(decl.name.clone()).or_default();
        }
        if declarations.is_empty() {
            return Ok(table);
        }

        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            table.index_node(node, declarations, evaluator)?;
            for attribute in node.attributes() {
                table.index_node(attribute, declarations, evaluator)?;
            }
            let mut children: Vec<N> = node.children().collect();
            children.reverse();
            pending.extend(children);
        }
        debug!(
            "Built {} key table(s) with {} entries",
            table.tables.len(),
            table.tables.values().map(HashMap::len).sum::<usize>()
        );
        Ok(table)
    }

    fn index_node(
        &mut self,
        node: N,
        declarations: &[KeyDeclaration],
        evaluator: &dyn XPathEvaluator<'a, N>,
    ) -> Result<(), XsltError> {
        let ctx = EvalContext::new(node);
        for decl in declarations {
            if !evaluator.matches(&decl.match_pattern, &ctx)? {
                continue;
            }
            let values = match evaluator.evaluate(&decl.use_expr, &ctx)? {
                TypedValue::NodeSet(nodes) => nodes.iter().map(|n| n.string_value()).collect(),
                other => vec![other.to_string_value()],
            };
            let index = self.tables.entry(decl.name.clone()).or_default();
            for value in values {
                let entry = index.entry(value).or_default();
                if entry.last() != Some(&node) {
                    entry.push(node);
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

impl<N> KeyLookup<N> for KeyTable<N> {
    fn lookup(&self, name: &str, value: &str) -> Option<&[N]> {
        self.tables
            .get(name)
            .map(|index| index.get(value).map(Vec::as_slice).unwrap_or(&[]))
    }
}
