//! Point-in-time copies of a transformation's mutable state.
//!
//! A [`TransformSnapshot`] owns independent copies of every execution stack and
//! of the result tree's pending events and namespace context. Mutating the live
//! transformer after taking one never changes it, and applying it overwrites the
//! live state wholesale.
use crate::result_tree::{ResultTreeHandler, ResultTreeState};
use crate::state::ExecutionState;
use crate::transformer::Transformer;
use log::debug;
use trellis_dtm::SourceNode;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformSnapshot<'s, N: Eq + std::hash::Hash> {
    state: ExecutionState<'s, N>,
    result: ResultTreeState,
}

impl<'s, N: Copy + Eq + std::hash::Hash> TransformSnapshot<'s, N> {
    pub fn capture(state: &ExecutionState<'s, N>, result: &ResultTreeHandler<'_>) -> Self {
        Self {
            state: state.clone(),
            result: result.capture_state(),
        }
    }

    /// Overwrites `state` and `result` with the captured values. The snapshot
    /// stays usable and can be applied again.
    pub fn apply_to(&self, state: &mut ExecutionState<'s, N>, result: &mut ResultTreeHandler<'_>) {
        *state = self.state.clone();
        result.restore_state(&self.result);
    }

    pub fn state(&self) -> &ExecutionState<'s, N> {
        &self.state
    }

    pub fn result_state(&self) -> &ResultTreeState {
        &self.result
    }
}

impl<'s, 'a, N: SourceNode<'a>> Transformer<'s, 'a, N> {
    pub fn snapshot(&self) -> TransformSnapshot<'s, N> {
        debug!(
            "Capturing snapshot at template depth {}",
            self.state.template_depth()
        );
        TransformSnapshot::capture(&self.state, &self.result)
    }

    pub fn apply_snapshot(&mut self, snapshot: &TransformSnapshot<'s, N>) {
        debug!(
            "Restoring snapshot at template depth {}",
            snapshot.state.template_depth()
        );
        snapshot.apply_to(&mut self.state, &mut self.result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Template;
    use crate::state::{ContextNodeList, TemplateElement};
    use trellis_dtm::{MemNode, TreeBuilder};
    use trellis_traits::{EventRecorder, TypedValue};

    #[test]
    fn test_snapshot_does_not_alias_live_state() {
        let mut b = TreeBuilder::new();
        b.start_element("doc");
        b.text("x");
        b.end_element();
        let tree = b.finish();
        let root = tree.root();
        let doc = root.children().next().unwrap();

        let template = Template::matching("doc", vec![]);
        let mut state: ExecutionState<'_, MemNode<'_>> = ExecutionState::new();
        let mut result = ResultTreeHandler::new(Box::new(EventRecorder::new()), None);
        result.start_document().unwrap();
        result.start_element("", "doc", "doc", &[]).unwrap();

        state.push_current_node(doc);
        state.push_template_element(TemplateElement::Template(&template)).unwrap();
        state.push_matched(&template, doc);
        state.push_context_list(ContextNodeList::single(doc));
        state.variables_mut().link(1);
        state.variables_mut().set(0, TypedValue::Number(3.0)).unwrap();
        state.counters_mut().record(0, doc, 1);

        let snapshot = TransformSnapshot::capture(&state, &result);
        let captured = state.clone();

        state.push_current_node(root);
        state.variables_mut().set(0, TypedValue::Boolean(false)).unwrap();
        state.counters_mut().record(0, root, 7);
        state.pop_matched();
        result.flush_pending().unwrap();

        assert_eq!(snapshot.state(), &captured);
        assert_eq!(snapshot.state().counters().len(), 1);

        snapshot.apply_to(&mut state, &mut result);
        assert_eq!(state, captured);
        assert_eq!(state.variables().get(0), Some(&TypedValue::Number(3.0)));
        assert_eq!(&result.capture_state(), snapshot.result_state());
    }
}
