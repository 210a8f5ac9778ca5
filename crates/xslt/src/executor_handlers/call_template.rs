use crate::ast::WithParam;
use crate::error::XsltError;
use crate::state::TemplateElement;
use crate::transformer::Transformer;
use log::trace;
use trellis_dtm::SourceNode;

/// Runs a named template on the current node. Parameters are evaluated in the
/// caller's frame and written into a fresh frame for the callee.
pub(crate) fn handle_call_template<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    name: &str,
    params: &[WithParam],
    node: N,
) -> Result<(), XsltError> {
    let stylesheet = executor.stylesheet;
    let template = stylesheet
        .named_template(name)
        .ok_or_else(|| XsltError::UnknownNamedTemplate(name.to_string()))?;

    let mut values = Vec::with_capacity(params.len());
    for param in params {
        values.push((param.slot, executor.evaluate(&param.select, node)?));
    }

    trace!("Calling {}", template.description());
    executor
        .state
        .push_template_element(TemplateElement::Template(template))?;
    executor.state.variables_mut().link(template.frame_size);
    let outcome = values
        .into_iter()
        .try_for_each(|(slot, value)| executor.state.variables_mut().set(slot, value))
        .and_then(|()| executor.execute_children(&template.body, node));
    executor.state.variables_mut().unlink();
    executor.state.pop_template_element();
    outcome
}
