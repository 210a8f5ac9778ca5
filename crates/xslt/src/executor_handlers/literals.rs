//! Handlers for literal output: text, `value-of`, literal result elements,
//! attributes, comments, processing instructions and attribute sets.
use crate::ast::{Instruction, LiteralAttribute, ValuePart, ValueTemplate};
use crate::error::XsltError;
use crate::transformer::Transformer;
use trellis_dtm::SourceNode;
use trellis_traits::{Attribute, Expr};

/// The fields of a literal result element, borrowed from the stylesheet.
pub(crate) struct LiteralElement<'s> {
    pub uri: &'s str,
    pub local_name: &'s str,
    pub qname: &'s str,
    pub namespaces: &'s [(String, String)],
    pub attributes: &'s [LiteralAttribute],
    pub use_attribute_sets: &'s [String],
    pub body: &'s [Instruction],
}

pub(crate) fn handle_text<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    text: &str,
) -> Result<(), XsltError> {
    executor.result.characters(text)
}

pub(crate) fn handle_value_of<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    select: &Expr,
    node: N,
) -> Result<(), XsltError> {
    let text = executor.evaluate(select, node)?.to_string_value();
    if text.is_empty() {
        return Ok(());
    }
    executor.result.characters(&text)
}

pub(crate) fn expand_value_template<'s, 'a, N: SourceNode<'a>>(
    executor: &Transformer<'s, 'a, N>,
    template: &ValueTemplate,
    node: N,
) -> Result<String, XsltError> {
    let mut out = String::new();
    for part in &template.0 {
        match part {
            ValuePart::Literal(text) => out.push_str(text),
            ValuePart::Expr(expr) => out.push_str(&executor.evaluate(expr, node)?.to_string_value()),
        }
    }
    Ok(out)
}

pub(crate) fn handle_literal_element<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    element: LiteralElement<'s>,
    node: N,
) -> Result<(), XsltError> {
    // The parent must start before this element's declarations open a new scope.
    // The document start stays pending so the output method can still switch.
    if !element.namespaces.is_empty() {
        executor.result.flush_element()?;
    }
    for (prefix, uri) in element.namespaces {
        executor.result.start_prefix_mapping(prefix, uri)?;
    }
    executor
        .result
        .start_element(element.uri, element.local_name, element.qname, &[])?;
    apply_attribute_sets(executor, element.use_attribute_sets, node)?;
    for attribute in element.attributes {
        add_literal_attribute(executor, attribute, node)?;
    }
    executor.execute_children(element.body, node)?;
    executor
        .result
        .end_element(element.uri, element.local_name, element.qname)
}

pub(crate) fn handle_attribute<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    attribute: &LiteralAttribute,
    node: N,
) -> Result<(), XsltError> {
    add_literal_attribute(executor, attribute, node)
}

fn add_literal_attribute<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    attribute: &LiteralAttribute,
    node: N,
) -> Result<(), XsltError> {
    let value = expand_value_template(executor, &attribute.value, node)?;
    let added = executor.result.add_attribute(Attribute::new(
        attribute.uri.as_str(),
        attribute.local_name.as_str(),
        attribute.qname.as_str(),
        value,
    ));
    executor.recover(added)
}

/// Adds the attributes of the named sets, expanding the sets each one uses
/// first so its own attributes win.
pub(crate) fn apply_attribute_sets<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    names: &'s [String],
    node: N,
) -> Result<(), XsltError> {
    let stylesheet = executor.stylesheet;
    for name in names {
        let set = stylesheet
            .attribute_set(name)
            .ok_or_else(|| XsltError::UnknownAttributeSet(name.clone()))?;
        executor.state.enter_attribute_set(&set.name)?;
        let outcome = expand_attribute_set(executor, &set.use_attribute_sets, &set.attributes, node);
        executor.state.exit_attribute_set();
        outcome?;
    }
    Ok(())
}

fn expand_attribute_set<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    uses: &'s [String],
    attributes: &'s [LiteralAttribute],
    node: N,
) -> Result<(), XsltError> {
    apply_attribute_sets(executor, uses, node)?;
    for attribute in attributes {
        add_literal_attribute(executor, attribute, node)?;
    }
    Ok(())
}

pub(crate) fn handle_comment<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    value: &ValueTemplate,
    node: N,
) -> Result<(), XsltError> {
    let text = expand_value_template(executor, value, node)?;
    executor.result.comment(&text)
}

pub(crate) fn handle_processing_instruction<'s, 'a, N: SourceNode<'a>>(
    executor: &mut Transformer<'s, 'a, N>,
    target: &str,
    value: &ValueTemplate,
    node: N,
) -> Result<(), XsltError> {
    let data = expand_value_template(executor, value, node)?;
    executor.result.processing_instruction(target, &data)
}
