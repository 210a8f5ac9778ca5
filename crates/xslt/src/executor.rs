//! Rule selection and instruction dispatch.
//!
//! Everything pushed onto the execution state here is popped again before the
//! function returns, whether the body succeeded or failed. No `?` sits between a
//! push and its pop.
use crate::ast::{Instruction, PrecedenceCeiling, Template, TemplateKind};
use crate::error::XsltError;
use crate::executor_handlers::{
    apply_templates, call_template, control_flow, copy, for_each, grouping, literals, number,
    variables,
};
use crate::state::{ContextNodeList, TemplateElement};
use crate::transformer::Transformer;
use log::{debug, trace};
use trellis_dtm::{NodeKind, SourceNode};

impl<'s, 'a, N: SourceNode<'a>> Transformer<'s, 'a, N> {
    /// Applies the best rule for `node`, or `explicit` when given.
    ///
    /// Returns `Ok(false)` when no rule applies: no authored rule matched and
    /// the node kind has no built-in rule (comments, processing instructions,
    /// namespace nodes). The node is processed as a one-node context list.
    pub fn apply_template_to_node(
        &mut self,
        calling: Option<&'s Instruction>,
        explicit: Option<&'s Template>,
        node: N,
    ) -> Result<bool, XsltError> {
        self.state.push_context_list(ContextNodeList::single(node));
        let applied = self.apply_rule(calling, explicit, node);
        self.state.pop_context_list();
        applied
    }

    /// Like [`Self::apply_template_to_node`] but keeps the caller's context list,
    /// so `position()` and `last()` see the list being iterated.
    pub(crate) fn apply_rule(
        &mut self,
        calling: Option<&'s Instruction>,
        explicit: Option<&'s Template>,
        node: N,
    ) -> Result<bool, XsltError> {
        let template = match explicit {
            Some(template) => template,
            None => match self.select_rule(calling, node)? {
                Some(template) => template,
                None => {
                    debug!("No rule applies to {:?} node; skipping", node.node_kind());
                    return Ok(false);
                }
            },
        };

        if let Some(limit) = self.config.recursion_limit
            && self.state.active_applications(template, node) >= limit
        {
            return Err(XsltError::RecursionLimit {
                limit,
                template: template.description(),
                node: describe(node),
            });
        }

        self.state
            .push_template_element(TemplateElement::Template(template))?;
        self.state.push_current_node(node);
        self.state.push_matched(template, node);
        trace!("Applying {} to {}", template.description(), describe(node));

        let outcome = self.execute_template_body(template, node);

        self.state.pop_matched();
        self.state.pop_current_node();
        self.state.pop_template_element();
        outcome.map(|()| true)
    }

    fn select_rule(
        &mut self,
        calling: Option<&'s Instruction>,
        node: N,
    ) -> Result<Option<&'s Template>, XsltError> {
        let ceiling = match calling {
            Some(Instruction::ApplyImports) => match self.state.matched() {
                Some(m) if m.template.import_precedence > 0 => {
                    PrecedenceCeiling::Below(m.template.import_precedence)
                }
                _ => PrecedenceCeiling::Nothing,
            },
            _ => PrecedenceCeiling::Any,
        };
        let stylesheet = self.stylesheet;
        let mode = self.state.current_mode();
        let found =
            stylesheet.find_best_matching_template(mode, ceiling, |pattern| self.matches(pattern, node))?;

        match found {
            Some(found) => {
                if found.ambiguous && !self.config.quiet_conflict_warnings {
                    let conflict = XsltError::AmbiguousRule {
                        node: describe(node),
                        template: found.template.description(),
                    };
                    self.warning(&conflict);
                }
                Ok(Some(found.template))
            }
            None => Ok(stylesheet.default_rule(node.node_kind())),
        }
    }

    fn execute_template_body(&mut self, template: &'s Template, node: N) -> Result<(), XsltError> {
        if template.kind == TemplateKind::DefaultText {
            return match node.node_kind() {
                NodeKind::Attribute => self.result.characters(&node.string_value()),
                NodeKind::Text | NodeKind::CData => {
                    let cloned = self.result.clone_to_result_tree(node, false);
                    self.recover(cloned)
                }
                _ => Ok(()),
            };
        }
        self.state.variables_mut().link(template.frame_size);
        let outcome = self.execute_children(&template.body, node);
        self.state.variables_mut().unlink();
        outcome
    }

    pub(crate) fn execute_children(
        &mut self,
        body: &'s [Instruction],
        node: N,
    ) -> Result<(), XsltError> {
        for instruction in body {
            self.execute_instruction(instruction, node)?;
        }
        Ok(())
    }

    fn execute_instruction(&mut self, instruction: &'s Instruction, node: N) -> Result<(), XsltError> {
        self.state
            .push_template_element(TemplateElement::Instruction(instruction))?;
        let outcome = self.dispatch(instruction, node);
        self.state.pop_template_element();
        outcome
    }

    fn dispatch(&mut self, instruction: &'s Instruction, node: N) -> Result<(), XsltError> {
        match instruction {
            Instruction::Text(text) => literals::handle_text(self, text),
            Instruction::ValueOf { select } => literals::handle_value_of(self, select, node),
            Instruction::Element {
                uri,
                local_name,
                qname,
                namespaces,
                attributes,
                use_attribute_sets,
                body,
            } => literals::handle_literal_element(
                self,
                literals::LiteralElement {
                    uri,
                    local_name,
                    qname,
                    namespaces,
                    attributes,
                    use_attribute_sets,
                    body,
                },
                node,
            ),
            Instruction::Attribute(attribute) => literals::handle_attribute(self, attribute, node),
            Instruction::Comment(value) => literals::handle_comment(self, value, node),
            Instruction::ProcessingInstruction { target, value } => {
                literals::handle_processing_instruction(self, target, value, node)
            }
            Instruction::ApplyTemplates {
                select,
                mode,
                sort_keys,
            } => apply_templates::handle_apply_templates(
                self,
                instruction,
                select.as_ref(),
                mode,
                sort_keys,
                node,
            ),
            Instruction::ApplyImports => apply_templates::handle_apply_imports(self, instruction, node),
            Instruction::CallTemplate { name, params } => {
                call_template::handle_call_template(self, name, params, node)
            }
            Instruction::ForEach {
                select,
                sort_keys,
                body,
            } => for_each::handle_for_each(self, select, sort_keys, body, node),
            Instruction::ForEachGroup {
                select,
                grouping,
                sort_keys,
                body,
            } => grouping::handle_for_each_group(self, select, grouping, sort_keys, body, node),
            Instruction::Copy {
                use_attribute_sets,
                body,
            } => copy::handle_copy(self, use_attribute_sets, body, node),
            Instruction::CopyOf { select } => copy::handle_copy_of(self, select, node),
            Instruction::If { test, body } => control_flow::handle_if(self, test, body, node),
            Instruction::Choose { whens, otherwise } => {
                control_flow::handle_choose(self, whens, otherwise, node)
            }
            Instruction::Variable { slot, select, .. } => {
                variables::handle_variable(self, *slot, select, node)
            }
            Instruction::Number { counter, count } => {
                number::handle_number(self, *counter, count.as_ref(), node)
            }
        }
    }
}

/// A short label for a source node in diagnostics.
pub(crate) fn describe<'a, N: SourceNode<'a>>(node: N) -> String {
    match node.name() {
        Some(name) => format!("{:?} '{}'", node.node_kind(), name),
        None => format!("{:?} node", node.node_kind()),
    }
}
