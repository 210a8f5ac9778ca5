//! Mutable execution state of one transformation.
//!
//! Every stack here is pushed and popped in pairs by the engine, on success and
//! error paths alike. Cloning the state produces an independent deep copy, which
//! is what snapshots rely on.
use crate::ast::{Instruction, Template};
use crate::error::XsltError;
use std::collections::HashMap;
use trellis_traits::TypedValue;

/// Hard cap on nested template elements, independent of the recursion guard.
///
/// Each applied rule pushes itself and the instruction that applied it, so this
/// allows roughly 256 nested rule applications. It must trip before the native
/// stack of a default 2 MiB thread runs out.
pub const TEMPLATE_ELEMENT_LIMIT: usize = 512;

/// The template or instruction currently executing.
#[derive(Debug, Clone, Copy)]
pub enum TemplateElement<'s> {
    Template(&'s Template),
    Instruction(&'s Instruction),
}

impl PartialEq for TemplateElement<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TemplateElement::Template(a), TemplateElement::Template(b)) => std::ptr::eq(*a, *b),
            (TemplateElement::Instruction(a), TemplateElement::Instruction(b)) => {
                std::ptr::eq(*a, *b)
            }
            _ => false,
        }
    }
}

/// A rule that is being applied to a source node.
#[derive(Debug, Clone, Copy)]
pub struct MatchedTemplate<'s, N> {
    pub template: &'s Template,
    pub node: N,
}

impl<N: PartialEq> PartialEq for MatchedTemplate<'_, N> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.template, other.template) && self.node == other.node
    }
}

/// The node list an instruction iterates, with the 1-based current position.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextNodeList<N> {
    pub nodes: Vec<N>,
    pub position: usize,
}

impl<N: Copy> ContextNodeList<N> {
    pub fn new(nodes: Vec<N>) -> Self {
        Self { nodes, position: 1 }
    }

    pub fn single(node: N) -> Self {
        Self::new(vec![node])
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }
}

/// The group a grouping instruction is processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveGroup<N> {
    pub members: Vec<N>,
    pub key: Option<String>,
}

/// Variable slots organized in frames. Each template invocation links a frame
/// sized by the template and unlinks it when done.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStack<N> {
    slots: Vec<Option<TypedValue<N>>>,
    frames: Vec<usize>,
}

impl<N> Default for VariableStack<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl<N: Clone> VariableStack<N> {
    pub fn link(&mut self, size: usize) {
        let base = self.slots.len();
        self.frames.push(base);
        self.slots.resize(base + size, None);
    }

    pub fn unlink(&mut self) {
        if let Some(base) = self.frames.pop() {
            self.slots.truncate(base);
        }
    }

    fn frame_base(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    pub fn frame(&self) -> &[Option<TypedValue<N>>] {
        &self.slots[self.frame_base()..]
    }

    pub fn get(&self, slot: usize) -> Option<&TypedValue<N>> {
        self.frame().get(slot).and_then(Option::as_ref)
    }

    pub fn set(&mut self, slot: usize, value: TypedValue<N>) -> Result<(), XsltError> {
        let base = self.frame_base();
        let size = self.slots.len() - base;
        match self.slots.get_mut(base + slot) {
            Some(cell) if slot < size => {
                *cell = Some(value);
                Ok(())
            }
            _ => Err(XsltError::VariableSlot { slot, size }),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.frames.clear();
    }
}

/// Cached `xsl:number` results per counter and node.
#[derive(Debug, Clone, PartialEq)]
pub struct CountersTable<N: Eq + std::hash::Hash> {
    counters: HashMap<usize, HashMap<N, usize>>,
}

impl<N: Eq + std::hash::Hash> Default for CountersTable<N> {
    fn default() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }
}

impl<N: Copy + Eq + std::hash::Hash> CountersTable<N> {
    pub fn lookup(&self, counter: usize, node: N) -> Option<usize> {
        self.counters.get(&counter).and_then(|m| m.get(&node)).copied()
    }

    pub fn record(&mut self, counter: usize, node: N, value: usize) {
        self.counters.entry(counter).or_default().insert(node, value);
    }

    /// Number of cached values across all counters.
    pub fn len(&self) -> usize {
        self.counters.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState<'s, N: Eq + std::hash::Hash> {
    current_nodes: Vec<N>,
    template_elements: Vec<TemplateElement<'s>>,
    matched: Vec<MatchedTemplate<'s, N>>,
    context_lists: Vec<ContextNodeList<N>>,
    modes: Vec<Option<&'s str>>,
    attribute_sets: Vec<&'s str>,
    variables: VariableStack<N>,
    counters: CountersTable<N>,
    current_group: Option<ActiveGroup<N>>,
}

impl<N: Copy + Eq + std::hash::Hash> Default for ExecutionState<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s, N: Copy + Eq + std::hash::Hash> ExecutionState<'s, N> {
    pub fn new() -> Self {
        Self {
            current_nodes: Vec::new(),
            template_elements: Vec::new(),
            matched: Vec::new(),
            context_lists: Vec::new(),
            modes: Vec::new(),
            attribute_sets: Vec::new(),
            variables: VariableStack::default(),
            counters: CountersTable::default(),
            current_group: None,
        }
    }

    // --- template elements ---

    pub fn push_template_element(&mut self, element: TemplateElement<'s>) -> Result<(), XsltError> {
        if self.template_elements.len() >= TEMPLATE_ELEMENT_LIMIT {
            return Err(XsltError::TemplateStackOverflow(TEMPLATE_ELEMENT_LIMIT));
        }
        self.template_elements.push(element);
        Ok(())
    }

    pub fn pop_template_element(&mut self) -> Option<TemplateElement<'s>> {
        self.template_elements.pop()
    }

    pub fn current_element(&self) -> Option<TemplateElement<'s>> {
        self.template_elements.last().copied()
    }

    /// The innermost template whose body is executing.
    pub fn current_template(&self) -> Option<&'s Template> {
        self.template_elements.iter().rev().find_map(|e| match e {
            TemplateElement::Template(t) => Some(*t),
            TemplateElement::Instruction(_) => None,
        })
    }

    pub fn template_depth(&self) -> usize {
        self.template_elements.len()
    }

    // --- current nodes ---

    pub fn push_current_node(&mut self, node: N) {
        self.current_nodes.push(node);
    }

    pub fn pop_current_node(&mut self) -> Option<N> {
        self.current_nodes.pop()
    }

    pub fn current_node(&self) -> Option<N> {
        self.current_nodes.last().copied()
    }

    // --- matched rules ---

    pub fn push_matched(&mut self, template: &'s Template, node: N) {
        self.matched.push(MatchedTemplate { template, node });
    }

    pub fn pop_matched(&mut self) -> Option<MatchedTemplate<'s, N>> {
        self.matched.pop()
    }

    pub fn matched(&self) -> Option<MatchedTemplate<'s, N>> {
        self.matched.last().copied()
    }

    pub fn matched_depth(&self) -> usize {
        self.matched.len()
    }

    /// How many applications of `template` to `node` are active.
    pub fn active_applications(&self, template: &Template, node: N) -> usize {
        self.matched
            .iter()
            .filter(|m| m.template.id == template.id && m.node == node)
            .count()
    }

    // --- context node lists ---

    pub fn push_context_list(&mut self, list: ContextNodeList<N>) {
        self.context_lists.push(list);
    }

    pub fn pop_context_list(&mut self) -> Option<ContextNodeList<N>> {
        self.context_lists.pop()
    }

    pub fn context_list(&self) -> Option<&ContextNodeList<N>> {
        self.context_lists.last()
    }

    pub fn set_context_position(&mut self, position: usize) {
        if let Some(list) = self.context_lists.last_mut() {
            list.position = position;
        }
    }

    /// Position and size of the current node in its list; `(1, 1)` outside any.
    pub fn context_position(&self) -> (usize, usize) {
        self.context_lists
            .last()
            .map(|l| (l.position, l.size()))
            .unwrap_or((1, 1))
    }

    // --- modes ---

    pub fn push_mode(&mut self, mode: Option<&'s str>) {
        self.modes.push(mode);
    }

    pub fn pop_mode(&mut self) -> Option<Option<&'s str>> {
        self.modes.pop()
    }

    pub fn current_mode(&self) -> Option<&'s str> {
        self.modes.last().copied().flatten()
    }

    // --- attribute sets ---

    /// Marks `name` as being expanded, failing if it already is.
    pub fn enter_attribute_set(&mut self, name: &'s str) -> Result<(), XsltError> {
        if self.attribute_sets.contains(&name) {
            return Err(XsltError::AttributeSetRecursion(name.to_string()));
        }
        self.attribute_sets.push(name);
        Ok(())
    }

    pub fn exit_attribute_set(&mut self) {
        self.attribute_sets.pop();
    }

    // --- groups ---

    pub fn current_group(&self) -> Option<&ActiveGroup<N>> {
        self.current_group.as_ref()
    }

    /// Installs `group` as the current group and returns the previous one.
    pub fn replace_current_group(&mut self, group: Option<ActiveGroup<N>>) -> Option<ActiveGroup<N>> {
        std::mem::replace(&mut self.current_group, group)
    }

    // --- variables and counters ---

    pub fn variables(&self) -> &VariableStack<N> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStack<N> {
        &mut self.variables
    }

    pub fn counters(&self) -> &CountersTable<N> {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut CountersTable<N> {
        &mut self.counters
    }

    /// True when every stack is back at its initial depth.
    pub fn is_idle(&self) -> bool {
        self.current_nodes.is_empty()
            && self.template_elements.is_empty()
            && self.matched.is_empty()
            && self.context_lists.is_empty()
            && self.modes.is_empty()
            && self.attribute_sets.is_empty()
            && self.variables.depth() == 0
            && self.current_group.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
