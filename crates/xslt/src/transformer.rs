//! The transformation driver.
//!
//! A [`Transformer`] binds one compiled [`Stylesheet`] to an expression evaluator
//! and a downstream [`ContentHandler`], and runs transformations of source trees
//! through them. It is not meant for concurrent use: run one per thread, and call
//! [`Transformer::reset`] between runs on the same instance.
//!
//! ```rust,ignore
//! let mut recorder = EventRecorder::new();
//! let mut transformer = TransformerBuilder::new(&stylesheet, &evaluator)
//!     .content_handler(&mut recorder)
//!     .build()?;
//! transformer.transform(doc.root_node())?;
//! ```
use crate::ast::{SortKey, Stylesheet, Template};
use crate::config::TransformConfig;
use crate::error::{ErrorListener, XsltError};
use crate::keys::KeyTable;
use crate::result_tree::ResultTreeHandler;
use crate::sort::SortKeyEvaluator;
use crate::state::{ActiveGroup, ContextNodeList, ExecutionState, TemplateElement};
use log::{debug, error, info, warn};
use std::marker::PhantomData;
use trellis_dtm::SourceNode;
use trellis_traits::{
    CollationKey, Collator, ContentHandler, EvalContext, Expr, KeyLookup, RootCollator, TypedValue,
    XPathEvaluator,
};

/// Read access to the in-flight state of a transformation, for tooling that
/// inspects a paused or failed run.
pub trait TransformState<'s, N> {
    /// The innermost template whose body is executing.
    fn current_template(&self) -> Option<&'s Template>;
    fn current_element(&self) -> Option<TemplateElement<'s>>;
    fn current_node(&self) -> Option<N>;
    /// The rule most recently selected by template matching.
    fn matched_template(&self) -> Option<&'s Template>;
    fn matched_node(&self) -> Option<N>;
    fn context_node_list(&self) -> Option<&ContextNodeList<N>>;
    fn current_mode(&self) -> Option<&'s str>;
}

impl<'s, N: Copy + Eq + std::hash::Hash> TransformState<'s, N> for ExecutionState<'s, N> {
    fn current_template(&self) -> Option<&'s Template> {
        ExecutionState::current_template(self)
    }

    fn current_element(&self) -> Option<TemplateElement<'s>> {
        ExecutionState::current_element(self)
    }

    fn current_node(&self) -> Option<N> {
        ExecutionState::current_node(self)
    }

    fn matched_template(&self) -> Option<&'s Template> {
        self.matched().map(|m| m.template)
    }

    fn matched_node(&self) -> Option<N> {
        self.matched().map(|m| m.node)
    }

    fn context_node_list(&self) -> Option<&ContextNodeList<N>> {
        self.context_list()
    }

    fn current_mode(&self) -> Option<&'s str> {
        ExecutionState::current_mode(self)
    }
}

pub struct Transformer<'s, 'a, N: SourceNode<'a>> {
    pub(crate) stylesheet: &'s Stylesheet,
    pub(crate) evaluator: &'s dyn XPathEvaluator<'a, N>,
    pub(crate) collator: Box<dyn Collator>,
    pub(crate) result: ResultTreeHandler<'s>,
    pub(crate) state: ExecutionState<'s, N>,
    pub(crate) config: TransformConfig,
    error_listener: Option<Box<dyn ErrorListener + 's>>,
    pub(crate) keys: Option<KeyTable<N>>,
    initial_mode: Option<&'s str>,
    _source: PhantomData<&'a ()>,
}

pub struct TransformerBuilder<'s, 'a, N: SourceNode<'a>> {
    stylesheet: &'s Stylesheet,
    evaluator: &'s dyn XPathEvaluator<'a, N>,
    handler: Option<Box<dyn ContentHandler + 's>>,
    error_listener: Option<Box<dyn ErrorListener + 's>>,
    collator: Option<Box<dyn Collator>>,
    config: TransformConfig,
    initial_mode: Option<&'s str>,
}

impl<'s, 'a, N: SourceNode<'a>> TransformerBuilder<'s, 'a, N> {
    pub fn new(stylesheet: &'s Stylesheet, evaluator: &'s dyn XPathEvaluator<'a, N>) -> Self {
        Self {
            stylesheet,
            evaluator,
            handler: None,
            error_listener: None,
            collator: None,
            config: TransformConfig::default(),
            initial_mode: None,
        }
    }

    pub fn content_handler(mut self, handler: impl ContentHandler + 's) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn error_listener(mut self, listener: impl ErrorListener + 's) -> Self {
        self.error_listener = Some(Box::new(listener));
        self
    }

    pub fn collator(mut self, collator: Box<dyn Collator>) -> Self {
        self.collator = Some(collator);
        self
    }

    pub fn config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initial_mode(mut self, mode: &'s str) -> Self {
        self.initial_mode = Some(mode);
        self
    }

    /// Fails with [`XsltError::MissingContentHandler`] when no handler was set.
    pub fn build(self) -> Result<Transformer<'s, 'a, N>, XsltError> {
        let handler = self.handler.ok_or(XsltError::MissingContentHandler)?;
        self.config.validate()?;
        let method = self.config.output_method.or(self.stylesheet.output_method());
        Ok(Transformer {
            stylesheet: self.stylesheet,
            evaluator: self.evaluator,
            collator: self.collator.unwrap_or_else(|| Box::new(RootCollator)),
            result: ResultTreeHandler::new(handler, method),
            state: ExecutionState::new(),
            config: self.config,
            error_listener: self.error_listener,
            keys: None,
            initial_mode: self.initial_mode,
            _source: PhantomData,
        })
    }
}

impl<'s, 'a, N: SourceNode<'a>> Transformer<'s, 'a, N> {
    /// Transforms the tree containing `root`, starting with rule matching at
    /// `root` itself. Fatal errors go to the error listener and are returned.
    pub fn transform(&mut self, root: N) -> Result<(), XsltError> {
        info!("Starting transformation at {:?}", root.node_kind());
        let outcome = self.run(root);
        match &outcome {
            Ok(()) => debug!(
                "Transformation finished after {} result events",
                self.result.event_count()
            ),
            Err(e) => {
                error!("Transformation aborted: {}", e);
                if let Some(listener) = self.error_listener.as_mut() {
                    listener.fatal_error(e);
                }
            }
        }
        outcome
    }

    fn run(&mut self, root: N) -> Result<(), XsltError> {
        if !self.stylesheet.keys().is_empty() {
            self.keys = Some(KeyTable::build(root.root(), self.stylesheet.keys(), self.evaluator)?);
        }
        self.result.start_document()?;
        self.state.push_mode(self.initial_mode);
        let applied = self.apply_template_to_node(None, None, root);
        self.state.pop_mode();
        applied?;
        self.result.end_document()
    }

    /// Clears all execution state, key tables and buffered result events so the
    /// instance can run another transformation.
    pub fn reset(&mut self) {
        self.state.clear();
        self.result.reset();
        self.keys = None;
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn stylesheet(&self) -> &'s Stylesheet {
        self.stylesheet
    }

    pub fn state(&self) -> &ExecutionState<'s, N> {
        &self.state
    }

    pub fn result_tree(&self) -> &ResultTreeHandler<'s> {
        &self.result
    }

    /// Hands back the downstream consumer, consuming the transformer.
    pub fn into_handler(self) -> Box<dyn ContentHandler + 's> {
        self.result.into_handler()
    }

    // --- evaluation ---

    /// Builds the evaluation context for `node` at the current list position.
    pub(crate) fn eval_context(&self, node: N) -> EvalContext<'_, N> {
        let (position, size) = self.state.context_position();
        self.context_at(node, position, size)
    }

    pub(crate) fn context_at(&self, node: N, position: usize, size: usize) -> EvalContext<'_, N> {
        let group = self.state.current_group();
        EvalContext {
            node,
            position,
            size,
            current_group: group.map(|g| g.members.as_slice()),
            grouping_key: group.and_then(|g| g.key.as_deref()),
            variables: self.state.variables().frame(),
            namespaces: &[],
            keys: self.keys.as_ref().map(|k| k as &dyn KeyLookup<N>),
        }
    }

    pub(crate) fn evaluate(&self, expr: &Expr, node: N) -> Result<TypedValue<N>, XsltError> {
        Ok(self.evaluator.evaluate(expr, &self.eval_context(node))?)
    }

    pub(crate) fn evaluate_at(
        &self,
        expr: &Expr,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<TypedValue<N>, XsltError> {
        Ok(self.evaluator.evaluate(expr, &self.context_at(node, position, size))?)
    }

    /// Evaluates `expr` and requires a node-set.
    pub(crate) fn select_nodes(&self, expr: &Expr, node: N) -> Result<Vec<N>, XsltError> {
        match self.evaluate(expr, node)? {
            TypedValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XsltError::XPath(trellis_traits::XPathError::Type(format!(
                "'{}' must select nodes, found '{}'",
                expr,
                other.to_string_value()
            )))),
        }
    }

    pub(crate) fn matches(&self, pattern: &Expr, node: N) -> Result<bool, XsltError> {
        Ok(self.evaluator.matches(pattern, &self.context_at(node, 1, 1))?)
    }

    // --- diagnostics ---

    pub(crate) fn warning(&mut self, err: &XsltError) {
        match self.error_listener.as_mut() {
            Some(listener) => listener.warning(err),
            None => warn!("{}", err),
        }
    }

    /// Reports a recoverable error. Returns `Err` only if the listener escalates it.
    pub(crate) fn report_recoverable(&mut self, err: XsltError) -> Result<(), XsltError> {
        match self.error_listener.as_mut() {
            Some(listener) => listener.error(&err),
            None => {
                warn!("{}", err);
                Ok(())
            }
        }
    }

    /// Passes successes through, reports recoverable errors and propagates the rest.
    pub(crate) fn recover(&mut self, outcome: Result<(), XsltError>) -> Result<(), XsltError> {
        match outcome {
            Err(err) if err.is_recoverable() => self.report_recoverable(err),
            other => other,
        }
    }
}

impl<'s, 'a, N: SourceNode<'a>> TransformState<'s, N> for Transformer<'s, 'a, N> {
    fn current_template(&self) -> Option<&'s Template> {
        self.state.current_template()
    }

    fn current_element(&self) -> Option<TemplateElement<'s>> {
        self.state.current_element()
    }

    fn current_node(&self) -> Option<N> {
        self.state.current_node()
    }

    fn matched_template(&self) -> Option<&'s Template> {
        TransformState::matched_template(&self.state)
    }

    fn matched_node(&self) -> Option<N> {
        TransformState::matched_node(&self.state)
    }

    fn context_node_list(&self) -> Option<&ContextNodeList<N>> {
        self.state.context_list()
    }

    fn current_mode(&self) -> Option<&'s str> {
        self.state.current_mode()
    }
}

impl<'s, 'a, N: SourceNode<'a>> SortKeyEvaluator<'a, N> for Transformer<'s, 'a, N> {
    fn evaluate_sort_key(
        &mut self,
        key: &SortKey,
        node: N,
        position: usize,
        size: usize,
    ) -> Result<TypedValue<N>, XsltError> {
        let mut ctx = self.context_at(node, position, size);
        ctx.namespaces = &key.namespaces;
        Ok(self.evaluator.evaluate(&key.select, &ctx)?)
    }

    fn collation_key(&self, key: &SortKey, text: &str) -> CollationKey {
        self.collator.collation_key(text, key.lang.as_deref())
    }

    fn replace_current_group(&mut self, group: Option<ActiveGroup<N>>) -> Option<ActiveGroup<N>> {
        self.state.replace_current_group(group)
    }
}
