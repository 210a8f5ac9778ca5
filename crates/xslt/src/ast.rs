//! Compiled stylesheet model.
//!
//! A [`Stylesheet`] is immutable once built and may be shared by any number of
//! transformations. Instructions refer to expressions as opaque [`Expr`] handles
//! and to variables by frame slot.
//!
//! # Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Stylesheet`] | Rules, named templates, attribute sets and keys |
//! | [`Template`] | A match rule, a named template or a built-in rule |
//! | [`Instruction`] | One executable element of a template body |
//! | [`SortKey`] | One key of an `xsl:sort` list |
use crate::error::XsltError;
use log::debug;
use std::collections::HashMap;
use trellis_dtm::NodeKind;
use trellis_traits::{Expr, OutputMethod};

pub type TemplateId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Rule,
    Named,
    /// Built-in rule for elements and document fragments.
    DefaultElement,
    /// Built-in rule for text, CDATA and attribute nodes.
    DefaultText,
    DefaultRoot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: TemplateId,
    pub kind: TemplateKind,
    pub match_pattern: Option<Expr>,
    pub name: Option<String>,
    pub mode: Option<String>,
    pub priority: f64,
    pub import_precedence: u32,
    /// Number of variable slots the body needs.
    pub frame_size: usize,
    pub body: Vec<Instruction>,
}

impl Template {
    /// A match rule. The priority defaults from the pattern's shape.
    pub fn matching(pattern: &str, body: Vec<Instruction>) -> Self {
        Self {
            id: 0,
            kind: TemplateKind::Rule,
            match_pattern: Some(Expr::new(pattern)),
            name: None,
            mode: None,
            priority: default_priority(pattern),
            import_precedence: 0,
            frame_size: 0,
            body,
        }
    }

    pub fn named(name: &str, body: Vec<Instruction>) -> Self {
        Self {
            id: 0,
            kind: TemplateKind::Named,
            match_pattern: None,
            name: Some(name.to_string()),
            mode: None,
            priority: 0.0,
            import_precedence: 0,
            frame_size: 0,
            body,
        }
    }

    fn builtin(kind: TemplateKind, body: Vec<Instruction>) -> Self {
        Self {
            id: 0,
            kind,
            match_pattern: None,
            name: None,
            mode: None,
            priority: f64::NEG_INFINITY,
            import_precedence: 0,
            frame_size: 0,
            body,
        }
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_import_precedence(mut self, precedence: u32) -> Self {
        self.import_precedence = precedence;
        self
    }

    pub fn with_frame_size(mut self, slots: usize) -> Self {
        self.frame_size = slots;
        self
    }

    /// Also callable by name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn is_builtin(&self) -> bool {
        matches!(
            self.kind,
            TemplateKind::DefaultElement | TemplateKind::DefaultText | TemplateKind::DefaultRoot
        )
    }

    /// A human-readable label for diagnostics.
    pub fn description(&self) -> String {
        match (&self.kind, &self.name, &self.match_pattern) {
            (TemplateKind::DefaultElement, _, _) => "built-in element rule".to_string(),
            (TemplateKind::DefaultText, _, _) => "built-in text rule".to_string(),
            (TemplateKind::DefaultRoot, _, _) => "built-in root rule".to_string(),
            (_, Some(name), _) => format!("template '{}'", name),
            (_, None, Some(pattern)) => format!("template matching '{}'", pattern),
            _ => format!("template #{}", self.id),
        }
    }
}

/// The XSLT default priority for a pattern: alternatives take the highest of
/// their parts, bare names score 0, wildcards and node tests below, anything
/// with steps or predicates 0.5.
pub fn default_priority(pattern: &str) -> f64 {
    pattern
        .split('|')
        .map(|alt| {
            let alt = alt.trim();
            let test = alt.strip_prefix('@').unwrap_or(alt);
            if test.contains('/') || test.contains('[') {
                0.5
            } else if matches!(
                test,
                "*" | "node()" | "text()" | "comment()" | "processing-instruction()"
            ) {
                -0.5
            } else if test.ends_with(":*") {
                -0.25
            } else {
                0.0
            }
        })
        .fold(f64::NEG_INFINITY, f64::max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDataType {
    #[default]
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseOrder {
    #[default]
    LowerFirst,
    UpperFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub select: Expr,
    pub data_type: SortDataType,
    pub order: SortOrder,
    pub case_order: CaseOrder,
    pub lang: Option<String>,
    /// Namespace bindings in scope at the sort element.
    pub namespaces: Vec<(String, String)>,
}

impl SortKey {
    pub fn text(select: &str) -> Self {
        Self {
            select: Expr::new(select),
            data_type: SortDataType::Text,
            order: SortOrder::Ascending,
            case_order: CaseOrder::LowerFirst,
            lang: None,
            namespaces: Vec::new(),
        }
    }

    pub fn number(select: &str) -> Self {
        Self {
            data_type: SortDataType::Number,
            ..Self::text(select)
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn upper_first(mut self) -> Self {
        self.case_order = CaseOrder::UpperFirst;
        self
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = Some(lang.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuePart {
    Literal(String),
    Expr(Expr),
}

/// An attribute value template: literal text with `{expr}` holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueTemplate(pub Vec<ValuePart>);

impl ValueTemplate {
    pub fn literal(text: &str) -> Self {
        ValueTemplate(vec![ValuePart::Literal(text.to_string())])
    }

    /// Parses `{expr}` holes; `{{` and `}}` stand for literal braces.
    pub fn parse(source: &str) -> Result<Self, XsltError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut expr = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        expr.push(c);
                    }
                    if !closed || expr.trim().is_empty() {
                        return Err(XsltError::execution(format!(
                            "malformed attribute value template '{}'",
                            source
                        )));
                    }
                    if !literal.is_empty() {
                        parts.push(ValuePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(ValuePart::Expr(Expr::new(expr.trim())));
                }
                '}' => {
                    return Err(XsltError::execution(format!(
                        "unmatched '}}' in attribute value template '{}'",
                        source
                    )));
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(ValuePart::Literal(literal));
        }
        Ok(ValueTemplate(parts))
    }

    pub fn is_static(&self) -> bool {
        self.0.iter().all(|p| matches!(p, ValuePart::Literal(_)))
    }
}

/// An attribute written on a literal result element or in an attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralAttribute {
    pub uri: String,
    pub local_name: String,
    pub qname: String,
    pub value: ValueTemplate,
}

impl LiteralAttribute {
    pub fn new(qname: &str, value: ValueTemplate) -> Self {
        let local = qname.split_once(':').map_or(qname, |(_, l)| l);
        Self {
            uri: String::new(),
            local_name: local.to_string(),
            qname: qname.to_string(),
            value,
        }
    }

    pub fn with_namespace(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }
}

/// Which mode an `apply-templates` runs in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApplyMode {
    #[default]
    Unnamed,
    Named(String),
    /// Whatever mode is current; used by the built-in rules.
    Current,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Grouping {
    By(Expr),
    Adjacent(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub test: Expr,
    pub body: Vec<Instruction>,
}

/// A parameter passed to a named template, written into the callee's frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WithParam {
    pub slot: usize,
    pub select: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Text(String),
    ValueOf {
        select: Expr,
    },
    /// A literal result element.
    Element {
        uri: String,
        local_name: String,
        qname: String,
        namespaces: Vec<(String, String)>,
        attributes: Vec<LiteralAttribute>,
        use_attribute_sets: Vec<String>,
        body: Vec<Instruction>,
    },
    Attribute(LiteralAttribute),
    Comment(ValueTemplate),
    ProcessingInstruction {
        target: String,
        value: ValueTemplate,
    },
    ApplyTemplates {
        select: Option<Expr>,
        mode: ApplyMode,
        sort_keys: Vec<SortKey>,
    },
    ApplyImports,
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    ForEach {
        select: Expr,
        sort_keys: Vec<SortKey>,
        body: Vec<Instruction>,
    },
    ForEachGroup {
        select: Expr,
        grouping: Grouping,
        sort_keys: Vec<SortKey>,
        body: Vec<Instruction>,
    },
    Copy {
        use_attribute_sets: Vec<String>,
        body: Vec<Instruction>,
    },
    CopyOf {
        select: Expr,
    },
    If {
        test: Expr,
        body: Vec<Instruction>,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Vec<Instruction>,
    },
    Variable {
        name: String,
        slot: usize,
        select: Expr,
    },
    /// `xsl:number` at level single. `counter` is assigned when the
    /// stylesheet is built.
    Number {
        counter: usize,
        count: Option<Expr>,
    },
}

impl Instruction {
    pub fn text(text: &str) -> Self {
        Instruction::Text(text.to_string())
    }

    pub fn value_of(select: &str) -> Self {
        Instruction::ValueOf {
            select: Expr::new(select),
        }
    }

    /// A literal result element with no namespace and no attributes.
    pub fn element(qname: &str, body: Vec<Instruction>) -> Self {
        let local = qname.split_once(':').map_or(qname, |(_, l)| l);
        Instruction::Element {
            uri: String::new(),
            local_name: local.to_string(),
            qname: qname.to_string(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            use_attribute_sets: Vec::new(),
            body,
        }
    }

    pub fn apply_templates() -> Self {
        Instruction::ApplyTemplates {
            select: None,
            mode: ApplyMode::Unnamed,
            sort_keys: Vec::new(),
        }
    }

    pub fn apply_templates_select(select: &str) -> Self {
        Instruction::ApplyTemplates {
            select: Some(Expr::new(select)),
            mode: ApplyMode::Unnamed,
            sort_keys: Vec::new(),
        }
    }

    pub fn copy(body: Vec<Instruction>) -> Self {
        Instruction::Copy {
            use_attribute_sets: Vec::new(),
            body,
        }
    }

    pub fn copy_of(select: &str) -> Self {
        Instruction::CopyOf {
            select: Expr::new(select),
        }
    }

    pub fn number() -> Self {
        Instruction::Number {
            counter: 0,
            count: None,
        }
    }

    /// The XSLT element name, for diagnostics.
    pub fn element_name(&self) -> &'static str {
        match self {
            Instruction::Text(_) => "xsl:text",
            Instruction::ValueOf { .. } => "xsl:value-of",
            Instruction::Element { .. } => "literal result element",
            Instruction::Attribute(_) => "xsl:attribute",
            Instruction::Comment(_) => "xsl:comment",
            Instruction::ProcessingInstruction { .. } => "xsl:processing-instruction",
            Instruction::ApplyTemplates { .. } => "xsl:apply-templates",
            Instruction::ApplyImports => "xsl:apply-imports",
            Instruction::CallTemplate { .. } => "xsl:call-template",
            Instruction::ForEach { .. } => "xsl:for-each",
            Instruction::ForEachGroup { .. } => "xsl:for-each-group",
            Instruction::Copy { .. } => "xsl:copy",
            Instruction::CopyOf { .. } => "xsl:copy-of",
            Instruction::If { .. } => "xsl:if",
            Instruction::Choose { .. } => "xsl:choose",
            Instruction::Variable { .. } => "xsl:variable",
            Instruction::Number { .. } => "xsl:number",
        }
    }

    fn child_bodies_mut(&mut self) -> Vec<&mut Vec<Instruction>> {
        match self {
            Instruction::Element { body, .. }
            | Instruction::ForEach { body, .. }
            | Instruction::ForEachGroup { body, .. }
            | Instruction::Copy { body, .. }
            | Instruction::If { body, .. } => vec![body],
            Instruction::Choose { whens, otherwise } => {
                let mut bodies: Vec<&mut Vec<Instruction>> =
                    whens.iter_mut().map(|w| &mut w.body).collect();
                bodies.push(otherwise);
                bodies
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSet {
    pub name: String,
    pub attributes: Vec<LiteralAttribute>,
    pub use_attribute_sets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyDeclaration {
    pub name: String,
    pub match_pattern: Expr,
    pub use_expr: Expr,
}

/// Which import precedences rule selection may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecedenceCeiling {
    Any,
    /// Only rules imported below the given precedence (`apply-imports`).
    Below(u32),
    /// No rule may match; only the built-in rules apply.
    Nothing,
}

impl PrecedenceCeiling {
    fn admits(self, precedence: u32) -> bool {
        match self {
            PrecedenceCeiling::Any => true,
            PrecedenceCeiling::Below(limit) => precedence < limit,
            PrecedenceCeiling::Nothing => false,
        }
    }
}

/// The winner of rule selection.
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'s> {
    pub template: &'s Template,
    /// Another rule with the same priority and precedence also matched.
    pub ambiguous: bool,
}

#[derive(Debug, Clone)]
pub struct Stylesheet {
    templates: Vec<Template>,
    named: HashMap<String, TemplateId>,
    attribute_sets: HashMap<String, AttributeSet>,
    keys: Vec<KeyDeclaration>,
    output_method: Option<OutputMethod>,
    counters: usize,
    default_element: Template,
    default_text: Template,
    default_root: Template,
}

impl Stylesheet {
    pub fn builder() -> StylesheetBuilder {
        StylesheetBuilder::default()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.get(id).or_else(|| {
            [&self.default_element, &self.default_text, &self.default_root]
                .into_iter()
                .find(|t| t.id == id)
        })
    }

    pub fn named_template(&self, name: &str) -> Option<&Template> {
        self.named.get(name).and_then(|&id| self.templates.get(id))
    }

    pub fn attribute_set(&self, name: &str) -> Option<&AttributeSet> {
        self.attribute_sets.get(name)
    }

    pub fn keys(&self) -> &[KeyDeclaration] {
        &self.keys
    }

    pub fn output_method(&self) -> Option<OutputMethod> {
        self.output_method
    }

    /// Number of `xsl:number` counters in the stylesheet.
    pub fn counter_count(&self) -> usize {
        self.counters
    }

    /// The built-in rule for a node kind. Comments, processing instructions and
    /// namespace nodes have none.
    pub fn default_rule(&self, kind: NodeKind) -> Option<&Template> {
        match kind {
            NodeKind::Element | NodeKind::DocumentFragment => Some(&self.default_element),
            NodeKind::Text | NodeKind::CData | NodeKind::Attribute => Some(&self.default_text),
            NodeKind::Document => Some(&self.default_root),
            NodeKind::Comment
            | NodeKind::ProcessingInstruction
            | NodeKind::Namespace
            | NodeKind::EntityReference => None,
        }
    }

    /// Picks the highest-priority matching rule in `mode`, breaking priority ties
    /// by import precedence and remaining ties by declaration order (last wins).
    /// `matches` is only consulted for rules that pass the mode and precedence
    /// filters.
    pub fn find_best_matching_template<E>(
        &self,
        mode: Option<&str>,
        ceiling: PrecedenceCeiling,
        mut matches: impl FnMut(&Expr) -> Result<bool, E>,
    ) -> Result<Option<RuleMatch<'_>>, E> {
        let mut best: Option<RuleMatch<'_>> = None;
        for template in &self.templates {
            let Some(pattern) = &template.match_pattern else {
                continue;
            };
            if template.mode.as_deref() != mode || !ceiling.admits(template.import_precedence) {
                continue;
            }
            if !matches(pattern)? {
                continue;
            }
            best = match best {
                None => Some(RuleMatch {
                    template,
                    ambiguous: false,
                }),
                Some(current) => {
                    let key = (template.priority, template.import_precedence);
                    let current_key = (current.template.priority, current.template.import_precedence);
                    if key > current_key {
                        Some(RuleMatch {
                            template,
                            ambiguous: false,
                        })
                    } else if key == current_key {
                        Some(RuleMatch {
                            template,
                            ambiguous: true,
                        })
                    } else {
                        Some(current)
                    }
                }
            };
        }
        Ok(best)
    }
}

#[derive(Debug, Default)]
pub struct StylesheetBuilder {
    templates: Vec<Template>,
    attribute_sets: Vec<AttributeSet>,
    keys: Vec<KeyDeclaration>,
    output_method: Option<OutputMethod>,
}

impl StylesheetBuilder {
    pub fn template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    pub fn attribute_set(mut self, set: AttributeSet) -> Self {
        self.attribute_sets.push(set);
        self
    }

    pub fn key(mut self, key: KeyDeclaration) -> Self {
        self.keys.push(key);
        self
    }

    pub fn output_method(mut self, method: OutputMethod) -> Self {
        self.output_method = Some(method);
        self
    }

    pub fn build(self) -> Stylesheet {
        let mut templates = self.templates;
        let mut named: HashMap<String, TemplateId> = HashMap::new();
        let mut counters = 0;
        for (id, template) in templates.iter_mut().enumerate() {
            template.id = id;
            number_counters(&mut template.body, &mut counters);
        }
        for template in &templates {
            let Some(name) = &template.name else { continue };
            let replaces = named
                .get(name)
                .map(|&existing| templates[existing].import_precedence <= template.import_precedence)
                .unwrap_or(true);
            if replaces {
                named.insert(name.clone(), template.id);
            }
        }

        let apply_in_current_mode = || {
            vec![Instruction::ApplyTemplates {
                select: None,
                mode: ApplyMode::Current,
                sort_keys: Vec::new(),
            }]
        };
        let base = templates.len();
        let mut default_element =
            Template::builtin(TemplateKind::DefaultElement, apply_in_current_mode());
        default_element.id = base;
        let mut default_text = Template::builtin(TemplateKind::DefaultText, Vec::new());
        default_text.id = base + 1;
        let mut default_root = Template::builtin(TemplateKind::DefaultRoot, apply_in_current_mode());
        default_root.id = base + 2;

        debug!(
            "Built stylesheet: {} templates, {} named, {} attribute sets, {} keys",
            templates.len(),
            named.len(),
            self.attribute_sets.len(),
            self.keys.len()
        );

        Stylesheet {
            templates,
            named,
            attribute_sets: self
                .attribute_sets
                .into_iter()
                .map(|set| (set.name.clone(), set))
                .collect(),
            keys: self.keys,
            output_method: self.output_method,
            counters,
            default_element,
            default_text,
            default_root,
        }
    }
}

fn number_counters(body: &mut [Instruction], next: &mut usize) {
    for instruction in body {
        if let Instruction::Number { counter, .. } = instruction {
            *counter = *next;
            *next += 1;
        }
        for child in instruction.child_bodies_mut() {
            number_counters(child, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priorities() {
        assert_eq!(default_priority("item"), 0.0);
        assert_eq!(default_priority("@id"), 0.0);
        assert_eq!(default_priority("*"), -0.5);
        assert_eq!(default_priority("text()"), -0.5);
        assert_eq!(default_priority("x:*"), -0.25);
        assert_eq!(default_priority("list/item"), 0.5);
        assert_eq!(default_priority("* | item"), 0.0);
    }

    #[test]
    fn test_rule_selection_priority_then_precedence_then_order() {
        let sheet = Stylesheet::builder()
            .template(Template::matching("a", vec![]).with_priority(1.0))
            .template(Template::matching("b", vec![]).with_priority(2.0))
            .template(Template::matching("c", vec![]).with_priority(2.0).with_import_precedence(1))
            .template(Template::matching("d", vec![]).with_priority(2.0).with_import_precedence(1))
            .template(Template::matching("e", vec![]).with_mode("other").with_priority(9.0))
            .build();

        let all = |_: &Expr| Ok::<bool, ()>(true);
        let best = sheet
            .find_best_matching_template(None, PrecedenceCeiling::Any, all)
            .unwrap()
            .unwrap();
        assert_eq!(best.template.match_pattern, Some(Expr::new("d")));
        assert!(best.ambiguous);

        let below = sheet
            .find_best_matching_template(None, PrecedenceCeiling::Below(1), all)
            .unwrap()
            .unwrap();
        assert_eq!(below.template.match_pattern, Some(Expr::new("b")));
        assert!(!below.ambiguous);

        let in_mode = sheet
            .find_best_matching_template(Some("other"), PrecedenceCeiling::Any, all)
            .unwrap()
            .unwrap();
        assert_eq!(in_mode.template.id, 4);

        assert!(sheet
            .find_best_matching_template(None, PrecedenceCeiling::Nothing, all)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_match_callback_only_sees_eligible_patterns() {
        let sheet = Stylesheet::builder()
            .template(Template::matching("a", vec![]).with_mode("m"))
            .template(Template::matching("b", vec![]))
            .build();
        let mut seen = Vec::new();
        let found = sheet
            .find_best_matching_template(None, PrecedenceCeiling::Any, |p: &Expr| {
                seen.push(p.as_str().to_string());
                Ok::<bool, ()>(false)
            })
            .unwrap();
        assert!(found.is_none());
        assert_eq!(seen, vec!["b".to_string()]);
    }

    #[test]
    fn test_builtin_rules_and_counters() {
        let sheet = Stylesheet::builder()
            .template(Template::matching(
                "item",
                vec![Instruction::number(), Instruction::If {
                    test: Expr::new("true()"),
                    body: vec![Instruction::number()],
                }],
            ))
            .template(Template::named("helper", vec![]))
            .build();

        assert_eq!(sheet.counter_count(), 2);
        assert_eq!(sheet.named_template("helper").unwrap().id, 1);
        assert!(sheet.default_rule(NodeKind::Comment).is_none());
        let element_rule = sheet.default_rule(NodeKind::DocumentFragment).unwrap();
        assert_eq!(element_rule.kind, TemplateKind::DefaultElement);
        assert_eq!(sheet.template(element_rule.id).unwrap().kind, TemplateKind::DefaultElement);
        assert_eq!(sheet.default_rule(NodeKind::CData).unwrap().kind, TemplateKind::DefaultText);
    }

    #[test]
    fn test_value_template_parsing() {
        let avt = ValueTemplate::parse("id-{@n}-{{x}}").unwrap();
        assert_eq!(
            avt.0,
            vec![
                ValuePart::Literal("id-".into()),
                ValuePart::Expr(Expr::new("@n")),
                ValuePart::Literal("-{x}".into()),
            ]
        );
        assert!(ValueTemplate::parse("plain").unwrap().is_static());
        assert!(ValueTemplate::parse("{unclosed").is_err());
        assert!(ValueTemplate::parse("stray}").is_err());
    }
}
