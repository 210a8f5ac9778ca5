mod common;

use common::{run, run_with, text_of};
use trellis::state::TEMPLATE_ELEMENT_LIMIT;
use trellis::{
    ApplyMode, AttributeSet, DiagnosticLog, EventRecorder, Expr, Instruction, KeyDeclaration,
    LiteralAttribute, ResultEvent, Severity, SimplePathEvaluator, Stylesheet, Template,
    TransformConfig, TransformerBuilder, ValueTemplate, When, WithParam, XPathError, XmlDocument,
    XsltError,
};

fn element(qname: &str, attributes: Vec<LiteralAttribute>, body: Vec<Instruction>) -> Instruction {
    Instruction::Element {
        uri: String::new(),
        local_name: qname.to_string(),
        qname: qname.to_string(),
        namespaces: Vec::new(),
        attributes,
        use_attribute_sets: Vec::new(),
        body,
    }
}

fn attr(qname: &str, value: &str) -> LiteralAttribute {
    LiteralAttribute::new(qname, ValueTemplate::parse(value).unwrap())
}

#[test]
fn test_builtin_rules_copy_text_only() {
    let stylesheet = Stylesheet::builder().build();
    let run = run("<a>x<b id=\"1\">y</b><!--c--><?p d?></a>", &stylesheet);
    assert!(run.result.is_ok());
    assert_eq!(run.text(), "xy");
    assert_eq!(run.events.count(|e| matches!(e, ResultEvent::StartDocument)), 1);
    assert_eq!(run.events.count(|e| matches!(e, ResultEvent::StartElement { .. })), 0);
    assert_eq!(run.events.count(|e| matches!(e, ResultEvent::Comment(_))), 0);
}

#[test]
fn test_literal_elements_with_value_templates() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching(
            "item",
            vec![element("row", vec![attr("id", "r{@id}")], vec![Instruction::value_of(".")])],
        ))
        .build();
    let out = trellis::transform_to_string(
        r#"<list><item id="1">a</item><item id="2">b</item></list>"#,
        &stylesheet,
        &TransformConfig::default(),
    )
    .unwrap();
    assert_eq!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8"?><row id="r1">a</row><row id="r2">b</row>"#
    );
}

#[test]
fn test_attribute_placement_does_not_change_events() {
    let literal = Stylesheet::builder()
        .template(Template::matching(
            "item",
            vec![element("row", vec![attr("a", "1"), attr("b", "2")], vec![Instruction::text("t")])],
        ))
        .build();
    let instructions = Stylesheet::builder()
        .template(Template::matching(
            "item",
            vec![element(
                "row",
                vec![],
                vec![
                    Instruction::Attribute(attr("a", "1")),
                    Instruction::Attribute(attr("b", "2")),
                    Instruction::text("t"),
                ],
            )],
        ))
        .build();
    let from_set = Stylesheet::builder()
        .attribute_set(AttributeSet {
            name: "first".to_string(),
            attributes: vec![attr("a", "1")],
            use_attribute_sets: vec![],
        })
        .template(Template::matching(
            "item",
            vec![Instruction::Element {
                uri: String::new(),
                local_name: "row".to_string(),
                qname: "row".to_string(),
                namespaces: Vec::new(),
                attributes: vec![attr("b", "2")],
                use_attribute_sets: vec!["first".to_string()],
                body: vec![Instruction::text("t")],
            }],
        ))
        .build();

    let xml = "<list><item/></list>";
    let expected = run(xml, &literal);
    assert!(expected.result.is_ok());
    assert_eq!(
        expected.labels(),
        vec!["StartDocument", "<row>", "text(\"t\")", "</row>", "EndDocument"]
    );
    assert_eq!(run(xml, &instructions).events.events(), expected.events.events());
    assert_eq!(run(xml, &from_set).events.events(), expected.events.events());
}

#[test]
fn test_recursive_rule_stops_at_limit() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("loop", vec![Instruction::apply_templates_select(".")]))
        .build();
    let doc = XmlDocument::parse("<loop/>").unwrap();
    let evaluator = SimplePathEvaluator::new();
    let mut events = EventRecorder::new();
    let mut log = DiagnosticLog::new();
    {
        let mut transformer = TransformerBuilder::new(&stylesheet, &evaluator)
            .content_handler(&mut events)
            .error_listener(&mut log)
            .config(TransformConfig::default().with_recursion_limit(50))
            .build()
            .unwrap();
        let result = transformer.transform(doc.root_node());
        assert!(matches!(result, Err(XsltError::RecursionLimit { limit: 50, .. })));
        assert!(transformer.state().is_idle());
    }
    assert_eq!(log.count(Severity::Fatal), 1);
    assert!(events.is_empty());
}

#[test]
fn test_unguarded_recursion_hits_template_stack_cap() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching(
            "loop",
            vec![Instruction::apply_templates_select(".")],
        ))
        .build();
    let run = run("<loop/>", &stylesheet);
    assert!(matches!(
        run.result,
        Err(XsltError::TemplateStackOverflow(limit)) if limit == TEMPLATE_ELEMENT_LIMIT
    ));
    assert_eq!(run.log.count(Severity::Fatal), 1);
    assert!(run.events.is_empty());
}

#[test]
fn test_transformer_reset_allows_rerun() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("item", vec![Instruction::number()]))
        .build();
    let doc = XmlDocument::parse("<l><item/><item/></l>").unwrap();
    let evaluator = SimplePathEvaluator::new();
    let mut events = EventRecorder::new();
    {
        let mut transformer = TransformerBuilder::new(&stylesheet, &evaluator)
            .content_handler(&mut events)
            .build()
            .unwrap();
        transformer.transform(doc.root_node()).unwrap();
        assert!(!transformer.state().counters().is_empty());
        transformer.reset();
        assert!(transformer.state().counters().is_empty());
        transformer.transform(doc.root_node()).unwrap();
    }
    assert_eq!(events.text(), "1212");
    assert_eq!(events.count(|e| matches!(e, ResultEvent::StartDocument)), 2);
}

#[test]
fn test_missing_content_handler_fails_fast() {
    let stylesheet = Stylesheet::builder().build();
    let evaluator = SimplePathEvaluator::new();
    let doc = XmlDocument::parse("<a/>").unwrap();
    let built = TransformerBuilder::new(&stylesheet, &evaluator).build();
    assert!(matches!(built, Err(XsltError::MissingContentHandler)));
    // The node type is fixed by this call.
    if let Ok(mut transformer) = built {
        let _ = transformer.transform(doc.root_node());
    }
}

#[test]
fn test_named_template_parameters_and_variables() {
    let stylesheet = Stylesheet::builder()
        .template(
            Template::named("greet", vec![Instruction::text("hello "), Instruction::value_of("$0")])
                .with_frame_size(1),
        )
        .template(
            Template::matching(
                "p",
                vec![
                    Instruction::Variable {
                        name: "who".to_string(),
                        slot: 0,
                        select: Expr::new("@who"),
                    },
                    Instruction::CallTemplate {
                        name: "greet".to_string(),
                        params: vec![WithParam {
                            slot: 0,
                            select: Expr::new("$0"),
                        }],
                    },
                    Instruction::text("/"),
                    Instruction::value_of("$0"),
                ],
            )
            .with_frame_size(1),
        )
        .build();
    assert_eq!(text_of(r#"<p who="ann"/>"#, &stylesheet), "hello ann/ann");
}

#[test]
fn test_unknown_named_template_is_fatal() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching(
            "p",
            vec![Instruction::CallTemplate {
                name: "missing".to_string(),
                params: vec![],
            }],
        ))
        .build();
    let run = run("<p/>", &stylesheet);
    assert!(matches!(run.result, Err(XsltError::UnknownNamedTemplate(name)) if name == "missing"));
    assert_eq!(run.log.count(Severity::Fatal), 1);
}

#[test]
fn test_choose_and_if() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching(
            "i",
            vec![
                Instruction::Choose {
                    whens: vec![
                        When {
                            test: Expr::new("@v = 1"),
                            body: vec![Instruction::text("one")],
                        },
                        When {
                            test: Expr::new("@v = 2"),
                            body: vec![Instruction::text("two")],
                        },
                    ],
                    otherwise: vec![Instruction::text("many")],
                },
                Instruction::If {
                    test: Expr::new("@last"),
                    body: vec![Instruction::text("!")],
                },
            ],
        ))
        .build();
    let xml = r#"<l><i v="1"/><i v="2"/><i v="3" last="y"/></l>"#;
    assert_eq!(text_of(xml, &stylesheet), "onetwomany!");
}

#[test]
fn test_copy_and_copy_of() {
    let identity = Stylesheet::builder()
        .template(Template::matching("*", vec![Instruction::copy(vec![Instruction::apply_templates()])]))
        .build();
    let out = trellis::transform_to_string(
        r#"<r><p a="1">t</p></r>"#,
        &identity,
        &TransformConfig::default(),
    )
    .unwrap();
    assert_eq!(out, r#"<?xml version="1.0" encoding="UTF-8"?><r><p>t</p></r>"#);

    let deep = Stylesheet::builder()
        .template(Template::matching("r", vec![Instruction::copy_of("p"), Instruction::copy_of("count(p)")]))
        .build();
    let out = trellis::transform_to_string(
        r#"<r><p a="1"><b>t</b></p></r>"#,
        &deep,
        &TransformConfig::default(),
    )
    .unwrap();
    assert_eq!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8"?><p a="1"><b>t</b></p>1"#
    );
}

#[test]
fn test_number_counts_preceding_siblings() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("i", vec![Instruction::number(), Instruction::text(".")]))
        .build();
    assert_eq!(text_of("<l><i/><x/><i/><i/></l>", &stylesheet), "1.2.3.");
}

#[test]
fn test_keys_index_nodes_by_value() {
    let stylesheet = Stylesheet::builder()
        .key(KeyDeclaration {
            name: "by-cat".to_string(),
            match_pattern: Expr::new("item"),
            use_expr: Expr::new("@cat"),
        })
        .template(Template::matching(
            "l",
            vec![
                Instruction::value_of("count(key('by-cat', 'a'))"),
                Instruction::text("|"),
                Instruction::ForEach {
                    select: Expr::new("key('by-cat', 'b')"),
                    sort_keys: vec![],
                    body: vec![Instruction::value_of("@id")],
                },
                Instruction::text("|"),
                Instruction::value_of("count(key('by-cat', 'z'))"),
            ],
        ))
        .build();
    let xml = r#"<l><item cat="a" id="1"/><item cat="b" id="2"/><item cat="a" id="3"/></l>"#;
    assert_eq!(text_of(xml, &stylesheet), "2|2|0");
}

#[test]
fn test_undeclared_key_is_an_error() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("l", vec![Instruction::value_of("count(key('nope', 'a'))")]))
        .build();
    let run = run("<l/>", &stylesheet);
    assert!(matches!(
        run.result,
        Err(XsltError::XPath(XPathError::UnknownKey(name))) if name == "nope"
    ));
}

#[test]
fn test_apply_imports_uses_lower_precedence() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("item", vec![Instruction::text("low")]))
        .template(
            Template::matching(
                "item",
                vec![Instruction::text("["), Instruction::ApplyImports, Instruction::text("]")],
            )
            .with_import_precedence(1),
        )
        .build();
    assert_eq!(text_of("<l><item/></l>", &stylesheet), "[low]");

    let lowest = Stylesheet::builder()
        .template(Template::matching("item", vec![Instruction::ApplyImports]))
        .build();
    assert_eq!(text_of("<l><item>t</item></l>", &lowest), "t");
}

#[test]
fn test_conflicting_rules_warn_and_last_wins() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("item", vec![Instruction::text("first")]))
        .template(Template::matching("item", vec![Instruction::text("second")]))
        .build();
    let xml = "<l><item/><item/></l>";
    let noisy = run(xml, &stylesheet);
    assert_eq!(noisy.text(), "secondsecond");
    assert_eq!(noisy.log.count(Severity::Warning), 2);

    let quiet = run_with(
        xml,
        &stylesheet,
        TransformConfig {
            quiet_conflict_warnings: true,
            ..TransformConfig::default()
        },
    );
    assert_eq!(quiet.text(), "secondsecond");
    assert_eq!(quiet.log.count(Severity::Warning), 0);
}

#[test]
fn test_modes_select_their_own_rules() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching("item", vec![Instruction::text("plain")]))
        .template(Template::matching("item", vec![Instruction::text("fancy")]).with_mode("m"))
        .template(Template::matching(
            "l",
            vec![
                Instruction::ApplyTemplates {
                    select: Some(Expr::new("item")),
                    mode: ApplyMode::Named("m".to_string()),
                    sort_keys: vec![],
                },
                Instruction::apply_templates_select("item"),
            ],
        ))
        .build();
    assert_eq!(text_of("<l><item/></l>", &stylesheet), "fancyplain");
}

#[test]
fn test_attribute_set_cycle_is_rejected() {
    let stylesheet = Stylesheet::builder()
        .attribute_set(AttributeSet {
            name: "a".to_string(),
            attributes: vec![attr("x", "1")],
            use_attribute_sets: vec!["b".to_string()],
        })
        .attribute_set(AttributeSet {
            name: "b".to_string(),
            attributes: vec![],
            use_attribute_sets: vec!["a".to_string()],
        })
        .template(Template::matching(
            "p",
            vec![Instruction::Element {
                uri: String::new(),
                local_name: "q".to_string(),
                qname: "q".to_string(),
                namespaces: Vec::new(),
                attributes: Vec::new(),
                use_attribute_sets: vec!["a".to_string()],
                body: Vec::new(),
            }],
        ))
        .build();
    let run = run("<p/>", &stylesheet);
    assert!(matches!(run.result, Err(XsltError::AttributeSetRecursion(name)) if name == "a"));
}
