mod common;

use common::run;
use trellis::{
    Instruction, OutputMethod, ResultEvent, Stylesheet, Template, TransformConfig,
    transform_to_string,
};

fn ns_element(qname: &str, uri: &str, body: Vec<Instruction>) -> Instruction {
    let local = qname.split_once(':').map_or(qname, |(_, l)| l);
    Instruction::Element {
        uri: uri.to_string(),
        local_name: local.to_string(),
        qname: qname.to_string(),
        namespaces: Vec::new(),
        attributes: Vec::new(),
        use_attribute_sets: Vec::new(),
        body,
    }
}

fn nested_in_namespace() -> Stylesheet {
    Stylesheet::builder()
        .template(Template::matching(
            "doc",
            vec![ns_element("x:a", "urn:x", vec![ns_element("x:b", "urn:x", vec![])])],
        ))
        .build()
}

#[test]
fn test_prefix_declared_once_for_nested_elements() {
    let run = run("<doc/>", &nested_in_namespace());
    assert!(run.result.is_ok());
    assert_eq!(
        run.events.count(|e| matches!(e, ResultEvent::StartPrefixMapping { prefix, uri } if prefix == "x" && uri == "urn:x")),
        1
    );
    assert_eq!(
        run.events.count(|e| matches!(e, ResultEvent::EndPrefixMapping { prefix } if prefix == "x")),
        1
    );
    let labels = run.labels();
    let end_a = labels.iter().position(|l| l == "</x:a>").unwrap();
    assert!(matches!(
        &run.events.events()[end_a + 1],
        ResultEvent::EndPrefixMapping { .. }
    ));
}

#[test]
fn test_namespace_declaration_serialized_on_outer_element() {
    let out = transform_to_string("<doc/>", &nested_in_namespace(), &TransformConfig::default()).unwrap();
    assert_eq!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8"?><x:a xmlns:x="urn:x"><x:b></x:b></x:a>"#
    );
}

fn page(root: &str) -> Stylesheet {
    Stylesheet::builder()
        .template(Template::matching(
            "doc",
            vec![Instruction::element(
                root,
                vec![Instruction::element("br", vec![]), Instruction::text("x")],
            )],
        ))
        .build()
}

#[test]
fn test_html_document_element_switches_output() {
    let out = transform_to_string("<doc/>", &page("html"), &TransformConfig::default()).unwrap();
    assert_eq!(out, "<html><br>x</html>");

    let run = run("<doc/>", &page("html"));
    assert_eq!(
        run.events.events()[0],
        ResultEvent::SwitchOutputMethod(OutputMethod::Html)
    );
    assert_eq!(run.events.events()[1], ResultEvent::StartDocument);
}

#[test]
fn test_html_switch_precedes_document_when_html_declares_namespaces() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching(
            "doc",
            vec![Instruction::Element {
                uri: String::new(),
                local_name: "html".to_string(),
                qname: "html".to_string(),
                namespaces: vec![("x".to_string(), "urn:x".to_string())],
                attributes: Vec::new(),
                use_attribute_sets: Vec::new(),
                body: vec![Instruction::element("br", vec![])],
            }],
        ))
        .build();

    let run = run("<doc/>", &stylesheet);
    assert!(run.result.is_ok());
    assert_eq!(
        run.events.events()[0],
        ResultEvent::SwitchOutputMethod(OutputMethod::Html)
    );
    assert_eq!(run.events.events()[1], ResultEvent::StartDocument);
    assert_eq!(
        run.events.count(|e| matches!(e, ResultEvent::StartPrefixMapping { prefix, .. } if prefix == "x")),
        1
    );

    let out = transform_to_string("<doc/>", &stylesheet, &TransformConfig::default()).unwrap();
    assert_eq!(out, r#"<html xmlns:x="urn:x"><br></html>"#);
}

#[test]
fn test_html_switch_is_case_sensitive_and_can_be_fixed() {
    let out = transform_to_string("<doc/>", &page("HTML"), &TransformConfig::default()).unwrap();
    assert_eq!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8"?><HTML><br></br>x</HTML>"#
    );

    let fixed = TransformConfig::default().with_output_method(OutputMethod::Xml);
    let out = transform_to_string("<doc/>", &page("html"), &fixed).unwrap();
    assert_eq!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8"?><html><br></br>x</html>"#
    );
}

#[test]
fn test_text_output_method() {
    let stylesheet = Stylesheet::builder()
        .output_method(OutputMethod::Text)
        .template(Template::matching(
            "doc",
            vec![Instruction::element("p", vec![Instruction::text("a < b")])],
        ))
        .build();
    let out = transform_to_string("<doc/>", &stylesheet, &TransformConfig::default()).unwrap();
    assert_eq!(out, "a < b");
}
