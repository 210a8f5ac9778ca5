mod common;

use common::text_of;
use trellis::{Expr, Grouping, Instruction, SortKey, Stylesheet, Template};

fn for_each(select: &str, sort_keys: Vec<SortKey>, body: Vec<Instruction>) -> Instruction {
    Instruction::ForEach {
        select: Expr::new(select),
        sort_keys,
        body,
    }
}

fn for_each_group(
    select: &str,
    grouping: Grouping,
    sort_keys: Vec<SortKey>,
    body: Vec<Instruction>,
) -> Instruction {
    Instruction::ForEachGroup {
        select: Expr::new(select),
        grouping,
        sort_keys,
        body,
    }
}

fn on_root(element: &str, body: Vec<Instruction>) -> Stylesheet {
    Stylesheet::builder()
        .template(Template::matching(element, body))
        .build()
}

#[test]
fn test_numeric_then_descending_text_sort() {
    let stylesheet = on_root(
        "r",
        vec![for_each(
            "n",
            vec![SortKey::number("@k"), SortKey::text("@s").descending()],
            vec![Instruction::value_of("@s")],
        )],
    );
    let xml = r#"<r><n k="2" s="b"/><n k="1" s="a"/><n k="1" s="z"/></r>"#;
    assert_eq!(text_of(xml, &stylesheet), "zab");
}

#[test]
fn test_plain_sort_treats_nan_as_zero() {
    let ascending = on_root(
        "r",
        vec![for_each("n", vec![SortKey::number("@k")], vec![Instruction::value_of(".")])],
    );
    let descending = on_root(
        "r",
        vec![for_each(
            "n",
            vec![SortKey::number("@k").descending()],
            vec![Instruction::value_of(".")],
        )],
    );
    let xml = r#"<r><n k="x">first</n><n k="0">second</n><n k="-1">third</n></r>"#;
    assert_eq!(text_of(xml, &ascending), "thirdfirstsecond");
    assert_eq!(text_of(xml, &descending), "firstsecondthird");
}

#[test]
fn test_sorted_apply_templates_positions() {
    let stylesheet = Stylesheet::builder()
        .template(Template::matching(
            "r",
            vec![Instruction::ApplyTemplates {
                select: Some(Expr::new("n")),
                mode: Default::default(),
                sort_keys: vec![SortKey::text("@s")],
            }],
        ))
        .template(Template::matching(
            "n",
            vec![
                Instruction::value_of("position()"),
                Instruction::text("/"),
                Instruction::value_of("last()"),
                Instruction::value_of("@s"),
                Instruction::text(" "),
            ],
        ))
        .build();
    let xml = r#"<r><n s="c"/><n s="a"/><n s="b"/></r>"#;
    assert_eq!(text_of(xml, &stylesheet), "1/3a 2/3b 3/3c ");
}

const CITIES: &str = concat!(
    r#"<c><city country="no" name="Oslo"/><city country="se" name="Lund"/>"#,
    r#"<city country="no" name="Bergen"/></c>"#
);

fn describe_group() -> Vec<Instruction> {
    vec![
        Instruction::value_of("current-grouping-key()"),
        Instruction::text(":"),
        Instruction::value_of("count(current-group())"),
        Instruction::text(";"),
    ]
}

#[test]
fn test_group_by_in_order_of_first_appearance() {
    let stylesheet = on_root(
        "c",
        vec![for_each_group(
            "city",
            Grouping::By(Expr::new("@country")),
            vec![],
            describe_group(),
        )],
    );
    assert_eq!(text_of(CITIES, &stylesheet), "no:2;se:1;");
}

#[test]
fn test_sorted_groups_and_their_members() {
    let mut body = describe_group();
    body.push(for_each("current-group()", vec![], vec![Instruction::value_of("@name")]));
    body.push(Instruction::text(";"));
    let stylesheet = on_root(
        "c",
        vec![for_each_group(
            "city",
            Grouping::By(Expr::new("@country")),
            vec![SortKey::text("current-grouping-key()").descending()],
            body,
        )],
    );
    assert_eq!(text_of(CITIES, &stylesheet), "se:1;Lund;no:2;OsloBergen;");
}

#[test]
fn test_group_sort_by_group_size() {
    let stylesheet = on_root(
        "c",
        vec![for_each_group(
            "city",
            Grouping::By(Expr::new("@country")),
            vec![SortKey::number("count(current-group())")],
            vec![Instruction::value_of("current-grouping-key()")],
        )],
    );
    assert_eq!(text_of(CITIES, &stylesheet), "seno");
}

#[test]
fn test_group_sort_puts_nan_first() {
    let stylesheet = on_root(
        "r",
        vec![for_each_group(
            "n",
            Grouping::By(Expr::new("@k")),
            vec![SortKey::number("current-grouping-key()")],
            vec![Instruction::value_of("current-grouping-key()"), Instruction::text(",")],
        )],
    );
    let xml = r#"<r><n k="0"/><n k="x"/><n k="-1"/></r>"#;
    assert_eq!(text_of(xml, &stylesheet), "x,-1,0,");
}

#[test]
fn test_group_adjacent_splits_runs() {
    let stylesheet = on_root(
        "l",
        vec![for_each_group(
            "i",
            Grouping::Adjacent(Expr::new("@t")),
            vec![],
            describe_group(),
        )],
    );
    let xml = r#"<l><i t="a"/><i t="a"/><i t="b"/><i t="a"/></l>"#;
    assert_eq!(text_of(xml, &stylesheet), "a:2;b:1;a:1;");
}
