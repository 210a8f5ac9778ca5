//! A `nom` parser for the path-expression subset.
use super::syntax::*;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0},
    combinator::{map, map_res, opt, peek, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};
use trellis_traits::XPathError;

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    let failure = |message: String| XPathError::Parse {
        expression: input.to_string(),
        message,
    };
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(failure(format!("unexpected input at '{}'", rest))),
        Err(e) => Err(failure(e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn left_assoc<'a, F, G>(operand: F, operator: G) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = operand.clone().parse(input)?;
        let (input, rest) = many0(pair(ws(operator.clone()), operand.clone())).parse(input)?;
        for (op, right) in rest {
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(tag("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(tag("and"), |_| BinaryOperator::And).parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

fn expression(input: &str) -> IResult<&str, Expression> {
    left_assoc(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(equality_expr, and_op)(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("!="), |_| BinaryOperator::NotEquals),
        map(tag("="), |_| BinaryOperator::Equals),
    ))
    .parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(relational_expr, equality_op)(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(additive_expr, relational_op)(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(multiplicative_expr, additive_op)(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(tag("div"), |_| BinaryOperator::Divide),
        map(tag("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (input, negate) = opt(ws(char('-'))).parse(input)?;
    let (input, expr) = union_expr(input)?;
    match negate {
        Some(_) => Ok((input, Expression::Negate(Box::new(expr)))),
        None => Ok((input, expr)),
    }
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(path_expr, union_op)(input)
}

fn separator_steps(input: &str) -> IResult<&str, Vec<(&str, Step)>> {
    many0(pair(alt((tag("//"), tag("/"))), step)).parse(input)
}

fn extend_steps(steps: &mut Vec<Step>, rest: Vec<(&str, Step)>) {
    for (separator, step) in rest {
        if separator == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(step);
    }
}

// Primary expressions go first so `position()` is not read as a step named `position`.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0(input)?;
    let (input, start) = alt((primary_expr, map(location_path, Expression::Path))).parse(input)?;
    let (input, rest) = separator_steps(input)?;
    let (input, _) = multispace0(input)?;
    if rest.is_empty() {
        return Ok((input, start));
    }
    let mut path = match start {
        Expression::Path(path) => path,
        other => LocationPath {
            start: Some(Box::new(other)),
            absolute: false,
            steps: Vec::new(),
        },
    };
    extend_steps(&mut path.steps, rest);
    Ok((input, Expression::Path(path)))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        variable_reference,
        map(number_literal, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

fn number_literal(input: &str) -> IResult<&str, f64> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        str::parse::<f64>,
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        str::to_string,
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(
        preceded(char('$'), map_res(digit1, str::parse::<usize>)),
        Expression::Variable,
    )
    .parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(nc_name, opt(pair(char(':'), nc_name)))).parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(ws(char('(')), char(')')),
        ),
        |name: &str| {
            NodeTest::NodeType(match name {
                "text" => NodeTypeTest::Text,
                "comment" => NodeTypeTest::Comment,
                "processing-instruction" => NodeTypeTest::ProcessingInstruction,
                _ => NodeTypeTest::Node,
            })
        },
    )
    .parse(input)
}

fn name_test(input: &str) -> IResult<&str, NodeTest> {
    let (input, first) = nc_name(input)?;
    let (input, second) = opt(preceded(
        char(':'),
        alt((map(char('*'), |_| None), map(nc_name, Some))),
    ))
    .parse(input)?;
    let test = match second {
        None => NodeTest::Name {
            prefix: None,
            local: first.to_string(),
        },
        Some(None) => NodeTest::Wildcard(Some(first.to_string())),
        Some(Some(local)) => NodeTest::Name {
            prefix: Some(first.to_string()),
            local: local.to_string(),
        },
    };
    Ok((input, test))
}

fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(char('*'), |_| NodeTest::Wildcard(None)),
        node_type_test,
        name_test,
    ))
    .parse(input)
}

fn axis(input: &str) -> IResult<&str, Axis> {
    map(
        terminated(
            alt((
                tag("child"),
                tag("descendant-or-self"),
                tag("descendant"),
                tag("attribute"),
                tag("parent"),
                tag("ancestor-or-self"),
                tag("ancestor"),
                tag("self"),
                tag("following-sibling"),
                tag("preceding-sibling"),
            )),
            tag("::"),
        ),
        |name: &str| match name {
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "parent" => Axis::Parent,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "ancestor" => Axis::Ancestor,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let any_node = || NodeTest::NodeType(NodeTypeTest::Node);
    let (input, (axis, test)) = alt((
        map(tag(".."), |_| (Axis::Parent, any_node())),
        map(char('.'), |_| (Axis::SelfAxis, any_node())),
        map(preceded(char('@'), node_test), |test| (Axis::Attribute, test)),
        map(pair(opt(axis), node_test), |(axis, test)| {
            (axis.unwrap_or(Axis::Child), test)
        }),
    ))
    .parse(input)?;
    let (input, predicates) = many0(predicate).parse(input)?;
    Ok((
        input,
        Step {
            axis,
            test,
            predicates,
        },
    ))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (input, absolute, mut steps) = if let Some(rest) = input.strip_prefix("//") {
        let (rest, first) = step(rest)?;
        (rest, true, vec![Step::descendant_or_self(), first])
    } else if let Some(rest) = input.strip_prefix('/') {
        match step(rest) {
            Ok((rest, first)) => (rest, true, vec![first]),
            Err(_) => (rest, true, Vec::new()),
        }
    } else {
        let (rest, first) = step(input)?;
        (rest, false, vec![first])
    };
    let (input, rest) = separator_steps(input)?;
    extend_steps(&mut steps, rest);
    Ok((
        input,
        LocationPath {
            start: None,
            absolute,
            steps,
        },
    ))
}

// Node-type names are steps, not functions.
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (rest, name) = q_name(input)?;
    let (rest, _) = peek(ws(char('('))).parse(rest)?;
    if matches!(name, "text" | "node" | "comment" | "processing-instruction") {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (rest, _) = multispace0(rest)?;
    let (rest, args) = delimited(
        char('('),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )
    .parse(rest)?;
    Ok((
        rest,
        Expression::FunctionCall {
            name: name.to_string(),
            args,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(local: &str) -> Step {
        Step {
            axis: Axis::Child,
            test: NodeTest::Name {
                prefix: None,
                local: local.to_string(),
            },
            predicates: vec![],
        }
    }

    #[test]
    fn test_parse_relative_and_descendant_paths() {
        assert_eq!(
            parse_expression("a//b").unwrap(),
            Expression::Path(LocationPath {
                start: None,
                absolute: false,
                steps: vec![child("a"), Step::descendant_or_self(), child("b")],
            })
        );
        assert_eq!(
            parse_expression("/").unwrap(),
            Expression::Path(LocationPath {
                start: None,
                absolute: true,
                steps: vec![],
            })
        );
    }

    #[test]
    fn test_parse_function_path_and_predicates() {
        let expr = parse_expression("key('k', @ref)/name[1]").unwrap();
        let Expression::Path(path) = expr else {
            panic!("expected a path");
        };
        assert!(matches!(path.start.as_deref(), Some(Expression::FunctionCall { name, args }) if name == "key" && args.len() == 2));
        assert_eq!(path.steps.len(), 1);
        assert_eq!(path.steps[0].predicates, vec![Expression::Number(1.0)]);
    }

    #[test]
    fn test_parse_operators_and_names() {
        assert!(matches!(
            parse_expression("count(current-group()) > 1 and $0 != 'x'").unwrap(),
            Expression::Binary { op: BinaryOperator::And, .. }
        ));
        assert!(matches!(
            parse_expression("info").unwrap(),
            Expression::Path(LocationPath { ref steps, .. }) if steps == &vec![child("info")]
        ));
        assert!(matches!(
            parse_expression("h:*").unwrap(),
            Expression::Path(LocationPath { ref steps, .. }) if steps[0].test == NodeTest::Wildcard(Some("h".to_string()))
        ));
        assert!(matches!(parse_expression("text()|@*").unwrap(), Expression::Binary { op: BinaryOperator::Union, .. }));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_expression("a["), Err(XPathError::Parse { .. })));
        assert!(matches!(parse_expression("count(a"), Err(XPathError::Parse { .. })));
    }
}
