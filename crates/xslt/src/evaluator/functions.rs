//! The function library: `count`, `number`, `string`, `boolean`, `not`, `true`,
//! `false`, `position`, `last`, `current`, `name`, `local-name`, `concat`,
//! `contains`, `starts-with`, `string-length`, `normalize-space`, `sum`, `key`,
//! `current-group` and `current-grouping-key`.
use super::{Engine, Expression, Focus};
use trellis_dtm::SourceNode;
use trellis_traits::{TypedValue, XPathError, parse_number};

fn arity(function: &str, args: &[Expression], min: usize, max: usize) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        return Err(XPathError::Function {
            function: function.to_string(),
            message: format!("expected {}..={} arguments, found {}", min, max, args.len()),
        });
    }
    Ok(())
}

pub(super) fn call<'a, N: SourceNode<'a>>(
    engine: &Engine<'_, '_, N>,
    name: &str,
    args: &[Expression],
    focus: Focus<N>,
) -> Result<TypedValue<N>, XPathError> {
    let string_arg = |i: usize| -> Result<String, XPathError> {
        match args.get(i) {
            Some(arg) => Ok(engine.eval(arg, focus)?.to_string_value()),
            None => Ok(focus.node.string_value()),
        }
    };
    let first_node = |function: &str| -> Result<Option<N>, XPathError> {
        match args.first() {
            Some(arg) => Ok(engine.node_set(arg, focus, function)?.first().copied()),
            None => Ok(Some(focus.node)),
        }
    };

    let value = match name {
        "count" => {
            arity(name, args, 1, 1)?;
            TypedValue::Number(engine.node_set(&args[0], focus, name)?.len() as f64)
        }
        "sum" => {
            arity(name, args, 1, 1)?;
            let nodes = engine.node_set(&args[0], focus, name)?;
            TypedValue::Number(nodes.iter().map(|n| parse_number(&n.string_value())).sum())
        }
        "number" => {
            arity(name, args, 0, 1)?;
            match args.first() {
                Some(arg) => TypedValue::Number(engine.eval(arg, focus)?.to_number()),
                None => TypedValue::Number(parse_number(&focus.node.string_value())),
            }
        }
        "string" => {
            arity(name, args, 0, 1)?;
            TypedValue::String(string_arg(0)?)
        }
        "boolean" => {
            arity(name, args, 1, 1)?;
            TypedValue::Boolean(engine.eval(&args[0], focus)?.to_bool())
        }
        "not" => {
            arity(name, args, 1, 1)?;
            TypedValue::Boolean(!engine.eval(&args[0], focus)?.to_bool())
        }
        "true" | "false" => {
            arity(name, args, 0, 0)?;
            TypedValue::Boolean(name == "true")
        }
        "position" => {
            arity(name, args, 0, 0)?;
            TypedValue::Number(focus.position as f64)
        }
        "last" => {
            arity(name, args, 0, 0)?;
            TypedValue::Number(focus.size as f64)
        }
        "current" => {
            arity(name, args, 0, 0)?;
            TypedValue::NodeSet(vec![engine.ctx.node])
        }
        "name" | "local-name" => {
            arity(name, args, 0, 1)?;
            let node = first_node(name)?;
            TypedValue::String(match node.and_then(|n| n.name()) {
                Some(q) if name == "name" => q.to_string(),
                Some(q) => q.local_part.to_string(),
                None => String::new(),
            })
        }
        "concat" => {
            arity(name, args, 2, usize::MAX)?;
            let mut out = String::new();
            for i in 0..args.len() {
                out.push_str(&string_arg(i)?);
            }
            TypedValue::String(out)
        }
        "contains" | "starts-with" => {
            arity(name, args, 2, 2)?;
            let (haystack, needle) = (string_arg(0)?, string_arg(1)?);
            TypedValue::Boolean(if name == "contains" {
                haystack.contains(&needle)
            } else {
                haystack.starts_with(&needle)
            })
        }
        "string-length" => {
            arity(name, args, 0, 1)?;
            TypedValue::Number(string_arg(0)?.chars().count() as f64)
        }
        "normalize-space" => {
            arity(name, args, 0, 1)?;
            TypedValue::String(string_arg(0)?.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        "key" => {
            arity(name, args, 2, 2)?;
            let key_name = string_arg(0)?;
            let keys = engine
                .ctx
                .keys
                .ok_or_else(|| XPathError::UnknownKey(key_name.clone()))?;
            let values = match engine.eval(&args[1], focus)? {
                TypedValue::NodeSet(nodes) => nodes.iter().map(|n| n.string_value()).collect(),
                other => vec![other.to_string_value()],
            };
            let mut nodes = Vec::new();
            for value in values {
                let found = keys
                    .lookup(&key_name, &value)
                    .ok_or_else(|| XPathError::UnknownKey(key_name.clone()))?;
                nodes.extend_from_slice(found);
            }
            nodes.sort();
            nodes.dedup();
            TypedValue::NodeSet(nodes)
        }
        "current-group" => {
            arity(name, args, 0, 0)?;
            TypedValue::NodeSet(engine.ctx.current_group.map(<[N]>::to_vec).unwrap_or_default())
        }
        "current-grouping-key" => {
            arity(name, args, 0, 0)?;
            TypedValue::String(engine.ctx.grouping_key.unwrap_or_default().to_string())
        }
        _ => {
            return Err(XPathError::Function {
                function: name.to_string(),
                message: "unknown function".to_string(),
            });
        }
    };
    Ok(value)
}
