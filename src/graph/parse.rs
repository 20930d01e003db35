//! Text form of the pattern query language
//!
//! Grammar lives in `pattern.pest`. Parameters (`$name`) are substituted
//! from the caller's map at parse time.

use super::property::PropertyValue;
use super::query::{Condition, NodePattern, OrderBy, PatternQuery, RelPattern};
use super::types::{Direction, Label, RelType};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "graph/pattern.pest"]
struct PatternParser;

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),

    #[error("Unknown parameter ${0}")]
    UnknownParam(String),

    #[error("Malformed query: {0}")]
    Malformed(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a textual pattern query, substituting `$name` parameters.
pub fn parse_query(
    input: &str,
    params: &HashMap<String, PropertyValue>,
) -> ParseResult<PatternQuery> {
    let mut pairs =
        PatternParser::parse(Rule::query, input).map_err(Box::new)?;
    let query_pair = pairs
        .next()
        .ok_or_else(|| ParseError::Malformed("empty parse".to_string()))?;

    let mut start: Option<NodePattern> = None;
    let mut hop: Option<(RelPattern, NodePattern)> = None;
    let mut conditions = Vec::new();
    let mut returns = Vec::new();
    let mut order_by = None;
    let mut limit = None;

    for clause in query_pair.into_inner() {
        match clause.as_rule() {
            Rule::match_clause => {
                let mut rel: Option<RelPattern> = None;
                for part in clause.into_inner() {
                    match part.as_rule() {
                        Rule::node_pattern => {
                            let pattern = parse_node_pattern(part, params)?;
                            if start.is_none() {
                                start = Some(pattern);
                            } else if let Some(rel) = rel.take() {
                                hop = Some((rel, pattern));
                            }
                        }
                        Rule::rel_pattern => {
                            rel = Some(parse_rel_pattern(part)?);
                        }
                        _ => {}
                    }
                }
            }
            Rule::where_clause => {
                for cond in clause.into_inner() {
                    if cond.as_rule() == Rule::condition {
                        conditions.push(parse_condition(cond, params)?);
                    }
                }
            }
            Rule::return_clause => {
                for item in clause.into_inner() {
                    if item.as_rule() == Rule::ident {
                        returns.push(item.as_str().to_string());
                    }
                }
            }
            Rule::order_clause => {
                let mut var = String::new();
                let mut key = String::new();
                let mut descending = false;
                for part in clause.into_inner() {
                    match part.as_rule() {
                        Rule::prop_access => {
                            let (v, k) = parse_prop_access(part)?;
                            var = v;
                            key = k;
                        }
                        Rule::sort_dir => {
                            descending = part.as_str().eq_ignore_ascii_case("desc");
                        }
                        _ => {}
                    }
                }
                order_by = Some(OrderBy {
                    var,
                    key,
                    descending,
                });
            }
            Rule::limit_clause => {
                for part in clause.into_inner() {
                    if part.as_rule() == Rule::integer {
                        limit = part.as_str().parse::<usize>().ok();
                    }
                }
            }
            _ => {}
        }
    }

    Ok(PatternQuery {
        start: start.ok_or_else(|| ParseError::Malformed("missing match clause".to_string()))?,
        hop,
        conditions,
        returns,
        order_by,
        limit,
    })
}

fn parse_node_pattern(
    pair: Pair<Rule>,
    params: &HashMap<String, PropertyValue>,
) -> ParseResult<NodePattern> {
    let mut var = String::new();
    let mut label = None;
    let mut props = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::ident => var = part.as_str().to_string(),
            Rule::name => label = Some(Label::new(parse_name(part))),
            Rule::prop_map => {
                for pp in part.into_inner() {
                    if pp.as_rule() == Rule::prop_pair {
                        let mut inner = pp.into_inner();
                        let key = parse_name(
                            inner
                                .next()
                                .ok_or_else(|| ParseError::Malformed("property key".into()))?,
                        );
                        let value = parse_value(
                            inner
                                .next()
                                .ok_or_else(|| ParseError::Malformed("property value".into()))?,
                            params,
                        )?;
                        props.push((key, value));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(NodePattern { var, label, props })
}

fn parse_rel_pattern(pair: Pair<Rule>) -> ParseResult<RelPattern> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Malformed("relationship pattern".into()))?;
    let direction = match inner.as_rule() {
        Rule::rel_out => Direction::Outgoing,
        Rule::rel_in => Direction::Incoming,
        _ => Direction::Both,
    };

    let mut var = None;
    let mut types = Vec::new();
    for part in inner.into_inner() {
        if part.as_rule() == Rule::rel_body {
            for body in part.into_inner() {
                match body.as_rule() {
                    Rule::ident => var = Some(body.as_str().to_string()),
                    Rule::rel_types => {
                        for t in body.into_inner() {
                            if t.as_rule() == Rule::name {
                                types.push(RelType::new(parse_name(t)));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(RelPattern {
        var,
        types,
        direction,
    })
}

fn parse_condition(
    pair: Pair<Rule>,
    params: &HashMap<String, PropertyValue>,
) -> ParseResult<Condition> {
    let mut inner = pair.into_inner();
    let access = inner
        .next()
        .ok_or_else(|| ParseError::Malformed("condition target".into()))?;
    let (var, key) = parse_prop_access(access)?;
    let value = parse_value(
        inner
            .next()
            .ok_or_else(|| ParseError::Malformed("condition value".into()))?,
        params,
    )?;
    Ok(Condition { var, key, value })
}

fn parse_prop_access(pair: Pair<Rule>) -> ParseResult<(String, String)> {
    let mut inner = pair.into_inner();
    let var = inner
        .next()
        .ok_or_else(|| ParseError::Malformed("property access".into()))?
        .as_str()
        .to_string();
    let key = parse_name(
        inner
            .next()
            .ok_or_else(|| ParseError::Malformed("property access key".into()))?,
    );
    Ok((var, key))
}

fn parse_name(pair: Pair<Rule>) -> String {
    let s = pair.as_str();
    if let Some(stripped) = s.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        stripped.to_string()
    } else {
        s.to_string()
    }
}

fn parse_value(
    pair: Pair<Rule>,
    params: &HashMap<String, PropertyValue>,
) -> ParseResult<PropertyValue> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Malformed("value".into()))?;
    match inner.as_rule() {
        Rule::string => {
            let s = inner.as_str();
            Ok(PropertyValue::String(s[1..s.len() - 1].to_string()))
        }
        Rule::float => Ok(PropertyValue::Float(inner.as_str().parse().map_err(
            |_| ParseError::Malformed(format!("bad float {}", inner.as_str())),
        )?)),
        Rule::integer => Ok(PropertyValue::Integer(inner.as_str().parse().map_err(
            |_| ParseError::Malformed(format!("bad integer {}", inner.as_str())),
        )?)),
        Rule::boolean => Ok(PropertyValue::Boolean(
            inner.as_str().eq_ignore_ascii_case("true"),
        )),
        Rule::null => Ok(PropertyValue::Null),
        Rule::param => {
            let name = &inner.as_str()[1..];
            params
                .get(name)
                .cloned()
                .ok_or_else(|| ParseError::UnknownParam(name.to_string()))
        }
        other => Err(ParseError::Malformed(format!("unexpected value {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> HashMap<String, PropertyValue> {
        HashMap::new()
    }

    #[test]
    fn test_parse_simple_match() {
        let q = parse_query("match (n:Provenance) return n", &no_params()).unwrap();
        assert_eq!(q.start.var, "n");
        assert_eq!(q.start.label, Some(Label::new("Provenance")));
        assert!(q.hop.is_none());
        assert_eq!(q.returns, vec!["n"]);
    }

    #[test]
    fn test_parse_props_and_limit() {
        let q = parse_query(
            r#"match (n:Provenance {oid: "urn:uuid:a", created: 12}) return n limit 5"#,
            &no_params(),
        )
        .unwrap();
        assert_eq!(q.start.props.len(), 2);
        assert_eq!(
            q.start.props[0],
            ("oid".to_string(), PropertyValue::from("urn:uuid:a"))
        );
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn test_parse_hop_with_backtick_types() {
        let q = parse_query(
            r#"match (n)-[r:`input to`|generated]->(m:Provenance) return n, r, m"#,
            &no_params(),
        )
        .unwrap();
        let (rel, end) = q.hop.unwrap();
        assert_eq!(rel.var.as_deref(), Some("r"));
        assert_eq!(
            rel.types,
            vec![RelType::new("input to"), RelType::new("generated")]
        );
        assert_eq!(rel.direction, Direction::Outgoing);
        assert_eq!(end.var, "m");
        assert_eq!(q.returns, vec!["n", "r", "m"]);
    }

    #[test]
    fn test_parse_incoming_and_undirected() {
        let q = parse_query("match (n)<-[r:marks]-(m) return m", &no_params()).unwrap();
        assert_eq!(q.hop.unwrap().0.direction, Direction::Incoming);

        let q = parse_query("match (n)-[r:marks]-(m) return m", &no_params()).unwrap();
        assert_eq!(q.hop.unwrap().0.direction, Direction::Both);
    }

    #[test]
    fn test_parse_where_order_desc() {
        let q = parse_query(
            r#"match (n:Provenance) where n.type = "workflow" return n order by n.created desc limit 10"#,
            &no_params(),
        )
        .unwrap();
        assert_eq!(q.conditions.len(), 1);
        assert_eq!(q.conditions[0].key, "type");
        let order = q.order_by.unwrap();
        assert_eq!(order.key, "created");
        assert!(order.descending);
        assert_eq!(q.limit, Some(10));
    }

    #[test]
    fn test_parse_params() {
        let mut params = HashMap::new();
        params.insert("oid".to_string(), PropertyValue::from("urn:uuid:x"));
        let q = parse_query(
            "match (n:Provenance {oid: $oid}) return n",
            &params,
        )
        .unwrap();
        assert_eq!(
            q.start.props[0],
            ("oid".to_string(), PropertyValue::from("urn:uuid:x"))
        );

        let err = parse_query("match (n {oid: $missing}) return n", &no_params());
        assert!(matches!(err, Err(ParseError::UnknownParam(_))));
    }

    #[test]
    fn test_parse_metadata_key() {
        let q = parse_query(
            r#"match (n:Provenance) where n.`metadata:source` = "sensor" return n"#,
            &no_params(),
        )
        .unwrap();
        assert_eq!(q.conditions[0].key, "metadata:source");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_query("definitely not a query", &no_params()).is_err());
        assert!(parse_query("match (n return n", &no_params()).is_err());
    }
}
